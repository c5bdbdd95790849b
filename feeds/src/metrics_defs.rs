//! Metrics definitions for the public feed cache.

use shared::metrics_defs::{MetricDef, MetricType};

pub const FEED_REFRESH_DURATION: MetricDef = MetricDef {
    name: "feeds.refresh.duration",
    metric_type: MetricType::Histogram,
    description: "Time to pull and transform a single feed in seconds",
};

pub const FEED_REFRESH_FAILURES: MetricDef = MetricDef {
    name: "feeds.refresh.failures",
    metric_type: MetricType::Counter,
    description: "Number of feed pulls that failed and kept the previous items",
};

pub const ALL_METRICS: &[MetricDef] = &[FEED_REFRESH_DURATION, FEED_REFRESH_FAILURES];
