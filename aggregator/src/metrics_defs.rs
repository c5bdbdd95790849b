//! Metrics definitions for the dashboard aggregator.

use shared::metrics_defs::{MetricDef, MetricType};

pub const DASHBOARD_REQUESTS: MetricDef = MetricDef {
    name: "dashboard.requests",
    metric_type: MetricType::Counter,
    description: "Number of requests received, by route",
};

pub const DASHBOARD_FAILURES: MetricDef = MetricDef {
    name: "dashboard.failures",
    metric_type: MetricType::Counter,
    description: "Number of requests that failed, by route and failure kind",
};

pub const UPSTREAM_CALL_DURATION: MetricDef = MetricDef {
    name: "upstream.call.duration",
    metric_type: MetricType::Histogram,
    description: "Time spent in a single collaborator call in seconds, by task",
};

pub const UPSTREAM_CALL_FAILURES: MetricDef = MetricDef {
    name: "upstream.call.failures",
    metric_type: MetricType::Counter,
    description: "Number of collaborator calls that failed, by task",
};

pub const OUTCOMES_DISCARDED: MetricDef = MetricDef {
    name: "dashboard.outcomes.discarded",
    metric_type: MetricType::Counter,
    description: "Number of task outcomes drained and dropped after a request had already failed",
};

pub const ALL_METRICS: &[MetricDef] = &[
    DASHBOARD_REQUESTS,
    DASHBOARD_FAILURES,
    UPSTREAM_CALL_DURATION,
    UPSTREAM_CALL_FAILURES,
    OUTCOMES_DISCARDED,
];
