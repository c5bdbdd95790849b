use crate::http::{make_boxed_error_response, text_body};
use http_body_util::combinators::BoxBody;
use hyper::body::{Bytes, Incoming};
use hyper::service::Service;
use hyper::{Request, Response, StatusCode};
use std::convert::Infallible;
use std::future::Future;
use std::marker::PhantomData;
use std::pin::Pin;
use std::sync::Arc;

/// A named readiness check. The check must be cheap; it runs on every probe.
pub type ReadinessProbe = (&'static str, Arc<dyn Fn() -> bool + Send + Sync>);

/// Serves `/health` (always ok once the listener is up) and `/ready`, which
/// only succeeds when every registered probe reports ready.
pub struct AdminService<E> {
    probes: Vec<ReadinessProbe>,
    _error: PhantomData<fn() -> E>,
}

impl<E> AdminService<E> {
    pub fn new() -> Self {
        Self {
            probes: Vec::new(),
            _error: PhantomData,
        }
    }

    pub fn with_probe<F>(mut self, name: &'static str, probe: F) -> Self
    where
        F: Fn() -> bool + Send + Sync + 'static,
    {
        self.probes.push((name, Arc::new(probe)));
        self
    }

    /// Names of the probes that are currently failing.
    fn not_ready(&self) -> Vec<&'static str> {
        self.probes
            .iter()
            .filter(|(_, probe)| !probe())
            .map(|(name, _)| *name)
            .collect()
    }
}

impl<E> Default for AdminService<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> Service<Request<Incoming>> for AdminService<E>
where
    E: Send + 'static,
{
    type Response = Response<BoxBody<Bytes, Infallible>>;
    type Error = E;
    type Future =
        Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send + 'static>>;

    fn call(&self, req: Request<Incoming>) -> Self::Future {
        let res = match req.uri().path() {
            "/health" => Response::new(text_body("ok\n")),
            "/ready" => readiness_response(&self.not_ready()),
            _ => make_boxed_error_response(StatusCode::NOT_FOUND),
        };

        Box::pin(async move { Ok(res) })
    }
}

fn readiness_response(not_ready: &[&'static str]) -> Response<BoxBody<Bytes, Infallible>> {
    if not_ready.is_empty() {
        return Response::new(text_body("ok\n"));
    }

    let body: String = not_ready
        .iter()
        .map(|name| format!("{name}: not ready\n"))
        .collect();
    let mut response = Response::new(text_body(body));
    *response.status_mut() = StatusCode::SERVICE_UNAVAILABLE;
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[test]
    fn reports_failing_probes_by_name() {
        let feeds_ready = Arc::new(AtomicBool::new(false));
        let flag = feeds_ready.clone();
        let service: AdminService<std::io::Error> = AdminService::new()
            .with_probe("feeds", move || flag.load(Ordering::Relaxed))
            .with_probe("always", || true);

        assert_eq!(service.not_ready(), vec!["feeds"]);

        feeds_ready.store(true, Ordering::Relaxed);
        assert!(service.not_ready().is_empty());
    }

    #[tokio::test]
    async fn readiness_body_lists_components() {
        let response = readiness_response(&["feeds", "db"]);
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(body, Bytes::from("feeds: not ready\ndb: not ready\n"));
    }
}
