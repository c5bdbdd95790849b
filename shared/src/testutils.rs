//! A throwaway upstream for client tests.

use http_body_util::Full;
use hyper::body::{Bytes, Incoming};
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::{TokioExecutor, TokioIo};
use std::convert::Infallible;
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;

/// A canned upstream reply.
#[derive(Clone, Debug)]
pub struct MockReply {
    pub status: StatusCode,
    pub content_type: &'static str,
    pub body: Bytes,
}

impl MockReply {
    pub fn json(body: impl Into<Bytes>) -> Self {
        MockReply {
            status: StatusCode::OK,
            content_type: "application/json",
            body: body.into(),
        }
    }

    pub fn xml(body: impl Into<Bytes>) -> Self {
        MockReply {
            status: StatusCode::OK,
            content_type: "application/xml",
            body: body.into(),
        }
    }

    pub fn status(status: StatusCode, body: impl Into<Bytes>) -> Self {
        MockReply {
            status,
            content_type: "text/plain",
            body: body.into(),
        }
    }
}

/// A request as the mock server saw it.
#[derive(Clone, Debug)]
pub struct RecordedRequest {
    pub method: String,
    pub path: String,
    pub query: Option<String>,
    pub body: Bytes,
}

pub struct MockServer {
    pub port: u16,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

impl MockServer {
    /// Starts a server on an ephemeral port that answers every request with
    /// `reply_fn(&request)`.
    pub async fn start<F>(reply_fn: F) -> MockServer
    where
        F: Fn(&RecordedRequest) -> MockReply + Send + Sync + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let reply_fn = Arc::new(reply_fn);
        let requests = Arc::new(Mutex::new(Vec::new()));
        let recorded = requests.clone();

        tokio::spawn(async move {
            loop {
                let Ok((stream, _)) = listener.accept().await else {
                    return;
                };
                let io = TokioIo::new(stream);
                let reply_fn = reply_fn.clone();
                let recorded = recorded.clone();

                tokio::spawn(async move {
                    let service = service_fn(move |req: Request<Incoming>| {
                        let reply_fn = reply_fn.clone();
                        let recorded = recorded.clone();
                        async move {
                            use http_body_util::BodyExt;

                            let (parts, body) = req.into_parts();
                            let body = body.collect().await.map(|b| b.to_bytes()).unwrap_or_default();
                            let request = RecordedRequest {
                                method: parts.method.to_string(),
                                path: parts.uri.path().to_string(),
                                query: parts.uri.query().map(String::from),
                                body,
                            };
                            let reply = reply_fn(&request);
                            recorded.lock().unwrap().push(request);

                            let response = Response::builder()
                                .status(reply.status)
                                .header("content-type", reply.content_type)
                                .body(Full::new(reply.body))
                                .unwrap();
                            Ok::<_, Infallible>(response)
                        }
                    });

                    let _ = hyper_util::server::conn::auto::Builder::new(TokioExecutor::new())
                        .serve_connection(io, service)
                        .await;
                });
            }
        });

        MockServer { port, requests }
    }

    pub fn url(&self) -> String {
        format!("http://127.0.0.1:{}", self.port)
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }
}
