pub mod conf;
pub mod errors;
pub mod gateway;
pub mod handlers;
pub mod mirror;

pub use errors::{BoxError, MirrorError};
pub use handlers::{reporter_fn, Reporter, ReporterFn};
pub use mirror::{Middleware, Mirror};

#[cfg(test)]
mod tests {
    use crate::errors::BoxError;
    use crate::handlers::diagnostics::Diagnostics;
    use crate::handlers::{reporter_fn, Reporter};
    use hyper::body::Bytes;
    use hyper::{Body, HeaderMap, Request, Response, StatusCode};
    use std::convert::Infallible;
    use std::error::Error;
    use std::sync::{Arc, Mutex};
    use tokio::net::TcpStream;
    use tokio::time::Duration;

    pub(crate) async fn body_as_str(body: Body) -> String {
        String::from_utf8(hyper::body::to_bytes(body).await.unwrap().to_vec()).unwrap()
    }

    /// Echoes the request body back, prefixed with `Received:`
    pub(crate) async fn echo(req: Request<Body>) -> Result<Response<Body>, Infallible> {
        match hyper::body::to_bytes(req.into_body()).await {
            Ok(raw) => Ok(Response::new(Body::from(format!("Received:{}", String::from_utf8_lossy(&raw))))),
            Err(err) => Ok(Response::builder()
                .status(StatusCode::INTERNAL_SERVER_ERROR)
                .body(Body::from(format!("error reading body {}", err)))
                .unwrap()),
        }
    }

    pub(crate) async fn wait_for_gateway(port: u16) {
        let mut attempts = 0;
        while attempts < 50 && TcpStream::connect(("127.0.0.1", port)).await.is_err() {
            attempts += 1;
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    }

    #[derive(Debug, Clone)]
    pub(crate) struct Reported {
        pub(crate) method: String,
        pub(crate) path: String,
        pub(crate) request_headers: HeaderMap,
        pub(crate) request_body: Bytes,
        pub(crate) status: StatusCode,
        pub(crate) response_headers: HeaderMap,
        pub(crate) response_body: Bytes,
    }

    /// A reporter keeping every exchange it is given
    pub(crate) fn capturing_reporter() -> (impl Reporter, Arc<Mutex<Vec<Reported>>>) {
        let reported = Arc::new(Mutex::new(Vec::new()));
        let sink = reported.clone();
        let reporter = reporter_fn(move |res: Response<Body>, req: Request<Body>| {
            let sink = sink.clone();
            async move {
                let (req_parts, req_body) = req.into_parts();
                let (res_parts, res_body) = res.into_parts();
                let entry = Reported {
                    method: req_parts.method.to_string(),
                    path: req_parts.uri.path().to_string(),
                    request_headers: req_parts.headers,
                    request_body: hyper::body::to_bytes(req_body).await?,
                    status: res_parts.status,
                    response_headers: res_parts.headers,
                    response_body: hyper::body::to_bytes(res_body).await?,
                };
                sink.lock().unwrap().push(entry);
                Ok::<(), BoxError>(())
            }
        });
        (reporter, reported)
    }

    #[derive(Debug, Clone, Default)]
    pub(crate) struct RecordingDiagnostics {
        entries: Arc<Mutex<Vec<String>>>,
    }

    impl RecordingDiagnostics {
        pub(crate) fn entries(&self) -> Vec<String> {
            self.entries.lock().unwrap().clone()
        }
    }

    impl Diagnostics for RecordingDiagnostics {
        fn log_error(&self, context: &str, err: &dyn Error) {
            self.entries.lock().unwrap().push(format!("{}: {}", context, err));
        }
    }
}
