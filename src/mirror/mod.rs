//! Request/response mirroring middleware.
//!
//! ```text
//! transport
//!     → Mirror::call
//!     → snapshot.rs (frame the request, parse it back)   on failure: handler only, no report
//!     → wrapped handler, with the live request
//!     → recorder.rs (buffer the response, relay it to the client)
//!     → Reporter::report(response copy, mirrored request)
//! ```
//!
//! Every invocation is independent. The wrapped handler, the reporter and
//! the configuration are shared read-only between invocations.

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures::FutureExt;
use hyper::service::Service;
use hyper::{Body, Request, Response, StatusCode};
use log::debug;

use crate::conf::{MirrorConf, ReportMode};
use crate::errors::{BoxError, MirrorError};
use crate::handlers::diagnostics::{Diagnostics, LogDiagnostics};
use crate::handlers::Reporter;

pub mod recorder;
pub mod snapshot;

use recorder::ResponseRecorder;

/// Builds a middleware reporting every exchange to `reporter`.
/// When `capture_body` is false the reporter always sees an empty request body.
pub fn new<R: Reporter + 'static>(reporter: R, capture_body: bool) -> Middleware {
    Middleware::with_conf(reporter, MirrorConf::new(capture_body))
}

#[derive(Debug, Clone)]
pub struct Middleware {
    reporter: Box<dyn Reporter>,
    diagnostics: Box<dyn Diagnostics>,
    conf: MirrorConf,
}

impl Middleware {
    pub fn with_conf<R: Reporter + 'static>(reporter: R, conf: MirrorConf) -> Self {
        Middleware {
            reporter: Box::new(reporter),
            diagnostics: Box::new(LogDiagnostics),
            conf,
        }
    }

    pub fn with_diagnostics<D: Diagnostics + 'static>(mut self, diagnostics: D) -> Self {
        self.diagnostics = Box::new(diagnostics);
        self
    }

    /// Wraps `inner`. The result serves exactly what `inner` serves.
    pub fn wrap<S>(&self, inner: S) -> Mirror<S> {
        Mirror {
            inner,
            middleware: Arc::new(self.clone()),
        }
    }

    async fn call_handler<S>(&self, inner: &mut S, req: Request<Body>) -> Result<Response<Body>, BoxError>
    where
        S: Service<Request<Body>, Response = Response<Body>>,
        S::Error: Into<BoxError>,
    {
        let handled = AssertUnwindSafe(async { inner.call(req).await })
            .catch_unwind()
            .await;
        match handled {
            Ok(res) => res.map_err(Into::into),
            Err(_) => {
                self.diagnostics.log_error("httpmirror: handler", &MirrorError::HandlerPanic);
                let mut res = Response::new(Body::empty());
                *res.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
                Ok(res)
            }
        }
    }

    async fn report(&self, res: Response<Body>, req: Request<Body>) {
        let reported = AssertUnwindSafe(self.reporter.report(res, req))
            .catch_unwind()
            .await;
        match reported {
            Ok(Ok(())) => {}
            Ok(Err(err)) => self
                .diagnostics
                .log_error("httpmirror: reporter", &MirrorError::Report(err)),
            Err(_) => self
                .diagnostics
                .log_error("httpmirror: reporter", &MirrorError::ReporterPanic),
        }
    }
}

/// A handler wrapped by [`Middleware::wrap`]
#[derive(Debug, Clone)]
pub struct Mirror<S> {
    inner: S,
    middleware: Arc<Middleware>,
}

impl<S> Service<Request<Body>> for Mirror<S>
where
    S: Service<Request<Body>, Response = Response<Body>> + Clone + Send + 'static,
    S::Future: Send + 'static,
    S::Error: Into<BoxError>,
{
    type Response = Response<Body>;
    type Error = BoxError;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx).map_err(Into::into)
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        // the instance polled ready serves this request
        let clone = self.inner.clone();
        let inner = std::mem::replace(&mut self.inner, clone);
        let middleware = self.middleware.clone();
        Box::pin(intercept(inner, middleware, req))
    }
}

async fn intercept<S>(mut inner: S, middleware: Arc<Middleware>, req: Request<Body>) -> Result<Response<Body>, BoxError>
where
    S: Service<Request<Body>, Response = Response<Body>>,
    S::Error: Into<BoxError>,
{
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    let (req, raw) = snapshot::dump_request(req, middleware.conf.capture_body).await;
    let mirrored = match raw.and_then(|raw| snapshot::parse_request(&raw)) {
        Ok(mirrored) => mirrored,
        Err(err) => {
            middleware.diagnostics.log_error("httpmirror: request snapshot", &err);
            debug!("{} {} served without mirroring", method, path);
            return middleware.call_handler(&mut inner, req).await;
        }
    };

    let res = middleware.call_handler(&mut inner, req).await?;
    let recorder = match ResponseRecorder::record(res).await {
        Ok(recorder) => recorder,
        Err(err) => {
            middleware.diagnostics.log_error("httpmirror: response relay", &err);
            return Err(err.into());
        }
    };
    let reported = recorder.to_response();
    let mut relayed = Response::new(Body::empty());
    recorder.relay_into(&mut relayed);
    debug!("{} {} relayed with status {}", method, path, relayed.status());

    match middleware.conf.report_mode {
        ReportMode::Inline => middleware.report(reported, mirrored).await,
        ReportMode::Background => {
            let middleware = middleware.clone();
            tokio::spawn(async move { middleware.report(reported, mirrored).await });
        }
    }
    Ok(relayed)
}
