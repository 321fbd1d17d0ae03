use hyper::{Request, Body, Response};
use log::{Level};
use async_trait::async_trait;
use crate::errors::BoxError;
use crate::handlers::Reporter;

/// Writes one log record per mirrored exchange
#[derive(Debug, Clone)]
pub struct LogReporter {
    pub level: Level,
}

#[async_trait]
impl Reporter for LogReporter {
    async fn report(&self, res: Response<Body>, req: Request<Body>) -> Result<(), BoxError> {
        let (parts, body) = req.into_parts();
        let request_body = hyper::body::to_bytes(body).await?;
        let status = res.status();
        let response_body = hyper::body::to_bytes(res.into_body()).await?;
        log::log!(
            self.level,
            "{} {} -> {} (request body: {} bytes, response body: {} bytes)",
            parts.method,
            parts.uri.path(),
            status.as_u16(),
            request_body.len(),
            response_body.len()
        );
        Ok(())
    }
}
