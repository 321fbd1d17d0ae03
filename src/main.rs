use httpmirror::gateway::start_gateway;
use httpmirror::handlers::interceptor::log::LogReporter;
use httpmirror::{mirror, BoxError};
use hyper::service::service_fn;
use hyper::{Body, Request, Response};
use log::{Level, LevelFilter};
use simple_logger::SimpleLogger;
use std::convert::Infallible;

async fn echo(req: Request<Body>) -> Result<Response<Body>, Infallible> {
    let (parts, body) = req.into_parts();
    Ok(Response::builder()
        .header("X-Echo-Path", parts.uri.path())
        .body(body)
        .unwrap_or_default())
}

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    SimpleLogger::new().with_level(LevelFilter::Info).init()?;
    let middleware = mirror::new(LogReporter { level: Level::Info }, true);
    start_gateway(1234, middleware.wrap(service_fn(echo))).await?;
    Ok(())
}
