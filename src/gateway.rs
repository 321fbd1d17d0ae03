use hyper::service::{Service};
use hyper::{Response, Server, Body, Request};
use futures::task::{Context, Poll};
use std::convert::Infallible;
use std::pin::Pin;
use std::future::Future;
use log::info;
use crate::errors::BoxError;

/// Serves `service` on `127.0.0.1:port` until the server fails.
pub async fn start_gateway<S>(port: u16, service: S) -> Result<(), hyper::Error>
where
    S: Service<Request<Body>, Response = Response<Body>> + Clone + Send + 'static,
    S::Future: Send + 'static,
    S::Error: Into<BoxError>,
{
    let in_addr = ([127, 0, 0, 1], port).into();
    let server = Server::try_bind(&in_addr)?.serve(MkGateway { service });
    info!("Listening on http://{}", in_addr);
    server.await
}

/// Hands each new connection its own clone of the service
pub(crate) struct MkGateway<S> {
    pub(crate) service: S,
}

impl<S: Clone + Send + 'static, T> Service<T> for MkGateway<S> {
    type Response = S;
    type Error = Infallible;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, _: &mut Context) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, _: T) -> Self::Future {
        let service = self.service.clone();
        let fut = async move { Ok(service) };
        Box::pin(fut)
    }
}
