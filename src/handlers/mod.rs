use hyper::{Response, Body, Request};
use dyn_clone::{clone_trait_object, DynClone};
use std::fmt::{self, Debug};
use std::future::Future;
use async_trait::async_trait;
use crate::errors::BoxError;

pub mod diagnostics;
pub mod interceptor;

/// Receives every recorded exchange: the response as the client got it,
/// and the mirrored request. Both can be read freely.
#[async_trait]
pub trait Reporter: Send + Debug + Sync + DynClone {
    async fn report(&self, res: Response<Body>, req: Request<Body>) -> Result<(), BoxError>;
}

clone_trait_object!(Reporter);

/// Lets a plain async function act as a [`Reporter`].
#[derive(Clone)]
pub struct ReporterFn<F> {
    f: F,
}

pub fn reporter_fn<F, Fut>(f: F) -> ReporterFn<F>
where
    F: Fn(Response<Body>, Request<Body>) -> Fut + Clone + Send + Sync + 'static,
    Fut: Future<Output = Result<(), BoxError>> + Send + 'static,
{
    ReporterFn { f }
}

impl<F> Debug for ReporterFn<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReporterFn").finish()
    }
}

#[async_trait]
impl<F, Fut> Reporter for ReporterFn<F>
where
    F: Fn(Response<Body>, Request<Body>) -> Fut + Clone + Send + Sync + 'static,
    Fut: Future<Output = Result<(), BoxError>> + Send + 'static,
{
    async fn report(&self, res: Response<Body>, req: Request<Body>) -> Result<(), BoxError> {
        (self.f)(res, req).await
    }
}
