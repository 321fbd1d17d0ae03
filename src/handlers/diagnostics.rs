use dyn_clone::{clone_trait_object, DynClone};
use std::error::Error;
use std::fmt::Debug;

/// Side channel for failures the client must never see.
pub trait Diagnostics: Send + Debug + Sync + DynClone {
    fn log_error(&self, context: &str, err: &dyn Error);
}

clone_trait_object!(Diagnostics);

/// Default sink, goes through the `log` facade.
#[derive(Debug, Clone, Default)]
pub struct LogDiagnostics;

impl Diagnostics for LogDiagnostics {
    fn log_error(&self, context: &str, err: &dyn Error) {
        log::error!(target: "httpmirror", "{}: {}", context, err);
    }
}

#[derive(Debug, Clone, Default)]
pub struct NoopDiagnostics;

impl Diagnostics for NoopDiagnostics {
    fn log_error(&self, _context: &str, _err: &dyn Error) {}
}
