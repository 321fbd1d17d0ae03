use thiserror::Error;

/// Error type accepted from wrapped handlers and reporters.
/// Same bound hyper's `Server` puts on service errors.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Error)]
pub enum MirrorError {
    /// Reading the live request body failed while taking the snapshot
    #[error("could not capture request: {0}")]
    Capture(#[source] hyper::Error),

    #[error("request body stream panicked")]
    RequestBodyPanic,

    /// The handler's response body failed while being recorded
    #[error("could not record response: {0}")]
    Relay(#[source] hyper::Error),

    #[error("response body stream panicked")]
    ResponseBodyPanic,

    /// The framed snapshot could not be read back as a request
    #[error("could not parse mirrored request: {0}")]
    Parse(String),

    #[error("reporter failed: {0}")]
    Report(#[source] BoxError),

    #[error("reporter panicked")]
    ReporterPanic,

    #[error("handler panicked")]
    HandlerPanic,
}

impl MirrorError {
    pub(crate) fn parse<E: std::fmt::Display>(err: E) -> Self {
        MirrorError::Parse(err.to_string())
    }
}
