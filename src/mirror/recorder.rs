use std::panic::AssertUnwindSafe;

use futures::FutureExt;
use hyper::body::Bytes;
use hyper::header::HeaderName;
use hyper::http::Extensions;
use hyper::{Body, HeaderMap, Response, StatusCode, Version};

use crate::errors::MirrorError;

/// A handler response buffered in memory.
///
/// The whole body is held, so very large or endless streaming responses
/// are not a fit for mirroring. Body trailers are not kept: neither the
/// client nor the reporter sees them. Extensions set by the handler move to
/// the relayed response only; the reporter's copy has none.
#[derive(Debug)]
pub struct ResponseRecorder {
    pub status: StatusCode,
    pub version: Version,
    pub headers: HeaderMap,
    pub extensions: Extensions,
    pub body: Bytes,
}

impl ResponseRecorder {
    /// Drains the handler's response. Fails if its body stream fails or panics.
    pub async fn record(res: Response<Body>) -> Result<Self, MirrorError> {
        let (parts, body) = res.into_parts();
        let body = match AssertUnwindSafe(hyper::body::to_bytes(body)).catch_unwind().await {
            Ok(Ok(body)) => body,
            Ok(Err(err)) => return Err(MirrorError::Relay(err)),
            Err(_) => return Err(MirrorError::ResponseBodyPanic),
        };
        Ok(ResponseRecorder {
            status: parts.status,
            version: parts.version,
            headers: parts.headers,
            extensions: parts.extensions,
            body,
        })
    }

    /// An independent, readable copy of the recorded response
    pub fn to_response(&self) -> Response<Body> {
        let mut res = Response::new(Body::from(self.body.clone()));
        *res.status_mut() = self.status;
        *res.version_mut() = self.version;
        *res.headers_mut() = self.headers.clone();
        res
    }

    /// Writes the recording into `sink`: headers first (recorded values replace
    /// every value the sink had under the same name), then extensions, status
    /// and body.
    pub fn relay_into(self, sink: &mut Response<Body>) {
        let headers = sink.headers_mut();
        let mut current: Option<HeaderName> = None;
        for (name, value) in self.headers {
            match name {
                Some(name) => {
                    headers.insert(&name, value);
                    current = Some(name);
                }
                None => {
                    if let Some(name) = &current {
                        headers.append(name, value);
                    }
                }
            }
        }
        sink.extensions_mut().extend(self.extensions);
        *sink.status_mut() = self.status;
        *sink.body_mut() = Body::from(self.body);
    }
}
