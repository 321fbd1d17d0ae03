//! Wire-level snapshot of an incoming request.
//!
//! The live request is serialized into HTTP/1.1 framing and parsed back,
//! so the copy handed to the reporter shares no body state with the
//! request the handler consumes.

use std::panic::AssertUnwindSafe;
use std::{io, iter};

use futures::{stream, FutureExt};
use hyper::body::{Bytes, HttpBody};
use hyper::header::{HeaderName, HeaderValue, CONTENT_LENGTH, HOST, TRANSFER_ENCODING};
use hyper::http::request::Parts;
use hyper::{Body, Method, Request, Uri, Version};

use crate::errors::MirrorError;

const HEAD_END: &[u8] = b"\r\n\r\n";
const INITIAL_HEADERS: usize = 32;
const MAX_HEADERS: usize = 1024;

/// Serializes `req` into a framed buffer.
///
/// The request is always handed back, ready for the handler. With
/// `capture_body` the body is drained first and the returned request carries
/// the same bytes in memory; on a read failure, or a panicking body stream,
/// it replays what was read and then fails. Without `capture_body` the body
/// stream is not touched and the framed buffer has an empty body segment.
pub async fn dump_request(
    req: Request<Body>,
    capture_body: bool,
) -> (Request<Body>, Result<Vec<u8>, MirrorError>) {
    let (parts, body) = req.into_parts();
    let mut raw = Vec::with_capacity(256);
    write_head(&parts, &mut raw);
    if !capture_body {
        return (Request::from_parts(parts, body), Ok(raw));
    }
    match drain(body).await {
        Ok(bytes) => {
            raw.extend_from_slice(&bytes);
            let live = Request::from_parts(parts, Body::from(bytes));
            (live, Ok(insert_content_length(raw)))
        }
        Err((read, err)) => {
            let replayed = io::Error::new(io::ErrorKind::Other, err.to_string());
            let chunks = read
                .into_iter()
                .map(Ok)
                .chain(iter::once(Err(replayed)));
            let live = Request::from_parts(parts, Body::wrap_stream(stream::iter(chunks)));
            (live, Err(err))
        }
    }
}

/// Adds a `Content-Length` header when the buffer carries a body but no length.
/// Without it the body would be dropped when the buffer is parsed again.
pub fn insert_content_length(raw: Vec<u8>) -> Vec<u8> {
    let head_len = match find(&raw, HEAD_END) {
        Some(at) => at,
        None => return raw,
    };
    let body_start = head_len + HEAD_END.len();
    let body_len = raw.len() - body_start;
    if body_len == 0 || has_content_length(&raw[..head_len]) {
        return raw;
    }
    let length = format!("\r\nContent-Length: {}", body_len);
    let mut framed = Vec::with_capacity(raw.len() + length.len());
    framed.extend_from_slice(&raw[..head_len]);
    framed.extend_from_slice(length.as_bytes());
    framed.extend_from_slice(&raw[head_len..]);
    framed
}

/// Parses a framed buffer back into a request with its own in-memory body.
pub fn parse_request(raw: &[u8]) -> Result<Request<Body>, MirrorError> {
    let mut capacity = INITIAL_HEADERS;
    loop {
        let mut headers = vec![httparse::EMPTY_HEADER; capacity];
        let mut parsed = httparse::Request::new(&mut headers);
        match parsed.parse(raw) {
            Ok(httparse::Status::Complete(head_len)) => {
                return build_request(&parsed, &raw[head_len..])
            }
            Ok(httparse::Status::Partial) => {
                return Err(MirrorError::parse("incomplete request head"))
            }
            Err(httparse::Error::TooManyHeaders) if capacity < MAX_HEADERS => capacity *= 2,
            Err(err) => return Err(MirrorError::parse(err)),
        }
    }
}

fn build_request(parsed: &httparse::Request<'_, '_>, rest: &[u8]) -> Result<Request<Body>, MirrorError> {
    let method = parsed
        .method
        .ok_or_else(|| MirrorError::parse("missing method"))?;
    let method = Method::from_bytes(method.as_bytes()).map_err(MirrorError::parse)?;
    let uri: Uri = parsed
        .path
        .ok_or_else(|| MirrorError::parse("missing request target"))?
        .parse()
        .map_err(MirrorError::parse)?;
    let version = match parsed.version {
        Some(0) => Version::HTTP_10,
        _ => Version::HTTP_11,
    };

    let mut builder = Request::builder().method(method).uri(uri).version(version);
    let mut content_length: Option<usize> = None;
    for header in parsed.headers.iter() {
        let name = HeaderName::from_bytes(header.name.as_bytes()).map_err(MirrorError::parse)?;
        let value = HeaderValue::from_bytes(header.value).map_err(MirrorError::parse)?;
        if name == TRANSFER_ENCODING {
            return Err(MirrorError::parse("transfer-encoding is not supported in a mirrored request"));
        }
        if name == CONTENT_LENGTH {
            let length = parse_length(header.value)?;
            if content_length.map_or(false, |known| known != length) {
                return Err(MirrorError::parse("conflicting Content-Length values"));
            }
            content_length = Some(length);
        }
        builder = builder.header(name, value);
    }

    let length = content_length.unwrap_or(0);
    if rest.len() < length {
        return Err(MirrorError::parse(format!(
            "body is {} bytes, Content-Length announced {}",
            rest.len(),
            length
        )));
    }
    let body = Bytes::copy_from_slice(&rest[..length]);
    builder.body(Body::from(body)).map_err(MirrorError::parse)
}

fn write_head(parts: &Parts, out: &mut Vec<u8>) {
    let target = match (parts.uri.authority(), parts.uri.path_and_query()) {
        // authority-form, only valid for CONNECT
        (Some(authority), _) if parts.method == Method::CONNECT => authority.as_str(),
        (_, Some(pq)) if !pq.as_str().is_empty() => pq.as_str(),
        _ => "/",
    };
    let version = if parts.version == Version::HTTP_10 { "HTTP/1.0" } else { "HTTP/1.1" };
    out.extend_from_slice(format!("{} {} {}\r\n", parts.method, target, version).as_bytes());

    let host = parts
        .headers
        .get(HOST)
        .map(|value| value.as_bytes())
        .or_else(|| parts.uri.authority().map(|authority| authority.as_str().as_bytes()));
    if let Some(host) = host {
        write_header(out, b"Host", host);
    }
    for (name, value) in parts.headers.iter() {
        // framing headers describe the live body, not the captured one
        if name == HOST || name == CONTENT_LENGTH || name == TRANSFER_ENCODING {
            continue;
        }
        write_header(out, name.as_str().as_bytes(), value.as_bytes());
    }
    out.extend_from_slice(b"\r\n");
}

fn write_header(out: &mut Vec<u8>, name: &[u8], value: &[u8]) {
    out.extend_from_slice(name);
    out.extend_from_slice(b": ");
    out.extend_from_slice(value);
    out.extend_from_slice(b"\r\n");
}

async fn drain(mut body: Body) -> Result<Bytes, (Vec<Bytes>, MirrorError)> {
    let mut chunks: Vec<Bytes> = Vec::new();
    let read = AssertUnwindSafe(async {
        while let Some(chunk) = body.data().await {
            chunks.push(chunk?);
        }
        Ok::<(), hyper::Error>(())
    })
    .catch_unwind()
    .await;
    match read {
        Ok(Ok(())) => {}
        Ok(Err(err)) => return Err((chunks, MirrorError::Capture(err))),
        Err(_) => return Err((chunks, MirrorError::RequestBodyPanic)),
    }
    if chunks.len() == 1 {
        return Ok(chunks.remove(0));
    }
    Ok(Bytes::from(chunks.concat()))
}

fn has_content_length(head: &[u8]) -> bool {
    head.split(|b| *b == b'\n')
        .skip(1)
        .filter_map(|line| line.splitn(2, |b| *b == b':').next())
        .any(|name| name.eq_ignore_ascii_case(b"content-length"))
}

fn parse_length(value: &[u8]) -> Result<usize, MirrorError> {
    std::str::from_utf8(value)
        .ok()
        .and_then(|v| v.trim().parse::<usize>().ok())
        .ok_or_else(|| MirrorError::parse("invalid Content-Length"))
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|window| window == needle)
}
