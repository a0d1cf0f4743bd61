//! Request and response capture
//!
//! Up to `max_body_bytes` of the request body is read ahead and handed
//! downstream in front of whatever the client has not sent yet, so the
//! handler sees the same bytes and the same transport errors. The response body is wrapped in [`CaptureBody`], which
//! forwards every frame untouched while keeping a bounded copy, and reports
//! the copy only when the stream ends.

use std::{
    collections::BTreeMap,
    net::SocketAddr,
    pin::Pin,
    task::{ready, Context, Poll},
};

use axum::{
    body::Body,
    extract::{ConnectInfo, Request},
};
use bytes::{Bytes, BytesMut};
use futures::{future, stream, StreamExt};
use chrono::{DateTime, Utc};
use http::{header, request, response, HeaderMap, HeaderName};
use http_body::{Body as _, Frame, SizeHint};
use http_body_util::BodyExt;
use pin_project_lite::pin_project;
use tracing::warn;
use uuid::Uuid;

use super::models::{AuthenticatedUser, LogRecordSpec, UNKNOWN_CLIENT_IP, VISITOR};

pub const DEFAULT_MAX_BODY_BYTES: usize = 64 * 1024;

const REDACTED: &str = "[REDACTED]";

#[derive(Debug, Clone)]
pub struct CaptureConfig {
    /// Upper bound on the logged copy of each body
    pub max_body_bytes: usize,
    /// Trusted header carrying the caller's identity, set by a fronting proxy
    pub identity_header: Option<HeaderName>,
    /// Headers whose values are replaced before they are recorded
    pub redact_headers: Vec<HeaderName>,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
            identity_header: None,
            redact_headers: vec![
                header::AUTHORIZATION,
                header::PROXY_AUTHORIZATION,
                header::COOKIE,
                header::SET_COOKIE,
            ],
        }
    }
}

/// Request-side half of a log record
#[derive(Debug, Clone)]
pub struct RequestSnapshot {
    pub access_time: DateTime<Utc>,
    pub method: String,
    pub path: String,
    pub params: BTreeMap<String, String>,
    pub headers: String,
    pub body: String,
    pub username: String,
    pub client_ip: String,
}

impl RequestSnapshot {
    /// Read ahead the loggable prefix of the request body and return a request
    /// whose body yields the same stream. A body that fails while being read
    /// is recorded as empty and the failure is passed on to the handler.
    pub async fn capture(request: Request, config: &CaptureConfig) -> (Request, Self) {
        let access_time = Utc::now();
        let (parts, body) = request.into_parts();

        let (prefix, body) = match read_prefix(body, config.max_body_bytes).await {
            BodyPrefix::Complete(prefix) => (prefix.clone(), Body::from(prefix)),
            BodyPrefix::Partial(prefix, rest) => {
                let head = stream::once(future::ready(Ok::<_, axum::Error>(prefix.clone())));
                (prefix, Body::from_stream(head.chain(rest.into_data_stream())))
            },
            BodyPrefix::Failed(prefix, e) => {
                warn!(error = %e, path = %parts.uri.path(), "Failed to read request body for audit");
                let frames = stream::iter([Ok(prefix), Err(e)]);
                (Bytes::new(), Body::from_stream(frames))
            },
        };

        let snapshot = Self {
            access_time,
            method: parts.method.to_string(),
            path: normalize_path(parts.uri.path()),
            params: query_params(parts.uri.query()),
            headers: serialize_headers(&parts.headers, &config.redact_headers),
            body: body_text(&prefix, config.max_body_bytes),
            username: resolve_username(&parts, config),
            client_ip: resolve_client_ip(&parts),
        };

        (Request::from_parts(parts, body), snapshot)
    }

    pub fn into_record(self, response: ResponseSnapshot, body: &[u8], limit: usize) -> LogRecordSpec {
        LogRecordSpec {
            id: Uuid::now_v7().to_string(),
            username: self.username,
            client_ip: self.client_ip,
            path: self.path,
            method: self.method,
            access_time: self.access_time,
            request_headers: self.headers,
            request_body: self.body,
            request_params: self.params,
            response_headers: response.headers,
            response_body: body_text(body, limit),
            response_status: response.status,
        }
    }
}

/// Response-side metadata, taken before the body streams
#[derive(Debug, Clone)]
pub struct ResponseSnapshot {
    pub status: String,
    pub headers: String,
}

impl ResponseSnapshot {
    pub fn from_parts(parts: &response::Parts, config: &CaptureConfig) -> Self {
        Self {
            status: parts.status.as_u16().to_string(),
            headers: serialize_headers(&parts.headers, &config.redact_headers),
        }
    }
}

pin_project! {
    /// Tee over a response body. `on_complete` receives the captured prefix
    /// once the inner body is exhausted; it never runs if the body errors or
    /// is dropped early.
    pub struct CaptureBody<B, F> {
        #[pin]
        inner: B,
        captured: BytesMut,
        limit: usize,
        on_complete: Option<F>,
    }
}

impl<B, F> CaptureBody<B, F>
where
    F: FnOnce(Bytes),
{
    pub fn new(inner: B, limit: usize, on_complete: F) -> Self {
        Self {
            inner,
            captured: BytesMut::new(),
            limit,
            on_complete: Some(on_complete),
        }
    }
}

impl<B, F> http_body::Body for CaptureBody<B, F>
where
    B: http_body::Body<Data = Bytes>,
    F: FnOnce(Bytes),
{
    type Data = Bytes;
    type Error = B::Error;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        let mut this = self.project();

        match ready!(this.inner.as_mut().poll_frame(cx)) {
            Some(Ok(frame)) => {
                if let Some(data) = frame.data_ref() {
                    let room = this.limit.saturating_sub(this.captured.len());
                    this.captured.extend_from_slice(&data[..data.len().min(room)]);
                }
                // servers stop polling once the body reports its end
                if this.inner.is_end_stream() {
                    complete(this.on_complete, this.captured);
                }
                Poll::Ready(Some(Ok(frame)))
            },
            Some(Err(e)) => {
                this.on_complete.take();
                Poll::Ready(Some(Err(e)))
            },
            None => {
                complete(this.on_complete, this.captured);
                Poll::Ready(None)
            },
        }
    }

    fn is_end_stream(&self) -> bool {
        self.inner.is_end_stream()
    }

    fn size_hint(&self) -> SizeHint {
        self.inner.size_hint()
    }
}

enum BodyPrefix {
    /// The whole body fit within the limit
    Complete(Bytes),
    /// Limit reached; the rest is still unread
    Partial(Bytes, Body),
    Failed(Bytes, axum::Error),
}

/// Read frames until `limit` bytes are held or the body ends. Holds at most
/// one frame beyond the limit.
async fn read_prefix(mut body: Body, limit: usize) -> BodyPrefix {
    let mut buffered = BytesMut::new();

    while buffered.len() < limit {
        match body.frame().await {
            Some(Ok(frame)) => {
                if let Some(data) = frame.data_ref() {
                    buffered.extend_from_slice(data);
                }
            },
            Some(Err(e)) => return BodyPrefix::Failed(buffered.freeze(), e),
            None => return BodyPrefix::Complete(buffered.freeze()),
        }
    }

    if body.is_end_stream() {
        BodyPrefix::Complete(buffered.freeze())
    } else {
        BodyPrefix::Partial(buffered.freeze(), body)
    }
}

fn complete<F: FnOnce(Bytes)>(on_complete: &mut Option<F>, captured: &mut BytesMut) {
    if let Some(callback) = on_complete.take() {
        callback(captured.split().freeze());
    }
}

// ============================================================================
// Field extraction
// ============================================================================

/// Percent-decode a request path and make sure it is rooted. Invalid encodings
/// are kept verbatim.
pub fn normalize_path(raw: &str) -> String {
    let path = raw.split('?').next().unwrap_or_default();
    let decoded = urlencoding::decode(path)
        .map(|p| p.into_owned())
        .unwrap_or_else(|_| path.to_string());

    if decoded.starts_with('/') {
        decoded
    } else {
        format!("/{decoded}")
    }
}

/// First value wins for repeated keys
fn query_params(query: Option<&str>) -> BTreeMap<String, String> {
    let mut params = BTreeMap::new();
    if let Some(query) = query {
        for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
            params.entry(key.into_owned()).or_insert_with(|| value.into_owned());
        }
    }
    params
}

fn serialize_headers(headers: &HeaderMap, redact: &[HeaderName]) -> String {
    let mut map: BTreeMap<&str, Vec<String>> = BTreeMap::new();
    for (name, value) in headers {
        let value = if redact.contains(name) {
            REDACTED.to_string()
        } else {
            String::from_utf8_lossy(value.as_bytes()).into_owned()
        };
        map.entry(name.as_str()).or_default().push(value);
    }
    serde_json::to_string(&map).unwrap_or_else(|_| "{}".to_string())
}

fn body_text(bytes: &[u8], limit: usize) -> String {
    String::from_utf8_lossy(&bytes[..bytes.len().min(limit)]).into_owned()
}

fn resolve_username(parts: &request::Parts, config: &CaptureConfig) -> String {
    if let Some(AuthenticatedUser(name)) = parts.extensions.get::<AuthenticatedUser>() {
        if !name.is_empty() {
            return name.clone();
        }
    }

    config
        .identity_header
        .as_ref()
        .and_then(|header| parts.headers.get(header))
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map_or_else(|| VISITOR.to_string(), str::to_string)
}

fn resolve_client_ip(parts: &request::Parts) -> String {
    parts
        .extensions
        .get::<ConnectInfo<SocketAddr>>()
        .map_or_else(|| UNKNOWN_CLIENT_IP.to_string(), |ConnectInfo(addr)| addr.ip().to_string())
}
