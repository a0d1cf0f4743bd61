//! Audit middleware
//!
//! Requests whose path matches the active rule set are captured and, once the
//! response body has been fully sent, written to the store as a log record:
//! - Unmatched requests pass straight through
//! - The handler sees the request body exactly as the client sent it
//! - The client sees the response exactly as the handler produced it
//! - Writes run on a detached task with a deadline and never affect the response

use std::{
    future::Future,
    pin::Pin,
    sync::Arc,
    task::{Context, Poll},
    time::Duration,
};

use axum::{body::Body, extract::Request, response::Response};
use bytes::Bytes;
use http_body::Body as _;
use tower::{Layer, Service};
use tracing::{debug, error, warn};

use super::{
    capture::{normalize_path, CaptureBody, CaptureConfig, RequestSnapshot, ResponseSnapshot},
    matcher::PathMatcher,
    models::{LogRecord, LogRecordSpec},
};
use crate::store::ExtensionClient;

pub const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_millis(5000);

/// Persists finished log records without blocking the caller
#[derive(Debug, Clone)]
pub struct RecordWriter {
    client: ExtensionClient,
    timeout: Duration,
}

impl RecordWriter {
    pub fn new(client: ExtensionClient, timeout: Duration) -> Self {
        Self { client, timeout }
    }

    pub fn spawn_write(&self, record: LogRecordSpec) {
        let client = self.client.clone();
        let timeout = self.timeout;

        tokio::spawn(async move {
            let record: LogRecord = record.into_record();
            let path = record.spec.path.clone();

            match tokio::time::timeout(timeout, client.create(record)).await {
                Ok(Ok(saved)) => {
                    debug!(
                        record_id = %saved.name(),
                        path = %saved.spec.path,
                        status = %saved.spec.response_status,
                        "Request log record created"
                    );
                },
                Ok(Err(e)) => {
                    error!(error = %e, path = %path, "Failed to create request log record");
                },
                Err(_) => {
                    warn!(
                        timeout_ms = timeout.as_millis() as u64,
                        path = %path,
                        "Timed out creating request log record"
                    );
                },
            }
        });
    }
}

#[derive(Clone)]
pub struct AuditLayer {
    matcher: Arc<PathMatcher>,
    writer: RecordWriter,
    config: Arc<CaptureConfig>,
}

impl AuditLayer {
    pub fn new(matcher: Arc<PathMatcher>, writer: RecordWriter, config: CaptureConfig) -> Self {
        Self {
            matcher,
            writer,
            config: Arc::new(config),
        }
    }
}

impl<S> Layer<S> for AuditLayer {
    type Service = AuditMiddleware<S>;

    fn layer(&self, inner: S) -> Self::Service {
        AuditMiddleware {
            inner,
            matcher: self.matcher.clone(),
            writer: self.writer.clone(),
            config: self.config.clone(),
        }
    }
}

#[derive(Clone)]
pub struct AuditMiddleware<S> {
    inner: S,
    matcher: Arc<PathMatcher>,
    writer: RecordWriter,
    config: Arc<CaptureConfig>,
}

impl<S> Service<Request> for AuditMiddleware<S>
where
    S: Service<Request, Response = Response> + Clone + Send + 'static,
    S::Future: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, request: Request) -> Self::Future {
        // the clone may not be ready; keep the one poll_ready was called on
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);
        let matcher = self.matcher.clone();
        let writer = self.writer.clone();
        let config = self.config.clone();

        Box::pin(async move {
            let path = normalize_path(request.uri().path());
            if !matcher.matches(&path).await {
                return inner.call(request).await;
            }

            let (request, snapshot) = RequestSnapshot::capture(request, &config).await;
            let response = inner.call(request).await?;

            let (parts, body) = response.into_parts();
            let response_snapshot = ResponseSnapshot::from_parts(&parts, &config);
            let limit = config.max_body_bytes;

            let finish = move |captured: Bytes| {
                writer.spawn_write(snapshot.into_record(response_snapshot, &captured, limit));
            };

            let body = if body.is_end_stream() {
                finish(Bytes::new());
                body
            } else {
                Body::new(CaptureBody::new(body, limit, finish))
            };

            Ok(Response::from_parts(parts, body))
        })
    }
}
