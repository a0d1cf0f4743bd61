//! Test helpers and fixtures for feature tests
//!
//! Everything runs against the in-memory store, so no database is required.
//!
//! ```rust,ignore
//! let state = test_state();
//! let record = TestLogRecord::new("alice", "/api/test").days_ago(2).insert(&state.client).await;
//! ```

use std::{
    collections::BTreeMap,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use crate::audit::{LogRecord, LogRecordSpec, MatchRule, MatchRuleSpec, PathMatcher};
use crate::features::FeatureState;
use crate::store::{
    Document, DocumentStore, Extension, ExtensionClient, ListOptions, ListResult, MemoryStore, PageRequest, Sort,
    StoreError, StoreResult,
};

pub fn test_state() -> FeatureState {
    test_state_with_store(Arc::new(MemoryStore::new()))
}

pub fn test_state_with_store(store: Arc<dyn DocumentStore>) -> FeatureState {
    let client = ExtensionClient::new(store);
    let matcher = Arc::new(PathMatcher::new(client.clone()));
    FeatureState::new(client, matcher)
}

/// Memory store that accepts a fixed number of creates, then fails every
/// later one
pub struct FailAfterCreates {
    inner: MemoryStore,
    remaining: AtomicUsize,
}

impl FailAfterCreates {
    pub fn new(allowed: usize) -> Self {
        Self {
            inner: MemoryStore::new(),
            remaining: AtomicUsize::new(allowed),
        }
    }
}

#[async_trait]
impl DocumentStore for FailAfterCreates {
    async fn list(&self, kind: &str, options: &ListOptions, sort: &Sort) -> StoreResult<Vec<Document>> {
        self.inner.list(kind, options, sort).await
    }

    async fn list_page(&self, kind: &str, options: &ListOptions, page: &PageRequest) -> StoreResult<ListResult<Document>> {
        self.inner.list_page(kind, options, page).await
    }

    async fn fetch(&self, kind: &str, name: &str) -> StoreResult<Option<Document>> {
        self.inner.fetch(kind, name).await
    }

    async fn create(&self, document: Document) -> StoreResult<Document> {
        let allowed = self
            .remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();
        if !allowed {
            return Err(StoreError::Unavailable("write quota exhausted".to_string()));
        }
        self.inner.create(document).await
    }

    async fn update(&self, document: Document) -> StoreResult<Document> {
        self.inner.update(document).await
    }

    async fn delete(&self, kind: &str, name: &str) -> StoreResult<Document> {
        self.inner.delete(kind, name).await
    }

    async fn reclaim(&self, kind: &str, deleted_before: DateTime<Utc>) -> StoreResult<u64> {
        self.inner.reclaim(kind, deleted_before).await
    }
}

pub async fn insert_rule(client: &ExtensionClient, id: i64, pattern: &str, is_include: bool) -> MatchRule {
    client
        .create(Extension::new(
            id.to_string(),
            MatchRuleSpec {
                id,
                pattern: pattern.to_string(),
                is_include,
                version: 0,
            },
        ))
        .await
        .unwrap()
}

/// Builder for log records
#[derive(Debug, Clone)]
pub struct TestLogRecord {
    spec: LogRecordSpec,
}

impl TestLogRecord {
    pub fn new(username: &str, path: &str) -> Self {
        Self {
            spec: LogRecordSpec {
                id: Uuid::now_v7().to_string(),
                username: username.to_string(),
                client_ip: "10.0.0.1".to_string(),
                path: path.to_string(),
                method: "GET".to_string(),
                access_time: Utc::now(),
                request_headers: "{}".to_string(),
                request_body: String::new(),
                request_params: BTreeMap::new(),
                response_headers: "{}".to_string(),
                response_body: String::new(),
                response_status: "200".to_string(),
            },
        }
    }

    pub fn client_ip(mut self, client_ip: &str) -> Self {
        self.spec.client_ip = client_ip.to_string();
        self
    }

    pub fn at(mut self, access_time: DateTime<Utc>) -> Self {
        self.spec.access_time = access_time;
        self
    }

    pub fn days_ago(self, days: i64) -> Self {
        self.at(Utc::now() - Duration::days(days))
    }

    pub async fn insert(self, client: &ExtensionClient) -> LogRecord {
        client.create(self.spec.into_record()).await.unwrap()
    }
}
