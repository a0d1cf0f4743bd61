//! Document store
//!
//! Every persisted entity (match rules, log records, the retention setting) is
//! a named document of some kind with a JSON spec. Two backends implement
//! [`DocumentStore`]: an in-process map for tests and single-node setups, and
//! PostgreSQL. Handlers go through the typed [`ExtensionClient`].
//!
//! Deletes are soft: the store stamps `metadata.deletionTimestamp` and keeps
//! the document until [`DocumentStore::reclaim`] removes it physically.

pub mod client;
pub mod error;
pub mod memory;
pub mod model;
pub mod postgres;
pub mod query;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

pub use client::ExtensionClient;
pub use error::{StoreError, StoreResult};
pub use memory::MemoryStore;
pub use model::{Document, Extension, ListResult, Metadata, Spec};
pub use postgres::PgStore;
pub use query::{CompareOp, Direction, ListOptions, PageRequest, Query, Sort};

#[async_trait]
pub trait DocumentStore: Send + Sync + 'static {
    /// All documents of `kind` matching `options`, soft-deleted ones included
    /// unless the filter excludes them.
    async fn list(&self, kind: &str, options: &ListOptions, sort: &Sort) -> StoreResult<Vec<Document>>;

    async fn list_page(
        &self,
        kind: &str,
        options: &ListOptions,
        page: &PageRequest,
    ) -> StoreResult<ListResult<Document>>;

    /// Fetch by name. Soft-deleted documents are still returned.
    async fn fetch(&self, kind: &str, name: &str) -> StoreResult<Option<Document>>;

    /// Insert a new document. Sets version 1 and the creation timestamp.
    async fn create(&self, document: Document) -> StoreResult<Document>;

    /// Replace the spec of a live document. `document.metadata.version` must
    /// equal the stored version.
    async fn update(&self, document: Document) -> StoreResult<Document>;

    /// Mark a document deleted. Deleting an already deleted document is a no-op.
    async fn delete(&self, kind: &str, name: &str) -> StoreResult<Document>;

    /// Physically remove documents soft-deleted before `deleted_before`
    async fn reclaim(&self, kind: &str, deleted_before: DateTime<Utc>) -> StoreResult<u64>;

    /// Cheap liveness probe
    async fn health_check(&self) -> StoreResult<()> {
        Ok(())
    }
}
