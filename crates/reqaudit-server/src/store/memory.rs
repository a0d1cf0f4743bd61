//! In-process document store

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use super::{
    error::{StoreError, StoreResult},
    model::{Document, ListResult},
    query::{ListOptions, PageRequest, Sort},
    DocumentStore,
};

type Key = (String, String);

#[derive(Debug, Default)]
pub struct MemoryStore {
    documents: RwLock<BTreeMap<Key, Document>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn key(kind: &str, name: &str) -> Key {
        (kind.to_string(), name.to_string())
    }

    async fn collect(&self, kind: &str, options: &ListOptions, sort: &Sort) -> Vec<Document> {
        let documents = self.documents.read().await;
        let mut matched: Vec<Document> = documents
            .range(Self::key(kind, "")..)
            .take_while(|((k, _), _)| k == kind)
            .map(|(_, doc)| doc)
            .filter(|doc| options.matches(doc))
            .cloned()
            .collect();
        // stable sort keeps name order for ties
        matched.sort_by(|a, b| sort.compare(a, b));
        matched
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn list(&self, kind: &str, options: &ListOptions, sort: &Sort) -> StoreResult<Vec<Document>> {
        Ok(self.collect(kind, options, sort).await)
    }

    async fn list_page(
        &self,
        kind: &str,
        options: &ListOptions,
        page: &PageRequest,
    ) -> StoreResult<ListResult<Document>> {
        let matched = self.collect(kind, options, &page.sort).await;
        let total = matched.len() as u64;
        let items = matched
            .into_iter()
            .skip(usize::try_from(page.offset()).unwrap_or(usize::MAX))
            .take(usize::try_from(page.size).unwrap_or(usize::MAX))
            .collect();

        Ok(ListResult {
            page: page.page,
            size: page.size,
            total,
            items,
        })
    }

    async fn fetch(&self, kind: &str, name: &str) -> StoreResult<Option<Document>> {
        Ok(self.documents.read().await.get(&Self::key(kind, name)).cloned())
    }

    async fn create(&self, mut document: Document) -> StoreResult<Document> {
        let mut documents = self.documents.write().await;
        let key = Self::key(&document.kind, &document.metadata.name);
        if documents.contains_key(&key) {
            return Err(StoreError::already_exists(&document.kind, &document.metadata.name));
        }

        document.metadata.version = 1;
        document.metadata.creation_timestamp = Some(Utc::now());
        document.metadata.deletion_timestamp = None;
        documents.insert(key, document.clone());
        Ok(document)
    }

    async fn update(&self, document: Document) -> StoreResult<Document> {
        let mut documents = self.documents.write().await;
        let key = Self::key(&document.kind, &document.metadata.name);
        let stored = documents
            .get_mut(&key)
            .filter(|stored| !stored.metadata.is_deleted())
            .ok_or_else(|| StoreError::not_found(&document.kind, &document.metadata.name))?;

        if stored.metadata.version != document.metadata.version {
            return Err(StoreError::Conflict {
                kind: document.kind,
                name: document.metadata.name,
                expected: document.metadata.version,
                actual: stored.metadata.version,
            });
        }

        stored.metadata.version += 1;
        stored.spec = document.spec;
        Ok(stored.clone())
    }

    async fn delete(&self, kind: &str, name: &str) -> StoreResult<Document> {
        let mut documents = self.documents.write().await;
        let stored = documents
            .get_mut(&Self::key(kind, name))
            .ok_or_else(|| StoreError::not_found(kind, name))?;

        if !stored.metadata.is_deleted() {
            stored.metadata.deletion_timestamp = Some(Utc::now());
            stored.metadata.version += 1;
        }
        Ok(stored.clone())
    }

    async fn reclaim(&self, kind: &str, deleted_before: DateTime<Utc>) -> StoreResult<u64> {
        let mut documents = self.documents.write().await;
        let before = documents.len();
        documents.retain(|(k, _), doc| {
            k != kind
                || doc
                    .metadata
                    .deletion_timestamp
                    .map_or(true, |at| at >= deleted_before)
        });
        Ok((before - documents.len()) as u64)
    }
}
