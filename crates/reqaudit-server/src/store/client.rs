use std::sync::Arc;

use chrono::{DateTime, Utc};

use super::{
    error::StoreResult,
    model::{Extension, ListResult, Spec},
    query::{ListOptions, PageRequest, Sort},
    DocumentStore,
};

/// Typed access to a [`DocumentStore`]
#[derive(Clone)]
pub struct ExtensionClient {
    store: Arc<dyn DocumentStore>,
}

impl std::fmt::Debug for ExtensionClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExtensionClient").finish_non_exhaustive()
    }
}

impl ExtensionClient {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.store
    }

    pub async fn list_all<S: Spec>(&self, options: &ListOptions, sort: &Sort) -> StoreResult<Vec<Extension<S>>> {
        self.store
            .list(S::KIND, options, sort)
            .await?
            .into_iter()
            .map(Extension::from_document)
            .collect()
    }

    pub async fn list_by<S: Spec>(
        &self,
        options: &ListOptions,
        page: &PageRequest,
    ) -> StoreResult<ListResult<Extension<S>>> {
        self.store
            .list_page(S::KIND, options, page)
            .await?
            .try_map(Extension::from_document)
    }

    pub async fn fetch<S: Spec>(&self, name: &str) -> StoreResult<Option<Extension<S>>> {
        self.store
            .fetch(S::KIND, name)
            .await?
            .map(Extension::from_document)
            .transpose()
    }

    pub async fn create<S: Spec>(&self, extension: Extension<S>) -> StoreResult<Extension<S>> {
        let created = self.store.create(extension.into_document()?).await?;
        Extension::from_document(created)
    }

    pub async fn update<S: Spec>(&self, extension: Extension<S>) -> StoreResult<Extension<S>> {
        let updated = self.store.update(extension.into_document()?).await?;
        Extension::from_document(updated)
    }

    pub async fn delete<S: Spec>(&self, name: &str) -> StoreResult<Extension<S>> {
        let deleted = self.store.delete(S::KIND, name).await?;
        Extension::from_document(deleted)
    }

    pub async fn reclaim<S: Spec>(&self, deleted_before: DateTime<Utc>) -> StoreResult<u64> {
        self.store.reclaim(S::KIND, deleted_before).await
    }
}
