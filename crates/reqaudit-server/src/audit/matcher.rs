//! Rule matching against request paths
//!
//! [`PathMatcher`] holds the current [`RuleSet`] behind a `watch` channel.
//! Readers clone the `Arc` and never wait on a refresh in progress; a refresh
//! builds a new set off to the side and publishes it in one step.

use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};

use tokio::sync::watch;
use tracing::{debug, warn};

use super::{
    models::{fields, MatchRule, MatchRuleSpec},
    pattern::AntPattern,
};
use crate::store::{ExtensionClient, ListOptions, Query, Sort, StoreResult};

/// Exclude injected when no include rule exists
pub const CATCH_ALL: &str = "/**";

/// Immutable partition of the active rules
#[derive(Debug, Clone)]
pub struct RuleSet {
    generation: u64,
    includes: Vec<AntPattern>,
    excludes: Vec<AntPattern>,
}

impl RuleSet {
    pub fn compile<'a>(rules: impl IntoIterator<Item = &'a MatchRuleSpec>, generation: u64) -> Self {
        let (includes, excludes): (Vec<_>, Vec<_>) = rules.into_iter().partition(|rule| rule.is_include);

        let includes: Vec<AntPattern> = includes.iter().map(|r| AntPattern::new(&r.pattern)).collect();
        let mut excludes: Vec<AntPattern> = excludes.iter().map(|r| AntPattern::new(&r.pattern)).collect();

        if includes.is_empty() {
            excludes.push(AntPattern::new(CATCH_ALL));
        }

        Self {
            generation,
            includes,
            excludes,
        }
    }

    pub fn matches(&self, path: &str) -> bool {
        self.includes.iter().any(|p| p.matches(path)) && !self.excludes.iter().any(|p| p.matches(path))
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn includes(&self) -> impl Iterator<Item = &str> {
        self.includes.iter().map(AntPattern::as_str)
    }

    pub fn excludes(&self) -> impl Iterator<Item = &str> {
        self.excludes.iter().map(AntPattern::as_str)
    }
}

/// Active (not soft-deleted) rules in id order
pub async fn list_active_rules(client: &ExtensionClient) -> StoreResult<Vec<MatchRule>> {
    client
        .list_all::<MatchRuleSpec>(&ListOptions::filter(Query::not_deleted()), &Sort::asc(fields::ID))
        .await
}

pub struct PathMatcher {
    client: ExtensionClient,
    snapshot: watch::Sender<Option<Arc<RuleSet>>>,
    generations: AtomicU64,
}

impl std::fmt::Debug for PathMatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PathMatcher")
            .field("generation", &self.snapshot().map(|set| set.generation()))
            .finish_non_exhaustive()
    }
}

impl PathMatcher {
    pub fn new(client: ExtensionClient) -> Self {
        let (snapshot, _) = watch::channel(None);
        Self {
            client,
            snapshot,
            generations: AtomicU64::new(0),
        }
    }

    /// Current snapshot, if any refresh has completed
    pub fn snapshot(&self) -> Option<Arc<RuleSet>> {
        self.snapshot.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<Arc<RuleSet>>> {
        self.snapshot.subscribe()
    }

    /// Rebuild the rule set from the store. On error the previous snapshot
    /// stays in place.
    #[tracing::instrument(skip(self))]
    pub async fn refresh(&self) -> StoreResult<Arc<RuleSet>> {
        // taken before the read so a slower, older refresh loses to a newer one
        let generation = self.generations.fetch_add(1, Ordering::SeqCst) + 1;

        let rules = list_active_rules(&self.client).await?;
        let candidate = Arc::new(RuleSet::compile(rules.iter().map(|r| &r.spec), generation));

        let mut published = candidate.clone();
        self.snapshot.send_if_modified(|current| match current {
            Some(existing) if existing.generation() > generation => {
                published = existing.clone();
                false
            },
            _ => {
                *current = Some(candidate);
                true
            },
        });

        debug!(
            generation = published.generation(),
            includes = published.includes.len(),
            excludes = published.excludes.len(),
            "Rule set refreshed"
        );

        Ok(published)
    }

    /// Whether a request to `path` should be audited. Triggers a refresh when
    /// no snapshot exists yet and answers false if that refresh fails.
    pub async fn matches(&self, path: &str) -> bool {
        let rules = match self.snapshot() {
            Some(rules) => rules,
            None => match self.refresh().await {
                Ok(rules) => rules,
                Err(e) => {
                    warn!(error = %e, path, "No rule set available, request not audited");
                    return false;
                },
            },
        };
        rules.matches(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{Document, DocumentStore, Extension, ListResult, MemoryStore, PageRequest, StoreError};
    use async_trait::async_trait;
    use chrono::{DateTime, Utc};
    use std::sync::atomic::AtomicBool;

    /// Memory store whose reads can be switched off
    #[derive(Default)]
    struct FailingList {
        inner: MemoryStore,
        down: AtomicBool,
    }

    impl FailingList {
        fn set_down(&self, down: bool) {
            self.down.store(down, Ordering::SeqCst);
        }

        fn check(&self) -> StoreResult<()> {
            if self.down.load(Ordering::SeqCst) {
                return Err(StoreError::Unavailable("connection refused".to_string()));
            }
            Ok(())
        }
    }

    #[async_trait]
    impl DocumentStore for FailingList {
        async fn list(&self, kind: &str, options: &ListOptions, sort: &Sort) -> StoreResult<Vec<Document>> {
            self.check()?;
            self.inner.list(kind, options, sort).await
        }

        async fn list_page(
            &self,
            kind: &str,
            options: &ListOptions,
            page: &PageRequest,
        ) -> StoreResult<ListResult<Document>> {
            self.check()?;
            self.inner.list_page(kind, options, page).await
        }

        async fn fetch(&self, kind: &str, name: &str) -> StoreResult<Option<Document>> {
            self.inner.fetch(kind, name).await
        }

        async fn create(&self, document: Document) -> StoreResult<Document> {
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

    fn rule(id: i64, pattern: &str, is_include: bool) -> MatchRuleSpec {
        MatchRuleSpec {
            id,
            pattern: pattern.to_string(),
            is_include,
            version: 0,
        }
    }

    async fn seed(client: &ExtensionClient, rules: Vec<MatchRuleSpec>) {
        for spec in rules {
            client
                .create(Extension::new(spec.id.to_string(), spec))
                .await
                .unwrap();
        }
    }

    #[test]
    fn test_empty_includes_match_nothing() {
        let set = RuleSet::compile(&[rule(1, "/admin/**", false)], 1);
        assert_eq!(set.excludes().collect::<Vec<_>>(), vec!["/admin/**", CATCH_ALL]);
        for path in ["/", "/api/test", "/admin/x", "/anything/else"] {
            assert!(!set.matches(path), "{path} should not match");
        }

        let empty = RuleSet::compile(std::iter::empty(), 1);
        assert!(!empty.matches("/api"));
    }

    #[test]
    fn test_exclude_wins_over_include() {
        let set = RuleSet::compile(
            &[rule(1, "/api/**", true), rule(2, "/api/health", false)],
            1,
        );
        assert!(set.matches("/api/users"));
        assert!(!set.matches("/api/health"));
        assert!(!set.matches("/other"));
    }

    #[tokio::test]
    async fn test_lazy_refresh_on_first_match() {
        let client = ExtensionClient::new(Arc::new(MemoryStore::new()));
        seed(&client, vec![rule(1, "/api/**", true)]).await;

        let matcher = PathMatcher::new(client);
        assert!(matcher.snapshot().is_none());
        assert!(matcher.matches("/api/test").await);
        assert!(matcher.snapshot().is_some());
    }

    #[tokio::test]
    async fn test_refresh_is_idempotent() {
        let client = ExtensionClient::new(Arc::new(MemoryStore::new()));
        seed(&client, vec![rule(1, "/api/**", true), rule(2, "/api/internal/**", false)]).await;
        let matcher = PathMatcher::new(client);

        let first = matcher.refresh().await.unwrap();
        let second = matcher.refresh().await.unwrap();

        assert_eq!(first.includes().collect::<Vec<_>>(), second.includes().collect::<Vec<_>>());
        assert_eq!(first.excludes().collect::<Vec<_>>(), second.excludes().collect::<Vec<_>>());
        assert!(second.generation() > first.generation());
    }

    #[tokio::test]
    async fn test_refresh_ignores_deleted_rules() {
        let store = Arc::new(MemoryStore::new());
        let client = ExtensionClient::new(store.clone());
        seed(&client, vec![rule(1, "/api/**", true), rule(2, "/api/secret", false)]).await;
        store.delete("MatchRule", "2").await.unwrap();

        let matcher = PathMatcher::new(client);
        let set = matcher.refresh().await.unwrap();
        assert!(set.matches("/api/secret"));
    }

    #[tokio::test]
    async fn test_published_snapshot_never_goes_backwards() {
        let client = ExtensionClient::new(Arc::new(MemoryStore::new()));
        let matcher = PathMatcher::new(client);

        // simulate a newer refresh that has already published
        let newer = Arc::new(RuleSet::compile(&[rule(1, "/new/**", true)], 10));
        matcher.snapshot.send_replace(Some(newer));
        matcher.generations.store(10, Ordering::SeqCst);

        let published = matcher.refresh().await.unwrap();
        assert_eq!(published.generation(), 11);

        matcher.generations.store(3, Ordering::SeqCst);
        let stale = matcher.refresh().await.unwrap();
        assert_eq!(stale.generation(), 11);
        assert_eq!(matcher.snapshot().unwrap().generation(), 11);
    }

    #[tokio::test]
    async fn test_failed_refresh_keeps_previous_snapshot() {
        let store = Arc::new(FailingList::default());
        let client = ExtensionClient::new(store.clone());
        seed(&client, vec![rule(1, "/api/**", true)]).await;

        let matcher = PathMatcher::new(client.clone());
        let loaded = matcher.refresh().await.unwrap();

        seed(&client, vec![rule(2, "/api/**", false)]).await;
        store.set_down(true);
        assert!(matcher.refresh().await.is_err());

        let current = matcher.snapshot().unwrap();
        assert_eq!(current.generation(), loaded.generation());
        assert!(matcher.matches("/api/users").await);
    }

    #[tokio::test]
    async fn test_no_snapshot_fails_closed() {
        let store = Arc::new(FailingList::default());
        let client = ExtensionClient::new(store.clone());
        seed(&client, vec![rule(1, "/api/**", true)]).await;
        store.set_down(true);

        let matcher = PathMatcher::new(client);
        assert!(!matcher.matches("/api/users").await);
        assert!(matcher.snapshot().is_none());

        // recovers lazily once the store is back
        store.set_down(false);
        assert!(matcher.matches("/api/users").await);
    }
}
