//! Search recorded requests
//!
//! Each list filter is a set membership test; the lists combine with AND.
//! Results come newest first.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::audit::{models::fields, LogRecordSpec};
use crate::features::shared::pagination::{PaginationMetadata, PaginationParams};
use crate::store::{model::format_timestamp, CompareOp, ExtensionClient, ListOptions, Query, Sort, StoreError};

/// ```json
/// {
///   "usernames": ["alice"],
///   "paths": ["/api/test"],
///   "accessFrom": "2026-01-01T00:00:00Z",
///   "accessTo": "2026-01-31T23:59:59Z",
///   "page": 1,
///   "perPage": 20
/// }
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchLogsQuery {
    #[serde(default)]
    pub usernames: Vec<String>,
    #[serde(default)]
    pub client_ips: Vec<String>,
    #[serde(default)]
    pub paths: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_from: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_to: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub pagination: PaginationParams,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchLogsResponse {
    pub items: Vec<LogRecordSpec>,
    pub pagination: PaginationMetadata,
}

#[derive(Debug, thiserror::Error)]
pub enum SearchLogsError {
    #[error("{0}")]
    Pagination(&'static str),

    #[error("accessFrom must not be after accessTo")]
    InvertedRange,

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

impl SearchLogsQuery {
    pub fn validate(&self) -> Result<(), SearchLogsError> {
        self.pagination.validate().map_err(SearchLogsError::Pagination)?;
        if let (Some(from), Some(to)) = (self.access_from, self.access_to) {
            if from > to {
                return Err(SearchLogsError::InvertedRange);
            }
        }
        Ok(())
    }

    /// Store filter for this search; soft-deleted records never match
    pub fn list_options(&self) -> ListOptions {
        let mut options = ListOptions::filter(Query::not_deleted());

        for (field, values) in [
            (fields::USERNAME, &self.usernames),
            (fields::CLIENT_IP, &self.client_ips),
            (fields::PATH, &self.paths),
        ] {
            if !values.is_empty() {
                options = options.and_query(Query::in_set(field, values.iter().cloned()));
            }
        }

        let range = match (self.access_from, self.access_to) {
            (Some(from), Some(to)) => Some(Query::between(
                fields::ACCESS_TIME,
                format_timestamp(&from),
                format_timestamp(&to),
            )),
            (Some(from), None) => Some(Query::compare(fields::ACCESS_TIME, CompareOp::Ge, format_timestamp(&from))),
            (None, Some(to)) => Some(Query::compare(fields::ACCESS_TIME, CompareOp::Le, format_timestamp(&to))),
            (None, None) => None,
        };
        if let Some(range) = range {
            options = options.and_query(range);
        }

        options
    }
}

#[tracing::instrument(
    skip(client, query),
    fields(page = query.pagination.page(), per_page = query.pagination.per_page())
)]
pub async fn handle(client: &ExtensionClient, query: SearchLogsQuery) -> Result<SearchLogsResponse, SearchLogsError> {
    query.validate()?;

    let page = query.pagination.page_request(Sort::desc(fields::ACCESS_TIME));
    let result = client.list_by::<LogRecordSpec>(&query.list_options(), &page).await?;

    let pagination = PaginationMetadata::from_result(&result);
    tracing::debug!(count = result.items.len(), total = result.total, "Log records searched");

    Ok(SearchLogsResponse {
        items: result.items.into_iter().map(|record| record.spec).collect(),
        pagination,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::shared::test_helpers::{test_state, TestLogRecord};
    use chrono::Duration;

    #[tokio::test]
    async fn test_newest_first_with_paging() {
        let state = test_state();
        let now = Utc::now();
        for hours in [3, 1, 2] {
            TestLogRecord::new("alice", &format!("/api/{hours}"))
                .at(now - Duration::hours(hours))
                .insert(&state.client)
                .await;
        }

        let query = SearchLogsQuery {
            pagination: PaginationParams::new(Some(1), Some(2)),
            ..Default::default()
        };
        let response = handle(&state.client, query).await.unwrap();

        let paths: Vec<&str> = response.items.iter().map(|record| record.path.as_str()).collect();
        assert_eq!(paths, vec!["/api/1", "/api/2"]);
        assert_eq!(response.pagination.total, 3);
        assert_eq!(response.pagination.pages, 2);
        assert!(response.pagination.has_next);
    }

    #[tokio::test]
    async fn test_filters_combine() {
        let state = test_state();
        TestLogRecord::new("alice", "/api/a").client_ip("10.0.0.1").insert(&state.client).await;
        TestLogRecord::new("bob", "/api/a").client_ip("10.0.0.2").insert(&state.client).await;
        TestLogRecord::new("carol", "/api/b").client_ip("10.0.0.1").insert(&state.client).await;

        let query = SearchLogsQuery {
            usernames: vec!["alice".to_string(), "carol".to_string()],
            paths: vec!["/api/a".to_string()],
            ..Default::default()
        };
        let response = handle(&state.client, query).await.unwrap();
        assert_eq!(response.items.len(), 1);
        assert_eq!(response.items[0].username, "alice");
    }

    #[tokio::test]
    async fn test_access_time_range_is_inclusive() {
        let state = test_state();
        let now = Utc::now();
        let old = TestLogRecord::new("alice", "/old").days_ago(10).insert(&state.client).await;
        let edge = TestLogRecord::new("alice", "/edge").at(now - Duration::days(2)).insert(&state.client).await;
        TestLogRecord::new("alice", "/new").insert(&state.client).await;

        let query = SearchLogsQuery {
            access_from: Some(edge.spec.access_time),
            access_to: Some(now - Duration::days(1)),
            ..Default::default()
        };
        let response = handle(&state.client, query).await.unwrap();
        let paths: Vec<&str> = response.items.iter().map(|record| record.path.as_str()).collect();
        assert_eq!(paths, vec!["/edge"]);

        let query = SearchLogsQuery {
            access_to: Some(old.spec.access_time),
            ..Default::default()
        };
        assert_eq!(handle(&state.client, query).await.unwrap().items.len(), 1);
    }

    #[tokio::test]
    async fn test_deleted_records_are_hidden() {
        let state = test_state();
        let record = TestLogRecord::new("alice", "/api/a").insert(&state.client).await;
        TestLogRecord::new("alice", "/api/b").insert(&state.client).await;
        state.client.delete::<LogRecordSpec>(record.name()).await.unwrap();

        let response = handle(&state.client, SearchLogsQuery::default()).await.unwrap();
        assert_eq!(response.pagination.total, 1);
        assert_eq!(response.items[0].path, "/api/b");
    }

    #[tokio::test]
    async fn test_inverted_range_rejected() {
        let state = test_state();
        let now = Utc::now();
        let query = SearchLogsQuery {
            access_from: Some(now),
            access_to: Some(now - Duration::hours(1)),
            ..Default::default()
        };
        assert!(matches!(
            handle(&state.client, query).await,
            Err(SearchLogsError::InvertedRange)
        ));
    }
}
