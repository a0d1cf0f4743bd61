//! Delete every live log record

use futures::{stream, StreamExt};
use serde::{Deserialize, Serialize};

use crate::audit::LogRecordSpec;
use crate::store::{ExtensionClient, ListOptions, Query, Sort, StoreError};

const DELETE_CONCURRENCY: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteAllLogsResponse {
    pub deleted: u64,
}

#[derive(Debug, thiserror::Error)]
pub enum DeleteAllLogsError {
    #[error("Deleted {deleted} records but {failed} failed; first error: {first}")]
    Partial {
        deleted: u64,
        failed: u64,
        first: StoreError,
    },

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

/// Soft-deletes all records. One failed delete does not stop the others;
/// failures are reported together at the end.
#[tracing::instrument(skip(client))]
pub async fn handle(client: &ExtensionClient) -> Result<DeleteAllLogsResponse, DeleteAllLogsError> {
    let records = client
        .list_all::<LogRecordSpec>(&ListOptions::filter(Query::not_deleted()), &Sort::unsorted())
        .await?;

    let results: Vec<Result<(), StoreError>> = stream::iter(records)
        .map(|record| async move {
            client.delete::<LogRecordSpec>(record.name()).await.map(|_| ())
        })
        .buffer_unordered(DELETE_CONCURRENCY)
        .collect()
        .await;

    let mut deleted = 0;
    let mut failed = 0;
    let mut first = None;
    for result in results {
        match result {
            Ok(()) => deleted += 1,
            Err(e) => {
                tracing::error!(error = %e, "Failed to delete log record");
                failed += 1;
                first.get_or_insert(e);
            },
        }
    }

    match first {
        None => {
            tracing::info!(deleted, "All log records deleted");
            Ok(DeleteAllLogsResponse { deleted })
        },
        Some(first) => Err(DeleteAllLogsError::Partial { deleted, failed, first }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::logs::queries::count;
    use crate::features::shared::test_helpers::{test_state, TestLogRecord};

    #[tokio::test]
    async fn test_deletes_everything_live() {
        let state = test_state();
        for path in ["/a", "/b", "/c"] {
            TestLogRecord::new("alice", path).insert(&state.client).await;
        }

        assert_eq!(handle(&state.client).await.unwrap().deleted, 3);
        assert_eq!(count::handle(&state.client).await.unwrap().count, 0);

        // nothing left to delete
        assert_eq!(handle(&state.client).await.unwrap().deleted, 0);
    }
}
