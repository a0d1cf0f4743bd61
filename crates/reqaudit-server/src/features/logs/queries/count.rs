//! Count live log records

use serde::{Deserialize, Serialize};

use crate::audit::LogRecordSpec;
use crate::store::{ExtensionClient, ListOptions, Sort, StoreError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountLogsResponse {
    pub count: u64,
}

#[derive(Debug, thiserror::Error)]
pub enum CountLogsError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

#[tracing::instrument(skip(client))]
pub async fn handle(client: &ExtensionClient) -> Result<CountLogsResponse, CountLogsError> {
    let records = client
        .list_all::<LogRecordSpec>(&ListOptions::new(), &Sort::unsorted())
        .await?;
    let count = records.iter().filter(|record| !record.is_deleted()).count() as u64;
    Ok(CountLogsResponse { count })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::shared::test_helpers::{test_state, TestLogRecord};

    #[tokio::test]
    async fn test_soft_deleted_records_are_not_counted() {
        let state = test_state();
        let deleted = TestLogRecord::new("alice", "/a").insert(&state.client).await;
        TestLogRecord::new("bob", "/b").insert(&state.client).await;
        state.client.delete::<LogRecordSpec>(deleted.name()).await.unwrap();

        assert_eq!(handle(&state.client).await.unwrap().count, 1);
    }

    #[tokio::test]
    async fn test_empty_store() {
        let state = test_state();
        assert_eq!(handle(&state.client).await.unwrap().count, 0);
    }
}
