//! List active match rules

use serde::{Deserialize, Serialize};

use crate::audit::{list_active_rules, MatchRule};
use crate::store::{ExtensionClient, StoreError};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListRulesResponse {
    pub items: Vec<MatchRule>,
    /// Generation of the snapshot the audit layer currently uses, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generation: Option<u64>,
}

#[derive(Debug, thiserror::Error)]
pub enum ListRulesError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

#[tracing::instrument(skip(client))]
pub async fn handle(client: &ExtensionClient) -> Result<Vec<MatchRule>, ListRulesError> {
    let rules = list_active_rules(client).await?;
    tracing::debug!(count = rules.len(), "Listed match rules");
    Ok(rules)
}
