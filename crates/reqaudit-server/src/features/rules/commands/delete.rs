//! Delete match rule command

use serde::{Deserialize, Serialize};

use crate::audit::MatchRuleSpec;
use crate::store::{ExtensionClient, StoreError};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteRuleCommand {
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteRuleResponse {
    pub name: String,
    pub deleted: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum DeleteRuleError {
    #[error("Rule name is required")]
    NameRequired,

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

impl DeleteRuleCommand {
    pub fn validate(&self) -> Result<(), DeleteRuleError> {
        if self.name.trim().is_empty() {
            return Err(DeleteRuleError::NameRequired);
        }
        Ok(())
    }
}

/// Soft-deletes a rule. Deleting an already deleted rule succeeds.
#[tracing::instrument(skip(client))]
pub async fn handle(
    client: &ExtensionClient,
    command: DeleteRuleCommand,
) -> Result<DeleteRuleResponse, DeleteRuleError> {
    command.validate()?;

    let deleted = client.delete::<MatchRuleSpec>(&command.name).await?;
    tracing::info!(rule_id = deleted.spec.id, "Match rule deleted");

    Ok(DeleteRuleResponse {
        name: command.name,
        deleted: true,
    })
}
