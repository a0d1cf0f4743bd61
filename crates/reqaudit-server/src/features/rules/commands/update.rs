//! Update match rule command

use serde::{Deserialize, Serialize};

use crate::audit::{MatchRule, MatchRuleSpec};
use crate::features::shared::validation::{validate_pattern, PatternValidationError};
use crate::store::{ExtensionClient, Spec, StoreError};

/// Replaces the pattern and flags of an existing rule. The rule id and name
/// never change.
///
/// `resourceVersion` is optional; when present it must equal the stored
/// `metadata.version` or the update is rejected as a conflict.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateRuleCommand {
    #[serde(skip)]
    pub name: String,
    #[serde(alias = "rule")]
    pub pattern: String,
    pub is_include: bool,
    #[serde(default)]
    pub version: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_version: Option<i64>,
}

#[derive(Debug, thiserror::Error)]
pub enum UpdateRuleError {
    #[error("Rule name is required")]
    NameRequired,

    #[error("Pattern validation failed: {0}")]
    PatternValidation(#[from] PatternValidationError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

impl UpdateRuleCommand {
    pub fn validate(&self) -> Result<(), UpdateRuleError> {
        if self.name.trim().is_empty() {
            return Err(UpdateRuleError::NameRequired);
        }
        validate_pattern(&self.pattern)?;
        Ok(())
    }
}

#[tracing::instrument(skip(client, command), fields(name = %command.name))]
pub async fn handle(client: &ExtensionClient, command: UpdateRuleCommand) -> Result<MatchRule, UpdateRuleError> {
    command.validate()?;

    let mut existing = client
        .fetch::<MatchRuleSpec>(&command.name)
        .await?
        .filter(|rule| !rule.is_deleted())
        .ok_or_else(|| StoreError::not_found(MatchRuleSpec::KIND, &command.name))?;

    if let Some(resource_version) = command.resource_version {
        existing.metadata.version = resource_version;
    }
    existing.spec.pattern = command.pattern;
    existing.spec.is_include = command.is_include;
    existing.spec.version = command.version;

    let updated = client.update(existing).await?;
    tracing::info!(rule_id = updated.spec.id, "Match rule updated");
    Ok(updated)
}
