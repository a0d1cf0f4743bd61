//! Create match rule command

use serde::{Deserialize, Serialize};

use super::next_rule_id;
use crate::audit::{MatchRule, MatchRuleSpec};
use crate::features::shared::validation::{validate_pattern, PatternValidationError};
use crate::store::{Extension, ExtensionClient, StoreError};

/// Attempts before giving up on a contended id
const MAX_ID_ATTEMPTS: usize = 5;

/// Command to create a new match rule
///
/// ```json
/// { "pattern": "/api/**", "isInclude": true, "version": 0 }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRuleCommand {
    #[serde(alias = "rule")]
    pub pattern: String,
    pub is_include: bool,
    #[serde(default)]
    pub version: i64,
}

#[derive(Debug, thiserror::Error)]
pub enum CreateRuleError {
    #[error("Pattern validation failed: {0}")]
    PatternValidation(#[from] PatternValidationError),

    #[error("Could not allocate a rule id after {0} attempts")]
    IdContention(usize),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

impl CreateRuleCommand {
    pub fn validate(&self) -> Result<(), CreateRuleError> {
        validate_pattern(&self.pattern)?;
        Ok(())
    }
}

/// Stores a new rule under the next free id. The caller refreshes the matcher.
#[tracing::instrument(skip(client, command), fields(pattern = %command.pattern, is_include = command.is_include))]
pub async fn handle(client: &ExtensionClient, command: CreateRuleCommand) -> Result<MatchRule, CreateRuleError> {
    command.validate()?;

    for _ in 0..MAX_ID_ATTEMPTS {
        let id = next_rule_id(client).await?;
        let rule = Extension::new(
            id.to_string(),
            MatchRuleSpec {
                id,
                pattern: command.pattern.clone(),
                is_include: command.is_include,
                version: command.version,
            },
        );

        match client.create(rule).await {
            Ok(created) => {
                tracing::info!(rule_id = id, "Match rule created");
                return Ok(created);
            },
            Err(StoreError::AlreadyExists { .. }) => {
                tracing::debug!(rule_id = id, "Rule id taken concurrently, retrying");
            },
            Err(e) => return Err(e.into()),
        }
    }

    Err(CreateRuleError::IdContention(MAX_ID_ATTEMPTS))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::shared::test_helpers::{insert_rule, test_state};

    fn command(pattern: &str) -> CreateRuleCommand {
        CreateRuleCommand {
            pattern: pattern.to_string(),
            is_include: true,
            version: 0,
        }
    }

    #[tokio::test]
    async fn test_assigns_sequential_ids() {
        let state = test_state();

        let first = handle(&state.client, command("/api/**")).await.unwrap();
        let second = handle(&state.client, command("/apis/**")).await.unwrap();

        assert_eq!(first.spec.id, 1);
        assert_eq!(first.name(), "1");
        assert_eq!(second.spec.id, 2);
        assert_eq!(first.metadata.version, 1);
    }

    #[tokio::test]
    async fn test_ids_are_not_reused_after_delete() {
        let state = test_state();
        insert_rule(&state.client, 4, "/old/**", true).await;
        state.client.delete::<MatchRuleSpec>("4").await.unwrap();

        let created = handle(&state.client, command("/new/**")).await.unwrap();
        assert_eq!(created.spec.id, 5);
    }

    #[tokio::test]
    async fn test_rejects_blank_pattern() {
        let state = test_state();
        let result = handle(&state.client, command("  ")).await;
        assert!(matches!(result, Err(CreateRuleError::PatternValidation(_))));
    }
}
