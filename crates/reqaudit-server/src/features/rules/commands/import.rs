//! Import match rules from a rule file
//!
//! Every entry becomes a new rule with a freshly assigned id. Existing rules
//! are left alone, so importing the same file twice yields duplicates.

use serde::{Deserialize, Serialize};

use super::next_rule_id;
use crate::audit::{MatchRule, MatchRuleSpec};
use crate::features::rules::types::RuleFile;
use crate::features::shared::validation::{validate_pattern, PatternValidationError};
use crate::store::{Extension, ExtensionClient, StoreError};

pub type ImportRulesCommand = RuleFile;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportRulesResponse {
    pub imported: usize,
    pub rules: Vec<MatchRule>,
}

#[derive(Debug, thiserror::Error)]
pub enum ImportRulesError {
    #[error("Rule {index}: {source}")]
    PatternValidation {
        index: usize,
        #[source]
        source: PatternValidationError,
    },

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

impl RuleFile {
    /// The whole file is rejected if any entry is invalid
    pub fn validate(&self) -> Result<(), ImportRulesError> {
        for (index, entry) in self.rules.iter().enumerate() {
            validate_pattern(&entry.pattern)
                .map_err(|source| ImportRulesError::PatternValidation { index, source })?;
        }
        Ok(())
    }
}

#[tracing::instrument(skip(client, command), fields(count = command.rules.len()))]
pub async fn handle(
    client: &ExtensionClient,
    command: ImportRulesCommand,
) -> Result<ImportRulesResponse, ImportRulesError> {
    command.validate()?;

    let mut next_id = next_rule_id(client).await?;
    let mut rules = Vec::with_capacity(command.rules.len());

    for entry in command.rules {
        let rule = loop {
            let candidate = Extension::new(
                next_id.to_string(),
                MatchRuleSpec {
                    id: next_id,
                    pattern: entry.pattern.clone(),
                    is_include: entry.is_include,
                    version: entry.version,
                },
            );
            next_id += 1;

            match client.create(candidate).await {
                Ok(created) => break created,
                // a concurrent create took this id; move past it
                Err(StoreError::AlreadyExists { .. }) => continue,
                Err(e) => {
                    tracing::error!(imported = rules.len(), error = %e, "Rule import stopped");
                    return Err(e.into());
                },
            }
        };
        rules.push(rule);
    }

    tracing::info!(imported = rules.len(), "Match rules imported");
    Ok(ImportRulesResponse {
        imported: rules.len(),
        rules,
    })
}
