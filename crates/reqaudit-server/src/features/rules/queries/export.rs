//! Export active rules in the import file format

use crate::audit::list_active_rules;
use crate::features::rules::types::{RuleEntry, RuleFile};
use crate::store::{ExtensionClient, StoreError};

#[derive(Debug, thiserror::Error)]
pub enum ExportRulesError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

#[tracing::instrument(skip(client))]
pub async fn handle(client: &ExtensionClient) -> Result<RuleFile, ExportRulesError> {
    let rules = list_active_rules(client).await?;
    Ok(RuleFile {
        rules: rules.iter().map(|rule| RuleEntry::from(&rule.spec)).collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::MatchRuleSpec;
    use crate::features::rules::commands::import;
    use crate::features::shared::test_helpers::{insert_rule, test_state};

    #[tokio::test]
    async fn test_export_then_import_reproduces_rules() {
        let source = test_state();
        insert_rule(&source.client, 1, "/api/**", true).await;
        insert_rule(&source.client, 2, "/api/health", false).await;
        insert_rule(&source.client, 3, "/gone/**", true).await;
        source.client.delete::<MatchRuleSpec>("3").await.unwrap();

        let file = handle(&source.client).await.unwrap();
        assert_eq!(file.rules.len(), 2);
        assert_eq!(file.rules[0].pattern, "/api/**");

        let target = test_state();
        import::handle(&target.client, file.clone()).await.unwrap();
        assert_eq!(handle(&target.client).await.unwrap(), file);
    }
}
