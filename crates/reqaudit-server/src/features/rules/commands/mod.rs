pub mod create;
pub mod delete;
pub mod import;
pub mod update;

pub use create::{CreateRuleCommand, CreateRuleError};
pub use delete::{DeleteRuleCommand, DeleteRuleError, DeleteRuleResponse};
pub use import::{ImportRulesCommand, ImportRulesError, ImportRulesResponse};
pub use update::{UpdateRuleCommand, UpdateRuleError};

use crate::audit::MatchRuleSpec;
use crate::store::{ExtensionClient, ListOptions, Sort, StoreResult};

/// One past the highest id ever used, deleted rules included
pub(crate) async fn next_rule_id(client: &ExtensionClient) -> StoreResult<i64> {
    let rules = client
        .list_all::<MatchRuleSpec>(&ListOptions::new(), &Sort::unsorted())
        .await?;
    Ok(rules.iter().map(|rule| rule.spec.id).max().unwrap_or(0) + 1)
}
