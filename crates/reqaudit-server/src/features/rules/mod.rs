//! Match rule management
//!
//! Rules decide which request paths the audit layer records. Each rule has a
//! numeric id (also its document name), an Ant-style pattern and an
//! include/exclude flag.

pub mod commands;
pub mod queries;
pub mod routes;
pub mod types;

pub use commands::{
    CreateRuleCommand, CreateRuleError, DeleteRuleCommand, DeleteRuleError, DeleteRuleResponse,
    ImportRulesCommand, ImportRulesError, ImportRulesResponse, UpdateRuleCommand, UpdateRuleError,
};
pub use queries::{ExportRulesError, ListRulesError, ListRulesResponse};
pub use routes::rules_routes;
pub use types::{RuleEntry, RuleFile};
