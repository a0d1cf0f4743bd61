//! Rule file format shared by import and export

use serde::{Deserialize, Serialize};

use crate::audit::MatchRuleSpec;

/// One rule as it appears in an exported or imported file. Ids are not part
/// of the file; they are assigned on import.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleEntry {
    #[serde(alias = "rule")]
    pub pattern: String,
    pub is_include: bool,
    #[serde(default)]
    pub version: i64,
}

impl From<&MatchRuleSpec> for RuleEntry {
    fn from(spec: &MatchRuleSpec) -> Self {
        Self {
            pattern: spec.pattern.clone(),
            is_include: spec.is_include,
            version: spec.version,
        }
    }
}

/// Whole rule file: `{"rules": [...]}`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleFile {
    #[serde(alias = "interfaceLogRules", default)]
    pub rules: Vec<RuleEntry>,
}
