use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::store::{model::fixed_millis, Extension, Spec};

/// Username recorded when no identity is attached to a request
pub const VISITOR: &str = "visitor";

/// Client IP recorded when the remote address is unavailable
pub const UNKNOWN_CLIENT_IP: &str = "UNKNOWN";

/// Name of the singleton retention document
pub const RETENTION_SETTING_NAME: &str = "reqaudit-retention";

pub const DEFAULT_RETENTION_DAYS: u32 = 7;

/// One hundred years
pub const MAX_RETENTION_DAYS: u32 = 36_500;

/// Dotted field paths used in store queries
pub mod fields {
    pub const ID: &str = "spec.id";
    pub const USERNAME: &str = "spec.username";
    pub const CLIENT_IP: &str = "spec.clientIp";
    pub const PATH: &str = "spec.path";
    pub const ACCESS_TIME: &str = "spec.accessTime";
}

/// Identity attached to a request by an upstream authentication layer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedUser(pub String);

// ============================================================================
// Match rules
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchRuleSpec {
    pub id: i64,
    #[serde(alias = "rule")]
    pub pattern: String,
    pub is_include: bool,
    #[serde(default)]
    pub version: i64,
}

impl Spec for MatchRuleSpec {
    const KIND: &'static str = "MatchRule";
}

pub type MatchRule = Extension<MatchRuleSpec>;

// ============================================================================
// Log records
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogRecordSpec {
    pub id: String,
    pub username: String,
    pub client_ip: String,
    pub path: String,
    pub method: String,
    #[serde(with = "fixed_millis")]
    pub access_time: DateTime<Utc>,
    /// JSON object of header name to values
    pub request_headers: String,
    pub request_body: String,
    pub request_params: BTreeMap<String, String>,
    pub response_headers: String,
    pub response_body: String,
    pub response_status: String,
}

impl Spec for LogRecordSpec {
    const KIND: &'static str = "LogRecord";
}

pub type LogRecord = Extension<LogRecordSpec>;

impl LogRecordSpec {
    pub fn into_record(self) -> LogRecord {
        let name = self.id.clone();
        Extension::new(name, self)
    }
}

// ============================================================================
// Retention
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetentionSpec {
    pub days: u32,
}

impl Default for RetentionSpec {
    fn default() -> Self {
        Self {
            days: DEFAULT_RETENTION_DAYS,
        }
    }
}

impl Spec for RetentionSpec {
    const KIND: &'static str = "RetentionSetting";
}

pub type RetentionSetting = Extension<RetentionSpec>;

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_match_rule_accepts_legacy_field_name() {
        let spec: MatchRuleSpec =
            serde_json::from_value(json!({ "id": 3, "rule": "/api/**", "isInclude": true })).unwrap();
        assert_eq!(spec.pattern, "/api/**");
        assert_eq!(spec.version, 0);

        let value = serde_json::to_value(&spec).unwrap();
        assert_eq!(value["pattern"], "/api/**");
        assert!(value.get("rule").is_none());
    }

    #[test]
    fn test_log_record_access_time_format() {
        let at = DateTime::parse_from_rfc3339("2026-03-04T05:06:07.891234+00:00")
            .unwrap()
            .with_timezone(&Utc);
        let spec = LogRecordSpec {
            id: "0190".to_string(),
            username: VISITOR.to_string(),
            client_ip: UNKNOWN_CLIENT_IP.to_string(),
            path: "/api/test".to_string(),
            method: "GET".to_string(),
            access_time: at,
            request_headers: "{}".to_string(),
            request_body: String::new(),
            request_params: BTreeMap::new(),
            response_headers: "{}".to_string(),
            response_body: String::new(),
            response_status: "200".to_string(),
        };

        let value = serde_json::to_value(&spec).unwrap();
        assert_eq!(value["accessTime"], "2026-03-04T05:06:07.891Z");
        assert_eq!(value["clientIp"], "UNKNOWN");

        let record = spec.into_record();
        assert_eq!(record.name(), "0190");
    }
}
