//! Selective request auditing
//!
//! Requests whose path matches the configured rules are recorded in full
//! (headers, bodies, status, caller) as log records. Everything else passes
//! through untouched.
//!
//! # Architecture
//!
//! - [`PathMatcher`] caches an immutable [`RuleSet`] built from the stored
//!   match rules and answers "should this path be audited?"
//! - [`AuditLayer`] wraps a router, captures matched traffic and writes the
//!   record once the response body has been sent
//! - [`RetentionSweeper`] deletes records past the retention window on a cron
//!   schedule
//!
//! # Usage
//!
//! ```no_run
//! use std::{sync::Arc, time::Duration};
//! use axum::{routing::get, Router};
//! use reqaudit_server::audit::{AuditLayer, CaptureConfig, PathMatcher, RecordWriter};
//! use reqaudit_server::store::{ExtensionClient, MemoryStore};
//!
//! let client = ExtensionClient::new(Arc::new(MemoryStore::new()));
//! let matcher = Arc::new(PathMatcher::new(client.clone()));
//! let writer = RecordWriter::new(client, Duration::from_secs(5));
//!
//! let app: Router = Router::new()
//!     .route("/api/test", get(|| async { "ok" }))
//!     .layer(AuditLayer::new(matcher, writer, CaptureConfig::default()));
//! ```

pub mod capture;
pub mod matcher;
pub mod middleware;
pub mod models;
pub mod pattern;
pub mod retention;
pub mod sweeper;


pub use capture::{CaptureBody, CaptureConfig, RequestSnapshot, ResponseSnapshot};
pub use matcher::{list_active_rules, PathMatcher, RuleSet};
pub use middleware::{AuditLayer, AuditMiddleware, RecordWriter};
pub use models::{
    AuthenticatedUser, LogRecord, LogRecordSpec, MatchRule, MatchRuleSpec, RetentionSetting, RetentionSpec,
};
pub use pattern::AntPattern;
pub use retention::RetentionSettings;
pub use sweeper::{RetentionSweeper, SweepReport, SweepSchedule};
