//! reqaudit server library
//!
//! Selective HTTP request auditing: an axum middleware records requests whose
//! path matches a configurable set of include/exclude rules, and a management
//! API edits the rules, searches the recorded traffic and controls retention.
//!
//! # Modules
//!
//! - [`audit`]: Path matching, request/response capture, the audit layer and
//!   the retention sweeper
//! - [`store`]: Document store abstraction with in-memory and PostgreSQL
//!   backends
//! - [`features`]: Management API slices (rules, retention, logs, system)
//! - [`api`]: Router assembly and response envelopes
//! - [`config`]: Environment-driven configuration
//! - [`error`]: HTTP error type
//! - [`middleware`]: CORS and tracing layers
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use reqaudit_server::{api::{create_router, AppState}, config::Config, store::MemoryStore};
//!
//! # async fn run() -> anyhow::Result<()> {
//! let config = Config::load()?;
//! let state = AppState::new(Arc::new(MemoryStore::new()));
//! let app = create_router(state, &config)?;
//!
//! let listener = tokio::net::TcpListener::bind("127.0.0.1:8080").await?;
//! axum::serve(listener, app).await?;
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod audit;
pub mod config;
pub mod error;
pub mod features;
pub mod middleware;
pub mod store;

pub use config::Config;
pub use error::AppError;
