//! reqaudit common library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Shared pieces used by every reqaudit workspace member:
//!
//! - **Error Handling**: [`CommonError`] and the [`Result`] alias
//! - **Environment**: typed environment variable lookups with defaults
//! - **Logging**: `tracing` subscriber setup driven by [`logging::LogConfig`]
//!
//! # Example
//!
//! ```no_run
//! use reqaudit_common::env::env_or;
//!
//! fn port() -> reqaudit_common::Result<u16> {
//!     env_or("REQAUDIT_PORT", 8080)
//! }
//! ```

pub mod env;
pub mod error;
pub mod logging;

pub use error::{CommonError, Result};
