pub mod export;
pub mod list;

pub use export::ExportRulesError;
pub use list::{ListRulesError, ListRulesResponse};
