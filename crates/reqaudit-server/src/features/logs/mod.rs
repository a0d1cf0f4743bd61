//! Recorded request queries and bulk deletion

pub mod commands;
pub mod queries;
pub mod routes;

pub use commands::{DeleteAllLogsError, DeleteAllLogsResponse};
pub use queries::{
    CountLogsError, CountLogsResponse, SearchLogsError, SearchLogsQuery, SearchLogsResponse, Suggestion,
    SuggestionField, SuggestionsError, SuggestionsQuery,
};
pub use routes::logs_routes;
