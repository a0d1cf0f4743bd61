pub mod count;
pub mod search;
pub mod suggestions;

pub use count::{CountLogsError, CountLogsResponse};
pub use search::{SearchLogsError, SearchLogsQuery, SearchLogsResponse};
pub use suggestions::{Suggestion, SuggestionField, SuggestionsError, SuggestionsQuery};
