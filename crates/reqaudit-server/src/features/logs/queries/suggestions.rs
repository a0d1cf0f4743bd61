//! Autocomplete values for the search filters

use std::{collections::BTreeSet, fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::audit::{models::fields, LogRecordSpec};
use crate::store::{ExtensionClient, ListOptions, Query, Sort, StoreError};

/// Fields that offer suggestions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuggestionField {
    Username,
    ClientIp,
    Path,
}

impl SuggestionField {
    fn document_field(self) -> &'static str {
        match self {
            SuggestionField::Username => fields::USERNAME,
            SuggestionField::ClientIp => fields::CLIENT_IP,
            SuggestionField::Path => fields::PATH,
        }
    }

    fn value_of(self, spec: &LogRecordSpec) -> &str {
        match self {
            SuggestionField::Username => &spec.username,
            SuggestionField::ClientIp => &spec.client_ip,
            SuggestionField::Path => &spec.path,
        }
    }

    fn label_for(self, value: &str) -> String {
        match self {
            SuggestionField::Username => format!("@{value}"),
            SuggestionField::ClientIp | SuggestionField::Path => value.to_string(),
        }
    }
}

impl FromStr for SuggestionField {
    type Err = SuggestionsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "username" => Ok(SuggestionField::Username),
            "clientIp" => Ok(SuggestionField::ClientIp),
            "path" => Ok(SuggestionField::Path),
            other => Err(SuggestionsError::UnknownField(other.to_string())),
        }
    }
}

impl fmt::Display for SuggestionField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SuggestionField::Username => "username",
            SuggestionField::ClientIp => "clientIp",
            SuggestionField::Path => "path",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SuggestionsQuery {
    #[serde(default)]
    pub prefix: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Suggestion {
    pub label: String,
    pub value: String,
}

#[derive(Debug, thiserror::Error)]
pub enum SuggestionsError {
    #[error("Unknown suggestion field '{0}', expected username, clientIp or path")]
    UnknownField(String),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

/// Distinct values of `field` among live records starting with `prefix`,
/// in ascending order
#[tracing::instrument(skip(client))]
pub async fn handle(
    client: &ExtensionClient,
    field: SuggestionField,
    query: SuggestionsQuery,
) -> Result<Vec<Suggestion>, SuggestionsError> {
    let mut options = ListOptions::filter(Query::not_deleted());
    if let Some(prefix) = query.prefix.filter(|prefix| !prefix.is_empty()) {
        options = options.and_query(Query::starts_with(field.document_field(), prefix));
    }

    let records = client
        .list_all::<LogRecordSpec>(&options, &Sort::asc(field.document_field()))
        .await?;

    let values: BTreeSet<&str> = records.iter().map(|record| field.value_of(&record.spec)).collect();

    Ok(values
        .into_iter()
        .map(|value| Suggestion {
            label: field.label_for(value),
            value: value.to_string(),
        })
        .collect())
}
