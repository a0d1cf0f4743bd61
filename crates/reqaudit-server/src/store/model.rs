//! Document model shared by every store backend

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value as JsonValue;

use super::error::StoreResult;

/// Bookkeeping carried by every stored document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Metadata {
    /// Unique name within a kind
    pub name: String,
    /// Optimistic concurrency token, bumped by the store on every write
    #[serde(default)]
    pub version: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creation_timestamp: Option<DateTime<Utc>>,
    /// Soft-delete marker
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deletion_timestamp: Option<DateTime<Utc>>,
}

impl Metadata {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: 0,
            creation_timestamp: None,
            deletion_timestamp: None,
        }
    }

    pub fn is_deleted(&self) -> bool {
        self.deletion_timestamp.is_some()
    }
}

/// A typed document payload. `KIND` partitions the store.
pub trait Spec: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    const KIND: &'static str;
}

/// A typed document: metadata plus a kind-specific spec
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Extension<S> {
    pub metadata: Metadata,
    pub spec: S,
}

impl<S: Spec> Extension<S> {
    pub fn new(name: impl Into<String>, spec: S) -> Self {
        Self {
            metadata: Metadata::named(name),
            spec,
        }
    }

    pub fn name(&self) -> &str {
        &self.metadata.name
    }

    pub fn is_deleted(&self) -> bool {
        self.metadata.is_deleted()
    }

    pub(crate) fn into_document(self) -> StoreResult<Document> {
        Ok(Document {
            kind: S::KIND.to_string(),
            metadata: self.metadata,
            spec: serde_json::to_value(self.spec)?,
        })
    }

    pub(crate) fn from_document(document: Document) -> StoreResult<Self> {
        Ok(Self {
            metadata: document.metadata,
            spec: serde_json::from_value(document.spec)?,
        })
    }
}

/// Untyped document as the backends see it
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub kind: String,
    pub metadata: Metadata,
    pub spec: JsonValue,
}

impl Document {
    /// Resolve a dotted field path such as `spec.username` or
    /// `metadata.deletionTimestamp`. Missing fields and JSON nulls yield `None`.
    pub fn field(&self, path: &str) -> Option<JsonValue> {
        let (root, rest) = match path.split_once('.') {
            Some((root, rest)) => (root, Some(rest)),
            None => (path, None),
        };

        let value = match root {
            "metadata" => {
                let metadata = serde_json::to_value(&self.metadata).ok()?;
                descend(&metadata, rest)?.clone()
            },
            "spec" => descend(&self.spec, rest)?.clone(),
            _ => return None,
        };

        (!value.is_null()).then_some(value)
    }
}

fn descend<'a>(value: &'a JsonValue, rest: Option<&str>) -> Option<&'a JsonValue> {
    match rest {
        None => Some(value),
        Some(rest) => rest.split('.').try_fold(value, |current, key| current.get(key)),
    }
}

/// Render a timestamp the way documents store it: RFC 3339, UTC, fixed
/// millisecond precision. Fixed width keeps lexical order equal to time order.
pub fn format_timestamp(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Serde adapter for timestamps stored with [`format_timestamp`]
pub mod fixed_millis {
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(at: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&super::format_timestamp(at))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        DateTime::parse_from_rfc3339(&raw)
            .map(|at| at.with_timezone(&Utc))
            .map_err(serde::de::Error::custom)
    }
}

/// One page of results
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListResult<T> {
    pub page: u64,
    pub size: u64,
    pub total: u64,
    pub items: Vec<T>,
}

impl<T> ListResult<T> {
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> ListResult<U> {
        ListResult {
            page: self.page,
            size: self.size,
            total: self.total,
            items: self.items.into_iter().map(f).collect(),
        }
    }

    pub fn try_map<U, E>(self, f: impl FnMut(T) -> Result<U, E>) -> Result<ListResult<U>, E> {
        Ok(ListResult {
            page: self.page,
            size: self.size,
            total: self.total,
            items: self.items.into_iter().map(f).collect::<Result<_, _>>()?,
        })
    }

    pub fn total_pages(&self) -> u64 {
        if self.size == 0 {
            0
        } else {
            self.total.div_ceil(self.size)
        }
    }
}
