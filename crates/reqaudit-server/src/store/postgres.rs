//! PostgreSQL document store
//!
//! All kinds share the `extensions` table. Specs live in a JSONB column and
//! spec fields are reached with `->>` / `#>>`, so filters compare text cast to
//! the type of the bound value.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;
use sqlx::{
    postgres::{PgPool, PgPoolOptions, PgRow},
    Postgres, QueryBuilder, Row,
};

use super::{
    error::{StoreError, StoreResult},
    model::{Document, ListResult, Metadata},
    query::{parse_instant, Direction, ListOptions, PageRequest, Query, Sort},
    DocumentStore,
};
use crate::config::DatabaseConfig;

const COLUMNS: &str = "kind, name, version, created_at, deleted_at, spec";

#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(config: &DatabaseConfig) -> StoreResult<Self> {
        let mut options = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(Duration::from_secs(config.connect_timeout_secs));

        if let Some(idle_timeout) = config.idle_timeout_secs {
            options = options.idle_timeout(Duration::from_secs(idle_timeout));
        }

        let pool = options.connect(&config.url).await?;

        tracing::info!(
            max_connections = config.max_connections,
            min_connections = config.min_connections,
            "Database connection pool created"
        );

        Ok(Self::new(pool))
    }

    pub async fn migrate(&self) -> StoreResult<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        tracing::info!("Database migrations applied");
        Ok(())
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn fetch_row(&self, kind: &str, name: &str) -> StoreResult<Option<Document>> {
        let row = sqlx::query(&format!(
            "SELECT {COLUMNS} FROM extensions WHERE kind = $1 AND name = $2"
        ))
        .bind(kind)
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(document_from_row).transpose()
    }
}

#[async_trait]
impl DocumentStore for PgStore {
    async fn list(&self, kind: &str, options: &ListOptions, sort: &Sort) -> StoreResult<Vec<Document>> {
        let mut builder = select_builder(kind, options)?;
        push_order_by(&mut builder, sort)?;

        let rows = builder.build().fetch_all(&self.pool).await?;
        rows.iter().map(document_from_row).collect()
    }

    async fn list_page(
        &self,
        kind: &str,
        options: &ListOptions,
        page: &PageRequest,
    ) -> StoreResult<ListResult<Document>> {
        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM extensions WHERE ");
        push_filter(&mut count, kind, options)?;
        let total = count.build_query_scalar::<i64>().fetch_one(&self.pool).await?;

        let mut builder = select_builder(kind, options)?;
        push_order_by(&mut builder, &page.sort)?;
        builder.push(" LIMIT ");
        builder.push_bind(i64::try_from(page.size).unwrap_or(i64::MAX));
        builder.push(" OFFSET ");
        builder.push_bind(i64::try_from(page.offset()).unwrap_or(i64::MAX));

        let rows = builder.build().fetch_all(&self.pool).await?;
        let items = rows.iter().map(document_from_row).collect::<StoreResult<Vec<_>>>()?;

        Ok(ListResult {
            page: page.page,
            size: page.size,
            total: u64::try_from(total).unwrap_or_default(),
            items,
        })
    }

    async fn fetch(&self, kind: &str, name: &str) -> StoreResult<Option<Document>> {
        self.fetch_row(kind, name).await
    }

    async fn create(&self, document: Document) -> StoreResult<Document> {
        let row = sqlx::query(&format!(
            "INSERT INTO extensions (kind, name, version, created_at, deleted_at, spec)
             VALUES ($1, $2, 1, NOW(), NULL, $3)
             ON CONFLICT (kind, name) DO NOTHING
             RETURNING {COLUMNS}"
        ))
        .bind(&document.kind)
        .bind(&document.metadata.name)
        .bind(&document.spec)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => document_from_row(&row),
            None => Err(StoreError::already_exists(&document.kind, &document.metadata.name)),
        }
    }

    async fn update(&self, document: Document) -> StoreResult<Document> {
        let row = sqlx::query(&format!(
            "UPDATE extensions SET spec = $4, version = version + 1
             WHERE kind = $1 AND name = $2 AND version = $3 AND deleted_at IS NULL
             RETURNING {COLUMNS}"
        ))
        .bind(&document.kind)
        .bind(&document.metadata.name)
        .bind(document.metadata.version)
        .bind(&document.spec)
        .fetch_optional(&self.pool)
        .await?;

        if let Some(row) = row {
            return document_from_row(&row);
        }

        match self.fetch_row(&document.kind, &document.metadata.name).await? {
            Some(stored) if !stored.metadata.is_deleted() => Err(StoreError::Conflict {
                kind: document.kind,
                name: document.metadata.name,
                expected: document.metadata.version,
                actual: stored.metadata.version,
            }),
            _ => Err(StoreError::not_found(&document.kind, &document.metadata.name)),
        }
    }

    async fn delete(&self, kind: &str, name: &str) -> StoreResult<Document> {
        let row = sqlx::query(&format!(
            "UPDATE extensions
             SET deleted_at = COALESCE(deleted_at, NOW()),
                 version = CASE WHEN deleted_at IS NULL THEN version + 1 ELSE version END
             WHERE kind = $1 AND name = $2
             RETURNING {COLUMNS}"
        ))
        .bind(kind)
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => document_from_row(&row),
            None => Err(StoreError::not_found(kind, name)),
        }
    }

    async fn reclaim(&self, kind: &str, deleted_before: DateTime<Utc>) -> StoreResult<u64> {
        let result = sqlx::query("DELETE FROM extensions WHERE kind = $1 AND deleted_at < $2")
            .bind(kind)
            .bind(deleted_before)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    async fn health_check(&self) -> StoreResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

fn document_from_row(row: &PgRow) -> StoreResult<Document> {
    Ok(Document {
        kind: row.try_get("kind")?,
        metadata: Metadata {
            name: row.try_get("name")?,
            version: row.try_get("version")?,
            creation_timestamp: Some(row.try_get::<DateTime<Utc>, _>("created_at")?),
            deletion_timestamp: row.try_get("deleted_at")?,
        },
        spec: row.try_get::<JsonValue, _>("spec")?,
    })
}

// ============================================================================
// Query translation
// ============================================================================

fn select_builder<'args>(kind: &str, options: &ListOptions) -> StoreResult<QueryBuilder<'args, Postgres>> {
    let mut builder = QueryBuilder::new(format!("SELECT {COLUMNS} FROM extensions WHERE "));
    push_filter(&mut builder, kind, options)?;
    Ok(builder)
}

fn push_filter(builder: &mut QueryBuilder<'_, Postgres>, kind: &str, options: &ListOptions) -> StoreResult<()> {
    builder.push("kind = ");
    builder.push_bind(kind.to_string());
    if let Some(query) = &options.query {
        builder.push(" AND ");
        push_query(builder, query)?;
    }
    Ok(())
}

fn push_query(builder: &mut QueryBuilder<'_, Postgres>, query: &Query) -> StoreResult<()> {
    match query {
        Query::All => {
            builder.push("TRUE");
        },
        Query::Equal { field, value } => push_comparison(builder, field, "=", value)?,
        Query::In { field, values } => {
            if values.is_empty() {
                builder.push("FALSE");
            } else {
                builder.push("(");
                for (i, value) in values.iter().enumerate() {
                    if i > 0 {
                        builder.push(" OR ");
                    }
                    push_comparison(builder, field, "=", value)?;
                }
                builder.push(")");
            }
        },
        Query::StartsWith { field, prefix } => {
            builder.push(format!("({})::text LIKE ", field_expr(field)?));
            builder.push_bind(format!("{}%", escape_like(prefix)));
        },
        Query::Compare { field, op, value } => push_comparison(builder, field, op.as_sql(), value)?,
        Query::IsNull { field } => {
            builder.push(format!("({}) IS NULL", field_expr(field)?));
        },
        Query::And(parts) => {
            if parts.is_empty() {
                builder.push("TRUE");
            } else {
                builder.push("(");
                for (i, part) in parts.iter().enumerate() {
                    if i > 0 {
                        builder.push(" AND ");
                    }
                    push_query(builder, part)?;
                }
                builder.push(")");
            }
        },
    }
    Ok(())
}

fn push_comparison(
    builder: &mut QueryBuilder<'_, Postgres>,
    field: &str,
    op: &str,
    value: &JsonValue,
) -> StoreResult<()> {
    let expr = field_expr(field)?;
    match value {
        JsonValue::String(raw) => match parse_instant(raw) {
            Some(at) => {
                builder.push(format!("({expr})::timestamptz {op} "));
                builder.push_bind(at);
            },
            None => {
                builder.push(format!("({expr})::text {op} "));
                builder.push_bind(raw.clone());
            },
        },
        JsonValue::Number(number) => {
            let number = number
                .as_f64()
                .ok_or_else(|| StoreError::UnsupportedQuery(format!("number {number} on {field}")))?;
            builder.push(format!("({expr})::double precision {op} "));
            builder.push_bind(number);
        },
        JsonValue::Bool(flag) => {
            builder.push(format!("({expr})::boolean {op} "));
            builder.push_bind(*flag);
        },
        other => {
            return Err(StoreError::UnsupportedQuery(format!(
                "cannot compare {field} with {other}"
            )))
        },
    }
    Ok(())
}

fn push_order_by(builder: &mut QueryBuilder<'_, Postgres>, sort: &Sort) -> StoreResult<()> {
    builder.push(" ORDER BY ");
    for order in &sort.orders {
        let direction = match order.direction {
            Direction::Asc => "ASC NULLS FIRST",
            Direction::Desc => "DESC NULLS LAST",
        };
        builder.push(format!("{} {direction}, ", field_expr(&order.field)?));
    }
    builder.push("name ASC");
    Ok(())
}

/// Map a dotted field path onto a SQL expression. Spec keys are inlined, so
/// they are restricted to identifier characters.
fn field_expr(field: &str) -> StoreResult<String> {
    match field {
        "metadata.name" => return Ok("name".to_string()),
        "metadata.version" => return Ok("version".to_string()),
        "metadata.creationTimestamp" => return Ok("created_at".to_string()),
        "metadata.deletionTimestamp" => return Ok("deleted_at".to_string()),
        _ => {},
    }

    let keys: Vec<&str> = field
        .strip_prefix("spec.")
        .ok_or_else(|| StoreError::UnsupportedQuery(format!("unknown field {field}")))?
        .split('.')
        .collect();

    let valid = |key: &&str| !key.is_empty() && key.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    if !keys.iter().all(valid) {
        return Err(StoreError::UnsupportedQuery(format!("invalid field {field}")));
    }

    Ok(match keys.as_slice() {
        [key] => format!("spec ->> '{key}'"),
        _ => format!("spec #>> '{{{}}}'", keys.join(",")),
    })
}

fn escape_like(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::query::CompareOp;

    fn sql_for(query: Query, sort: Sort) -> String {
        let mut builder = select_builder("LogRecord", &ListOptions::filter(query)).unwrap();
        push_order_by(&mut builder, &sort).unwrap();
        builder.sql().to_string()
    }

    #[test]
    fn test_field_expr() {
        assert_eq!(field_expr("metadata.deletionTimestamp").unwrap(), "deleted_at");
        assert_eq!(field_expr("spec.username").unwrap(), "spec ->> 'username'");
        assert_eq!(field_expr("spec.a.b").unwrap(), "spec #>> '{a,b}'");
        assert!(field_expr("spec.user'; DROP TABLE x; --").is_err());
        assert!(field_expr("status.phase").is_err());
    }

    #[test]
    fn test_translates_timestamp_comparison() {
        let sql = sql_for(
            Query::not_deleted().and(Query::compare("spec.accessTime", CompareOp::Lt, "2026-01-01T00:00:00.000Z")),
            Sort::desc("spec.accessTime"),
        );
        assert!(sql.contains("kind = $1"));
        assert!(sql.contains("(deleted_at) IS NULL"));
        assert!(sql.contains("(spec ->> 'accessTime')::timestamptz < $2"));
        assert!(sql.ends_with("ORDER BY spec ->> 'accessTime' DESC NULLS LAST, name ASC"));
    }

    #[test]
    fn test_translates_in_and_prefix() {
        let sql = sql_for(
            Query::in_set("spec.username", ["a", "b"]).and(Query::starts_with("spec.path", "/api")),
            Sort::unsorted(),
        );
        assert!(sql.contains("((spec ->> 'username')::text = $2 OR (spec ->> 'username')::text = $3)"));
        assert!(sql.contains("(spec ->> 'path')::text LIKE $4"));
    }

    #[test]
    fn test_empty_in_matches_nothing() {
        let sql = sql_for(Query::in_set("spec.username", Vec::<String>::new()), Sort::unsorted());
        assert!(sql.contains("AND FALSE"));
    }

    #[test]
    fn test_escape_like() {
        assert_eq!(escape_like("50%_off\\"), "50\\%\\_off\\\\");
    }
}
