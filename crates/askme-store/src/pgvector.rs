//! PostgreSQL + pgvector backend.
//!
//! Requires the `vector` extension; the table is created on connect.
//! Metadata is `jsonb` and search uses the cosine distance operator `<=>`.

use async_trait::async_trait;
use sqlx::postgres::{PgArguments, PgPoolOptions};
use sqlx::query::Query;
use sqlx::{PgPool, Postgres, Row};
use tracing::{debug, info};

use crate::filter::{Condition, MetadataFilter};
use crate::schema;
use crate::store::VectorStore;
use crate::types::{NewChunk, SearchHit};
use askme_core::{Error, Result, TableConfig};

pub struct PgVectorStore {
    pool: PgPool,
    table: TableConfig,
}

fn db_err(e: sqlx::Error) -> Error {
    Error::Database(e.to_string())
}

/// pgvector's text input format: `[1,2,3]`.
fn vector_literal(embedding: &[f32]) -> String {
    format!(
        "[{}]",
        embedding.iter().map(|v| v.to_string()).collect::<Vec<_>>().join(",")
    )
}

/// A value bound for one filter placeholder.
#[derive(Debug, PartialEq)]
enum FilterBind {
    Text(String),
    TextArray(Vec<String>),
}

/// Build a `WHERE` fragment for `filter`, numbering placeholders from `first`.
///
/// Each condition binds the key and the JSON-encoded expected value(s).
fn filter_clause(filter: &MetadataFilter, column: &str, first: usize) -> (String, Vec<FilterBind>) {
    let mut parts = Vec::new();
    let mut binds = Vec::new();
    let mut n = first;
    for (key, cond) in filter.conditions() {
        binds.push(FilterBind::Text(key.to_string()));
        match cond {
            Condition::Eq(value) => {
                parts.push(format!("{} -> ${}::text = ${}::jsonb", column, n, n + 1));
                binds.push(FilterBind::Text(value.to_string()));
            }
            Condition::In { values } => {
                parts.push(format!("{} -> ${}::text = ANY(${}::jsonb[])", column, n, n + 1));
                binds.push(FilterBind::TextArray(
                    values.iter().map(|v| v.to_string()).collect(),
                ));
            }
        }
        n += 2;
    }
    if parts.is_empty() {
        (String::new(), binds)
    } else {
        (format!("WHERE {}", parts.join(" AND ")), binds)
    }
}

fn bind_filter<'q>(
    mut query: Query<'q, Postgres, PgArguments>,
    binds: Vec<FilterBind>,
) -> Query<'q, Postgres, PgArguments> {
    for bind in binds {
        query = match bind {
            FilterBind::Text(s) => query.bind(s),
            FilterBind::TextArray(v) => query.bind(v),
        };
    }
    query
}

impl PgVectorStore {
    /// Connect, ensure the extension and table exist.
    pub async fn connect(database_url: &str, table: TableConfig) -> Result<Self> {
        table.validate()?;
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await
            .map_err(db_err)?;
        Self::from_pool(pool, table).await
    }

    pub async fn from_pool(pool: PgPool, table: TableConfig) -> Result<Self> {
        for statement in schema::pg_schema(&table) {
            sqlx::query(&statement).execute(&pool).await.map_err(db_err)?;
        }
        debug!(table = %table.table_name, "pgvector table ready");
        Ok(Self { pool, table })
    }
}

#[async_trait]
impl VectorStore for PgVectorStore {
    async fn add_documents(&self, chunks: &[NewChunk]) -> Result<Vec<String>> {
        if chunks.is_empty() {
            return Ok(Vec::new());
        }
        let t = &self.table;
        let sql = format!(
            "INSERT INTO {} ({}, {}, {}, {}) VALUES ($1::uuid, $2, $3::jsonb, $4::vector)",
            t.table_name, t.id_column, t.content_column, t.metadata_column, t.vector_column
        );

        let mut tx = self.pool.begin().await.map_err(db_err)?;
        let mut ids = Vec::with_capacity(chunks.len());
        for chunk in chunks {
            let id = uuid::Uuid::new_v4().to_string();
            sqlx::query(&sql)
                .bind(&id)
                .bind(&chunk.content)
                .bind(chunk.metadata.to_string())
                .bind(vector_literal(&chunk.embedding))
                .execute(&mut *tx)
                .await
                .map_err(db_err)?;
            ids.push(id);
        }
        tx.commit().await.map_err(db_err)?;

        debug!(count = ids.len(), table = %t.table_name, "inserted rows into pgvector");
        Ok(ids)
    }

    async fn similarity_search(
        &self,
        query: &[f32],
        k: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<SearchHit>> {
        if k == 0 {
            return Ok(Vec::new());
        }
        let t = &self.table;
        let (where_sql, binds) = match filter {
            Some(f) => filter_clause(f, &t.metadata_column, 3),
            None => (String::new(), Vec::new()),
        };
        let sql = format!(
            "SELECT {id}::text AS id, {content} AS content, {meta}::text AS metadata, \
                    1 - ({vector} <=> $1::vector) AS score \
             FROM {table} {where_sql} \
             ORDER BY {vector} <=> $1::vector \
             LIMIT $2",
            id = t.id_column,
            content = t.content_column,
            meta = t.metadata_column,
            vector = t.vector_column,
            table = t.table_name,
        );

        let q = sqlx::query(&sql).bind(vector_literal(query)).bind(k as i64);
        let rows = bind_filter(q, binds)
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;

        rows.iter()
            .map(|row| {
                let metadata: Option<String> = row.try_get("metadata").map_err(db_err)?;
                Ok(SearchHit {
                    id: row.try_get("id").map_err(db_err)?,
                    content: row
                        .try_get::<Option<String>, _>("content")
                        .map_err(db_err)?
                        .unwrap_or_default(),
                    metadata: metadata
                        .and_then(|m| serde_json::from_str(&m).ok())
                        .unwrap_or_else(|| serde_json::json!({})),
                    score: row.try_get("score").map_err(db_err)?,
                })
            })
            .collect()
    }

    async fn delete(&self, filter: &MetadataFilter) -> Result<usize> {
        if filter.is_empty() {
            return Err(Error::InvalidRequest(
                "refusing to delete with an empty filter".into(),
            ));
        }
        let (where_sql, binds) = filter_clause(filter, &self.table.metadata_column, 1);
        let sql = format!("DELETE FROM {} {}", self.table.table_name, where_sql);
        let result = bind_filter(sqlx::query(&sql), binds)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        info!("Deleted {} rows from {}", result.rows_affected(), self.table.table_name);
        Ok(result.rows_affected() as usize)
    }

    async fn count(&self) -> Result<i64> {
        sqlx::query(&schema::count(&self.table))
            .fetch_one(&self.pool)
            .await
            .map_err(db_err)?
            .try_get(0)
            .map_err(db_err)
    }

    async fn close(&self) -> Result<()> {
        self.pool.close().await;
        info!("pgvector pool closed");
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "pgvector"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_vector_literal() {
        assert_eq!(vector_literal(&[1.0, -0.5, 2.25]), "[1,-0.5,2.25]");
    }

    #[test]
    fn test_filter_clause_numbers_placeholders() {
        let filter = MetadataFilter::new()
            .eq("a", 2)
            .one_of("b", vec![json!("x"), json!("y")]);
        let (sql, binds) = filter_clause(&filter, "metadata", 3);
        assert_eq!(
            sql,
            "WHERE metadata -> $3::text = $4::jsonb AND metadata -> $5::text = ANY($6::jsonb[])"
        );
        assert_eq!(
            binds,
            vec![
                FilterBind::Text("a".into()),
                FilterBind::Text("2".into()),
                FilterBind::Text("b".into()),
                FilterBind::TextArray(vec!["\"x\"".into(), "\"y\"".into()]),
            ]
        );
    }

    #[test]
    fn test_empty_filter_has_no_where() {
        let (sql, binds) = filter_clause(&MetadataFilter::new(), "metadata", 1);
        assert!(sql.is_empty());
        assert!(binds.is_empty());
    }
}
