//! SQL text for the vector table, parameterised by [`TableConfig`].
//!
//! Identifiers are validated by `TableConfig::validate` before they reach
//! these builders.

use askme_core::TableConfig;

/// SQLite table: vectors are little-endian f32 BLOBs, metadata is JSON text.
pub fn sqlite_schema(t: &TableConfig) -> String {
    format!(
        r#"
CREATE TABLE IF NOT EXISTS {table} (
    {id} TEXT PRIMARY KEY,
    {content} TEXT NOT NULL,
    {metadata} TEXT NOT NULL DEFAULT '{{}}',
    {vector} BLOB NOT NULL,
    created_at INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_{table}_created_at ON {table}(created_at);
"#,
        table = t.table_name,
        id = t.id_column,
        content = t.content_column,
        metadata = t.metadata_column,
        vector = t.vector_column,
    )
}

pub fn sqlite_insert(t: &TableConfig) -> String {
    format!(
        "INSERT INTO {} ({}, {}, {}, {}, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
        t.table_name, t.id_column, t.content_column, t.metadata_column, t.vector_column
    )
}

/// Every row in insertion order; filtering and ranking happen in Rust.
pub fn sqlite_select_all(t: &TableConfig) -> String {
    format!(
        "SELECT {}, {}, {}, {} FROM {} ORDER BY created_at, rowid",
        t.id_column, t.content_column, t.metadata_column, t.vector_column, t.table_name
    )
}

pub fn sqlite_select_metadata(t: &TableConfig) -> String {
    format!("SELECT {}, {} FROM {}", t.id_column, t.metadata_column, t.table_name)
}

pub fn sqlite_delete_by_id(t: &TableConfig) -> String {
    format!("DELETE FROM {} WHERE {} = ?1", t.table_name, t.id_column)
}

pub fn sqlite_vector_width(t: &TableConfig) -> String {
    format!("SELECT length({}) FROM {} LIMIT 1", t.vector_column, t.table_name)
}

pub fn count(t: &TableConfig) -> String {
    format!("SELECT COUNT(*) FROM {}", t.table_name)
}

/// PostgreSQL statements, run one at a time (extension first).
#[cfg(feature = "pgvector")]
pub fn pg_schema(t: &TableConfig) -> Vec<String> {
    vec![
        "CREATE EXTENSION IF NOT EXISTS vector".to_string(),
        format!(
            "CREATE TABLE IF NOT EXISTS {table} (\
                {id} uuid NOT NULL PRIMARY KEY, \
                {content} text, \
                {metadata} jsonb, \
                {vector} vector\
            )",
            table = t.table_name,
            id = t.id_column,
            content = t.content_column,
            metadata = t.metadata_column,
            vector = t.vector_column,
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_custom_columns_are_used() {
        let t = TableConfig {
            table_name: "embeddings".into(),
            vector_column: "embeddings".into(),
            ..Default::default()
        };
        let ddl = sqlite_schema(&t);
        assert!(ddl.contains("CREATE TABLE IF NOT EXISTS embeddings"));
        assert!(ddl.contains("embeddings BLOB NOT NULL"));
        assert!(ddl.contains("DEFAULT '{}'"));
        assert_eq!(
            sqlite_insert(&t),
            "INSERT INTO embeddings (id, content, metadata, embeddings, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5)"
        );
    }
}
