use std::time::Duration;

use async_trait::async_trait;
use pgvector::Vector;
use sqlx::Row;
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};

use super::{VectorIndex, check_dimension};
use crate::error::VectorStoreError;
use crate::models::{ContentChunk, PostgresConfig};

/// Embeddings in a Postgres table with the `vector` extension.
pub struct PgVectorIndex {
    pool: PgPool,
    table: String,
    dimension: usize,
}

impl PgVectorIndex {
    /// Build a lazily connecting pool; nothing is contacted until first use.
    pub fn connect(config: &PostgresConfig, dimension: u32) -> Result<Self, VectorStoreError> {
        if !is_valid_table_name(&config.table) {
            return Err(VectorStoreError::SchemaError(format!(
                "invalid table name: {}",
                config.table
            )));
        }

        let pool = PgPoolOptions::new()
            .max_connections(config.pool_max)
            .acquire_timeout(Duration::from_secs(config.pool_acquire_timeout.into()))
            .connect_lazy(&config.connection_string)
            .map_err(|e| VectorStoreError::ConnectionError(e.to_string()))?;

        Ok(Self {
            pool,
            table: config.table.clone(),
            dimension: dimension as usize,
        })
    }
}

/// Table names are interpolated into SQL, so only plain identifiers
/// (optionally schema-qualified) are accepted.
fn is_valid_table_name(name: &str) -> bool {
    !name.is_empty()
        && name.split('.').count() <= 2
        && name.split('.').all(|part| {
            let mut chars = part.chars();
            matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
                && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        })
}

fn schema_statements(table: &str, dimension: usize) -> Vec<String> {
    let index_name = format!("{}_embedding_idx", table.replace('.', "_"));
    vec![
        "CREATE EXTENSION IF NOT EXISTS vector".to_string(),
        format!(
            "CREATE TABLE IF NOT EXISTS {} (id VARCHAR(256) PRIMARY KEY, page_id VARCHAR(256) NOT NULL, embedding vector({}))",
            table, dimension
        ),
        format!(
            "CREATE INDEX IF NOT EXISTS {} ON {} USING hnsw (embedding vector_cosine_ops)",
            index_name, table
        ),
    ]
}

fn upsert_statement(table: &str) -> String {
    format!(
        "INSERT INTO {} (id, page_id, embedding) VALUES ($1, $2, $3) \
         ON CONFLICT (id) DO UPDATE SET page_id = EXCLUDED.page_id, embedding = EXCLUDED.embedding",
        table
    )
}

fn nearest_statement(table: &str) -> String {
    format!(
        "SELECT page_id FROM {} ORDER BY embedding <=> $1 LIMIT $2",
        table
    )
}

#[async_trait]
impl VectorIndex for PgVectorIndex {
    fn name(&self) -> &str {
        "postgres"
    }

    async fn ensure_schema(&self) -> Result<(), VectorStoreError> {
        for statement in schema_statements(&self.table, self.dimension) {
            sqlx::query(&statement)
                .execute(&self.pool)
                .await
                .map_err(|e| VectorStoreError::SchemaError(e.to_string()))?;
        }
        Ok(())
    }

    async fn upsert(&self, chunk: &ContentChunk) -> Result<(), VectorStoreError> {
        check_dimension(self.dimension, chunk.vector.len())?;

        sqlx::query(&upsert_statement(&self.table))
            .bind(&chunk.id)
            .bind(&chunk.document_id)
            .bind(Vector::from(chunk.vector.clone()))
            .execute(&self.pool)
            .await
            .map_err(|e| VectorStoreError::UpsertError(e.to_string()))?;
        Ok(())
    }

    async fn query_nearest(
        &self,
        vector: &[f32],
        k: usize,
    ) -> Result<Vec<String>, VectorStoreError> {
        check_dimension(self.dimension, vector.len())?;

        let rows = sqlx::query(&nearest_statement(&self.table))
            .bind(Vector::from(vector.to_vec()))
            .bind(k as i64)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| VectorStoreError::SearchError(e.to_string()))?;

        Ok(rows
            .into_iter()
            .map(|row: PgRow| row.get::<String, _>("page_id"))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_name_validation() {
        assert!(is_valid_table_name("confluence"));
        assert!(is_valid_table_name("wiki.pages_v2"));
        assert!(is_valid_table_name("_tmp"));
        assert!(!is_valid_table_name(""));
        assert!(!is_valid_table_name("1pages"));
        assert!(!is_valid_table_name("pages; DROP TABLE x"));
        assert!(!is_valid_table_name("a.b.c"));
    }

    #[test]
    fn test_schema_statements() {
        let statements = schema_statements("wiki.pages", 1536);
        assert_eq!(statements[0], "CREATE EXTENSION IF NOT EXISTS vector");
        assert!(statements[1].contains("CREATE TABLE IF NOT EXISTS wiki.pages"));
        assert!(statements[1].contains("embedding vector(1536)"));
        assert!(statements[2].contains("wiki_pages_embedding_idx ON wiki.pages"));
        assert!(statements[2].contains("vector_cosine_ops"));
    }

    #[test]
    fn test_query_statements() {
        assert!(upsert_statement("confluence").contains("ON CONFLICT (id) DO UPDATE"));
        assert_eq!(
            nearest_statement("confluence"),
            "SELECT page_id FROM confluence ORDER BY embedding <=> $1 LIMIT $2"
        );
    }

    #[test]
    fn test_connect_rejects_bad_table() {
        let config = PostgresConfig {
            connection_string: "postgres://localhost/wiki".to_string(),
            table: "x; --".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            PgVectorIndex::connect(&config, 3),
            Err(VectorStoreError::SchemaError(_))
        ));
    }
}
