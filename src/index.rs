//! SQLite-persisted vector index.
//!
//! The index is one SQLite file holding the ingested notes, their chunks, and
//! BLOB-encoded embedding vectors, plus a metadata table recording which
//! embedding model built it. It is written exactly once, in a single
//! transaction, and opened read-only thereafter — the chat path never mutates
//! it.
//!
//! Opening the index asserts that the configured embedding model matches the
//! recorded one: querying with a different model than the one used at
//! ingestion silently degrades retrieval, so the mismatch fails loudly
//! instead.

use anyhow::{bail, Context, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::Row;
use std::path::Path;
use std::str::FromStr;

use crate::config::Config;
use crate::embedding::{blob_to_vec, cosine_similarity, vec_to_blob};
use crate::models::{Chunk, NoteDocument, ScoredChunk};

#[derive(Debug)]
pub struct NoteIndex {
    pool: SqlitePool,
}

impl NoteIndex {
    /// Create a fresh index file (and its parent directory) with an empty
    /// schema. Used only by the ingestion pipeline.
    pub async fn create(config: &Config) -> Result<Self> {
        let index_path = config.index_path();
        if let Some(parent) = index_path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!(
                    "Cannot create index directory {} (is the data directory writable?)",
                    parent.display()
                )
            })?;
        }

        let pool = connect(&index_path, true).await?;
        create_schema(&pool).await?;
        Ok(Self { pool })
    }

    /// Open an existing index and verify its embedding metadata against the
    /// configuration.
    pub async fn open(config: &Config) -> Result<Self> {
        let index_path = config.index_path();
        if !index_path.exists() {
            bail!(
                "No index at {} — run `notebot ingest` first",
                index_path.display()
            );
        }

        let pool = connect(&index_path, false).await?;
        let index = Self { pool };

        let (model, dims) = index.recorded_model().await?;
        if model != config.embedding.model || dims != config.embedding.dims as i64 {
            bail!(
                "Index was built with embedding model '{}' ({} dims) but the configuration says '{}' ({} dims). \
                 Delete {} and re-ingest, or restore the original embedding settings.",
                model,
                dims,
                config.embedding.model,
                config.embedding.dims,
                config.index_path().display()
            );
        }

        Ok(index)
    }

    /// Write the whole ingestion result in one transaction: notes, chunks,
    /// vectors, and the embedding metadata.
    pub async fn store(
        &self,
        notes: &[NoteDocument],
        chunks: &[Chunk],
        vectors: &[Vec<f32>],
        config: &Config,
    ) -> Result<()> {
        if chunks.len() != vectors.len() {
            bail!(
                "Chunk/vector count mismatch: {} chunks, {} vectors",
                chunks.len(),
                vectors.len()
            );
        }

        let now = chrono::Utc::now().timestamp();
        let mut tx = self.pool.begin().await?;

        for note in notes {
            sqlx::query("INSERT INTO notes (path, body, ingested_at) VALUES (?, ?, ?)")
                .bind(&note.path)
                .bind(&note.body)
                .bind(now)
                .execute(&mut *tx)
                .await?;
        }

        for (chunk, vector) in chunks.iter().zip(vectors.iter()) {
            sqlx::query(
                "INSERT INTO chunks (id, note_path, chunk_index, text, hash) VALUES (?, ?, ?, ?, ?)",
            )
            .bind(&chunk.id)
            .bind(&chunk.note_path)
            .bind(chunk.chunk_index)
            .bind(&chunk.text)
            .bind(&chunk.hash)
            .execute(&mut *tx)
            .await?;

            let blob = vec_to_blob(vector);
            sqlx::query("INSERT INTO chunk_vectors (chunk_id, note_path, embedding) VALUES (?, ?, ?)")
                .bind(&chunk.id)
                .bind(&chunk.note_path)
                .bind(&blob)
                .execute(&mut *tx)
                .await?;
        }

        for (key, value) in [
            ("embedding_model", config.embedding.model.clone()),
            ("embedding_dims", config.embedding.dims.to_string()),
            ("created_at", now.to_string()),
        ] {
            sqlx::query("INSERT INTO index_meta (key, value) VALUES (?, ?)")
                .bind(key)
                .bind(value)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    /// Return the `k` chunks most similar to `query_vec`, scored by cosine
    /// similarity. Ordering is deterministic: score desc, then note path,
    /// then chunk index.
    pub async fn top_k(&self, query_vec: &[f32], k: usize) -> Result<Vec<ScoredChunk>> {
        let rows = sqlx::query(
            r#"
            SELECT cv.embedding, c.note_path, c.chunk_index, c.text
            FROM chunk_vectors cv
            JOIN chunks c ON c.id = cv.chunk_id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let mut candidates: Vec<ScoredChunk> = rows
            .iter()
            .map(|row| {
                let blob: Vec<u8> = row.get("embedding");
                let vec = blob_to_vec(&blob);
                ScoredChunk {
                    note_path: row.get("note_path"),
                    chunk_index: row.get("chunk_index"),
                    text: row.get("text"),
                    score: cosine_similarity(query_vec, &vec),
                }
            })
            .collect();

        candidates.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.note_path.cmp(&b.note_path))
                .then(a.chunk_index.cmp(&b.chunk_index))
        });
        candidates.truncate(k);

        Ok(candidates)
    }

    /// The embedding model and dimensionality recorded at ingestion.
    pub async fn recorded_model(&self) -> Result<(String, i64)> {
        let model: Option<String> =
            sqlx::query_scalar("SELECT value FROM index_meta WHERE key = 'embedding_model'")
                .fetch_optional(&self.pool)
                .await?;
        let dims: Option<String> =
            sqlx::query_scalar("SELECT value FROM index_meta WHERE key = 'embedding_dims'")
                .fetch_optional(&self.pool)
                .await?;

        match (model, dims.and_then(|d| d.parse::<i64>().ok())) {
            (Some(model), Some(dims)) => Ok((model, dims)),
            _ => bail!("Index has no embedding metadata — delete it and re-ingest"),
        }
    }

    /// (note count, chunk count) — used by the status command.
    pub async fn counts(&self) -> Result<(i64, i64)> {
        let notes: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM notes")
            .fetch_one(&self.pool)
            .await?;
        let chunks: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM chunks")
            .fetch_one(&self.pool)
            .await?;
        Ok((notes, chunks))
    }

    pub async fn close(self) {
        self.pool.close().await;
    }
}

async fn connect(path: &Path, create: bool) -> Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", path.display()))?
        .create_if_missing(create)
        .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    Ok(pool)
}

async fn create_schema(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS notes (
            path TEXT PRIMARY KEY,
            body TEXT NOT NULL,
            ingested_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS chunks (
            id TEXT PRIMARY KEY,
            note_path TEXT NOT NULL,
            chunk_index INTEGER NOT NULL,
            text TEXT NOT NULL,
            hash TEXT NOT NULL,
            UNIQUE(note_path, chunk_index),
            FOREIGN KEY (note_path) REFERENCES notes(path)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS chunk_vectors (
            chunk_id TEXT PRIMARY KEY,
            note_path TEXT NOT NULL,
            embedding BLOB NOT NULL,
            FOREIGN KEY (chunk_id) REFERENCES chunks(id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS index_meta (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_chunks_note_path ON chunks(note_path)")
        .execute(pool)
        .await?;

    Ok(())
}
