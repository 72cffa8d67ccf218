//! Ingestion pipeline orchestration.
//!
//! Composes the full flow: fetch → chunk → embed → store. Ingestion is
//! all-or-nothing: every chunk is embedded in memory before the index file is
//! created, and the whole result lands in a single transaction. A storage
//! failure removes the index file so the startup existence check stays
//! truthful.
//!
//! The pipeline does not guard itself — callers decide whether it should run
//! (see [`needs_ingest`]).

use anyhow::Result;
use tracing::{debug, info};

use crate::chunk::chunk_note;
use crate::config::Config;
use crate::embedding;
use crate::fetch;
use crate::index::NoteIndex;

/// Whether startup should run the pipeline: true unless BOTH the note
/// checkout and the index file already exist. Existence only — contents are
/// never validated, and a stale index is never refreshed automatically.
pub fn needs_ingest(config: &Config) -> bool {
    !(config.notes_path().exists() && config.index_path().exists())
}

/// Run the full pipeline and print a summary.
pub async fn run_ingest(config: &Config) -> Result<()> {
    let checkout = fetch::ensure_checkout(config)?;
    let notes = fetch::collect_notes(&checkout)?;

    let mut chunks = Vec::new();
    for note in &notes {
        chunks.extend(chunk_note(&note.path, &note.body, config.chunking.max_tokens));
    }
    info!(notes = notes.len(), chunks = chunks.len(), "chunked checkout");

    // Embed everything before touching the index file so a failed batch
    // leaves no partial state behind.
    let mut vectors = Vec::with_capacity(chunks.len());
    for batch in chunks.chunks(config.embedding.batch_size) {
        let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();
        let batch_vectors = embedding::embed_texts(config, &texts).await?;
        debug!(batch = batch.len(), "embedded batch");
        vectors.extend(batch_vectors);
    }

    let index = NoteIndex::create(config).await?;
    if let Err(e) = index.store(&notes, &chunks, &vectors, config).await {
        index.close().await;
        let _ = std::fs::remove_file(config.index_path());
        return Err(e);
    }
    index.close().await;

    println!("ingest {}", config.notes.repo_url);
    println!("  notes: {}", notes.len());
    println!("  chunks: {}", chunks.len());
    println!("  embeddings: {}", vectors.len());
    println!("  index: {}", config.index_path().display());
    println!("ok");

    Ok(())
}
