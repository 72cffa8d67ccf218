//! Cache and index status.
//!
//! Reports the two pieces of local state the startup guard existence-checks:
//! the notes checkout and the serialized index. For an existing index it also
//! prints counts and the recorded embedding model.

use anyhow::Result;

use crate::config::Config;
use crate::index::NoteIndex;

pub async fn run_status(config: &Config) -> Result<()> {
    let notes_path = config.notes_path();
    let index_path = config.index_path();

    println!("{:<16} {}", "repo:", config.notes.repo_url);
    println!(
        "{:<16} {} ({})",
        "checkout:",
        notes_path.display(),
        if notes_path.exists() { "present" } else { "absent" }
    );

    if !index_path.exists() {
        println!("{:<16} {} (absent)", "index:", index_path.display());
        println!();
        println!("Run `notebot ingest` (or `notebot chat`) to build the index.");
        return Ok(());
    }

    println!("{:<16} {} (present)", "index:", index_path.display());

    let index = NoteIndex::open(config).await?;
    let (notes, chunks) = index.counts().await?;
    let (model, dims) = index.recorded_model().await?;
    index.close().await;

    println!("{:<16} {}", "notes:", notes);
    println!("{:<16} {}", "chunks:", chunks);
    println!("{:<16} {} ({} dims)", "embedding:", model, dims);

    Ok(())
}
