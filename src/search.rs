//! Retrieval inspection command.
//!
//! Embeds a query and prints the chunks the chat loop would hand to the
//! model, with their similarity scores. Useful for checking what the index
//! actually returns before blaming the language model.

use anyhow::Result;

use crate::config::Config;
use crate::embedding;
use crate::index::NoteIndex;

pub async fn run_search(config: &Config, query: &str, limit: Option<usize>) -> Result<()> {
    if query.trim().is_empty() {
        println!("No results.");
        return Ok(());
    }

    let index = NoteIndex::open(config).await?;
    let k = limit.unwrap_or(config.retrieval.top_k);

    let query_vec = embedding::embed_query(config, query).await?;
    let hits = index.top_k(&query_vec, k).await?;

    if hits.is_empty() {
        println!("No results.");
        index.close().await;
        return Ok(());
    }

    for (i, hit) in hits.iter().enumerate() {
        let excerpt: String = hit.text.chars().take(240).collect();
        println!(
            "{}. [{:.3}] {} #{}",
            i + 1,
            hit.score,
            hit.note_path,
            hit.chunk_index
        );
        println!("    excerpt: \"{}\"", excerpt.replace('\n', " "));
        println!();
    }

    index.close().await;
    Ok(())
}
