//! OpenAI embeddings client and vector utilities.
//!
//! Calls the `POST /v1/embeddings` endpoint with the configured model. The
//! API key comes from the [`Config`] resolved at startup; a missing key
//! surfaces here as an authentication error on first use. Every call is
//! attempted exactly once — there is no retry layer.
//!
//! Also provides the vector helpers used by the index:
//! - [`vec_to_blob`] — encode a `Vec<f32>` as little-endian bytes for SQLite
//! - [`blob_to_vec`] — decode a SQLite BLOB back into a `Vec<f32>`
//! - [`cosine_similarity`] — compare two embedding vectors

use anyhow::{bail, Result};
use std::time::Duration;

use crate::config::Config;

/// Embed a batch of texts, returning one vector per input text in order.
///
/// # Errors
///
/// Fails if no API key was resolved, the API returns a non-success status,
/// or the response shape does not match the configured dimensionality.
pub async fn embed_texts(config: &Config, texts: &[String]) -> Result<Vec<Vec<f32>>> {
    let api_key = config.openai_api_key.as_deref().ok_or_else(|| {
        anyhow::anyhow!(
            "OpenAI API key not set. Pass --openai-api-key, set OPENAI_API_KEY, or add it to .env"
        )
    })?;

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.embedding.timeout_secs))
        .build()?;

    let body = serde_json::json!({
        "model": config.embedding.model,
        "input": texts,
    });

    let response = client
        .post(format!("{}/v1/embeddings", config.embedding.api_base))
        .header("Authorization", format!("Bearer {}", api_key))
        .header("Content-Type", "application/json")
        .json(&body)
        .send()
        .await?;

    let status = response.status();
    if !status.is_success() {
        let body_text = response.text().await.unwrap_or_default();
        bail!("OpenAI embeddings API error {}: {}", status, body_text);
    }

    let json: serde_json::Value = response.json().await?;
    let vectors = parse_embeddings_response(&json)?;

    if vectors.len() != texts.len() {
        bail!(
            "Embedding count mismatch: sent {} texts, got {} vectors",
            texts.len(),
            vectors.len()
        );
    }
    for vec in &vectors {
        if vec.len() != config.embedding.dims {
            bail!(
                "Embedding dims mismatch: model returned {}, config says {}",
                vec.len(),
                config.embedding.dims
            );
        }
    }

    Ok(vectors)
}

/// Embed a single query text. Convenience wrapper around [`embed_texts`] for
/// the retrieval path.
pub async fn embed_query(config: &Config, text: &str) -> Result<Vec<f32>> {
    let results = embed_texts(config, &[text.to_string()]).await?;
    results
        .into_iter()
        .next()
        .ok_or_else(|| anyhow::anyhow!("Empty embedding response"))
}

/// Extract the `data[].embedding` arrays from the API response, in order.
fn parse_embeddings_response(json: &serde_json::Value) -> Result<Vec<Vec<f32>>> {
    let data = json
        .get("data")
        .and_then(|d| d.as_array())
        .ok_or_else(|| anyhow::anyhow!("Invalid embeddings response: missing data array"))?;

    let mut embeddings = Vec::with_capacity(data.len());

    for item in data {
        let embedding = item
            .get("embedding")
            .and_then(|e| e.as_array())
            .ok_or_else(|| anyhow::anyhow!("Invalid embeddings response: missing embedding"))?;

        let vec: Vec<f32> = embedding
            .iter()
            .map(|v| v.as_f64().unwrap_or(0.0) as f32)
            .collect();

        embeddings.push(vec);
    }

    Ok(embeddings)
}

/// Encode a float vector as a BLOB (little-endian f32 bytes).
pub fn vec_to_blob(vec: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vec.len() * 4);
    for &v in vec {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes
}

/// Decode a BLOB back into a float vector.
pub fn blob_to_vec(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

/// Compute cosine similarity between two embedding vectors.
///
/// Returns a value in `[-1.0, 1.0]`; `0.0` for empty vectors or vectors of
/// different lengths.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < f32::EPSILON {
        return 0.0;
    }

    dot / denom
}
