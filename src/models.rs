//! Core data models used throughout NoteBot.
//!
//! These types represent the notes, chunks, and chat turns that flow through
//! the ingestion and retrieval pipeline.

/// A markdown note pulled from the checkout, identified by its repo-relative
/// path. Immutable once handed to the chunker.
#[derive(Debug, Clone)]
pub struct NoteDocument {
    pub path: String,
    pub body: String,
}

/// A chunk of a note's body text.
#[derive(Debug, Clone)]
pub struct Chunk {
    pub id: String,
    pub note_path: String,
    pub chunk_index: i64,
    pub text: String,
    pub hash: String,
}

/// A chunk returned from the index with its similarity score.
#[derive(Debug, Clone)]
pub struct ScoredChunk {
    pub note_path: String,
    pub chunk_index: i64,
    pub text: String,
    pub score: f32,
}

/// One completed question/answer exchange in a chat session.
#[derive(Debug, Clone)]
pub struct ChatTurn {
    pub question: String,
    pub answer: String,
}
