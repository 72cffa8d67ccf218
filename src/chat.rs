//! Conversational retrieval loop and session wrapper.
//!
//! A [`ChatSession`] owns the conversation memory for one session: every
//! successful turn appends a (question, answer) pair, in order, without
//! bound — there is no truncation or summarization. Memory lives only for
//! the life of the process.
//!
//! Each turn embeds the question with the same embedding configuration used
//! at ingestion, retrieves the top-k chunks, and sends retrieved context plus
//! the full memory to the chat model.

use anyhow::Result;
use uuid::Uuid;

use crate::config::Config;
use crate::embedding;
use crate::index::NoteIndex;
use crate::llm::{ChatClient, ChatMessage};
use crate::models::{ChatTurn, ScoredChunk};

/// One chat session: a unique identity plus its conversation memory.
pub struct ChatSession {
    pub id: Uuid,
    memory: Vec<ChatTurn>,
}

impl ChatSession {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            memory: Vec::new(),
        }
    }

    /// The conversation so far, oldest first.
    pub fn memory(&self) -> &[ChatTurn] {
        &self.memory
    }

    /// Answer one question: embed → retrieve → generate → remember.
    ///
    /// A failed turn propagates the error and appends nothing; the session
    /// remains usable for the next turn.
    pub async fn answer(
        &mut self,
        question: &str,
        config: &Config,
        index: &NoteIndex,
        llm: &dyn ChatClient,
    ) -> Result<String> {
        let query_vec = embedding::embed_query(config, question).await?;
        let hits = index.top_k(&query_vec, config.retrieval.top_k).await?;

        let messages = build_messages(&hits, &self.memory, question);
        let answer = llm.complete(&messages).await?;

        self.memory.push(ChatTurn {
            question: question.to_string(),
            answer: answer.clone(),
        });

        Ok(answer)
    }
}

impl Default for ChatSession {
    fn default() -> Self {
        Self::new()
    }
}

/// Assemble the completion request: retrieved context in the system message,
/// then the full memory as alternating user/assistant messages, then the new
/// question.
fn build_messages(hits: &[ScoredChunk], memory: &[ChatTurn], question: &str) -> Vec<ChatMessage> {
    let mut context = String::from(
        "You are NoteBot, an assistant for a personal collection of markdown notes. \
         Answer questions using the note excerpts below. If the excerpts do not \
         contain the answer, say that the notes do not cover it.\n\nNote excerpts:\n",
    );
    for hit in hits {
        context.push_str(&format!("\n[note: {}]\n{}\n", hit.note_path, hit.text));
    }

    let mut messages = vec![ChatMessage::system(context)];
    for turn in memory {
        messages.push(ChatMessage::user(turn.question.clone()));
        messages.push(ChatMessage::assistant(turn.answer.clone()));
    }
    messages.push(ChatMessage::user(question.to_string()));

    messages
}

/// The chat surface handed to the UI shell.
///
/// Owns the index handle, the chat client, and one [`ChatSession`].
pub struct NoteBot {
    config: Config,
    index: NoteIndex,
    llm: Box<dyn ChatClient>,
    session: ChatSession,
}

impl NoteBot {
    pub fn new(config: Config, index: NoteIndex, llm: Box<dyn ChatClient>) -> Self {
        Self {
            config,
            index,
            llm,
            session: ChatSession::new(),
        }
    }

    /// Answer one user message.
    ///
    /// The `history` parameter exists for interface compatibility with chat
    /// front ends that resend the transcript each turn. It is ignored: the
    /// internal [`ChatSession`] memory is the single source of truth, so a
    /// caller-supplied transcript can never fork the session state.
    pub async fn chat(&mut self, message: &str, _history: &[ChatTurn]) -> Result<String> {
        self.session
            .answer(message, &self.config, &self.index, self.llm.as_ref())
            .await
    }

    pub fn session(&self) -> &ChatSession {
        &self.session
    }
}
