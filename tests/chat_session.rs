//! End-to-end tests for the ingestion pipeline and the conversational
//! retrieval loop, with the embeddings API stubbed out and a scripted chat
//! client.

use std::fs;
use std::path::Path;
use std::process::Command;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::Result;
use async_trait::async_trait;
use serde_json::json;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use notebot::chat::{ChatSession, NoteBot};
use notebot::config::Config;
use notebot::index::NoteIndex;
use notebot::ingest;
use notebot::llm::{ChatClient, ChatMessage};
use notebot::models::ChatTurn;

// ============ Fixtures ============

fn git(dir: &Path, args: &[&str]) {
    let output = Command::new("git")
        .args(args)
        .current_dir(dir)
        .output()
        .unwrap();
    assert!(
        output.status.success(),
        "git {:?} failed: {}",
        args,
        String::from_utf8_lossy(&output.stderr)
    );
}

/// Three markdown notes, a README, and a text file — only the notes may be
/// ingested.
fn make_notes_repo(dir: &Path) {
    fs::create_dir_all(dir).unwrap();
    fs::write(
        dir.join("cobol.md"),
        "# COBOL\n\nMainframe batch jobs and copybooks live here.",
    )
    .unwrap();
    fs::write(
        dir.join("langchain.md"),
        "# LangChain\n\nChains, retrievers, and prompt templates.",
    )
    .unwrap();
    fs::write(
        dir.join("rust.md"),
        "# Rust\n\nOwnership, borrowing, and cargo workspaces.",
    )
    .unwrap();
    fs::write(dir.join("README.md"), "# My notes\n\nIndex of everything.").unwrap();
    fs::write(dir.join("todo.txt"), "not a note").unwrap();

    git(dir, &["init"]);
    git(dir, &["add", "."]);
    git(
        dir,
        &[
            "-c",
            "user.name=test",
            "-c",
            "user.email=test@example.com",
            "commit",
            "-m",
            "init",
            "--no-gpg-sign",
        ],
    );
    git(dir, &["branch", "-M", "main"]);
}

fn test_config(data_dir: &Path, repo: &Path, api_base: &str) -> Config {
    let mut config: Config = toml::from_str("").unwrap();
    config.data.dir = data_dir.to_path_buf();
    config.notes.repo_url = repo.display().to_string();
    config.embedding.dims = 3;
    config.embedding.api_base = api_base.to_string();
    config.llm.api_base = api_base.to_string();
    config.openai_api_key = Some("sk-test".to_string());
    config
}

/// Clone, chunk, and embed the fixture repo against the mock server, then
/// swap the embeddings stub for a query-shaped one (a single vector pointing
/// at the COBOL note).
async fn build_indexed_config(tmp: &TempDir, server: &MockServer) -> Config {
    let repo = tmp.path().join("repo");
    make_notes_repo(&repo);
    let config = test_config(&tmp.path().join("data"), &repo, &server.uri());

    // Notes are collected sorted by path (cobol, langchain, rust), one chunk
    // each, so the batch response is positional.
    Mock::given(method("POST"))
        .and(path("/v1/embeddings"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [
                {"embedding": [0.0, 0.0, 1.0]},
                {"embedding": [0.0, 1.0, 0.0]},
                {"embedding": [1.0, 0.0, 0.0]},
            ]
        })))
        .mount(server)
        .await;

    ingest::run_ingest(&config).await.unwrap();

    server.reset().await;
    Mock::given(method("POST"))
        .and(path("/v1/embeddings"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [{"embedding": [0.0, 0.0, 1.0]}]
        })))
        .mount(server)
        .await;

    config
}

// ============ Scripted chat client ============

#[derive(Default)]
struct MockChat {
    captured: Mutex<Vec<Vec<ChatMessage>>>,
    fail_next: AtomicBool,
}

#[async_trait]
impl ChatClient for MockChat {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String> {
        if self.fail_next.swap(false, Ordering::SeqCst) {
            anyhow::bail!("simulated completion failure");
        }
        let mut captured = self.captured.lock().unwrap();
        captured.push(messages.to_vec());
        Ok(format!("answer {}", captured.len()))
    }
}

/// Forwarding wrapper so a test can keep inspecting the mock after handing
/// the client to a `NoteBot`.
struct SharedChat(Arc<MockChat>);

#[async_trait]
impl ChatClient for SharedChat {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String> {
        self.0.complete(messages).await
    }
}

// ============ Tests ============

#[tokio::test(flavor = "multi_thread")]
async fn test_ingest_indexes_only_notes() {
    let tmp = TempDir::new().unwrap();
    let server = MockServer::start().await;
    let config = build_indexed_config(&tmp, &server).await;

    let index = NoteIndex::open(&config).await.unwrap();
    let (notes, chunks) = index.counts().await.unwrap();
    assert_eq!(notes, 3, "README and todo.txt must not be ingested");
    assert_eq!(chunks, 3);
    index.close().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn test_question_retrieves_matching_note() {
    let tmp = TempDir::new().unwrap();
    let server = MockServer::start().await;
    let config = build_indexed_config(&tmp, &server).await;

    let index = NoteIndex::open(&config).await.unwrap();
    let llm = MockChat::default();
    let mut session = ChatSession::new();

    let answer = session
        .answer(
            "Do I have some notes related to COBOL?",
            &config,
            &index,
            &llm,
        )
        .await
        .unwrap();
    assert_eq!(answer, "answer 1");

    // The chunk unique to the COBOL note must be in the retrieved context,
    // ranked first.
    let captured = llm.captured.lock().unwrap();
    let system = &captured[0][0];
    assert_eq!(system.role, "system");
    assert!(system.content.contains("[note: cobol.md]"));
    assert!(system.content.contains("Mainframe batch jobs"));
    let cobol_pos = system.content.find("cobol.md").unwrap();
    let rust_pos = system.content.find("rust.md").unwrap_or(usize::MAX);
    assert!(cobol_pos < rust_pos, "COBOL note should rank first");

    index.close().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn test_same_question_builds_identical_prompt() {
    let tmp = TempDir::new().unwrap();
    let server = MockServer::start().await;
    let config = build_indexed_config(&tmp, &server).await;

    let index = NoteIndex::open(&config).await.unwrap();
    let question = "Do I have some notes related to COBOL?";

    let llm_a = MockChat::default();
    let mut session_a = ChatSession::new();
    let answer_a = session_a.answer(question, &config, &index, &llm_a).await.unwrap();

    let llm_b = MockChat::default();
    let mut session_b = ChatSession::new();
    let answer_b = session_b.answer(question, &config, &index, &llm_b).await.unwrap();

    // With a fixed index, empty memory, and zero-randomness generation, two
    // sessions send the model byte-identical requests.
    let captured_a = llm_a.captured.lock().unwrap();
    let captured_b = llm_b.captured.lock().unwrap();
    assert_eq!(captured_a[0].len(), captured_b[0].len());
    for (a, b) in captured_a[0].iter().zip(captured_b[0].iter()) {
        assert_eq!(a.role, b.role);
        assert_eq!(a.content, b.content);
    }
    assert_eq!(answer_a, answer_b);

    index.close().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn test_memory_grows_in_order_and_survives_failed_turns() {
    let tmp = TempDir::new().unwrap();
    let server = MockServer::start().await;
    let config = build_indexed_config(&tmp, &server).await;

    let index = NoteIndex::open(&config).await.unwrap();
    let llm = MockChat::default();
    let mut session = ChatSession::new();

    for i in 1..=3 {
        let question = format!("question {}", i);
        let answer = session.answer(&question, &config, &index, &llm).await.unwrap();
        assert_eq!(answer, format!("answer {}", i));
    }

    let memory = session.memory();
    assert_eq!(memory.len(), 3);
    for (i, turn) in memory.iter().enumerate() {
        assert_eq!(turn.question, format!("question {}", i + 1));
        assert_eq!(turn.answer, format!("answer {}", i + 1));
    }

    // A failed turn appends nothing and leaves the session usable.
    llm.fail_next.store(true, Ordering::SeqCst);
    let err = session.answer("doomed", &config, &index, &llm).await;
    assert!(err.is_err());
    assert_eq!(session.memory().len(), 3);

    let answer = session.answer("question 4", &config, &index, &llm).await.unwrap();
    assert_eq!(answer, "answer 4");
    assert_eq!(session.memory().len(), 4);

    // Earlier turns appear in the prompt of later turns.
    let captured = llm.captured.lock().unwrap();
    let last = captured.last().unwrap();
    assert!(last.iter().any(|m| m.content == "question 1"));
    assert!(last.iter().any(|m| m.content == "answer 3"));

    index.close().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn test_wrapper_ignores_caller_supplied_history() {
    let tmp = TempDir::new().unwrap();
    let server = MockServer::start().await;
    let config = build_indexed_config(&tmp, &server).await;

    let index = NoteIndex::open(&config).await.unwrap();
    let mock = Arc::new(MockChat::default());
    let mut bot = NoteBot::new(config.clone(), index, Box::new(SharedChat(mock.clone())));

    let fake_history = vec![ChatTurn {
        question: "fabricated question".to_string(),
        answer: "fabricated answer".to_string(),
    }];

    let answer = bot.chat("What about Rust?", &fake_history).await.unwrap();
    assert_eq!(answer, "answer 1");

    // Internal memory is the source of truth: the fabricated transcript must
    // appear in neither the prompt nor the session memory.
    let captured = mock.captured.lock().unwrap();
    assert!(captured[0]
        .iter()
        .all(|m| !m.content.contains("fabricated question")));
    assert_eq!(bot.session().memory().len(), 1);
    assert_eq!(bot.session().memory()[0].question, "What about Rust?");
}
