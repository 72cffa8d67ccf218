//! Interactive chat REPL.
//!
//! Prompts for questions with readline history and prints answers. A failed
//! turn prints the error and keeps the session alive; `/quit`, `/exit`,
//! Ctrl-C, and Ctrl-D leave the loop.

use anyhow::Result;
use colored::Colorize;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;

use crate::chat::NoteBot;

/// Example prompts surfaced in the banner.
const EXAMPLES: [&str; 3] = [
    "List the title of all notes I can ask you about",
    "Generate a brief summary of my LangChain notes",
    "Do I have some notes related to COBOL?",
];

/// Run the interactive loop until the user leaves.
pub async fn run_shell(mut bot: NoteBot) -> Result<()> {
    let mut rl = DefaultEditor::new()?;

    println!("{}", "NoteBot".bold().green());
    println!("Ask questions about your notes. Type {} to exit.", "/quit".yellow());
    println!("{}", "Try for example:".dimmed());
    for example in EXAMPLES {
        println!("{}", format!("  - {}", example).dimmed());
    }
    println!();

    let prompt = format!("{}> ", "notebot".green());
    loop {
        match rl.readline(&prompt) {
            Ok(line) => {
                let trimmed = line.trim();
                if trimmed == "/quit" || trimmed == "/exit" {
                    break;
                }
                if trimmed.is_empty() {
                    continue;
                }

                let _ = rl.add_history_entry(&line);

                // A failed turn is not fatal; the next one may succeed.
                match bot.chat(trimmed, &[]).await {
                    Ok(answer) => {
                        println!("{}\n", answer);
                    }
                    Err(e) => {
                        eprintln!("{}: {:#}", "error".red(), e);
                    }
                }
            }
            Err(ReadlineError::Interrupted) => {
                // Ctrl+C
                break;
            }
            Err(ReadlineError::Eof) => {
                // Ctrl+D
                break;
            }
            Err(e) => {
                eprintln!("{}: {}", "error".red(), e);
                break;
            }
        }
    }

    println!("{}", "goodbye".dimmed());
    Ok(())
}
