//! Interactive search session.

use anyhow::{Context, Result};
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;

use spark::config::Config;
use spark::search::{ChatMessage, Role};

use super::common::{build_engine, print_event, print_extras};

const QUIT_COMMANDS: [&str; 2] = ["/quit", "/exit"];
const HISTORY_COMMAND: &str = "/history";

fn is_quit_command(input: &str) -> bool {
    QUIT_COMMANDS.contains(&input)
}

/// Questions asked so far in this session, oldest first.
fn asked_questions(history: &[ChatMessage]) -> Vec<&str> {
    history
        .iter()
        .filter(|m| m.role == Role::User)
        .map(|m| m.content.as_str())
        .collect()
}

pub(crate) async fn cmd_chat(config: Config) -> Result<()> {
    let engine = build_engine(&config)?;
    let mut editor = DefaultEditor::new().context("Failed to initialize line editor")?;
    let mut history: Vec<ChatMessage> = Vec::new();

    println!(
        "Spark search ({}). Type /history to list questions, /quit to exit.",
        engine.provider().engine_label()
    );
    println!();

    loop {
        let line = match editor.readline("search> ") {
            Ok(line) => line,
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
            Err(e) => return Err(e).context("Failed to read input"),
        };

        let query = line.trim();
        if query.is_empty() {
            continue;
        }
        if is_quit_command(query) {
            break;
        }
        if query == HISTORY_COMMAND {
            for (i, q) in asked_questions(&history).iter().enumerate() {
                println!("{:>3}. {}", i + 1, q);
            }
            continue;
        }
        let _ = editor.add_history_entry(query);

        history.push(ChatMessage::user(query));
        // One search at a time: the next prompt waits for this answer.
        let message = engine.answer(query, None, print_event).await;
        print_extras(&message);
        println!();
        history.push(message);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use spark::search::AnswerBuilder;

    #[test]
    fn test_only_slash_commands_quit() {
        assert!(is_quit_command("/quit"));
        assert!(is_quit_command("/exit"));
        assert!(!is_quit_command("quit"));
        assert!(!is_quit_command("exit strategies"));
    }

    #[test]
    fn test_asked_questions_skips_answers() {
        let history = vec![
            ChatMessage::user("first"),
            AnswerBuilder::new().finish(),
            ChatMessage::user("second"),
        ];
        assert_eq!(asked_questions(&history), vec!["first", "second"]);
    }
}
