//! Line-oriented chat loop.
//!
//! Each input line is either a slash command or a question for the loaded
//! documents:
//!
//! | Input | Effect |
//! |-------|--------|
//! | `/docs` | List loaded documents |
//! | `/remove <filename>` | Unload a document |
//! | `/personality [key]` | Show or switch the personality |
//! | `/analyze <kind>` | Run summary, key_points, sentiment, themes or mind_map |
//! | `/stats` | Session totals |
//! | `/clear` | Forget the conversation |
//! | `/help` | Show commands |
//! | `/quit` | Leave |
//!
//! Input and output are injected so the loop runs the same against a
//! terminal and in tests.

use anyhow::Result;
use std::io::Write;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};

use docchat_core::generation::Generator;
use docchat_core::models::Message;
use docchat_core::personality::Personality;
use docchat_core::prompt::AnalysisKind;
use docchat_core::session::ChatSession;

const HELP: &str = "Commands: /docs, /remove <filename>, /personality [key], \
/analyze <kind>, /stats, /clear, /help, /quit. Anything else is a question.";

/// Parsed input line.
#[derive(Debug, PartialEq)]
pub enum Input<'a> {
    Ask(&'a str),
    Docs,
    Remove(&'a str),
    Personality(Option<&'a str>),
    Analyze(&'a str),
    Stats,
    Clear,
    Help,
    Quit,
    Unknown(&'a str),
    Blank,
}

pub fn parse_input(line: &str) -> Input<'_> {
    let line = line.trim();
    if line.is_empty() {
        return Input::Blank;
    }
    let Some(command) = line.strip_prefix('/') else {
        return Input::Ask(line);
    };
    let (name, arg) = match command.split_once(char::is_whitespace) {
        Some((n, a)) => (n, a.trim()),
        None => (command, ""),
    };
    match name {
        "docs" => Input::Docs,
        "remove" => Input::Remove(arg),
        "personality" => Input::Personality((!arg.is_empty()).then_some(arg)),
        "analyze" => Input::Analyze(arg),
        "stats" => Input::Stats,
        "clear" => Input::Clear,
        "help" => Input::Help,
        "quit" | "exit" => Input::Quit,
        _ => Input::Unknown(name),
    }
}

/// Print an assistant reply followed by its sources.
pub fn write_reply<W: Write>(out: &mut W, reply: &Message) -> Result<()> {
    writeln!(out, "{}", reply.text)?;
    if !reply.citations.is_empty() {
        writeln!(out, "Sources:")?;
        for c in &reply.citations {
            writeln!(out, "  [{:.2}] {} (chunk {})", c.score, c.filename, c.ordinal)?;
        }
    }
    Ok(())
}

pub async fn run_repl<R, W>(
    session: &mut ChatSession,
    generator: &dyn Generator,
    input: R,
    out: &mut W,
) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    W: Write,
{
    writeln!(
        out,
        "{} document(s) loaded. Personality: {}. {}",
        session.documents().len(),
        session.personality().name(),
        HELP
    )?;

    let mut lines = input.lines();
    loop {
        write!(out, "> ")?;
        out.flush()?;
        let Some(line) = lines.next_line().await? else {
            break;
        };

        match parse_input(&line) {
            Input::Blank => {}
            Input::Quit => break,
            Input::Help => writeln!(out, "{}", HELP)?,
            Input::Unknown(name) => writeln!(out, "Unknown command /{}. {}", name, HELP)?,
            Input::Ask(question) => {
                let reply = session.ask(question, generator).await;
                write_reply(out, &reply)?;
            }
            Input::Docs => {
                if session.documents().is_empty() {
                    writeln!(out, "No documents loaded.")?;
                }
                for doc in session.documents() {
                    let s = doc.stats();
                    writeln!(
                        out,
                        "  {} ({}, {} words, {} chunks)",
                        s.filename, s.format, s.word_count, s.chunk_count
                    )?;
                }
            }
            Input::Remove(filename) => match session.find_document(filename).map(|d| d.id) {
                Some(id) => {
                    session.remove_document(id);
                    writeln!(out, "Removed {}.", filename)?;
                }
                None => writeln!(out, "No document named '{}'.", filename)?,
            },
            Input::Personality(None) => {
                for p in Personality::ALL {
                    let marker = if p == session.personality() { "*" } else { " " };
                    writeln!(out, "{} {:<10} {}: {}", marker, p.key(), p.name(), p.description())?;
                }
            }
            Input::Personality(Some(key)) => match key.parse::<Personality>() {
                Ok(p) => {
                    session.set_personality(p);
                    writeln!(out, "Personality set to {}.", p.name())?;
                }
                Err(e) => writeln!(out, "{}", e)?,
            },
            Input::Analyze(kind) => match kind.parse::<AnalysisKind>() {
                Ok(kind) if session.documents().is_empty() => {
                    writeln!(out, "Load documents before running {}.", kind)?;
                }
                Ok(AnalysisKind::MindMap) => match session.mind_map(generator).await {
                    Ok(map) => writeln!(out, "{}", map.to_markdown())?,
                    Err(e) => writeln!(out, "{}", e.user_message())?,
                },
                Ok(kind) => match session.analyze(kind, generator).await {
                    Ok(text) => writeln!(out, "{}", text)?,
                    Err(e) => writeln!(out, "{}", e.user_message())?,
                },
                Err(e) => writeln!(out, "{}", e)?,
            },
            Input::Stats => {
                let s = session.stats();
                writeln!(
                    out,
                    "{} documents, {} chunks, {} terms, {} messages",
                    s.documents, s.chunks, s.vocabulary, s.messages
                )?;
            }
            Input::Clear => {
                session.clear_history();
                writeln!(out, "Conversation cleared.")?;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use docchat_core::error::GenerationError;
    use docchat_core::models::DocumentFormat;
    use docchat_core::prompt::Prompt;
    use docchat_core::session::SessionSettings;
    use std::time::Duration;

    struct Fixed;

    #[async_trait]
    impl Generator for Fixed {
        fn name(&self) -> &str {
            "fixed"
        }

        async fn generate(&self, prompt: &Prompt, _timeout: Duration) -> Result<String, GenerationError> {
            if prompt.user.starts_with("Create a mind map") {
                return Ok("```json\n{\"title\": \"Pets\", \"themes\": [{\"name\": \"Dogs\", \"sub_themes\": [\"Running\"],}]}\n```".to_string());
            }
            Ok("It ran home.".to_string())
        }
    }

    #[tokio::test]
    async fn test_repl_mind_map() {
        let mut session = ChatSession::new(SessionSettings::default()).unwrap();
        session
            .add_text("dog.txt", DocumentFormat::Text, "The dog ran home.")
            .unwrap();
        let mut out = Vec::new();
        run_repl(&mut session, &Fixed, "/analyze mind_map\n".as_bytes(), &mut out)
            .await
            .unwrap();
        let out = String::from_utf8(out).unwrap();
        assert!(out.contains("# Pets\n\n## Dogs\n\n### Running"));
        assert!(session.messages().is_empty());
    }

    #[test]
    fn test_parse_input() {
        assert_eq!(parse_input("  where? "), Input::Ask("where?"));
        assert_eq!(parse_input("/remove a b.txt"), Input::Remove("a b.txt"));
        assert_eq!(parse_input("/personality"), Input::Personality(None));
        assert_eq!(parse_input("/personality lawyer"), Input::Personality(Some("lawyer")));
        assert_eq!(parse_input("/exit"), Input::Quit);
        assert_eq!(parse_input("/bogus"), Input::Unknown("bogus"));
        assert_eq!(parse_input(""), Input::Blank);
    }

    #[tokio::test]
    async fn test_repl_session() {
        let mut session = ChatSession::new(SessionSettings::default()).unwrap();
        session
            .add_text("dog.txt", DocumentFormat::Text, "The dog ran home.")
            .unwrap();
        let script = "Where did the dog go?\n/personality student\n/remove dog.txt\n/docs\n/quit\nignored\n";
        let mut out = Vec::new();
        run_repl(&mut session, &Fixed, script.as_bytes(), &mut out)
            .await
            .unwrap();
        let out = String::from_utf8(out).unwrap();

        assert!(out.contains("It ran home."));
        assert!(out.contains("dog.txt (chunk 0)"));
        assert!(out.contains("Personality set to Study Assistant."));
        assert!(out.contains("Removed dog.txt."));
        assert!(out.contains("No documents loaded."));
        assert_eq!(session.messages().len(), 2);
        assert_eq!(session.personality(), Personality::Student);
    }
}
