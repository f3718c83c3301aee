use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::Mutex;

use crate::error::{AppError, Result};
use crate::review::{Breakpoint, Checkpoint, ReviewDecision, Reviewer};

type Input = BufReader<Box<dyn AsyncRead + Send + Unpin>>;
type Output = Box<dyn AsyncWrite + Send + Unpin>;

/// Terminal reviewer: prints breakpoints and reads decisions line by line.
///
/// Accepted answers: `a`/`approve`, `r`/`reject [reason]`,
/// `m`/`modify <feedback>`.
pub struct ConsoleReviewer {
    io: Mutex<(Input, Output)>,
}

impl ConsoleReviewer {
    pub fn new<R, W>(reader: R, writer: W) -> Self
    where
        R: AsyncRead + Send + Unpin + 'static,
        W: AsyncWrite + Send + Unpin + 'static,
    {
        let reader: Box<dyn AsyncRead + Send + Unpin> = Box::new(reader);
        let writer: Output = Box::new(writer);
        Self {
            io: Mutex::new((BufReader::new(reader), writer)),
        }
    }

    pub fn stdio() -> Self {
        Self::new(tokio::io::stdin(), tokio::io::stderr())
    }
}

fn render_breakpoint(breakpoint: &Breakpoint) -> String {
    let mut out = format!(
        "\n=== Breakpoint: {} ===\n{}\n",
        breakpoint.title, breakpoint.question
    );
    if let Ok(context) = serde_json::to_string_pretty(&breakpoint.context) {
        out.push_str(&format!("\nContext:\n{context}\n"));
    }
    if !breakpoint.artifacts.is_empty() {
        out.push_str("\nArtifacts:\n");
        for artifact in &breakpoint.artifacts {
            out.push_str(&format!("  - {}\n", artifact.path));
        }
    }
    out.push_str("\n[a]pprove / [r]eject [reason] / [m]odify <feedback> > ");
    out
}

/// Parse one reviewer answer. `None` means the answer was not understood.
pub fn parse_decision(line: &str) -> Option<ReviewDecision> {
    let line = line.trim();
    let (command, rest) = match line.split_once(char::is_whitespace) {
        Some((command, rest)) => (command, rest.trim()),
        None => (line, ""),
    };

    match command.to_ascii_lowercase().as_str() {
        "a" | "approve" | "y" | "yes" => Some(ReviewDecision::Approve),
        "r" | "reject" | "n" | "no" => Some(ReviewDecision::Reject {
            reason: (!rest.is_empty()).then(|| rest.to_string()),
        }),
        "m" | "modify" if !rest.is_empty() => Some(ReviewDecision::Modify {
            feedback: rest.to_string(),
        }),
        _ => None,
    }
}

#[async_trait]
impl Reviewer for ConsoleReviewer {
    async fn breakpoint(&self, breakpoint: &Breakpoint) -> Result<ReviewDecision> {
        let mut io = self.io.lock().await;
        let (reader, writer) = &mut *io;

        writer.write_all(render_breakpoint(breakpoint).as_bytes()).await?;
        writer.flush().await?;

        loop {
            let mut line = String::new();
            let read = reader.read_line(&mut line).await?;
            if read == 0 {
                return Err(AppError::Review(format!(
                    "Input closed while waiting on breakpoint '{}'",
                    breakpoint.title
                )));
            }

            if let Some(decision) = parse_decision(&line) {
                return Ok(decision);
            }

            writer
                .write_all(b"Please answer a, r [reason] or m <feedback> > ")
                .await?;
            writer.flush().await?;
        }
    }

    async fn checkpoint(&self, checkpoint: &Checkpoint) -> Result<()> {
        let mut io = self.io.lock().await;
        let (_, writer) = &mut *io;
        let context = serde_json::to_string_pretty(&checkpoint.context)?;
        writer
            .write_all(
                format!(
                    "\n--- Checkpoint: {} ---\n{}\n{}\n",
                    checkpoint.title, checkpoint.message, context
                )
                .as_bytes(),
            )
            .await?;
        writer.flush().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn breakpoint() -> Breakpoint {
        Breakpoint {
            title: "Scenario Coverage".to_string(),
            question: "Only 8 scenarios were planned. Continue?".to_string(),
            context: json!({ "scenarioCount": 8 }),
            artifacts: Vec::new(),
        }
    }

    #[test]
    fn test_parse_decision() {
        assert_eq!(parse_decision("a\n"), Some(ReviewDecision::Approve));
        assert_eq!(parse_decision("Approve"), Some(ReviewDecision::Approve));
        assert_eq!(
            parse_decision("r not enough coverage"),
            Some(ReviewDecision::Reject {
                reason: Some("not enough coverage".to_string())
            })
        );
        assert_eq!(
            parse_decision("reject"),
            Some(ReviewDecision::Reject { reason: None })
        );
        assert_eq!(
            parse_decision("m  add offline mode scenarios "),
            Some(ReviewDecision::Modify {
                feedback: "add offline mode scenarios".to_string()
            })
        );
        assert_eq!(parse_decision("m"), None);
        assert_eq!(parse_decision("maybe"), None);
    }

    #[tokio::test]
    async fn test_reprompts_until_understood() {
        let reviewer = ConsoleReviewer::new(&b"what\nm cover tablets\n"[..], tokio::io::sink());
        let decision = reviewer.breakpoint(&breakpoint()).await.unwrap();
        assert_eq!(
            decision,
            ReviewDecision::Modify {
                feedback: "cover tablets".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_closed_input_is_an_error() {
        let reviewer = ConsoleReviewer::new(&b""[..], tokio::io::sink());
        let err = reviewer.breakpoint(&breakpoint()).await.unwrap_err();
        assert!(matches!(err, AppError::Review(_)));
    }

    #[test]
    fn test_render_lists_context() {
        let rendered = render_breakpoint(&breakpoint());
        assert!(rendered.contains("Scenario Coverage"));
        assert!(rendered.contains("\"scenarioCount\": 8"));
    }
}
