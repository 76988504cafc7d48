//! Generator backed by an external program
//!
//! The program receives one JSON request on stdin and must print one JSON response on
//! stdout before exiting:
//!
//! ```text
//! {"op":"suggest","context":{...},"count":3}        -> {"suggestions":[{"text":...}]}
//! {"op":"fill_section","document":...,"heading":...,"outline":[...]} -> {"content":...}
//! {"op":"review","document":...}                    -> {"critique":...,"weaknesses":...,"strengths":...}
//! ```

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use super::{DocumentReview, GenerateError, Generator, SectionContent, Suggestion, WritingContext};

#[derive(Debug, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
enum Request<'a> {
    Suggest {
        context: &'a WritingContext,
        count: usize,
    },
    FillSection {
        document: &'a str,
        heading: &'a str,
        outline: &'a [String],
    },
    Review {
        document: &'a str,
    },
}

#[derive(Debug, Deserialize)]
struct SuggestResponse {
    suggestions: Vec<Suggestion>,
}

#[derive(Debug, Deserialize)]
struct FillResponse {
    content: String,
}

/// Runs a configured program per request
#[derive(Debug, Clone)]
pub struct CommandGenerator {
    program: String,
    args: Vec<String>,
    timeout: Duration,
}

impl CommandGenerator {
    pub fn new(program: impl Into<String>, args: Vec<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            args,
            timeout,
        }
    }

    async fn call<T: DeserializeOwned>(&self, request: &Request<'_>) -> Result<T, GenerateError> {
        let body = serde_json::to_vec(request)?;
        debug!(program = %self.program, len = body.len(), "CommandGenerator::call: spawning");

        let output = match tokio::time::timeout(self.timeout, self.run(&body)).await {
            Ok(result) => result?,
            Err(_) => {
                warn!(program = %self.program, timeout = ?self.timeout, "CommandGenerator::call: timed out");
                return Err(GenerateError::Timeout(self.timeout));
            }
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            debug!(status = ?output.status, "CommandGenerator::call: command failed");
            return Err(GenerateError::Command(format!(
                "exit code {}: {}",
                output.status.code().unwrap_or(-1),
                stderr.trim()
            )));
        }

        serde_json::from_slice(&output.stdout).map_err(|e| {
            debug!(error = %e, "CommandGenerator::call: unparsable response");
            GenerateError::InvalidResponse(format!("{}: {}", e, String::from_utf8_lossy(&output.stdout).trim()))
        })
    }

    async fn run(&self, body: &[u8]) -> Result<std::process::Output, GenerateError> {
        let mut child = tokio::process::Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| GenerateError::Command(format!("failed to start {}: {}", self.program, e)))?;

        if let Some(mut stdin) = child.stdin.take() {
            // A program that ignores its input may exit before reading it
            if let Err(e) = stdin.write_all(body).await {
                debug!(error = %e, "CommandGenerator::run: stdin write failed");
            }
        }

        Ok(child.wait_with_output().await?)
    }
}

#[async_trait]
impl Generator for CommandGenerator {
    async fn suggest(&self, context: &WritingContext, count: usize) -> Result<Vec<Suggestion>, GenerateError> {
        debug!(%count, "CommandGenerator::suggest: called");
        let response: SuggestResponse = self.call(&Request::Suggest { context, count }).await?;
        Ok(response.suggestions.into_iter().take(count).collect())
    }

    async fn fill_section(
        &self,
        document: &str,
        heading: &str,
        outline: &[String],
    ) -> Result<SectionContent, GenerateError> {
        debug!(%heading, "CommandGenerator::fill_section: called");
        let response: FillResponse = self
            .call(&Request::FillSection {
                document,
                heading,
                outline,
            })
            .await?;
        Ok(SectionContent {
            heading: heading.to_string(),
            content: response.content,
        })
    }

    async fn review(&self, document: &str) -> Result<DocumentReview, GenerateError> {
        debug!("CommandGenerator::review: called");
        self.call(&Request::Review { document }).await
    }
}
