//! Verifier code acquisition
//!
//! The handshake needs a short code that E*TRADE only shows to a logged-in
//! user on the authorize page. How that code is obtained is up to the caller:
//! a person pasting it into a terminal, a browser-automation script, or any
//! other out-of-band agent. Acquisition may take minutes; callers must not
//! wrap it in a short timeout.

use std::future::Future;
use std::pin::Pin;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{debug, info};

use crate::error::{Error, Result};

/// Turns an authorize URL into a verifier code.
///
/// Uses `Pin<Box<dyn Future>>` so implementations can be held as
/// `Arc<dyn VerifierAcquirer>`.
pub trait VerifierAcquirer: Send + Sync {
    fn acquire<'a>(
        &'a self,
        authorize_url: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<String>> + Send + 'a>>;
}

/// Interactive acquirer: prints the URL on stderr and reads one line from stdin.
#[derive(Debug, Default)]
pub struct PromptVerifier;

impl VerifierAcquirer for PromptVerifier {
    fn acquire<'a>(
        &'a self,
        authorize_url: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<String>> + Send + 'a>> {
        Box::pin(async move {
            let prompt = format!(
                "Open this URL, approve access, and paste the verification code:\n{authorize_url}\ncode> "
            );
            let mut stderr = tokio::io::stderr();
            stderr
                .write_all(prompt.as_bytes())
                .await
                .map_err(|e| Error::Verifier(format!("writing prompt: {e}")))?;
            stderr
                .flush()
                .await
                .map_err(|e| Error::Verifier(format!("writing prompt: {e}")))?;

            let mut line = String::new();
            BufReader::new(tokio::io::stdin())
                .read_line(&mut line)
                .await
                .map_err(|e| Error::Verifier(format!("reading stdin: {e}")))?;

            non_empty_code(&line)
        })
    }
}

/// Runs an external program with the authorize URL appended as its last
/// argument and takes the verifier from its trimmed stdout.
///
/// This is the hook for browser automation: the program logs in, accepts the
/// terms page, and prints the code.
#[derive(Debug, Clone)]
pub struct CommandVerifier {
    program: String,
    args: Vec<String>,
}

impl CommandVerifier {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }
}

impl VerifierAcquirer for CommandVerifier {
    fn acquire<'a>(
        &'a self,
        authorize_url: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<String>> + Send + 'a>> {
        Box::pin(async move {
            info!(program = %self.program, "running verifier command");
            let output = tokio::process::Command::new(&self.program)
                .args(&self.args)
                .arg(authorize_url)
                .stdin(std::process::Stdio::null())
                .output()
                .await
                .map_err(|e| Error::Verifier(format!("spawning {}: {e}", self.program)))?;

            if !output.status.success() {
                let stderr = String::from_utf8_lossy(&output.stderr);
                return Err(Error::Verifier(format!(
                    "{} exited with {}: {}",
                    self.program,
                    output.status,
                    stderr.trim()
                )));
            }

            debug!(program = %self.program, "verifier command finished");
            non_empty_code(&String::from_utf8_lossy(&output.stdout))
        })
    }
}

fn non_empty_code(raw: &str) -> Result<String> {
    let code = raw.trim();
    if code.is_empty() {
        return Err(Error::Verifier("empty verifier code".into()));
    }
    Ok(code.to_owned())
}
