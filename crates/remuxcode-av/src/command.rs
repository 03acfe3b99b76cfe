//! Command specifications and the executor that runs them.
//!
//! Decision pipelines only ever produce a [`CommandSpec`]. Running it is the
//! job of a [`CommandExecutor`], which is a trait so the worker pool can be
//! driven by a scripted executor in tests.

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use serde::Serialize;
use tokio::process::Command;

use crate::{Error, Result};

/// Keep this many trailing bytes of stderr for diagnostics.
const STDERR_EXCERPT_LEN: usize = 2000;

/// A fully resolved tool invocation: program name plus argument list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    /// Append a single argument.
    pub fn arg(&mut self, s: impl Into<String>) -> &mut Self {
        self.args.push(s.into());
        self
    }

    /// Append multiple arguments.
    pub fn args(&mut self, iter: impl IntoIterator<Item = impl Into<String>>) -> &mut Self {
        self.args.extend(iter.into_iter().map(Into::into));
        self
    }

    /// Position of the first occurrence of `flag`, if any.
    pub fn position(&self, flag: &str) -> Option<usize> {
        self.args.iter().position(|a| a == flag)
    }

    /// Value following the first occurrence of `flag`.
    pub fn value_of(&self, flag: &str) -> Option<&str> {
        self.position(flag)
            .and_then(|i| self.args.get(i + 1))
            .map(String::as_str)
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.program)?;
        for arg in &self.args {
            if arg.contains(char::is_whitespace) {
                write!(f, " '{}'", arg)?;
            } else {
                write!(f, " {}", arg)?;
            }
        }
        Ok(())
    }
}

/// What a successful run leaves behind.
#[derive(Debug, Clone, Default)]
pub struct ToolOutput {
    pub exit_code: Option<i32>,
    /// Tail of stderr, lossy UTF-8.
    pub stderr_excerpt: String,
}

/// Runs command specifications. Each call is one attempt; implementations do
/// not retry.
#[async_trait::async_trait]
pub trait CommandExecutor: Send + Sync {
    /// Run `spec`, killing it if `timeout` elapses. `None` means no deadline.
    async fn run(&self, spec: &CommandSpec, timeout: Option<Duration>) -> Result<ToolOutput>;
}

/// Convert a timeout in seconds to an optional deadline; zero means unbounded.
pub fn timeout_from_secs(secs: u64) -> Option<Duration> {
    (secs > 0).then(|| Duration::from_secs(secs))
}

/// Executes commands as child processes.
///
/// Program names in a [`CommandSpec`] can be redirected to configured paths,
/// e.g. `"ffmpeg"` to `/opt/ffmpeg/bin/ffmpeg`.
#[derive(Debug, Clone, Default)]
pub struct ToolExecutor {
    programs: HashMap<String, PathBuf>,
}

impl ToolExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve `name` to `path` when running specs.
    pub fn with_program(mut self, name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        self.programs.insert(name.into(), path.into());
        self
    }

    fn resolve(&self, program: &str) -> PathBuf {
        self.programs
            .get(program)
            .cloned()
            .unwrap_or_else(|| PathBuf::from(program))
    }
}

fn excerpt(stderr: &[u8]) -> String {
    let text = String::from_utf8_lossy(stderr);
    let text = text.trim();
    if text.len() <= STDERR_EXCERPT_LEN {
        return text.to_string();
    }
    let mut start = text.len() - STDERR_EXCERPT_LEN;
    while !text.is_char_boundary(start) {
        start += 1;
    }
    text[start..].to_string()
}

#[async_trait::async_trait]
impl CommandExecutor for ToolExecutor {
    async fn run(&self, spec: &CommandSpec, timeout: Option<Duration>) -> Result<ToolOutput> {
        let program = self.resolve(&spec.program);

        #[cfg(feature = "tracing")]
        tracing::debug!("Running: {}", spec);

        let child = Command::new(&program)
            .args(&spec.args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    Error::tool_not_found(&spec.program)
                } else {
                    Error::tool_failed(&spec.program, format!("failed to spawn: {e}"))
                }
            })?;

        // Dropping the future on timeout drops the child, which kills it.
        let output = match timeout {
            Some(limit) => tokio::time::timeout(limit, child.wait_with_output())
                .await
                .map_err(|_| Error::timeout(&spec.program, limit))?,
            None => child.wait_with_output().await,
        }
        .map_err(|e| Error::tool_failed(&spec.program, format!("failed waiting: {e}")))?;

        let stderr_excerpt = excerpt(&output.stderr);
        if !output.status.success() {
            return Err(Error::tool_failed(
                &spec.program,
                format!("exited with status {}: {}", output.status, stderr_excerpt),
            ));
        }

        Ok(ToolOutput {
            exit_code: output.status.code(),
            stderr_excerpt,
        })
    }
}
