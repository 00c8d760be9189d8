//! Error taxonomy for dev.
//!
//! The execution core returns these instead of printing and exiting, so the
//! outer dispatch layer decides how each one is reported and which exit code
//! it maps to. Messages leave the underlying cause to the `source` chain.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Every failure the dev core can surface to its caller.
#[derive(Debug, Error)]
pub enum DevError {
    /// A command definition has no usable `run` value.
    #[error(
        "invalid command{}: missing a non-empty 'run' value",
        .name.as_deref().map(|n| format!(" '{n}'")).unwrap_or_default()
    )]
    InvalidCommand { name: Option<String> },

    /// The requested command name is not declared in dev.yml.
    #[error("command '{name}' is not defined in dev.yml")]
    CommandNotFound { name: String },

    /// A captured child exited with a non-zero status.
    #[error("`{command}` failed with exit code {code}")]
    ChildProcessFailure { command: String, code: i32 },

    /// The OS refused to start the child (missing executable, permissions).
    #[error("failed to start `{command}`")]
    SpawnFailure {
        command: String,
        #[source]
        source: io::Error,
    },

    /// Reading the captured output stream failed unexpectedly.
    #[error("failed to read output of `{command}`")]
    Stream {
        command: String,
        #[source]
        source: io::Error,
    },

    #[error("failed to read config file {}", .path.display())]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse config file {}", .path.display())]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// The `environment.exec_prefix` value could not be split into words.
    #[error("invalid exec_prefix '{prefix}'")]
    InvalidExecPrefix {
        prefix: String,
        #[source]
        source: shell_words::ParseError,
    },

    /// A spinner step reported failure or its output ended before the step did.
    #[error("step '{label}' failed")]
    StepFailed { label: String },

    #[error(
        "no dev.yml at project root (searched from {}; run inside a repo that has dev.yml at its root)",
        .start.display()
    )]
    NoProjectRoot { start: PathBuf },
}

impl DevError {
    /// Process exit code the outer dispatcher should use for this error.
    pub fn exit_code(&self) -> u8 {
        match self {
            DevError::ChildProcessFailure { code, .. } => (*code).clamp(1, 255) as u8,
            _ => 1,
        }
    }
}
