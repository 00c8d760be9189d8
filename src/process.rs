//! What gets executed for a command, and the hooks that adjust it first.
//!
//! An [`Invocation`] is the fully resolved program, arguments, working
//! directory, and inherited variables to drop. [`DispatchHook`]s rewrite it before the
//! runner either replaces the process or spawns a captured child, which keeps
//! environment policy (scrubbing inherited toolchain variables, running under
//! a managed-environment wrapper) out of the execution engine.

use std::path::{Path, PathBuf};

use crate::config::EnvironmentConfig;
use crate::error::DevError;

/// A resolved process launch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: PathBuf,
    /// Variables removed from the inherited environment.
    pub env_remove: Vec<String>,
}

impl Invocation {
    /// Runs `line` through the platform shell inside `cwd`.
    pub fn shell(line: &str, cwd: &Path) -> Self {
        let (program, flag) = if cfg!(windows) {
            ("cmd", "/C")
        } else {
            ("sh", "-c")
        };
        Self {
            program: program.to_string(),
            args: vec![flag.to_string(), line.to_string()],
            cwd: cwd.to_path_buf(),
            env_remove: Vec::new(),
        }
    }

    /// Shell-quoted program and arguments, for logs.
    pub fn display(&self) -> String {
        let mut parts = Vec::with_capacity(1 + self.args.len());
        parts.push(self.program.as_str());
        parts.extend(self.args.iter().map(String::as_str));
        shell_words::join(parts)
    }

    /// Builds the equivalent `std::process::Command`.
    pub fn to_command(&self) -> std::process::Command {
        let mut command = std::process::Command::new(&self.program);
        command.args(&self.args).current_dir(&self.cwd);
        for key in &self.env_remove {
            command.env_remove(key);
        }
        command
    }
}

/// Adjusts an invocation before dispatch.
pub trait DispatchHook: Send + Sync {
    fn prepare(&self, invocation: &mut Invocation) -> Result<(), DevError>;
}

/// Removes inherited variables (a stale `GEM_HOME`, say) from the child.
#[derive(Debug, Clone)]
pub struct ScrubEnv {
    vars: Vec<String>,
}

impl ScrubEnv {
    pub fn new(vars: Vec<String>) -> Self {
        Self { vars }
    }
}

impl DispatchHook for ScrubEnv {
    fn prepare(&self, invocation: &mut Invocation) -> Result<(), DevError> {
        for var in &self.vars {
            if !invocation.env_remove.contains(var) {
                invocation.env_remove.push(var.clone());
            }
        }
        Ok(())
    }
}

/// Runs the invocation behind a wrapper such as `shadowenv exec --`.
#[derive(Debug, Clone)]
pub struct ExecPrefix {
    words: Vec<String>,
}

impl ExecPrefix {
    pub fn parse(prefix: &str) -> Result<Self, DevError> {
        let words = shell_words::split(prefix).map_err(|source| DevError::InvalidExecPrefix {
            prefix: prefix.to_string(),
            source,
        })?;
        Ok(Self { words })
    }
}

impl DispatchHook for ExecPrefix {
    fn prepare(&self, invocation: &mut Invocation) -> Result<(), DevError> {
        let Some((program, rest)) = self.words.split_first() else {
            return Ok(());
        };
        let mut args = rest.to_vec();
        args.push(std::mem::replace(&mut invocation.program, program.clone()));
        args.append(&mut invocation.args);
        invocation.args = args;
        Ok(())
    }
}

/// Hooks declared by the `environment` section, scrubbing first.
pub fn hooks_from_environment(
    environment: &EnvironmentConfig,
) -> Result<Vec<Box<dyn DispatchHook>>, DevError> {
    let mut hooks: Vec<Box<dyn DispatchHook>> = Vec::new();
    if !environment.scrub.is_empty() {
        hooks.push(Box::new(ScrubEnv::new(environment.scrub.clone())));
    }
    if let Some(prefix) = &environment.exec_prefix {
        hooks.push(Box::new(ExecPrefix::parse(prefix)?));
    }
    Ok(hooks)
}
