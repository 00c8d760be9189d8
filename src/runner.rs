//! Command execution: framed capture or process replacement.
//!
//! A command runs one of two ways. When it wants the captured UI and stdout is
//! a terminal, the runner spawns it with its output captured, feeds that output
//! through [`UiProtocol`] inside a frame, and fails on a non-zero exit.
//! Otherwise the current process is replaced by the command so it owns the
//! terminal directly.

use std::io::{BufReader, IsTerminal};
use std::path::PathBuf;

use crate::capture::{self, ChildInput, OutputChannel};
use crate::command::Command;
use crate::error::DevError;
use crate::process::{DispatchHook, Invocation};
use crate::protocol::UiProtocol;
use crate::signals::SignalForwarder;
use crate::ui::Ui;

/// Joins `run` with shell-quoted `args` into one command line.
pub fn build_shell_command(run: &str, args: &[String]) -> String {
    if args.is_empty() {
        run.to_string()
    } else {
        format!("{run} {}", shell_words::join(args))
    }
}

/// Turns the current process into the command.
pub trait ProcessReplacer {
    /// Only returns on failure; `line` names the command in the error.
    fn replace(&self, line: &str, invocation: &Invocation) -> Result<(), DevError>;
}

/// Replacement through the operating system.
#[derive(Debug, Default, Clone, Copy)]
pub struct OsReplacer;

impl ProcessReplacer for OsReplacer {
    #[cfg(unix)]
    fn replace(&self, line: &str, invocation: &Invocation) -> Result<(), DevError> {
        use std::os::unix::process::CommandExt;

        tracing::debug!(command = %invocation.display(), "replacing process");
        let source = invocation.to_command().exec();
        Err(DevError::SpawnFailure {
            command: line.to_string(),
            source,
        })
    }

    // No exec here: run the child to completion and leave with its exit code.
    #[cfg(not(unix))]
    fn replace(&self, line: &str, invocation: &Invocation) -> Result<(), DevError> {
        tracing::debug!(command = %invocation.display(), "running in place of dev");
        let spawn_failure = |source| DevError::SpawnFailure {
            command: line.to_string(),
            source,
        };
        let mut child = invocation.to_command().spawn().map_err(spawn_failure)?;
        let signals = SignalForwarder::spawn(Some(child.id()), false);
        let status = child.wait().map_err(spawn_failure)?;
        drop(signals);
        std::process::exit(status.code().unwrap_or(1));
    }
}

/// Runs commands from the project root through one injected [`Ui`].
///
/// One command at a time; two runners must not run concurrently in a process.
pub struct CommandRunner<'a> {
    ui: &'a dyn Ui,
    root: PathBuf,
    tty: bool,
    channel: OutputChannel,
    input: ChildInput,
    hooks: Vec<Box<dyn DispatchHook>>,
    replacer: Box<dyn ProcessReplacer + 'a>,
}

impl<'a> CommandRunner<'a> {
    pub fn new(ui: &'a dyn Ui, root: impl Into<PathBuf>) -> Self {
        Self {
            ui,
            root: root.into(),
            tty: std::io::stdout().is_terminal(),
            channel: OutputChannel::default(),
            input: ChildInput::detect(),
            hooks: Vec::new(),
            replacer: Box::new(OsReplacer),
        }
    }

    /// Overrides whether stdout counts as a terminal.
    pub fn with_tty(mut self, tty: bool) -> Self {
        self.tty = tty;
        self
    }

    pub fn with_channel(mut self, channel: OutputChannel) -> Self {
        self.channel = channel;
        self
    }

    /// Where a captured child's stdin comes from.
    pub fn with_input(mut self, input: ChildInput) -> Self {
        self.input = input;
        self
    }

    /// Hooks run in order on every invocation, before either mode.
    pub fn with_hooks(mut self, hooks: Vec<Box<dyn DispatchHook>>) -> Self {
        self.hooks = hooks;
        self
    }

    #[cfg(test)]
    pub fn with_hook(mut self, hook: impl DispatchHook + 'static) -> Self {
        self.hooks.push(Box::new(hook));
        self
    }

    #[cfg(test)]
    pub fn with_replacer(mut self, replacer: impl ProcessReplacer + 'a) -> Self {
        self.replacer = Box::new(replacer);
        self
    }

    pub fn uses_captured_ui(&self, command: &Command) -> bool {
        command.pretty_ui() && self.tty
    }

    /// Runs `command` with `args` appended.
    ///
    /// On the replacement path this only returns if the replacement failed.
    pub fn run(&self, command: &Command, args: &[String]) -> Result<(), DevError> {
        let line = build_shell_command(command.run(), args);
        let mut invocation = Invocation::shell(&line, &self.root);
        for hook in &self.hooks {
            hook.prepare(&mut invocation)?;
        }

        if self.uses_captured_ui(command) {
            tracing::debug!(command = %line, channel = ?self.channel, "running with captured ui");
            self.ui
                .frame(&line, &mut || self.capture(&line, &invocation))?;
            self.ui.done();
            Ok(())
        } else {
            tracing::debug!(
                command = %line,
                pretty_ui = command.pretty_ui(),
                tty = self.tty,
                "running by process replacement"
            );
            self.replacer.replace(&line, &invocation)
        }
    }

    fn capture(&self, line: &str, invocation: &Invocation) -> Result<(), DevError> {
        let stream_error = |source| DevError::Stream {
            command: line.to_string(),
            source,
        };
        let mut child =
            capture::spawn(invocation, self.channel, self.input.clone()).map_err(|source| {
                DevError::SpawnFailure {
                    command: line.to_string(),
                    source,
                }
            })?;
        tracing::debug!(pid = ?child.pid(), channel = ?child.channel(), "captured child started");
        let _signals = SignalForwarder::spawn(child.pid(), child.channel().forwards_interrupt());

        if let Some(output) = child.take_output() {
            UiProtocol::new(self.ui)
                .process_stream(BufReader::new(output))
                .map_err(|err| {
                    tracing::warn!(error = %err, "reading captured output failed");
                    stream_error(err)
                })?;
        }

        let code = child.wait().map_err(stream_error)?;
        tracing::debug!(code, "captured child exited");
        if code != 0 {
            return Err(DevError::ChildProcessFailure {
                command: line.to_string(),
                code,
            });
        }
        Ok(())
    }
}
