//! Spawning a child whose combined stdout and stderr the parent reads.
//!
//! Two channels exist. `Pty` gives the child a pseudo-terminal so tools keep
//! their colors and prompts; keystrokes from the parent's terminal are relayed
//! into it. `Pipe` shares one OS pipe between stdout and stderr and lets the
//! child inherit stdin directly. A pty is only used when the parent's stdin is
//! a terminal too: piped or redirected input goes to the child untouched over
//! the pipe channel.

use std::io::{self, IsTerminal, Read, Write};
use std::process::Stdio;
use std::thread;

use portable_pty::{native_pty_system, Child as PtyChild, CommandBuilder, MasterPty, PtySize};

use crate::process::Invocation;

/// Ends input on a terminal in canonical mode (`VEOF`).
const END_OF_INPUT: u8 = 0x04;

/// How a captured child's output reaches the parent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputChannel {
    Pipe,
    Pty,
}

impl Default for OutputChannel {
    fn default() -> Self {
        if cfg!(unix) {
            OutputChannel::Pty
        } else {
            OutputChannel::Pipe
        }
    }
}

impl OutputChannel {
    /// Reads `DEV_CAPTURE` (`pipe` or `pty`), falling back to the platform default.
    pub fn from_env() -> Self {
        match std::env::var("DEV_CAPTURE") {
            Ok(value) => Self::parse(&value).unwrap_or_else(|| {
                tracing::warn!(value = %value, "unknown DEV_CAPTURE value, using default");
                Self::default()
            }),
            Err(_) => Self::default(),
        }
    }

    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "pipe" => Some(OutputChannel::Pipe),
            "pty" => Some(OutputChannel::Pty),
            _ => None,
        }
    }

    /// Whether an interrupt delivered to the parent must be relayed to the child.
    ///
    /// A terminal-generated interrupt already reaches a piped child, which
    /// shares the parent's process group; a pty child runs in its own session.
    pub fn forwards_interrupt(self) -> bool {
        self == OutputChannel::Pty
    }
}

/// Where a captured child's standard input comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChildInput {
    /// The parent's stdin is a terminal; keystrokes are relayed as typed.
    Terminal,
    /// The parent's stdin is a pipe, a file, or closed; the child gets it as is.
    Inherit,
    /// Fixed input followed by end of file.
    #[cfg(test)]
    Bytes(Vec<u8>),
}

impl ChildInput {
    pub fn detect() -> Self {
        if io::stdin().is_terminal() {
            ChildInput::Terminal
        } else {
            ChildInput::Inherit
        }
    }
}

enum ChildProcess {
    Os(std::process::Child),
    Pty {
        child: Box<dyn PtyChild + Send + Sync>,
        _master: Box<dyn MasterPty + Send>,
    },
}

/// A running child plus the read end of its output.
///
/// Dropping it without [`CapturedChild::wait`] kills and reaps the child.
pub struct CapturedChild {
    channel: OutputChannel,
    output: Option<Box<dyn Read + Send>>,
    process: Option<ChildProcess>,
    #[cfg(unix)]
    _terminal: Option<TerminalModeGuard>,
}

impl CapturedChild {
    /// The channel actually in use, after any fallback.
    pub fn channel(&self) -> OutputChannel {
        self.channel
    }

    pub fn pid(&self) -> Option<u32> {
        match self.process.as_ref()? {
            ChildProcess::Os(child) => Some(child.id()),
            ChildProcess::Pty { child, .. } => child.process_id(),
        }
    }

    /// Hands out the combined output stream; `None` after the first call.
    pub fn take_output(&mut self) -> Option<Box<dyn Read + Send>> {
        self.output.take()
    }

    /// Waits for the child and returns its exit code.
    pub fn wait(mut self) -> io::Result<i32> {
        self.output = None;
        match self.process.take() {
            Some(ChildProcess::Os(mut child)) => Ok(exit_code(child.wait()?)),
            Some(ChildProcess::Pty { mut child, _master }) => {
                let status = child.wait()?;
                Ok(i32::try_from(status.exit_code()).unwrap_or(1))
            }
            None => Ok(1),
        }
    }
}

impl Drop for CapturedChild {
    fn drop(&mut self) {
        self.output = None;
        match self.process.take() {
            Some(ChildProcess::Os(mut child)) => {
                let _ = child.kill();
                let _ = child.wait();
            }
            Some(ChildProcess::Pty { mut child, .. }) => {
                let _ = child.kill();
                let _ = child.wait();
            }
            None => {}
        }
    }
}

/// Starts `invocation` with its output captured on `channel`.
pub fn spawn(
    invocation: &Invocation,
    channel: OutputChannel,
    input: ChildInput,
) -> io::Result<CapturedChild> {
    let channel = match (channel, &input) {
        (OutputChannel::Pty, ChildInput::Inherit) => {
            tracing::debug!("stdin is not a terminal, capturing over a pipe");
            OutputChannel::Pipe
        }
        _ => channel,
    };
    tracing::debug!(command = %invocation.display(), ?channel, "spawning captured child");
    match channel {
        OutputChannel::Pipe => spawn_pipe(invocation, input),
        OutputChannel::Pty => spawn_pty(invocation, input),
    }
}

fn spawn_pipe(invocation: &Invocation, input: ChildInput) -> io::Result<CapturedChild> {
    let (reader, writer) = io::pipe()?;
    let mut command = invocation.to_command();
    command.stdout(writer.try_clone()?).stderr(writer);
    match &input {
        ChildInput::Terminal | ChildInput::Inherit => command.stdin(Stdio::inherit()),
        #[cfg(test)]
        ChildInput::Bytes(_) => command.stdin(Stdio::piped()),
    };
    let mut child = command.spawn()?;
    // The command still owns the parent's write ends; EOF only arrives once they are gone.
    drop(command);
    if let Some(mut stdin) = child.stdin.take() {
        let mut source = input_source(input);
        thread::spawn(move || {
            let _ = io::copy(&mut source, &mut stdin);
        });
    }
    Ok(CapturedChild {
        channel: OutputChannel::Pipe,
        output: Some(Box::new(reader)),
        process: Some(ChildProcess::Os(child)),
        #[cfg(unix)]
        _terminal: None,
    })
}

fn spawn_pty(invocation: &Invocation, input: ChildInput) -> io::Result<CapturedChild> {
    let (cols, rows) = crossterm::terminal::size().unwrap_or((80, 24));
    let pair = native_pty_system()
        .openpty(PtySize {
            rows: rows.max(1),
            cols: cols.max(1),
            pixel_width: 0,
            pixel_height: 0,
        })
        .map_err(io::Error::other)?;

    let mut builder = CommandBuilder::new(&invocation.program);
    builder.args(&invocation.args);
    builder.cwd(&invocation.cwd);
    for key in &invocation.env_remove {
        builder.env_remove(key);
    }

    let child = pair
        .slave
        .spawn_command(builder)
        .map_err(io::Error::other)?;
    // Keep no slave handle in the parent so the reader sees the child hang up.
    drop(pair.slave);
    let reader = pair.master.try_clone_reader().map_err(io::Error::other)?;
    let writer = pair.master.take_writer().map_err(io::Error::other)?;

    let interactive = input == ChildInput::Terminal;
    relay_input(input_source(input), writer);

    Ok(CapturedChild {
        channel: OutputChannel::Pty,
        output: Some(reader),
        process: Some(ChildProcess::Pty {
            child,
            _master: pair.master,
        }),
        #[cfg(unix)]
        _terminal: if interactive {
            TerminalModeGuard::enter()
        } else {
            None
        },
    })
}

fn input_source(input: ChildInput) -> Box<dyn Read + Send> {
    match input {
        ChildInput::Terminal | ChildInput::Inherit => Box::new(io::stdin()),
        #[cfg(test)]
        ChildInput::Bytes(bytes) => Box::new(io::Cursor::new(bytes)),
    }
}

/// Copies `source` into the child's terminal, then ends its input.
///
/// A terminal only treats `VEOF` as end of file at the start of a line, so a
/// trailing partial line is flushed by a first one.
fn relay_input(mut source: Box<dyn Read + Send>, mut writer: Box<dyn Write + Send>) {
    thread::spawn(move || {
        let mut buffer = [0u8; 1024];
        let mut line_start = true;
        loop {
            match source.read(&mut buffer) {
                Ok(0) => break,
                Ok(n) => {
                    if writer.write_all(&buffer[..n]).and_then(|_| writer.flush()).is_err() {
                        return;
                    }
                    line_start = buffer[n - 1] == b'\n';
                }
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                Err(_) => break,
            }
        }
        let eof: &[u8] = if line_start {
            &[END_OF_INPUT]
        } else {
            &[END_OF_INPUT, END_OF_INPUT]
        };
        let _ = writer.write_all(eof).and_then(|_| writer.flush());
    });
}

#[cfg(unix)]
fn exit_code(status: std::process::ExitStatus) -> i32 {
    use std::os::unix::process::ExitStatusExt;
    status
        .code()
        .or_else(|| status.signal().map(|signal| 128 + signal))
        .unwrap_or(1)
}

#[cfg(not(unix))]
fn exit_code(status: std::process::ExitStatus) -> i32 {
    status.code().unwrap_or(1)
}

/// Turns off line buffering and echo on the parent's terminal while a pty
/// child owns the session, so keystrokes reach the child as typed and are
/// echoed once, by the child's terminal. Restored on drop.
#[cfg(unix)]
struct TerminalModeGuard {
    original: libc::termios,
}

#[cfg(unix)]
impl TerminalModeGuard {
    fn enter() -> Option<Self> {
        let fd = libc::STDIN_FILENO;
        let mut original: libc::termios = unsafe { std::mem::zeroed() };
        if unsafe { libc::tcgetattr(fd, &mut original) } != 0 {
            return None;
        }
        let mut relaxed = original;
        relaxed.c_lflag &= !(libc::ICANON | libc::ECHO);
        relaxed.c_cc[libc::VMIN] = 1;
        relaxed.c_cc[libc::VTIME] = 0;
        if unsafe { libc::tcsetattr(fd, libc::TCSANOW, &relaxed) } != 0 {
            return None;
        }
        Some(Self { original })
    }
}

#[cfg(unix)]
impl Drop for TerminalModeGuard {
    fn drop(&mut self) {
        unsafe {
            libc::tcsetattr(libc::STDIN_FILENO, libc::TCSANOW, &self.original);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn no_input() -> ChildInput {
        ChildInput::Bytes(Vec::new())
    }

    // A pty reports EIO once the child hangs up; treat any error as the end.
    fn read_all(child: &mut CapturedChild) -> String {
        let mut reader = child.take_output().unwrap();
        let mut output = Vec::new();
        let mut buffer = [0u8; 512];
        loop {
            match reader.read(&mut buffer) {
                Ok(0) | Err(_) => break,
                Ok(n) => output.extend_from_slice(&buffer[..n]),
            }
        }
        String::from_utf8_lossy(&output).into_owned()
    }

    #[test]
    fn parses_channel_names() {
        assert_eq!(OutputChannel::parse("pipe"), Some(OutputChannel::Pipe));
        assert_eq!(OutputChannel::parse(" PTY "), Some(OutputChannel::Pty));
        assert_eq!(OutputChannel::parse("tty"), None);
        assert!(OutputChannel::Pty.forwards_interrupt());
        assert!(!OutputChannel::Pipe.forwards_interrupt());
    }

    #[cfg(unix)]
    #[test]
    fn pipe_combines_stdout_and_stderr() {
        let invocation = Invocation::shell("echo out; echo err 1>&2; exit 4", Path::new("."));
        let mut child = spawn(&invocation, OutputChannel::Pipe, no_input()).unwrap();
        assert!(child.pid().is_some());
        assert_eq!(child.channel(), OutputChannel::Pipe);
        assert_eq!(read_all(&mut child), "out\nerr\n");
        assert_eq!(child.wait().unwrap(), 4);
    }

    #[cfg(unix)]
    #[test]
    fn pipe_child_reads_its_input_to_the_end() {
        let invocation = Invocation::shell("cat", Path::new("."));
        let input = ChildInput::Bytes(b"one\ntwo".to_vec());
        let mut child = spawn(&invocation, OutputChannel::Pipe, input).unwrap();
        assert_eq!(read_all(&mut child), "one\ntwo");
        assert_eq!(child.wait().unwrap(), 0);
    }

    #[cfg(unix)]
    #[test]
    fn pipe_child_runs_in_invocation_cwd() {
        let dir = tempfile::tempdir().unwrap();
        let expected = dir.path().canonicalize().unwrap();
        let invocation = Invocation::shell("pwd -P", dir.path());
        let mut child = spawn(&invocation, OutputChannel::Pipe, no_input()).unwrap();
        assert_eq!(read_all(&mut child).trim_end(), expected.to_string_lossy());
        assert_eq!(child.wait().unwrap(), 0);
    }

    #[cfg(unix)]
    #[test]
    fn scrubbed_variables_are_not_inherited() {
        let mut invocation = Invocation::shell("echo \"[${HOME:-unset}]\"", Path::new("."));
        invocation.env_remove.push("HOME".into());
        let mut child = spawn(&invocation, OutputChannel::Pipe, no_input()).unwrap();
        assert_eq!(read_all(&mut child), "[unset]\n");
        child.wait().unwrap();
    }

    #[cfg(unix)]
    #[test]
    fn pty_child_sees_a_terminal() {
        let invocation = Invocation::shell("test -t 0 && test -t 1 && echo tty", Path::new("."));
        let mut child = spawn(&invocation, OutputChannel::Pty, no_input()).unwrap();
        assert_eq!(child.channel(), OutputChannel::Pty);
        assert!(child.pid().is_some());
        assert_eq!(read_all(&mut child), "tty\r\n");
        assert_eq!(child.wait().unwrap(), 0);
    }

    #[cfg(unix)]
    #[test]
    fn pty_reports_exit_code() {
        let invocation = Invocation::shell("exit 5", Path::new("."));
        let mut child = spawn(&invocation, OutputChannel::Pty, no_input()).unwrap();
        read_all(&mut child);
        assert_eq!(child.wait().unwrap(), 5);
    }

    #[cfg(unix)]
    #[test]
    fn pty_input_ends_after_relayed_bytes() {
        let invocation = Invocation::shell(
            "read first; read second || echo \"eof after:$first\"",
            Path::new("."),
        );
        let input = ChildInput::Bytes(b"hello\n".to_vec());
        let mut child = spawn(&invocation, OutputChannel::Pty, input).unwrap();
        let output = read_all(&mut child);
        assert!(output.contains("eof after:hello"), "output: {output:?}");
        assert_eq!(child.wait().unwrap(), 0);
    }

    #[cfg(unix)]
    #[test]
    fn pty_input_without_trailing_newline_still_ends() {
        let invocation = Invocation::shell("cat >/dev/null; echo finished", Path::new("."));
        let input = ChildInput::Bytes(b"partial".to_vec());
        let mut child = spawn(&invocation, OutputChannel::Pty, input).unwrap();
        assert!(read_all(&mut child).contains("finished"));
        assert_eq!(child.wait().unwrap(), 0);
    }

    #[cfg(unix)]
    #[test]
    fn non_terminal_stdin_is_captured_over_a_pipe() {
        let invocation = Invocation::shell("echo hi", Path::new("."));
        let mut child = spawn(&invocation, OutputChannel::Pty, ChildInput::Inherit).unwrap();
        assert_eq!(child.channel(), OutputChannel::Pipe);
        assert_eq!(read_all(&mut child), "hi\n");
        assert_eq!(child.wait().unwrap(), 0);
    }

    #[test]
    fn missing_program_fails_to_spawn() {
        let mut invocation = Invocation::shell("true", Path::new("."));
        invocation.program = "dev-test-no-such-program".into();
        assert!(spawn(&invocation, OutputChannel::Pipe, no_input()).is_err());
    }
}
