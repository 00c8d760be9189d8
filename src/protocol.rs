//! Line-oriented control protocol read from a captured child's output.
//!
//! A child drives structured UI by printing marker lines; everything else is
//! passed through untouched. Each marker must be a complete line:
//!
//! ```text
//! ::frame::Title       open a frame
//! ::endframe::         close the innermost frame
//! ::ok::label          success line
//! ::fail::label        failure line
//! ::warn::message      warning line
//! ::spin::label        swallow lines until ::endspin:: (ok) or ::endspin::fail (fail)
//! ```

use std::io::{self, BufRead};

use crate::error::DevError;
use crate::ui::Ui;

const END_FRAME: &str = "::endframe::";
const END_SPIN: &str = "::endspin::";
const END_SPIN_FAIL: &str = "::endspin::fail";

#[derive(Debug, PartialEq, Eq)]
enum Marker<'a> {
    Frame(&'a str),
    EndFrame,
    Ok(&'a str),
    Fail(&'a str),
    Warn(&'a str),
    Spin(&'a str),
}

fn parse_marker(line: &str) -> Option<Marker<'_>> {
    if line == END_FRAME {
        return Some(Marker::EndFrame);
    }
    let payload = |prefix: &str| line.strip_prefix(prefix).filter(|rest| !rest.is_empty());
    if let Some(title) = payload("::frame::") {
        Some(Marker::Frame(title))
    } else if let Some(label) = payload("::ok::") {
        Some(Marker::Ok(label))
    } else if let Some(label) = payload("::fail::") {
        Some(Marker::Fail(label))
    } else if let Some(message) = payload("::warn::") {
        Some(Marker::Warn(message))
    } else {
        payload("::spin::").map(Marker::Spin)
    }
}

/// Dispatches one child's output stream to a [`Ui`].
///
/// Single use: [`UiProtocol::process_stream`] consumes the parser together
/// with its frame stack.
pub struct UiProtocol<'a> {
    ui: &'a dyn Ui,
    frames: Vec<String>,
}

impl<'a> UiProtocol<'a> {
    pub fn new(ui: &'a dyn Ui) -> Self {
        Self {
            ui,
            frames: Vec::new(),
        }
    }

    /// Reads `reader` to the end, rendering markers and passing plain lines through.
    ///
    /// End of input and the closed-terminal error a pseudo-terminal raises
    /// when its child exits both end processing normally.
    pub fn process_stream<R: BufRead>(mut self, mut reader: R) -> io::Result<()> {
        let mut buf = Vec::new();
        while let Some(line) = next_line(&mut reader, &mut buf)? {
            match parse_marker(&line) {
                Some(Marker::Frame(title)) => {
                    self.frames.push(title.to_string());
                    self.ui.open_frame(title);
                }
                Some(Marker::EndFrame) => {
                    let title = self.frames.pop().unwrap_or_default();
                    self.ui.close_frame(&title);
                }
                Some(Marker::Ok(label)) => self.ui.ok(label),
                Some(Marker::Fail(label)) => self.ui.fail(label),
                Some(Marker::Warn(message)) => self.ui.warn(message),
                Some(Marker::Spin(label)) => {
                    let mut end = Ok(SpinEnd::Eof);
                    let _ = self.ui.with_spinner(label, &mut || {
                        end = drain_spin(&mut reader, &mut buf);
                        match end {
                            Ok(SpinEnd::Ok) => Ok(()),
                            _ => Err(DevError::StepFailed {
                                label: label.to_string(),
                            }),
                        }
                    });
                    if end? == SpinEnd::Eof {
                        tracing::debug!(label, "output ended inside a spinner");
                        break;
                    }
                }
                None => self.ui.print_line(&line),
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SpinEnd {
    Ok,
    Fail,
    Eof,
}

/// Discards lines until the spin ends or the stream runs out.
fn drain_spin<R: BufRead>(reader: &mut R, buf: &mut Vec<u8>) -> io::Result<SpinEnd> {
    while let Some(line) = next_line(reader, buf)? {
        if line == END_SPIN {
            return Ok(SpinEnd::Ok);
        }
        if line == END_SPIN_FAIL {
            return Ok(SpinEnd::Fail);
        }
    }
    Ok(SpinEnd::Eof)
}

/// Reads one line without its terminator; `None` at end of input.
fn next_line<R: BufRead>(reader: &mut R, buf: &mut Vec<u8>) -> io::Result<Option<String>> {
    buf.clear();
    match reader.read_until(b'\n', buf) {
        Ok(0) => Ok(None),
        Ok(_) => {
            if buf.ends_with(b"\n") {
                buf.pop();
                if buf.ends_with(b"\r") {
                    buf.pop();
                }
            }
            Ok(Some(String::from_utf8_lossy(buf).into_owned()))
        }
        Err(err) if is_closed(&err) => Ok(None),
        Err(err) => Err(err),
    }
}

#[cfg(unix)]
fn is_closed(err: &io::Error) -> bool {
    err.raw_os_error() == Some(libc::EIO)
}

#[cfg(not(unix))]
fn is_closed(err: &io::Error) -> bool {
    err.kind() == io::ErrorKind::BrokenPipe
}
