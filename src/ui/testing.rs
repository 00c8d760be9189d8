//! Test doubles for the Ui capability.

use std::io::{self, Write};
use std::sync::{Arc, Mutex};

use super::{Body, Ui};
use crate::error::DevError;

/// Cloneable in-memory writer; every clone appends to the same buffer.
#[derive(Debug, Clone, Default)]
pub struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

impl SharedBuffer {
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// One observed Ui call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Frame(String),
    OpenFrame(String),
    CloseFrame(String),
    Spinner(String),
    Ok(String),
    Fail(String),
    Warn(String),
    PrintLine(String),
    Done,
}

/// Records every call in order. `frame` records itself and runs the body
/// without open/close calls; `with_spinner` records itself, runs the body,
/// then records `Ok` or `Fail` for the body's outcome.
#[derive(Debug, Default)]
pub struct RecordingUi {
    calls: Mutex<Vec<Call>>,
}

impl RecordingUi {
    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }
}

impl Ui for RecordingUi {
    fn frame(&self, title: &str, body: Body<'_>) -> Result<(), DevError> {
        self.record(Call::Frame(title.to_string()));
        body()
    }

    fn open_frame(&self, title: &str) {
        self.record(Call::OpenFrame(title.to_string()));
    }

    fn close_frame(&self, title: &str) {
        self.record(Call::CloseFrame(title.to_string()));
    }

    fn fmt(&self, text: &str) -> String {
        text.to_string()
    }

    fn with_spinner(&self, title: &str, body: Body<'_>) -> Result<(), DevError> {
        self.record(Call::Spinner(title.to_string()));
        let result = body();
        match &result {
            Ok(()) => self.record(Call::Ok(title.to_string())),
            Err(_) => self.record(Call::Fail(title.to_string())),
        }
        result
    }

    fn ok(&self, label: &str) {
        self.record(Call::Ok(label.to_string()));
    }

    fn fail(&self, label: &str) {
        self.record(Call::Fail(label.to_string()));
    }

    fn warn(&self, message: &str) {
        self.record(Call::Warn(message.to_string()));
    }

    fn print_line(&self, message: &str) {
        self.record(Call::PrintLine(message.to_string()));
    }

    fn done(&self) {
        self.record(Call::Done);
    }
}
