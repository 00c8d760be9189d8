//! Plain output: glyphs and banners, never an escape sequence.

use std::cell::Cell;
use std::io::Write;
use std::sync::{Mutex, PoisonError};

use strip_ansi_escapes::strip;

use super::{Body, Ui, CHECK, CROSS, WARNING};
use crate::error::DevError;

/// Fallback Ui for piped output and terminals without color.
pub struct PlainUi {
    out: Mutex<Box<dyn Write + Send>>,
    depth: Cell<usize>,
}

impl PlainUi {
    pub fn new(out: Box<dyn Write + Send>) -> Self {
        Self {
            out: Mutex::new(out),
            depth: Cell::new(0),
        }
    }

    fn line(&self, text: &str) {
        let indent = "  ".repeat(self.depth.get());
        let mut out = self.out.lock().unwrap_or_else(PoisonError::into_inner);
        let _ = writeln!(out, "{}{}", indent, text);
        let _ = out.flush();
    }
}

impl Ui for PlainUi {
    fn open_frame(&self, title: &str) {
        self.line(&format!("=== {} ===", title));
        self.depth.set(self.depth.get() + 1);
    }

    fn close_frame(&self, title: &str) {
        self.depth.set(self.depth.get().saturating_sub(1));
        if title.is_empty() {
            self.line("=== end ===");
        } else {
            self.line(&format!("=== end {} ===", title));
        }
    }

    fn fmt(&self, text: &str) -> String {
        text.to_string()
    }

    fn with_spinner(&self, title: &str, body: Body<'_>) -> Result<(), DevError> {
        let result = body();
        match &result {
            Ok(()) => self.ok(title),
            Err(_) => self.fail(title),
        }
        result
    }

    fn ok(&self, label: &str) {
        self.line(&format!("{} {}", CHECK, label));
    }

    fn fail(&self, label: &str) {
        self.line(&format!("{} {}", CROSS, label));
    }

    fn warn(&self, message: &str) {
        self.line(&format!("{} {}", WARNING, message));
    }

    fn print_line(&self, message: &str) {
        let stripped = strip(message.as_bytes());
        self.line(&String::from_utf8_lossy(&stripped));
    }

    fn done(&self) {
        self.line(&format!("{} Done", CHECK));
    }
}
