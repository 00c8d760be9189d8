//! Rich terminal output: colored glyphs, boxed frames, animated spinners.

use std::cell::Cell;
use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::Duration;

use crossterm::cursor::MoveToColumn;
use crossterm::queue;
use crossterm::style::Stylize;
use crossterm::terminal::{Clear, ClearType};

use super::{markup, Body, Ui, CHECK, CROSS, WARNING};
use crate::error::DevError;

const SPINNER_FRAMES: [&str; 10] = ["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];
const SPINNER_TICK: Duration = Duration::from_millis(100);
const MAX_WIDTH: usize = 100;
const MIN_WIDTH: usize = 20;

type SharedOut = Arc<Mutex<Box<dyn Write + Send>>>;

/// Ui for color-capable terminals.
pub struct RichUi {
    out: SharedOut,
    depth: Cell<usize>,
    animate: bool,
    width: usize,
}

impl RichUi {
    pub fn new(out: Box<dyn Write + Send>, animate: bool) -> Self {
        let width = crossterm::terminal::size()
            .map(|(cols, _)| cols as usize)
            .unwrap_or(80)
            .clamp(MIN_WIDTH, MAX_WIDTH);
        Self {
            out: Arc::new(Mutex::new(out)),
            depth: Cell::new(0),
            animate,
            width,
        }
    }

    fn prefix(&self) -> String {
        match self.depth.get() {
            0 => String::new(),
            depth => "┃ ".repeat(depth).as_str().cyan().to_string(),
        }
    }

    fn line(&self, text: &str) {
        write_line(&self.out, &format!("{}{}", self.prefix(), text));
    }

    /// Colored glyph plus verbatim text; child output is never read as markup.
    fn status(&self, color: &str, glyph: &str, text: &str) {
        let glyph = self.fmt(&format!("{{{{{color}:{glyph}}}}}"));
        self.line(&format!("{} {}", glyph, text));
    }

    fn rule(&self, lead: &str, title: &str) -> String {
        let used = 2 * self.depth.get() + lead.chars().count() + title.chars().count();
        let fill = "━".repeat(self.width.saturating_sub(used).max(3));
        if title.is_empty() {
            format!("{}{}", lead, fill).as_str().cyan().to_string()
        } else {
            format!(
                "{}{}{}",
                lead.cyan(),
                title.bold(),
                format!(" {}", fill).as_str().cyan()
            )
        }
    }

    fn animate_while(&self, title: &str, body: Body<'_>) -> Result<(), DevError> {
        let stop = Arc::new(AtomicBool::new(false));
        let handle = {
            let stop = Arc::clone(&stop);
            let out = Arc::clone(&self.out);
            let prefix = self.prefix();
            let title = title.to_string();
            thread::spawn(move || {
                let mut tick = 0;
                while !stop.load(Ordering::Relaxed) {
                    let glyph = SPINNER_FRAMES[tick % SPINNER_FRAMES.len()].blue();
                    {
                        let mut out = out.lock().unwrap_or_else(PoisonError::into_inner);
                        let _ = queue!(out, MoveToColumn(0), Clear(ClearType::CurrentLine));
                        let _ = write!(out, "{}{} {}", prefix, glyph, title);
                        let _ = out.flush();
                    }
                    tick += 1;
                    thread::sleep(SPINNER_TICK);
                }
                let mut out = out.lock().unwrap_or_else(PoisonError::into_inner);
                let _ = queue!(out, MoveToColumn(0), Clear(ClearType::CurrentLine));
                let _ = out.flush();
            })
        };
        let result = body();
        stop.store(true, Ordering::Relaxed);
        let _ = handle.join();
        result
    }
}

fn write_line(out: &SharedOut, text: &str) {
    let mut out = out.lock().unwrap_or_else(PoisonError::into_inner);
    let _ = writeln!(out, "{}", text);
    let _ = out.flush();
}

impl Ui for RichUi {
    fn open_frame(&self, title: &str) {
        let rule = self.rule("┏━━ ", title);
        self.line(&rule);
        self.depth.set(self.depth.get() + 1);
    }

    fn close_frame(&self, _title: &str) {
        self.depth.set(self.depth.get().saturating_sub(1));
        let rule = self.rule("┗", "");
        self.line(&rule);
    }

    fn fmt(&self, text: &str) -> String {
        markup::render(text)
    }

    fn with_spinner(&self, title: &str, body: Body<'_>) -> Result<(), DevError> {
        let result = if self.animate {
            self.animate_while(title, body)
        } else {
            body()
        };
        match &result {
            Ok(()) => self.ok(title),
            Err(_) => self.fail(title),
        }
        result
    }

    fn ok(&self, label: &str) {
        self.status("green", CHECK, label);
    }

    fn fail(&self, label: &str) {
        self.status("red", CROSS, label);
    }

    fn warn(&self, message: &str) {
        self.status("yellow", WARNING, message);
    }

    fn print_line(&self, message: &str) {
        self.line(message);
    }

    fn done(&self) {
        self.status("green", CHECK, "Done");
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::SharedBuffer;
    use super::*;

    fn rich(animate: bool) -> (RichUi, SharedBuffer) {
        let buffer = SharedBuffer::default();
        (RichUi::new(Box::new(buffer.clone()), animate), buffer)
    }

    #[test]
    fn fmt_applies_markup() {
        let (ui, _) = rich(false);
        let formatted = ui.fmt("{{red:error}}");
        assert!(formatted.contains("\u{1b}["));
        assert!(formatted.contains("error"));
    }

    #[test]
    fn frames_prefix_nested_lines() {
        let (ui, buffer) = rich(false);
        ui.open_frame("Build");
        ui.print_line("compiling");
        ui.close_frame("Build");
        let text = buffer.contents();
        let lines = text.lines().collect::<Vec<_>>();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].contains("┏━━ "));
        assert!(lines[0].contains("Build"));
        assert!(lines[1].contains("┃ "));
        assert!(lines[1].ends_with("compiling"));
        assert!(lines[2].contains("┗"));
        assert!(!lines[2].contains("┃"));
    }

    #[test]
    fn unbalanced_close_does_not_underflow() {
        let (ui, buffer) = rich(false);
        ui.close_frame("");
        ui.print_line("after");
        let text = buffer.contents();
        assert!(text.lines().last().is_some_and(|line| line.ends_with("after")));
    }

    #[test]
    fn static_spinner_prints_single_status_line() {
        let (ui, buffer) = rich(false);
        ui.with_spinner("Fetching boost", &mut || Ok(())).unwrap();
        let text = buffer.contents();
        assert_eq!(text.lines().count(), 1);
        assert!(text.contains(CHECK));
        assert!(text.contains("Fetching boost"));
    }

    #[test]
    fn animated_spinner_propagates_failure() {
        let (ui, buffer) = rich(true);
        let result = ui.with_spinner("Compiling", &mut || {
            thread::sleep(Duration::from_millis(150));
            Err(DevError::ChildProcessFailure {
                command: "make".into(),
                code: 2,
            })
        });
        assert!(matches!(
            result,
            Err(DevError::ChildProcessFailure { code: 2, .. })
        ));
        let text = buffer.contents();
        assert!(text.contains(CROSS));
        assert!(text.ends_with("Compiling\n"));
    }

    #[test]
    fn status_text_is_not_treated_as_markup() {
        let (ui, buffer) = rich(false);
        ui.ok("{{red:literal}}");
        let text = buffer.contents();
        assert!(text.contains(&CHECK.green().to_string()));
        assert!(text.ends_with(" {{red:literal}}\n"));
    }

    #[test]
    fn done_prints_check_glyph() {
        let (ui, buffer) = rich(false);
        ui.done();
        let text = buffer.contents();
        assert!(text.contains(CHECK));
        assert!(text.trim_end().ends_with("Done"));
    }
}
