//! Terminal presentation behind a single capability trait.
//!
//! The core never talks to the terminal directly: it receives one `&dyn Ui`
//! built at startup by [`select`] and renders frames, spinners, and status
//! lines through it. Two strategies exist, [`RichUi`] for color terminals and
//! [`PlainUi`] for piped output or when color is unwanted.

mod markup;
mod plain;
mod rich;
#[cfg(test)]
pub mod testing;

use std::io::{IsTerminal, Write};

use crate::error::DevError;

pub use plain::PlainUi;
pub use rich::RichUi;

pub const CHECK: &str = "✓";
pub const CROSS: &str = "✗";
pub const WARNING: &str = "⚠";

/// Work run inside a frame or spinner. Its outcome is handed back unchanged.
pub type Body<'b> = &'b mut dyn FnMut() -> Result<(), DevError>;

/// Rendering capability consumed by the runner and the output protocol.
///
/// Methods take `&self`: the runner holds the Ui while a frame body feeds the
/// protocol, which renders through the same instance.
pub trait Ui {
    /// Opens a titled frame, runs `body`, and closes the frame again.
    fn frame(&self, title: &str, body: Body<'_>) -> Result<(), DevError> {
        self.open_frame(title);
        let result = body();
        self.close_frame(title);
        result
    }

    /// Opens a frame whose end is driven externally (by the output protocol).
    fn open_frame(&self, title: &str);

    /// Closes the innermost frame. `title` is informational and may be empty.
    fn close_frame(&self, title: &str);

    /// Applies `{{color:text}}` markup when supported.
    fn fmt(&self, text: &str) -> String;

    /// Shows progress for `title` while `body` runs, then one ok/fail line.
    fn with_spinner(&self, title: &str, body: Body<'_>) -> Result<(), DevError>;

    fn ok(&self, label: &str);

    fn fail(&self, label: &str);

    fn warn(&self, message: &str);

    /// Prints one line of passthrough output.
    fn print_line(&self, message: &str);

    /// Final "all finished" indicator.
    fn done(&self);
}

/// Output capabilities detected once at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UiSettings {
    /// Whether stdout is a terminal.
    pub tty: bool,
    /// Whether escape sequences may be written (`NO_COLOR` unset, no `--no-ui`).
    pub color: bool,
    /// Whether spinners animate (`DEV_NO_ANIMATION` and `CI` unset).
    pub animate: bool,
}

impl UiSettings {
    pub fn detect(no_ui: bool) -> Self {
        let tty = std::io::stdout().is_terminal();
        let color = !no_ui && std::env::var_os("NO_COLOR").is_none();
        let animate =
            std::env::var_os("DEV_NO_ANIMATION").is_none() && std::env::var_os("CI").is_none();
        Self {
            tty,
            color,
            animate: tty && animate,
        }
    }
}

/// Builds the one Ui for this process.
pub fn select(settings: UiSettings, out: Box<dyn Write + Send>) -> Box<dyn Ui> {
    if settings.tty && settings.color {
        tracing::debug!(animate = settings.animate, "using rich ui");
        Box::new(RichUi::new(out, settings.animate))
    } else {
        tracing::debug!("using plain ui");
        Box::new(PlainUi::new(out))
    }
}

#[cfg(test)]
mod tests {
    use super::testing::SharedBuffer;
    use super::*;

    #[test]
    fn select_prefers_rich_only_on_color_terminals() {
        let buffer = SharedBuffer::default();
        let ui = select(
            UiSettings {
                tty: true,
                color: true,
                animate: false,
            },
            Box::new(buffer.clone()),
        );
        ui.ok("build");
        assert!(buffer.contents().contains("\u{1b}["));

        for settings in [
            UiSettings {
                tty: false,
                color: true,
                animate: false,
            },
            UiSettings {
                tty: true,
                color: false,
                animate: false,
            },
        ] {
            let buffer = SharedBuffer::default();
            let ui = select(settings, Box::new(buffer.clone()));
            ui.ok("build");
            assert_eq!(buffer.contents(), "✓ build\n");
        }
    }

    #[test]
    fn default_frame_runs_body_between_open_and_close() {
        let buffer = SharedBuffer::default();
        let ui = PlainUi::new(Box::new(buffer.clone()));
        let mut ran = false;
        ui.frame("Build", &mut || {
            ran = true;
            Ok(())
        })
        .unwrap();
        assert!(ran);
        assert_eq!(buffer.contents(), "=== Build ===\n=== end Build ===\n");
    }
}
