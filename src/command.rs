//! The `Command` value type: one named entry from dev.yml.

use serde::Deserialize;

use crate::error::DevError;

/// Description shown in usage listings when dev.yml omits `desc`.
pub const DEFAULT_DESCRIPTION: &str = "(no description)";

/// A shell command declared in dev.yml.
///
/// Immutable once built. `pretty_ui` decides whether the command may run
/// captured inside a frame (when stdout is a terminal); commands that need to
/// own the terminal, such as consoles and REPLs, set it to `false` so the
/// current process is always replaced.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Command {
    run: String,
    desc: String,
    pretty_ui: bool,
}

impl Command {
    /// Builds a command with the default description and `pretty_ui = true`.
    pub fn new(run: impl Into<String>) -> Result<Self, DevError> {
        let run = run.into();
        if run.is_empty() {
            return Err(DevError::InvalidCommand { name: None });
        }
        Ok(Self {
            run,
            desc: DEFAULT_DESCRIPTION.to_string(),
            pretty_ui: true,
        })
    }

    pub fn with_desc(mut self, desc: impl Into<String>) -> Self {
        self.desc = desc.into();
        self
    }

    pub fn with_pretty_ui(mut self, pretty_ui: bool) -> Self {
        self.pretty_ui = pretty_ui;
        self
    }

    /// The shell command line to execute.
    pub fn run(&self) -> &str {
        &self.run
    }

    pub fn desc(&self) -> &str {
        &self.desc
    }

    /// Whether framed, captured presentation should be attempted.
    pub fn pretty_ui(&self) -> bool {
        self.pretty_ui
    }
}

/// A command record exactly as it appears in dev.yml, before validation.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CommandRecord {
    pub run: Option<String>,
    pub desc: Option<String>,
    pub pretty_ui: Option<bool>,
}

impl CommandRecord {
    /// Validates the record declared under `name`.
    pub fn into_command(self, name: &str) -> Result<Command, DevError> {
        let invalid = || DevError::InvalidCommand {
            name: Some(name.to_string()),
        };
        let run = self.run.ok_or_else(invalid)?;
        let mut command = Command::new(run).map_err(|_| invalid())?;
        if let Some(desc) = self.desc {
            command = command.with_desc(desc);
        }
        if let Some(pretty_ui) = self.pretty_ui {
            command = command.with_pretty_ui(pretty_ui);
        }
        Ok(command)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_when_fields_are_omitted() {
        let command = Command::new("cargo test").unwrap();
        assert_eq!(command.run(), "cargo test");
        assert_eq!(command.desc(), "(no description)");
        assert!(command.pretty_ui());
    }

    #[test]
    fn empty_run_is_rejected() {
        let err = Command::new("").unwrap_err();
        assert!(matches!(err, DevError::InvalidCommand { name: None }));
    }

    #[test]
    fn equality_covers_every_field() {
        let base = Command::new("./bin/console").unwrap();
        assert_eq!(base, Command::new("./bin/console").unwrap());
        assert_ne!(base, base.clone().with_pretty_ui(false));
        assert_ne!(base, base.clone().with_desc("Open a console"));
    }

    #[test]
    fn record_without_run_names_the_entry() {
        let record = CommandRecord {
            desc: Some("Up command!".into()),
            ..CommandRecord::default()
        };
        let err = record.into_command("up").unwrap_err();
        match err {
            DevError::InvalidCommand { name } => assert_eq!(name.as_deref(), Some("up")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn record_carries_optional_fields() {
        let record = CommandRecord {
            run: Some("./bin/console".into()),
            desc: Some("Open a console".into()),
            pretty_ui: Some(false),
        };
        let command = record.into_command("console").unwrap();
        assert_eq!(
            command,
            Command::new("./bin/console")
                .unwrap()
                .with_desc("Open a console")
                .with_pretty_ui(false)
        );
    }
}
