//! Configuration management for dev.
//!
//! This module defines the structure of the `dev.yml` project file, parses it
//! into an immutable [`Config`], and prints the usage listing built from it.

use std::io::{self, Write};
use std::path::Path;

use serde::Deserialize;

use crate::command::{Command, CommandRecord};
use crate::error::DevError;

/// Project name used when dev.yml has no `name`.
pub const DEFAULT_PROJECT_NAME: &str = "this repo";

/// Width of the command-name column in usage output.
const NAME_COLUMN: usize = 12;

/// Parsed project configuration: display name plus declared commands.
///
/// Command order follows dev.yml and names are unique.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    name: String,
    commands: Vec<(String, Command)>,
}

impl Config {
    /// Creates a config; a repeated name keeps its first position and the last definition.
    pub fn new(name: impl Into<String>, commands: Vec<(String, Command)>) -> Self {
        let mut unique: Vec<(String, Command)> = Vec::with_capacity(commands.len());
        for (key, command) in commands {
            match unique.iter_mut().find(|(existing, _)| *existing == key) {
                Some(slot) => slot.1 = command,
                None => unique.push((key, command)),
            }
        }
        Self {
            name: name.into(),
            commands: unique,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Iterates commands in declaration order.
    pub fn commands(&self) -> impl Iterator<Item = (&str, &Command)> {
        self.commands.iter().map(|(name, command)| (name.as_str(), command))
    }

    /// Looks up a command by name.
    pub fn command(&self, name: &str) -> Result<&Command, DevError> {
        self.commands
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, command)| command)
            .ok_or_else(|| DevError::CommandNotFound {
                name: name.to_string(),
            })
    }

    /// Writes the usage listing for this project.
    pub fn write_usage(&self, out: &mut dyn Write) -> io::Result<()> {
        writeln!(out, "Usage: dev <command> [args...]")?;
        writeln!(out)?;
        writeln!(out, "Commands for {}:", self.name)?;
        if self.commands.is_empty() {
            writeln!(out, "  (no commands defined in dev.yml)")?;
        }
        for (name, command) in self.commands() {
            writeln!(out, "  {:<width$} {}", name, command.desc(), width = NAME_COLUMN)?;
        }
        writeln!(out)?;
        writeln!(
            out,
            "Examples: dev up    dev up -v    dev update-deps    dev test"
        )?;
        Ok(())
    }
}

/// Pre-dispatch environment policy from the `environment` section.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct EnvironmentConfig {
    /// Variables removed from every child's environment.
    #[serde(default)]
    pub scrub: Vec<String>,
    /// Words prepended to every command, e.g. `shadowenv exec --`.
    pub exec_prefix: Option<String>,
}

/// Everything dev reads from a dev.yml file.
#[derive(Debug, Clone)]
pub struct DevFile {
    pub config: Config,
    pub environment: EnvironmentConfig,
}

/// Top-level document shape. Unknown keys (runtime pins and the like) are ignored.
#[derive(Debug, Default, Deserialize)]
struct Document {
    name: Option<String>,
    commands: Option<serde_yaml::Mapping>,
    environment: Option<EnvironmentConfig>,
}

/// Loads and parses dev.yml from a file path.
pub fn load_config(path: &Path) -> Result<DevFile, DevError> {
    let raw = std::fs::read_to_string(path).map_err(|source| DevError::ConfigRead {
        path: path.to_path_buf(),
        source,
    })?;
    parse_config(&raw, path)
}

/// Parses dev.yml contents; `path` is only used in error messages.
pub fn parse_config(raw: &str, path: &Path) -> Result<DevFile, DevError> {
    let parse_error = |source| DevError::ConfigParse {
        path: path.to_path_buf(),
        source,
    };
    let document: Document = if raw.trim().is_empty() {
        Document::default()
    } else {
        serde_yaml::from_str(raw).map_err(parse_error)?
    };

    let mut commands = Vec::new();
    for (key, value) in document.commands.unwrap_or_default() {
        let name = match key {
            serde_yaml::Value::String(name) => name,
            serde_yaml::Value::Number(number) => number.to_string(),
            serde_yaml::Value::Bool(flag) => flag.to_string(),
            other => {
                let source = serde_yaml::from_value::<String>(other).err();
                return Err(match source {
                    Some(source) => parse_error(source),
                    None => DevError::InvalidCommand { name: None },
                });
            }
        };
        let record = serde_yaml::from_value::<Option<CommandRecord>>(value)
            .map_err(parse_error)?
            .unwrap_or_default();
        let command = record.into_command(&name)?;
        commands.push((name, command));
    }

    let name = document
        .name
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| DEFAULT_PROJECT_NAME.to_string());

    Ok(DevFile {
        config: Config::new(name, commands),
        environment: document.environment.unwrap_or_default(),
    })
}
