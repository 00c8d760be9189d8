//! dev: run the commands a project declares in its dev.yml.
//!
//! This is the entry point. It parses the command line, finds the project
//! root and its dev.yml, prints usage or dispatches the named command through
//! [`CommandRunner`], and maps failures to a one-line message and exit code.

mod capture;
mod command;
mod config;
mod error;
mod process;
mod protocol;
mod repo;
mod runner;
mod signals;
mod ui;

use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::builder::styling::{AnsiColor, Effects, Style};
use clap::builder::Styles;
use clap::Parser;
use tracing_subscriber::fmt;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

use crate::capture::{ChildInput, OutputChannel};
use crate::error::DevError;
use crate::runner::CommandRunner;
use crate::ui::UiSettings;

const HELP_HINT: &str = "Run 'dev' or 'dev --help' to see available commands.";

/// Command-line interface definition.
#[derive(Debug, Parser)]
#[command(
    name = "dev",
    version,
    about = "Run the commands declared in a project's dev.yml",
    styles = help_styles(),
    disable_help_flag = true
)]
struct Cli {
    /// Path to dev.yml; its directory becomes the project root.
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
    /// Plain output without colors or animation.
    #[arg(long)]
    no_ui: bool,
    /// List the commands this project defines.
    #[arg(short = 'h', long = "help")]
    help: bool,
    /// Command name followed by its own arguments.
    #[arg(
        value_name = "COMMAND",
        trailing_var_arg = true,
        allow_hyphen_values = true
    )]
    argv: Vec<String>,
}

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => ExitCode::from(report(&err, &mut io::stderr())),
    }
}

fn run(cli: Cli) -> Result<()> {
    let (root, config_path) = resolve_root(cli.config.as_deref())?;
    tracing::debug!(root = %root.display(), config = %config_path.display(), "project resolved");
    let dev_file = config::load_config(&config_path)?;
    tracing::debug!(project = dev_file.config.name(), "config loaded");

    let (name, args) = match cli.argv.split_first() {
        Some((name, args)) if !cli.help => (name, args),
        _ => {
            let mut stdout = io::stdout().lock();
            dev_file.config.write_usage(&mut stdout)?;
            stdout.flush()?;
            return Ok(());
        }
    };

    let command = dev_file.config.command(name)?;
    let hooks = process::hooks_from_environment(&dev_file.environment)?;
    let settings = UiSettings::detect(cli.no_ui);
    let ui = ui::select(settings, Box::new(io::stdout()));

    CommandRunner::new(ui.as_ref(), root)
        .with_tty(settings.tty)
        .with_channel(OutputChannel::from_env())
        .with_input(ChildInput::detect())
        .with_hooks(hooks)
        .run(command, args)?;
    Ok(())
}

/// Returns the project root and the dev.yml inside it.
fn resolve_root(config: Option<&Path>) -> Result<(PathBuf, PathBuf)> {
    if let Some(path) = config {
        let path = std::path::absolute(path)
            .with_context(|| format!("failed to resolve {}", path.display()))?;
        let root = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("/"));
        return Ok((root, path));
    }
    let cwd = std::env::current_dir().context("failed to read current directory")?;
    let root = repo::find_root(&cwd)?;
    let path = root.join(repo::CONFIG_FILE);
    Ok((root, path))
}

/// Writes the failure line (plus a hint where one helps) and returns the exit code.
fn report(err: &anyhow::Error, out: &mut dyn Write) -> u8 {
    let _ = writeln!(out, "dev: {err:#}");
    let Some(dev_err) = err.downcast_ref::<DevError>() else {
        return 1;
    };
    if matches!(dev_err, DevError::CommandNotFound { .. }) {
        let _ = writeln!(out, "{HELP_HINT}");
    }
    dev_err.exit_code()
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("DEV_LOG")
        .or_else(|_| EnvFilter::try_new("warn"))
        .unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_writer(io::stderr)
                .with_target(false)
                .compact(),
        )
        .try_init();
}

fn help_styles() -> Styles {
    Styles::styled()
        .header(
            Style::new()
                .fg_color(Some(AnsiColor::Cyan.into()))
                .effects(Effects::BOLD),
        )
        .usage(
            Style::new()
                .fg_color(Some(AnsiColor::Green.into()))
                .effects(Effects::BOLD),
        )
        .literal(Style::new().fg_color(Some(AnsiColor::Yellow.into())))
        .placeholder(Style::new().fg_color(Some(AnsiColor::Magenta.into())))
        .invalid(
            Style::new()
                .fg_color(Some(AnsiColor::Red.into()))
                .effects(Effects::BOLD),
        )
}
