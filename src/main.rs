//! deskprov CLI entry point.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Mutex;

use chrono::{DateTime, Local};
use clap::Parser;
use deskprov::cli::{Cli, CommandDispatcher};
use deskprov::ui::{OutputMode, TerminalUI, UserInterface};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Default run log name for a run started at `started_at`.
fn default_log_path(started_at: DateTime<Local>) -> PathBuf {
    PathBuf::from(format!(
        "provision_{}.log",
        started_at.format("%Y%m%d_%H%M%S")
    ))
}

/// Initialize the tracing subscriber.
///
/// stderr level is controlled by:
/// 1. `--debug` flag sets level to DEBUG
/// 2. `RUST_LOG` environment variable (if set)
/// 3. Default is WARN
///
/// The run log, when given, records INFO and above (DEBUG with `--verbose`).
/// Returns the log path actually opened.
fn init_tracing(debug: bool, verbose: bool, log_path: Option<&Path>) -> Option<PathBuf> {
    let stderr_filter = if debug {
        EnvFilter::new("deskprov=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("deskprov=warn"))
    };

    let mut open_error = None;
    let log_file = log_path.and_then(|path| match File::create(path) {
        Ok(file) => Some((path.to_path_buf(), file)),
        Err(e) => {
            open_error = Some(format!("{}: {}", path.display(), e));
            None
        }
    });
    let opened = log_file.as_ref().map(|(path, _)| path.clone());

    let file_layer = log_file.map(|(_, file)| {
        let level = if verbose {
            "deskprov=debug"
        } else {
            "deskprov=info"
        };
        fmt::layer()
            .with_ansi(false)
            .with_target(false)
            .with_writer(Mutex::new(file))
            .with_filter(EnvFilter::new(level))
    });

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr)
                .with_filter(stderr_filter),
        )
        .with(file_layer)
        .init();

    if let Some(err) = open_error {
        tracing::warn!("Cannot open run log {}", err);
    }
    opened
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let started_at = Local::now();

    let log_path = cli.is_run().then(|| {
        cli.log_file
            .clone()
            .unwrap_or_else(|| default_log_path(started_at))
    });
    let log_file = init_tracing(cli.debug, cli.verbose, log_path.as_deref());

    tracing::debug!("deskprov starting with args: {:?}", cli);

    let mode = OutputMode::from_flags(cli.verbose, cli.quiet);
    let mut ui = TerminalUI::new(mode, cli.no_color);

    let cwd = match std::env::current_dir() {
        Ok(cwd) => cwd,
        Err(e) => {
            ui.error(&format!("Error: cannot read current directory: {}", e));
            return ExitCode::from(1);
        }
    };

    let dispatcher = CommandDispatcher::new(cwd, started_at).with_log_file(log_file);

    match dispatcher.dispatch(&cli, &mut ui) {
        Ok(result) => ExitCode::from(u8::try_from(result.exit_code).unwrap_or(1)),
        Err(e) => {
            tracing::error!("{}", e);
            ui.error(&format!("Error: {}", e));
            ExitCode::from(u8::try_from(e.exit_code()).unwrap_or(1))
        }
    }
}
