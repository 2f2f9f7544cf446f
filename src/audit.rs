//! Per-run audit log.
//!
//! Each run appends to its own file, `<log_dir>/<timestamp>.log`. Everything
//! at `info` and above goes to the file (`RUST_LOG` can widen or narrow it);
//! warnings and errors are echoed to stderr as well, except events logged
//! under [`FILE_ONLY_TARGET`].

use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Local};
use tracing::Level;
use tracing_subscriber::filter::filter_fn;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

use crate::error::{Error, Result};

/// Target for events that belong in the log file but are already reported
/// on the console some other way.
pub const FILE_ONLY_TARGET: &str = "pd_offboard::audit_file";

fn echoes_to_stderr(level: &Level, target: &str) -> bool {
    *level <= Level::WARN && target != FILE_ONLY_TARGET
}

pub fn log_file_name(started_at: DateTime<Local>) -> String {
    format!("{}.log", started_at.format("%Y-%m-%dT%H-%M-%S%.6f"))
}

/// Create the run's log file and install the global subscriber.
pub fn init(log_dir: &Path) -> Result<PathBuf> {
    fs::create_dir_all(log_dir)?;
    let path = log_dir.join(log_file_name(Local::now()));
    let file = OpenOptions::new().create(true).append(true).open(&path)?;

    let file_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .with_filter(file_filter),
        )
        .with(
            fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr)
                .with_filter(filter_fn(|meta| echoes_to_stderr(meta.level(), meta.target()))),
        )
        .try_init()
        .map_err(|e| Error::Config(format!("Failed to install audit logger: {}", e)))?;

    Ok(path)
}
