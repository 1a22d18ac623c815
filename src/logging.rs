//! Logger setup for the binary
//!
//! `RUST_LOG` filters as usual and defaults to `warn`. Records carry a UTC
//! timestamp and the source location they were logged from.

use chrono::Utc;
use env_logger::{Builder, Env, Target};
use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::Path;

/// Target used for data-shape, transport and validation diagnostics
pub const DIAGNOSTICS_TARGET: &str = "mp_challenge::diagnostics";

fn builder() -> Builder {
    let mut builder = Builder::from_env(Env::default().default_filter_or("warn"));
    builder.format(|buf, record| {
        writeln!(
            buf,
            "[{}] {} {} ({}:{}) {}",
            Utc::now().format("%Y-%m-%d %H:%M:%S"),
            record.level(),
            record.target(),
            record.file().unwrap_or("unknown"),
            record.line().unwrap_or(0),
            record.args()
        )
    });
    builder
}

/// Installs the global logger, appending to `log_file` when given
///
/// A logger that is already installed is left in place.
pub fn init(log_file: Option<&Path>) -> io::Result<()> {
    let mut builder = builder();
    if let Some(path) = log_file {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        builder.target(Target::Pipe(Box::new(file)));
    }
    if builder.try_init().is_err() {
        log::debug!("logger already initialized");
    }
    Ok(())
}
