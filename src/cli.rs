use std::path::PathBuf;

use clap::Parser;

/// Distributes surplus power over prioritized outputs.
///
/// Reads `<topic> <payload>` lines on stdin and writes the same form to
/// stdout.
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Args {
    /// Configuration file (TOML, or legacy JSON when the extension is .json)
    #[arg(short, long)]
    pub config: PathBuf,

    /// Log filter used when RUST_LOG is unset (e.g. "debug", "wattmgr=trace")
    #[arg(short, long, default_value = "info")]
    pub verbose: String,

    /// Also write logs to this file
    #[arg(short, long)]
    pub log_file: Option<PathBuf>,

    /// Write one CSV row per output per optimization pass
    #[arg(long)]
    pub telemetry_out: Option<PathBuf>,

    /// Validate the configuration, list the outputs and exit
    #[arg(long)]
    pub check: bool,
}
