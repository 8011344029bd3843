//! wattmgr entry point: CLI, logging and runtime wiring.

use std::path::Path;

use anyhow::{Context, Result, bail};
use clap::Parser;
use tracing::{error, info};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

use wattmgr::bus::outbox;
use wattmgr::cli::Args;
use wattmgr::config::WattConfig;
use wattmgr::control::{Allocator, SystemClock};
use wattmgr::devices::DutyMode;
use wattmgr::runtime;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let args = Args::parse();
    let _guard = init_tracing(&args.verbose, args.log_file.as_deref())?;

    let config = WattConfig::from_file(&args.config)
        .with_context(|| format!("failed to load {}", args.config.display()))?;
    let errors = config.validate();
    if !errors.is_empty() {
        for e in &errors {
            error!("{e}");
        }
        bail!(
            "{} invalid setting(s) in {}",
            errors.len(),
            args.config.display()
        );
    }

    if args.check {
        print_outputs(&config);
        return Ok(());
    }

    let (tx, mut rx) = outbox();
    let mut allocator = Allocator::from_config(&config, tx, SystemClock::new());
    info!(
        client_id = %config.mqtt.client_id,
        host = %config.mqtt.host,
        "connecting"
    );
    runtime::run_stdio(&mut allocator, &mut rx, args.telemetry_out.as_deref())
        .await
        .context("allocator loop failed")?;

    Ok(())
}

/// Logs go to stderr (stdout carries bus traffic) and optionally to a file.
///
/// The returned guard must live until exit so buffered file logs are flushed.
fn init_tracing(default_filter: &str, log_file: Option<&Path>) -> Result<Option<WorkerGuard>> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    let (file_layer, guard) = match log_file {
        Some(path) => {
            let dir = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or(Path::new("."));
            let name = path
                .file_name()
                .with_context(|| format!("log file {} has no file name", path.display()))?;
            let (writer, guard) =
                tracing_appender::non_blocking(tracing_appender::rolling::never(dir, name));
            let layer = fmt::layer().with_ansi(false).with_writer(writer);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    // Ignore error if already set (e.g., during tests).
    let _ = tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(file_layer)
        .try_init();

    Ok(guard)
}

fn print_outputs(config: &WattConfig) {
    let mut outputs: Vec<_> = config.outputs.iter().map(|o| o.to_spec()).collect();
    outputs.sort_by_key(|o| o.priority);

    println!("client id: {}", config.mqtt.client_id);
    println!("{:<16} {:>8} {:>8}  duty", "output", "priority", "max kW");
    for o in &outputs {
        let duty = match &o.duty {
            DutyMode::Binary => "binary".to_string(),
            DutyMode::Linear => "linear".to_string(),
            DutyMode::Curve(c) => format!("curve ({} points)", c.points().len()),
        };
        println!("{:<16} {:>8} {:>8.3}  {duty}", o.id, o.priority, o.max_kw);
    }
    let max_kw: f32 = outputs.iter().map(|o| o.max_kw).sum();
    println!("total max: {max_kw:.3} kW");
}
