use anyhow::Result;
use sp500pe::{run, Config, RunOutcome};
use std::{env, path::PathBuf};
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

fn main() -> Result<()> {
    // ─── 1) init logging ─────────────────────────────────────────────
    let env = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt::Subscriber::builder()
        .with_env_filter(env)
        .with_target(false)
        .init();
    info!("startup");

    // ─── 2) args: [CONFIG.yaml] [--halt] ─────────────────────────────
    let mut halt = false;
    let mut config_path: Option<PathBuf> = None;
    for arg in env::args().skip(1) {
        match arg.as_str() {
            "--halt" => halt = true,
            _ => config_path = Some(PathBuf::from(arg)),
        }
    }
    let config = match &config_path {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };

    // ─── 3) run ──────────────────────────────────────────────────────
    match run(&config, halt)? {
        RunOutcome::NothingNew => info!("nothing to do"),
        RunOutcome::Halted(summary) => info!(
            read = summary.files_read.len(),
            failed = summary.failures.len(),
            "halted before writing"
        ),
        RunOutcome::Completed(summary) => info!(
            read = summary.files_read.len(),
            failed = summary.failures.len(),
            input = %config.input_dir.display(),
            output = %config.output_dir.display(),
            "retrieval is complete"
        ),
    }
    Ok(())
}
