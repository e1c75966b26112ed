// disco/src/main.rs

mod cli;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use disco_core::application::Reactive;
use disco_core::infrastructure::config::DiscoConfig;

use cli::Cli;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Cli::parse();
    init_logging(&args.log_level);

    // A. Layered configuration: defaults <- file <- DISCO_CFG
    let config = DiscoConfig::layered(Some(args.conf.as_path()))?;

    // B. Build the engine and its rule base from the search path
    let mut engine = Reactive::new(config);
    let rules = engine.find_rules()?;
    let schemas = engine.find_schemas().await?;
    info!(rules, schemas, "🔍 disco agent starting");

    // C. Discovery + rule loop, concurrently, until the rule set completes
    match engine.run_to_completion().await {
        Ok(true) => {
            info!("✨ Container configured");
            info!(cmd = ?args.cmd, "handing off to payload");
            // exec only comes back on failure
            let err = exec_payload(&args.cmd);
            error!(error = %err, "exec failed");
            std::process::exit(1);
        }
        Ok(false) => {
            error!("❌ Unable to configure container, see log or run with -l debug");
            std::process::exit(1);
        }
        Err(e) => {
            error!(error = %e, "💥 CRITICAL AGENT ERROR");
            std::process::exit(1);
        }
    }
}

fn init_logging(level: &str) {
    // RUST_LOG overrides the CLI flag when set. The HTTP client stack is
    // noisy at debug; keep it at warn unless asked for explicitly.
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("{level},hyper_util=warn,reqwest=warn")));
    // stdout belongs to the payload command after exec; keep our noise out
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Replace the current process image with the payload command so signals
/// and PID 1 duties pass to it. On non-unix targets the nearest primitive
/// is spawn-and-exit with the child's status.
#[cfg(unix)]
fn exec_payload(cmd: &[String]) -> std::io::Error {
    use std::os::unix::process::CommandExt;
    std::process::Command::new(&cmd[0]).args(&cmd[1..]).exec()
}

#[cfg(not(unix))]
fn exec_payload(cmd: &[String]) -> std::io::Error {
    match std::process::Command::new(&cmd[0]).args(&cmd[1..]).status() {
        Ok(status) => std::process::exit(status.code().unwrap_or(0)),
        Err(e) => e,
    }
}
