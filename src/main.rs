//! Gateway filter-chain compiler (`configgen`)
//!
//! Turns a service configuration and a set of generator options into the
//! listener descriptor a sidecar proxy consumes.
//!
//! # Architecture Overview
//!
//! ```text
//!   service.json ──┐
//!                  ├─▶ config::loader ─▶ ServiceInfo + GeneratorOptions
//!   options.toml ──┘                              │
//!                                                 ▼
//!                                      ┌─────────────────────┐
//!                                      │ listener::assembler │
//!                                      │   stage table       │
//!                                      │   ├ filters::*      │
//!                                      │   └ router (last)   │
//!                                      └──────────┬──────────┘
//!                                                 ▼
//!                                  Listener JSON ─▶ stdout / --output
//!
//!   --watch: config::watcher recompiles on change until SIGINT/SIGTERM
//! ```

use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use clap::Parser;

use gateway_configgen::config::watcher::InputWatcher;
use gateway_configgen::lifecycle::signals::shutdown_signal;
use gateway_configgen::lifecycle::startup::{render, Inputs};
use gateway_configgen::observability::{logging, metrics};

#[derive(Parser)]
#[command(name = "configgen")]
#[command(about = "Compile a service configuration into a proxy listener", long_about = None)]
struct Cli {
    /// Service configuration (JSON)
    #[arg(short, long)]
    service: PathBuf,

    /// Generator options (TOML); defaults apply when omitted
    #[arg(short = 'c', long)]
    options: Option<PathBuf>,

    /// Write the listener here instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Recompile whenever an input changes
    #[arg(short, long)]
    watch: bool,

    /// Serve Prometheus metrics on this address (watch mode only)
    #[arg(long, requires = "watch")]
    metrics_address: Option<SocketAddr>,
}

fn write_output(path: Option<&Path>, output: &str) -> std::io::Result<()> {
    match path {
        Some(path) => {
            fs::write(path, output)?;
            tracing::info!(path = %path.display(), bytes = output.len(), "listener written");
        }
        None => println!("{output}"),
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let inputs = Inputs::new(cli.service.clone(), cli.options.clone());

    // The log level lives in the options file; a broken file is reported by
    // the first pass, so fall back to the default here.
    let level = inputs
        .load_options()
        .map(|opts| opts.observability.log_level)
        .unwrap_or_else(|_| "info".to_string());
    logging::init_logging(&level);

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        service = %cli.service.display(),
        watch = cli.watch,
        "configgen starting"
    );

    if !cli.watch {
        let output = render(&inputs)
            .inspect_err(|e| tracing::error!(error = %e, "compilation failed"))?;
        write_output(cli.output.as_deref(), &output)?;
        return Ok(());
    }

    if let Some(addr) = cli.metrics_address {
        metrics::init_metrics(addr)?;
    }

    let mut last = match render(&inputs) {
        Ok(output) => {
            write_output(cli.output.as_deref(), &output)?;
            Some(output)
        }
        Err(e) => {
            tracing::error!(error = %e, "initial compilation failed, waiting for changes");
            None
        }
    };

    let (watcher, mut updates) = InputWatcher::new(inputs);
    let _handle = watcher.run()?;

    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            Some(output) = updates.recv() => {
                if last.as_deref() == Some(output.as_str()) {
                    tracing::debug!("output unchanged, not rewriting");
                    continue;
                }
                if let Err(e) = write_output(cli.output.as_deref(), &output) {
                    tracing::error!(error = %e, "failed to write listener");
                    continue;
                }
                last = Some(output);
            }
            _ = &mut shutdown => break,
        }
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
