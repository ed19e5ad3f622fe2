//! CLI entry point for msftp.

mod cli;

use clap::Parser;
use msftp::commands::{LocalState, ShellContext};
use msftp::config::{default_history_path, load_config, parse_umask, Config};
use msftp::output::{stderr_sink, stdout_sink};
use msftp::picker::choose_hosts;
use msftp::remote::ssh::SshConnector;
use msftp::session::{build_pool, PoolOptions};
use msftp::shell::Shell;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

const NO_SERVER: &str = "Error: No server to connect.";

#[tokio::main]
async fn main() {
    let args = cli::Args::parse();
    msftp::logging::init(args.verbose);

    let mut config = match load_config(args.config.as_deref()) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    };
    if args.no_color {
        config.display.color = false;
    }
    let color = config.display.color;

    let labels = match select_hosts(&args, &config) {
        Ok(labels) => labels,
        Err(msg) => {
            eprintln!("Error: {msg}");
            std::process::exit(1);
        }
    };
    if labels.is_empty() {
        eprintln!("{NO_SERVER}");
        std::process::exit(1);
    }

    let umask = match parse_umask(&config.sftp.local_umask) {
        Ok(umask) => umask,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    };

    let options = PoolOptions {
        template: config.sftp.prompt.clone(),
        color,
        sink: stdout_sink(),
    };
    let connector = Arc::new(SshConnector::new(config.clone()));
    let registry = build_pool(&labels, connector, &options, &mut std::io::stderr()).await;
    if registry.is_empty() {
        eprintln!("{NO_SERVER}");
        std::process::exit(1);
    }
    tracing::info!(hosts = registry.len(), "pool ready");

    let local = LocalState {
        cwd: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
        umask,
    };
    let ctx = ShellContext::new(Arc::new(registry), stdout_sink(), stderr_sink(), local);
    let shell = Shell::new(ctx, color, default_history_path());
    let interval = Duration::from_secs(config.sftp.keepalive_interval_secs);
    let code = shell.run(interval, stderr_sink()).await;
    std::process::exit(code);
}

fn select_hosts(args: &cli::Args, config: &Config) -> Result<Vec<String>, String> {
    if !args.wants_picker() {
        return args.configured_hosts(config);
    }
    match choose_hosts(config, config.display.color) {
        Ok(Some(labels)) => Ok(labels),
        Ok(None) => Ok(Vec::new()),
        Err(e) => Err(format!("host picker: {e}")),
    }
}
