//! Diagnostic logging setup.
//!
//! Log events go to stderr so they never interleave with command output on
//! stdout. `MSFTP_LOG` takes an `EnvFilter` directive; without it the level is
//! `warn`, or `debug` when `--verbose` is given.

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

pub const LOG_ENV: &str = "MSFTP_LOG";

fn default_directive(verbose: bool) -> &'static str {
    if verbose {
        "msftp=debug,warn"
    } else {
        "warn"
    }
}

fn build_filter(env_value: Option<&str>, verbose: bool) -> EnvFilter {
    env_value
        .and_then(|value| EnvFilter::try_new(value).ok())
        .unwrap_or_else(|| EnvFilter::new(default_directive(verbose)))
}

pub fn init(verbose: bool) {
    let env_value = std::env::var(LOG_ENV).ok();
    let filter = build_filter(env_value.as_deref(), verbose);
    let _ = tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .with(filter)
        .try_init();
}
