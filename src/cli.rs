//! CLI argument parsing via clap.

use clap::Parser;
use msftp::config::Config;

/// `--version` text: package version plus the commit captured by build.rs.
const VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    " (",
    env!("MSFTP_BUILD_GIT_HASH"),
    ")"
);

/// Interactive sftp-style shell that runs every command on several hosts at once.
#[derive(Debug, Parser)]
#[command(name = "msftp", version = VERSION)]
pub struct Args {
    /// Path to config file (default: ./msftp.toml or ~/.config/msftp/msftp.toml).
    #[arg(short = 'c', long = "config")]
    pub config: Option<String>,

    /// Connect to this configured host; repeat for several hosts.
    #[arg(short = 'H', long = "host", value_name = "LABEL")]
    pub hosts: Vec<String>,

    /// Open the host picker even when hosts are given.
    #[arg(long = "list")]
    pub list: bool,

    /// Disable color output.
    #[arg(long = "no-color")]
    pub no_color: bool,

    /// Log debug diagnostics to stderr.
    #[arg(long = "verbose")]
    pub verbose: bool,
}

impl Args {
    /// Whether the host picker decides which hosts to connect to.
    pub fn wants_picker(&self) -> bool {
        self.list || self.hosts.is_empty()
    }

    /// `-H` labels checked against the config, first occurrence kept.
    pub fn configured_hosts(&self, config: &Config) -> Result<Vec<String>, String> {
        let mut labels = Vec::new();
        for label in &self.hosts {
            if !config.server.contains_key(label) {
                return Err(format!("host {label} not found in config"));
            }
            if !labels.contains(label) {
                labels.push(label.clone());
            }
        }
        Ok(labels)
    }
}

#[cfg(test)]
mod tests {
    use super::Args;
    use clap::Parser;
    use msftp::config::parse_config;

    #[test]
    fn hosts_repeat_in_order() {
        let args = Args::parse_from(["msftp", "-H", "web1", "--host", "db1"]);
        assert_eq!(args.hosts, vec!["web1", "db1"]);
        assert!(!args.wants_picker());
    }

    #[test]
    fn picker_without_hosts_or_with_list() {
        assert!(Args::parse_from(["msftp"]).wants_picker());
        let args = Args::parse_from(["msftp", "-H", "web1", "--list", "-c", "/etc/m.toml"]);
        assert!(args.wants_picker());
        assert_eq!(args.config.as_deref(), Some("/etc/m.toml"));
    }

    #[test]
    fn version_carries_build_hash() {
        assert!(super::VERSION.starts_with(env!("CARGO_PKG_VERSION")));
        assert!(super::VERSION.ends_with(')'));
    }

    #[test]
    fn flags_default_off() {
        let args = Args::parse_from(["msftp", "--no-color", "--verbose"]);
        assert!(args.no_color && args.verbose);
        let plain = Args::parse_from(["msftp"]);
        assert!(!plain.no_color && !plain.verbose);
    }

    #[test]
    fn configured_hosts_rejects_unknown_labels() {
        let config = parse_config("[server.a]\naddr = \"h1\"\n[server.b]\naddr = \"h2\"\n")
            .expect("parse");
        let args = Args::parse_from(["msftp", "-H", "b", "-H", "a", "-H", "b"]);
        assert_eq!(args.configured_hosts(&config).unwrap(), vec!["b", "a"]);
        let bad = Args::parse_from(["msftp", "-H", "zz"]);
        assert_eq!(
            bad.configured_hosts(&config).unwrap_err(),
            "host zz not found in config"
        );
    }
}
