//! Configuration loading from TOML files.
//!
//! Config is loaded in this order of precedence (highest wins):
//! 1. TOML file specified via --config CLI flag
//! 2. ./msftp.toml in the current directory
//! 3. $XDG_CONFIG_HOME/msftp/msftp.toml (or ~/.config/msftp/msftp.toml)
//! 4. Built-in defaults (no servers)

mod defaults;
mod init;
mod loader;
mod types;

pub use defaults::{DEFAULT_OUTPUT_PROMPT, SERVER_PLACEHOLDER};
pub use init::{config_root_dir, default_global_config_path, default_history_path};
pub use loader::{load_config, parse_config, parse_umask};
pub use types::{Config, DisplayConfig, ServerConfig, SftpConfig};
