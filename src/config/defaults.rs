//! Default configuration constants.

/// Output tag template applied per host when several hosts are targeted.
pub const DEFAULT_OUTPUT_PROMPT: &str = "${SERVER} :: ";
/// Placeholder substituted with the host label in output templates.
pub const SERVER_PLACEHOLDER: &str = "${SERVER}";
/// Seconds between keepalive sweeps.
pub(super) const DEFAULT_KEEPALIVE_INTERVAL_SECS: u64 = 3;
pub(super) const DEFAULT_LOCAL_UMASK: &str = "022";
/// ssh `ConnectTimeout`; bounds connection setup only.
pub(super) const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

/// File name looked up in the working directory and the config root.
pub(super) const CONFIG_FILE_NAME: &str = "msftp.toml";
/// Directory under the config root holding config and history.
pub(super) const CONFIG_DIR_NAME: &str = "msftp";
