//! Top-level config loading pipeline.
//!
//! Source order: explicit path > `./msftp.toml` > global file > built-in
//! defaults.

use std::path::{Path, PathBuf};

use crate::error::ConfigError;

use super::defaults::{CONFIG_DIR_NAME, CONFIG_FILE_NAME};
use super::init::config_root_dir;
use super::Config;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) enum ConfigSource {
    /// Config loaded from explicit `--config` path.
    Explicit(PathBuf),
    /// Config loaded from `./msftp.toml`.
    Local,
    /// Config loaded from `<config_root>/msftp/msftp.toml`.
    Global(PathBuf),
    /// No file found; runtime defaults were used.
    BuiltInDefaults,
}

/// Load configuration from disk.
///
/// `path_override` is an explicit config file path (from --config flag).
pub fn load_config(path_override: Option<&str>) -> Result<Config, ConfigError> {
    load_config_from_sources(
        path_override,
        |path| std::fs::read_to_string(path),
        config_root_dir,
    )
}

pub(super) fn load_config_from_sources<FRead, FRoot>(
    path_override: Option<&str>,
    read_file: FRead,
    config_root: FRoot,
) -> Result<Config, ConfigError>
where
    FRead: Fn(&Path) -> Result<String, std::io::Error>,
    FRoot: Fn() -> Option<PathBuf>,
{
    let (text, source) = read_config_text_with_sources(path_override, &read_file, &config_root)?;
    tracing::debug!(?source, "loading configuration");
    parse_config(&text)
}

/// Parse and validate TOML text into a runtime config.
pub fn parse_config(text: &str) -> Result<Config, ConfigError> {
    let config: Config = toml::from_str(text)?;
    validate_config(&config)?;
    Ok(config)
}

/// Read config text from the highest-precedence available source.
pub(super) fn read_config_text_with_sources<FRead, FRoot>(
    path_override: Option<&str>,
    read_file: &FRead,
    config_root: &FRoot,
) -> Result<(String, ConfigSource), ConfigError>
where
    FRead: Fn(&Path) -> Result<String, std::io::Error>,
    FRoot: Fn() -> Option<PathBuf>,
{
    // An explicit path must exist; implicit locations fall through.
    if let Some(p) = path_override {
        let path = PathBuf::from(p);
        let text = read_file(&path)?;
        return Ok((text, ConfigSource::Explicit(path)));
    }

    if let Ok(text) = read_file(Path::new(CONFIG_FILE_NAME)) {
        return Ok((text, ConfigSource::Local));
    }
    if let Some(dir) = config_root() {
        let global = dir.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME);
        if let Ok(text) = read_file(&global) {
            return Ok((text, ConfigSource::Global(global)));
        }
    }

    Ok((String::new(), ConfigSource::BuiltInDefaults))
}

fn validate_config(config: &Config) -> Result<(), ConfigError> {
    for (label, server) in &config.server {
        if label.trim().is_empty() {
            return Err(ConfigError::Invalid("server label cannot be empty".into()));
        }
        if label.contains([',', ':']) {
            return Err(ConfigError::Invalid(format!(
                "server label `{label}` cannot contain `,` or `:`"
            )));
        }
        if server.addr.trim().is_empty() {
            return Err(ConfigError::Invalid(format!(
                "server.{label}.addr is required"
            )));
        }
    }
    if config.sftp.keepalive_interval_secs == 0 {
        return Err(ConfigError::Invalid(
            "sftp.keepalive_interval_secs must be greater than zero".into(),
        ));
    }
    parse_umask(&config.sftp.local_umask)?;
    Ok(())
}

/// Parse a three-digit octal umask such as `022`.
pub fn parse_umask(raw: &str) -> Result<u32, ConfigError> {
    let trimmed = raw.trim();
    if trimmed.len() != 3 || !trimmed.chars().all(|c| ('0'..='7').contains(&c)) {
        return Err(ConfigError::Invalid(format!(
            "umask `{raw}` must be three octal digits"
        )));
    }
    u32::from_str_radix(trimmed, 8)
        .map_err(|e| ConfigError::Invalid(format!("umask `{raw}`: {e}")))
}
