//! Configuration file discovery
//!
//! Connector services resolve their TOML configuration file following a
//! fixed priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. OS-dependent default config location (fallback)

use std::path::PathBuf;

/// Resolve the configuration file path for a connector service.
///
/// Returns `None` when no explicit path is given and no default config
/// file exists on disk; callers fall back to compiled defaults in that
/// case rather than failing startup.
pub fn resolve_config_file(
    cli_arg: Option<&str>,
    env_var_name: &str,
    service_name: &str,
) -> Option<PathBuf> {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        tracing::debug!(path = %path, "Config file taken from command line");
        return Some(PathBuf::from(path));
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(env_var_name) {
        if !path.trim().is_empty() {
            tracing::debug!(path = %path, var = %env_var_name, "Config file taken from environment");
            return Some(PathBuf::from(path));
        }
    }

    // Priority 3: OS-dependent default location
    let default = default_config_file(service_name)?;
    if default.exists() {
        tracing::debug!(path = %default.display(), "Config file found at default location");
        Some(default)
    } else {
        None
    }
}

/// Default configuration file path for the platform
fn default_config_file(service_name: &str) -> Option<PathBuf> {
    let file_name = format!("{}.toml", service_name);

    if cfg!(target_os = "linux") {
        // Try ~/.config/pulsefeed/<service>.toml first, then /etc/pulsefeed/
        if let Some(user_config) = dirs::config_dir() {
            let path = user_config.join("pulsefeed").join(&file_name);
            if path.exists() {
                return Some(path);
            }
        }
        let system_config = PathBuf::from("/etc/pulsefeed").join(&file_name);
        if system_config.exists() {
            return Some(system_config);
        }
        dirs::config_dir().map(|d| d.join("pulsefeed").join(&file_name))
    } else {
        dirs::config_dir().map(|d| d.join("pulsefeed").join(&file_name))
    }
}
