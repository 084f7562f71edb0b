mod types;

pub use types::*;

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// Load configuration from a TOML file
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    let config: Config = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {:?}", path))?;

    validate_config(&config)?;

    Ok(config)
}

/// Load config from default locations or return default config
pub fn load_config_or_default(custom_path: Option<&Path>) -> Result<Config> {
    if let Some(path) = custom_path {
        return load_config(path);
    }

    if let Some(path) = find_config_file() {
        return load_config(&path);
    }

    // Return default config if no file found
    Ok(Config::default())
}

/// First existing file among the default config locations.
pub fn find_config_file() -> Option<PathBuf> {
    let default_paths = [
        "./rawdrop.toml",
        "~/.config/rawdrop/config.toml",
        "/etc/rawdrop/config.toml",
    ];

    default_paths
        .into_iter()
        .map(|path_str| PathBuf::from(shellexpand::tilde(path_str).into_owned()))
        .find(|path| path.exists())
}

/// Validate configuration
///
/// Everything rejected here would otherwise fail later at runtime, so the
/// server refuses to start instead.
pub fn validate_config(config: &Config) -> Result<()> {
    if config.server.port == 0 {
        anyhow::bail!("Server port cannot be 0");
    }

    let conversion = &config.conversion;
    if conversion.max_workers == 0 {
        anyhow::bail!("conversion.max_workers must be at least 1");
    }
    if conversion.queue_capacity == 0 {
        anyhow::bail!("conversion.queue_capacity must be at least 1");
    }
    if !(1..=100).contains(&conversion.jpeg_quality) {
        anyhow::bail!(
            "conversion.jpeg_quality must be between 1 and 100, got {}",
            conversion.jpeg_quality
        );
    }
    if conversion.task_timeout_secs == 0 {
        anyhow::bail!("conversion.task_timeout_secs must be at least 1");
    }

    if config.media.max_upload_bytes == 0 {
        anyhow::bail!("media.max_upload_bytes must be greater than 0");
    }

    let auth = &config.auth;
    if auth.enabled {
        if auth.session_secret.as_deref().map_or(true, str::is_empty) {
            anyhow::bail!(
                "Authentication is enabled but auth.session_secret is not set (see `rawdrop generate-secret`)"
            );
        }
        if auth.username.is_none() || auth.password_hash.is_none() {
            tracing::warn!("Authentication is enabled but no login is configured; logins will be refused");
        }
        if auth.session_timeout_minutes == 0 {
            anyhow::bail!("auth.session_timeout_minutes must be at least 1");
        }
    }

    Ok(())
}
