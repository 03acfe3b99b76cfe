mod types;

pub use types::*;

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

const DEFAULT_PATHS: [&str; 2] = ["./remuxcode.toml", "~/.config/remuxcode/config.toml"];

/// Load configuration from a TOML file
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    let mut config: Config = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {:?}", path))?;

    apply_env_overrides(&mut config)?;
    validate_config(&config)?;

    Ok(config)
}

/// Locate the config file: the explicit path, then the default locations.
pub fn find_config(custom_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = custom_path {
        return Some(path.to_path_buf());
    }

    DEFAULT_PATHS.iter().find_map(|path_str| {
        let path = PathBuf::from(shellexpand::tilde(path_str).as_ref());
        path.exists().then_some(path)
    })
}

/// Load config from default locations or return default config
pub fn load_config_or_default(custom_path: Option<&Path>) -> Result<Config> {
    if let Some(path) = find_config(custom_path) {
        return load_config(&path);
    }

    let mut config = Config::default();
    apply_env_overrides(&mut config)?;
    validate_config(&config)?;
    Ok(config)
}

/// Directory for the job database: `processing.data_dir`, else the config
/// file's directory, else the working directory.
pub fn data_dir(config: &Config, config_path: Option<&Path>) -> PathBuf {
    if let Some(ref dir) = config.processing.data_dir {
        return PathBuf::from(shellexpand::tilde(&dir.to_string_lossy()).as_ref());
    }

    config_path
        .and_then(|p| p.parent())
        .filter(|p| !p.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")))
}

/// Apply `REMUXCODE_*` environment variables on top of the parsed file.
pub fn apply_env_overrides(config: &mut Config) -> Result<()> {
    if let Ok(host) = std::env::var("REMUXCODE_HOST") {
        config.server.host = host;
    }
    if let Ok(port) = std::env::var("REMUXCODE_PORT") {
        config.server.port = port
            .parse()
            .with_context(|| format!("Invalid REMUXCODE_PORT: {}", port))?;
    }
    if let Ok(workers) = std::env::var("REMUXCODE_WORKERS") {
        config.processing.workers = workers
            .parse()
            .with_context(|| format!("Invalid REMUXCODE_WORKERS: {}", workers))?;
    }
    if let Ok(key) = std::env::var("REMUXCODE_API_KEY") {
        config.server.api_key = Some(key);
    }
    if let Ok(dir) = std::env::var("REMUXCODE_TEMP_DIR") {
        let dir = dir.trim();
        if !dir.is_empty() {
            config.processing.temp_dir = Some(PathBuf::from(dir));
        }
    }
    Ok(())
}

/// Validate configuration
pub fn validate_config(config: &Config) -> Result<()> {
    if config.server.port == 0 {
        anyhow::bail!("Server port cannot be 0");
    }

    if config.processing.workers == 0 {
        anyhow::bail!("processing.workers must be at least 1");
    }

    if let Some(ref dir) = config.processing.temp_dir {
        if !dir.exists() {
            tracing::warn!("Temp dir does not exist yet: {:?}", dir);
        }
    }

    for arr in &config.arrs {
        if arr.enabled && arr.url.trim().is_empty() {
            anyhow::bail!("Arr '{}' is enabled but has no URL", arr.name);
        }
        if arr.enabled && arr.api_key.is_empty() {
            anyhow::bail!("Arr '{}' is enabled but has no API key", arr.name);
        }
    }

    for mapping in &config.path_mappings {
        if mapping.container.is_empty() || mapping.host.is_empty() {
            anyhow::bail!(
                "Path mapping '{}' -> '{}' has an empty prefix",
                mapping.container,
                mapping.host
            );
        }
    }

    Ok(())
}
