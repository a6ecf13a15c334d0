use std::path::{Path, PathBuf};

use crate::error::ConfigError;

use super::types::AppConfig;

/// Project-local config file name.
pub const CONFIG_FILE: &str = "morph.toml";

pub const ENV_LOG_LEVEL: &str = "MORPH_LOG_LEVEL";
pub const ENV_OUTPUT_ROOT: &str = "MORPH_OUTPUT_ROOT";
pub const ENV_MAX_PARALLEL: &str = "MORPH_MAX_PARALLEL";

/// Get the morph data directory: ~/.morph
pub fn get_morph_data_dir() -> Result<PathBuf, ConfigError> {
    dirs::home_dir()
        .map(|home| home.join(".morph"))
        .ok_or(ConfigError::NoHomeDir)
}

/// Loads configuration for `workspace`.
///
/// Priority: `explicit` (must exist) > `<workspace>/morph.toml` >
/// `~/.morph/config.toml` > defaults. Environment overrides are applied last.
pub fn load(explicit: Option<&Path>, workspace: &Path) -> Result<AppConfig, ConfigError> {
    let mut cfg = match explicit {
        Some(path) => load_from(path)?,
        None => {
            let local = workspace.join(CONFIG_FILE);
            let global = get_morph_data_dir().ok().map(|dir| dir.join("config.toml"));
            if local.exists() {
                load_from(&local)?
            } else if let Some(global) = global.filter(|p| p.exists()) {
                load_from(&global)?
            } else {
                tracing::debug!("no config file found, using defaults");
                AppConfig::default()
            }
        }
    };

    if cfg
        .logging
        .directory
        .as_deref()
        .map_or(true, |d| d.trim().is_empty())
    {
        cfg.logging.directory = get_morph_data_dir()
            .ok()
            .map(|dir| dir.join("logs").to_string_lossy().into_owned());
    }

    apply_env_overrides(&mut cfg, |key| std::env::var(key).ok())?;
    Ok(cfg)
}

pub fn load_default(workspace: &Path) -> Result<AppConfig, ConfigError> {
    load(None, workspace)
}

pub fn load_from(path: &Path) -> Result<AppConfig, ConfigError> {
    let shown = path.display().to_string();
    let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: shown.clone(),
        source,
    })?;
    let cfg = parse_config(&raw).map_err(|source| ConfigError::Parse {
        path: shown.clone(),
        source,
    })?;
    tracing::debug!(path = %shown, "loaded config");
    Ok(cfg)
}

pub fn parse_config(raw: &str) -> Result<AppConfig, toml::de::Error> {
    toml::from_str(raw)
}

/// Applies `MORPH_*` overrides. Blank values are ignored.
pub fn apply_env_overrides<F>(cfg: &mut AppConfig, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

    if let Some(level) = get(ENV_LOG_LEVEL) {
        cfg.logging.level = level;
    }
    if let Some(root) = get(ENV_OUTPUT_ROOT) {
        cfg.output.root = root;
    }
    if let Some(raw) = get(ENV_MAX_PARALLEL) {
        cfg.run.max_parallel = raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidEnv {
                key: ENV_MAX_PARALLEL,
                value: raw.clone(),
            })?;
    }
    Ok(())
}
