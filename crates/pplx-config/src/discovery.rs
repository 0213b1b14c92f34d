//! Finding and layering pplx config files.
//!
//! Layers, lowest precedence first:
//! 1. `<config dir>/config.toml` (user config)
//! 2. `./pplx.toml` (project-local)
//! 3. CLI flags or MCP tool arguments (handled externally)
//!
//! An explicit `--config <path>` replaces steps 1 and 2 with that one file.

use std::path::{Path, PathBuf};

use crate::secrets::{API_KEY_ENV_VARS, ResolvedSecret, resolve_api_key};
use crate::{ConfigError, PplxConfig, Result};

/// Looked up in the working directory.
const PROJECT_CONFIG_FILE: &str = "pplx.toml";

/// Default config filename within the user config directory.
const USER_CONFIG_FILE: &str = "config.toml";

/// Application name for platform directory resolution.
const APP_NAME: &str = "pplx";

/// Overrides the platform config directory when set and non-empty.
const CONFIG_DIR_ENV: &str = "PPLX_CONFIG_DIR";

/// One candidate file and whether it contributed.
#[derive(Debug, Clone)]
pub struct ConfigSource {
    pub path: PathBuf,
    pub loaded: bool,
}

/// The merged configuration plus how it was assembled.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config: PplxConfig,
    /// Every candidate checked, lowest precedence first.
    pub sources: Vec<ConfigSource>,
    /// Non-fatal problems: unreadable layers, plaintext keys.
    pub warnings: Vec<String>,
}

impl LoadedConfig {
    /// Paths of the files that were read.
    pub fn loaded_from(&self) -> Vec<&Path> {
        self.sources
            .iter()
            .filter(|s| s.loaded)
            .map(|s| s.path.as_path())
            .collect()
    }

    /// Resolve the API key from the environment or the loaded config.
    pub fn api_key(&self) -> Result<ResolvedSecret> {
        resolve_api_key(self.config.api.api_key.as_deref()).ok_or_else(|| {
            ConfigError::ApiKeyNotFound {
                env_vars: API_KEY_ENV_VARS.join(" or "),
            }
        })
    }
}

/// Discover and merge the user and project config files.
pub fn load_config(project_dir: Option<&Path>) -> Result<LoadedConfig> {
    load_config_with_options(project_dir, None)
}

/// Like [`load_config`], with an explicit user config directory.
///
/// `config_dir` overrides both `PPLX_CONFIG_DIR` and the platform default.
pub fn load_config_with_options(
    project_dir: Option<&Path>,
    config_dir: Option<&Path>,
) -> Result<LoadedConfig> {
    let mut config = PplxConfig::new();
    let mut sources = Vec::new();
    let mut warnings = Vec::new();

    let user_config_path = match config_dir {
        Some(dir) => Some(dir.join(USER_CONFIG_FILE)),
        None => user_config_path(),
    };
    if let Some(path) = user_config_path {
        sources.push(load_layer(&mut config, &path, &mut warnings));
    }

    let project_path = project_dir
        .map(|d| d.join(PROJECT_CONFIG_FILE))
        .unwrap_or_else(|| PathBuf::from(PROJECT_CONFIG_FILE));
    sources.push(load_layer(&mut config, &project_path, &mut warnings));

    check_plaintext_keys(&config, &mut warnings);

    Ok(LoadedConfig {
        config,
        sources,
        warnings,
    })
}

/// Load a single explicitly named file, skipping discovery.
///
/// Unlike discovered layers, a missing or malformed file is an error.
pub fn load_config_from(path: &Path) -> Result<LoadedConfig> {
    let config = load_config_file(path)?;
    let mut warnings = Vec::new();
    check_plaintext_keys(&config, &mut warnings);
    Ok(LoadedConfig {
        config,
        sources: vec![ConfigSource {
            path: path.to_path_buf(),
            loaded: true,
        }],
        warnings,
    })
}

/// Read and parse one file.
pub fn load_config_file(path: &Path) -> Result<PplxConfig> {
    let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.display().to_string(),
        source: e,
    })?;
    PplxConfig::from_toml(&contents)
}

/// The user config directory.
///
/// Checks `PPLX_CONFIG_DIR` first, then falls back to the platform default
/// (`~/.config/pplx` on Linux, `~/Library/Application Support/pplx` on macOS).
pub fn config_dir() -> Option<PathBuf> {
    match std::env::var(CONFIG_DIR_ENV) {
        Ok(dir) if !dir.is_empty() => Some(PathBuf::from(dir)),
        _ => dirs::config_dir().map(|d| d.join(APP_NAME)),
    }
}

/// Path of the user config file.
pub fn user_config_path() -> Option<PathBuf> {
    config_dir().map(|d| d.join(USER_CONFIG_FILE))
}

/// Directory for rolling log files.
pub fn log_dir() -> Option<PathBuf> {
    config_dir().map(|d| d.join("logs"))
}

/// Merge one discovered layer into `config`.
///
/// Missing files are skipped; unreadable or malformed ones produce a warning.
fn load_layer(config: &mut PplxConfig, path: &Path, warnings: &mut Vec<String>) -> ConfigSource {
    if !path.is_file() {
        return ConfigSource {
            path: path.to_path_buf(),
            loaded: false,
        };
    }

    match load_config_file(path) {
        Ok(layer) => {
            config.merge(layer);
            ConfigSource {
                path: path.to_path_buf(),
                loaded: true,
            }
        }
        Err(e) => {
            warnings.push(format!("Failed to load {}: {}", path.display(), e));
            ConfigSource {
                path: path.to_path_buf(),
                loaded: false,
            }
        }
    }
}

fn check_plaintext_keys(config: &PplxConfig, warnings: &mut Vec<String>) {
    if config.api.has_plaintext_api_key() {
        warnings.push(format!(
            "[api] contains a plaintext API key. Consider using {} instead.",
            API_KEY_ENV_VARS[0]
        ));
    }
}
