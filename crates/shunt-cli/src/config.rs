//! Application configuration.
//!
//! [`AppConfig`] is loaded once at startup and passed down by value.  The
//! CLI layer owns config; the core crate only ever sees the
//! [`ResolutionOptions`] derived from it.
//!
//! # Resolution order (highest priority first)
//!
//! 1. CLI flags (handled at the call-site, not here)
//! 2. Environment variables prefixed `SHUNT__` (`SHUNT__RESOLUTION__MAX_PASSES=8`)
//! 3. Config file (`--config`, else the platform config dir, else `.shunt.toml`)
//! 4. Built-in defaults (always present)

use std::path::PathBuf;

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use shunt_core::application::{DEFAULT_TEMPLATE_FOLDER, ResolutionOptions};
use shunt_core::application::services::DEFAULT_MAX_PASSES;
use tracing::debug;

use crate::error::{CliError, CliResult};

/// Config file looked up in the working directory.
pub const LOCAL_CONFIG_FILE: &str = ".shunt.toml";

const ENV_PREFIX: &str = "SHUNT";
const ENV_SEPARATOR: &str = "__";

/// Application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Fixpoint loop settings.
    #[serde(default)]
    pub resolution: ResolutionConfig,
    /// Template lookup.
    #[serde(default)]
    pub templates: TemplateConfig,
    /// Output settings.
    #[serde(default)]
    pub output: OutputConfig,
    /// File the configuration was read from, if any.
    #[serde(skip)]
    pub loaded_from: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolutionConfig {
    pub max_passes: usize,
    pub spool_intermediates: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spool_dir: Option<PathBuf>,
}

impl Default for ResolutionConfig {
    fn default() -> Self {
        Self {
            max_passes: DEFAULT_MAX_PASSES,
            spool_intermediates: false,
            spool_dir: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TemplateConfig {
    /// Name of the directories searched for views.
    pub folder_name: String,
    /// Directories searched after every project template directory.
    pub extra_paths: Vec<PathBuf>,
}

impl Default for TemplateConfig {
    fn default() -> Self {
        Self {
            folder_name: DEFAULT_TEMPLATE_FOLDER.into(),
            extra_paths: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub no_color: bool,
    pub format: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            no_color: false,
            format: "human".into(),
        }
    }
}

impl AppConfig {
    /// Load configuration: defaults, then a file, then the environment.
    ///
    /// `config_file` is the path passed via `--config`; it must exist. Without
    /// it the default locations are tried and silently skipped when absent.
    pub fn load(config_file: Option<&PathBuf>) -> CliResult<Self> {
        let defaults = Config::try_from(&Self::default()).map_err(config_error)?;
        let mut builder = Config::builder().add_source(defaults);

        let loaded_from = match config_file {
            Some(path) => {
                builder = builder.add_source(File::from(path.as_path()).required(true));
                Some(path.clone())
            }
            None => {
                let found = [Self::config_path(), PathBuf::from(LOCAL_CONFIG_FILE)]
                    .into_iter()
                    .find(|candidate| candidate.is_file());
                if let Some(path) = &found {
                    builder = builder.add_source(File::from(path.as_path()).required(false));
                }
                found
            }
        };

        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator(ENV_SEPARATOR)
                .separator(ENV_SEPARATOR)
                .try_parsing(true)
                .list_separator(",")
                .with_list_parse_key("templates.extra_paths"),
        );

        let mut config: Self = builder
            .build()
            .and_then(|c| c.try_deserialize::<Self>())
            .map_err(config_error)?;
        config.loaded_from = loaded_from;
        debug!(file = ?config.loaded_from, "configuration loaded");
        Ok(config)
    }

    /// Path to the default configuration file.
    ///
    /// Uses `directories::ProjectDirs` for cross-platform correctness,
    /// falling back to `.shunt.toml` in the current directory.
    pub fn config_path() -> PathBuf {
        directories::ProjectDirs::from("dev", "shunt", "shunt")
            .map(|d| d.config_dir().join("config.toml"))
            .unwrap_or_else(|| PathBuf::from(LOCAL_CONFIG_FILE))
    }

    /// The file in effect: the one loaded, or where one would be read from.
    pub fn active_path(&self) -> PathBuf {
        self.loaded_from.clone().unwrap_or_else(Self::config_path)
    }

    /// Engine options with CLI overrides applied on top.
    pub fn resolution_options(&self, max_passes: Option<usize>, spool: bool) -> ResolutionOptions {
        ResolutionOptions {
            max_passes: max_passes.unwrap_or(self.resolution.max_passes),
            spool_intermediates: spool || self.resolution.spool_intermediates,
            spool_dir: self.resolution.spool_dir.clone(),
        }
    }
}

fn config_error(e: config::ConfigError) -> CliError {
    CliError::ConfigError {
        message: e.to_string(),
        source: Some(Box::new(e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_engine() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.resolution.max_passes, DEFAULT_MAX_PASSES);
        assert_eq!(cfg.templates.folder_name, "shunts");
        assert!(!cfg.output.no_color);
    }

    #[test]
    fn explicit_file_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shunt.toml");
        std::fs::write(
            &path,
            "[resolution]\nmax_passes = 5\n\n[templates]\nfolder_name = \"views\"\n",
        )
        .unwrap();

        let cfg = AppConfig::load(Some(&path)).unwrap();
        assert_eq!(cfg.resolution.max_passes, 5);
        assert_eq!(cfg.templates.folder_name, "views");
        assert!(!cfg.resolution.spool_intermediates);
        assert_eq!(cfg.active_path(), path);
    }

    #[test]
    fn missing_explicit_file_is_a_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = AppConfig::load(Some(&dir.path().join("absent.toml"))).unwrap_err();
        assert_eq!(err.exit_code(), 4);
    }

    #[test]
    fn cli_overrides_win() {
        let cfg = AppConfig::default();
        let options = cfg.resolution_options(Some(3), true);
        assert_eq!(options.max_passes, 3);
        assert!(options.spool_intermediates);
        assert_eq!(cfg.resolution_options(None, false), ResolutionOptions::default());
    }

    #[test]
    fn config_path_is_not_empty() {
        assert!(!AppConfig::config_path().as_os_str().is_empty());
    }
}
