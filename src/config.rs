//! Configuration for the unwind runtime
//!
//! Settings are layered, later layers winning:
//! 1. built-in defaults
//! 2. a TOML file (`--config`, `UNWIND_CONFIG_PATH`, or `./unwind.toml` if present)
//! 3. `UNWIND_*` environment variables (a `.env` file is read first)
//! 4. explicit builder overrides
//!
//! The loaded settings become the process-wide default through [`install`].
//! Every thread copies the default into its own unwind state on first use.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::OnceLock;

const ENV_PREFIX: &str = "UNWIND";
const CONFIG_PATH_VAR: &str = "UNWIND_CONFIG_PATH";
const DEFAULT_CONFIG_FILE: &str = "unwind.toml";

static INSTALLED: OnceLock<Settings> = OnceLock::new();

/// Behaviour switches of the control-transfer core
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Report transfers to frames invalidated by an earlier exit as
    /// `AbandonedUnwind` rather than as out-of-extent
    pub strict_abandon: bool,

    /// Send every transfer down the native-unwinding path
    pub force_fallback: bool,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub settings: Settings,

    /// The file the settings were read from, if any
    pub source: Option<PathBuf>,
}

impl Config {
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Load with no overrides
    pub fn load() -> Result<Self> {
        Self::builder().build()
    }

    /// Render the effective settings as TOML
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(&self.settings).context("Failed to render settings as TOML")
    }
}

#[derive(Debug, Default)]
pub struct ConfigBuilder {
    config_path: Option<PathBuf>,
    strict_abandon: Option<bool>,
    force_fallback: Option<bool>,
}

impl ConfigBuilder {
    /// Read this file instead of searching for one. The file must exist.
    pub fn config_path(mut self, path: Option<PathBuf>) -> Self {
        self.config_path = path;
        self
    }

    pub fn strict_abandon(mut self, strict: bool) -> Self {
        self.strict_abandon = Some(strict);
        self
    }

    pub fn force_fallback(mut self, force: bool) -> Self {
        self.force_fallback = Some(force);
        self
    }

    pub fn build(self) -> Result<Config> {
        dotenvy::dotenv().ok();

        let (path, required) = match self.config_path {
            Some(path) => (Some(path), true),
            None => match std::env::var(CONFIG_PATH_VAR) {
                Ok(path) => (Some(PathBuf::from(path)), true),
                Err(_) => {
                    let default = PathBuf::from(DEFAULT_CONFIG_FILE);
                    let exists = default.exists();
                    (exists.then_some(default), false)
                }
            },
        };

        let defaults = Settings::default();
        let mut layers = ::config::Config::builder()
            .set_default("strict_abandon", defaults.strict_abandon)?
            .set_default("force_fallback", defaults.force_fallback)?;

        if let Some(path) = &path {
            layers = layers.add_source(
                ::config::File::from(path.clone())
                    .format(::config::FileFormat::Toml)
                    .required(required),
            );
        }

        layers = layers.add_source(::config::Environment::with_prefix(ENV_PREFIX).try_parsing(true));

        if let Some(strict) = self.strict_abandon {
            layers = layers.set_override("strict_abandon", strict)?;
        }
        if let Some(force) = self.force_fallback {
            layers = layers.set_override("force_fallback", force)?;
        }

        let settings: Settings = layers
            .build()
            .with_context(|| match &path {
                Some(path) => format!("Failed to read configuration from {}", path.display()),
                None => "Failed to read configuration".to_string(),
            })?
            .try_deserialize()
            .context("Invalid unwind settings")?;

        tracing::debug!(?settings, source = ?path, "configuration loaded");

        Ok(Config {
            settings,
            source: path,
        })
    }
}

/// Make `settings` the default for threads that have not yet touched the
/// unwind state. Only the first call takes effect; returns whether it did.
pub fn install(settings: Settings) -> bool {
    let installed = INSTALLED.set(settings).is_ok();
    if !installed {
        tracing::warn!("unwind settings already installed; keeping the earlier ones");
    }
    installed
}

/// The process-wide default settings
pub fn current_settings() -> Settings {
    INSTALLED.get().cloned().unwrap_or_default()
}
