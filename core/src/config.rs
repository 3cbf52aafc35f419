//! Configuration
//!
//! Layered with the `config` crate, later layers winning:
//! 1. built-in defaults
//! 2. a TOML file: the explicit path, else `EDSCRIPT_CONFIG_PATH`, else
//!    `edscript.toml` in the working directory when present
//! 3. `EDSCRIPT__SECTION__KEY` environment variables
//!    (`EDSCRIPT__LOGGING__FILTER=debug`, `EDSCRIPT__SCRIPTS__ROOTS=a,b`)

use std::env;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use crate::modules::HOOKS_PATH;

pub const CONFIG_PATH_ENV: &str = "EDSCRIPT_CONFIG_PATH";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    pub scripts: ScriptsConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScriptsConfig {
    /// Directories searched for modules
    pub roots: Vec<PathBuf>,
    /// File extension of modules, without the dot
    pub extension: String,
    /// Module path of the lifecycle hooks module
    pub hooks_path: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// `tracing_subscriber::EnvFilter` directives; `RUST_LOG` wins when set
    pub filter: String,
}

impl Config {
    /// Load from the default file search and the environment
    pub fn load() -> Result<Self> {
        Self::builder().build()
    }

    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// The effective configuration as TOML
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize configuration")
    }

    fn validate(&self) -> Result<()> {
        if self.scripts.extension.is_empty() || self.scripts.extension.starts_with('.') {
            bail!(
                "scripts.extension must be a bare extension like 'editor_script', got '{}'",
                self.scripts.extension
            );
        }
        if !self.scripts.hooks_path.starts_with('/') {
            bail!(
                "scripts.hooks_path must start with '/', got '{}'",
                self.scripts.hooks_path
            );
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct ConfigBuilder {
    config_path: Option<PathBuf>,
    roots: Option<Vec<PathBuf>>,
}

impl ConfigBuilder {
    /// Config file to read instead of the default search
    pub fn config_path(mut self, path: Option<PathBuf>) -> Self {
        self.config_path = path;
        self
    }

    /// Script roots overriding every other layer
    pub fn roots(mut self, roots: Vec<PathBuf>) -> Self {
        if !roots.is_empty() {
            self.roots = Some(roots);
        }
        self
    }

    pub fn build(self) -> Result<Config> {
        let mut builder = config::Config::builder()
            .set_default("scripts.roots", vec!["."])?
            .set_default("scripts.extension", "editor_script")?
            .set_default("scripts.hooks_path", HOOKS_PATH)?
            .set_default("logging.filter", "info")?;

        let path = self
            .config_path
            .or_else(|| env::var(CONFIG_PATH_ENV).ok().map(PathBuf::from));
        builder = match path {
            Some(path) => builder.add_source(config::File::from(path).required(true)),
            None => builder.add_source(config::File::with_name("edscript").required(false)),
        };

        builder = builder.add_source(
            config::Environment::with_prefix("EDSCRIPT")
                .prefix_separator("__")
                .separator("__")
                .list_separator(",")
                .with_list_parse_key("scripts.roots")
                .try_parsing(true),
        );

        let mut config: Config = builder
            .build()
            .context("Failed to read configuration")?
            .try_deserialize()
            .context("Invalid configuration")?;

        if let Some(roots) = self.roots {
            config.scripts.roots = roots;
        }
        config.validate()?;
        Ok(config)
    }
}
