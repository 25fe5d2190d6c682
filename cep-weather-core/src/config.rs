use anyhow::{Context, Result, anyhow, bail};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use crate::{
    orchestrator::StageBudgets,
    provider::{viacep, weatherapi},
};

/// Environment variable overriding [`UpstreamConfig::location_url`].
pub const ENV_LOCATION_URL: &str = "URLCEP";
/// Environment variable overriding [`UpstreamConfig::weather_url`].
pub const ENV_WEATHER_URL: &str = "URLWEATHER";
/// Environment variable overriding [`UpstreamConfig::weather_api_key`].
pub const ENV_WEATHER_API_KEY: &str = "APIKEYWEATHER";
/// Environment variable overriding [`ServerConfig::port`].
pub const ENV_PORT: &str = "PORT";

/// Where the two upstream services live.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Postal-code service URL with a `{cep}` placeholder.
    pub location_url: String,
    /// Weather service URL ending right where the API key goes.
    pub weather_url: String,
    pub weather_api_key: String,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            location_url: viacep::DEFAULT_URL_TEMPLATE.to_string(),
            weather_url: weatherapi::DEFAULT_BASE_URL.to_string(),
            weather_api_key: String::new(),
        }
    }
}

/// Stage budgets in milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutConfig {
    pub location_ms: u64,
    pub weather_ms: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { location_ms: 1_000, weather_ms: 3_000 }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { port: 8080 }
    }
}

/// Top-level configuration stored on disk.
///
/// Example TOML:
/// ```toml
/// [upstream]
/// location_url = "https://viacep.com.br/ws/{cep}/json/"
/// weather_url = "http://api.weatherapi.com/v1/current.json?key="
/// weather_api_key = "..."
///
/// [timeouts]
/// location_ms = 1000
/// weather_ms = 3000
///
/// [server]
/// port = 8080
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub upstream: UpstreamConfig,
    pub timeouts: TimeoutConfig,
    pub server: ServerConfig,
}

impl Config {
    /// Load config from the platform config directory, or defaults if it doesn't exist yet.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_file_path()?)
    }

    /// Load config from `path`, or defaults if the file doesn't exist.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let cfg: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(cfg)
    }

    /// Save config to the platform config directory.
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_file_path()?)
    }

    /// Save config to `path`, creating parent directories as needed.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let toml =
            toml::to_string_pretty(self).context("Failed to serialize configuration to TOML")?;

        fs::write(path, toml)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Path to the config file.
    pub fn config_file_path() -> Result<PathBuf> {
        let dirs = ProjectDirs::from("dev", "cep-weather", "cep-weather")
            .ok_or_else(|| anyhow!("Could not determine platform config directory"))?;

        Ok(dirs.config_dir().join("config.toml"))
    }

    /// Apply overrides from the process environment.
    pub fn with_env_overrides(mut self) -> Result<Self> {
        self.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(self)
    }

    /// Apply overrides from `lookup`, keyed by the `ENV_*` variable names.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(url) = lookup(ENV_LOCATION_URL) {
            self.upstream.location_url = url;
        }
        if let Some(url) = lookup(ENV_WEATHER_URL) {
            self.upstream.weather_url = url;
        }
        if let Some(key) = lookup(ENV_WEATHER_API_KEY) {
            self.upstream.weather_api_key = key;
        }
        if let Some(port) = lookup(ENV_PORT) {
            self.server.port = port
                .trim()
                .parse()
                .with_context(|| format!("Invalid {ENV_PORT} value: {port}"))?;
        }
        Ok(())
    }

    /// Every setting must be filled in before the orchestrator is built.
    pub fn validate(&self) -> Result<()> {
        let required = [
            ("upstream.location_url", ENV_LOCATION_URL, &self.upstream.location_url),
            ("upstream.weather_url", ENV_WEATHER_URL, &self.upstream.weather_url),
            ("upstream.weather_api_key", ENV_WEATHER_API_KEY, &self.upstream.weather_api_key),
        ];
        for (key, env, value) in required {
            if value.trim().is_empty() {
                bail!(
                    "Configuration value `{key}` is not set.\n\
                     Hint: set it in the config file, export {env}, or run `cep-weather configure`."
                );
            }
        }

        if !self.upstream.location_url.contains(viacep::CEP_PLACEHOLDER) {
            bail!(
                "upstream.location_url must contain the {} placeholder",
                viacep::CEP_PLACEHOLDER
            );
        }

        if self.timeouts.location_ms == 0 || self.timeouts.weather_ms == 0 {
            bail!("Stage timeouts must be greater than zero");
        }

        Ok(())
    }

    pub fn set_weather_api_key(&mut self, api_key: String) {
        self.upstream.weather_api_key = api_key;
    }

    pub fn is_weather_configured(&self) -> bool {
        !self.upstream.weather_api_key.trim().is_empty()
    }

    pub fn budgets(&self) -> StageBudgets {
        StageBudgets {
            location: Duration::from_millis(self.timeouts.location_ms),
            weather: Duration::from_millis(self.timeouts.weather_ms),
        }
    }
}
