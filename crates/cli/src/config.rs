//! Configuration loading from toolchat.toml and the environment.

use lookup::{StockConfig, WeatherConfig};
use runtime::GeminiBackend;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// Config file picked up from the working directory when `--config` is not given.
pub const DEFAULT_CONFIG_FILE: &str = "toolchat.toml";

const DEFAULT_MODEL: &str = "gemini-2.5-flash";
const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful assistant. You can look up the current \
weather for a city and the latest stock price for a ticker symbol. Use these tools when the \
user asks for live data, and answer concisely.";

/// Top-level configuration.
#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub model: ModelConfig,

    #[serde(default)]
    pub weather: ServiceConfig,

    #[serde(default)]
    pub stock: ServiceConfig,
}

/// Model service configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Gemini model name.
    pub name: String,

    /// API root; the public endpoint when unset.
    pub base_url: Option<String>,

    pub system_prompt: String,

    pub max_output_tokens: u32,

    /// Per-request timeout. Unbounded when unset.
    pub timeout_secs: Option<u64>,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            name: DEFAULT_MODEL.to_string(),
            base_url: None,
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            max_output_tokens: 4096,
            timeout_secs: None,
        }
    }
}

/// Settings for one lookup service.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Endpoint override; the provider's public endpoint when unset.
    pub base_url: Option<String>,

    pub timeout_secs: u64,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            timeout_secs: 10,
        }
    }
}

/// API keys and overrides read from the environment.
#[derive(Debug, Default, Clone)]
pub struct Secrets {
    pub gemini_api_key: Option<String>,
    pub weather_api_key: Option<String>,
    pub alpha_vantage_api_key: Option<String>,
    /// `TOOLCHAT_MODEL`, overrides `model.name`.
    pub model: Option<String>,
}

impl Secrets {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable source. Blank values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        Self {
            gemini_api_key: get("GEMINI_API_KEY"),
            weather_api_key: get("WEATHER_API_KEY"),
            alpha_vantage_api_key: get("ALPHA_VANTAGE_API_KEY"),
            model: get("TOOLCHAT_MODEL"),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::parse(&content)
    }

    /// Parse configuration from TOML string.
    pub fn parse(toml: &str) -> Result<Self, ConfigError> {
        toml::from_str(toml).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Load `path` if given, else [`DEFAULT_CONFIG_FILE`] if present, else defaults.
    pub fn discover(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::load(path),
            None if Path::new(DEFAULT_CONFIG_FILE).exists() => Self::load(DEFAULT_CONFIG_FILE),
            None => Ok(Self::default()),
        }
    }

    /// The model name after environment overrides.
    pub fn model_name<'a>(&'a self, secrets: &'a Secrets) -> &'a str {
        secrets.model.as_deref().unwrap_or(&self.model.name)
    }

    /// Build the model backend. Requires `GEMINI_API_KEY`.
    pub fn backend(&self, secrets: &Secrets) -> Result<GeminiBackend, ConfigError> {
        let api_key = secrets
            .gemini_api_key
            .as_deref()
            .ok_or(ConfigError::MissingApiKey("GEMINI_API_KEY"))?;

        let mut builder = GeminiBackend::builder(api_key, self.model_name(secrets))
            .system(&self.model.system_prompt)
            .max_output_tokens(self.model.max_output_tokens);
        if let Some(base_url) = &self.model.base_url {
            builder = builder.base_url(base_url);
        }
        if let Some(secs) = self.model.timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        Ok(builder.build())
    }

    pub fn weather(&self, secrets: &Secrets) -> WeatherConfig {
        let defaults = WeatherConfig::default();
        WeatherConfig {
            api_key: secrets.weather_api_key.clone(),
            base_url: self.weather.base_url.clone().unwrap_or(defaults.base_url),
            timeout: Duration::from_secs(self.weather.timeout_secs),
        }
    }

    pub fn stock(&self, secrets: &Secrets) -> StockConfig {
        let defaults = StockConfig::default();
        StockConfig {
            api_key: secrets.alpha_vantage_api_key.clone(),
            base_url: self.stock.base_url.clone().unwrap_or(defaults.base_url),
            timeout: Duration::from_secs(self.stock.timeout_secs),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(String),

    #[error("{0} not found in the environment or .env file. Please add it.")]
    MissingApiKey(&'static str),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn secrets(vars: &[(&str, &str)]) -> Secrets {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Secrets::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn empty_file_uses_defaults() {
        let config = Config::parse("").unwrap();
        assert_eq!(config.model.name, "gemini-2.5-flash");
        assert_eq!(config.weather.timeout_secs, 10);
        assert!(config.stock.base_url.is_none());
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let config = Config::parse(
            r#"
            [model]
            name = "gemini-2.5-pro"
            timeout_secs = 30

            [stock]
            base_url = "http://localhost:9000/query"
            "#,
        )
        .unwrap();
        assert_eq!(config.model.name, "gemini-2.5-pro");
        assert_eq!(config.model.timeout_secs, Some(30));
        assert_eq!(config.model.max_output_tokens, 4096);
        assert_eq!(config.stock.timeout_secs, 10);

        let stock = config.stock(&Secrets::default());
        assert_eq!(stock.base_url, "http://localhost:9000/query");
        assert!(stock.api_key.is_none());
    }

    #[test]
    fn invalid_toml_is_parse_error() {
        let err = Config::parse("[model\nname = 1").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[weather]\ntimeout_secs = 3").unwrap();

        let config = Config::load(file.path()).unwrap();
        let weather = config.weather(&secrets(&[("WEATHER_API_KEY", "abc")]));
        assert_eq!(weather.timeout, Duration::from_secs(3));
        assert_eq!(weather.api_key.as_deref(), Some("abc"));
    }

    #[test]
    fn missing_explicit_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = Config::discover(Some(&dir.path().join("absent.toml"))).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }

    #[test]
    fn blank_secrets_are_unset() {
        let secrets = secrets(&[("GEMINI_API_KEY", "  "), ("TOOLCHAT_MODEL", "gemini-2.0")]);
        assert!(secrets.gemini_api_key.is_none());

        let config = Config::default();
        assert_eq!(config.model_name(&secrets), "gemini-2.0");
        assert!(matches!(
            config.backend(&secrets),
            Err(ConfigError::MissingApiKey("GEMINI_API_KEY"))
        ));
    }

    #[test]
    fn backend_uses_model_name() {
        let config = Config::default();
        let backend = config
            .backend(&secrets(&[("GEMINI_API_KEY", "key")]))
            .unwrap();
        assert_eq!(backend.model(), DEFAULT_MODEL);
    }
}
