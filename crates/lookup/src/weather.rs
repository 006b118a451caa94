//! `get_weather`: current conditions for a city.

use crate::http::Transport;
use async_trait::async_trait;
use runtime::{ParamSpec, Tool, ToolArguments, ToolResult, ToolSpec};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

const OPENWEATHER_API_URL: &str = "https://api.openweathermap.org/data/2.5/weather";

/// Failures of a weather lookup. The display text is shown to the model.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum WeatherError {
    #[error("A city name is required.")]
    MissingCity,

    #[error(
        "Weather API key not configured. Please set the WEATHER_API_KEY environment variable."
    )]
    MissingKey,

    #[error("Invalid API key. Please check your WEATHER_API_KEY in the .env file.")]
    Unauthorized,

    #[error("City '{0}' not found. Please check the spelling and try again.")]
    NotFound(String),

    #[error("Failed to retrieve weather data. Status code: {0}")]
    Status(u16),

    #[error("Unable to connect to the weather service. Please check your internet connection.")]
    Connect,

    #[error("Request timed out while connecting to the weather service.")]
    Timeout,

    #[error("A request error occurred: {0}")]
    Request(String),

    #[error("Unexpected response format from the weather API.")]
    Malformed,
}

impl From<Transport> for WeatherError {
    fn from(transport: Transport) -> Self {
        match transport {
            Transport::Connect => Self::Connect,
            Transport::Timeout => Self::Timeout,
            Transport::Other(detail) => Self::Request(detail),
        }
    }
}

/// Current conditions for a city.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeatherReport {
    pub city: String,
    /// Degrees Celsius, one decimal.
    pub temperature: f64,
    pub description: String,
    /// Percent.
    pub humidity: u32,
    /// Metres per second.
    pub wind_speed: f64,
    pub country: String,
}

#[derive(Debug, Deserialize)]
struct ApiWeather {
    name: String,
    main: ApiMain,
    weather: Vec<ApiCondition>,
    wind: ApiWind,
    sys: ApiSys,
}

#[derive(Debug, Deserialize)]
struct ApiMain {
    temp: f64,
    humidity: u32,
}

#[derive(Debug, Deserialize)]
struct ApiCondition {
    description: String,
}

#[derive(Debug, Deserialize)]
struct ApiWind {
    speed: f64,
}

#[derive(Debug, Deserialize)]
struct ApiSys {
    country: String,
}

/// One decimal, ties to even.
fn round_one_decimal(value: f64) -> f64 {
    (value * 10.0).round_ties_even() / 10.0
}

impl TryFrom<ApiWeather> for WeatherReport {
    type Error = WeatherError;

    fn try_from(api: ApiWeather) -> Result<Self, Self::Error> {
        let description = api
            .weather
            .into_iter()
            .next()
            .ok_or(WeatherError::Malformed)?
            .description;
        Ok(Self {
            city: api.name,
            temperature: round_one_decimal(api.main.temp),
            description,
            humidity: api.main.humidity,
            wind_speed: api.wind.speed,
            country: api.sys.country,
        })
    }
}

/// Settings for [`WeatherTool`].
#[derive(Debug, Clone)]
pub struct WeatherConfig {
    /// OpenWeatherMap key; lookups fail with [`WeatherError::MissingKey`] without one.
    pub api_key: Option<String>,
    pub base_url: String,
    pub timeout: Duration,
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: OPENWEATHER_API_URL.to_string(),
            timeout: Duration::from_secs(10),
        }
    }
}

/// OpenWeatherMap-backed weather lookup.
pub struct WeatherTool {
    spec: ToolSpec,
    client: reqwest::Client,
    config: WeatherConfig,
}

impl WeatherTool {
    pub fn new(config: WeatherConfig) -> Self {
        Self {
            spec: ToolSpec {
                name: "get_weather".into(),
                description: "Fetches the current weather for a given city. Use this when the \
                              user asks about current weather conditions, temperature, humidity \
                              or wind for a specific city."
                    .into(),
                parameters: vec![ParamSpec::string(
                    "city",
                    "The name of the city, e.g. 'London', 'New York', 'Tokyo'.",
                )],
            },
            client: reqwest::Client::new(),
            config,
        }
    }

    /// Look up current conditions for `city`.
    pub async fn fetch(&self, city: Option<&str>) -> Result<WeatherReport, WeatherError> {
        let api_key = self
            .config
            .api_key
            .as_deref()
            .ok_or(WeatherError::MissingKey)?;
        let city = city.ok_or(WeatherError::MissingCity)?;

        debug!(city, "requesting weather");
        let response = self
            .client
            .get(&self.config.base_url)
            .query(&[("q", city), ("appid", api_key), ("units", "metric")])
            .timeout(self.config.timeout)
            .send()
            .await
            .map_err(|e| WeatherError::from(Transport::from(e)))?;

        match response.status().as_u16() {
            200 => {}
            401 => return Err(WeatherError::Unauthorized),
            404 => return Err(WeatherError::NotFound(city.to_string())),
            code => return Err(WeatherError::Status(code)),
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| WeatherError::from(Transport::from(e)))?;
        let api: ApiWeather =
            serde_json::from_slice(&body).map_err(|_| WeatherError::Malformed)?;
        api.try_into()
    }
}

#[async_trait]
impl Tool for WeatherTool {
    fn spec(&self) -> &ToolSpec {
        &self.spec
    }

    async fn invoke(&self, args: &ToolArguments) -> ToolResult {
        let city = args.text("city");
        match self.fetch(city.as_deref()).await {
            Ok(report) => ToolResult::success(&report),
            Err(err) => {
                warn!(city = ?city, error = %err, "weather lookup failed");
                ToolResult::error(err.to_string()).with("city", city.map_or(Value::Null, Value::from))
            }
        }
    }
}
