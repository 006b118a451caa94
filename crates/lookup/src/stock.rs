//! `get_stock_price`: latest quote for a ticker symbol.

use crate::http::Transport;
use async_trait::async_trait;
use runtime::{ParamSpec, Tool, ToolArguments, ToolResult, ToolSpec};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

const ALPHA_VANTAGE_API_URL: &str = "https://www.alphavantage.co/query";

/// Failures of a stock lookup. The display text is shown to the model.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum StockError {
    #[error("A stock symbol is required.")]
    MissingSymbol,

    #[error(
        "Alpha Vantage API key not configured. Please set the ALPHA_VANTAGE_API_KEY environment variable."
    )]
    MissingKey,

    #[error("Failed to retrieve stock data. Status code: {0}")]
    Status(u16),

    #[error("Invalid stock symbol '{0}'. Please check the symbol and try again.")]
    InvalidSymbol(String),

    #[error("API rate limit exceeded. Please try again later.")]
    RateLimited,

    #[error("No data available for stock symbol '{0}'.")]
    NoData(String),

    #[error("Unable to connect to the stock service. Please check your internet connection.")]
    Connect,

    #[error("Request timed out while connecting to the stock service.")]
    Timeout,

    #[error("A request error occurred: {0}")]
    Request(String),

    #[error("Unexpected response format from the stock API.")]
    Malformed,
}

impl From<Transport> for StockError {
    fn from(transport: Transport) -> Self {
        match transport {
            Transport::Connect => Self::Connect,
            Transport::Timeout => Self::Timeout,
            Transport::Other(detail) => Self::Request(detail),
        }
    }
}

/// Latest price for a symbol.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StockQuote {
    pub symbol: String,
    pub price: f64,
    pub currency: String,
    /// Latest trading day, as reported by the provider.
    pub last_updated: String,
}

#[derive(Debug, Deserialize)]
struct ApiGlobalQuote {
    #[serde(rename = "01. symbol")]
    symbol: String,
    #[serde(rename = "05. price")]
    price: String,
    #[serde(rename = "07. latest trading day")]
    latest_trading_day: String,
}

/// Interpret an Alpha Vantage `GLOBAL_QUOTE` body.
///
/// The provider answers 200 for most failures and signals them with
/// well-known top-level keys.
fn parse_quote(symbol: &str, body: &[u8]) -> Result<StockQuote, StockError> {
    let data: Map<String, Value> =
        serde_json::from_slice(body).map_err(|_| StockError::Malformed)?;

    if data.contains_key("Error Message") {
        return Err(StockError::InvalidSymbol(symbol.to_string()));
    }
    if data.contains_key("Note") || data.contains_key("Information") {
        return Err(StockError::RateLimited);
    }

    let quote = match data.get("Global Quote") {
        Some(Value::Object(quote)) if !quote.is_empty() => quote.clone(),
        _ => return Err(StockError::NoData(symbol.to_string())),
    };
    let quote: ApiGlobalQuote =
        serde_json::from_value(Value::Object(quote)).map_err(|_| StockError::Malformed)?;
    let price = quote
        .price
        .trim()
        .parse::<f64>()
        .map_err(|_| StockError::Malformed)?;

    Ok(StockQuote {
        symbol: quote.symbol,
        price,
        currency: "USD".to_string(),
        last_updated: quote.latest_trading_day,
    })
}

/// Settings for [`StockTool`].
#[derive(Debug, Clone)]
pub struct StockConfig {
    /// Alpha Vantage key; lookups fail with [`StockError::MissingKey`] without one.
    pub api_key: Option<String>,
    pub base_url: String,
    pub timeout: Duration,
}

impl Default for StockConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: ALPHA_VANTAGE_API_URL.to_string(),
            timeout: Duration::from_secs(10),
        }
    }
}

/// Alpha Vantage-backed stock quote lookup.
pub struct StockTool {
    spec: ToolSpec,
    client: reqwest::Client,
    config: StockConfig,
}

impl StockTool {
    pub fn new(config: StockConfig) -> Self {
        Self {
            spec: ToolSpec {
                name: "get_stock_price".into(),
                description: "Fetches the current stock price for a given symbol. Use this when \
                              the user asks about current stock prices or market data for a \
                              specific company."
                    .into(),
                parameters: vec![ParamSpec::string(
                    "symbol",
                    "The stock ticker symbol, e.g. 'AAPL', 'GOOGL', 'MSFT'.",
                )],
            },
            client: reqwest::Client::new(),
            config,
        }
    }

    /// Look up the latest quote for `symbol`.
    pub async fn fetch(&self, symbol: Option<&str>) -> Result<StockQuote, StockError> {
        let api_key = self
            .config
            .api_key
            .as_deref()
            .ok_or(StockError::MissingKey)?;
        let symbol = symbol.ok_or(StockError::MissingSymbol)?;

        debug!(symbol, "requesting stock quote");
        let response = self
            .client
            .get(&self.config.base_url)
            .query(&[
                ("function", "GLOBAL_QUOTE"),
                ("symbol", symbol),
                ("apikey", api_key),
            ])
            .timeout(self.config.timeout)
            .send()
            .await
            .map_err(|e| StockError::from(Transport::from(e)))?;

        let status = response.status().as_u16();
        if status != 200 {
            return Err(StockError::Status(status));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| StockError::from(Transport::from(e)))?;
        parse_quote(symbol, &body)
    }
}

#[async_trait]
impl Tool for StockTool {
    fn spec(&self) -> &ToolSpec {
        &self.spec
    }

    async fn invoke(&self, args: &ToolArguments) -> ToolResult {
        let symbol = args.text("symbol");
        match self.fetch(symbol.as_deref()).await {
            Ok(quote) => ToolResult::success(&quote),
            Err(err) => {
                warn!(symbol = ?symbol, error = %err, "stock lookup failed");
                ToolResult::error(err.to_string())
                    .with("symbol", symbol.map_or(Value::Null, Value::from))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parse(body: Value) -> Result<StockQuote, StockError> {
        parse_quote("AAPL", body.to_string().as_bytes())
    }

    #[test]
    fn parses_global_quote() {
        let quote = parse(json!({"Global Quote": {
            "01. symbol": "AAPL",
            "02. open": "187.1500",
            "05. price": "189.9800",
            "07. latest trading day": "2024-05-17"
        }}))
        .unwrap();
        assert_eq!(quote.symbol, "AAPL");
        assert_eq!(quote.price, 189.98);
        assert_eq!(quote.currency, "USD");
        assert_eq!(quote.last_updated, "2024-05-17");
    }

    #[test]
    fn provider_signals() {
        assert_eq!(
            parse(json!({"Error Message": "Invalid API call."})),
            Err(StockError::InvalidSymbol("AAPL".into()))
        );
        assert_eq!(
            parse(json!({"Note": "Thank you for using Alpha Vantage!"})),
            Err(StockError::RateLimited)
        );
        assert_eq!(
            parse(json!({"Information": "Our standard API rate limit is 25 requests per day."})),
            Err(StockError::RateLimited)
        );
        assert_eq!(
            parse(json!({"Global Quote": {}})),
            Err(StockError::NoData("AAPL".into()))
        );
        assert_eq!(parse(json!({})), Err(StockError::NoData("AAPL".into())));
    }

    #[test]
    fn bad_price_is_malformed() {
        let result = parse(json!({"Global Quote": {
            "01. symbol": "AAPL",
            "05. price": "n/a",
            "07. latest trading day": "2024-05-17"
        }}));
        assert_eq!(result, Err(StockError::Malformed));
        assert_eq!(parse_quote("AAPL", b"<html>"), Err(StockError::Malformed));
    }

    #[tokio::test]
    async fn missing_key_keeps_symbol_in_result() {
        let tool = StockTool::new(StockConfig::default());
        let raw = json!({"symbol": "MSFT"});
        let args = ToolArguments::extract(&tool.spec().parameters, raw.as_object().unwrap());
        let result = tool.invoke(&args).await;
        assert_eq!(
            result.into_value(),
            json!({
                "error": "Alpha Vantage API key not configured. Please set the ALPHA_VANTAGE_API_KEY environment variable.",
                "symbol": "MSFT"
            })
        );
    }
}
