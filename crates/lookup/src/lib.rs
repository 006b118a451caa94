//! Live data lookups the model can call.
//!
//! - [`WeatherTool`] (`get_weather`): current conditions from OpenWeatherMap.
//! - [`StockTool`] (`get_stock_price`): latest quote from Alpha Vantage.
//!
//! Both report every failure, upstream or local, as a
//! [`ToolResult`](runtime::ToolResult) error naming the looked-up subject.

mod http;
mod stock;
mod weather;

pub use stock::{StockConfig, StockError, StockQuote, StockTool};
pub use weather::{WeatherConfig, WeatherError, WeatherReport, WeatherTool};

use runtime::ToolRegistry;

/// The registry of built-in tools, in the order they are offered to the model.
pub fn registry(weather: WeatherConfig, stock: StockConfig) -> ToolRegistry {
    ToolRegistry::new()
        .with_tool(WeatherTool::new(weather))
        .with_tool(StockTool::new(stock))
}
