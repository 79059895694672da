//! HTTP quote feed.
//!
//! Fetches the last traded price from a JSON endpoint:
//!
//! ```text
//! GET {url_template with {symbol} replaced}
//! → {"price": "2895.50"}        (also accepted: "ltp", "last_price")
//! ```
//!
//! Any transport failure, non-2xx status, unparseable body or non-positive
//! price is reported as `PriceUnavailable`; the caller decides whether to
//! retry.

use async_trait::async_trait;
use reqwest::Client;
use rust_decimal::Decimal;
use serde::Deserialize;
use tokio::time::timeout;
use tracing::debug;

use paperdesk_domain::{Price, Symbol};
use paperdesk_exec::{ExecError, PriceSource};

use crate::config::PriceFeedConfig;

#[derive(Debug, Deserialize)]
struct QuoteResponse {
    #[serde(alias = "ltp", alias = "last_price")]
    price: Decimal,
}

/// Price source backed by an HTTP quote endpoint.
pub struct HttpPriceSource {
    client: Client,
    config: PriceFeedConfig,
}

impl HttpPriceSource {
    pub fn new(config: PriceFeedConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    fn url_for(&self, symbol: &Symbol) -> String {
        self.config.url_template.replace("{symbol}", symbol.as_str())
    }
}

#[async_trait]
impl PriceSource for HttpPriceSource {
    async fn get_price(&self, symbol: &Symbol) -> Result<Price, ExecError> {
        let url = self.url_for(symbol);

        let response = timeout(self.config.timeout, self.client.get(&url).send())
            .await
            .map_err(|_| ExecError::price_unavailable(symbol, "quote request timed out"))?
            .map_err(|e| ExecError::price_unavailable(symbol, format!("quote request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ExecError::price_unavailable(symbol, format!("quote endpoint returned HTTP {}", status)));
        }

        let quote: QuoteResponse = response
            .json()
            .await
            .map_err(|e| ExecError::price_unavailable(symbol, format!("unreadable quote: {}", e)))?;

        debug!(symbol = %symbol, price = %quote.price, "Quote received");
        Price::new(quote.price).map_err(|e| ExecError::price_unavailable(symbol, e.to_string()))
    }
}

// =============================================================================
// Tests
// =============================================================================
