//! External FX rate source, consulted when the vendor-reported rate table has no usable rate.

use std::{collections::HashMap, env, sync::Arc, time::Duration};

use fulfillment_engine::exchange::{FxRateSource, RateError};
use log::*;
use reqwest::Client;
use serde::Deserialize;

const DEFAULT_FX_URL: &str = "https://open.er-api.com";

#[derive(Clone)]
pub struct FxClient {
    base_url: String,
    client: Arc<Client>,
}

#[derive(Deserialize)]
struct RatesResponse {
    rates: HashMap<String, f64>,
}

impl FxClient {
    pub fn new(base_url: String) -> Result<Self, RateError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .map_err(|e| RateError::Source(e.to_string()))?;
        Ok(Self { base_url: base_url.trim_end_matches('/').to_string(), client: Arc::new(client) })
    }

    pub fn from_env_or_default() -> Result<Self, RateError> {
        let base_url = env::var("DGF_FX_URL").unwrap_or_else(|_| DEFAULT_FX_URL.to_string());
        Self::new(base_url)
    }
}

impl FxRateSource for FxClient {
    async fn rate_per_usd(&self, currency: &str) -> Result<f64, RateError> {
        let url = format!("{}/v6/latest/USD", self.base_url);
        debug!("💱️ Fetching USD rates from {url}");
        let response = self.client.get(&url).send().await.map_err(|e| RateError::Source(e.to_string()))?;
        if !response.status().is_success() {
            return Err(RateError::Source(format!("{url} answered {}", response.status())));
        }
        let rates = response.json::<RatesResponse>().await.map_err(|e| RateError::Source(e.to_string()))?;
        rates.rates.get(currency).copied().ok_or_else(|| RateError::MissingRate(currency.to_string()))
    }
}
