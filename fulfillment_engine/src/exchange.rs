//! Exchange rates and currency conversion.
//!
//! Rates are layered: vendor-reported rates are preloaded into the table, a missing or stale rate is fetched from an
//! external FX source, and a fixed floor table is the final fallback. Operator-set overrides take precedence over
//! everything. A missing rate for a non-USD currency is a typed error; callers must never silently assume 1:1.
//!
//! All rates are expressed as units of the currency per 1 USD. The USD rate is always exactly 1.0 and is not stored.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use chrono::{DateTime, Duration, Utc};
use dgf_common::USD_CURRENCY_CODE;
use log::*;
use thiserror::Error;
use vendor_tools::{VendorApi, VendorApiError};

pub const DEFAULT_RATE_TTL_SECS: i64 = 300;

/// Conservative floor rates for the currencies the bot routinely deals in. Only consulted when both the vendor
/// and the FX source fail to produce a usable rate.
pub const FLOOR_RATES: &[(&str, f64)] = &[
    ("RUB", 60.0),
    ("KZT", 380.0),
    ("UAH", 25.0),
    ("TRY", 8.0),
    ("EUR", 0.8),
    ("ARS", 90.0),
    ("BRL", 4.0),
    ("CNY", 6.0),
    ("INR", 70.0),
];

#[derive(Debug, Error)]
pub enum RateError {
    #[error("No exchange rate available for {0}")]
    MissingRate(String),
    #[error("FX source error: {0}")]
    Source(String),
    #[error("Vendor API error: {0}")]
    Vendor(#[from] VendorApiError),
}

/// An external FX API, queried when the vendor-reported table has no usable rate.
#[allow(async_fn_in_trait)]
pub trait FxRateSource: Clone + Send + Sync {
    /// Units of `currency` per 1 USD.
    async fn rate_per_usd(&self, currency: &str) -> Result<f64, RateError>;
}

struct RateEntry {
    per_usd: f64,
    fetched_at: DateTime<Utc>,
}

/// The shared rate cache. One lock, copy-on-read.
#[derive(Default)]
pub struct RateTable {
    rates: Mutex<HashMap<String, RateEntry>>,
    overrides: Mutex<HashMap<String, f64>>,
}

impl RateTable {
    /// Stores a fetched rate. Zero and negative rates are rejected: the vendor reports 0 for currencies it cannot
    /// quote, and such an entry must fall through to the next rate source instead of poisoning conversions.
    pub fn insert(&self, currency: &str, per_usd: f64) -> bool {
        if !(per_usd.is_finite() && per_usd > 0.0) {
            warn!("💱️ Rejecting unusable rate {per_usd} for {currency}");
            return false;
        }
        let mut rates = self.rates.lock().unwrap();
        rates.insert(currency.to_uppercase(), RateEntry { per_usd, fetched_at: Utc::now() });
        true
    }

    /// Returns `(rate, is_fresh)` for the currency, if any rate was ever stored.
    fn get(&self, currency: &str, now: DateTime<Utc>, ttl: Duration) -> Option<(f64, bool)> {
        let rates = self.rates.lock().unwrap();
        rates.get(currency).map(|e| (e.per_usd, now - e.fetched_at < ttl))
    }

    /// Operator-set override; wins over any fetched rate until cleared.
    pub fn set_override(&self, currency: &str, per_usd: Option<f64>) {
        let mut overrides = self.overrides.lock().unwrap();
        match per_usd {
            Some(rate) => {
                info!("💱️ Operator override: 1 USD = {rate} {currency}");
                overrides.insert(currency.to_uppercase(), rate);
            },
            None => {
                overrides.remove(&currency.to_uppercase());
            },
        }
    }

    fn override_for(&self, currency: &str) -> Option<f64> {
        self.overrides.lock().unwrap().get(currency).copied()
    }
}

#[derive(Clone)]
pub struct CurrencyConverter<F> {
    table: Arc<RateTable>,
    fx: F,
    ttl: Duration,
}

impl<F: FxRateSource> CurrencyConverter<F> {
    pub fn new(fx: F) -> Self {
        Self::with_ttl(fx, Duration::seconds(DEFAULT_RATE_TTL_SECS))
    }

    pub fn with_ttl(fx: F, ttl: Duration) -> Self {
        Self { table: Arc::new(RateTable::default()), fx, ttl }
    }

    pub fn table(&self) -> &RateTable {
        &self.table
    }

    /// Loads the vendor-reported rates into the table. Returns the number of usable rates stored; unusable entries
    /// (zero, negative, non-finite) are skipped and will fall through to the FX source on demand.
    pub async fn preload_from_vendor(&self, api: &VendorApi) -> Result<usize, RateError> {
        let raw = api.exchange_rates().await?;
        let stored = raw.rates.iter().filter(|(currency, rate)| self.table.insert(currency, **rate)).count();
        info!("💱️ Preloaded {stored}/{} vendor exchange rates", raw.rates.len());
        Ok(stored)
    }

    /// Resolves the rate for a currency through the fallback layers.
    pub async fn rate_per_usd(&self, currency: &str) -> Result<f64, RateError> {
        let currency = currency.to_uppercase();
        if currency == USD_CURRENCY_CODE {
            return Ok(1.0);
        }
        if let Some(rate) = self.table.override_for(&currency) {
            return Ok(rate);
        }
        let now = Utc::now();
        let cached = self.table.get(&currency, now, self.ttl);
        if let Some((rate, true)) = cached {
            return Ok(rate);
        }
        match self.fx.rate_per_usd(&currency).await {
            Ok(rate) if self.table.insert(&currency, rate) => return Ok(rate),
            Ok(rate) => warn!("💱️ FX source returned unusable rate {rate} for {currency}"),
            Err(e) => warn!("💱️ FX source failed for {currency}: {e}"),
        }
        if let Some((rate, false)) = cached {
            warn!("💱️ Using stale rate {rate} for {currency}");
            return Ok(rate);
        }
        if let Some((_, rate)) = FLOOR_RATES.iter().find(|(c, _)| *c == currency) {
            warn!("💱️ Using hardcoded floor rate {rate} for {currency}");
            return Ok(*rate);
        }
        Err(RateError::MissingRate(currency))
    }

    pub async fn to_usd(&self, amount: f64, currency: &str) -> Result<f64, RateError> {
        let rate = self.rate_per_usd(currency).await?;
        Ok(amount / rate)
    }

    pub async fn from_usd(&self, amount: f64, currency: &str) -> Result<f64, RateError> {
        let rate = self.rate_per_usd(currency).await?;
        Ok(amount * rate)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[derive(Clone)]
    struct StaticFx(Vec<(&'static str, f64)>);

    impl FxRateSource for StaticFx {
        async fn rate_per_usd(&self, currency: &str) -> Result<f64, RateError> {
            self.0
                .iter()
                .find(|(c, _)| *c == currency)
                .map(|(_, r)| *r)
                .ok_or_else(|| RateError::Source(format!("no rate for {currency}")))
        }
    }

    #[tokio::test]
    async fn usd_is_always_exactly_one() {
        let converter = CurrencyConverter::new(StaticFx(vec![]));
        assert_eq!(converter.rate_per_usd("USD").await.unwrap(), 1.0);
        assert_eq!(converter.rate_per_usd("usd").await.unwrap(), 1.0);
        assert_eq!(converter.to_usd(12.5, "USD").await.unwrap(), 12.5);
    }

    #[tokio::test]
    async fn zero_vendor_rate_falls_through_to_fx_source() {
        let converter = CurrencyConverter::new(StaticFx(vec![("RUB", 92.5)]));
        // A vendor-reported RUB=0 must not be stored.
        assert!(!converter.table().insert("RUB", 0.0));
        let rate = converter.rate_per_usd("RUB").await.unwrap();
        assert_eq!(rate, 92.5);
    }

    #[tokio::test]
    async fn floor_rate_is_the_last_resort() {
        let converter = CurrencyConverter::new(StaticFx(vec![]));
        let rate = converter.rate_per_usd("KZT").await.unwrap();
        assert_eq!(rate, 380.0);
    }

    #[tokio::test]
    async fn missing_rate_is_a_typed_error_not_parity() {
        let converter = CurrencyConverter::new(StaticFx(vec![]));
        let err = converter.from_usd(10.0, "XYZ").await.unwrap_err();
        assert!(matches!(err, RateError::MissingRate(c) if c == "XYZ"));
    }

    #[tokio::test]
    async fn override_wins_over_fetched_rates() {
        let converter = CurrencyConverter::new(StaticFx(vec![("RUB", 92.5)]));
        converter.table().set_override("RUB", Some(100.0));
        assert_eq!(converter.rate_per_usd("RUB").await.unwrap(), 100.0);
        assert_eq!(converter.from_usd(2.0, "RUB").await.unwrap(), 200.0);
        converter.table().set_override("RUB", None);
        assert_eq!(converter.rate_per_usd("RUB").await.unwrap(), 92.5);
    }

    #[tokio::test]
    async fn conversions_are_reciprocal() {
        let converter = CurrencyConverter::new(StaticFx(vec![("UAH", 40.0)]));
        assert_eq!(converter.from_usd(2.5, "UAH").await.unwrap(), 100.0);
        assert_eq!(converter.to_usd(100.0, "UAH").await.unwrap(), 2.5);
    }
}
