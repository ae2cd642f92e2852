//! The pricing engine: vendor base price → markup → settlement currency.

use dgf_common::{Money, MoneyConversionError, USD_CURRENCY_CODE};
use log::*;
use thiserror::Error;

use crate::{
    catalog::{CatalogApi, CatalogError},
    data_types::{Edition, LotConfig, LotKind},
    exchange::{CurrencyConverter, FxRateSource, RateError},
    lots::{resolve_lot_game, ResolvedLotGame},
    resolver,
};

/// Regions tried, in order, when the operator-chosen region has no price.
pub const DEFAULT_ALTERNATE_REGIONS: &[&str] = &["RU", "KZ", "UA", "TR", "AR", "US"];

/// Local settlement currency per Steam region, for the mis-tag heuristic.
const REGION_CURRENCIES: &[(&str, &str)] = &[
    ("RU", "RUB"),
    ("KZ", "KZT"),
    ("UA", "UAH"),
    ("TR", "TRY"),
    ("AR", "ARS"),
    ("BR", "BRL"),
    ("IN", "INR"),
    ("CN", "CNY"),
];

#[derive(Debug, Clone)]
pub struct PricingConfig {
    /// Operator markup, in percent of the USD base price.
    pub markup_percent: f64,
    /// The currency marketplace listings settle in.
    pub settlement_currency: String,
    /// Vendor prices below this value, tagged USD in a known non-USD region, are reinterpreted as already-local
    /// currency. This mirrors observed vendor behavior but is a heuristic, not a law: set to `None` to disable.
    pub mistag_threshold: Option<f64>,
    pub alternate_regions: Vec<String>,
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            markup_percent: 0.0,
            settlement_currency: "RUB".to_string(),
            mistag_threshold: Some(0.1),
            alternate_regions: DEFAULT_ALTERNATE_REGIONS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

#[derive(Debug, Error)]
pub enum PricingError {
    #[error("No catalog game matched '{0}'")]
    GameNotFound(String),
    #[error("No edition available for lot '{0}'")]
    EditionNotFound(String),
    #[error("No top-up position matched '{0}'")]
    PositionNotFound(String),
    #[error("No price for region {region} or any alternate region")]
    PriceNotFound { region: String },
    #[error("Conversion error: {0}")]
    Rate(#[from] RateError),
    #[error("Conversion error: {0}")]
    Amount(#[from] MoneyConversionError),
    #[error(transparent)]
    Catalog(#[from] CatalogError),
}

impl PricingError {
    /// True for "this lot cannot be priced" outcomes, as opposed to conversion/transport failures.
    pub fn is_resolution(&self) -> bool {
        matches!(
            self,
            PricingError::GameNotFound(_)
                | PricingError::EditionNotFound(_)
                | PricingError::PositionNotFound(_)
                | PricingError::PriceNotFound { .. }
        )
    }
}

/// The result of pricing one lot. Besides the final price, carries the resolved catalog identifiers so that callers
/// (sessions, sync) don't resolve twice.
#[derive(Debug, Clone, PartialEq)]
pub struct Quote {
    /// Final price in the settlement currency, rounded to 2 decimals.
    pub price: Money,
    /// Set when the price came from an alternate region; it may not reflect the operator-chosen region.
    pub region_fallback: Option<String>,
    pub game_id: u32,
    pub package_id: Option<String>,
    pub position_id: Option<u32>,
}

/// Anything that can price a configured lot. The seam exists so the sync scheduler can be exercised without a live
/// catalog behind it.
#[allow(async_fn_in_trait)]
pub trait PriceSource: Clone {
    async fn preload(&self) -> Result<(), PricingError>;
    async fn price_for(&self, lot: &LotConfig) -> Result<Quote, PricingError>;
}

#[derive(Clone)]
pub struct PricingEngine<F> {
    catalog: CatalogApi,
    converter: CurrencyConverter<F>,
    config: PricingConfig,
}

impl<F: FxRateSource> PricingEngine<F> {
    pub fn new(catalog: CatalogApi, converter: CurrencyConverter<F>, config: PricingConfig) -> Self {
        Self { catalog, converter, config }
    }

    pub fn config(&self) -> &PricingConfig {
        &self.config
    }

    /// Warms the catalog and rate caches. Called once per sync run, not once per lot.
    pub async fn warm_caches(&self) -> Result<(), PricingError> {
        self.catalog.preload().await?;
        self.converter.preload_from_vendor(self.catalog.vendor()).await?;
        Ok(())
    }

    /// Prices a configured lot: resolve the catalog item, find the base price, apply markup, convert to the
    /// settlement currency. Deterministic for fixed catalog, rate and markup inputs.
    pub async fn quote(&self, lot: &LotConfig) -> Result<Quote, PricingError> {
        let game = resolve_lot_game(lot, &self.catalog)
            .await?
            .ok_or_else(|| PricingError::GameNotFound(lot.game_name.clone()))?;
        match (game, &lot.kind) {
            (ResolvedLotGame::Steam(game), LotKind::SteamGift { region }) => {
                let edition = resolver::choose_edition(&lot.lot_name, &game.editions, region)
                    .ok_or_else(|| PricingError::EditionNotFound(lot.lot_name.clone()))?;
                self.quote_edition(lot, game.id, edition, region).await
            },
            (ResolvedLotGame::Mobile(game), LotKind::MobileRefill { amount_label }) => {
                let position = resolver::find_by_name(amount_label, &game.positions, |p| &p.label, |p| Some(p.price))
                    .ok_or_else(|| PricingError::PositionNotFound(amount_label.clone()))?;
                let price = self.finalize_in(position.price, &position.currency).await?;
                Ok(Quote {
                    price,
                    region_fallback: None,
                    game_id: game.id,
                    package_id: None,
                    position_id: Some(position.id),
                })
            },
            // A steam lot resolving to a mobile game (or vice versa) means the catalogs disagree with the config.
            _ => Err(PricingError::GameNotFound(lot.game_name.clone())),
        }
    }

    pub(crate) async fn quote_edition(
        &self,
        lot: &LotConfig,
        game_id: u32,
        edition: &Edition,
        region: &str,
    ) -> Result<Quote, PricingError> {
        let (used_region, base) = pick_region_price(edition, region, &self.config.alternate_regions)
            .ok_or_else(|| PricingError::PriceNotFound { region: region.to_string() })?;
        if used_region != region {
            warn!("💲️ '{}': no price for region {region}, using {used_region} instead", lot.lot_name);
        }
        let currency = self.effective_currency(&edition.currency, &used_region, base);
        let price = self.finalize_in(base, &currency).await?;
        let region_fallback = (used_region != region).then_some(used_region);
        Ok(Quote { price, region_fallback, game_id, package_id: Some(edition.package_id.clone()), position_id: None })
    }

    /// Applies the mis-tag heuristic: a suspiciously low "USD" price in a known non-USD region is reinterpreted as
    /// the region's local currency.
    fn effective_currency(&self, tagged: &str, region: &str, price: Money) -> String {
        let threshold = match self.config.mistag_threshold {
            Some(t) => t,
            None => return tagged.to_string(),
        };
        if tagged != USD_CURRENCY_CODE || price.to_f64() >= threshold {
            return tagged.to_string();
        }
        match REGION_CURRENCIES.iter().find(|(r, _)| *r == region) {
            Some((_, local)) => {
                debug!("💲️ Price {price} tagged USD in region {region} looks mis-tagged; treating as {local}");
                local.to_string()
            },
            None => tagged.to_string(),
        }
    }

    /// base (vendor currency) → USD → markup → settlement currency, rounded to cents.
    async fn finalize_in(&self, base: Money, currency: &str) -> Result<Money, PricingError> {
        let base_usd = self.converter.to_usd(base.to_f64(), currency).await?;
        let marked_up = base_usd * (1.0 + self.config.markup_percent / 100.0);
        let settled = self.converter.from_usd(marked_up, &self.config.settlement_currency).await?;
        Ok(Money::try_from(settled)?)
    }
}

impl<F: FxRateSource> PriceSource for PricingEngine<F> {
    async fn preload(&self) -> Result<(), PricingError> {
        self.warm_caches().await
    }

    async fn price_for(&self, lot: &LotConfig) -> Result<Quote, PricingError> {
        self.quote(lot).await
    }
}

/// The base price for the requested region, falling back through the alternate-region list.
pub fn pick_region_price(edition: &Edition, region: &str, alternates: &[String]) -> Option<(String, Money)> {
    if let Some(price) = edition.prices.get(region) {
        return Some((region.to_string(), *price));
    }
    alternates
        .iter()
        .filter(|alt| alt.as_str() != region)
        .find_map(|alt| edition.prices.get(alt.as_str()).map(|p| (alt.clone(), *p)))
}

#[cfg(test)]
mod test {
    use std::collections::HashMap;

    use vendor_tools::{VendorApi, VendorConfig};

    use super::*;
    use crate::exchange::FxRateSource;

    #[derive(Clone)]
    struct StaticFx;

    impl FxRateSource for StaticFx {
        async fn rate_per_usd(&self, currency: &str) -> Result<f64, RateError> {
            match currency {
                "RUB" => Ok(100.0),
                "KZT" => Ok(500.0),
                other => Err(RateError::Source(format!("no rate for {other}"))),
            }
        }
    }

    fn engine(markup: f64) -> PricingEngine<StaticFx> {
        let api = VendorApi::new(VendorConfig::default()).unwrap();
        let catalog = CatalogApi::new(api);
        let converter = CurrencyConverter::new(StaticFx);
        let config = PricingConfig { markup_percent: markup, ..PricingConfig::default() };
        PricingEngine::new(catalog, converter, config)
    }

    fn edition(label: &str, prices: &[(&str, i64)]) -> Edition {
        Edition {
            package_id: format!("pkg-{label}"),
            label: label.to_string(),
            currency: "USD".to_string(),
            prices: prices.iter().map(|(r, p)| (r.to_string(), Money::from_units(*p))).collect::<HashMap<_, _>>(),
        }
    }

    fn steam_lot(lot_name: &str, region: &str) -> LotConfig {
        LotConfig {
            lot_name: lot_name.to_string(),
            game_name: lot_name.to_string(),
            kind: LotKind::SteamGift { region: region.to_string() },
        }
    }

    #[tokio::test]
    async fn markup_and_settlement_conversion() {
        let engine = engine(25.0);
        let lot = steam_lot("Elden Ring (KZ)", "KZ");
        let edition = edition("Standard", &[("KZ", 40)]);
        let quote = engine.quote_edition(&lot, 1, &edition, "KZ").await.unwrap();
        // 40 USD × 1.25 = 50 USD → 5000 RUB.
        assert_eq!(quote.price, Money::from_units(5000));
        assert_eq!(quote.region_fallback, None);
        assert_eq!(quote.package_id.as_deref(), Some("pkg-Standard"));
    }

    #[tokio::test]
    async fn pricing_is_deterministic_for_fixed_inputs() {
        let engine = engine(30.0);
        let lot = steam_lot("Cyberpunk 2077 (RU)", "RU");
        let edition = edition("Standard", &[("RU", 59)]);
        let first = engine.quote_edition(&lot, 2, &edition, "RU").await.unwrap();
        let second = engine.quote_edition(&lot, 2, &edition, "RU").await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn alternate_region_sets_the_fallback_flag() {
        let engine = engine(0.0);
        let lot = steam_lot("Elden Ring (UA)", "UA");
        let edition = edition("Standard", &[("KZ", 10)]);
        let quote = engine.quote_edition(&lot, 3, &edition, "UA").await.unwrap();
        assert_eq!(quote.region_fallback.as_deref(), Some("KZ"));
        assert_eq!(quote.price, Money::from_units(1000));
    }

    #[tokio::test]
    async fn region_without_any_price_is_a_typed_error() {
        let engine = engine(0.0);
        let lot = steam_lot("Elden Ring (UA)", "UA");
        let edition = Edition {
            package_id: "p".to_string(),
            label: "Standard".to_string(),
            currency: "USD".to_string(),
            prices: HashMap::from([("BR".to_string(), Money::from_units(10))]),
        };
        let err = engine.quote_edition(&lot, 4, &edition, "UA").await.unwrap_err();
        assert!(matches!(err, PricingError::PriceNotFound { region } if region == "UA"));
    }

    #[tokio::test]
    async fn suspiciously_low_usd_price_is_reinterpreted_as_local() {
        let engine = engine(0.0);
        let lot = steam_lot("Cheap Game (KZ)", "KZ");
        // 0.05 "USD" in KZ is actually 0.05 KZT under the heuristic: 0.05 / 500 = 0.0001 USD → 0.01 RUB.
        let edition = edition_with_cents("Standard", "KZ", 5);
        let quote = engine.quote_edition(&lot, 5, &edition, "KZ").await.unwrap();
        assert_eq!(quote.price, Money::from(1));
    }

    #[tokio::test]
    async fn mistag_heuristic_can_be_disabled() {
        let api = VendorApi::new(VendorConfig::default()).unwrap();
        let config = PricingConfig { mistag_threshold: None, ..PricingConfig::default() };
        let engine = PricingEngine::new(CatalogApi::new(api), CurrencyConverter::new(StaticFx), config);
        let lot = steam_lot("Cheap Game (KZ)", "KZ");
        let edition = edition_with_cents("Standard", "KZ", 5);
        let quote = engine.quote_edition(&lot, 5, &edition, "KZ").await.unwrap();
        // 0.05 USD taken at face value → 5 RUB.
        assert_eq!(quote.price, Money::from_units(5));
    }

    fn edition_with_cents(label: &str, region: &str, cents: i64) -> Edition {
        Edition {
            package_id: format!("pkg-{label}"),
            label: label.to_string(),
            currency: "USD".to_string(),
            prices: HashMap::from([(region.to_string(), Money::from(cents))]),
        }
    }

    #[test]
    fn region_price_prefers_the_requested_region() {
        let e = edition("Standard", &[("RU", 10), ("KZ", 5)]);
        let alternates: Vec<String> = DEFAULT_ALTERNATE_REGIONS.iter().map(|s| s.to_string()).collect();
        assert_eq!(pick_region_price(&e, "KZ", &alternates), Some(("KZ".to_string(), Money::from_units(5))));
        assert_eq!(pick_region_price(&e, "UA", &alternates), Some(("RU".to_string(), Money::from_units(10))));
        assert_eq!(pick_region_price(&edition("S", &[]), "UA", &alternates), None);
    }
}
