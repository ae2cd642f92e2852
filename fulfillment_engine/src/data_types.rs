use std::collections::HashMap;

use chrono::{DateTime, Utc};
use dgf_common::Money;
use serde::{Deserialize, Serialize};
use vendor_tools::{EditionInfo, FieldSpec, GameDetail, MobileGameDetail, PositionInfo};

//--------------------------------------     LotConfig       ---------------------------------------------------------

/// What kind of digital good a configured lot delivers, with the variant-specific configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LotKind {
    SteamGift {
        /// The Steam region the gift must be purchased for, e.g. "RU" or "KZ".
        region: String,
    },
    MobileRefill {
        /// The label of the top-up denomination, e.g. "60 UC". Matched against catalog position names.
        amount_label: String,
    },
}

/// One configured marketplace listing, immutable for the duration of a sync run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LotConfig {
    /// The marketplace listing description this lot is matched against.
    pub lot_name: String,
    /// The human-readable game name used to find the catalog entry.
    pub game_name: String,
    #[serde(flatten)]
    pub kind: LotKind,
}

impl LotConfig {
    pub fn is_steam(&self) -> bool {
        matches!(self.kind, LotKind::SteamGift { .. })
    }
}

//--------------------------------------    Catalog types    ---------------------------------------------------------

/// A Steam title in the vendor catalog, with all of its purchasable editions.
///
/// Construction from the wire type drops zero- and negative-priced regions, so a cached game never carries an
/// unusable price.
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogGame {
    pub id: u32,
    pub name: String,
    pub editions: Vec<Edition>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Edition {
    pub package_id: String,
    pub label: String,
    pub currency: String,
    /// Price per region code, in `currency`.
    pub prices: HashMap<String, Money>,
}

impl Edition {
    /// The cheapest price across all regions, if any region is priced.
    pub fn min_price(&self) -> Option<Money> {
        self.prices.values().min().copied()
    }
}

impl From<GameDetail> for CatalogGame {
    fn from(detail: GameDetail) -> Self {
        let editions = detail.editions.into_iter().filter_map(sanitize_edition).collect();
        Self { id: detail.id, name: detail.name, editions }
    }
}

fn sanitize_edition(info: EditionInfo) -> Option<Edition> {
    let prices: HashMap<String, Money> = info
        .region_prices
        .into_iter()
        .filter(|(_, p)| *p > 0.0)
        .filter_map(|(region, p)| Money::try_from(p).ok().map(|m| (region, m)))
        .filter(|(_, m)| m.is_positive())
        .collect();
    if prices.is_empty() {
        return None;
    }
    Some(Edition { package_id: info.package_id, label: info.name, currency: info.currency, prices })
}

/// A mobile title in the vendor catalog, with its purchasable top-up positions.
#[derive(Debug, Clone, PartialEq)]
pub struct MobileCatalogGame {
    pub id: u32,
    pub name: String,
    pub positions: Vec<MobilePosition>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MobilePosition {
    pub id: u32,
    pub label: String,
    pub currency: String,
    pub price: Money,
    /// Identifiers the buyer must supply, in the order they are asked for.
    pub required_fields: Vec<FieldSpec>,
}

impl From<MobileGameDetail> for MobileCatalogGame {
    fn from(detail: MobileGameDetail) -> Self {
        let positions = detail.positions.into_iter().filter_map(sanitize_position).collect();
        Self { id: detail.id, name: detail.name, positions }
    }
}

fn sanitize_position(info: PositionInfo) -> Option<MobilePosition> {
    let price = Money::try_from(info.price).ok().filter(Money::is_positive)?;
    Some(MobilePosition { id: info.id, label: info.name, currency: info.currency, price, required_fields: info.fields })
}

//--------------------------------------     OrderRecord     ---------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderKind {
    SteamGift,
    MobileRefill,
}

impl From<&LotKind> for OrderKind {
    fn from(kind: &LotKind) -> Self {
        match kind {
            LotKind::SteamGift { .. } => OrderKind::SteamGift,
            LotKind::MobileRefill { .. } => OrderKind::MobileRefill,
        }
    }
}

/// An append-only record of one successfully delivered order. Written exactly once, never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderRecord {
    pub order_id: String,
    pub kind: OrderKind,
    pub game_name: String,
    pub price: Money,
    pub currency: String,
    pub transaction_id: Option<String>,
    /// The vendor-reported terminal status, e.g. "completed".
    pub status: String,
    pub timestamp: DateTime<Utc>,
}

#[cfg(test)]
mod test {
    use super::*;

    fn edition(prices: &[(&str, f64)]) -> EditionInfo {
        EditionInfo {
            package_id: "pkg".to_string(),
            name: "Standard".to_string(),
            currency: "USD".to_string(),
            region_prices: prices.iter().map(|(r, p)| (r.to_string(), *p)).collect(),
        }
    }

    #[test]
    fn zero_priced_regions_are_dropped_at_ingest() {
        let detail = GameDetail {
            id: 7,
            name: "Some Game".to_string(),
            editions: vec![edition(&[("RU", 10.0), ("KZ", 0.0), ("UA", -1.0)])],
        };
        let game = CatalogGame::from(detail);
        assert_eq!(game.editions.len(), 1);
        let prices = &game.editions[0].prices;
        assert_eq!(prices.len(), 1);
        assert_eq!(prices["RU"], Money::from_units(10));
    }

    #[test]
    fn editions_without_any_usable_price_are_dropped() {
        let detail = GameDetail { id: 7, name: "Some Game".to_string(), editions: vec![edition(&[("RU", 0.0)])] };
        assert!(CatalogGame::from(detail).editions.is_empty());
    }

    #[test]
    fn lot_config_deserializes_tagged_variants() {
        let steam: LotConfig = serde_json::from_str(
            r#"{"lot_name": "Elden Ring (RU)", "game_name": "Elden Ring", "type": "steam_gift", "region": "RU"}"#,
        )
        .unwrap();
        assert!(steam.is_steam());
        let mobile: LotConfig = serde_json::from_str(
            r#"{"lot_name": "PUBG 60 UC", "game_name": "PUBG Mobile", "type": "mobile_refill", "amount_label": "60 UC"}"#,
        )
        .unwrap();
        assert_eq!(mobile.kind, LotKind::MobileRefill { amount_label: "60 UC".to_string() });
    }
}
