//! Batch repricing of marketplace listings.
//!
//! On every run the scheduler reprices each listing in the configured category from the vendor catalog. Listings are
//! processed concurrently but independently: one broken listing never fails the run, it becomes one line in the
//! [`SyncReport`]. Prices are only written back when they actually moved, so a quiet catalog produces a run with
//! zero marketplace writes.

use std::{collections::HashMap, sync::Arc};

use dgf_common::Money;
use futures_util::{stream, StreamExt};
use log::*;
use tokio::sync::Mutex;

use crate::{
    data_types::LotConfig,
    lots::match_lot,
    pricing::{PriceSource, PricingError},
    traits::{MarketplaceApi, MarketplaceError},
};

pub const DEFAULT_SYNC_CONCURRENCY: usize = 25;

/// Why one listing could not be repriced. One category per failure, aggregated in the report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SyncFailureKind {
    /// No configured lot matches the listing description.
    LotNotFound,
    /// The matched lot has no game name to resolve against the catalog.
    NoGameName,
    /// The lot's game, edition, position or regional price could not be resolved.
    PriceNotFound,
    /// Currency conversion failed.
    Conversion,
    /// The marketplace rejected the read or the write.
    Update,
}

impl std::fmt::Display for SyncFailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SyncFailureKind::LotNotFound => "no matching lot",
            SyncFailureKind::NoGameName => "lot has no game name",
            SyncFailureKind::PriceNotFound => "no usable price",
            SyncFailureKind::Conversion => "conversion failed",
            SyncFailureKind::Update => "marketplace update failed",
        };
        write!(f, "{s}")
    }
}

/// The outcome of one sync run.
#[derive(Debug, Clone, Default)]
pub struct SyncReport {
    pub updated: usize,
    pub unchanged: usize,
    /// One entry per failed listing: (listing description, failure category).
    pub failures: Vec<(String, SyncFailureKind)>,
}

impl SyncReport {
    pub fn failure_count(&self) -> usize {
        self.failures.len()
    }

    /// A one-message summary for the operator notification channel.
    pub fn summary(&self) -> String {
        let mut counts: HashMap<SyncFailureKind, usize> = HashMap::new();
        for (_, kind) in &self.failures {
            *counts.entry(*kind).or_default() += 1;
        }
        let mut parts: Vec<String> = counts.iter().map(|(kind, n)| format!("{n} × {kind}")).collect();
        parts.sort();
        if parts.is_empty() {
            format!("Price sync: {} updated, {} unchanged.", self.updated, self.unchanged)
        } else {
            format!(
                "Price sync: {} updated, {} unchanged, {} failed ({}).",
                self.updated,
                self.unchanged,
                self.failure_count(),
                parts.join(", ")
            )
        }
    }
}

enum ListingOutcome {
    Updated,
    Unchanged,
    Failed(String, SyncFailureKind),
}

/// Reprices every listing in one marketplace category from the vendor catalog.
#[derive(Clone)]
pub struct SyncScheduler<M, P> {
    marketplace: M,
    prices: P,
    category: String,
    lots: Arc<Vec<LotConfig>>,
    concurrency: usize,
    /// The last successfully computed price per listing id. Consulted when the marketplace answers a field read with
    /// its "parsing error" shape, which it does intermittently for healthy listings.
    last_known: Arc<Mutex<HashMap<String, Money>>>,
}

impl<M: MarketplaceApi, P: PriceSource> SyncScheduler<M, P> {
    pub fn new(marketplace: M, prices: P, category: String, lots: Vec<LotConfig>) -> Self {
        Self {
            marketplace,
            prices,
            category,
            lots: Arc::new(lots),
            concurrency: DEFAULT_SYNC_CONCURRENCY,
            last_known: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// One full repricing pass over the category.
    pub async fn run_once(&self) -> Result<SyncReport, MarketplaceError> {
        // Warm the catalog and rate caches once, not once per listing.
        if let Err(e) = self.prices.preload().await {
            warn!("🔄️ Cache preload failed, listings will fetch lazily: {e}");
        }
        let listings = self.marketplace.listings_in_category(&self.category).await?;
        info!("🔄️ Repricing {} listings in category {}", listings.len(), self.category);

        let outcomes = stream::iter(listings)
            .map(|listing| async move { self.reprice(listing.id, listing.description).await })
            .buffer_unordered(self.concurrency)
            .collect::<Vec<_>>()
            .await;

        let mut report = SyncReport::default();
        for outcome in outcomes {
            match outcome {
                ListingOutcome::Updated => report.updated += 1,
                ListingOutcome::Unchanged => report.unchanged += 1,
                ListingOutcome::Failed(description, kind) => report.failures.push((description, kind)),
            }
        }
        info!("🔄️ {}", report.summary());
        Ok(report)
    }

    async fn reprice(&self, listing_id: String, description: String) -> ListingOutcome {
        let lot = match match_lot(&description, &self.lots) {
            Some(lot) => lot,
            None => {
                debug!("🔄️ '{description}': no matching lot");
                return ListingOutcome::Failed(description, SyncFailureKind::LotNotFound);
            },
        };
        if lot.game_name.trim().is_empty() {
            debug!("🔄️ '{description}': the lot has no game name configured");
            return ListingOutcome::Failed(description, SyncFailureKind::NoGameName);
        }
        let new_price = match self.prices.price_for(lot).await {
            Ok(quote) => {
                if let Some(region) = &quote.region_fallback {
                    debug!("🔄️ '{description}': priced from alternate region {region}");
                }
                quote.price
            },
            Err(e) => {
                debug!("🔄️ '{description}': {e}");
                return ListingOutcome::Failed(description, failure_kind(&e));
            },
        };
        let previous = self.last_known.lock().await.insert(listing_id.clone(), new_price);

        let mut fields = match self.marketplace.listing_fields(&listing_id).await {
            Ok(fields) => fields,
            // Intermittent parse failures still leave the listing priceable from memory next run; this run just
            // reports it as unchanged if the price didn't move.
            Err(MarketplaceError::ParsingError) => {
                match previous {
                    Some(last) if new_price == last => {
                        debug!("🔄️ '{description}': fields unreadable, price unchanged from last run");
                        return ListingOutcome::Unchanged;
                    },
                    _ => return ListingOutcome::Failed(description, SyncFailureKind::Update),
                }
            },
            Err(e) => {
                debug!("🔄️ '{description}': {e}");
                return ListingOutcome::Failed(description, SyncFailureKind::Update);
            },
        };
        match fields.price {
            Some(current) if within_one_cent(current, new_price) => ListingOutcome::Unchanged,
            _ => {
                fields.price = Some(new_price);
                match self.marketplace.save_listing(&fields).await {
                    Ok(()) => {
                        info!("🔄️ '{description}' repriced to {new_price}");
                        ListingOutcome::Updated
                    },
                    Err(e) => {
                        warn!("🔄️ '{description}': save failed: {e}");
                        ListingOutcome::Failed(description, SyncFailureKind::Update)
                    },
                }
            },
        }
    }
}

/// A listing is only rewritten when its price moves by more than one cent. Rate jitter below that is ignored.
fn within_one_cent(a: Money, b: Money) -> bool {
    (a - b).abs().value() <= 1
}

fn failure_kind(e: &PricingError) -> SyncFailureKind {
    if e.is_resolution() {
        SyncFailureKind::PriceNotFound
    } else {
        match e {
            PricingError::Rate(_) | PricingError::Amount(_) => SyncFailureKind::Conversion,
            _ => SyncFailureKind::Update,
        }
    }
}
