//! Seams to the marketplace account and the operator notification channel.
//!
//! The engine never talks HTTP to the marketplace directly; everything goes through [`MarketplaceApi`] so the sync
//! scheduler, the balance monitor and the tests can run against in-memory fakes.

use std::collections::BTreeMap;

use dgf_common::Money;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MarketplaceError {
    #[error("Marketplace transport error: {0}")]
    Transport(String),
    /// The marketplace answered with its "parsing error" shape. Callers fall back to the previously known price
    /// rather than treating the listing as broken.
    #[error("Marketplace could not parse the request")]
    ParsingError,
    #[error("Not found: {0}")]
    NotFound(String),
}

/// A listing as returned by the category listing endpoint. Ids are opaque strings; some endpoints want only the
/// numeric prefix (see `dgf_common::helpers::coerce_listing_id`).
#[derive(Debug, Clone, PartialEq)]
pub struct ListingSummary {
    pub id: String,
    pub description: String,
    pub active: bool,
}

/// The full editable field set of one listing. Only `price` is interpreted; everything else is carried opaquely so a
/// save round-trips unknown marketplace fields.
#[derive(Debug, Clone, PartialEq)]
pub struct ListingFields {
    pub id: String,
    pub price: Option<Money>,
    pub fields: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChatHandle {
    pub id: i64,
    pub name: String,
}

/// The marketplace account operations the engine consumes.
#[allow(async_fn_in_trait)]
pub trait MarketplaceApi: Clone + Send + Sync {
    /// All listings in the configured category, active or not.
    async fn listings_in_category(&self, category: &str) -> Result<Vec<ListingSummary>, MarketplaceError>;

    async fn listing_fields(&self, listing_id: &str) -> Result<ListingFields, MarketplaceError>;

    async fn save_listing(&self, fields: &ListingFields) -> Result<(), MarketplaceError>;

    async fn chat_by_buyer(&self, buyer: &str) -> Result<Option<ChatHandle>, MarketplaceError>;

    async fn send_message(&self, chat_id: i64, text: &str) -> Result<(), MarketplaceError>;

    async fn set_listing_active(&self, listing_id: &str, active: bool) -> Result<(), MarketplaceError>;
}

/// The single operator notification capability. Implementations must swallow and log their own failures: a dead
/// notification channel is never allowed to fail a delivery or a sync run.
#[allow(async_fn_in_trait)]
pub trait Notifier: Clone + Send + Sync {
    async fn notify(&self, text: &str);
}
