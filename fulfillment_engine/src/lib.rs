//! Digital Goods Fulfillment Engine
//!
//! This library contains the core logic for automating fulfillment of digital-goods orders (Steam gift transfers and
//! mobile top-ups) sold on a chat-based marketplace. It is marketplace-agnostic: everything that talks to the
//! marketplace goes through the [`traits::MarketplaceApi`] and [`traits::Notifier`] seams, and everything that talks
//! to the vendor goes through the `vendor_tools` client.
//!
//! The engine is divided into the following areas:
//! 1. Catalog access ([`mod@catalog`]) — a TTL-cached facade over the vendor's Steam and mobile catalogs. Callers
//!    receive copies, never references into the cache.
//! 2. Currency conversion ([`mod@exchange`]) — a layered rate table (vendor-reported, then an external FX source, then
//!    hardcoded floor values) with operator overrides on top.
//! 3. Catalog resolution ([`mod@resolver`]) — maps free-text lot and listing names onto catalog entries through a
//!    cascade of normalization, exact, word-set, containment and word-overlap matching, plus edition-keyword handling
//!    for Steam packages.
//! 4. Pricing ([`mod@pricing`]) — base price, markup, currency conversion, alternate-region fallback.
//! 5. Purchase sessions ([`mod@sessions`]) — the per-order conversation state machine that collects buyer-supplied
//!    fields over several chat messages and drives the vendor delivery call.
//! 6. Batch repricing ([`mod@sync`]) and the vendor balance monitor ([`mod@balance`]).
//!
//! Chat traffic enters through [`events::ChatEvent`]; dispatching an event returns a list of outbound actions for the
//! caller to perform, so none of the core logic performs chat I/O itself.

pub mod balance;
pub mod catalog;
pub mod data_types;
pub mod events;
pub mod exchange;
pub mod lots;
pub mod orders;
pub mod pricing;
pub mod resolver;
pub mod sessions;
pub mod sync;
pub mod traits;
