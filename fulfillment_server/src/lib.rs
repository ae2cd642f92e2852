//! # Digital goods fulfillment server
//! This crate hosts the daemon around the fulfillment engine. It is responsible for:
//! Polling the marketplace for paid orders and buyer chat messages.
//! Driving purchase sessions through the engine and sending the resulting chat replies.
//! Repricing listings on a schedule and deactivating them when the vendor balance runs dry.
//!
//! ## Configuration
//! The server is configured via environment variables. See [config](config/index.html) for more information.

pub mod balance_worker;
pub mod chat_worker;
pub mod cli;
pub mod config;
pub mod errors;
pub mod expiry_worker;
pub mod integrations;
pub mod server;
pub mod sync_worker;
