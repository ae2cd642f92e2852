//! Drops purchase sessions whose buyers went quiet.

use fulfillment_engine::sessions::SessionEngine;
use log::*;
use tokio::task::JoinHandle;

use crate::integrations::{
    marketplace::MarketplaceClient,
    notify::{perform_actions, ChatNotifier},
};

/// Starts the session expiry worker. Do not await the returned JoinHandle, as it will run indefinitely.
pub fn start_expiry_worker(
    engine: SessionEngine,
    marketplace: MarketplaceClient,
    notifier: ChatNotifier,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut timer = tokio::time::interval(std::time::Duration::from_secs(60));
        info!("🕰️ Session expiry worker started");
        loop {
            timer.tick().await;
            let actions = engine.purge_expired().await;
            if !actions.is_empty() {
                debug!("🕰️ Purged idle sessions, performing {} outbound actions", actions.len());
                perform_actions(actions, &marketplace, &notifier).await;
            }
        }
    })
}
