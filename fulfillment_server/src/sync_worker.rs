//! Periodically reprices every listing in the configured category.

use chrono::Duration;
use fulfillment_engine::{pricing::PricingEngine, sync::SyncScheduler, traits::Notifier};
use log::*;
use tokio::task::JoinHandle;

use crate::integrations::{fx::FxClient, marketplace::MarketplaceClient, notify::ChatNotifier};

/// Starts the price sync worker. Do not await the returned JoinHandle, as it will run indefinitely.
pub fn start_sync_worker(
    scheduler: SyncScheduler<MarketplaceClient, PricingEngine<FxClient>>,
    notifier: ChatNotifier,
    sync_interval: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let interval = sync_interval.to_std().unwrap_or(std::time::Duration::from_secs(900));
        let mut timer = tokio::time::interval(interval);
        info!("🔄️ Price sync worker started, running every {interval:?}");
        loop {
            timer.tick().await;
            match scheduler.run_once().await {
                Ok(report) => {
                    // A clean run stays in the log; the operator only gets paged about failures.
                    if report.failure_count() > 0 {
                        notifier.notify(&report.summary()).await;
                    }
                },
                Err(e) => {
                    error!("🔄️ Price sync run failed: {e}");
                    notifier.notify(&format!("Price sync run failed: {e}")).await;
                },
            }
        }
    })
}
