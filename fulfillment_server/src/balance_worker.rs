//! Watches the vendor balance and pulls listings offline before buyers can pay for undeliverable orders.

use chrono::Utc;
use fulfillment_engine::{
    balance::{BalanceAction, BalanceMonitor},
    traits::{MarketplaceApi, Notifier},
};
use log::*;
use tokio::task::JoinHandle;
use vendor_tools::VendorApi;

use crate::integrations::{marketplace::MarketplaceClient, notify::ChatNotifier};

const BALANCE_POLL_SECS: u64 = 60;

/// Starts the balance worker. Do not await the returned JoinHandle, as it will run indefinitely.
pub fn start_balance_worker(
    vendor: VendorApi,
    marketplace: MarketplaceClient,
    notifier: ChatNotifier,
    mut monitor: BalanceMonitor,
    category: String,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut timer = tokio::time::interval(std::time::Duration::from_secs(BALANCE_POLL_SECS));
        info!("💰️ Balance worker started");
        loop {
            timer.tick().await;
            let balance = match vendor.balance().await {
                Ok(b) => b,
                Err(e) => {
                    error!("💰️ Could not fetch the vendor balance: {e}");
                    continue;
                },
            };
            trace!("💰️ Vendor balance: {} {}", balance.balance, balance.currency);
            for action in monitor.tick(balance.balance, Utc::now()) {
                match action {
                    BalanceAction::NotifyRise { from, to } => {
                        notifier.notify(&format!("Vendor balance rose from {from:.2} to {to:.2}.")).await;
                    },
                    BalanceAction::WarnLow { balance: low } => {
                        notifier
                            .notify(&format!(
                                "Vendor balance is low: {low:.2} {}. Listings will be deactivated if it stays low.",
                                balance.currency
                            ))
                            .await;
                    },
                    BalanceAction::DeactivateAll => {
                        deactivate_all(&marketplace, &notifier, &mut monitor, &category).await;
                    },
                    BalanceAction::Reactivate(ids) => {
                        reactivate(&marketplace, &notifier, ids).await;
                    },
                }
            }
        }
    })
}

async fn deactivate_all(
    marketplace: &MarketplaceClient,
    notifier: &ChatNotifier,
    monitor: &mut BalanceMonitor,
    category: &str,
) {
    let ids = match marketplace.active_listing_ids(category).await {
        Ok(ids) => ids,
        Err(e) => {
            error!("💰️ Could not list active listings for deactivation: {e}");
            return;
        },
    };
    let mut deactivated = Vec::with_capacity(ids.len());
    for id in ids {
        match marketplace.set_listing_active(&id, false).await {
            Ok(()) => deactivated.push(id),
            Err(e) => error!("💰️ Could not deactivate listing {id}: {e}"),
        }
    }
    notifier
        .notify(&format!("Vendor balance stayed low; {} listings deactivated until it recovers.", deactivated.len()))
        .await;
    // Only this snapshot comes back on recovery; hand-disabled listings stay down.
    monitor.confirm_deactivated(deactivated);
}

async fn reactivate(marketplace: &MarketplaceClient, notifier: &ChatNotifier, ids: Vec<String>) {
    let mut restored = 0usize;
    for id in &ids {
        match marketplace.set_listing_active(id, true).await {
            Ok(()) => restored += 1,
            Err(e) => error!("💰️ Could not reactivate listing {id}: {e}"),
        }
    }
    notifier.notify(&format!("Vendor balance recovered; {restored} of {} listings reactivated.", ids.len())).await;
}
