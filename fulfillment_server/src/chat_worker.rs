//! Polls the marketplace for paid orders and buyer messages and feeds them through the session engine.

use chrono::{Duration, Utc};
use fulfillment_engine::{
    events::{dispatch, ChatEvent},
    sessions::SessionEngine,
};
use log::*;
use tokio::task::JoinHandle;

use crate::integrations::{
    marketplace::MarketplaceClient,
    notify::{perform_actions, ChatNotifier},
};

/// Starts the chat worker. Do not await the returned JoinHandle, as it will run indefinitely.
pub fn start_chat_worker(
    engine: SessionEngine,
    marketplace: MarketplaceClient,
    notifier: ChatNotifier,
    poll_interval: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let interval = poll_interval.to_std().unwrap_or(std::time::Duration::from_secs(5));
        let mut timer = tokio::time::interval(interval);
        // Orders paid before startup belong to a previous run of the bot.
        let mut last_order_seen = Utc::now();
        info!("💬️ Chat worker started, polling every {interval:?}");
        loop {
            timer.tick().await;
            match marketplace.new_orders(last_order_seen).await {
                Ok(orders) => {
                    for order in orders {
                        last_order_seen = last_order_seen.max(order.created_at);
                        let actions = dispatch(&engine, ChatEvent::NewOrder(order)).await;
                        perform_actions(actions, &marketplace, &notifier).await;
                    }
                },
                Err(e) => error!("💬️ Could not poll for new orders: {e}"),
            }
            match marketplace.unread_messages().await {
                Ok(messages) => {
                    for msg in messages {
                        let actions = dispatch(&engine, ChatEvent::Message(msg)).await;
                        perform_actions(actions, &marketplace, &notifier).await;
                    }
                },
                Err(e) => error!("💬️ Could not poll for new messages: {e}"),
            }
        }
    })
}
