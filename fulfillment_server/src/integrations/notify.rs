//! Operator notifications, delivered as private messages to the admin chat.

use fulfillment_engine::{
    events::OutboundAction,
    traits::{MarketplaceApi, Notifier},
};
use log::*;

use super::marketplace::MarketplaceClient;

/// Sends operator pages to the configured admin chat. Without an admin chat every page still lands in the log, and a
/// dead chat never fails the operation that triggered the page.
#[derive(Clone)]
pub struct ChatNotifier {
    marketplace: MarketplaceClient,
    admin_chat_id: Option<i64>,
}

impl ChatNotifier {
    pub fn new(marketplace: MarketplaceClient, admin_chat_id: Option<i64>) -> Self {
        Self { marketplace, admin_chat_id }
    }
}

impl Notifier for ChatNotifier {
    async fn notify(&self, text: &str) {
        warn!("📣️ {text}");
        if let Some(chat_id) = self.admin_chat_id {
            if let Err(e) = self.marketplace.send_message(chat_id, text).await {
                error!("📣️ Could not deliver the notification to chat {chat_id}: {e}");
            }
        }
    }
}

/// Performs the outbound actions an engine call returned, in order.
pub async fn perform_actions(actions: Vec<OutboundAction>, marketplace: &MarketplaceClient, notifier: &ChatNotifier) {
    for action in actions {
        match action {
            OutboundAction::SendChat { chat_id, text } => {
                if let Err(e) = marketplace.send_message(chat_id, &text).await {
                    error!("🏪️ Could not send a message to chat {chat_id}: {e}");
                    notifier.notify(&format!("Could not reach chat {chat_id}: {e}")).await;
                }
            },
            OutboundAction::Notify { text } => notifier.notify(&text).await,
        }
    }
}
