//! Chat events in, outbound actions out.
//!
//! The engine never talks to the marketplace directly. Workers translate marketplace traffic into [`ChatEvent`]s,
//! feed them through [`dispatch`], and perform the returned [`OutboundAction`]s. This keeps every delivery decision
//! testable without a chat connection.

use chrono::{DateTime, Utc};
use dgf_common::Money;
use log::*;

use crate::sessions::SessionEngine;

pub const REDEEM_COMMAND: &str = "!redeem";
pub const CALL_ADMIN_COMMAND: &str = "!callAdmin";

/// A paid marketplace order, as reported by the sales feed.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub order_id: String,
    pub chat_id: i64,
    pub chat_name: String,
    /// The listing description the buyer purchased.
    pub description: String,
    /// The sale price in the settlement currency, when the feed reports one.
    pub price: Option<Money>,
    pub created_at: DateTime<Utc>,
}

/// A buyer chat message.
#[derive(Debug, Clone)]
pub struct IncomingMessage {
    pub chat_id: i64,
    pub chat_name: String,
    pub text: String,
}

#[derive(Debug, Clone)]
pub enum ChatEvent {
    NewOrder(NewOrder),
    Message(IncomingMessage),
}

/// Something the caller must send after handling an event.
#[derive(Debug, Clone, PartialEq)]
pub enum OutboundAction {
    /// Send a chat message to the buyer.
    SendChat { chat_id: i64, text: String },
    /// Page the operator over the notification channel.
    Notify { text: String },
}

impl OutboundAction {
    pub fn chat(chat_id: i64, text: impl Into<String>) -> Self {
        OutboundAction::SendChat { chat_id, text: text.into() }
    }

    pub fn notify(text: impl Into<String>) -> Self {
        OutboundAction::Notify { text: text.into() }
    }
}

/// Extracts the token from a `!redeem <token>` message, if the text is one.
pub fn parse_redeem(text: &str) -> Option<&str> {
    let rest = text.trim().strip_prefix(REDEEM_COMMAND)?;
    let token = rest.trim();
    (!token.is_empty()).then_some(token)
}

pub fn is_call_admin(text: &str) -> bool {
    text.trim().eq_ignore_ascii_case(CALL_ADMIN_COMMAND)
}

/// Routes one chat event through the session engine and returns the actions to perform.
pub async fn dispatch(engine: &SessionEngine, event: ChatEvent) -> Vec<OutboundAction> {
    match event {
        ChatEvent::NewOrder(order) => {
            info!("🛒️ New order {} from '{}': {}", order.order_id, order.chat_name, order.description);
            engine.start_order(order).await
        },
        ChatEvent::Message(msg) => {
            trace!("🛒️ Message from '{}' in chat {}", msg.chat_name, msg.chat_id);
            if let Some(token) = parse_redeem(&msg.text) {
                return engine.handle_redeem(&msg, token).await;
            }
            if is_call_admin(&msg.text) {
                return engine.handle_call_admin(&msg).await;
            }
            engine.handle_message(&msg).await
        },
    }
}
