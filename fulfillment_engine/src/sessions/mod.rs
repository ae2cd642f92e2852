//! Purchase sessions.
//!
//! A session follows one buyer from "paid for a listing" to "gift delivered": resolve the listing to a catalog item,
//! ask the buyer for the fields delivery needs (one chat message per field), call the vendor, record the result.
//! Sessions live purely in memory; an idle session is purged after [`DEFAULT_SESSION_TTL_MINS`] minutes and the
//! operator delivers manually.

pub mod messages;
mod session;
mod table;
mod validation;

use std::{collections::BTreeMap, sync::Arc};

use chrono::{Duration, Utc};
use log::*;
use rand::{distributions::Alphanumeric, Rng};
use thiserror::Error;
use vendor_tools::{FieldSpec, RefillRequest, SendGiftRequest, VendorApi, VendorApiError};

pub use self::{
    session::{FieldOutcome, PurchaseSession, SessionError, SessionId, SessionKind, SessionStatus},
    table::SessionTable,
    validation::{LinkRejection, LinkValidator},
};
use crate::{
    catalog::{CatalogApi, CatalogError},
    data_types::{LotConfig, LotKind, OrderRecord},
    events::{IncomingMessage, NewOrder, OutboundAction},
    lots::{match_lot, resolve_lot_game, ResolvedLotGame},
    orders::OrderLog,
    resolver,
};
use self::messages::FRIEND_LINK_FIELD;

pub const DEFAULT_SESSION_TTL_MINS: i64 = 10;
const TEST_TOKEN_LEN: usize = 8;

#[derive(Debug, Error)]
pub enum FulfillmentError {
    #[error("No configured lot matches '{0}'")]
    LotNotFound(String),
    #[error("No catalog entry matches '{0}'")]
    GameNotFound(String),
    #[error("No purchasable edition or position for '{0}'")]
    ItemNotFound(String),
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    #[error(transparent)]
    Session(#[from] SessionError),
}

/// Drives every purchase session. Owns the session table; all marketplace I/O is returned to the caller as
/// [`OutboundAction`]s.
#[derive(Clone)]
pub struct SessionEngine {
    table: SessionTable,
    vendor: VendorApi,
    catalog: CatalogApi,
    orders: OrderLog,
    validator: Arc<LinkValidator>,
    lots: Arc<Vec<LotConfig>>,
    settlement_currency: String,
    session_ttl: Duration,
}

impl SessionEngine {
    pub fn new(
        vendor: VendorApi,
        catalog: CatalogApi,
        orders: OrderLog,
        lots: Vec<LotConfig>,
        settlement_currency: String,
    ) -> Self {
        Self {
            table: SessionTable::new(),
            vendor,
            catalog,
            orders,
            validator: Arc::new(LinkValidator::new()),
            lots: Arc::new(lots),
            settlement_currency,
            session_ttl: Duration::minutes(DEFAULT_SESSION_TTL_MINS),
        }
    }

    pub fn with_session_ttl(mut self, ttl: Duration) -> Self {
        self.session_ttl = ttl;
        self
    }

    pub fn table(&self) -> &SessionTable {
        &self.table
    }

    pub fn order_log(&self) -> &OrderLog {
        &self.orders
    }

    /// Opens a session for a paid marketplace order and asks the buyer for the first field.
    ///
    /// Orders that cannot be resolved to a deliverable catalog item are not sessioned at all: the buyer is told the
    /// seller will deliver manually, and the operator is paged.
    pub async fn start_order(&self, order: NewOrder) -> Vec<OutboundAction> {
        let lot = match match_lot(&order.description, &self.lots) {
            Some(lot) => lot.clone(),
            None => {
                warn!("🛒️ Order {}: no lot matches '{}'", order.order_id, order.description);
                return self.resolution_failed(order.chat_id, &order.order_id, &order.description);
            },
        };
        let (kind, fields) = match self.prepare(&lot).await {
            Ok(prepared) => prepared,
            Err(e) => {
                warn!("🛒️ Order {}: {e}", order.order_id);
                return self.resolution_failed(order.chat_id, &order.order_id, &order.description);
            },
        };
        let mut session =
            PurchaseSession::new(order.order_id.as_str().into(), Some(order.chat_id), order.chat_name, kind, lot);
        session.expected_fields = fields;
        session.price = order.price;
        let first = match self.open(&mut session) {
            Ok(first) => first,
            Err(e) => {
                error!("🛒️ Order {}: {e}", order.order_id);
                return Vec::new();
            },
        };
        let prompt = messages::prompt_for(&first);
        match self.table.insert(session).await {
            Ok(()) => vec![OutboundAction::chat(order.chat_id, prompt)],
            // The sales feed redelivered an order we are already working on.
            Err(SessionError::DuplicateSession(id)) => {
                debug!("🛒️ Ignoring duplicate order event for session {id}");
                Vec::new()
            },
            Err(e) => {
                error!("🛒️ Order {}: {e}", order.order_id);
                Vec::new()
            },
        }
    }

    /// Opens an unbound session for the named lot and returns the redeem token. The session stays dormant until a
    /// buyer sends `!redeem <token>` in chat.
    pub async fn start_test_purchase(&self, lot_name: &str) -> Result<String, FulfillmentError> {
        let lot = match_lot(lot_name, &self.lots)
            .cloned()
            .ok_or_else(|| FulfillmentError::LotNotFound(lot_name.to_string()))?;
        let (kind, fields) = self.prepare(&lot).await?;
        let token: String =
            rand::thread_rng().sample_iter(&Alphanumeric).take(TEST_TOKEN_LEN).map(char::from).collect();
        let mut session = PurchaseSession::new(token.as_str().into(), None, String::new(), kind, lot);
        session.expected_fields = fields;
        session.advance(SessionStatus::ResolvingCatalog)?;
        self.table.insert(session).await?;
        info!("🛒️ Test purchase for '{lot_name}' ready; token {token}");
        Ok(token)
    }

    /// Binds a dormant test-purchase session to the redeeming buyer's chat.
    pub async fn handle_redeem(&self, msg: &IncomingMessage, token: &str) -> Vec<OutboundAction> {
        let mut session = match self.table.claim(token).await {
            Some(s) if s.chat_id.is_none() => s,
            Some(s) => {
                // Token already bound to a chat; put it back untouched.
                self.table.restore(s).await;
                return vec![OutboundAction::chat(msg.chat_id, messages::redeem_unknown())];
            },
            None => return vec![OutboundAction::chat(msg.chat_id, messages::redeem_unknown())],
        };
        session.chat_id = Some(msg.chat_id);
        session.chat_name = msg.chat_name.clone();
        session.touch();
        let first = match session.advance(SessionStatus::AwaitingInput(0)) {
            Ok(()) => session.expected_fields[0].clone(),
            Err(e) => {
                error!("🛒️ Redeem {token}: {e}");
                self.table.restore(session).await;
                return Vec::new();
            },
        };
        info!("🛒️ Token {token} redeemed by '{}' in chat {}", msg.chat_name, msg.chat_id);
        self.table.restore(session).await;
        vec![OutboundAction::chat(msg.chat_id, messages::prompt_for(&first))]
    }

    pub async fn handle_call_admin(&self, msg: &IncomingMessage) -> Vec<OutboundAction> {
        info!("🛒️ '{}' (chat {}) requested operator help", msg.chat_name, msg.chat_id);
        vec![
            OutboundAction::chat(msg.chat_id, messages::call_admin_ack()),
            OutboundAction::notify(format!("Buyer '{}' (chat {}) asked for help: {}", msg.chat_name, msg.chat_id, msg.text)),
        ]
    }

    /// Feeds a buyer message into the session awaiting input from that chat, if any.
    pub async fn handle_message(&self, msg: &IncomingMessage) -> Vec<OutboundAction> {
        // The bot must never react to its own prompts echoing back through the feed.
        if messages::is_bot_prompt(&msg.text) {
            return Vec::new();
        }
        let mut session = match self.table.claim_by_chat(msg.chat_id).await {
            Some(s) => s,
            None => return Vec::new(),
        };
        if session.is_expired(Utc::now(), self.session_ttl) {
            warn!("🛒️ Session {} expired before the buyer answered", session.id);
            return self.expire(session);
        }
        let field = match session.current_field() {
            Some(f) => f.clone(),
            None => {
                self.table.restore(session).await;
                return Vec::new();
            },
        };
        let value = match self.validate(&field, &msg.text) {
            Ok(value) => value,
            Err(None) => {
                // Bot-authored text slipped through; ignore without resending the prompt.
                self.table.restore(session).await;
                return Vec::new();
            },
            Err(Some(reply)) => {
                self.table.restore(session).await;
                return vec![OutboundAction::chat(msg.chat_id, reply)];
            },
        };
        match session.record_field(value) {
            Ok(FieldOutcome::NextPrompt(next)) => {
                let prompt = messages::prompt_for(&next);
                self.table.restore(session).await;
                vec![OutboundAction::chat(msg.chat_id, prompt)]
            },
            Ok(FieldOutcome::ReadyToDeliver) => self.deliver(session).await,
            Err(e) => {
                error!("🛒️ Session {}: {e}", session.id);
                self.table.restore(session).await;
                Vec::new()
            },
        }
    }

    /// Removes idle sessions and pages the operator about each one.
    pub async fn purge_expired(&self) -> Vec<OutboundAction> {
        let purged = self.table.purge_expired(Utc::now(), self.session_ttl).await;
        purged
            .into_iter()
            .flat_map(|s| {
                info!("🛒️ Session {} purged after {} minutes of inactivity", s.id, self.session_ttl.num_minutes());
                self.expire(s)
            })
            .collect()
    }

    fn resolution_failed(&self, chat_id: i64, order_id: &str, description: &str) -> Vec<OutboundAction> {
        vec![
            OutboundAction::chat(chat_id, messages::resolution_failure()),
            OutboundAction::notify(format!(
                "Order {order_id} ('{description}') could not be matched to a deliverable item; deliver manually."
            )),
        ]
    }

    /// Resolves a lot to its deliverable catalog item and the fields the buyer must supply.
    async fn prepare(&self, lot: &LotConfig) -> Result<(SessionKind, Vec<FieldSpec>), FulfillmentError> {
        let game = resolve_lot_game(lot, &self.catalog)
            .await?
            .ok_or_else(|| FulfillmentError::GameNotFound(lot.game_name.clone()))?;
        match (game, &lot.kind) {
            (ResolvedLotGame::Steam(game), LotKind::SteamGift { region }) => {
                let edition = resolver::choose_edition(&lot.lot_name, &game.editions, region)
                    .ok_or_else(|| FulfillmentError::ItemNotFound(lot.lot_name.clone()))?;
                let kind = SessionKind::SteamGift {
                    region: region.clone(),
                    app_id: Some(game.id),
                    package_id: Some(edition.package_id.clone()),
                };
                Ok((kind, session::steam_fields()))
            },
            (ResolvedLotGame::Mobile(game), LotKind::MobileRefill { amount_label }) => {
                let position = resolver::find_by_name(amount_label, &game.positions, |p| &p.label, |p| Some(p.price))
                    .ok_or_else(|| FulfillmentError::ItemNotFound(amount_label.clone()))?;
                let kind = SessionKind::MobileRefill { game_id: Some(game.id), position_id: Some(position.id) };
                let fields = if position.required_fields.is_empty() {
                    vec![FieldSpec { name: "account_id".to_string(), label: "game account ID".to_string() }]
                } else {
                    position.required_fields.clone()
                };
                Ok((kind, fields))
            },
            _ => Err(FulfillmentError::GameNotFound(lot.game_name.clone())),
        }
    }

    /// Walks a fresh session forward to awaiting its first field and returns that field.
    fn open(&self, session: &mut PurchaseSession) -> Result<FieldSpec, SessionError> {
        session.advance(SessionStatus::ResolvingCatalog)?;
        session.advance(SessionStatus::AwaitingInput(0))?;
        Ok(session.expected_fields[0].clone())
    }

    /// Validates one buyer answer for the given field. `Err(None)` means ignore silently, `Err(Some(reply))` means
    /// resend with the given correction. The state-machine slot is only consumed on `Ok`.
    fn validate(&self, field: &FieldSpec, text: &str) -> Result<String, Option<String>> {
        if field.name == FRIEND_LINK_FIELD {
            match self.validator.validate_friend_link(text) {
                Ok(link) => Ok(link),
                Err(LinkRejection::BotPrompt) => Err(None),
                Err(LinkRejection::Placeholder) => Err(Some(messages::placeholder_link(field))),
                Err(LinkRejection::NotALink) => Err(Some(messages::invalid_input(field))),
            }
        } else {
            let trimmed = text.trim();
            if trimmed.is_empty() {
                Err(Some(messages::invalid_input(field)))
            } else {
                Ok(trimmed.to_string())
            }
        }
    }

    /// Calls the vendor delivery endpoint for a fully-collected session and reports the outcome.
    async fn deliver(&self, mut session: PurchaseSession) -> Vec<OutboundAction> {
        let chat_id = match session.chat_id {
            Some(id) => id,
            None => {
                error!("🛒️ Session {} reached delivery without a bound chat", session.id);
                return Vec::new();
            },
        };
        info!("🛒️ Delivering session {} ({})", session.id, session.lot.lot_name);
        let kind = session.kind.clone();
        let result = match &kind {
            SessionKind::SteamGift { region, package_id: Some(package_id), .. } => {
                let invite_url = match session.field_value(FRIEND_LINK_FIELD) {
                    Some(link) => link.to_string(),
                    None => return self.fail(session, chat_id, messages::transport_failure(), "missing friend link"),
                };
                let request =
                    SendGiftRequest { invite_url, package_id: package_id.clone(), region: region.clone() };
                self.vendor.send_gift(request).await
            },
            SessionKind::MobileRefill { position_id: Some(position), .. } => {
                let fields: BTreeMap<String, String> = session.collected.iter().cloned().collect();
                let request =
                    RefillRequest { position: *position, fields, reference: session.id.as_str().to_string() };
                self.vendor.refill(request).await
            },
            _ => {
                return self.fail(session, chat_id, messages::resolution_failure(), "catalog item never resolved");
            },
        };
        match result {
            Ok(transaction_id) => self.complete(session, chat_id, transaction_id),
            Err(VendorApiError::Vendor(code)) => {
                let urgency = if code.needs_operator_attention() { " TOP UP THE VENDOR BALANCE." } else { "" };
                let note = format!("Vendor rejected delivery: {code}.{urgency}");
                self.fail(session, chat_id, messages::delivery_failure(code), &note)
            },
            Err(e) => self.fail(session, chat_id, messages::transport_failure(), &e.to_string()),
        }
    }

    fn complete(
        &self,
        mut session: PurchaseSession,
        chat_id: i64,
        transaction_id: Option<String>,
    ) -> Vec<OutboundAction> {
        if let Err(e) = session.advance(SessionStatus::Completed) {
            error!("🛒️ Session {}: {e}", session.id);
        }
        let record = OrderRecord {
            order_id: session.id.as_str().to_string(),
            kind: (&session.lot.kind).into(),
            game_name: session.lot.game_name.clone(),
            price: session.price.unwrap_or_default(),
            currency: self.settlement_currency.clone(),
            transaction_id: transaction_id.clone(),
            status: "completed".to_string(),
            timestamp: Utc::now(),
        };
        if let Err(e) = self.orders.append(record) {
            error!("🧾️ Could not record order {}: {e}", session.id);
        }
        info!("🛒️ Session {} delivered", session.id);
        vec![OutboundAction::chat(chat_id, messages::delivery_success(&session.lot.game_name, transaction_id.as_deref()))]
    }

    fn fail(&self, mut session: PurchaseSession, chat_id: i64, reply: String, note: &str) -> Vec<OutboundAction> {
        if let Err(e) = session.advance(SessionStatus::Failed) {
            error!("🛒️ Session {}: {e}", session.id);
        }
        warn!("🛒️ Session {} failed: {note}", session.id);
        vec![
            OutboundAction::chat(chat_id, reply),
            OutboundAction::notify(format!("Order {} ({}) failed: {note}", session.id, session.lot.lot_name)),
        ]
    }

    /// An expired session is dropped; the operator takes over delivery by hand.
    fn expire(&self, session: PurchaseSession) -> Vec<OutboundAction> {
        let mut actions = vec![OutboundAction::notify(format!(
            "Session {} ({}) expired without buyer input; deliver manually.",
            session.id, session.lot.lot_name
        ))];
        if let Some(chat_id) = session.chat_id {
            actions.insert(0, OutboundAction::chat(chat_id, messages::transport_failure()));
        }
        actions
    }
}

#[cfg(test)]
mod test {
    use vendor_tools::VendorConfig;

    use super::*;
    use crate::data_types::LotKind;

    fn engine(lots: Vec<LotConfig>) -> SessionEngine {
        let _ = env_logger::try_init();
        let api = VendorApi::new(VendorConfig::default()).unwrap();
        let catalog = CatalogApi::new(api.clone());
        SessionEngine::new(api, catalog, OrderLog::ephemeral(), lots, "RUB".to_string())
    }

    fn steam_lot() -> LotConfig {
        LotConfig {
            lot_name: "Elden Ring (RU) Steam Gift".to_string(),
            game_name: "Elden Ring".to_string(),
            kind: LotKind::SteamGift { region: "RU".to_string() },
        }
    }

    /// A session already bound to a chat and awaiting its first field, inserted directly into the table.
    async fn awaiting_session(engine: &SessionEngine, id: &str, chat_id: i64, fields: Vec<FieldSpec>) {
        let kind = SessionKind::SteamGift { region: "RU".to_string(), app_id: Some(1), package_id: Some("p".to_string()) };
        let mut s = PurchaseSession::new(id.into(), Some(chat_id), "buyer".to_string(), kind, steam_lot());
        s.expected_fields = fields;
        s.advance(SessionStatus::ResolvingCatalog).unwrap();
        s.advance(SessionStatus::AwaitingInput(0)).unwrap();
        engine.table().insert(s).await.unwrap();
    }

    fn link_field() -> FieldSpec {
        FieldSpec { name: FRIEND_LINK_FIELD.to_string(), label: "Steam friend invite link".to_string() }
    }

    fn message(chat_id: i64, text: &str) -> IncomingMessage {
        IncomingMessage { chat_id, chat_name: "buyer".to_string(), text: text.to_string() }
    }

    #[tokio::test]
    async fn unknown_redeem_token_is_rejected() {
        let engine = engine(vec![]);
        let actions = engine.handle_redeem(&message(5, "!redeem nope1234"), "nope1234").await;
        assert_eq!(actions, vec![OutboundAction::chat(5, messages::redeem_unknown())]);
    }

    #[tokio::test]
    async fn call_admin_pages_the_operator() {
        let engine = engine(vec![]);
        let actions = engine.handle_call_admin(&message(5, "!callAdmin")).await;
        assert_eq!(actions.len(), 2);
        assert!(matches!(&actions[0], OutboundAction::SendChat { chat_id: 5, .. }));
        assert!(matches!(&actions[1], OutboundAction::Notify { .. }));
    }

    #[tokio::test]
    async fn messages_without_a_session_are_ignored() {
        let engine = engine(vec![]);
        assert!(engine.handle_message(&message(5, "hello")).await.is_empty());
    }

    #[tokio::test]
    async fn own_prompts_echoed_back_are_ignored() {
        let engine = engine(vec![]);
        awaiting_session(&engine, "o1", 5, vec![link_field()]).await;
        let echoed = messages::prompt_for(&link_field());
        assert!(engine.handle_message(&message(5, &echoed)).await.is_empty());
        // The slot was not consumed and the session is still claimable.
        let s = engine.table().claim_by_chat(5).await.unwrap();
        assert!(s.collected.is_empty());
    }

    #[tokio::test]
    async fn invalid_link_resends_the_prompt_without_consuming_the_slot() {
        let engine = engine(vec![]);
        awaiting_session(&engine, "o1", 5, vec![link_field()]).await;

        let actions = engine.handle_message(&message(5, "what do I do?")).await;
        assert_eq!(actions, vec![OutboundAction::chat(5, messages::invalid_input(&link_field()))]);

        let actions = engine.handle_message(&message(5, "https://s.team/p/xxxx-xxxx/xxxxx")).await;
        assert_eq!(actions, vec![OutboundAction::chat(5, messages::placeholder_link(&link_field()))]);

        let s = engine.table().claim_by_chat(5).await.unwrap();
        assert!(s.collected.is_empty());
        assert_eq!(s.status, SessionStatus::AwaitingInput(0));
    }

    #[tokio::test]
    async fn unresolvable_order_pages_the_operator_and_keeps_no_session() {
        let engine = engine(vec![]);
        let order = NewOrder {
            order_id: "o1".to_string(),
            chat_id: 9,
            chat_name: "buyer".to_string(),
            description: "Some Unknown Game".to_string(),
            price: None,
            created_at: Utc::now(),
        };
        let actions = engine.start_order(order).await;
        assert_eq!(actions.len(), 2);
        assert_eq!(actions[0], OutboundAction::chat(9, messages::resolution_failure()));
        assert!(matches!(&actions[1], OutboundAction::Notify { .. }));
        assert!(engine.table().is_empty().await);
    }

    #[tokio::test]
    async fn purging_an_idle_session_pages_the_operator() {
        let engine = engine(vec![]).with_session_ttl(Duration::minutes(10));
        awaiting_session(&engine, "o1", 5, vec![link_field()]).await;
        let mut s = engine.table().claim("o1").await.unwrap();
        s.last_activity = Utc::now() - Duration::minutes(11);
        engine.table().restore(s).await;

        let actions = engine.purge_expired().await;
        assert_eq!(actions.len(), 2);
        assert!(matches!(&actions[1], OutboundAction::Notify { .. }));
        assert!(engine.table().is_empty().await);
    }

    #[tokio::test]
    async fn redeemed_token_binds_the_chat_and_prompts() {
        let engine = engine(vec![]);
        let kind = SessionKind::SteamGift { region: "RU".to_string(), app_id: Some(1), package_id: Some("p".to_string()) };
        let mut s = PurchaseSession::new("tok12345".into(), None, String::new(), kind, steam_lot());
        s.expected_fields = vec![link_field()];
        s.advance(SessionStatus::ResolvingCatalog).unwrap();
        engine.table().insert(s).await.unwrap();

        let actions = engine.handle_redeem(&message(5, "!redeem tok12345"), "tok12345").await;
        assert_eq!(actions, vec![OutboundAction::chat(5, messages::prompt_for(&link_field()))]);
        let s = engine.table().claim_by_chat(5).await.unwrap();
        assert_eq!(s.chat_id, Some(5));
        assert_eq!(s.status, SessionStatus::AwaitingInput(0));
    }
}
