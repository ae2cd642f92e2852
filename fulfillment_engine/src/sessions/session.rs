//! The per-order conversation state machine.

use std::fmt::Display;

use chrono::{DateTime, Duration, Utc};
use dgf_common::Money;
use thiserror::Error;
use vendor_tools::FieldSpec;

use super::messages::FRIEND_LINK_FIELD;
use crate::data_types::LotConfig;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Illegal backward transition {from} → {to}")]
    BackwardTransition { from: SessionStatus, to: SessionStatus },
    #[error("Session is not awaiting input")]
    NotAwaitingInput,
    #[error("Session {0} already exists")]
    DuplicateSession(SessionId),
    #[error("All expected fields have already been collected")]
    TooManyFields,
}

//--------------------------------------     SessionId       ---------------------------------------------------------

/// A marketplace order id, or a generated token for test purchases.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionId(String);

impl<S: Into<String>> From<S> for SessionId {
    fn from(value: S) -> Self {
        Self(value.into())
    }
}

impl Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl SessionId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

//--------------------------------------    SessionStatus    ---------------------------------------------------------

/// Session lifecycle. A session only ever moves forward through these states; `AwaitingInput(i)` advances through
/// the expected-field indices one at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    Created,
    ResolvingCatalog,
    AwaitingInput(usize),
    Delivering,
    Completed,
    Failed,
}

impl SessionStatus {
    fn rank(&self) -> u8 {
        match self {
            SessionStatus::Created => 0,
            SessionStatus::ResolvingCatalog => 1,
            SessionStatus::AwaitingInput(_) => 2,
            SessionStatus::Delivering => 3,
            SessionStatus::Completed | SessionStatus::Failed => 4,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.rank() == 4
    }

    fn allows(&self, next: &SessionStatus) -> bool {
        match (self, next) {
            (SessionStatus::AwaitingInput(i), SessionStatus::AwaitingInput(j)) => *j == i + 1,
            (from, to) => to.rank() > from.rank(),
        }
    }
}

impl Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionStatus::Created => write!(f, "created"),
            SessionStatus::ResolvingCatalog => write!(f, "resolving_catalog"),
            SessionStatus::AwaitingInput(i) => write!(f, "awaiting_input[{i}]"),
            SessionStatus::Delivering => write!(f, "delivering"),
            SessionStatus::Completed => write!(f, "completed"),
            SessionStatus::Failed => write!(f, "failed"),
        }
    }
}

//--------------------------------------    SessionKind      ---------------------------------------------------------

/// The delivery variant with its resolved catalog identifiers. Identifiers are filled in during catalog resolution.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionKind {
    SteamGift { region: String, app_id: Option<u32>, package_id: Option<String> },
    MobileRefill { game_id: Option<u32>, position_id: Option<u32> },
}

/// The default field set for a Steam gift: only the friend invite link.
pub fn steam_fields() -> Vec<FieldSpec> {
    vec![FieldSpec { name: FRIEND_LINK_FIELD.to_string(), label: "Steam friend invite link".to_string() }]
}

//--------------------------------------   PurchaseSession   ---------------------------------------------------------

/// What [`PurchaseSession::record_field`] tells the caller to do next.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldOutcome {
    /// Ask the buyer for the next field.
    NextPrompt(FieldSpec),
    /// All fields collected; the session has advanced to `Delivering`.
    ReadyToDeliver,
}

/// One in-flight buyer conversation: a real order or a test purchase.
#[derive(Debug, Clone)]
pub struct PurchaseSession {
    pub id: SessionId,
    /// Unbound (`None`) for a test purchase until the buyer redeems its token.
    pub chat_id: Option<i64>,
    pub chat_name: String,
    pub kind: SessionKind,
    pub status: SessionStatus,
    /// Fields to collect, in the order they are asked for.
    pub expected_fields: Vec<FieldSpec>,
    /// Collected `(field name, value)` pairs, insertion order preserved. Never longer than `expected_fields`.
    pub collected: Vec<(String, String)>,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
    /// Snapshot of the lot configuration at session creation.
    pub lot: LotConfig,
    /// The marketplace sale price, when known (real orders).
    pub price: Option<Money>,
}

impl PurchaseSession {
    pub fn new(id: SessionId, chat_id: Option<i64>, chat_name: String, kind: SessionKind, lot: LotConfig) -> Self {
        let now = Utc::now();
        Self {
            id,
            chat_id,
            chat_name,
            kind,
            status: SessionStatus::Created,
            expected_fields: Vec::new(),
            collected: Vec::new(),
            created_at: now,
            last_activity: now,
            lot,
            price: None,
        }
    }

    /// Advances the state machine, rejecting any backward transition.
    pub fn advance(&mut self, next: SessionStatus) -> Result<(), SessionError> {
        if !self.status.allows(&next) {
            return Err(SessionError::BackwardTransition { from: self.status, to: next });
        }
        self.status = next;
        Ok(())
    }

    /// The field the session is currently waiting for.
    pub fn current_field(&self) -> Option<&FieldSpec> {
        match self.status {
            SessionStatus::AwaitingInput(i) => self.expected_fields.get(i),
            _ => None,
        }
    }

    /// Stores a validated buyer value under the current field and advances the machine.
    pub fn record_field(&mut self, value: String) -> Result<FieldOutcome, SessionError> {
        let index = match self.status {
            SessionStatus::AwaitingInput(i) => i,
            _ => return Err(SessionError::NotAwaitingInput),
        };
        let field = self.expected_fields.get(index).ok_or(SessionError::TooManyFields)?;
        debug_assert!(self.collected.len() == index);
        self.collected.push((field.name.clone(), value));
        self.touch();
        if index + 1 < self.expected_fields.len() {
            self.advance(SessionStatus::AwaitingInput(index + 1))?;
            Ok(FieldOutcome::NextPrompt(self.expected_fields[index + 1].clone()))
        } else {
            self.advance(SessionStatus::Delivering)?;
            Ok(FieldOutcome::ReadyToDeliver)
        }
    }

    /// The collected value for a field name, if present.
    pub fn field_value(&self, name: &str) -> Option<&str> {
        self.collected.iter().find(|(n, _)| n == name).map(|(_, v)| v.as_str())
    }

    pub fn touch(&mut self) {
        self.last_activity = Utc::now();
    }

    pub fn is_expired(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        now - self.last_activity > ttl
    }
}
