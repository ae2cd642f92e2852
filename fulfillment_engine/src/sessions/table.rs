//! In-memory session store with claim/restore ownership.
//!
//! A worker that wants to mutate a session first *claims* it, which removes it from the table. While claimed, no
//! other worker can see it; the claimer puts it back with *restore* unless the session reached a terminal state.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use log::*;
use tokio::sync::Mutex;

use super::session::{PurchaseSession, SessionError, SessionStatus};

#[derive(Clone, Default)]
pub struct SessionTable {
    sessions: Arc<Mutex<HashMap<String, PurchaseSession>>>,
}

impl SessionTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, session: PurchaseSession) -> Result<(), SessionError> {
        let mut table = self.sessions.lock().await;
        let key = session.id.as_str().to_string();
        if table.contains_key(&key) {
            return Err(SessionError::DuplicateSession(session.id));
        }
        trace!("🛒 Session {key} added to the table");
        table.insert(key, session);
        Ok(())
    }

    /// Removes and returns the session with the given id, transferring ownership to the caller.
    pub async fn claim(&self, id: &str) -> Option<PurchaseSession> {
        self.sessions.lock().await.remove(id)
    }

    /// Claims the session currently awaiting input from the given chat, if any.
    pub async fn claim_by_chat(&self, chat_id: i64) -> Option<PurchaseSession> {
        let mut table = self.sessions.lock().await;
        let key = table
            .iter()
            .find(|(_, s)| s.chat_id == Some(chat_id) && matches!(s.status, SessionStatus::AwaitingInput(_)))
            .map(|(k, _)| k.clone())?;
        table.remove(&key)
    }

    /// Puts a claimed session back. Terminal sessions are dropped instead of being re-inserted.
    pub async fn restore(&self, session: PurchaseSession) {
        if session.status.is_terminal() {
            debug!("🛒 Session {} finished with status {}", session.id, session.status);
            return;
        }
        self.sessions.lock().await.insert(session.id.as_str().to_string(), session);
    }

    /// Removes every session idle for longer than `ttl` and returns them.
    pub async fn purge_expired(&self, now: DateTime<Utc>, ttl: Duration) -> Vec<PurchaseSession> {
        let mut table = self.sessions.lock().await;
        let expired_keys = table
            .iter()
            .filter(|(_, s)| s.is_expired(now, ttl))
            .map(|(k, _)| k.clone())
            .collect::<Vec<_>>();
        expired_keys.into_iter().filter_map(|k| table.remove(&k)).collect()
    }

    pub async fn len(&self) -> usize {
        self.sessions.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.lock().await.is_empty()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::data_types::{LotConfig, LotKind};
    use crate::sessions::session::SessionKind;

    fn session(id: &str, chat_id: Option<i64>) -> PurchaseSession {
        let lot = LotConfig {
            lot_name: "Elden Ring".to_string(),
            game_name: "Elden Ring".to_string(),
            kind: LotKind::SteamGift { region: "RU".to_string() },
        };
        let kind = SessionKind::SteamGift { region: "RU".to_string(), app_id: None, package_id: None };
        PurchaseSession::new(id.into(), chat_id, "buyer".to_string(), kind, lot)
    }

    #[tokio::test]
    async fn claim_removes_and_restore_reinserts() {
        let table = SessionTable::new();
        table.insert(session("s1", Some(1))).await.unwrap();
        let s = table.claim("s1").await.unwrap();
        assert!(table.claim("s1").await.is_none());
        table.restore(s).await;
        assert_eq!(table.len().await, 1);
    }

    #[tokio::test]
    async fn duplicate_ids_are_rejected() {
        let table = SessionTable::new();
        table.insert(session("s1", Some(1))).await.unwrap();
        assert!(matches!(table.insert(session("s1", Some(2))).await, Err(SessionError::DuplicateSession(_))));
    }

    #[tokio::test]
    async fn claim_by_chat_only_sees_awaiting_sessions() {
        let table = SessionTable::new();
        // Still in Created, so not claimable by chat.
        table.insert(session("s1", Some(5))).await.unwrap();
        assert!(table.claim_by_chat(5).await.is_none());

        let mut awaiting = session("s2", Some(5));
        awaiting.expected_fields =
            vec![vendor_tools::FieldSpec { name: "link".to_string(), label: "link".to_string() }];
        awaiting.advance(SessionStatus::ResolvingCatalog).unwrap();
        awaiting.advance(SessionStatus::AwaitingInput(0)).unwrap();
        table.insert(awaiting).await.unwrap();
        let claimed = table.claim_by_chat(5).await.unwrap();
        assert_eq!(claimed.id.as_str(), "s2");
        assert_eq!(table.len().await, 1);
    }

    #[tokio::test]
    async fn terminal_sessions_are_not_restored() {
        let table = SessionTable::new();
        let mut s = session("s1", Some(1));
        s.advance(SessionStatus::Failed).unwrap();
        table.restore(s).await;
        assert!(table.is_empty().await);
    }

    #[tokio::test]
    async fn purge_expired_returns_only_stale_sessions() {
        let table = SessionTable::new();
        let mut stale = session("old", Some(1));
        stale.last_activity = Utc::now() - Duration::minutes(11);
        table.insert(stale).await.unwrap();
        table.insert(session("fresh", Some(2))).await.unwrap();

        let purged = table.purge_expired(Utc::now(), Duration::minutes(10)).await;
        assert_eq!(purged.len(), 1);
        assert_eq!(purged[0].id.as_str(), "old");
        assert_eq!(table.len().await, 1);
    }
}
