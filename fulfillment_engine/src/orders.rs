//! The append-only order record log.
//!
//! One record per successfully delivered order, written exactly once and never mutated. Records are mirrored into a
//! JSON-lines file so the operator keeps a delivery history across restarts; everything else about a session is
//! deliberately in-memory only.

use std::{
    fs::OpenOptions,
    io::Write,
    path::PathBuf,
    sync::{Arc, Mutex},
};

use log::*;
use thiserror::Error;

use crate::data_types::OrderRecord;

#[derive(Debug, Error)]
pub enum OrderLogError {
    #[error("Could not serialize order record: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("Could not write order record: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Clone, Default)]
pub struct OrderLog {
    path: Option<PathBuf>,
    records: Arc<Mutex<Vec<OrderRecord>>>,
}

impl OrderLog {
    /// An in-memory log without file persistence. Used in tests.
    pub fn ephemeral() -> Self {
        Self::default()
    }

    pub fn new(path: PathBuf) -> Self {
        Self { path: Some(path), records: Arc::new(Mutex::new(Vec::new())) }
    }

    /// Appends one record. The in-memory mirror always gets the record; a file write failure is reported but does not
    /// undo the append.
    pub fn append(&self, record: OrderRecord) -> Result<(), OrderLogError> {
        info!("🧾️ Recording order {} ({}, {} {})", record.order_id, record.game_name, record.price, record.currency);
        self.records.lock().unwrap().push(record.clone());
        if let Some(path) = &self.path {
            let line = serde_json::to_string(&record)?;
            let mut file = OpenOptions::new().create(true).append(true).open(path)?;
            writeln!(file, "{line}")?;
        }
        Ok(())
    }

    /// A snapshot copy of all records.
    pub fn all(&self) -> Vec<OrderRecord> {
        self.records.lock().unwrap().clone()
    }

    pub fn len(&self) -> usize {
        self.records.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod test {
    use chrono::Utc;
    use dgf_common::Money;

    use super::*;
    use crate::data_types::OrderKind;

    fn record(id: &str) -> OrderRecord {
        OrderRecord {
            order_id: id.to_string(),
            kind: OrderKind::SteamGift,
            game_name: "Elden Ring".to_string(),
            price: Money::from_units(60),
            currency: "RUB".to_string(),
            transaction_id: Some("tx-1".to_string()),
            status: "completed".to_string(),
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn appends_are_visible_in_order() {
        let log = OrderLog::ephemeral();
        log.append(record("a")).unwrap();
        log.append(record("b")).unwrap();
        let all = log.all();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].order_id, "a");
        assert_eq!(all[1].order_id, "b");
    }

    #[test]
    fn records_survive_as_json_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("orders.jsonl");
        let log = OrderLog::new(path.clone());
        log.append(record("a")).unwrap();
        log.append(record("b")).unwrap();
        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        let first: OrderRecord = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first.order_id, "a");
    }
}
