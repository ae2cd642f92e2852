//! Vendor balance monitoring.
//!
//! A pure state machine: feed it balance readings, get back the actions to take. When the balance stays below the
//! configured threshold for longer than the grace period, all listings are deactivated so buyers cannot pay for
//! orders the vendor would reject. When the balance recovers, exactly the listings that were deactivated come back;
//! listings the operator disabled by hand are never touched.

use chrono::{DateTime, Duration, Utc};
use log::*;

pub const DEFAULT_GRACE_MINS: i64 = 15;

/// What the caller must do after a balance reading.
#[derive(Debug, Clone, PartialEq)]
pub enum BalanceAction {
    /// The balance went up since the last reading; tell the operator their top-up landed.
    NotifyRise { from: f64, to: f64 },
    /// The balance dropped below the threshold; warn the operator before anything is deactivated.
    WarnLow { balance: f64 },
    /// The balance stayed low past the grace period; deactivate every active listing and report the snapshot back
    /// through [`BalanceMonitor::confirm_deactivated`].
    DeactivateAll,
    /// The balance recovered; reactivate exactly these listings.
    Reactivate(Vec<String>),
}

pub struct BalanceMonitor {
    threshold: f64,
    grace: Duration,
    last_balance: Option<f64>,
    low_since: Option<DateTime<Utc>>,
    deactivation_requested: bool,
    /// Listing ids deactivated by this monitor, and nothing else.
    deactivated: Option<Vec<String>>,
}

impl BalanceMonitor {
    pub fn new(threshold: f64) -> Self {
        Self {
            threshold,
            grace: Duration::minutes(DEFAULT_GRACE_MINS),
            last_balance: None,
            low_since: None,
            deactivation_requested: false,
            deactivated: None,
        }
    }

    pub fn with_grace(mut self, grace: Duration) -> Self {
        self.grace = grace;
        self
    }

    /// Processes one balance reading.
    pub fn tick(&mut self, balance: f64, now: DateTime<Utc>) -> Vec<BalanceAction> {
        let mut actions = Vec::new();
        if let Some(prev) = self.last_balance {
            if balance > prev {
                info!("💰️ Balance rose from {prev:.2} to {balance:.2}");
                actions.push(BalanceAction::NotifyRise { from: prev, to: balance });
            }
        }
        self.last_balance = Some(balance);

        if balance < self.threshold {
            match self.low_since {
                None => {
                    warn!("💰️ Balance {balance:.2} is below the threshold {:.2}", self.threshold);
                    self.low_since = Some(now);
                    actions.push(BalanceAction::WarnLow { balance });
                },
                Some(since) if now - since >= self.grace && !self.deactivation_requested => {
                    warn!("💰️ Balance still low after {} minutes, deactivating listings", self.grace.num_minutes());
                    self.deactivation_requested = true;
                    actions.push(BalanceAction::DeactivateAll);
                },
                Some(_) => {},
            }
        } else {
            self.low_since = None;
            self.deactivation_requested = false;
            if let Some(ids) = self.deactivated.take() {
                info!("💰️ Balance recovered to {balance:.2}, reactivating {} listings", ids.len());
                actions.push(BalanceAction::Reactivate(ids));
            }
        }
        actions
    }

    /// Records which listings were actually deactivated; only these are reactivated on recovery.
    pub fn confirm_deactivated(&mut self, listing_ids: Vec<String>) {
        self.deactivated = Some(listing_ids);
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn ids(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn low_balance_warns_then_deactivates_after_the_grace_period() {
        let mut m = BalanceMonitor::new(10.0).with_grace(Duration::minutes(15));
        let t0 = Utc::now();
        assert_eq!(m.tick(5.0, t0), vec![BalanceAction::WarnLow { balance: 5.0 }]);
        // Still inside the grace window.
        assert!(m.tick(5.0, t0 + Duration::minutes(10)).is_empty());
        assert_eq!(m.tick(5.0, t0 + Duration::minutes(16)), vec![BalanceAction::DeactivateAll]);
        // Deactivation is requested once, not on every subsequent reading.
        assert!(m.tick(5.0, t0 + Duration::minutes(17)).is_empty());
    }

    #[test]
    fn recovery_within_the_grace_period_cancels_deactivation() {
        let mut m = BalanceMonitor::new(10.0).with_grace(Duration::minutes(15));
        let t0 = Utc::now();
        m.tick(5.0, t0);
        let actions = m.tick(50.0, t0 + Duration::minutes(5));
        assert_eq!(actions, vec![BalanceAction::NotifyRise { from: 5.0, to: 50.0 }]);
        // The clock restarts if the balance dips again.
        assert_eq!(m.tick(5.0, t0 + Duration::minutes(20)), vec![BalanceAction::WarnLow { balance: 5.0 }]);
    }

    #[test]
    fn reactivation_uses_exactly_the_deactivation_snapshot() {
        let mut m = BalanceMonitor::new(10.0).with_grace(Duration::minutes(0));
        let t0 = Utc::now();
        m.tick(5.0, t0);
        assert_eq!(m.tick(5.0, t0 + Duration::seconds(1)), vec![BalanceAction::DeactivateAll]);
        m.confirm_deactivated(ids(&["a", "b"]));

        let actions = m.tick(50.0, t0 + Duration::minutes(1));
        assert_eq!(
            actions,
            vec![
                BalanceAction::NotifyRise { from: 5.0, to: 50.0 },
                BalanceAction::Reactivate(ids(&["a", "b"])),
            ]
        );
        // A second recovery reading has nothing left to reactivate.
        assert!(m.tick(60.0, t0 + Duration::minutes(2)) == vec![BalanceAction::NotifyRise { from: 50.0, to: 60.0 }]);
    }

    #[test]
    fn rises_are_reported_even_while_healthy() {
        let mut m = BalanceMonitor::new(10.0);
        let t0 = Utc::now();
        assert!(m.tick(100.0, t0).is_empty());
        assert_eq!(m.tick(150.0, t0 + Duration::minutes(1)), vec![BalanceAction::NotifyRise { from: 100.0, to: 150.0 }]);
        assert!(m.tick(150.0, t0 + Duration::minutes(2)).is_empty());
    }
}
