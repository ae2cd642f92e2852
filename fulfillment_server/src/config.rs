use std::{env, path::PathBuf};

use chrono::Duration;
use dgf_common::{helpers::parse_boolean_flag, Secret};
use fulfillment_engine::{balance::DEFAULT_GRACE_MINS, sync::DEFAULT_SYNC_CONCURRENCY};
use log::*;

const DEFAULT_CATEGORY: &str = "steam-gifts";
const DEFAULT_LOTS_FILE: &str = "lots.json";
const DEFAULT_SETTLEMENT_CURRENCY: &str = "RUB";
const DEFAULT_MARKUP_PERCENT: f64 = 15.0;
const DEFAULT_SYNC_INTERVAL_SECS: u64 = 900;
const DEFAULT_POLL_INTERVAL_SECS: u64 = 5;
const DEFAULT_BALANCE_THRESHOLD: f64 = 50.0;

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub marketplace: MarketplaceConfig,
    /// The chat id operator notifications are sent to. Notifications are logged-only when unset.
    pub admin_chat_id: Option<i64>,
    /// The marketplace category the account's listings live in.
    pub category: String,
    /// Path to the JSON lot configuration file.
    pub lots_file: PathBuf,
    pub markup_percent: f64,
    /// When false, USD-labelled catalog prices are taken at face value instead of running the mis-tag check.
    pub mistag_heuristic: bool,
    pub settlement_currency: String,
    pub sync_interval: Duration,
    pub sync_concurrency: usize,
    pub poll_interval: Duration,
    pub balance_threshold: f64,
    pub balance_grace: Duration,
    /// Where the delivered-order log is appended. In-memory only when unset.
    pub order_log: Option<PathBuf>,
}

#[derive(Clone, Debug)]
pub struct MarketplaceConfig {
    pub base_url: String,
    pub token: Secret<String>,
}

impl Default for MarketplaceConfig {
    fn default() -> Self {
        Self { base_url: "https://marketplace.example.com/api".to_string(), token: Secret::default() }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            marketplace: MarketplaceConfig::default(),
            admin_chat_id: None,
            category: DEFAULT_CATEGORY.to_string(),
            lots_file: PathBuf::from(DEFAULT_LOTS_FILE),
            markup_percent: DEFAULT_MARKUP_PERCENT,
            mistag_heuristic: true,
            settlement_currency: DEFAULT_SETTLEMENT_CURRENCY.to_string(),
            sync_interval: Duration::seconds(DEFAULT_SYNC_INTERVAL_SECS as i64),
            sync_concurrency: DEFAULT_SYNC_CONCURRENCY,
            poll_interval: Duration::seconds(DEFAULT_POLL_INTERVAL_SECS as i64),
            balance_threshold: DEFAULT_BALANCE_THRESHOLD,
            balance_grace: Duration::minutes(DEFAULT_GRACE_MINS),
            order_log: None,
        }
    }
}

impl ServerConfig {
    pub fn from_env_or_default() -> Self {
        let marketplace = MarketplaceConfig::from_env_or_default();
        let admin_chat_id = env::var("DGF_ADMIN_CHAT_ID").ok().and_then(|s| {
            s.parse::<i64>()
                .map_err(|e| {
                    error!("🪛️ {s} is not a valid chat id for DGF_ADMIN_CHAT_ID. {e} Notifications will be log-only.");
                })
                .ok()
        });
        if admin_chat_id.is_none() {
            warn!("🪛️ DGF_ADMIN_CHAT_ID is not set. Operator notifications will only appear in the log.");
        }
        let category = env::var("DGF_CATEGORY").ok().unwrap_or_else(|| DEFAULT_CATEGORY.into());
        let lots_file = env::var("DGF_LOTS_FILE").map(PathBuf::from).unwrap_or_else(|_| {
            warn!("🪛️ DGF_LOTS_FILE is not set. Using '{DEFAULT_LOTS_FILE}' in the working directory.");
            PathBuf::from(DEFAULT_LOTS_FILE)
        });
        let markup_percent = parse_var("DGF_MARKUP_PERCENT", DEFAULT_MARKUP_PERCENT);
        let mistag_heuristic = parse_boolean_flag(env::var("DGF_MISTAG_HEURISTIC").ok(), true);
        let settlement_currency =
            env::var("DGF_SETTLEMENT_CURRENCY").ok().unwrap_or_else(|| DEFAULT_SETTLEMENT_CURRENCY.into());
        let sync_interval = Duration::seconds(parse_var("DGF_SYNC_INTERVAL_SECS", DEFAULT_SYNC_INTERVAL_SECS) as i64);
        let sync_concurrency = parse_var("DGF_SYNC_CONCURRENCY", DEFAULT_SYNC_CONCURRENCY);
        let poll_interval = Duration::seconds(parse_var("DGF_POLL_INTERVAL_SECS", DEFAULT_POLL_INTERVAL_SECS) as i64);
        let balance_threshold = parse_var("DGF_BALANCE_THRESHOLD", DEFAULT_BALANCE_THRESHOLD);
        let balance_grace = Duration::minutes(parse_var("DGF_BALANCE_GRACE_MINS", DEFAULT_GRACE_MINS));
        let order_log = env::var("DGF_ORDER_LOG").ok().map(PathBuf::from);
        if order_log.is_none() {
            warn!("🪛️ DGF_ORDER_LOG is not set. The delivered-order log will not survive restarts.");
        }
        Self {
            marketplace,
            admin_chat_id,
            category,
            lots_file,
            markup_percent,
            mistag_heuristic,
            settlement_currency,
            sync_interval,
            sync_concurrency,
            poll_interval,
            balance_threshold,
            balance_grace,
            order_log,
        }
    }
}

impl MarketplaceConfig {
    pub fn from_env_or_default() -> Self {
        let base_url = env::var("DGF_MARKETPLACE_URL")
            .map(|s| s.trim_end_matches('/').to_string())
            .unwrap_or_else(|_| {
                warn!("🪛️ DGF_MARKETPLACE_URL is not set, using (probably useless) default");
                MarketplaceConfig::default().base_url
            });
        let token = Secret::new(env::var("DGF_MARKETPLACE_TOKEN").unwrap_or_else(|_| {
            warn!("🪛️ DGF_MARKETPLACE_TOKEN is not set. Marketplace requests will not be authenticated.");
            String::default()
        }));
        Self { base_url, token }
    }
}

fn parse_var<T: std::str::FromStr>(name: &str, default: T) -> T
where T::Err: std::fmt::Display {
    match env::var(name) {
        Ok(s) => s.parse::<T>().unwrap_or_else(|e| {
            error!("🪛️ {s} is not a valid value for {name}. {e} Using the default instead.");
            default
        }),
        Err(_) => default,
    }
}
