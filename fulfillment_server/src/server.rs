//! Wires the engine, the vendor client and the marketplace client together and runs the workers.

use std::path::Path;

use fulfillment_engine::{
    balance::BalanceMonitor,
    catalog::CatalogApi,
    data_types::LotConfig,
    exchange::CurrencyConverter,
    orders::OrderLog,
    pricing::{PricingConfig, PricingEngine},
    sessions::SessionEngine,
    sync::SyncScheduler,
};
use log::*;
use vendor_tools::{VendorApi, VendorConfig};

use crate::{
    balance_worker::start_balance_worker,
    chat_worker::start_chat_worker,
    config::ServerConfig,
    errors::ServerError,
    expiry_worker::start_expiry_worker,
    integrations::{fx::FxClient, marketplace::MarketplaceClient, notify::ChatNotifier},
    sync_worker::start_sync_worker,
};

/// Builds every component from the configuration, starts the workers and runs until interrupted.
pub async fn run_server(config: ServerConfig) -> Result<(), ServerError> {
    let lots = load_lots(&config.lots_file)?;
    info!("🚀️ Loaded {} lot configurations from {}", lots.len(), config.lots_file.display());

    let vendor = VendorApi::new(VendorConfig::new_from_env_or_default())
        .map_err(|e| ServerError::InitializeError(e.to_string()))?;
    let catalog = CatalogApi::new(vendor.clone());
    let marketplace = MarketplaceClient::new(config.marketplace.clone())?;
    let notifier = ChatNotifier::new(marketplace.clone(), config.admin_chat_id);

    let orders = match &config.order_log {
        Some(path) => OrderLog::new(path.clone()),
        None => OrderLog::ephemeral(),
    };
    let engine = SessionEngine::new(
        vendor.clone(),
        catalog.clone(),
        orders,
        lots.clone(),
        config.settlement_currency.clone(),
    );

    let fx = FxClient::from_env_or_default().map_err(|e| ServerError::InitializeError(e.to_string()))?;
    let pricing_config = PricingConfig {
        markup_percent: config.markup_percent,
        settlement_currency: config.settlement_currency.clone(),
        mistag_threshold: if config.mistag_heuristic { PricingConfig::default().mistag_threshold } else { None },
        ..PricingConfig::default()
    };
    let pricing = PricingEngine::new(catalog, CurrencyConverter::new(fx), pricing_config);
    let scheduler = SyncScheduler::new(marketplace.clone(), pricing, config.category.clone(), lots)
        .with_concurrency(config.sync_concurrency);
    let monitor = BalanceMonitor::new(config.balance_threshold).with_grace(config.balance_grace);

    let _chat = start_chat_worker(engine.clone(), marketplace.clone(), notifier.clone(), config.poll_interval);
    let _sync = start_sync_worker(scheduler, notifier.clone(), config.sync_interval);
    let _balance =
        start_balance_worker(vendor, marketplace.clone(), notifier.clone(), monitor, config.category.clone());
    let _expiry = start_expiry_worker(engine, marketplace, notifier);
    info!("🚀️ All workers running");

    tokio::signal::ctrl_c().await?;
    info!("🚀️ Interrupt received, shutting down");
    Ok(())
}

fn load_lots(path: &Path) -> Result<Vec<LotConfig>, ServerError> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| ServerError::LotConfigError(format!("Could not read {}: {e}", path.display())))?;
    let lots: Vec<LotConfig> =
        serde_json::from_str(&raw).map_err(|e| ServerError::LotConfigError(e.to_string()))?;
    if lots.is_empty() {
        warn!("🚀️ The lot configuration at {} is empty. Nothing will be matched or synced.", path.display());
    }
    Ok(lots)
}

#[cfg(test)]
mod test {
    use std::io::Write;

    use super::*;

    #[test]
    fn lots_load_from_a_json_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"[
                {{"lot_name": "Elden Ring (RU)", "game_name": "Elden Ring", "type": "steam_gift", "region": "RU"}},
                {{"lot_name": "PUBG 60 UC", "game_name": "PUBG Mobile", "type": "mobile_refill", "amount_label": "60 UC"}}
            ]"#
        )
        .unwrap();
        let lots = load_lots(file.path()).unwrap();
        assert_eq!(lots.len(), 2);
        assert!(lots[0].is_steam());
    }

    #[test]
    fn a_missing_lots_file_is_a_configuration_error() {
        let err = load_lots(Path::new("/definitely/not/here.json")).unwrap_err();
        assert!(matches!(err, ServerError::LotConfigError(_)));
    }
}
