//! TTL-cached facade over the vendor catalog endpoints.
//!
//! Catalog listings change rarely, so each list and each detail entry is cached for an hour. The caches are
//! mutex-guarded single slots (plus a per-id map for details); callers always receive a copy of the cached data and
//! never a reference into it. When an entry is stale and another task is already refreshing, callers that did not ask
//! for a forced refresh are served the stale copy instead of piling onto the vendor.

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
        Mutex,
    },
};

use chrono::{DateTime, Duration, Utc};
use log::*;
use thiserror::Error;
use vendor_tools::{GameDetail, GameSummary, MobileGameDetail, MobileGameSummary, VendorApi, VendorApiError};

use crate::data_types::{CatalogGame, MobileCatalogGame};

pub const DEFAULT_CATALOG_TTL_SECS: i64 = 3600;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Vendor API error: {0}")]
    Vendor(#[from] VendorApiError),
}

/// The vendor calls the catalog facade is built on. [`VendorApi`] is the production source.
#[allow(async_fn_in_trait)]
pub trait CatalogSource: Clone + Send + Sync {
    async fn games(&self) -> Result<Vec<GameSummary>, VendorApiError>;
    async fn game(&self, id: u32) -> Result<GameDetail, VendorApiError>;
    async fn mobile_games(&self) -> Result<Vec<MobileGameSummary>, VendorApiError>;
    async fn mobile_game(&self, id: u32) -> Result<MobileGameDetail, VendorApiError>;
}

impl CatalogSource for VendorApi {
    async fn games(&self) -> Result<Vec<GameSummary>, VendorApiError> {
        VendorApi::games(self).await
    }

    async fn game(&self, id: u32) -> Result<GameDetail, VendorApiError> {
        VendorApi::game(self, id).await
    }

    async fn mobile_games(&self) -> Result<Vec<MobileGameSummary>, VendorApiError> {
        VendorApi::mobile_games(self).await
    }

    async fn mobile_game(&self, id: u32) -> Result<MobileGameDetail, VendorApiError> {
        VendorApi::mobile_game(self, id).await
    }
}

#[derive(Default)]
struct Slot<T> {
    data: Option<(T, DateTime<Utc>)>,
}

impl<T: Clone> Slot<T> {
    fn get(&self, now: DateTime<Utc>, ttl: Duration) -> Option<(T, bool)> {
        self.data.as_ref().map(|(data, at)| (data.clone(), now - *at < ttl))
    }

    fn put(&mut self, data: T, now: DateTime<Utc>) {
        self.data = Some((data, now));
    }
}

#[derive(Clone)]
pub struct CatalogApi<S: CatalogSource = VendorApi> {
    api: S,
    ttl: Duration,
    games: Arc<Mutex<Slot<Vec<GameSummary>>>>,
    game_details: Arc<Mutex<HashMap<u32, (CatalogGame, DateTime<Utc>)>>>,
    mobile_games: Arc<Mutex<Slot<Vec<MobileGameSummary>>>>,
    mobile_details: Arc<Mutex<HashMap<u32, (MobileCatalogGame, DateTime<Utc>)>>>,
    refreshing: Arc<AtomicBool>,
}

impl CatalogApi {
    pub fn vendor(&self) -> &VendorApi {
        &self.api
    }
}

impl<S: CatalogSource> CatalogApi<S> {
    pub fn new(api: S) -> Self {
        Self::with_ttl(api, Duration::seconds(DEFAULT_CATALOG_TTL_SECS))
    }

    pub fn with_ttl(api: S, ttl: Duration) -> Self {
        Self {
            api,
            ttl,
            games: Arc::new(Mutex::new(Slot::default())),
            game_details: Arc::new(Mutex::new(HashMap::new())),
            mobile_games: Arc::new(Mutex::new(Slot::default())),
            mobile_details: Arc::new(Mutex::new(HashMap::new())),
            refreshing: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Lists the Steam game catalog. `force_refresh` bypasses both the TTL and the stale-while-refreshing shortcut.
    pub async fn games(&self, force_refresh: bool) -> Result<Vec<GameSummary>, CatalogError> {
        let now = Utc::now();
        let cached = self.games.lock().unwrap().get(now, self.ttl);
        if let Some((games, fresh)) = cached {
            if !force_refresh && (fresh || self.refreshing.load(Ordering::SeqCst)) {
                if !fresh {
                    debug!("📦️ Serving stale game list while a refresh is in flight");
                }
                return Ok(games);
            }
        }
        self.refreshing.store(true, Ordering::SeqCst);
        let result = self.api.games().await;
        self.refreshing.store(false, Ordering::SeqCst);
        let games = result?;
        self.games.lock().unwrap().put(games.clone(), Utc::now());
        Ok(games)
    }

    /// Fetches one game's editions and prices, serving a cached copy inside the TTL window.
    pub async fn game_detail(&self, id: u32) -> Result<CatalogGame, CatalogError> {
        let now = Utc::now();
        let cached = self.game_details.lock().unwrap().get(&id).map(|(g, at)| (g.clone(), now - *at < self.ttl));
        if let Some((game, true)) = cached {
            return Ok(game);
        }
        let game = CatalogGame::from(self.api.game(id).await?);
        self.game_details.lock().unwrap().insert(id, (game.clone(), Utc::now()));
        Ok(game)
    }

    pub async fn mobile_games(&self, force_refresh: bool) -> Result<Vec<MobileGameSummary>, CatalogError> {
        let now = Utc::now();
        let cached = self.mobile_games.lock().unwrap().get(now, self.ttl);
        if let Some((games, fresh)) = cached {
            if !force_refresh && (fresh || self.refreshing.load(Ordering::SeqCst)) {
                return Ok(games);
            }
        }
        let games = self.api.mobile_games().await?;
        self.mobile_games.lock().unwrap().put(games.clone(), Utc::now());
        Ok(games)
    }

    pub async fn mobile_game(&self, id: u32) -> Result<MobileCatalogGame, CatalogError> {
        let now = Utc::now();
        let cached = self.mobile_details.lock().unwrap().get(&id).map(|(g, at)| (g.clone(), now - *at < self.ttl));
        if let Some((game, true)) = cached {
            return Ok(game);
        }
        let game = MobileCatalogGame::from(self.api.mobile_game(id).await?);
        self.mobile_details.lock().unwrap().insert(id, (game.clone(), Utc::now()));
        Ok(game)
    }

    /// Warms the list caches. Used once per sync run so that individual lots don't each pay for a catalog fetch.
    pub async fn preload(&self) -> Result<(), CatalogError> {
        let games = self.games(false).await?;
        let mobile = self.mobile_games(false).await?;
        info!("📦️ Catalog preloaded: {} games, {} mobile games", games.len(), mobile.len());
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use std::sync::atomic::AtomicUsize;

    use tokio::sync::Notify;

    use super::*;

    /// Counts fetches and optionally blocks them on a gate so tests can hold a refresh in flight.
    #[derive(Clone, Default)]
    struct FakeSource {
        fetches: Arc<AtomicUsize>,
        gate: Arc<Mutex<Option<Arc<Notify>>>>,
    }

    impl FakeSource {
        fn fetches(&self) -> usize {
            self.fetches.load(Ordering::SeqCst)
        }

        fn hold_fetches(&self) -> Arc<Notify> {
            let gate = Arc::new(Notify::new());
            *self.gate.lock().unwrap() = Some(gate.clone());
            gate
        }

        async fn fetched(&self) {
            let gate = self.gate.lock().unwrap().clone();
            if let Some(gate) = gate {
                gate.notified().await;
            }
            self.fetches.fetch_add(1, Ordering::SeqCst);
        }
    }

    impl CatalogSource for FakeSource {
        async fn games(&self) -> Result<Vec<GameSummary>, VendorApiError> {
            self.fetched().await;
            Ok(vec![GameSummary { id: 1, name: "Elden Ring".to_string() }])
        }

        async fn game(&self, _id: u32) -> Result<GameDetail, VendorApiError> {
            self.fetched().await;
            Ok(GameDetail { id: 1, name: "Elden Ring".to_string(), editions: vec![] })
        }

        async fn mobile_games(&self) -> Result<Vec<MobileGameSummary>, VendorApiError> {
            self.fetched().await;
            Ok(vec![])
        }

        async fn mobile_game(&self, id: u32) -> Result<MobileGameDetail, VendorApiError> {
            self.fetched().await;
            Ok(MobileGameDetail { id, name: "PUBG Mobile".to_string(), positions: vec![] })
        }
    }

    #[tokio::test]
    async fn lists_are_cached_within_the_ttl() {
        let source = FakeSource::default();
        let catalog = CatalogApi::new(source.clone());
        let mut games = catalog.games(false).await.unwrap();
        assert_eq!(source.fetches(), 1);
        // The caller owns its copy; mangling it must not leak into the cache.
        games.clear();
        let games = catalog.games(false).await.unwrap();
        assert_eq!(games.len(), 1);
        assert_eq!(source.fetches(), 1);

        catalog.game_detail(1).await.unwrap();
        catalog.game_detail(1).await.unwrap();
        assert_eq!(source.fetches(), 2);
    }

    #[tokio::test]
    async fn force_refresh_bypasses_a_fresh_cache() {
        let source = FakeSource::default();
        let catalog = CatalogApi::new(source.clone());
        catalog.games(false).await.unwrap();
        catalog.games(true).await.unwrap();
        assert_eq!(source.fetches(), 2);
    }

    #[tokio::test]
    async fn expired_entries_are_refetched() {
        let source = FakeSource::default();
        let catalog = CatalogApi::with_ttl(source.clone(), Duration::zero());
        catalog.games(false).await.unwrap();
        catalog.games(false).await.unwrap();
        assert_eq!(source.fetches(), 2);
    }

    #[tokio::test]
    async fn stale_lists_are_served_while_a_refresh_is_in_flight() {
        let source = FakeSource::default();
        let catalog = CatalogApi::with_ttl(source.clone(), Duration::zero());
        catalog.games(false).await.unwrap();
        assert_eq!(source.fetches(), 1);

        let gate = source.hold_fetches();
        let refresher = {
            let catalog = catalog.clone();
            tokio::spawn(async move { catalog.games(false).await })
        };
        while !catalog.refreshing.load(Ordering::SeqCst) {
            tokio::task::yield_now().await;
        }
        // The blocked refresh holds the flag, so this call gets the stale copy without fetching.
        let games = catalog.games(false).await.unwrap();
        assert_eq!(games.len(), 1);
        assert_eq!(source.fetches(), 1);

        gate.notify_one();
        refresher.await.unwrap().unwrap();
        assert_eq!(source.fetches(), 2);
    }
}
