//! Matching marketplace listings to configured lots, and lots to their catalog game.

use log::*;

use crate::{
    catalog::{CatalogApi, CatalogError},
    data_types::{CatalogGame, LotConfig, LotKind, MobileCatalogGame},
    resolver,
};

/// The catalog entry a lot resolves to.
#[derive(Debug, Clone, PartialEq)]
pub enum ResolvedLotGame {
    Steam(CatalogGame),
    Mobile(MobileCatalogGame),
}

/// Finds the configured lot a marketplace listing description belongs to.
///
/// Descriptions are operator-authored free text, so this reuses the resolver cascade rather than string equality.
pub fn match_lot<'a>(description: &str, lots: &'a [LotConfig]) -> Option<&'a LotConfig> {
    let candidates: Vec<(&str, Option<dgf_common::Money>)> = lots.iter().map(|l| (l.lot_name.as_str(), None)).collect();
    resolver::best_match(description, &candidates).map(|m| &lots[m.index])
}

/// Resolves the lot's configured game name against the appropriate vendor catalog.
///
/// Returns `Ok(None)` when no catalog entry matches; the caller decides whether that skips a sync lot or fails an
/// order session.
pub async fn resolve_lot_game(lot: &LotConfig, catalog: &CatalogApi) -> Result<Option<ResolvedLotGame>, CatalogError> {
    match &lot.kind {
        LotKind::SteamGift { .. } => {
            let games = catalog.games(false).await?;
            match resolver::find_by_name(&lot.game_name, &games, |g| &g.name, |_| None) {
                Some(summary) => {
                    trace!("🧩️ '{}' resolved to game #{} ({})", lot.game_name, summary.id, summary.name);
                    Ok(Some(ResolvedLotGame::Steam(catalog.game_detail(summary.id).await?)))
                },
                None => Ok(None),
            }
        },
        LotKind::MobileRefill { .. } => {
            let games = catalog.mobile_games(false).await?;
            match resolver::find_by_name(&lot.game_name, &games, |g| &g.name, |_| None) {
                Some(summary) => {
                    trace!("🧩️ '{}' resolved to mobile game #{} ({})", lot.game_name, summary.id, summary.name);
                    Ok(Some(ResolvedLotGame::Mobile(catalog.mobile_game(summary.id).await?)))
                },
                None => Ok(None),
            }
        },
    }
}
