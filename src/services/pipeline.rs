//! Store-backed runs: load fixtures and per-league history, score every
//! eligible league, and isolate failures to the league that raised them.

use anyhow::Result;
use sqlx::SqlitePool;
use std::collections::BTreeMap;

use crate::config::{Settings, Tables};
use crate::db::{get_fixtures, get_league_history};
use crate::error::PredictionError;
use crate::models::{Fixture, LeagueOverUnder, LeaguePredictions};
use crate::services::over_under::OverUnderPredictor;
use crate::services::predictor::PredictionEngine;

/// Fixtures grouped by division, in sorted division order, keeping only
/// the divisions `eligible` admits.
pub fn group_fixtures<F>(fixtures: Vec<Fixture>, eligible: F) -> BTreeMap<String, Vec<Fixture>>
where
    F: Fn(&str) -> bool,
{
    let mut grouped: BTreeMap<String, Vec<Fixture>> = BTreeMap::new();
    for fixture in fixtures {
        if eligible(&fixture.div) {
            grouped.entry(fixture.div.clone()).or_default().push(fixture);
        } else {
            tracing::debug!("Ignoring fixture in non-eligible league {}", fixture.div);
        }
    }
    grouped
}

async fn stored_fixtures(pool: &SqlitePool) -> Result<Vec<Fixture>> {
    let fixtures = get_fixtures(pool).await?;
    if fixtures.is_empty() {
        return Err(PredictionError::NoUsableInput("no fixtures stored".to_string()).into());
    }
    Ok(fixtures)
}

/// Score every eligible league with stored fixtures. A league that fails
/// (no history, unfittable models) is logged and left out; the run only
/// fails when no eligible league has any stored history.
pub async fn predict_stored(
    pool: &SqlitePool,
    settings: &Settings,
    tables: &Tables,
) -> Result<Vec<LeaguePredictions>> {
    let fixtures = stored_fixtures(pool).await?;
    let engine = PredictionEngine::from_settings(settings);

    let mut leagues = Vec::new();
    let mut with_history = 0usize;
    for (div, fixtures) in group_fixtures(fixtures, |div| settings.is_eligible(div)) {
        let name = tables.divisions.name(&div);
        tracing::info!("Predicting {} fixtures for {} ({})", fixtures.len(), div, name);

        let history = match get_league_history(pool, &div).await {
            Ok(history) => history,
            Err(e) => {
                tracing::error!("Failed to load {} history: {}", div, e);
                continue;
            }
        };
        if !history.is_empty() {
            with_history += 1;
        }

        match engine.predict_league(&div, &name, &history, &fixtures, &tables.team_names) {
            Ok(league) => {
                if league.predictions.is_empty() {
                    tracing::warn!("{}: no fixture could be scored", div);
                }
                leagues.push(league);
            }
            Err(e) => tracing::error!("Skipping {}: {}", div, e),
        }
    }

    if with_history == 0 {
        return Err(PredictionError::NoUsableInput("no eligible league has stored history".to_string()).into());
    }
    Ok(leagues)
}

pub async fn over_under_stored(
    pool: &SqlitePool,
    settings: &Settings,
    tables: &Tables,
) -> Result<Vec<LeagueOverUnder>> {
    let fixtures = stored_fixtures(pool).await?;
    let predictor = OverUnderPredictor::new();

    let mut leagues = Vec::new();
    for (div, fixtures) in group_fixtures(fixtures, |div| settings.is_over_under_eligible(div)) {
        let history = match get_league_history(pool, &div).await {
            Ok(history) => history,
            Err(e) => {
                tracing::error!("Failed to load {} history: {}", div, e);
                continue;
            }
        };
        let season = match (&settings.latest_season, history.last()) {
            (Some(season), _) => season.clone(),
            (None, Some(last)) => last.season.clone(),
            (None, None) => {
                tracing::warn!("Skipping {}: {}", div, PredictionError::MissingHistory(div.clone()));
                continue;
            }
        };

        let name = tables.divisions.name(&div);
        let league = predictor.predict_league(&div, &name, &season, &history, &fixtures, &tables.team_names);
        tracing::info!("{}: {} over/under predictions", div, league.predictions.len());
        leagues.push(league);
    }
    Ok(leagues)
}
