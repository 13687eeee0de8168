use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
    routing::get,
    Router,
};
use sqlx::SqlitePool;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::config::{Settings, Tables};
use crate::db::{create_pool, get_fixtures, get_league_history, get_stored_divisions, init_database_with_pool};
use crate::error::PredictionError;
use crate::models::{ApiResponse, LeaguePredictions, LeagueSummary, TeamForm};
use crate::services::{predict_stored, FormStatsBuilder, PredictionEngine};

#[derive(Clone)]
pub struct AppState {
    pub pool: SqlitePool,
    pub settings: Arc<Settings>,
    pub tables: Arc<Tables>,
}

pub async fn serve(settings: Settings, port: u16) -> anyhow::Result<()> {
    let pool = create_pool(&settings.database_url).await?;
    init_database_with_pool(&pool).await?;
    let tables = settings.load_tables()?;

    let state = AppState {
        pool,
        settings: Arc::new(settings),
        tables: Arc::new(tables),
    };
    let app = create_router().with_state(state);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?;
    tracing::info!("formcast API server listening on port {}", port);

    axum::serve(listener, app).await?;
    Ok(())
}

fn create_router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health_check))
        .route("/leagues", get(get_leagues_handler))
        .route("/predictions", get(get_predictions_handler))
        .route("/leagues/{div}/predictions", get(get_league_predictions_handler))
        .route("/leagues/{div}/form", get(get_league_form_handler))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
}

// Health check endpoint
async fn health_check() -> Json<ApiResponse<&'static str>> {
    Json(ApiResponse::success("formcast API is running"))
}

// GET /leagues - Leagues with stored history
async fn get_leagues_handler(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Vec<LeagueSummary>>>, StatusCode> {
    match get_stored_divisions(&state.pool).await {
        Ok(divisions) => {
            let leagues = divisions
                .into_iter()
                .map(|(div, matches)| LeagueSummary {
                    name: state.tables.divisions.name(&div),
                    eligible: state.settings.is_eligible(&div),
                    div,
                    matches,
                })
                .collect();
            Ok(Json(ApiResponse::success(leagues)))
        }
        Err(e) => {
            tracing::error!("Failed to list leagues: {}", e);
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

// GET /predictions - Score all stored fixtures in eligible leagues
async fn get_predictions_handler(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Vec<LeaguePredictions>>>, StatusCode> {
    match predict_stored(&state.pool, &state.settings, &state.tables).await {
        Ok(leagues) => Ok(Json(ApiResponse::success(leagues))),
        Err(e) if matches!(e.downcast_ref::<PredictionError>(), Some(PredictionError::NoUsableInput(_))) => {
            tracing::warn!("No predictions available: {}", e);
            Err(StatusCode::NOT_FOUND)
        }
        Err(e) => {
            tracing::error!("Failed to generate predictions: {}", e);
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

// GET /leagues/{div}/predictions - Score one league's fixtures
async fn get_league_predictions_handler(
    State(state): State<AppState>,
    Path(div): Path<String>,
) -> Result<Json<ApiResponse<LeaguePredictions>>, StatusCode> {
    let loaded = tokio::try_join!(get_fixtures(&state.pool), get_league_history(&state.pool, &div));
    let (fixtures, history) = match loaded {
        Ok(loaded) => loaded,
        Err(e) => {
            tracing::error!("Failed to load {} data: {}", div, e);
            return Err(StatusCode::INTERNAL_SERVER_ERROR);
        }
    };
    let fixtures: Vec<_> = fixtures.into_iter().filter(|f| f.div == div).collect();

    let engine = PredictionEngine::from_settings(&state.settings);
    let name = state.tables.divisions.name(&div);
    match engine.predict_league(&div, &name, &history, &fixtures, &state.tables.team_names) {
        Ok(league) => Ok(Json(ApiResponse::success(league))),
        Err(PredictionError::MissingHistory(_)) => Err(StatusCode::NOT_FOUND),
        Err(e) => {
            tracing::warn!("Cannot predict {}: {}", div, e);
            Err(StatusCode::UNPROCESSABLE_ENTITY)
        }
    }
}

// GET /leagues/{div}/form - Current form table
async fn get_league_form_handler(
    State(state): State<AppState>,
    Path(div): Path<String>,
) -> Result<Json<ApiResponse<Vec<TeamForm>>>, StatusCode> {
    let history = match get_league_history(&state.pool, &div).await {
        Ok(history) if history.is_empty() => return Err(StatusCode::NOT_FOUND),
        Ok(history) => history,
        Err(e) => {
            tracing::error!("Failed to load {} history: {}", div, e);
            return Err(StatusCode::INTERNAL_SERVER_ERROR);
        }
    };

    let table = FormStatsBuilder::build(&history);
    let form = table
        .standings()
        .into_iter()
        .map(|(team, s)| TeamForm {
            team: team.to_string(),
            played: s.matches_played(),
            points: s.points(),
            ppg: s.overall_ppg(),
            home_ppg: s.ppg_at_home(),
            away_ppg: s.ppg_away(),
            gpg: s.gpg(),
        })
        .collect();

    Ok(Json(ApiResponse::success(form)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::replace_league_history;
    use crate::services::form_stats::tests::record;

    async fn state() -> AppState {
        let pool = create_pool("sqlite::memory:").await.unwrap();
        init_database_with_pool(&pool).await.unwrap();
        let settings = Settings::from_lookup(|key| (key == "MAIN_LEAGUES").then(|| "E0".to_string())).unwrap();
        AppState {
            pool,
            settings: Arc::new(settings),
            tables: Arc::new(Tables::embedded().unwrap()),
        }
    }

    #[tokio::test]
    async fn test_form_table_and_leagues() {
        let state = state().await;
        replace_league_history(
            &state.pool,
            "E0",
            &[record(0, "Arsenal", "Chelsea", 2, 0), record(1, "Chelsea", "Fulham", 1, 1)],
        )
        .await
        .unwrap();

        let Json(form) = get_league_form_handler(State(state.clone()), Path("E0".to_string()))
            .await
            .unwrap();
        let form = form.data.unwrap();
        assert_eq!(form[0].team, "Arsenal");
        assert_eq!(form[0].points, 3);
        assert_eq!(form[2].team, "Chelsea");

        let Json(leagues) = get_leagues_handler(State(state.clone())).await.unwrap();
        let leagues = leagues.data.unwrap();
        assert_eq!(leagues.len(), 1);
        assert_eq!(leagues[0].name, "England Premier League");
        assert_eq!(leagues[0].matches, 2);
        assert!(leagues[0].eligible);
    }

    #[tokio::test]
    async fn test_missing_data_is_not_found() {
        let state = state().await;
        let status = get_league_form_handler(State(state.clone()), Path("D1".to_string()))
            .await
            .unwrap_err();
        assert_eq!(status, StatusCode::NOT_FOUND);

        let status = get_predictions_handler(State(state)).await.unwrap_err();
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
