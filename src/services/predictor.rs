use crate::config::{Settings, TeamNames};
use crate::error::PredictionError;
use crate::models::{EnrichedMatchRow, Feature, Fixture, LeaguePredictions, MatchRecord, Prediction};
use crate::services::form_stats::FormStatsBuilder;
use crate::services::frequency::BucketedFrequencyEstimator;
use crate::services::model_selector::{ModelSelector, OutcomeModels};
use crate::utils::fair_odds;

/// Rows at the end of a history used to project current form.
pub const INFERENCE_WINDOW: usize = 200;

/// Current differentials for both candidate features.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeatureDiffs {
    pub overall: f64,
    pub home_away: f64,
}

impl FeatureDiffs {
    pub fn for_feature(&self, feature: Feature) -> f64 {
        match feature {
            Feature::PpgDiff => self.overall,
            Feature::HomeAwayPpgDiff => self.home_away,
        }
    }
}

/// Step a team's PPG forward over its most recent, already-played match.
fn project(previous_ppg: f64, n_matches: usize, points: u32) -> f64 {
    (previous_ppg * n_matches as f64 + points as f64) / (n_matches as f64 + 1.0)
}

/// Overall PPG after the team's latest appearance in `rows`, home or away.
pub fn latest_overall_ppg(rows: &[EnrichedMatchRow], team: &str) -> Option<f64> {
    let n_matches = rows.iter().filter(|r| r.record.involves(team)).count();
    let last = rows.iter().rev().find(|r| r.record.involves(team))?;

    let (home_points, away_points) = last.record.result.points();
    let (previous_ppg, points) = if last.record.home_team == team {
        (last.home_overall_ppg, home_points)
    } else {
        (last.away_overall_ppg, away_points)
    };
    Some(project(previous_ppg, n_matches, points))
}

/// Home PPG after the team's latest home appearance in `rows`.
pub fn latest_home_ppg(rows: &[EnrichedMatchRow], team: &str) -> Option<f64> {
    let n_matches = rows.iter().filter(|r| r.record.home_team == team).count();
    let last = rows.iter().rev().find(|r| r.record.home_team == team)?;
    Some(project(last.home_ppg_at_home, n_matches, last.record.result.points().0))
}

/// Away PPG after the team's latest away appearance in `rows`.
pub fn latest_away_ppg(rows: &[EnrichedMatchRow], team: &str) -> Option<f64> {
    let n_matches = rows.iter().filter(|r| r.record.away_team == team).count();
    let last = rows.iter().rev().find(|r| r.record.away_team == team)?;
    Some(project(last.away_ppg_away, n_matches, last.record.result.points().1))
}

pub struct PredictionEngine {
    selector: ModelSelector,
    inference_window: usize,
}

impl Default for PredictionEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl PredictionEngine {
    pub fn new() -> Self {
        Self {
            selector: ModelSelector::default(),
            inference_window: INFERENCE_WINDOW,
        }
    }

    /// Engine whose estimator honours the configured warm-up.
    pub fn from_settings(settings: &Settings) -> Self {
        let estimator = BucketedFrequencyEstimator::new().with_warm_up(settings.warm_up_rows);
        Self::new().with_selector(ModelSelector::new(estimator))
    }

    pub fn with_selector(mut self, selector: ModelSelector) -> Self {
        self.selector = selector;
        self
    }

    /// Train on the full `history` and score every fixture for one league.
    /// Fixtures with a team that cannot be projected are skipped.
    pub fn predict_league(
        &self,
        div: &str,
        league: &str,
        history: &[MatchRecord],
        fixtures: &[Fixture],
        team_names: &TeamNames,
    ) -> Result<LeaguePredictions, PredictionError> {
        if history.is_empty() {
            return Err(PredictionError::MissingHistory(div.to_string()));
        }

        let training = FormStatsBuilder::build(history);
        let models = self.selector.select_all(div, &training.rows)?;

        let window_start = history.len().saturating_sub(self.inference_window);
        let window = FormStatsBuilder::build(&history[window_start..]);

        let mut predictions = Vec::new();
        for fixture in fixtures {
            let home_team = team_names.canonical(div, &fixture.home_team);
            let away_team = team_names.canonical(div, &fixture.away_team);

            match self.predict_fixture(div, &window.rows, &models, fixture, home_team, away_team) {
                Ok(prediction) => {
                    tracing::info!(
                        "{}: {} v {}: Home {:.2}%, Draw {:.2}%, Away {:.2}%",
                        div,
                        prediction.home_team,
                        prediction.away_team,
                        prediction.home_pct,
                        prediction.draw_pct,
                        prediction.away_pct
                    );
                    predictions.push(prediction);
                }
                Err(PredictionError::UnknownTeam { team, .. }) => {
                    let known = window.teams.keys().map(String::as_str);
                    match TeamNames::closest(&team, known) {
                        Some((suggestion, _)) => tracing::warn!(
                            "{}: skipping {} v {}: no recent form for {} (closest known: {})",
                            div,
                            home_team,
                            away_team,
                            team,
                            suggestion
                        ),
                        None => tracing::warn!(
                            "{}: skipping {} v {}: no recent form for {}",
                            div,
                            home_team,
                            away_team,
                            team
                        ),
                    }
                }
                Err(e) => return Err(e),
            }
        }

        Ok(LeaguePredictions {
            div: div.to_string(),
            league: league.to_string(),
            models: models.summaries(),
            predictions,
        })
    }

    /// Score one fixture against the league's selected models.
    pub fn predict_fixture(
        &self,
        div: &str,
        window: &[EnrichedMatchRow],
        models: &OutcomeModels,
        fixture: &Fixture,
        home_team: &str,
        away_team: &str,
    ) -> Result<Prediction, PredictionError> {
        let diffs = self.current_diffs(div, window, home_team, away_team)?;

        let home_pct = models.home.predict(diffs.for_feature(models.home.feature));
        let draw_pct = models.draw.predict(diffs.for_feature(models.draw.feature));
        let away_pct = models.away.predict(diffs.for_feature(models.away.feature));

        Ok(Prediction {
            home_team: home_team.to_string(),
            away_team: away_team.to_string(),
            date: fixture.date.clone(),
            time: fixture.time.clone(),
            home_pct,
            draw_pct,
            away_pct,
            home_odds: fair_odds(home_pct),
            draw_odds: fair_odds(draw_pct),
            away_odds: fair_odds(away_pct),
        })
    }

    /// Current feature differentials, projected from the inference window.
    pub fn current_diffs(
        &self,
        div: &str,
        window: &[EnrichedMatchRow],
        home_team: &str,
        away_team: &str,
    ) -> Result<FeatureDiffs, PredictionError> {
        let unknown = |team: &str| PredictionError::UnknownTeam {
            div: div.to_string(),
            team: team.to_string(),
        };

        let home_overall = latest_overall_ppg(window, home_team).ok_or_else(|| unknown(home_team))?;
        let away_overall = latest_overall_ppg(window, away_team).ok_or_else(|| unknown(away_team))?;
        let home_at_home = latest_home_ppg(window, home_team).ok_or_else(|| unknown(home_team))?;
        let away_away = latest_away_ppg(window, away_team).ok_or_else(|| unknown(away_team))?;

        Ok(FeatureDiffs {
            overall: home_overall - away_overall,
            home_away: home_at_home - away_away,
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::services::form_stats::tests::record;
    use approx::assert_relative_eq;

    fn fixture(home: &str, away: &str) -> Fixture {
        Fixture {
            div: "X0".to_string(),
            date: "01/06/2025".to_string(),
            time: "15:00".to_string(),
            home_team: home.to_string(),
            away_team: away.to_string(),
        }
    }

    /// Double round robin repeated; lower index teams are stronger.
    pub(crate) fn league_history(rounds: usize) -> Vec<MatchRecord> {
        let teams = ["Alpha", "Bravo", "Charlie", "Delta", "Echo", "Foxtrot"];
        let mut history = Vec::new();
        let mut day = 0;
        for round in 0..rounds {
            for (h, home) in teams.iter().enumerate() {
                for (a, away) in teams.iter().enumerate() {
                    if h == a {
                        continue;
                    }
                    let gap = a as i32 - h as i32;
                    let (hg, ag) = match (gap, (round + h + a) % 4) {
                        (g, _) if g >= 3 => (3, 0),
                        (g, 0) if g > 0 => (1, 1),
                        (g, _) if g > 0 => (2, 1),
                        (g, 1) if g <= -3 => (1, 1),
                        (g, _) if g <= -3 => (0, 2),
                        (_, 0) | (_, 2) => (1, 1),
                        (_, 1) => (2, 1),
                        _ => (0, 1),
                    };
                    history.push(record(day, home, away, hg, ag));
                    day += 1;
                }
            }
        }
        history
    }

    #[test]
    fn test_projection_formula() {
        // TeamA: W at home, then W away; the last row's pre-match overall PPG is 3.0.
        let rows = FormStatsBuilder::build(&[
            record(0, "TeamA", "TeamB", 2, 0),
            record(1, "TeamB", "TeamC", 1, 1),
            record(2, "TeamC", "TeamA", 0, 3),
        ])
        .rows;

        // (3.0 * 2 + 3) / 3
        assert_relative_eq!(latest_overall_ppg(&rows, "TeamA").unwrap(), 3.0);
        // TeamB last appeared at home on row 1, pre-match PPG 0.0, drew: (0 * 2 + 1) / 3
        assert_relative_eq!(latest_overall_ppg(&rows, "TeamB").unwrap(), 1.0 / 3.0);
        // TeamC home once (row 2, pre-match home PPG 0.0, lost): (0 * 1 + 0) / 2
        assert_relative_eq!(latest_home_ppg(&rows, "TeamC").unwrap(), 0.0);
        // TeamC away once (row 1, drew): (0 * 1 + 1) / 2
        assert_relative_eq!(latest_away_ppg(&rows, "TeamC").unwrap(), 0.5);
        assert!(latest_overall_ppg(&rows, "TeamZ").is_none());
        assert!(latest_home_ppg(&rows, "TeamZ").is_none());
        assert!(latest_away_ppg(&rows, "TeamZ").is_none());
    }

    #[test]
    fn test_missing_history_is_reported() {
        let engine = PredictionEngine::new();
        let result = engine.predict_league("X0", "X League", &[], &[fixture("A", "B")], &TeamNames::default());
        assert!(matches!(result, Err(PredictionError::MissingHistory(div)) if div == "X0"));
    }

    #[test]
    fn test_unknown_home_team_is_skipped() {
        let engine = PredictionEngine::new();
        let history = league_history(4);
        let fixtures = vec![fixture("Newcomers", "Alpha"), fixture("Bravo", "Echo")];

        let league = engine
            .predict_league("X0", "X League", &history, &fixtures, &TeamNames::default())
            .unwrap();

        assert_eq!(league.predictions.len(), 1);
        assert_eq!(league.predictions[0].home_team, "Bravo");
        assert!(league.predictions.iter().all(|p| p.home_team != "Newcomers"));
        assert_eq!(league.models.len(), 3);
    }

    #[test]
    fn test_predictions_follow_selected_models() {
        let selector = ModelSelector::new(BucketedFrequencyEstimator::new());
        let engine = PredictionEngine::new().with_selector(selector.clone());
        let history = league_history(4);
        let fixtures = vec![fixture("Alpha", "Foxtrot")];

        let league = engine
            .predict_league("X0", "X League", &history, &fixtures, &TeamNames::default())
            .unwrap();
        let p = &league.predictions[0];

        let training = FormStatsBuilder::build(&history);
        let models = selector.select_all("X0", &training.rows).unwrap();
        let window = FormStatsBuilder::build(&history[history.len().saturating_sub(INFERENCE_WINDOW)..]);
        let diffs = engine
            .current_diffs("X0", &window.rows, "Alpha", "Foxtrot")
            .unwrap();

        assert_relative_eq!(p.home_pct, models.home.predict(diffs.for_feature(models.home.feature)));
        assert_relative_eq!(p.draw_pct, models.draw.predict(diffs.for_feature(models.draw.feature)));
        assert_relative_eq!(p.away_pct, models.away.predict(diffs.for_feature(models.away.feature)));
        assert_eq!(p.home_odds, fair_odds(p.home_pct));
        assert!(diffs.overall > 0.0, "strongest side should out-point the weakest");
    }

    #[test]
    fn test_configured_warm_up_reaches_the_estimator() {
        let settings = Settings::from_lookup(|key| (key == "WARM_UP_ROWS").then(|| "200".to_string())).unwrap();
        let engine = PredictionEngine::from_settings(&settings);
        let result = engine.predict_league(
            "X0",
            "X League",
            &league_history(4),
            &[fixture("Alpha", "Foxtrot")],
            &TeamNames::default(),
        );
        assert!(matches!(result, Err(PredictionError::Unfittable { .. })));

        let settings = Settings::from_lookup(|_| None).unwrap();
        let league = PredictionEngine::from_settings(&settings)
            .predict_league("X0", "X League", &league_history(4), &[fixture("Alpha", "Foxtrot")], &TeamNames::default())
            .unwrap();
        assert_eq!(league.predictions.len(), 1);
    }

    #[test]
    fn test_fixture_names_are_normalized() {
        let names = TeamNames::from_json(
            r#"{ "version": 1, "teams": { "X0": { "Alpha FC": "Alpha" } } }"#,
        )
        .unwrap();
        let engine = PredictionEngine::new();
        let league = engine
            .predict_league("X0", "X League", &league_history(4), &[fixture("Alpha FC", "Delta")], &names)
            .unwrap();
        assert_eq!(league.predictions[0].home_team, "Alpha");
    }
}
