use crate::config::TeamNames;
use crate::models::{Fixture, LeagueOverUnder, MatchRecord, OverUnderPrediction};

/// Goals-line heuristic over each side's most recent venue-specific matches
/// in the current season.
#[derive(Debug, Clone)]
pub struct OverUnderPredictor {
    lookback: usize,
    min_window_goals: u32,
}

impl Default for OverUnderPredictor {
    fn default() -> Self {
        Self {
            lookback: 3,
            min_window_goals: 7,
        }
    }
}

impl OverUnderPredictor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn predict_league(
        &self,
        div: &str,
        league: &str,
        season: &str,
        history: &[MatchRecord],
        fixtures: &[Fixture],
        team_names: &TeamNames,
    ) -> LeagueOverUnder {
        let current: Vec<&MatchRecord> = history.iter().filter(|m| m.season == season).collect();

        let predictions = fixtures
            .iter()
            .filter_map(|fixture| {
                let home_team = team_names.canonical(div, &fixture.home_team);
                let away_team = team_names.canonical(div, &fixture.away_team);
                let prediction = self.predict_fixture(&current, fixture, home_team, away_team);
                if prediction.is_none() {
                    tracing::debug!(
                        "{}: not enough {} matches for {} v {}",
                        div,
                        season,
                        home_team,
                        away_team
                    );
                }
                prediction
            })
            .collect();

        LeagueOverUnder {
            div: div.to_string(),
            league: league.to_string(),
            predictions,
        }
    }

    /// `None` when either side has fewer than `lookback` venue matches.
    pub fn predict_fixture(
        &self,
        season_matches: &[&MatchRecord],
        fixture: &Fixture,
        home_team: &str,
        away_team: &str,
    ) -> Option<OverUnderPrediction> {
        let home_recent = self.recent(season_matches, |m| m.home_team == home_team)?;
        let away_recent = self.recent(season_matches, |m| m.away_team == away_team)?;

        let home_hot = self.is_high_scoring(&home_recent);
        let away_hot = self.is_high_scoring(&away_recent);
        let away_last_over = away_recent.last().is_some_and(|m| m.total_goals() > 2);
        let away_keeps_scoring = away_recent.iter().filter(|m| m.away_goals > 0).count() >= 2;

        Some(OverUnderPrediction {
            date: fixture.date.clone(),
            time: fixture.time.clone(),
            home_team: home_team.to_string(),
            away_team: away_team.to_string(),
            is_over_25: home_hot && away_hot && away_last_over && away_keeps_scoring,
        })
    }

    fn recent<'a, F>(&self, matches: &[&'a MatchRecord], keep: F) -> Option<Vec<&'a MatchRecord>>
    where
        F: Fn(&MatchRecord) -> bool,
    {
        let selected: Vec<&MatchRecord> = matches.iter().copied().filter(|m| keep(m)).collect();
        if selected.len() < self.lookback {
            return None;
        }
        Some(selected[selected.len() - self.lookback..].to_vec())
    }

    /// Enough goals across the window, and most of its games over 2.5.
    fn is_high_scoring(&self, window: &[&MatchRecord]) -> bool {
        let total: u32 = window.iter().map(|m| m.total_goals()).sum();
        let overs = window.iter().filter(|m| m.total_goals() > 2).count();
        total >= self.min_window_goals && overs >= 2
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::form_stats::tests::record;

    fn fixture(home: &str, away: &str) -> Fixture {
        Fixture {
            div: "E0".to_string(),
            date: "10/05/2025".to_string(),
            time: "12:30".to_string(),
            home_team: home.to_string(),
            away_team: away.to_string(),
        }
    }

    fn season_history() -> Vec<MatchRecord> {
        vec![
            record(0, "Hosts", "X", 3, 1),
            record(1, "Y", "Visitors", 2, 2),
            record(2, "Hosts", "Y", 2, 2),
            record(3, "X", "Visitors", 1, 3),
            record(4, "Hosts", "Z", 1, 0),
            record(5, "Z", "Visitors", 2, 1),
            record(6, "Hosts", "W", 4, 0),
        ]
    }

    #[test]
    fn test_over_when_both_windows_are_high_scoring() {
        let history = season_history();
        let league = OverUnderPredictor::new().predict_league(
            "E0",
            "England Premier League",
            "2425",
            &history,
            &[fixture("Hosts", "Visitors")],
            &TeamNames::default(),
        );
        assert_eq!(league.predictions.len(), 1);
        // Hosts last three at home: 4, 1, 4 goals -> 9 total, two overs.
        // Visitors away: 4, 4, 3 goals -> 11 total, last game over, scored in all.
        assert!(league.predictions[0].is_over_25);
    }

    #[test]
    fn test_under_once_away_side_goes_quiet() {
        let mut history = season_history();
        history.push(record(7, "V", "Visitors", 3, 0));
        let league = OverUnderPredictor::new().predict_league(
            "E0",
            "England Premier League",
            "2425",
            &history,
            &[fixture("Hosts", "Visitors")],
            &TeamNames::default(),
        );
        // Visitors away window is now 4, 3, 3 goals; scoring in two of three is enough.
        assert!(league.predictions[0].is_over_25);

        history.push(record(8, "U", "Visitors", 1, 0));
        let league = OverUnderPredictor::new().predict_league(
            "E0",
            "England Premier League",
            "2425",
            &history,
            &[fixture("Hosts", "Visitors")],
            &TeamNames::default(),
        );
        // Window 3, 3, 1: last game under 2.5 and scored only once.
        assert!(!league.predictions[0].is_over_25);
    }

    #[test]
    fn test_other_seasons_are_ignored() {
        let mut history = season_history();
        for m in history.iter_mut().skip(3) {
            m.season = "2324".to_string();
        }
        let league = OverUnderPredictor::new().predict_league(
            "E0",
            "England Premier League",
            "2425",
            &history,
            &[fixture("Hosts", "Visitors")],
            &TeamNames::default(),
        );
        assert!(league.predictions.is_empty());
    }
}
