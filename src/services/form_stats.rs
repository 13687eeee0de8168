use serde::Serialize;
use std::collections::HashMap;

use crate::models::{EnrichedMatchRow, MatchRecord};

/// Running tallies for one team within a single league pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TeamRunningState {
    pub matches_as_home: u32,
    pub matches_as_away: u32,
    pub points_as_home: u32,
    pub points_as_away: u32,
    pub goals_scored: u32,
}

impl TeamRunningState {
    pub fn matches_played(&self) -> u32 {
        self.matches_as_home + self.matches_as_away
    }

    pub fn points(&self) -> u32 {
        self.points_as_home + self.points_as_away
    }

    pub fn ppg_at_home(&self) -> f64 {
        ratio(self.points_as_home, self.matches_as_home)
    }

    pub fn ppg_away(&self) -> f64 {
        ratio(self.points_as_away, self.matches_as_away)
    }

    pub fn overall_ppg(&self) -> f64 {
        ratio(self.points(), self.matches_played())
    }

    pub fn gpg(&self) -> f64 {
        ratio(self.goals_scored, self.matches_played())
    }

    fn absorb_home(&mut self, points: u32, goals: u32) {
        self.matches_as_home += 1;
        self.points_as_home += points;
        self.goals_scored += goals;
    }

    fn absorb_away(&mut self, points: u32, goals: u32) {
        self.matches_as_away += 1;
        self.points_as_away += points;
        self.goals_scored += goals;
    }
}

fn ratio(numerator: u32, denominator: u32) -> f64 {
    if denominator > 0 {
        numerator as f64 / denominator as f64
    } else {
        0.0
    }
}

/// Result of one pass over a league history.
#[derive(Debug, Clone, Default)]
pub struct FormTable {
    pub rows: Vec<EnrichedMatchRow>,
    pub teams: HashMap<String, TeamRunningState>,
}

impl FormTable {
    pub fn team(&self, name: &str) -> Option<&TeamRunningState> {
        self.teams.get(name)
    }

    /// Teams ordered by overall PPG, best first; ties broken by name.
    pub fn standings(&self) -> Vec<(&str, &TeamRunningState)> {
        let mut table: Vec<(&str, &TeamRunningState)> = self
            .teams
            .iter()
            .map(|(name, state)| (name.as_str(), state))
            .collect();
        table.sort_by(|a, b| {
            b.1.overall_ppg()
                .total_cmp(&a.1.overall_ppg())
                .then_with(|| a.0.cmp(b.0))
        });
        table
    }
}

/// Incrementally derives pre-match PPG/GPG features over a chronologically
/// ordered history. Every row is emitted before its own result is absorbed.
#[derive(Debug, Default)]
pub struct FormStatsBuilder {
    teams: HashMap<String, TeamRunningState>,
}

impl FormStatsBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build features for a whole history. `records` must be sorted by date.
    pub fn build(records: &[MatchRecord]) -> FormTable {
        let mut builder = Self::new();
        let rows = records.iter().map(|record| builder.push(record)).collect();
        FormTable {
            rows,
            teams: builder.teams,
        }
    }

    pub fn state(&self, team: &str) -> TeamRunningState {
        self.teams.get(team).copied().unwrap_or_default()
    }

    /// Emit the row for `record` from current tallies, then apply its result.
    pub fn push(&mut self, record: &MatchRecord) -> EnrichedMatchRow {
        let home = self.state(&record.home_team);
        let away = self.state(&record.away_team);

        let home_ppg_at_home = home.ppg_at_home();
        let home_overall_ppg = home.overall_ppg();
        let away_ppg_away = away.ppg_away();
        let away_overall_ppg = away.overall_ppg();
        let home_gpg = home.gpg();
        let away_gpg = away.gpg();

        let row = EnrichedMatchRow {
            record: record.clone(),
            home_ppg_at_home,
            home_overall_ppg,
            away_ppg_away,
            away_overall_ppg,
            home_gpg,
            away_gpg,
            ppg_diff: home_overall_ppg - away_overall_ppg,
            home_away_ppg_diff: home_ppg_at_home - away_ppg_away,
            gpg_total: home_gpg + away_gpg,
            gpg_diff: home_gpg - away_gpg,
        };

        let (home_points, away_points) = record.result.points();
        self.teams
            .entry(record.home_team.clone())
            .or_default()
            .absorb_home(home_points, record.home_goals);
        self.teams
            .entry(record.away_team.clone())
            .or_default()
            .absorb_away(away_points, record.away_goals);

        row
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::models::MatchResult;
    use approx::assert_relative_eq;
    use chrono::NaiveDate;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    pub(crate) fn record(day: u32, home: &str, away: &str, hg: u32, ag: u32) -> MatchRecord {
        let result = match hg.cmp(&ag) {
            std::cmp::Ordering::Greater => MatchResult::Home,
            std::cmp::Ordering::Equal => MatchResult::Draw,
            std::cmp::Ordering::Less => MatchResult::Away,
        };
        MatchRecord {
            date: NaiveDate::from_ymd_opt(2024, 8, 1).unwrap() + chrono::Duration::days(day as i64),
            season: "2425".to_string(),
            home_team: home.to_string(),
            away_team: away.to_string(),
            home_goals: hg,
            away_goals: ag,
            result,
        }
    }

    fn random_history(rng: &mut StdRng, len: usize) -> Vec<MatchRecord> {
        let teams = ["A", "B", "C", "D", "E", "F"];
        (0..len)
            .map(|i| {
                let h = rng.gen_range(0..teams.len());
                let mut a = rng.gen_range(0..teams.len() - 1);
                if a >= h {
                    a += 1;
                }
                record(i as u32, teams[h], teams[a], rng.gen_range(0..5), rng.gen_range(0..5))
            })
            .collect()
    }

    #[test]
    fn test_three_match_scenario() {
        let history = vec![
            record(0, "TeamA", "TeamB", 2, 0),
            record(1, "TeamB", "TeamC", 1, 1),
            record(2, "TeamC", "TeamA", 0, 3),
        ];
        let table = FormStatsBuilder::build(&history);

        assert_relative_eq!(table.team("TeamA").unwrap().overall_ppg(), 3.0);
        assert_relative_eq!(table.team("TeamB").unwrap().overall_ppg(), 0.5);
        assert_relative_eq!(table.team("TeamC").unwrap().overall_ppg(), 0.5);

        // Third row sees TeamC after one draw and TeamA after one win.
        let last = &table.rows[2];
        assert_relative_eq!(last.home_overall_ppg, 1.0);
        assert_relative_eq!(last.away_overall_ppg, 3.0);
        assert_relative_eq!(last.ppg_diff, -2.0);
        assert_relative_eq!(last.home_gpg, 1.0);
        assert_relative_eq!(last.away_gpg, 2.0);
        assert_relative_eq!(last.gpg_total, 3.0);
    }

    #[test]
    fn test_first_appearance_is_all_zero() {
        let history = vec![
            record(0, "A", "B", 4, 1),
            record(1, "C", "A", 0, 0),
        ];
        let table = FormStatsBuilder::build(&history);

        let first = &table.rows[0];
        for value in [
            first.home_ppg_at_home,
            first.home_overall_ppg,
            first.away_ppg_away,
            first.away_overall_ppg,
            first.home_gpg,
            first.away_gpg,
        ] {
            assert_eq!(value, 0.0);
        }

        // C is new, A is not, and A has never played away.
        let second = &table.rows[1];
        assert_eq!(second.home_overall_ppg, 0.0);
        assert_eq!(second.home_gpg, 0.0);
        assert_eq!(second.away_ppg_away, 0.0);
        assert_relative_eq!(second.away_overall_ppg, 3.0);
        assert_relative_eq!(second.away_gpg, 4.0);
    }

    #[test]
    fn test_points_never_exceed_three_per_match() {
        let mut rng = StdRng::seed_from_u64(7);
        let table = FormStatsBuilder::build(&random_history(&mut rng, 300));

        let appearances: u32 = table.teams.values().map(|s| s.matches_played()).sum();
        assert_eq!(appearances, 600);
        for state in table.teams.values() {
            assert!(state.points() <= 3 * state.matches_played());
        }
    }

    #[test]
    fn test_rows_do_not_leak_their_own_result() {
        let mut rng = StdRng::seed_from_u64(42);
        let history = random_history(&mut rng, 120);
        let baseline = FormStatsBuilder::build(&history).rows;

        for _ in 0..25 {
            let i = rng.gen_range(0..history.len());
            let mut altered = history.clone();
            let (hg, ag) = (rng.gen_range(0..6), rng.gen_range(0..6));
            altered[i] = record(i as u32, &history[i].home_team, &history[i].away_team, hg, ag);

            let rows = FormStatsBuilder::build(&altered).rows;
            for j in 0..=i {
                assert_eq!(rows[j].home_overall_ppg, baseline[j].home_overall_ppg);
                assert_eq!(rows[j].away_overall_ppg, baseline[j].away_overall_ppg);
                assert_eq!(rows[j].home_ppg_at_home, baseline[j].home_ppg_at_home);
                assert_eq!(rows[j].away_ppg_away, baseline[j].away_ppg_away);
                assert_eq!(rows[j].home_gpg, baseline[j].home_gpg);
                assert_eq!(rows[j].away_gpg, baseline[j].away_gpg);
            }
        }
    }

    #[test]
    fn test_standings_order() {
        let history = vec![
            record(0, "TeamA", "TeamB", 2, 0),
            record(1, "TeamB", "TeamC", 1, 1),
            record(2, "TeamC", "TeamA", 0, 3),
        ];
        let table = FormStatsBuilder::build(&history);
        let names: Vec<&str> = table.standings().iter().map(|(n, _)| *n).collect();
        assert_eq!(names, vec!["TeamA", "TeamB", "TeamC"]);
    }
}
