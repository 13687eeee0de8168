use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Full-time result code as published in football-data style tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MatchResult {
    #[serde(rename = "H")]
    Home,
    #[serde(rename = "D")]
    Draw,
    #[serde(rename = "A")]
    Away,
}

impl MatchResult {
    pub const ALL: [MatchResult; 3] = [MatchResult::Home, MatchResult::Draw, MatchResult::Away];

    pub fn from_code(code: &str) -> Option<Self> {
        match code.trim() {
            "H" => Some(Self::Home),
            "D" => Some(Self::Draw),
            "A" => Some(Self::Away),
            _ => None,
        }
    }

    pub fn code(self) -> &'static str {
        match self {
            Self::Home => "H",
            Self::Draw => "D",
            Self::Away => "A",
        }
    }

    /// League points awarded as (home, away).
    pub fn points(self) -> (u32, u32) {
        match self {
            Self::Home => (3, 0),
            Self::Draw => (1, 1),
            Self::Away => (0, 3),
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Home => "Home",
            Self::Draw => "Draw",
            Self::Away => "Away",
        }
    }
}

impl fmt::Display for MatchResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One played match, already normalized to canonical team names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchRecord {
    pub date: NaiveDate,
    pub season: String,
    pub home_team: String,
    pub away_team: String,
    pub home_goals: u32,
    pub away_goals: u32,
    pub result: MatchResult,
}

impl MatchRecord {
    pub fn involves(&self, team: &str) -> bool {
        self.home_team == team || self.away_team == team
    }

    pub fn total_goals(&self) -> u32 {
        self.home_goals + self.away_goals
    }
}

/// A match plus the form of both sides as it stood before kick-off.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnrichedMatchRow {
    pub record: MatchRecord,
    pub home_ppg_at_home: f64,
    pub home_overall_ppg: f64,
    pub away_ppg_away: f64,
    pub away_overall_ppg: f64,
    pub home_gpg: f64,
    pub away_gpg: f64,
    pub ppg_diff: f64,
    pub home_away_ppg_diff: f64,
    pub gpg_total: f64,
    pub gpg_diff: f64,
}

/// Candidate regression inputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Feature {
    PpgDiff,
    HomeAwayPpgDiff,
}

impl Feature {
    /// Order matters: on equal scores the earlier candidate is kept.
    pub const CANDIDATES: [Feature; 2] = [Feature::PpgDiff, Feature::HomeAwayPpgDiff];

    pub fn name(self) -> &'static str {
        match self {
            Self::PpgDiff => "PpgDiff",
            Self::HomeAwayPpgDiff => "HomeAwayPpgDiff",
        }
    }

    pub fn value(self, row: &EnrichedMatchRow) -> f64 {
        match self {
            Self::PpgDiff => row.ppg_diff,
            Self::HomeAwayPpgDiff => row.home_away_ppg_diff,
        }
    }
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Upcoming match, team names already canonical.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fixture {
    pub div: String,
    pub date: String,
    pub time: String,
    pub home_team: String,
    pub away_team: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Prediction {
    pub home_team: String,
    pub away_team: String,
    pub date: String,
    pub time: String,
    pub home_pct: f64,
    pub draw_pct: f64,
    pub away_pct: f64,
    /// `None` when the model priced the outcome at or below 0%.
    pub home_odds: Option<f64>,
    pub draw_odds: Option<f64>,
    pub away_odds: Option<f64>,
}

/// Which feature won for an outcome and how well it fit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelSummary {
    pub outcome: MatchResult,
    pub feature: Feature,
    pub score: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeaguePredictions {
    pub div: String,
    pub league: String,
    pub models: Vec<ModelSummary>,
    pub predictions: Vec<Prediction>,
}

impl LeaguePredictions {
    pub fn model(&self, outcome: MatchResult) -> Option<&ModelSummary> {
        self.models.iter().find(|m| m.outcome == outcome)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OverUnderPrediction {
    pub date: String,
    pub time: String,
    pub home_team: String,
    pub away_team: String,
    pub is_over_25: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeagueOverUnder {
    pub div: String,
    pub league: String,
    pub predictions: Vec<OverUnderPrediction>,
}

// API Response types

#[derive(Debug, Clone, Serialize)]
pub struct LeagueSummary {
    pub div: String,
    pub name: String,
    pub matches: i64,
    pub eligible: bool,
}

/// One line of a league form table.
#[derive(Debug, Clone, Serialize)]
pub struct TeamForm {
    pub team: String,
    pub played: u32,
    pub points: u32,
    pub ppg: f64,
    pub home_ppg: f64,
    pub away_ppg: f64,
    pub gpg: f64,
}

#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            timestamp: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_points_mapping() {
        assert_eq!(MatchResult::Home.points(), (3, 0));
        assert_eq!(MatchResult::Draw.points(), (1, 1));
        assert_eq!(MatchResult::Away.points(), (0, 3));
    }

    #[test]
    fn test_result_codes() {
        assert_eq!(MatchResult::from_code(" D "), Some(MatchResult::Draw));
        assert_eq!(MatchResult::from_code(""), None);
        for result in MatchResult::ALL {
            assert_eq!(MatchResult::from_code(result.code()), Some(result));
        }
    }
}
