pub mod tables;

pub use tables::{Divisions, TeamNames, Tables};

use anyhow::{Context, Result};
use std::env;
use std::path::PathBuf;

use crate::services::frequency::WARM_UP_ROWS;

const DEFAULT_DATABASE_URL: &str = "sqlite:data/formcast.db";
const DEFAULT_FOOTBALL_DATA_URL: &str = "https://www.football-data.co.uk";

/// Runtime configuration, read once at startup and passed down explicitly.
#[derive(Debug, Clone)]
pub struct Settings {
    pub database_url: String,
    pub latest_season: Option<String>,
    pub previous_seasons: Vec<String>,
    pub main_leagues: Vec<String>,
    pub new_leagues: Vec<String>,
    pub prediction_cutoff: u32,
    pub draw_cutoff: u32,
    pub warm_up_rows: usize,
    pub over_under_excluded: Vec<String>,
    pub football_data_base_url: String,
    pub fixtures_url: Option<String>,
    pub fixtures_days: Option<u32>,
    pub notify_webhook_url: Option<String>,
    pub email_recipient: Option<String>,
    pub email_sender: Option<String>,
    pub team_names_path: Option<PathBuf>,
    pub divisions_path: Option<PathBuf>,
}

impl Settings {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(get: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| get(key).filter(|v| !v.trim().is_empty());
        let list = |key: &str| get(key).map(|v| parse_league_list(&v)).unwrap_or_default();

        Ok(Self {
            database_url: get("DATABASE_URL").unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string()),
            latest_season: get("LATEST_SEASON").map(|s| s.trim().to_string()),
            previous_seasons: list("PREVIOUS_SEASONS"),
            main_leagues: list("MAIN_LEAGUES"),
            new_leagues: list("NEW_LEAGUES"),
            prediction_cutoff: parse_number(get("PREDICTION_CUTOFF"), "PREDICTION_CUTOFF", 65)?,
            draw_cutoff: parse_number(get("DRAW_CUTOFF"), "DRAW_CUTOFF", 30)?,
            warm_up_rows: parse_number(get("WARM_UP_ROWS"), "WARM_UP_ROWS", WARM_UP_ROWS as u32)? as usize,
            over_under_excluded: get("OVER_UNDER_EXCLUDED_LEAGUES")
                .map(|v| parse_league_list(&v))
                .unwrap_or_else(|| vec!["SP1".to_string(), "SP2".to_string()]),
            football_data_base_url: get("FOOTBALL_DATA_BASE_URL")
                .unwrap_or_else(|| DEFAULT_FOOTBALL_DATA_URL.to_string()),
            fixtures_url: get("FIXTURES_URL"),
            fixtures_days: get("FIXTURES_DAYS")
                .map(|v| v.trim().parse().context("FIXTURES_DAYS must be a whole number"))
                .transpose()?,
            notify_webhook_url: get("NOTIFY_WEBHOOK_URL"),
            email_recipient: get("EMAIL_RECIPIENT"),
            email_sender: get("EMAIL_SENDER"),
            team_names_path: get("TEAM_NAMES_PATH").map(PathBuf::from),
            divisions_path: get("DIVISIONS_PATH").map(PathBuf::from),
        })
    }

    /// Leagues allowed into the prediction run.
    pub fn is_eligible(&self, div: &str) -> bool {
        self.main_leagues.iter().chain(&self.new_leagues).any(|l| l == div)
    }

    /// Over/under runs on main leagues only, minus the exclusion list.
    pub fn is_over_under_eligible(&self, div: &str) -> bool {
        self.main_leagues.iter().any(|l| l == div)
            && !self.over_under_excluded.iter().any(|l| l == div)
    }

    pub fn load_tables(&self) -> Result<Tables> {
        let tables = match (&self.divisions_path, &self.team_names_path) {
            (None, None) => Tables::embedded()?,
            (divisions_path, team_names_path) => Tables {
                divisions: match divisions_path {
                    Some(path) => Divisions::from_path(path)?,
                    None => Divisions::embedded()?,
                },
                team_names: match team_names_path {
                    Some(path) => TeamNames::from_path(path)?,
                    None => TeamNames::embedded()?,
                },
            },
        };
        tracing::debug!(
            "Loaded divisions v{} and team names v{}",
            tables.divisions.version,
            tables.team_names.version
        );
        Ok(tables)
    }
}

/// Split a league list on commas and whitespace.
pub fn parse_league_list(raw: &str) -> Vec<String> {
    raw.split(|c: char| c == ',' || c.is_whitespace())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_number(value: Option<String>, key: &str, default: u32) -> Result<u32> {
    match value {
        Some(v) => v
            .trim()
            .parse()
            .with_context(|| format!("{} must be a whole number, got {:?}", key, v)),
        None => Ok(default),
    }
}
