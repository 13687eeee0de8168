//! CSV ingestion boundary.
//!
//! Vendor tables spell the same column several ways (`HG` vs `FTHG`, `Home`
//! vs `HomeTeam`). Headers are resolved to canonical fields once, here, and
//! records leave this module sorted by date so the form builder can rely on
//! chronological order.

use chrono::NaiveDate;
use csv::{ReaderBuilder, StringRecord, Trim};
use thiserror::Error;

use crate::config::{Divisions, TeamNames};
use crate::models::{Fixture, MatchRecord, MatchResult};
use crate::utils::{validate_division, validate_team_name};

const HOME_TEAM: &[&str] = &["HomeTeam", "Home"];
const AWAY_TEAM: &[&str] = &["AwayTeam", "Away"];
const HOME_GOALS: &[&str] = &["FTHG", "HG"];
const AWAY_GOALS: &[&str] = &["FTAG", "AG"];
const RESULT: &[&str] = &["FTR", "Res"];
const DATE: &[&str] = &["Date"];
const TIME: &[&str] = &["Time"];
const SEASON: &[&str] = &["Season"];
const DIV: &[&str] = &["Div"];
const COUNTRY: &[&str] = &["Country"];
const LEAGUE: &[&str] = &["League"];

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("missing column {0}")]
    MissingColumn(&'static str),

    #[error("fixtures need either a Div column or Country and League columns")]
    NoDivisionColumns,

    #[error(transparent)]
    Csv(#[from] csv::Error),
}

fn column(headers: &StringRecord, aliases: &[&str]) -> Option<usize> {
    aliases
        .iter()
        .find_map(|alias| headers.iter().position(|h| h == *alias))
}

fn required(headers: &StringRecord, aliases: &'static [&'static str]) -> Result<usize, IngestError> {
    column(headers, aliases).ok_or(IngestError::MissingColumn(aliases[0]))
}

fn field<'r>(record: &'r StringRecord, index: usize) -> &'r str {
    record.get(index).unwrap_or("")
}

/// Column positions of a historical results table.
#[derive(Debug, Clone, Copy)]
pub struct HistoricalSchema {
    date: usize,
    home_team: usize,
    away_team: usize,
    home_goals: usize,
    away_goals: usize,
    result: usize,
    season: Option<usize>,
}

impl HistoricalSchema {
    pub fn from_headers(headers: &StringRecord) -> Result<Self, IngestError> {
        Ok(Self {
            date: required(headers, DATE)?,
            home_team: required(headers, HOME_TEAM)?,
            away_team: required(headers, AWAY_TEAM)?,
            home_goals: required(headers, HOME_GOALS)?,
            away_goals: required(headers, AWAY_GOALS)?,
            result: required(headers, RESULT)?,
            season: column(headers, SEASON),
        })
    }

    fn record(&self, row: &StringRecord, default_season: &str) -> Option<MatchRecord> {
        let home_team = field(row, self.home_team);
        let away_team = field(row, self.away_team);
        if !validate_team_name(home_team) || !validate_team_name(away_team) {
            return None;
        }

        let season = self
            .season
            .map(|i| field(row, i))
            .filter(|s| !s.is_empty())
            .unwrap_or(default_season);

        Some(MatchRecord {
            date: parse_match_date(field(row, self.date))?,
            season: season.to_string(),
            home_team: home_team.to_string(),
            away_team: away_team.to_string(),
            home_goals: field(row, self.home_goals).parse().ok()?,
            away_goals: field(row, self.away_goals).parse().ok()?,
            result: MatchResult::from_code(field(row, self.result))?,
        })
    }
}

/// Dates appear as `dd/mm/yyyy`, `dd/mm/yy` or ISO.
pub fn parse_match_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Some(date);
    }
    // %Y also accepts "23" as year 0023, so pick the format by the year's width.
    let year_digits = raw.rsplit('/').next().map(str::len)?;
    let fmt = if year_digits == 2 { "%d/%m/%y" } else { "%d/%m/%Y" };
    NaiveDate::parse_from_str(raw, fmt).ok()
}

fn reader(text: &str) -> csv::Reader<&[u8]> {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    ReaderBuilder::new()
        .flexible(true)
        .trim(Trim::All)
        .from_reader(text.as_bytes())
}

/// Parse a historical results table. Unplayed or malformed rows are skipped.
pub fn parse_history(text: &str, default_season: &str) -> Result<Vec<MatchRecord>, IngestError> {
    let mut rdr = reader(text);
    let schema = HistoricalSchema::from_headers(rdr.headers()?)?;

    let mut records = Vec::new();
    let mut skipped = 0usize;
    for row in rdr.records() {
        match schema.record(&row?, default_season) {
            Some(record) => records.push(record),
            None => skipped += 1,
        }
    }
    if skipped > 0 {
        tracing::debug!("Skipped {} incomplete history rows", skipped);
    }

    Ok(records)
}

/// Stable sort by match date; same-day matches keep their source order.
pub fn sort_chronologically(records: &mut [MatchRecord]) {
    records.sort_by_key(|r| r.date);
}

/// Parse an upcoming-fixtures table into canonical divisions and team names.
/// Rows for divisions we don't track are dropped.
pub fn parse_fixtures(
    text: &str,
    divisions: &Divisions,
    team_names: &TeamNames,
) -> Result<Vec<Fixture>, IngestError> {
    let mut rdr = reader(text);
    let headers = rdr.headers()?.clone();

    let div_col = column(&headers, DIV);
    let country_col = column(&headers, COUNTRY);
    let league_col = column(&headers, LEAGUE);
    if div_col.is_none() && (country_col.is_none() || league_col.is_none()) {
        return Err(IngestError::NoDivisionColumns);
    }
    let home_col = required(&headers, HOME_TEAM)?;
    let away_col = required(&headers, AWAY_TEAM)?;
    let date_col = column(&headers, DATE);
    let time_col = column(&headers, TIME);

    let mut fixtures = Vec::new();
    for row in rdr.records() {
        let row = row?;
        let div = match (div_col, country_col, league_col) {
            (Some(i), _, _) => Some(field(&row, i)).filter(|d| validate_division(d)),
            (None, Some(c), Some(l)) => divisions.lookup(field(&row, c), field(&row, l)),
            _ => None,
        };
        let Some(div) = div else { continue };

        let home_team = field(&row, home_col);
        let away_team = field(&row, away_col);
        if !validate_team_name(home_team) || !validate_team_name(away_team) {
            continue;
        }

        fixtures.push(Fixture {
            div: div.to_string(),
            date: date_col.map(|i| field(&row, i)).unwrap_or_default().to_string(),
            time: time_col.map(|i| field(&row, i)).unwrap_or_default().to_string(),
            home_team: team_names.canonical(div, home_team).to_string(),
            away_team: team_names.canonical(div, away_team).to_string(),
        });
    }

    fixtures.sort_by(|a, b| a.div.cmp(&b.div));
    Ok(fixtures)
}
