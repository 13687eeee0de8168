//! Versioned lookup data: division codes and vendor team-name corrections.
//!
//! The defaults ship in `data/*.json` and are compiled in; a path in the
//! settings replaces them without touching code.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

const EMBEDDED_DIVISIONS: &str = include_str!("../../data/divisions.json");
const EMBEDDED_TEAM_NAMES: &str = include_str!("../../data/team_names.json");

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Division {
    pub country: String,
    pub league: String,
    pub div: String,
}

impl Division {
    pub fn display_name(&self) -> String {
        format!("{} {}", self.country, self.league)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Divisions {
    pub version: u32,
    divisions: Vec<Division>,
}

impl Divisions {
    pub fn embedded() -> Result<Self> {
        Self::from_json(EMBEDDED_DIVISIONS)
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading divisions table {}", path.display()))?;
        Self::from_json(&raw)
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        serde_json::from_str(raw).context("parsing divisions table")
    }

    /// Division code for a fixture vendor's (country, league) pair.
    pub fn lookup(&self, country: &str, league: &str) -> Option<&str> {
        self.divisions
            .iter()
            .find(|d| d.country == country && d.league == league)
            .map(|d| d.div.as_str())
    }

    /// Human-readable name for a division code, falling back to the code.
    pub fn name(&self, div: &str) -> String {
        self.divisions
            .iter()
            .find(|d| d.div == div)
            .map(Division::display_name)
            .unwrap_or_else(|| div.to_string())
    }
}

/// Vendor → canonical team names, keyed by division.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TeamNames {
    pub version: u32,
    teams: HashMap<String, HashMap<String, String>>,
}

impl TeamNames {
    pub fn embedded() -> Result<Self> {
        Self::from_json(EMBEDDED_TEAM_NAMES)
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading team names table {}", path.display()))?;
        Self::from_json(&raw)
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        serde_json::from_str(raw).context("parsing team names table")
    }

    /// Canonical name for `name` in `div`; unknown names pass through unchanged.
    pub fn canonical<'a>(&'a self, div: &str, name: &'a str) -> &'a str {
        self.teams
            .get(div)
            .and_then(|names| names.get(name))
            .map(String::as_str)
            .unwrap_or(name)
    }

    /// Closest known name by Jaro-Winkler similarity, for diagnostics only.
    pub fn closest<'a, I>(name: &str, known: I) -> Option<(&'a str, f64)>
    where
        I: IntoIterator<Item = &'a str>,
    {
        known
            .into_iter()
            .map(|candidate| (candidate, strsim::jaro_winkler(name, candidate)))
            .max_by(|a, b| a.1.total_cmp(&b.1))
    }
}

#[derive(Debug, Clone)]
pub struct Tables {
    pub divisions: Divisions,
    pub team_names: TeamNames,
}

impl Tables {
    pub fn embedded() -> Result<Self> {
        Ok(Self {
            divisions: Divisions::embedded()?,
            team_names: TeamNames::embedded()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embedded_tables_parse() {
        let divisions = Divisions::embedded().unwrap();
        assert_eq!(divisions.lookup("England", "Premier League"), Some("E0"));
        assert_eq!(divisions.lookup("Spain", "LaLiga"), Some("SP1"));
        assert_eq!(divisions.lookup("Atlantis", "Premier League"), None);
        assert_eq!(divisions.name("D1"), "Germany Bundesliga");
        assert_eq!(divisions.name("ZZ9"), "ZZ9");

        let names = TeamNames::embedded().unwrap();
        assert_eq!(names.canonical("E0", "Manchester United"), "Man United");
    }

    #[test]
    fn test_unknown_name_is_unchanged() {
        let names = TeamNames::embedded().unwrap();
        assert_eq!(names.canonical("E0", "Nowhere Rovers"), "Nowhere Rovers");
        assert_eq!(names.canonical("XX", "Manchester United"), "Manchester United");
        assert_eq!(TeamNames::default().canonical("E0", "Arsenal"), "Arsenal");
    }

    #[test]
    fn test_closest_name() {
        let known = ["Man United", "Man City", "Arsenal"];
        let (best, similarity) = TeamNames::closest("Man Utd", known).unwrap();
        assert_eq!(best, "Man United");
        assert!(similarity > 0.8);
        assert!(TeamNames::closest("Arsenal", std::iter::empty()).is_none());
    }
}
