use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use reqwest::{header, Client, Response};
use sqlx::SqlitePool;
use std::time::Duration;

use crate::config::{Settings, Tables};
use crate::db::{get_last_modified, replace_fixtures, replace_league_history, set_last_modified};
use crate::models::MatchRecord;
use crate::services::ingest::{parse_fixtures, parse_history, sort_chronologically};

/// Where one league's history lives upstream.
#[derive(Debug, Clone, PartialEq)]
pub struct HistorySource {
    pub div: String,
    /// Older seasons, oldest first; only main leagues have these.
    pub previous: Vec<(String, String)>,
    /// The file whose Last-Modified decides whether to refresh.
    pub latest: (String, String),
}

pub struct DataFetcher {
    client: Client,
    base_url: String,
    fixtures_url: Option<String>,
    fixtures_days: Option<u32>,
}

impl DataFetcher {
    pub fn new(settings: &Settings) -> Self {
        Self {
            client: Client::new(),
            base_url: settings.football_data_base_url.trim_end_matches('/').to_string(),
            fixtures_url: settings.fixtures_url.clone(),
            fixtures_days: settings.fixtures_days,
        }
    }

    /// Season-by-season files for main leagues, one rolling file for new leagues.
    pub fn history_sources(&self, settings: &Settings) -> Vec<HistorySource> {
        let mut previous_seasons = settings.previous_seasons.clone();
        previous_seasons.sort();

        let mut sources = Vec::new();
        match &settings.latest_season {
            Some(latest) => {
                for div in &settings.main_leagues {
                    sources.push(HistorySource {
                        div: div.clone(),
                        previous: previous_seasons
                            .iter()
                            .map(|s| (s.clone(), self.season_url(s, div)))
                            .collect(),
                        latest: (latest.clone(), self.season_url(latest, div)),
                    });
                }
            }
            None if !settings.main_leagues.is_empty() => {
                tracing::warn!("LATEST_SEASON not set; skipping main leagues");
            }
            None => {}
        }

        for div in &settings.new_leagues {
            sources.push(HistorySource {
                div: div.clone(),
                previous: Vec::new(),
                // the file carries its own Season column
                latest: (String::new(), format!("{}/new/{}.csv", self.base_url, div)),
            });
        }
        sources
    }

    fn season_url(&self, season: &str, div: &str) -> String {
        format!("{}/mmz4281/{}/{}.csv", self.base_url, season, div)
    }

    // ── History ─────────────────────────────────────────────────────────────

    /// Refresh every configured league. Returns how many were rewritten.
    pub async fn fetch_history(&self, pool: &SqlitePool, settings: &Settings) -> Result<usize> {
        let mut updated = 0usize;
        for source in self.history_sources(settings) {
            match self.refresh_league(pool, &source).await {
                Ok(true) => updated += 1,
                Ok(false) => {}
                Err(e) => tracing::error!("Failed to refresh {} history: {}", source.div, e),
            }
        }
        tracing::info!("Number of history updates: {}", updated);
        Ok(updated)
    }

    /// Rewrites the league only when its latest file is newer than our copy.
    pub async fn refresh_league(&self, pool: &SqlitePool, source: &HistorySource) -> Result<bool> {
        let (latest_season, latest_url) = &source.latest;
        let response = self.get(latest_url).await?;
        let theirs = last_modified(&response);
        tracing::info!("{} last modified: {:?}", latest_url, theirs);

        let ours = get_last_modified(pool, &source.div).await?;
        if !is_newer(theirs, ours) {
            tracing::info!("No changes for {}", source.div);
            return Ok(false);
        }
        let latest_text = response.text().await?;

        let mut records: Vec<MatchRecord> = Vec::new();
        for (season, url) in &source.previous {
            let text = self.get(url).await?.text().await?;
            records.extend(parse_history(&text, season)?);
        }
        records.extend(parse_history(&latest_text, latest_season)?);
        sort_chronologically(&mut records);

        replace_league_history(pool, &source.div, &records).await?;
        if let Some(stamp) = theirs {
            set_last_modified(pool, &source.div, stamp).await?;
        }
        Ok(true)
    }

    // ── Fixtures ────────────────────────────────────────────────────────────

    pub async fn fetch_fixtures(&self, pool: &SqlitePool, tables: &Tables) -> Result<usize> {
        let base = self
            .fixtures_url
            .as_ref()
            .ok_or_else(|| anyhow!("FIXTURES_URL not set"))?;
        let url = match self.fixtures_days {
            Some(days) => format!("{}?days={}", base, days),
            None => base.clone(),
        };

        tracing::info!("Fetching fixtures from {}", url);
        let text = self.get_with_retry(&url).await?.text().await?;

        let fixtures = parse_fixtures(&text, &tables.divisions, &tables.team_names)?;
        replace_fixtures(pool, &fixtures).await?;
        Ok(fixtures.len())
    }

    // ── Combined fetch ──────────────────────────────────────────────────────

    pub async fn fetch_all_data(&self, pool: &SqlitePool, settings: &Settings, tables: &Tables) -> Result<()> {
        self.fetch_history(pool, settings).await?;

        if self.fixtures_url.is_some() {
            self.fetch_fixtures(pool, tables).await?;
        } else {
            tracing::warn!("FIXTURES_URL not set; skipping fixtures");
        }
        Ok(())
    }

    async fn get(&self, url: &str) -> Result<Response> {
        let response = self.client.get(url).send().await?;
        if !response.status().is_success() {
            let status = response.status();
            return Err(anyhow!("Can't download from {}: HTTP {}", url, status));
        }
        Ok(response)
    }

    /// The fixtures feed is slow and flaky; retry server errors with backoff.
    async fn get_with_retry(&self, url: &str) -> Result<Response> {
        let mut attempts = 0u32;
        loop {
            attempts += 1;
            let resp = self
                .client
                .get(url)
                .timeout(Duration::from_secs(240))
                .send()
                .await?;

            if resp.status().is_server_error() && attempts < 5 {
                let wait = 2u64.pow(attempts - 1); // 1s, 2s, 4s, 8s
                tracing::warn!("Fixtures HTTP {}; retrying in {}s (attempt {})", resp.status(), wait, attempts);
                tokio::time::sleep(Duration::from_secs(wait)).await;
                continue;
            }

            if !resp.status().is_success() {
                let status = resp.status();
                let body = resp.text().await.unwrap_or_default();
                return Err(anyhow!("Fixtures API error {}: {}", status, body));
            }
            return Ok(resp);
        }
    }
}

fn last_modified(response: &Response) -> Option<DateTime<Utc>> {
    let raw = response.headers().get(header::LAST_MODIFIED)?.to_str().ok()?;
    parse_http_date(raw)
}

pub fn parse_http_date(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc2822(raw)
        .ok()
        .map(|d| d.with_timezone(&Utc))
}

/// Unknown remote times always refresh; otherwise only strictly newer files do.
fn is_newer(theirs: Option<DateTime<Utc>>, ours: Option<DateTime<Utc>>) -> bool {
    match (theirs, ours) {
        (Some(theirs), Some(ours)) => theirs > ours,
        _ => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn settings(vars: &[(&str, &str)]) -> Settings {
        let vars: Vec<(String, String)> = vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        Settings::from_lookup(|key| vars.iter().find(|(k, _)| k == key).map(|(_, v)| v.clone())).unwrap()
    }

    #[test]
    fn test_history_sources() {
        let settings = settings(&[
            ("FOOTBALL_DATA_BASE_URL", "https://data.example/"),
            ("LATEST_SEASON", "2425"),
            ("PREVIOUS_SEASONS", "2324,2223"),
            ("MAIN_LEAGUES", "E0"),
            ("NEW_LEAGUES", "BRA"),
        ]);
        let sources = DataFetcher::new(&settings).history_sources(&settings);

        assert_eq!(sources.len(), 2);
        assert_eq!(
            sources[0].previous,
            vec![
                ("2223".to_string(), "https://data.example/mmz4281/2223/E0.csv".to_string()),
                ("2324".to_string(), "https://data.example/mmz4281/2324/E0.csv".to_string()),
            ]
        );
        assert_eq!(sources[0].latest.1, "https://data.example/mmz4281/2425/E0.csv");
        assert_eq!(sources[1].div, "BRA");
        assert!(sources[1].previous.is_empty());
        assert_eq!(sources[1].latest.1, "https://data.example/new/BRA.csv");
    }

    #[test]
    fn test_main_leagues_need_a_latest_season() {
        let settings = settings(&[("MAIN_LEAGUES", "E0,D1"), ("NEW_LEAGUES", "SWE")]);
        let sources = DataFetcher::new(&settings).history_sources(&settings);
        assert_eq!(sources.len(), 1);
        assert_eq!(sources[0].div, "SWE");
    }

    #[test]
    fn test_refresh_decision() {
        let stamp = parse_http_date("Tue, 20 May 2025 08:00:00 GMT").unwrap();
        assert_eq!(stamp, Utc.with_ymd_and_hms(2025, 5, 20, 8, 0, 0).unwrap());

        let earlier = stamp - chrono::Duration::hours(1);
        assert!(is_newer(Some(stamp), Some(earlier)));
        assert!(!is_newer(Some(stamp), Some(stamp)));
        assert!(!is_newer(Some(earlier), Some(stamp)));
        assert!(is_newer(Some(stamp), None));
        assert!(is_newer(None, Some(stamp)));
    }
}
