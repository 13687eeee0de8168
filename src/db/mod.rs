use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Row, SqlitePool};
use std::str::FromStr;

use crate::models::{Fixture, MatchRecord, MatchResult};

const DATE_FORMAT: &str = "%Y-%m-%d";

pub async fn create_pool(database_url: &str) -> Result<SqlitePool> {
    // Strip the "sqlite:" prefix to get the file path, create parent dir if needed
    let file_path = database_url
        .strip_prefix("sqlite:///")
        .or_else(|| database_url.strip_prefix("sqlite://"))
        .or_else(|| database_url.strip_prefix("sqlite:"))
        .unwrap_or(database_url);

    if !file_path.starts_with(":memory:") {
        if let Some(parent) = std::path::Path::new(file_path).parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await.ok();
            }
        }
    }

    let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);

    let pool = SqlitePoolOptions::new()
        // every in-memory connection is its own database
        .max_connections(if file_path.starts_with(":memory:") { 1 } else { 5 })
        .connect_with(options)
        .await?;
    Ok(pool)
}

/// Called from the CLI where no pool exists yet.
pub async fn init_database(database_url: &str) -> Result<()> {
    let pool = create_pool(database_url).await?;
    init_database_with_pool(&pool).await
}

/// Called from the server and commands so schema creation shares the main pool.
pub async fn init_database_with_pool(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS historical_matches (
            div TEXT NOT NULL,
            seq INTEGER NOT NULL,
            match_date TEXT NOT NULL,
            season TEXT NOT NULL,
            home_team TEXT NOT NULL,
            away_team TEXT NOT NULL,
            home_goals INTEGER NOT NULL,
            away_goals INTEGER NOT NULL,
            result TEXT NOT NULL,
            PRIMARY KEY (div, seq)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS fixtures (
            div TEXT NOT NULL,
            match_date TEXT NOT NULL,
            match_time TEXT NOT NULL,
            home_team TEXT NOT NULL,
            away_team TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    // history_fetch_log: remote Last-Modified per source file, so unchanged files are skipped
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS history_fetch_log (
            source        TEXT PRIMARY KEY,
            last_modified TEXT NOT NULL,
            fetched_at    TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_historical_date ON historical_matches(div, match_date)")
        .execute(pool)
        .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_fixtures_div ON fixtures(div)")
        .execute(pool)
        .await?;

    tracing::info!("Database initialized successfully");
    Ok(())
}

// Historical matches

/// Replace a league's whole history in one transaction. `records` must
/// already be in chronological order; `seq` preserves it for same-day games.
pub async fn replace_league_history(pool: &SqlitePool, div: &str, records: &[MatchRecord]) -> Result<()> {
    let mut tx = pool.begin().await?;

    sqlx::query("DELETE FROM historical_matches WHERE div = ?")
        .bind(div)
        .execute(&mut *tx)
        .await?;

    for (seq, record) in records.iter().enumerate() {
        sqlx::query(
            r#"
            INSERT INTO historical_matches
            (div, seq, match_date, season, home_team, away_team, home_goals, away_goals, result)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(div)
        .bind(seq as i64)
        .bind(record.date.format(DATE_FORMAT).to_string())
        .bind(&record.season)
        .bind(&record.home_team)
        .bind(&record.away_team)
        .bind(record.home_goals as i64)
        .bind(record.away_goals as i64)
        .bind(record.result.code())
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    tracing::info!("Stored {} {} matches", records.len(), div);
    Ok(())
}

pub async fn get_league_history(pool: &SqlitePool, div: &str) -> Result<Vec<MatchRecord>> {
    let rows = sqlx::query(
        r#"SELECT match_date, season, home_team, away_team, home_goals, away_goals, result
           FROM historical_matches WHERE div = ? ORDER BY match_date ASC, seq ASC"#,
    )
    .bind(div)
    .fetch_all(pool)
    .await?;

    let mut records = Vec::with_capacity(rows.len());
    for row in rows {
        let date: String = row.get("match_date");
        let result: String = row.get("result");
        records.push(MatchRecord {
            date: NaiveDate::parse_from_str(&date, DATE_FORMAT)
                .with_context(|| format!("bad stored date {:?}", date))?,
            season: row.get("season"),
            home_team: row.get("home_team"),
            away_team: row.get("away_team"),
            home_goals: u32::try_from(row.get::<i64, _>("home_goals"))?,
            away_goals: u32::try_from(row.get::<i64, _>("away_goals"))?,
            result: MatchResult::from_code(&result)
                .ok_or_else(|| anyhow!("bad stored result {:?}", result))?,
        });
    }
    Ok(records)
}

/// Divisions with stored history and their match counts.
pub async fn get_stored_divisions(pool: &SqlitePool) -> Result<Vec<(String, i64)>> {
    let rows = sqlx::query("SELECT div, COUNT(*) AS matches FROM historical_matches GROUP BY div ORDER BY div")
        .fetch_all(pool)
        .await?;
    Ok(rows.iter().map(|r| (r.get("div"), r.get("matches"))).collect())
}

// Fixtures

pub async fn replace_fixtures(pool: &SqlitePool, fixtures: &[Fixture]) -> Result<()> {
    let mut tx = pool.begin().await?;
    sqlx::query("DELETE FROM fixtures").execute(&mut *tx).await?;

    for fixture in fixtures {
        sqlx::query(
            "INSERT INTO fixtures (div, match_date, match_time, home_team, away_team) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&fixture.div)
        .bind(&fixture.date)
        .bind(&fixture.time)
        .bind(&fixture.home_team)
        .bind(&fixture.away_team)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    tracing::info!("Stored {} fixtures", fixtures.len());
    Ok(())
}

pub async fn get_fixtures(pool: &SqlitePool) -> Result<Vec<Fixture>> {
    let rows = sqlx::query("SELECT * FROM fixtures ORDER BY div, rowid")
        .fetch_all(pool)
        .await?;

    Ok(rows
        .iter()
        .map(|row| Fixture {
            div: row.get("div"),
            date: row.get("match_date"),
            time: row.get("match_time"),
            home_team: row.get("home_team"),
            away_team: row.get("away_team"),
        })
        .collect())
}

// Fetch log

pub async fn get_last_modified(pool: &SqlitePool, source: &str) -> Result<Option<DateTime<Utc>>> {
    let row = sqlx::query("SELECT last_modified FROM history_fetch_log WHERE source = ?")
        .bind(source)
        .fetch_optional(pool)
        .await?;

    match row {
        Some(row) => {
            let raw: String = row.get("last_modified");
            Ok(Some(DateTime::parse_from_rfc3339(&raw)?.with_timezone(&Utc)))
        }
        None => Ok(None),
    }
}

pub async fn set_last_modified(pool: &SqlitePool, source: &str, last_modified: DateTime<Utc>) -> Result<()> {
    sqlx::query(
        r#"INSERT INTO history_fetch_log (source, last_modified, fetched_at)
           VALUES (?, ?, ?)
           ON CONFLICT(source) DO UPDATE SET
               last_modified = excluded.last_modified,
               fetched_at    = excluded.fetched_at"#,
    )
    .bind(source)
    .bind(last_modified.to_rfc3339())
    .bind(Utc::now().to_rfc3339())
    .execute(pool)
    .await?;
    Ok(())
}
