use anyhow::{anyhow, Result};
use sqlx::SqlitePool;
use std::path::Path;

use crate::config::{Settings, TeamNames};
use crate::db::{create_pool, get_fixtures, get_league_history, init_database, init_database_with_pool};
use crate::models::EnrichedMatchRow;
use crate::services::{
    deliver_all, notifier_from_settings, over_under_stored, predict_stored, DataFetcher,
    FormStatsBuilder, Report, ReportAssembler,
};

async fn open_store(settings: &Settings) -> Result<SqlitePool> {
    let pool = create_pool(&settings.database_url).await?;
    init_database_with_pool(&pool).await?;
    Ok(pool)
}

pub async fn fetch_data(settings: &Settings, target: &str) -> Result<()> {
    let pool = open_store(settings).await?;
    let tables = settings.load_tables()?;
    let fetcher = DataFetcher::new(settings);

    match target.to_lowercase().as_str() {
        "history" => {
            println!("📥 Fetching historical results...");
            let updated = fetcher.fetch_history(&pool, settings).await?;
            println!("✅ {} leagues updated", updated);
        }
        "fixtures" => {
            println!("📥 Fetching fixtures...");
            let stored = fetcher.fetch_fixtures(&pool, &tables).await?;
            println!("✅ {} fixtures stored", stored);
        }
        "all" => {
            println!("📥 Fetching history and fixtures...");
            fetcher.fetch_all_data(&pool, settings, &tables).await?;
            println!("✅ All data fetched successfully!");
        }
        _ => {
            println!("❌ Unsupported target: {}. Use 'history', 'fixtures', or 'all'", target);
        }
    }

    Ok(())
}

async fn send_or_print(settings: &Settings, reports: Vec<Report>, dry_run: bool) {
    if reports.is_empty() {
        println!("📭 Nothing worth sending.");
        return;
    }

    if dry_run {
        for report in &reports {
            println!("\n📨 {}\n{}", report.subject, report.body);
        }
        return;
    }

    let notifier = notifier_from_settings(settings);
    let delivered = deliver_all(notifier.as_ref(), &reports).await;
    println!("✅ Sent {} of {} reports", delivered, reports.len());
}

pub async fn generate_predictions(settings: &Settings, dry_run: bool) -> Result<()> {
    let pool = open_store(settings).await?;
    let tables = settings.load_tables()?;

    println!("🔮 Generating predictions for upcoming fixtures...");
    let leagues = predict_stored(&pool, settings, &tables).await?;

    let total: usize = leagues.iter().map(|l| l.predictions.len()).sum();
    println!("✅ Predicted {} fixtures across {} leagues", total, leagues.len());

    let assembler = ReportAssembler::new(settings.prediction_cutoff, settings.draw_cutoff);
    let reports: Vec<Report> = [
        assembler.full_report(&leagues),
        assembler.high_confidence_report(&leagues),
        assembler.draw_report(&leagues),
    ]
    .into_iter()
    .flatten()
    .collect();

    send_or_print(settings, reports, dry_run).await;
    Ok(())
}

pub async fn generate_over_under(settings: &Settings, dry_run: bool) -> Result<()> {
    let pool = open_store(settings).await?;
    let tables = settings.load_tables()?;

    println!("⚽ Generating over/under 2.5 predictions...");
    let leagues = over_under_stored(&pool, settings, &tables).await?;

    let assembler = ReportAssembler::new(settings.prediction_cutoff, settings.draw_cutoff);
    let reports: Vec<Report> = assembler.over_under_report(&leagues).into_iter().collect();

    send_or_print(settings, reports, dry_run).await;
    Ok(())
}

pub async fn query_team(settings: &Settings, div: &str, team_name: &str) -> Result<()> {
    let pool = open_store(settings).await?;
    let tables = settings.load_tables()?;
    let team_name = tables.team_names.canonical(div, team_name);

    println!("🔍 Looking up {} in {}", team_name, tables.divisions.name(div));

    let history = get_league_history(&pool, div).await?;
    if history.is_empty() {
        println!("❌ No history stored for {}. Try: formcast fetch --target history", div);
        return Ok(());
    }

    let table = FormStatsBuilder::build(&history);
    let Some(state) = table.team(team_name) else {
        println!("❌ No matches found for '{}'", team_name);
        let known = table.teams.keys().map(String::as_str);
        if let Some((suggestion, _)) = TeamNames::closest(team_name, known) {
            println!("💡 Did you mean '{}'?", suggestion);
        }
        return Ok(());
    };

    println!("📊 Form:");
    println!("   Played: {} ({} home, {} away)", state.matches_played(), state.matches_as_home, state.matches_as_away);
    println!("   Points: {} ({:.2} per game)", state.points(), state.overall_ppg());
    println!("   Home PPG: {:.2} | Away PPG: {:.2}", state.ppg_at_home(), state.ppg_away());
    println!("   Goals per game: {:.2}", state.gpg());

    println!("\n📅 Recent Matches:");
    for m in history.iter().rev().filter(|m| m.involves(team_name)).take(5) {
        let (venue, opponent, scored, conceded) = if m.home_team == team_name {
            ("vs", &m.away_team, m.home_goals, m.away_goals)
        } else {
            ("at", &m.home_team, m.away_goals, m.home_goals)
        };
        let outcome = match scored.cmp(&conceded) {
            std::cmp::Ordering::Greater => "W",
            std::cmp::Ordering::Less => "L",
            std::cmp::Ordering::Equal => "D",
        };
        println!("   {} {} {} ({}-{}) {}", m.date.format("%d/%m/%Y"), venue, opponent, scored, conceded, outcome);
    }

    println!("\n📅 Upcoming Matches:");
    let upcoming: Vec<_> = get_fixtures(&pool)
        .await?
        .into_iter()
        .filter(|f| f.div == div && (f.home_team == team_name || f.away_team == team_name))
        .collect();
    if upcoming.is_empty() {
        println!("   No upcoming matches found");
    }
    for f in upcoming {
        if f.home_team == team_name {
            println!("   {} {} vs {}", f.date, f.time, f.away_team);
        } else {
            println!("   {} {} at {}", f.date, f.time, f.home_team);
        }
    }

    Ok(())
}

const EXPORT_HEADER: [&str; 17] = [
    "Date", "Season", "HomeTeam", "AwayTeam", "FTHG", "FTAG", "FTR",
    "HomePPGAtHome", "HomeOverallPPG", "AwayPPGAway", "AwayOverallPPG",
    "HomeGPG", "AwayGPG", "PPGDiff", "HomeAwayPPGDiff", "GPGTotal", "GPGDiff",
];

fn export_record(row: &EnrichedMatchRow) -> Vec<String> {
    let r = &row.record;
    let mut fields = vec![
        r.date.format("%Y-%m-%d").to_string(),
        r.season.clone(),
        r.home_team.clone(),
        r.away_team.clone(),
        r.home_goals.to_string(),
        r.away_goals.to_string(),
        r.result.code().to_string(),
    ];
    fields.extend(
        [
            row.home_ppg_at_home,
            row.home_overall_ppg,
            row.away_ppg_away,
            row.away_overall_ppg,
            row.home_gpg,
            row.away_gpg,
            row.ppg_diff,
            row.home_away_ppg_diff,
            row.gpg_total,
            row.gpg_diff,
        ]
        .iter()
        .map(|v| format!("{:.4}", v)),
    );
    fields
}

/// Write the enriched rows for one league as CSV.
pub fn write_features<W: std::io::Write>(rows: &[EnrichedMatchRow], out: W) -> Result<()> {
    let mut writer = csv::Writer::from_writer(out);
    writer.write_record(EXPORT_HEADER)?;
    for row in rows {
        writer.write_record(export_record(row))?;
    }
    writer.flush()?;
    Ok(())
}

pub async fn export_features(settings: &Settings, div: &str, out: &Path) -> Result<()> {
    let pool = open_store(settings).await?;
    let history = get_league_history(&pool, div).await?;
    if history.is_empty() {
        return Err(anyhow!("no history stored for {}", div));
    }

    let table = FormStatsBuilder::build(&history);
    let file = std::fs::File::create(out)?;
    write_features(&table.rows, file)?;

    println!("✅ Wrote {} rows to {}", table.rows.len(), out.display());
    Ok(())
}

pub async fn init_db(settings: &Settings) -> Result<()> {
    init_database(&settings.database_url).await?;
    println!("✅ Database ready at {}", settings.database_url);
    Ok(())
}
