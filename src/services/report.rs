use serde::Serialize;

use crate::models::{LeagueOverUnder, LeaguePredictions, MatchResult, Prediction};
use crate::utils::format_odds;

const RULE: &str = "==================================================";
const THIN_RULE: &str = "--------------------------------------------------";

/// Lower/upper bounds (inclusive/exclusive) for both sides of a draw pick.
const DRAW_SIDE_RANGE: std::ops::Range<f64> = 20.0..50.0;
/// Max home/away spread for a draw pick.
const DRAW_MAX_SPREAD: f64 = 15.0;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Report {
    pub subject: String,
    pub body: String,
}

/// Formats engine output into plain-text reports. A report with no
/// qualifying lines is `None` and must not be sent.
#[derive(Debug, Clone)]
pub struct ReportAssembler {
    prediction_cutoff: f64,
    draw_cutoff: f64,
}

impl ReportAssembler {
    pub fn new(prediction_cutoff: u32, draw_cutoff: u32) -> Self {
        Self {
            prediction_cutoff: prediction_cutoff as f64,
            draw_cutoff: draw_cutoff as f64,
        }
    }

    pub fn full_report(&self, leagues: &[LeaguePredictions]) -> Option<Report> {
        if leagues.is_empty() {
            return None;
        }

        let mut body = String::new();
        for league in leagues {
            body.push_str(&format!("\n{}\n{}: {}\n{}\n", RULE, league.div, league.league, RULE));
            for outcome in [MatchResult::Home, MatchResult::Away, MatchResult::Draw] {
                if let Some(model) = league.model(outcome) {
                    body.push_str(&format!(
                        "{} ({}) {:.2}\n",
                        outcome, model.feature, model.score
                    ));
                }
            }
            body.push('\n');

            for p in &league.predictions {
                body.push_str(&format!("\n{} v. {}\n{}\n", p.home_team, p.away_team, THIN_RULE));
                body.push_str(&format!("Home: {:.2}   ({})\n", p.home_pct, format_odds(p.home_odds)));
                body.push_str(&format!("Draw: {:.2}   ({})\n", p.draw_pct, format_odds(p.draw_odds)));
                body.push_str(&format!("Away: {:.2}   ({})\n\n", p.away_pct, format_odds(p.away_odds)));
            }
        }

        Some(Report {
            subject: "Football predictions (Home/Away)".to_string(),
            body,
        })
    }

    pub fn high_confidence_report(&self, leagues: &[LeaguePredictions]) -> Option<Report> {
        let body = self.sections(leagues, |p| {
            let mut lines = Vec::new();
            if p.home_pct >= self.prediction_cutoff {
                lines.push(pick_line(p, &p.home_team, p.home_pct, p.home_odds));
            }
            if p.away_pct >= self.prediction_cutoff {
                lines.push(pick_line(p, &p.away_team, p.away_pct, p.away_odds));
            }
            lines
        })?;

        Some(Report {
            subject: format!("Top football predictions (cutoff = {:.2}%)", self.prediction_cutoff),
            body,
        })
    }

    pub fn draw_report(&self, leagues: &[LeaguePredictions]) -> Option<Report> {
        let body = self.sections(leagues, |p| {
            if self.is_draw_pick(p) {
                vec![pick_line(p, "Draw", p.draw_pct, p.draw_odds)]
            } else {
                Vec::new()
            }
        })?;

        Some(Report {
            subject: format!("Football draw predictions (cutoff = {:.2}%)", self.draw_cutoff),
            body,
        })
    }

    /// Draw likely enough and neither side a standout favourite.
    pub fn is_draw_pick(&self, p: &Prediction) -> bool {
        p.draw_pct >= self.draw_cutoff
            && DRAW_SIDE_RANGE.contains(&p.home_pct)
            && DRAW_SIDE_RANGE.contains(&p.away_pct)
            && (p.home_pct - p.away_pct).abs() < DRAW_MAX_SPREAD
    }

    pub fn over_under_report(&self, leagues: &[LeagueOverUnder]) -> Option<Report> {
        let mut body = String::new();
        for league in leagues.iter().filter(|l| !l.predictions.is_empty()) {
            body.push_str(&league_header(&league.div, &league.league));
            for p in &league.predictions {
                let outcome = if p.is_over_25 { "over" } else { "under" };
                body.push_str(&format!(
                    "{} {} : {} -- {} v. {}\n",
                    p.date, p.time, outcome, p.home_team, p.away_team
                ));
            }
        }

        if body.is_empty() {
            return None;
        }
        Some(Report {
            subject: "Football predictions (Over/Under 2.5 goals)".to_string(),
            body,
        })
    }

    /// One section per league that yields at least one line.
    fn sections<F>(&self, leagues: &[LeaguePredictions], lines_for: F) -> Option<String>
    where
        F: Fn(&Prediction) -> Vec<String>,
    {
        let mut body = String::new();
        for league in leagues {
            let lines: Vec<String> = league.predictions.iter().flat_map(&lines_for).collect();
            if lines.is_empty() {
                continue;
            }
            body.push_str(&league_header(&league.div, &league.league));
            for line in lines {
                body.push_str(&line);
            }
        }
        (!body.is_empty()).then_some(body)
    }
}

fn league_header(div: &str, league: &str) -> String {
    format!("\n\n{}\n{}: {}\n{}\n", RULE, div, league, RULE)
}

fn pick_line(p: &Prediction, label: &str, pct: f64, odds: Option<f64>) -> String {
    format!(
        "\n{} v. {}\n{}\n{}: {:.2}   ({})\n\n",
        p.home_team,
        p.away_team,
        THIN_RULE,
        label,
        pct,
        format_odds(odds)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Feature, ModelSummary, OverUnderPrediction};
    use crate::utils::fair_odds;

    fn prediction(home: &str, away: &str, home_pct: f64, draw_pct: f64, away_pct: f64) -> Prediction {
        Prediction {
            home_team: home.to_string(),
            away_team: away.to_string(),
            date: "01/06/2025".to_string(),
            time: "15:00".to_string(),
            home_pct,
            draw_pct,
            away_pct,
            home_odds: fair_odds(home_pct),
            draw_odds: fair_odds(draw_pct),
            away_odds: fair_odds(away_pct),
        }
    }

    fn league(div: &str, predictions: Vec<Prediction>) -> LeaguePredictions {
        LeaguePredictions {
            div: div.to_string(),
            league: format!("{} League", div),
            models: MatchResult::ALL
                .iter()
                .map(|o| ModelSummary {
                    outcome: *o,
                    feature: Feature::PpgDiff,
                    score: 0.5,
                })
                .collect(),
            predictions,
        }
    }

    #[test]
    fn test_draw_pick_conditions() {
        let assembler = ReportAssembler::new(65, 30);
        assert!(assembler.is_draw_pick(&prediction("A", "B", 35.0, 32.0, 40.0)));
        assert!(!assembler.is_draw_pick(&prediction("A", "B", 55.0, 32.0, 40.0)));
        assert!(!assembler.is_draw_pick(&prediction("A", "B", 35.0, 29.9, 40.0)));
        assert!(!assembler.is_draw_pick(&prediction("A", "B", 21.0, 35.0, 45.0)));
        assert!(!assembler.is_draw_pick(&prediction("A", "B", 35.0, 32.0, 50.0)));
        assert!(assembler.is_draw_pick(&prediction("A", "B", 20.0, 30.0, 20.0)));
    }

    #[test]
    fn test_draw_report_includes_only_qualifying_fixtures() {
        let assembler = ReportAssembler::new(65, 30);
        let leagues = vec![
            league("E0", vec![
                prediction("Close", "Call", 35.0, 32.0, 40.0),
                prediction("Big", "Favourite", 55.0, 32.0, 40.0),
            ]),
            league("D1", vec![prediction("Far", "Apart", 70.0, 20.0, 10.0)]),
        ];

        let report = assembler.draw_report(&leagues).unwrap();
        assert_eq!(report.subject, "Football draw predictions (cutoff = 30.00%)");
        assert!(report.body.contains("Close v. Call"));
        assert!(report.body.contains("Draw: 32.00   ("));
        assert!(!report.body.contains("Big v. Favourite"));
        assert!(!report.body.contains("D1"));
    }

    #[test]
    fn test_high_confidence_report() {
        let assembler = ReportAssembler::new(65, 30);
        let leagues = vec![league("E0", vec![
            prediction("Strong", "Weak", 70.0, 20.0, 10.0),
            prediction("Minnow", "Giant", 10.0, 20.0, 65.0),
            prediction("Even", "Match", 40.0, 30.0, 30.0),
        ])];

        let report = assembler.high_confidence_report(&leagues).unwrap();
        assert_eq!(report.subject, "Top football predictions (cutoff = 65.00%)");
        assert!(report.body.contains("Strong: 70.00   (1.43)"));
        assert!(report.body.contains("Giant: 65.00   (1.54)"));
        assert!(!report.body.contains("Even v. Match"));
    }

    #[test]
    fn test_empty_reports_are_suppressed() {
        let assembler = ReportAssembler::new(65, 30);
        let leagues = vec![league("E0", vec![prediction("Even", "Match", 40.0, 25.0, 35.0)])];

        assert!(assembler.high_confidence_report(&leagues).is_none());
        assert!(assembler.draw_report(&leagues).is_none());
        assert!(assembler.full_report(&[]).is_none());
        assert!(assembler.over_under_report(&[]).is_none());
    }

    #[test]
    fn test_full_report_guards_missing_prices() {
        let assembler = ReportAssembler::new(65, 30);
        let leagues = vec![league("E0", vec![prediction("Home", "Away", 85.0, 18.0, -3.0)])];

        let report = assembler.full_report(&leagues).unwrap();
        assert!(report.body.contains("E0: E0 League"));
        assert!(report.body.contains("Home (PpgDiff) 0.50"));
        assert!(report.body.contains("Away: -3.00   (n/a)"));
        assert!(!report.body.contains("inf"));
    }

    #[test]
    fn test_over_under_report() {
        let assembler = ReportAssembler::new(65, 30);
        let leagues = vec![LeagueOverUnder {
            div: "E0".to_string(),
            league: "England Premier League".to_string(),
            predictions: vec![OverUnderPrediction {
                date: "10/05/2025".to_string(),
                time: "12:30".to_string(),
                home_team: "Hosts".to_string(),
                away_team: "Visitors".to_string(),
                is_over_25: true,
            }],
        }];

        let report = assembler.over_under_report(&leagues).unwrap();
        assert!(report.body.contains("10/05/2025 12:30 : over -- Hosts v. Visitors"));
    }
}
