/// Break-even decimal odds for a percentage on a 0-100 scale.
/// `None` when the percentage is zero or negative, since no price exists.
pub fn fair_odds(pct: f64) -> Option<f64> {
    if pct.is_finite() && pct > 0.0 {
        Some(100.0 / pct)
    } else {
        None
    }
}

/// Render optional odds for a report line.
pub fn format_odds(odds: Option<f64>) -> String {
    match odds {
        Some(o) => format!("{:.2}", o),
        None => "n/a".to_string(),
    }
}

/// Validate team name format
pub fn validate_team_name(name: &str) -> bool {
    !name.trim().is_empty() && name.len() <= 100
}

/// Division codes are short upper-case alphanumerics such as `E0` or `SWZ`.
pub fn validate_division(div: &str) -> bool {
    (1..=4).contains(&div.len()) && div.chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit())
}
