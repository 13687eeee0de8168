use thiserror::Error;

use crate::models::MatchResult;

/// Recoverable conditions raised by the prediction engine. Each one is scoped
/// to a single league or fixture; callers log it and move on.
#[derive(Debug, Error)]
pub enum PredictionError {
    #[error("no historical matches for league {0}")]
    MissingHistory(String),

    #[error("{team} has no usable appearances in the {div} inference window")]
    UnknownTeam { div: String, team: String },

    #[error("no fittable {outcome} model for league {div}")]
    Unfittable { div: String, outcome: MatchResult },

    #[error("no usable input: {0}")]
    NoUsableInput(String),
}
