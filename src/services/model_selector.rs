use crate::error::PredictionError;
use crate::models::{EnrichedMatchRow, Feature, MatchResult, ModelSummary};
use crate::services::frequency::BucketedFrequencyEstimator;
use crate::services::regression::ScaledLinearModel;

/// A regression from one feature differential to an outcome percentage.
#[derive(Debug, Clone)]
pub struct FittedModel {
    pub outcome: MatchResult,
    pub feature: Feature,
    /// Training R².
    pub score: f64,
    model: ScaledLinearModel,
}

impl FittedModel {
    pub fn predict(&self, diff: f64) -> f64 {
        self.model.predict(diff)
    }

    pub fn summary(&self) -> ModelSummary {
        ModelSummary {
            outcome: self.outcome,
            feature: self.feature,
            score: self.score,
        }
    }
}

/// The winning model for each of the three outcomes of one league.
#[derive(Debug, Clone)]
pub struct OutcomeModels {
    pub home: FittedModel,
    pub draw: FittedModel,
    pub away: FittedModel,
}

impl OutcomeModels {
    pub fn get(&self, outcome: MatchResult) -> &FittedModel {
        match outcome {
            MatchResult::Home => &self.home,
            MatchResult::Draw => &self.draw,
            MatchResult::Away => &self.away,
        }
    }

    pub fn summaries(&self) -> Vec<ModelSummary> {
        MatchResult::ALL.iter().map(|o| self.get(*o).summary()).collect()
    }
}

#[derive(Debug, Clone, Default)]
pub struct ModelSelector {
    estimator: BucketedFrequencyEstimator,
}

impl ModelSelector {
    pub fn new(estimator: BucketedFrequencyEstimator) -> Self {
        Self { estimator }
    }

    /// Fit one candidate; `None` when its bucket set is degenerate.
    pub fn fit_candidate(
        &self,
        rows: &[EnrichedMatchRow],
        feature: Feature,
        outcome: MatchResult,
    ) -> Option<FittedModel> {
        let curve = self.estimator.estimate(rows, feature, outcome);
        if curve.is_empty() {
            return None;
        }
        tracing::trace!("{} on {}: {} buckets", outcome, feature, curve.len());
        let model = ScaledLinearModel::fit(&curve.diffs, &curve.pcts)?;
        let score = model.score(&curve.diffs, &curve.pcts);
        if !score.is_finite() {
            return None;
        }
        Some(FittedModel {
            outcome,
            feature,
            score,
            model,
        })
    }

    /// Best-scoring candidate for `outcome`; on equal scores the feature listed
    /// first in `Feature::CANDIDATES` is kept.
    pub fn select(&self, rows: &[EnrichedMatchRow], outcome: MatchResult) -> Option<FittedModel> {
        Feature::CANDIDATES
            .iter()
            .filter_map(|feature| {
                let fitted = self.fit_candidate(rows, *feature, outcome);
                if fitted.is_none() {
                    tracing::debug!("{} model on {} is unfittable", outcome, feature);
                }
                fitted
            })
            .fold(None, keep_better)
    }

    pub fn select_all(
        &self,
        div: &str,
        rows: &[EnrichedMatchRow],
    ) -> Result<OutcomeModels, PredictionError> {
        let pick = |outcome| {
            self.select(rows, outcome)
                .ok_or_else(|| PredictionError::Unfittable {
                    div: div.to_string(),
                    outcome,
                })
        };

        let models = OutcomeModels {
            home: pick(MatchResult::Home)?,
            draw: pick(MatchResult::Draw)?,
            away: pick(MatchResult::Away)?,
        };

        for model in [&models.home, &models.draw, &models.away] {
            tracing::debug!(
                "{}: {} model uses {} (R² {:.3}, slope {:.3}, intercept {:.3})",
                div,
                model.outcome,
                model.feature,
                model.score,
                model.model.slope(),
                model.model.intercept()
            );
        }

        Ok(models)
    }
}

fn keep_better(best: Option<FittedModel>, candidate: FittedModel) -> Option<FittedModel> {
    match best {
        Some(current) if current.score >= candidate.score => Some(current),
        _ => Some(candidate),
    }
}
