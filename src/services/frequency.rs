use crate::models::{EnrichedMatchRow, Feature, MatchResult};

/// Rows skipped at the start of a history while rolling stats settle.
pub const WARM_UP_ROWS: usize = 50;
pub const BUCKET_STEP: f64 = 0.1;

/// Aligned (bucket value, outcome percentage) training points.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrequencyCurve {
    pub diffs: Vec<f64>,
    pub pcts: Vec<f64>,
}

impl FrequencyCurve {
    pub fn len(&self) -> usize {
        self.diffs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.diffs.is_empty()
    }
}

/// Turns a feature column into empirical outcome frequencies per fixed-width
/// bucket. Percentages are on a 0-100 scale.
#[derive(Debug, Clone)]
pub struct BucketedFrequencyEstimator {
    warm_up: usize,
    step: f64,
    lower_quantile: f64,
    upper_quantile: f64,
}

impl Default for BucketedFrequencyEstimator {
    fn default() -> Self {
        Self {
            warm_up: WARM_UP_ROWS,
            step: BUCKET_STEP,
            lower_quantile: 0.05,
            upper_quantile: 0.95,
        }
    }
}

impl BucketedFrequencyEstimator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_warm_up(mut self, warm_up: usize) -> Self {
        self.warm_up = warm_up;
        self
    }

    pub fn estimate(
        &self,
        rows: &[EnrichedMatchRow],
        feature: Feature,
        target: MatchResult,
    ) -> FrequencyCurve {
        let settled = rows.get(self.warm_up..).unwrap_or(&[]);
        if settled.is_empty() {
            return FrequencyCurve::default();
        }

        let values: Vec<f64> = settled.iter().map(|row| feature.value(row)).collect();
        let mut sorted = values.clone();
        sorted.sort_by(f64::total_cmp);
        let lo = quantile(&sorted, self.lower_quantile);
        let hi = quantile(&sorted, self.upper_quantile);

        let n_buckets = if hi > lo {
            ((hi - lo) / self.step).ceil() as usize
        } else {
            0
        };

        let mut curve = FrequencyCurve::default();
        for k in 0..n_buckets {
            let bucket_lo = lo + k as f64 * self.step;
            let bucket_hi = bucket_lo + self.step;

            let mut counts = [0usize; 3];
            for (value, row) in values.iter().zip(settled) {
                if *value >= bucket_lo && *value < bucket_hi {
                    counts[outcome_index(row.record.result)] += 1;
                }
            }

            let hits = counts[outcome_index(target)];
            // Empty-for-target buckets are dropped, not recorded as 0%.
            if hits == 0 {
                continue;
            }
            let total: usize = counts.iter().sum();
            curve.diffs.push(bucket_lo + self.step / 2.0);
            curve.pcts.push(100.0 * hits as f64 / total as f64);
        }

        curve
    }
}

fn outcome_index(result: MatchResult) -> usize {
    match result {
        MatchResult::Home => 0,
        MatchResult::Draw => 1,
        MatchResult::Away => 2,
    }
}

/// Quantile of an ascending slice, interpolating linearly between ranks.
pub fn quantile(sorted: &[f64], q: f64) -> f64 {
    match sorted.len() {
        0 => f64::NAN,
        1 => sorted[0],
        n => {
            let position = q.clamp(0.0, 1.0) * (n - 1) as f64;
            let below = position.floor() as usize;
            let above = (below + 1).min(n - 1);
            let fraction = position - below as f64;
            sorted[below] + (sorted[above] - sorted[below]) * fraction
        }
    }
}
