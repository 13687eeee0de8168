use nalgebra::{DMatrix, DVector};
use serde::Serialize;
use statrs::statistics::Statistics;

const RESIDUAL_TOLERANCE: f64 = 1e-12;

/// Ordinary least squares on a single standardized input.
///
/// The input is centred and scaled with the training sample's own mean and
/// population standard deviation before fitting, so `predict` applies the
/// same transform to new values.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScaledLinearModel {
    mean: f64,
    scale: f64,
    intercept: f64,
    slope: f64,
}

impl ScaledLinearModel {
    /// Returns `None` when fewer than two distinct inputs are available.
    pub fn fit(xs: &[f64], ys: &[f64]) -> Option<Self> {
        if xs.len() != ys.len() || xs.is_empty() {
            return None;
        }
        if !xs.iter().any(|x| *x != xs[0]) {
            return None;
        }

        let mean = xs.iter().mean();
        let std_dev = xs.iter().population_std_dev();
        let scale = if std_dev.is_finite() && std_dev > 0.0 { std_dev } else { 1.0 };

        let design = DMatrix::from_fn(xs.len(), 2, |row, col| {
            if col == 0 {
                1.0
            } else {
                (xs[row] - mean) / scale
            }
        });
        let target = DVector::from_column_slice(ys);
        let coefficients = design.svd(true, true).solve(&target, 1e-12).ok()?;

        let model = Self {
            mean,
            scale,
            intercept: coefficients[0],
            slope: coefficients[1],
        };
        model.is_finite().then_some(model)
    }

    pub fn predict(&self, x: f64) -> f64 {
        self.intercept + self.slope * (x - self.mean) / self.scale
    }

    /// Coefficient of determination on the given sample. A constant target is
    /// scored 1.0 when reproduced exactly and 0.0 otherwise.
    pub fn score(&self, xs: &[f64], ys: &[f64]) -> f64 {
        let y_mean = ys.iter().mean();
        let ss_tot: f64 = ys.iter().map(|y| (y - y_mean).powi(2)).sum();
        let ss_res: f64 = xs
            .iter()
            .zip(ys)
            .map(|(x, y)| (y - self.predict(*x)).powi(2))
            .sum();

        if ss_tot == 0.0 {
            if ss_res <= RESIDUAL_TOLERANCE * ys.len() as f64 {
                1.0
            } else {
                0.0
            }
        } else {
            1.0 - ss_res / ss_tot
        }
    }

    pub fn slope(&self) -> f64 {
        self.slope
    }

    pub fn intercept(&self) -> f64 {
        self.intercept
    }

    fn is_finite(&self) -> bool {
        self.intercept.is_finite() && self.slope.is_finite()
    }
}
