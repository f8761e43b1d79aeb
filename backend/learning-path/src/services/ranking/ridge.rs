use super::{RankingError, Result};
use ndarray::{Array1, Array2, ArrayView2, Axis};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// L2-penalized least squares with an unpenalized intercept.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RidgeRegressor {
    pub coefficients: Vec<f64>,
    pub intercept: f64,
    pub alpha: f64,
}

impl RidgeRegressor {
    /// Solve `(XcᵀXc + αI) w = Xcᵀyc` on centered data.
    pub fn fit(x: ArrayView2<f64>, y: &[f64], alpha: f64) -> Result<Self> {
        let n = x.nrows();
        if n == 0 {
            return Err(RankingError::InvalidInput(
                "Cannot fit ridge on zero rows".to_string(),
            ));
        }
        if y.len() != n {
            return Err(RankingError::InvalidInput(format!(
                "Target has {} values for {} rows",
                y.len(),
                n
            )));
        }
        if alpha < 0.0 || !alpha.is_finite() {
            return Err(RankingError::InvalidInput(format!(
                "alpha must be a non-negative finite number, got {}",
                alpha
            )));
        }

        let x_mean = x
            .mean_axis(Axis(0))
            .ok_or_else(|| RankingError::InvalidInput("Empty feature matrix".to_string()))?;
        let y_mean = y.iter().sum::<f64>() / n as f64;

        let xc = &x - &x_mean;
        let yc: Array1<f64> = y.iter().map(|v| v - y_mean).collect();

        let mut gram = xc.t().dot(&xc);
        for i in 0..gram.nrows() {
            gram[[i, i]] += alpha;
        }
        let rhs = xc.t().dot(&yc);

        let coefficients = solve(gram, rhs)?;
        let intercept = y_mean - x_mean.dot(&coefficients);

        debug!(n_rows = n, n_features = x.ncols(), alpha, "Fitted ridge regressor");

        Ok(Self {
            coefficients: coefficients.to_vec(),
            intercept,
            alpha,
        })
    }

    pub fn predict(&self, x: ArrayView2<f64>) -> Result<Array1<f64>> {
        if x.ncols() != self.coefficients.len() {
            return Err(RankingError::InvalidInput(format!(
                "Expected {} features, got {}",
                self.coefficients.len(),
                x.ncols()
            )));
        }
        let w = Array1::from(self.coefficients.clone());
        Ok(x.dot(&w) + self.intercept)
    }
}

/// Gaussian elimination with partial pivoting.
fn solve(mut a: Array2<f64>, mut b: Array1<f64>) -> Result<Array1<f64>> {
    let n = b.len();

    for col in 0..n {
        let mut pivot = col;
        for row in col + 1..n {
            if a[[row, col]].abs() > a[[pivot, col]].abs() {
                pivot = row;
            }
        }
        if a[[pivot, col]].abs() < 1e-12 {
            return Err(RankingError::FitFailed(
                "Singular system; increase alpha".to_string(),
            ));
        }
        if pivot != col {
            for k in 0..n {
                a.swap([col, k], [pivot, k]);
            }
            b.swap(col, pivot);
        }

        for row in col + 1..n {
            let factor = a[[row, col]] / a[[col, col]];
            if factor == 0.0 {
                continue;
            }
            for k in col..n {
                a[[row, k]] -= factor * a[[col, k]];
            }
            b[row] -= factor * b[col];
        }
    }

    let mut x = Array1::zeros(n);
    for row in (0..n).rev() {
        let tail: f64 = (row + 1..n).map(|k| a[[row, k]] * x[k]).sum();
        x[row] = (b[row] - tail) / a[[row, row]];
    }
    Ok(x)
}
