use super::{RankingError, Result};
use ndarray::{Array2, ArrayView2, Axis};
use serde::{Deserialize, Serialize};

/// Per-column standardization: `(x - mean) / std`.
///
/// Uses the population standard deviation; constant columns get a scale of
/// 1.0 so they map to zero instead of NaN.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    pub mean: Vec<f64>,
    pub scale: Vec<f64>,
}

impl StandardScaler {
    pub fn fit(x: ArrayView2<f64>) -> Result<Self> {
        if x.nrows() == 0 {
            return Err(RankingError::InvalidInput(
                "Cannot fit scaler on zero rows".to_string(),
            ));
        }

        let n = x.nrows() as f64;
        let mut mean = Vec::with_capacity(x.ncols());
        let mut scale = Vec::with_capacity(x.ncols());

        for column in x.axis_iter(Axis(1)) {
            let m = column.sum() / n;
            let var = column.iter().map(|v| (v - m).powi(2)).sum::<f64>() / n;
            let std = var.sqrt();

            mean.push(m);
            scale.push(if std > f64::EPSILON { std } else { 1.0 });
        }

        Ok(Self { mean, scale })
    }

    pub fn transform(&self, x: ArrayView2<f64>) -> Result<Array2<f64>> {
        if x.ncols() != self.mean.len() {
            return Err(RankingError::InvalidInput(format!(
                "Scaler expects {} columns, got {}",
                self.mean.len(),
                x.ncols()
            )));
        }

        let mut out = x.to_owned();
        for (j, mut column) in out.axis_iter_mut(Axis(1)).enumerate() {
            let (m, s) = (self.mean[j], self.scale[j]);
            column.mapv_inplace(|v| (v - m) / s);
        }
        Ok(out)
    }

    pub fn fit_transform(x: ArrayView2<f64>) -> Result<(Self, Array2<f64>)> {
        let scaler = Self::fit(x)?;
        let transformed = scaler.transform(x)?;
        Ok((scaler, transformed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_standardizes_columns() {
        let x = array![[1.0, 5.0], [3.0, 5.0], [5.0, 5.0]];
        let (scaler, t) = StandardScaler::fit_transform(x.view()).unwrap();

        assert!((scaler.mean[0] - 3.0).abs() < 1e-12);
        assert_eq!(scaler.scale[1], 1.0);

        let col0: Vec<f64> = t.column(0).to_vec();
        assert!((col0.iter().sum::<f64>()).abs() < 1e-12);
        let var = col0.iter().map(|v| v * v).sum::<f64>() / 3.0;
        assert!((var - 1.0).abs() < 1e-12);

        // Constant column maps to zero
        assert!(t.column(1).iter().all(|v| *v == 0.0));
    }

    #[test]
    fn test_column_count_mismatch() {
        let scaler = StandardScaler::fit(array![[1.0, 2.0]].view()).unwrap();
        assert!(scaler.transform(array![[1.0]].view()).is_err());
    }

    #[test]
    fn test_empty_rejected() {
        let x = Array2::<f64>::zeros((0, 3));
        assert!(StandardScaler::fit(x.view()).is_err());
    }
}
