/// Ranking Module
///
/// Regression models that predict a relevance score per (user, item) row.
///
/// # Architecture
/// - **Model Layer**: random forest (CART ensemble) or ridge regression
/// - **Scaling Layer**: standardization, fitted for the linear model only
/// - **Pipeline Layer**: named feature columns -> matrix -> fit / predict
///
/// # Workflow
/// 1. Build an `ndarray` matrix from the named feature columns
/// 2. Standardize (ridge only)
/// 3. Fit the model against the relevance target
/// 4. Predict with the same columns and scaling
pub mod forest;
pub mod model;
pub mod pipeline;
pub mod ridge;
pub mod scaler;

pub use forest::{RandomForestRegressor, RegressionTree};
pub use model::{RankingModel, RankingModelKind};
pub use pipeline::{FeatureImportance, RankingPipeline};
pub use ridge::RidgeRegressor;
pub use scaler::StandardScaler;

use crate::services::features::{FeatureSource, InteractionFeatures};
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RankingError {
    #[error("Model not trained. Call train() first")]
    NotTrained,

    #[error("Unsupported model type: {0}")]
    UnsupportedModel(String),

    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Model fit failed: {0}")]
    FitFailed(String),
}

pub type Result<T> = std::result::Result<T, RankingError>;

/// Hyperparameters for both model kinds; each kind reads the ones it uses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelParams {
    /// Number of trees (random forest)
    pub n_estimators: usize,
    /// Maximum tree depth (random forest)
    pub max_depth: usize,
    /// Minimum samples required to split a node (random forest)
    pub min_samples_split: usize,
    /// Seed for bootstrap sampling (random forest)
    pub random_state: u64,
    /// L2 penalty (ridge)
    pub alpha: f64,
}

impl Default for ModelParams {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            max_depth: 10,
            min_samples_split: 2,
            random_state: 42,
            alpha: 1.0,
        }
    }
}

/// Relevance of an observed attempt: `0.6 * success + 0.4 * quiz / 100`.
pub fn synthesize_relevance(success: f64, quiz_score: f64) -> f64 {
    0.6 * success + 0.4 * (quiz_score / 100.0)
}

/// Training target per row: the supplied relevance, or one synthesized from
/// the attempt outcome.
pub fn relevance_target(rows: &[InteractionFeatures]) -> Vec<f64> {
    rows.iter()
        .map(|row| {
            row.relevance
                .unwrap_or_else(|| synthesize_relevance(row.success_value(), row.quiz_score))
        })
        .collect()
}

/// Assemble a `rows x columns` matrix from named feature columns.
pub fn feature_matrix<R: FeatureSource>(rows: &[R], columns: &[String]) -> Result<Array2<f64>> {
    let mut matrix = Array2::zeros((rows.len(), columns.len()));

    for (i, row) in rows.iter().enumerate() {
        for (j, column) in columns.iter().enumerate() {
            matrix[[i, j]] = row.feature(column).ok_or_else(|| {
                RankingError::InvalidInput(format!("Unknown feature column: {}", column))
            })?;
        }
    }

    Ok(matrix)
}
