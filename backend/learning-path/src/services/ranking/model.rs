/// Ranking Model
///
/// The fitted regressor behind a ranking pipeline, one of a closed set of
/// model kinds selected by name.
use super::{ModelParams, RandomForestRegressor, RankingError, Result, RidgeRegressor};
use ndarray::{Array1, ArrayView2};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RankingModelKind {
    RandomForest,
    Ridge,
}

impl RankingModelKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RandomForest => "random_forest",
            Self::Ridge => "ridge",
        }
    }

    /// Linear models are fitted on standardized features.
    pub fn needs_scaling(&self) -> bool {
        matches!(self, Self::Ridge)
    }
}

impl FromStr for RankingModelKind {
    type Err = RankingError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "random_forest" => Ok(Self::RandomForest),
            "ridge" => Ok(Self::Ridge),
            other => Err(RankingError::UnsupportedModel(other.to_string())),
        }
    }
}

impl fmt::Display for RankingModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RankingModel {
    RandomForest(RandomForestRegressor),
    Ridge(RidgeRegressor),
}

impl RankingModel {
    pub fn fit(
        kind: RankingModelKind,
        x: ArrayView2<f64>,
        y: &[f64],
        params: &ModelParams,
    ) -> Result<Self> {
        match kind {
            RankingModelKind::RandomForest => {
                RandomForestRegressor::fit(x, y, params).map(Self::RandomForest)
            }
            RankingModelKind::Ridge => RidgeRegressor::fit(x, y, params.alpha).map(Self::Ridge),
        }
    }

    pub fn kind(&self) -> RankingModelKind {
        match self {
            Self::RandomForest(_) => RankingModelKind::RandomForest,
            Self::Ridge(_) => RankingModelKind::Ridge,
        }
    }

    pub fn predict(&self, x: ArrayView2<f64>) -> Result<Array1<f64>> {
        match self {
            Self::RandomForest(forest) => forest.predict(x),
            Self::Ridge(ridge) => ridge.predict(x),
        }
    }

    /// Per-feature importances; only tree ensembles expose them.
    pub fn feature_importances(&self) -> Option<&[f64]> {
        match self {
            Self::RandomForest(forest) => Some(forest.feature_importances()),
            Self::Ridge(_) => None,
        }
    }
}
