use super::{
    feature_matrix, ModelParams, RankingError, RankingModel, RankingModelKind, Result,
    StandardScaler,
};
use crate::services::features::FeatureSource;
use ndarray::Array1;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureImportance {
    pub feature: String,
    pub importance: f64,
}

/// Named-column regression pipeline: feature matrix, optional scaling, model.
pub struct RankingPipeline {
    model_type: String,
    params: ModelParams,
    model: Option<RankingModel>,
    scaler: Option<StandardScaler>,
    feature_columns: Vec<String>,
}

impl RankingPipeline {
    /// The model kind is only parsed at train time.
    pub fn new(model_type: impl Into<String>, params: ModelParams) -> Self {
        Self {
            model_type: model_type.into(),
            params,
            model: None,
            scaler: None,
            feature_columns: Vec::new(),
        }
    }

    /// Rebuild a trained pipeline from persisted artifacts.
    pub fn from_artifacts(
        model: RankingModel,
        scaler: Option<StandardScaler>,
        feature_columns: Vec<String>,
    ) -> Self {
        Self {
            model_type: model.kind().as_str().to_string(),
            params: ModelParams::default(),
            model: Some(model),
            scaler,
            feature_columns,
        }
    }

    pub fn train<R: FeatureSource>(
        &mut self,
        features: &[R],
        target: &[f64],
        feature_columns: &[String],
    ) -> Result<()> {
        let kind: RankingModelKind = self.model_type.parse()?;

        if features.is_empty() {
            return Err(RankingError::InvalidInput(
                "Cannot train on an empty feature set".to_string(),
            ));
        }
        if features.len() != target.len() {
            return Err(RankingError::InvalidInput(format!(
                "Got {} feature rows but {} targets",
                features.len(),
                target.len()
            )));
        }
        if feature_columns.is_empty() {
            return Err(RankingError::InvalidInput(
                "At least one feature column is required".to_string(),
            ));
        }

        let x = feature_matrix(features, feature_columns)?;

        let (scaler, x) = if kind.needs_scaling() {
            let (scaler, scaled) = StandardScaler::fit_transform(x.view())?;
            (Some(scaler), scaled)
        } else {
            (None, x)
        };

        debug!(
            model = %kind,
            rows = x.nrows(),
            columns = x.ncols(),
            scaled = scaler.is_some(),
            "Training ranking model"
        );

        let model = RankingModel::fit(kind, x.view(), target, &self.params)?;

        self.model = Some(model);
        self.scaler = scaler;
        self.feature_columns = feature_columns.to_vec();

        info!(model = %kind, rows = features.len(), "Ranking model trained");
        Ok(())
    }

    pub fn predict<R: FeatureSource>(&self, features: &[R]) -> Result<Array1<f64>> {
        let model = self.model.as_ref().ok_or(RankingError::NotTrained)?;

        let x = feature_matrix(features, &self.feature_columns)?;
        let x = match &self.scaler {
            Some(scaler) => scaler.transform(x.view())?,
            None => x,
        };

        model.predict(x.view())
    }

    /// Top `top_n` features by importance, descending. Tree ensembles only.
    pub fn get_feature_importance(&self, top_n: usize) -> Result<Vec<FeatureImportance>> {
        let kind: RankingModelKind = self.model_type.parse()?;
        if kind != RankingModelKind::RandomForest {
            return Err(RankingError::UnsupportedOperation(format!(
                "Feature importance is not available for {} models",
                kind
            )));
        }

        let model = self.model.as_ref().ok_or(RankingError::NotTrained)?;
        let importances = model.feature_importances().ok_or_else(|| {
            RankingError::UnsupportedOperation(format!(
                "Feature importance is not available for {} models",
                model.kind()
            ))
        })?;

        let mut ranked: Vec<FeatureImportance> = self
            .feature_columns
            .iter()
            .zip(importances)
            .map(|(feature, &importance)| FeatureImportance {
                feature: feature.clone(),
                importance,
            })
            .collect();
        ranked.sort_by(|a, b| {
            b.importance
                .partial_cmp(&a.importance)
                .unwrap_or(Ordering::Equal)
        });
        ranked.truncate(top_n);

        Ok(ranked)
    }

    pub fn is_trained(&self) -> bool {
        self.model.is_some()
    }

    pub fn model_type(&self) -> &str {
        &self.model_type
    }

    pub fn params(&self) -> &ModelParams {
        &self.params
    }

    pub fn model(&self) -> Option<&RankingModel> {
        self.model.as_ref()
    }

    pub fn scaler(&self) -> Option<&StandardScaler> {
        self.scaler.as_ref()
    }

    pub fn feature_columns(&self) -> &[String] {
        &self.feature_columns
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Row {
        signal: f64,
        noise: f64,
    }

    impl FeatureSource for Row {
        fn feature(&self, column: &str) -> Option<f64> {
            match column {
                "signal" => Some(self.signal),
                "noise" => Some(self.noise),
                _ => None,
            }
        }
    }

    fn dataset() -> (Vec<Row>, Vec<f64>) {
        let rows: Vec<Row> = (0..30)
            .map(|i| Row {
                signal: i as f64,
                noise: ((i * 13) % 4) as f64,
            })
            .collect();
        let target = rows.iter().map(|r| 0.05 * r.signal).collect();
        (rows, target)
    }

    fn columns() -> Vec<String> {
        vec!["signal".to_string(), "noise".to_string()]
    }

    fn small_forest() -> ModelParams {
        ModelParams {
            n_estimators: 10,
            ..ModelParams::default()
        }
    }

    #[test]
    fn test_untrained_errors() {
        let pipeline = RankingPipeline::new("random_forest", ModelParams::default());
        let (rows, _) = dataset();
        assert!(!pipeline.is_trained());
        assert!(matches!(pipeline.predict(&rows), Err(RankingError::NotTrained)));
        assert!(matches!(
            pipeline.get_feature_importance(5),
            Err(RankingError::NotTrained)
        ));
    }

    #[test]
    fn test_unknown_model_reported_at_train() {
        let mut pipeline = RankingPipeline::new("svm", ModelParams::default());
        let (rows, target) = dataset();
        assert!(matches!(
            pipeline.train(&rows, &target, &columns()),
            Err(RankingError::UnsupportedModel(_))
        ));
    }

    #[test]
    fn test_forest_train_predict_and_importance() {
        let mut pipeline = RankingPipeline::new("random_forest", small_forest());
        let (rows, target) = dataset();
        pipeline.train(&rows, &target, &columns()).unwrap();

        assert!(pipeline.scaler().is_none());
        let preds = pipeline.predict(&rows).unwrap();
        assert_eq!(preds.len(), rows.len());
        assert!(preds[29] > preds[0]);

        let importance = pipeline.get_feature_importance(1).unwrap();
        assert_eq!(importance.len(), 1);
        assert_eq!(importance[0].feature, "signal");
    }

    #[test]
    fn test_ridge_scales_and_rejects_importance() {
        let mut pipeline = RankingPipeline::new("ridge", ModelParams::default());
        let (rows, target) = dataset();
        pipeline.train(&rows, &target, &columns()).unwrap();

        assert!(pipeline.scaler().is_some());
        let preds = pipeline.predict(&rows).unwrap();
        assert!(preds[29] > preds[0]);

        assert!(matches!(
            pipeline.get_feature_importance(5),
            Err(RankingError::UnsupportedOperation(_))
        ));
    }

    #[test]
    fn test_invalid_training_input() {
        let mut pipeline = RankingPipeline::new("ridge", ModelParams::default());
        let (rows, target) = dataset();

        let empty: Vec<Row> = Vec::new();
        assert!(matches!(
            pipeline.train(&empty, &[], &columns()),
            Err(RankingError::InvalidInput(_))
        ));
        assert!(matches!(
            pipeline.train(&rows, &target[..3], &columns()),
            Err(RankingError::InvalidInput(_))
        ));
        assert!(matches!(
            pipeline.train(&rows, &target, &["missing".to_string()]),
            Err(RankingError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_from_artifacts_predicts_identically() {
        let mut pipeline = RankingPipeline::new("ridge", ModelParams::default());
        let (rows, target) = dataset();
        pipeline.train(&rows, &target, &columns()).unwrap();

        let restored = RankingPipeline::from_artifacts(
            pipeline.model().cloned().unwrap(),
            pipeline.scaler().cloned(),
            pipeline.feature_columns().to_vec(),
        );
        assert_eq!(restored.model_type(), "ridge");
        assert_eq!(restored.predict(&rows).unwrap(), pipeline.predict(&rows).unwrap());
    }
}
