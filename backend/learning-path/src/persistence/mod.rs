/// Model Artifact Store
///
/// Named JSON artifacts in a directory: `{dir}/{name}.json`.
///
/// A trained ranking pipeline is stored as three artifacts:
/// - `ranking_model`: the fitted model (tagged by kind)
/// - `scaler`: standardization parameters, only when the model uses them
/// - `feature_columns`: the column order the model expects
use crate::services::ranking::{RankingModel, RankingPipeline, StandardScaler};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

pub const RANKING_MODEL: &str = "ranking_model";
pub const SCALER: &str = "scaler";
pub const FEATURE_COLUMNS: &str = "feature_columns";

const EXTENSION: &str = "json";

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("Artifact not found: {0}")]
    NotFound(String),

    #[error("Nothing to save: {0}")]
    MissingModel(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, PersistenceError>;

pub struct ModelStore {
    dir: PathBuf,
}

impl ModelStore {
    /// Open a store rooted at `dir`, creating the directory if needed.
    pub fn new(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{}.{}", name, EXTENSION))
    }

    pub fn save<T: Serialize>(&self, name: &str, value: &T) -> Result<PathBuf> {
        let path = self.path_for(name);
        let json = serde_json::to_string_pretty(value)?;
        fs::write(&path, json)?;
        debug!(artifact = name, path = %path.display(), "Saved artifact");
        Ok(path)
    }

    pub fn load<T: DeserializeOwned>(&self, name: &str) -> Result<T> {
        let path = self.path_for(name);
        if !path.is_file() {
            return Err(PersistenceError::NotFound(name.to_string()));
        }
        let json = fs::read_to_string(&path)?;
        Ok(serde_json::from_str(&json)?)
    }

    pub fn exists(&self, name: &str) -> bool {
        self.path_for(name).is_file()
    }

    /// Stored artifact names, sorted.
    pub fn list(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some(EXTENSION) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                names.push(stem.to_string());
            }
        }
        names.sort();
        Ok(names)
    }
}

/// Whatever pipeline artifacts a store holds.
#[derive(Debug, Default)]
pub struct PipelineArtifacts {
    pub ranking_model: Option<RankingModel>,
    pub scaler: Option<StandardScaler>,
    pub feature_columns: Option<Vec<String>>,
}

impl PipelineArtifacts {
    /// Rebuild a servable pipeline; needs at least the model and its columns.
    pub fn into_pipeline(self) -> Result<RankingPipeline> {
        let model = self
            .ranking_model
            .ok_or_else(|| PersistenceError::NotFound(RANKING_MODEL.to_string()))?;
        let columns = self
            .feature_columns
            .ok_or_else(|| PersistenceError::NotFound(FEATURE_COLUMNS.to_string()))?;
        Ok(RankingPipeline::from_artifacts(model, self.scaler, columns))
    }
}

pub fn save_pipeline_artifacts(
    pipeline: &RankingPipeline,
    store: &ModelStore,
) -> Result<Vec<PathBuf>> {
    let model = pipeline.model().ok_or_else(|| {
        PersistenceError::MissingModel("ranking pipeline is not trained".to_string())
    })?;

    let mut saved = vec![store.save(RANKING_MODEL, model)?];
    if let Some(scaler) = pipeline.scaler() {
        saved.push(store.save(SCALER, scaler)?);
    }
    saved.push(store.save(FEATURE_COLUMNS, &pipeline.feature_columns())?);

    info!(
        dir = %store.dir().display(),
        artifacts = saved.len(),
        "Saved pipeline artifacts"
    );
    Ok(saved)
}

pub fn load_pipeline_artifacts(store: &ModelStore) -> Result<PipelineArtifacts> {
    let mut artifacts = PipelineArtifacts::default();

    if store.exists(RANKING_MODEL) {
        artifacts.ranking_model = Some(store.load(RANKING_MODEL)?);
    }
    if store.exists(SCALER) {
        artifacts.scaler = Some(store.load(SCALER)?);
    }
    if store.exists(FEATURE_COLUMNS) {
        artifacts.feature_columns = Some(store.load(FEATURE_COLUMNS)?);
    }

    Ok(artifacts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::features::FeatureSource;
    use crate::services::ranking::{ModelParams, RankingModelKind};
    use tempfile::TempDir;

    struct Row(f64, f64);

    impl FeatureSource for Row {
        fn feature(&self, column: &str) -> Option<f64> {
            match column {
                "x" => Some(self.0),
                "z" => Some(self.1),
                _ => None,
            }
        }
    }

    fn trained(model_type: &str) -> (RankingPipeline, Vec<Row>) {
        let rows: Vec<Row> = (0..20).map(|i| Row(i as f64, (i % 3) as f64)).collect();
        let target: Vec<f64> = rows.iter().map(|r| 0.1 * r.0 + 0.05 * r.1).collect();
        let mut pipeline = RankingPipeline::new(
            model_type,
            ModelParams {
                n_estimators: 4,
                ..ModelParams::default()
            },
        );
        pipeline
            .train(&rows, &target, &["x".to_string(), "z".to_string()])
            .unwrap();
        (pipeline, rows)
    }

    fn assert_close(a: &[f64], b: &[f64]) {
        assert_eq!(a.len(), b.len());
        for (x, y) in a.iter().zip(b) {
            assert!((x - y).abs() < 1e-9, "{} != {}", x, y);
        }
    }

    #[test]
    fn test_save_load_list() {
        let dir = TempDir::new().unwrap();
        let store = ModelStore::new(dir.path().join("models")).unwrap();

        assert!(!store.exists("weights"));
        store.save("weights", &vec![1.0, 2.0]).unwrap();
        store.save("alpha", &0.5).unwrap();
        fs::write(dir.path().join("models").join("notes.txt"), "ignored").unwrap();

        assert!(store.exists("weights"));
        let weights: Vec<f64> = store.load("weights").unwrap();
        assert_eq!(weights, vec![1.0, 2.0]);
        assert_eq!(store.list().unwrap(), vec!["alpha", "weights"]);
    }

    #[test]
    fn test_missing_artifact() {
        let dir = TempDir::new().unwrap();
        let store = ModelStore::new(dir.path()).unwrap();
        let result: Result<Vec<f64>> = store.load("absent");
        assert!(matches!(result, Err(PersistenceError::NotFound(name)) if name == "absent"));
    }

    #[test]
    fn test_ridge_artifacts_round_trip() {
        let dir = TempDir::new().unwrap();
        let store = ModelStore::new(dir.path()).unwrap();
        let (pipeline, rows) = trained("ridge");

        let paths = save_pipeline_artifacts(&pipeline, &store).unwrap();
        assert_eq!(paths.len(), 3);

        let restored = load_pipeline_artifacts(&store).unwrap().into_pipeline().unwrap();
        assert_close(
            &restored.predict(&rows).unwrap().to_vec(),
            &pipeline.predict(&rows).unwrap().to_vec(),
        );
    }

    #[test]
    fn test_forest_artifacts_skip_scaler() {
        let dir = TempDir::new().unwrap();
        let store = ModelStore::new(dir.path()).unwrap();
        let (pipeline, rows) = trained("random_forest");

        save_pipeline_artifacts(&pipeline, &store).unwrap();
        assert!(!store.exists(SCALER));

        let artifacts = load_pipeline_artifacts(&store).unwrap();
        assert!(artifacts.scaler.is_none());
        let restored = artifacts.into_pipeline().unwrap();
        assert_close(
            &restored.predict(&rows).unwrap().to_vec(),
            &pipeline.predict(&rows).unwrap().to_vec(),
        );
    }

    #[test]
    fn test_forest_reloads_bit_identical() {
        // Split thresholds are midpoints of values with long decimal expansions
        let x = ndarray::Array2::from_shape_fn((50, 2), |(i, j)| {
            (i as f64 + 1.0 / 3.0) * 0.1 + j as f64 * std::f64::consts::PI * i as f64 / 7.0
        });
        let y: Vec<f64> = (0..50).map(|i| ((i * 17) % 11) as f64 / 11.0).collect();
        let params = ModelParams {
            n_estimators: 8,
            ..ModelParams::default()
        };
        let model =
            RankingModel::fit(RankingModelKind::RandomForest, x.view(), &y, &params).unwrap();

        let dir = TempDir::new().unwrap();
        let store = ModelStore::new(dir.path()).unwrap();
        store.save(RANKING_MODEL, &model).unwrap();
        let reloaded: RankingModel = store.load(RANKING_MODEL).unwrap();

        assert_eq!(reloaded, model);
        assert_eq!(reloaded.predict(x.view()).unwrap(), model.predict(x.view()).unwrap());
    }

    #[test]
    fn test_untrained_pipeline_not_saved() {
        let dir = TempDir::new().unwrap();
        let store = ModelStore::new(dir.path()).unwrap();
        let pipeline = RankingPipeline::new("ridge", ModelParams::default());
        assert!(matches!(
            save_pipeline_artifacts(&pipeline, &store),
            Err(PersistenceError::MissingModel(_))
        ));
    }
}
