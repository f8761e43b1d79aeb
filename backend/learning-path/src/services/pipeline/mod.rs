// ============================================
// Learning Path Pipeline
// ============================================
//
// End-to-end run over a finished simulation:
// 1. DataPipeline: logs -> interaction feature rows
// 2. RankingPipeline: train on every row, score one row per (user, item)
// 3. RecommenderSystem: relevance table -> ranked top-K per user
//
// After `run`, the orchestrator keeps the trained model and the
// recommendation table for per-user lookups and reporting.

pub mod data;

pub use data::DataPipeline;

use crate::config::{RecommenderConfig, DEFAULT_FEATURE_COLUMNS};
use crate::error::{AppError, Result};
use crate::models::{
    InteractionRecord, Recommendation, RecommendationTable, RelevanceScore, RelevanceTable, UserId,
};
use crate::services::ranking::{relevance_target, FeatureImportance, ModelParams, RankingPipeline};
use crate::services::recommender::RecommenderSystem;
use crate::services::simulator::{ItemCatalog, UserTable};
use crate::utils::{mean, sample_std};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RelevanceStats {
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std: f64,
}

impl RelevanceStats {
    fn from_scores(scores: &[f64]) -> Self {
        if scores.is_empty() {
            return Self {
                min: 0.0,
                max: 0.0,
                mean: 0.0,
                std: 0.0,
            };
        }
        Self {
            min: scores.iter().copied().fold(f64::INFINITY, f64::min),
            max: scores.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            mean: mean(scores),
            std: sample_std(scores),
        }
    }
}

/// Summary of one pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PipelineMetadata {
    pub num_users: usize,
    pub num_items: usize,
    pub num_interactions: usize,
    pub num_features: usize,
    pub num_recommendations: usize,
    pub avg_recommendations_per_user: f64,
    pub relevance_stats: RelevanceStats,
    pub generated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ModelReport {
    pub model_type: String,
    pub total_recommendations: usize,
    pub users_with_recommendations: usize,
    pub avg_relevance_score: f64,
    /// `None` for models without importances (ridge)
    pub feature_importance: Option<Vec<FeatureImportance>>,
}

struct RunState {
    ranking: RankingPipeline,
    recommender: RecommenderSystem,
    relevance: RelevanceTable,
    recommendations: RecommendationTable,
}

pub struct LearningPathPipeline {
    recommender_config: RecommenderConfig,
    feature_columns: Vec<String>,
    state: Option<RunState>,
}

impl LearningPathPipeline {
    pub fn new(recommender_config: RecommenderConfig, feature_columns: Vec<String>) -> Self {
        Self {
            recommender_config,
            feature_columns,
            state: None,
        }
    }

    /// Extract features, train and score, then recommend `top_k` items per
    /// user.
    pub fn run(
        &mut self,
        users: &UserTable,
        items: &ItemCatalog,
        logs: &[InteractionRecord],
        ranking_model: &str,
        model_params: ModelParams,
        top_k: usize,
    ) -> Result<(RecommendationTable, PipelineMetadata)> {
        info!(
            users = users.len(),
            items = items.len(),
            interactions = logs.len(),
            "Starting learning path pipeline"
        );

        // Stage 1: features
        let mut data =
            DataPipeline::with_feature_columns(users, items, self.feature_columns.clone());
        data.process(logs)?;
        let features = data.features()?;
        let target = relevance_target(features);

        // Stage 2: ranking
        let mut ranking = RankingPipeline::new(ranking_model, model_params);
        ranking.train(features, &target, data.feature_columns()?)?;

        let pairs = data.pair_features()?;
        let scores = ranking.predict(&pairs)?;
        let relevance = RelevanceTable::new(
            pairs
                .iter()
                .zip(scores.iter())
                .map(|(row, &relevance_score)| RelevanceScore {
                    user_id: row.user_id,
                    item_id: row.item_id,
                    relevance_score,
                })
                .collect(),
        );

        let score_values: Vec<f64> = scores.to_vec();
        let relevance_stats = RelevanceStats::from_scores(&score_values);
        info!(
            model = ranking_model,
            pairs = relevance.len(),
            min = relevance_stats.min,
            max = relevance_stats.max,
            "Scored user-item pairs"
        );

        // Stage 3: recommendations
        let recommender = RecommenderSystem::new(top_k, self.recommender_config.min_relevance);
        let recommendations = recommender.recommend_batch(&relevance, false);
        info!(
            recommendations = recommendations.len(),
            users = recommendations.num_users(),
            "Generated recommendations"
        );

        let metadata = PipelineMetadata {
            num_users: users.len(),
            num_items: items.len(),
            num_interactions: logs.len(),
            num_features: self.feature_columns.len(),
            num_recommendations: recommendations.len(),
            avg_recommendations_per_user: if users.is_empty() {
                0.0
            } else {
                recommendations.len() as f64 / users.len() as f64
            },
            relevance_stats,
            generated_at: Utc::now(),
        };

        self.state = Some(RunState {
            ranking,
            recommender,
            relevance,
            recommendations: recommendations.clone(),
        });

        Ok((recommendations, metadata))
    }

    fn state(&self) -> Result<&RunState> {
        self.state.as_ref().ok_or(AppError::NotExecuted)
    }

    pub fn get_user_recommendations(&self, user_id: UserId) -> Result<Vec<Recommendation>> {
        let state = self.state()?;
        Ok(state
            .recommender
            .get_recommendations_for_user(user_id, &state.recommendations))
    }

    pub fn get_feature_importance(&self, top_n: usize) -> Result<Vec<FeatureImportance>> {
        Ok(self.state()?.ranking.get_feature_importance(top_n)?)
    }

    pub fn get_model_report(&self) -> Result<ModelReport> {
        let state = self.state()?;
        let recs = &state.recommendations;

        let feature_importance = match state.ranking.model() {
            Some(model) if model.feature_importances().is_some() => {
                Some(state.ranking.get_feature_importance(10)?)
            }
            _ => None,
        };

        Ok(ModelReport {
            model_type: state.ranking.model_type().to_string(),
            total_recommendations: recs.len(),
            users_with_recommendations: recs.num_users(),
            avg_relevance_score: recs.mean_relevance(),
            feature_importance,
        })
    }

    pub fn ranking_pipeline(&self) -> Result<&RankingPipeline> {
        Ok(&self.state()?.ranking)
    }

    /// Scored pairs from the last run, before thresholding.
    pub fn relevance_scores(&self) -> Result<&RelevanceTable> {
        Ok(&self.state()?.relevance)
    }
}

impl Default for LearningPathPipeline {
    fn default() -> Self {
        Self::new(
            RecommenderConfig::default(),
            DEFAULT_FEATURE_COLUMNS.iter().map(|c| c.to_string()).collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SimulationConfig;
    use crate::services::ranking::RankingError;
    use crate::services::simulator::run_simulation;

    fn small_run() -> (UserTable, ItemCatalog, Vec<InteractionRecord>) {
        let config = SimulationConfig {
            num_users: 8,
            num_items: 6,
            steps_per_user: 6,
            ..SimulationConfig::default()
        };
        let output = run_simulation(&config).unwrap();
        (output.users, output.items, output.logs)
    }

    fn fast_params() -> ModelParams {
        ModelParams {
            n_estimators: 5,
            max_depth: 4,
            ..ModelParams::default()
        }
    }

    #[test]
    fn test_calls_before_run_fail() {
        let pipeline = LearningPathPipeline::default();
        assert!(matches!(
            pipeline.get_user_recommendations(0),
            Err(AppError::NotExecuted)
        ));
        assert!(matches!(
            pipeline.get_feature_importance(5),
            Err(AppError::NotExecuted)
        ));
        assert!(matches!(pipeline.get_model_report(), Err(AppError::NotExecuted)));
    }

    #[test]
    fn test_run_forest() {
        let (users, items, logs) = small_run();
        let mut pipeline = LearningPathPipeline::new(
            RecommenderConfig {
                top_k: 3,
                min_relevance: 0.0,
            },
            DEFAULT_FEATURE_COLUMNS.iter().map(|c| c.to_string()).collect(),
        );

        let (recs, metadata) = pipeline
            .run(&users, &items, &logs, "random_forest", fast_params(), 3)
            .unwrap();

        assert_eq!(metadata.num_users, 8);
        assert_eq!(metadata.num_interactions, logs.len());
        assert_eq!(metadata.num_features, DEFAULT_FEATURE_COLUMNS.len());
        assert_eq!(metadata.num_recommendations, recs.len());
        assert!(metadata.relevance_stats.min <= metadata.relevance_stats.max);
        assert!(recs.rows.iter().all(|r| (1..=3).contains(&r.rank)));

        let user = recs.rows[0].user_id;
        let user_recs = pipeline.get_user_recommendations(user).unwrap();
        assert!(!user_recs.is_empty());
        assert_eq!(user_recs[0].rank, 1);

        let report = pipeline.get_model_report().unwrap();
        assert_eq!(report.model_type, "random_forest");
        assert_eq!(report.total_recommendations, recs.len());
        assert!(report.feature_importance.is_some());
    }

    #[test]
    fn test_run_ridge_report_without_importance() {
        let (users, items, logs) = small_run();
        let mut pipeline = LearningPathPipeline::default();
        pipeline
            .run(&users, &items, &logs, "ridge", ModelParams::default(), 5)
            .unwrap();

        assert!(matches!(
            pipeline.get_feature_importance(5),
            Err(AppError::Ranking(RankingError::UnsupportedOperation(_)))
        ));
        assert!(pipeline.get_model_report().unwrap().feature_importance.is_none());
    }

    #[test]
    fn test_unknown_model_fails_run() {
        let (users, items, logs) = small_run();
        let mut pipeline = LearningPathPipeline::default();
        let result = pipeline.run(&users, &items, &logs, "xgboost", ModelParams::default(), 5);
        assert!(matches!(
            result,
            Err(AppError::Ranking(RankingError::UnsupportedModel(_)))
        ));
        assert!(pipeline.ranking_pipeline().is_err());
    }
}
