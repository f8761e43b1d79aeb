use anyhow::{Context, Result};
use learning_path::persistence::{save_pipeline_artifacts, ModelStore};
use learning_path::services::simulator::run_simulation;
use learning_path::{Config, LearningPathPipeline};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn main() -> Result<()> {
    // Load configuration first so its log level can seed the filter
    let config = Config::from_env().context("Failed to load configuration")?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("{},learning_path=debug", config.log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    config
        .validate()
        .context("Configuration validation failed")?;
    info!(
        users = config.simulation.num_users,
        items = config.simulation.num_items,
        skills = config.simulation.num_skills,
        seed = config.simulation.seed,
        model = %config.ranking.model_type,
        "Configuration loaded and validated"
    );

    // Stage 0: synthetic population, catalog and interaction log
    let simulation = run_simulation(&config.simulation).context("Simulation failed")?;

    let mut pipeline = LearningPathPipeline::new(
        config.recommender.clone(),
        config.ranking.feature_columns.clone(),
    );
    let (recommendations, metadata) = pipeline
        .run(
            &simulation.users,
            &simulation.items,
            &simulation.logs,
            &config.ranking.model_type,
            config.ranking.params.clone(),
            config.recommender.top_k,
        )
        .context("Pipeline run failed")?;

    info!(
        interactions = metadata.num_interactions,
        features = metadata.num_features,
        recommendations = metadata.num_recommendations,
        avg_per_user = metadata.avg_recommendations_per_user,
        relevance_mean = metadata.relevance_stats.mean,
        relevance_std = metadata.relevance_stats.std,
        generated_at = %metadata.generated_at,
        "Pipeline complete"
    );

    match pipeline.get_feature_importance(5) {
        Ok(importances) => {
            for (i, fi) in importances.iter().enumerate() {
                info!(
                    rank = i + 1,
                    feature = %fi.feature,
                    importance = fi.importance,
                    "Feature importance"
                );
            }
        }
        Err(e) => warn!(error = %e, "Feature importance unavailable"),
    }

    if let Some(first) = recommendations.rows.first() {
        for rec in pipeline.get_user_recommendations(first.user_id)? {
            info!(
                user_id = rec.user_id,
                item_id = rec.item_id,
                rank = rec.rank,
                relevance = rec.relevance_score,
                "Sample recommendation"
            );
        }
    }

    let store = ModelStore::new(&config.model_dir).context("Failed to open model directory")?;
    let paths = save_pipeline_artifacts(pipeline.ranking_pipeline()?, &store)
        .context("Failed to save model artifacts")?;
    info!(dir = %config.model_dir, artifacts = paths.len(), "Model artifacts saved");

    Ok(())
}
