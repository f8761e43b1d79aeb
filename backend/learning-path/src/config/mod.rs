use crate::services::ranking::ModelParams;
use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};

/// Feature columns the ranking model is trained on unless overridden.
pub const DEFAULT_FEATURE_COLUMNS: [&str; 14] = [
    "skill_gap",
    "fraction_skills_mastered",
    "difficulty_gap",
    "user_success_rate",
    "user_avg_quiz",
    "user_avg_time",
    "user_num_attempts",
    "item_avg_success",
    "item_avg_quiz",
    "item_avg_time",
    "item_num_skills",
    "skill_match",
    "difficulty",
    "estimated_time",
];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub simulation: SimulationConfig,
    pub ranking: RankingConfig,
    pub recommender: RecommenderConfig,

    // Artifacts
    pub model_dir: String,

    // Observability
    pub log_level: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationConfig {
    pub num_users: usize,
    pub num_items: usize,
    pub num_skills: usize,
    pub steps_per_user: usize,
    pub seed: u64,
    /// Beta shape parameters for initial mastery
    pub mastery_alpha: f64,
    pub mastery_beta: f64,
    /// Weight on skill match in the success logit
    pub success_alpha: f64,
    /// Penalty on difficulty gap in the success logit
    pub difficulty_beta: f64,
    /// Minimum mastery for a prerequisite skill to count as satisfied
    pub prerequisite_threshold: f64,
    /// Dropout probability added per consecutive failure (before sensitivity)
    pub dropout_rate: f64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            num_users: 50,
            num_items: 30,
            num_skills: 5,
            steps_per_user: 20,
            seed: 42,
            mastery_alpha: 2.0,
            mastery_beta: 5.0,
            success_alpha: 10.0,
            difficulty_beta: 1.0,
            prerequisite_threshold: 0.6,
            dropout_rate: 0.1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankingConfig {
    /// "random_forest" or "ridge"
    pub model_type: String,
    pub params: ModelParams,
    pub feature_columns: Vec<String>,
}

impl Default for RankingConfig {
    fn default() -> Self {
        Self {
            model_type: "random_forest".to_string(),
            params: ModelParams::default(),
            feature_columns: DEFAULT_FEATURE_COLUMNS
                .iter()
                .map(|c| c.to_string())
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecommenderConfig {
    pub top_k: usize,
    pub min_relevance: f64,
}

impl Default for RecommenderConfig {
    fn default() -> Self {
        Self {
            top_k: 5,
            min_relevance: 0.2,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            simulation: SimulationConfig::default(),
            ranking: RankingConfig::default(),
            recommender: RecommenderConfig::default(),
            model_dir: "models".to_string(),
            log_level: "info".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from `LEARNING_PATH__*` environment variables.
    ///
    /// Nested keys use `__`, e.g. `LEARNING_PATH__SIMULATION__NUM_USERS=100`.
    pub fn from_env() -> Result<Self, config::ConfigError> {
        dotenv::dotenv().ok();

        let defaults = Config::default();
        let sim = &defaults.simulation;
        let params = &defaults.ranking.params;

        let config = config::Config::builder()
            .set_default("simulation.num_users", sim.num_users as u64)?
            .set_default("simulation.num_items", sim.num_items as u64)?
            .set_default("simulation.num_skills", sim.num_skills as u64)?
            .set_default("simulation.steps_per_user", sim.steps_per_user as u64)?
            .set_default("simulation.seed", sim.seed)?
            .set_default("simulation.mastery_alpha", sim.mastery_alpha)?
            .set_default("simulation.mastery_beta", sim.mastery_beta)?
            .set_default("simulation.success_alpha", sim.success_alpha)?
            .set_default("simulation.difficulty_beta", sim.difficulty_beta)?
            .set_default("simulation.prerequisite_threshold", sim.prerequisite_threshold)?
            .set_default("simulation.dropout_rate", sim.dropout_rate)?
            .set_default("ranking.model_type", defaults.ranking.model_type.clone())?
            .set_default("ranking.params.n_estimators", params.n_estimators as u64)?
            .set_default("ranking.params.max_depth", params.max_depth as u64)?
            .set_default(
                "ranking.params.min_samples_split",
                params.min_samples_split as u64,
            )?
            .set_default("ranking.params.random_state", params.random_state)?
            .set_default("ranking.params.alpha", params.alpha)?
            .set_default("ranking.feature_columns", defaults.ranking.feature_columns.clone())?
            .set_default("recommender.top_k", defaults.recommender.top_k as u64)?
            .set_default("recommender.min_relevance", defaults.recommender.min_relevance)?
            .set_default("model_dir", defaults.model_dir.clone())?
            .set_default("log_level", defaults.log_level.clone())?
            .add_source(
                config::Environment::with_prefix("LEARNING_PATH")
                    .prefix_separator("__")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("ranking.feature_columns")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    pub fn validate(&self) -> Result<()> {
        let sim = &self.simulation;

        if sim.num_skills == 0 {
            return Err(anyhow!("Number of skills must be greater than 0"));
        }

        if sim.mastery_alpha <= 0.0 || sim.mastery_beta <= 0.0 {
            return Err(anyhow!("Mastery Beta shape parameters must be positive"));
        }

        if !(0.0..=1.0).contains(&sim.prerequisite_threshold) {
            return Err(anyhow!("Prerequisite threshold must be between 0 and 1"));
        }

        if sim.dropout_rate < 0.0 {
            return Err(anyhow!("Dropout rate must not be negative"));
        }

        if self.ranking.feature_columns.is_empty() {
            return Err(anyhow!("At least one feature column is required"));
        }

        if self.ranking.params.n_estimators == 0 {
            return Err(anyhow!("n_estimators must be greater than 0"));
        }

        if self.ranking.params.alpha < 0.0 {
            return Err(anyhow!("Ridge alpha must not be negative"));
        }

        if self.recommender.top_k == 0 {
            return Err(anyhow!("top_k must be greater than 0"));
        }

        if self.model_dir.is_empty() {
            return Err(anyhow!("Model directory is required"));
        }

        Ok(())
    }
}
