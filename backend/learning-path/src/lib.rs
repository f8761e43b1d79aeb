pub mod config;
pub mod error;
pub mod models;
pub mod persistence;
pub mod services;
pub mod utils;

// Re-export common types
pub use config::Config;
pub use error::{AppError, Result};
pub use persistence::ModelStore;
pub use services::{
    DataPipeline, LearningPathPipeline, ModelParams, RankingPipeline, RecommenderSystem,
};
