use crate::persistence::PersistenceError;
use crate::services::features::FeatureError;
use crate::services::ranking::RankingError;
use crate::services::simulator::SimulationError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Simulation error: {0}")]
    Simulation(#[from] SimulationError),

    #[error("Feature error: {0}")]
    Feature(#[from] FeatureError),

    #[error("Ranking error: {0}")]
    Ranking(#[from] RankingError),

    #[error("Persistence error: {0}")]
    Persistence(#[from] PersistenceError),

    #[error("Pipeline not executed. Call run() first")]
    NotExecuted,

    #[error("Data not processed. Call process() first")]
    NotProcessed,
}
