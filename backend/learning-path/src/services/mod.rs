pub mod features;
pub mod pipeline;
pub mod ranking;
pub mod recommender;
pub mod simulator;

pub use features::FeatureSource;
pub use pipeline::{DataPipeline, LearningPathPipeline, ModelReport, PipelineMetadata};
pub use ranking::{ModelParams, RankingPipeline};
pub use recommender::RecommenderSystem;
pub use simulator::{run_simulation, ItemCatalog, SimulationOutput, UserTable};
