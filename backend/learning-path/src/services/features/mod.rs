/// Feature Extraction Module
///
/// Turns the raw interaction log plus user/item state into tabular rows.
///
/// # Extractors
/// - **Interaction features**: one row per log record; historical aggregates
///   only see records strictly earlier in log order
/// - **User features**: one summary row per user over the whole log
/// - **Item features**: one summary row per catalog item over the whole log
pub mod interaction;
pub mod item;
pub mod user;

pub use interaction::{extract_interaction_features, InteractionFeatures};
pub use item::{extract_item_features, ItemFeatureRow};
pub use user::{extract_user_features, UserFeatureRow};

use crate::models::{ItemId, UserId};
use thiserror::Error;

/// Mastery at or above this counts as "mastered".
pub const MASTERY_THRESHOLD: f64 = 0.8;

#[derive(Debug, Error)]
pub enum FeatureError {
    #[error("Log references unknown user: {0}")]
    UnknownUser(UserId),

    #[error("Log references unknown item: {0}")]
    UnknownItem(ItemId),
}

pub type Result<T> = std::result::Result<T, FeatureError>;

/// Named numeric columns of a feature row.
///
/// The ranking pipeline addresses columns by name, so any row type that
/// implements this can be trained on and scored.
pub trait FeatureSource {
    /// Value of `column`, or `None` if the row has no such column.
    fn feature(&self, column: &str) -> Option<f64>;
}
