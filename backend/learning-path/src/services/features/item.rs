use super::{FeatureError, Result};
use crate::models::{InteractionRecord, ItemId};
use crate::services::simulator::ItemCatalog;
use crate::utils::RunningMean;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Whole-log summary of one catalog item.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ItemFeatureRow {
    pub item_id: ItemId,
    pub difficulty: f64,
    pub num_skills: usize,
    pub num_prerequisites: usize,
    pub avg_success: f64,
    pub avg_quiz: f64,
    pub avg_time: f64,
    pub num_attempts: usize,
}

#[derive(Default)]
struct ItemStats {
    success: RunningMean,
    quiz: RunningMean,
    time: RunningMean,
}

/// One row per catalog item in catalog order; items nobody attempted get
/// zeroed aggregates.
pub fn extract_item_features(
    logs: &[InteractionRecord],
    items: &ItemCatalog,
) -> Result<Vec<ItemFeatureRow>> {
    let mut stats: HashMap<ItemId, ItemStats> = HashMap::new();
    for record in logs {
        if !items.contains_key(&record.item_id) {
            return Err(FeatureError::UnknownItem(record.item_id));
        }
        let entry = stats.entry(record.item_id).or_default();
        entry.success.push(record.success_value());
        entry.quiz.push(record.quiz_score);
        entry.time.push(record.time_spent);
    }

    Ok(items
        .values()
        .map(|item| {
            let s = stats.remove(&item.item_id).unwrap_or_default();
            ItemFeatureRow {
                item_id: item.item_id,
                difficulty: item.difficulty as f64,
                num_skills: item.num_covered_skills(),
                num_prerequisites: item.prerequisites.len(),
                avg_success: s.success.mean(),
                avg_quiz: s.quiz.mean(),
                avg_time: s.time.mean(),
                num_attempts: s.success.count(),
            }
        })
        .collect())
}
