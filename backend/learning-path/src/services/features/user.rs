use super::{FeatureError, Result, MASTERY_THRESHOLD};
use crate::models::{InteractionRecord, UserId};
use crate::services::simulator::ItemCatalog;
use crate::utils::{mean, sample_std};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Whole-log summary of one user.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserFeatureRow {
    pub user_id: UserId,
    pub success_rate: f64,
    pub avg_quiz: f64,
    pub std_quiz: f64,
    pub avg_time: f64,
    pub std_time: f64,
    /// Share of skills whose estimated mastery is at or above the threshold
    pub fraction_mastered: f64,
    pub num_attempts: usize,
    /// Mean of the per-skill mastery estimates
    pub avg_skill_mastery: f64,
}

/// Summarise each user that appears in the log, in ascending user id.
///
/// Per-skill mastery is estimated from behavior alone: the mean skill match of
/// the user's attempts on items covering that skill (0 for skills never
/// attempted).
pub fn extract_user_features(
    logs: &[InteractionRecord],
    items: &ItemCatalog,
    num_skills: usize,
) -> Result<Vec<UserFeatureRow>> {
    let mut grouped: BTreeMap<UserId, Vec<&InteractionRecord>> = BTreeMap::new();
    for record in logs {
        grouped.entry(record.user_id).or_default().push(record);
    }

    let mut rows = Vec::with_capacity(grouped.len());

    for (user_id, user_logs) in grouped {
        let successes: Vec<f64> = user_logs.iter().map(|r| r.success_value()).collect();
        let quiz: Vec<f64> = user_logs.iter().map(|r| r.quiz_score).collect();
        let time: Vec<f64> = user_logs.iter().map(|r| r.time_spent).collect();

        let mut match_sums = vec![0.0; num_skills];
        let mut match_counts = vec![0usize; num_skills];
        for record in &user_logs {
            let item = items
                .get(&record.item_id)
                .ok_or(FeatureError::UnknownItem(record.item_id))?;
            for skill in item.covered_skills().filter(|s| *s < num_skills) {
                match_sums[skill] += record.skill_match;
                match_counts[skill] += 1;
            }
        }

        let skill_mastery: Vec<f64> = match_sums
            .iter()
            .zip(&match_counts)
            .map(|(sum, &count)| if count == 0 { 0.0 } else { sum / count as f64 })
            .collect();

        let fraction_mastered = if skill_mastery.is_empty() {
            0.0
        } else {
            skill_mastery
                .iter()
                .filter(|m| **m >= MASTERY_THRESHOLD)
                .count() as f64
                / skill_mastery.len() as f64
        };

        rows.push(UserFeatureRow {
            user_id,
            success_rate: mean(&successes),
            avg_quiz: mean(&quiz),
            std_quiz: sample_std(&quiz),
            avg_time: mean(&time),
            std_time: sample_std(&time),
            fraction_mastered,
            num_attempts: user_logs.len(),
            avg_skill_mastery: mean(&skill_mastery),
        });
    }

    Ok(rows)
}
