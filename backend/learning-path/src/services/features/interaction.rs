use super::{FeatureError, FeatureSource, Result, MASTERY_THRESHOLD};
use crate::models::{InteractionRecord, ItemId, UserId};
use crate::services::simulator::{ItemCatalog, UserTable};
use crate::utils::RunningMean;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

/// One engineered row per interaction.
///
/// Log columns are carried through unchanged, except `difficulty_gap`, which
/// is recomputed against mean mastery (item difficulty minus 5x mean mastery)
/// instead of the simulator's tolerance-scaled gap.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InteractionFeatures {
    pub user_id: UserId,
    pub item_id: ItemId,
    pub step: usize,

    // Outcome columns
    pub success: bool,
    pub quiz_score: f64,
    pub time_spent: f64,
    pub skill_gain: f64,
    /// Caller-supplied training target; synthesized from the outcome when absent
    pub relevance: Option<f64>,

    // Static / log columns
    pub skill_match: f64,
    pub difficulty: f64,
    pub estimated_time: f64,
    pub num_prerequisites: usize,
    pub dropout_sensitivity: f64,

    // Skill-level features
    pub skill_gap: f64,
    pub fraction_skills_mastered: f64,
    pub difficulty_gap: f64,

    // User history (strictly earlier rows)
    pub user_success_rate: f64,
    pub user_avg_quiz: f64,
    pub user_avg_time: f64,
    pub user_num_attempts: usize,

    // Item history (strictly earlier rows)
    pub item_avg_success: f64,
    pub item_avg_quiz: f64,
    pub item_avg_time: f64,
    pub item_num_attempts: usize,
    pub item_num_skills: usize,
}

impl InteractionFeatures {
    /// Every numeric column name this row answers to.
    pub const COLUMNS: [&'static str; 24] = [
        "step",
        "success",
        "quiz_score",
        "time_spent",
        "skill_gain",
        "skill_match",
        "difficulty",
        "estimated_time",
        "num_prerequisites",
        "dropout_sensitivity",
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
        "item_num_attempts",
        "item_num_skills",
        "user_id",
        "item_id",
    ];

    pub fn success_value(&self) -> f64 {
        if self.success {
            1.0
        } else {
            0.0
        }
    }
}

impl FeatureSource for InteractionFeatures {
    fn feature(&self, column: &str) -> Option<f64> {
        let value = match column {
            "user_id" => self.user_id as f64,
            "item_id" => self.item_id as f64,
            "step" => self.step as f64,
            "success" => self.success_value(),
            "quiz_score" => self.quiz_score,
            "time_spent" => self.time_spent,
            "skill_gain" => self.skill_gain,
            "skill_match" => self.skill_match,
            "difficulty" => self.difficulty,
            "estimated_time" => self.estimated_time,
            "num_prerequisites" => self.num_prerequisites as f64,
            "dropout_sensitivity" => self.dropout_sensitivity,
            "skill_gap" => self.skill_gap,
            "fraction_skills_mastered" => self.fraction_skills_mastered,
            "difficulty_gap" => self.difficulty_gap,
            "user_success_rate" => self.user_success_rate,
            "user_avg_quiz" => self.user_avg_quiz,
            "user_avg_time" => self.user_avg_time,
            "user_num_attempts" => self.user_num_attempts as f64,
            "item_avg_success" => self.item_avg_success,
            "item_avg_quiz" => self.item_avg_quiz,
            "item_avg_time" => self.item_avg_time,
            "item_num_attempts" => self.item_num_attempts as f64,
            "item_num_skills" => self.item_num_skills as f64,
            _ => return None,
        };
        Some(value)
    }
}

/// Outcome history of one user or one item.
#[derive(Debug, Clone, Copy, Default)]
struct History {
    success: RunningMean,
    quiz: RunningMean,
    time: RunningMean,
}

impl History {
    fn push(&mut self, record: &InteractionRecord) {
        self.success.push(record.success_value());
        self.quiz.push(record.quiz_score);
        self.time.push(record.time_spent);
    }
}

/// Build one feature row per log record, in log order.
///
/// Skill features use the users' current mastery. Historical aggregates for
/// row `i` are computed from rows `0..i` only, so a row never sees its own
/// outcome or anything after it; with no history they are 0.
pub fn extract_interaction_features(
    logs: &[InteractionRecord],
    users: &UserTable,
    items: &ItemCatalog,
) -> Result<Vec<InteractionFeatures>> {
    let mut user_history: HashMap<UserId, History> = HashMap::new();
    let mut item_history: HashMap<ItemId, History> = HashMap::new();
    let mut rows = Vec::with_capacity(logs.len());

    for record in logs {
        let user = users
            .get(&record.user_id)
            .ok_or(FeatureError::UnknownUser(record.user_id))?;
        let item = items
            .get(&record.item_id)
            .ok_or(FeatureError::UnknownItem(record.item_id))?;

        let covered: Vec<f64> = item
            .covered_skills()
            .map(|s| user.mastery.get(s).copied().unwrap_or(0.0))
            .collect();

        let (skill_gap, fraction_skills_mastered) = if covered.is_empty() {
            (0.0, 0.0)
        } else {
            let n = covered.len() as f64;
            let gap = covered.iter().map(|m| 1.0 - m).sum::<f64>() / n;
            let mastered = covered.iter().filter(|m| **m >= MASTERY_THRESHOLD).count() as f64;
            (gap, mastered / n)
        };

        let difficulty_gap = item.difficulty as f64 - user.mean_mastery() * 5.0;

        let uh = user_history.get(&record.user_id).copied().unwrap_or_default();
        let ih = item_history.get(&record.item_id).copied().unwrap_or_default();

        rows.push(InteractionFeatures {
            user_id: record.user_id,
            item_id: record.item_id,
            step: record.step,
            success: record.success,
            quiz_score: record.quiz_score,
            time_spent: record.time_spent,
            skill_gain: record.skill_gain,
            relevance: None,
            skill_match: record.skill_match,
            difficulty: record.difficulty as f64,
            estimated_time: record.estimated_time,
            num_prerequisites: record.num_prerequisites,
            dropout_sensitivity: record.dropout_sensitivity,
            skill_gap,
            fraction_skills_mastered,
            difficulty_gap,
            user_success_rate: uh.success.mean(),
            user_avg_quiz: uh.quiz.mean(),
            user_avg_time: uh.time.mean(),
            user_num_attempts: uh.success.count(),
            item_avg_success: ih.success.mean(),
            item_avg_quiz: ih.quiz.mean(),
            item_avg_time: ih.time.mean(),
            item_num_attempts: ih.success.count(),
            item_num_skills: item.num_covered_skills(),
        });

        user_history.entry(record.user_id).or_default().push(record);
        item_history.entry(record.item_id).or_default().push(record);
    }

    debug!(num_rows = rows.len(), "Extracted interaction features");
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Item, User};
    use std::collections::BTreeSet;

    fn fixtures() -> (UserTable, ItemCatalog) {
        let mut users = UserTable::new();
        users.insert(
            0,
            User {
                user_id: 0,
                mastery: vec![0.9, 0.5, 0.1],
                learning_rate: 0.1,
                difficulty_tolerance: 1.0,
                dropout_sensitivity: 0.3,
            },
        );
        users.insert(
            1,
            User {
                user_id: 1,
                mastery: vec![0.2, 0.2, 0.2],
                learning_rate: 0.1,
                difficulty_tolerance: 1.0,
                dropout_sensitivity: 0.6,
            },
        );

        let mut items = ItemCatalog::new();
        items.insert(
            0,
            Item {
                item_id: 0,
                skills: vec![1.0, 1.0, 0.0],
                difficulty: 2,
                prerequisites: BTreeSet::new(),
                estimated_time: 20.0,
            },
        );
        items.insert(
            1,
            Item {
                item_id: 1,
                skills: vec![0.0, 0.0, 1.0],
                difficulty: 4,
                prerequisites: BTreeSet::from([0]),
                estimated_time: 40.0,
            },
        );
        (users, items)
    }

    fn record(
        user_id: u32,
        item_id: u32,
        step: usize,
        success: bool,
        quiz: f64,
    ) -> InteractionRecord {
        InteractionRecord {
            user_id,
            item_id,
            step,
            success,
            quiz_score: quiz,
            time_spent: 25.0,
            skill_match: 0.5,
            difficulty_gap: 2.0,
            skill_gain: 0.0,
            difficulty: 2,
            estimated_time: 20.0,
            num_prerequisites: 0,
            dropout_sensitivity: 0.3,
        }
    }

    #[test]
    fn test_skill_features() {
        let (users, items) = fixtures();
        let logs = vec![record(0, 0, 0, true, 90.0)];
        let rows = extract_interaction_features(&logs, &users, &items).unwrap();

        let row = &rows[0];
        // Covered mastery [0.9, 0.5]
        assert!((row.skill_gap - 0.3).abs() < 1e-9);
        assert!((row.fraction_skills_mastered - 0.5).abs() < 1e-9);
        // 2 - 5 * mean(0.9, 0.5, 0.1)
        assert!((row.difficulty_gap + 0.5).abs() < 1e-9);
        assert_eq!(row.item_num_skills, 2);
    }

    #[test]
    fn test_history_defaults_and_accumulates() {
        let (users, items) = fixtures();
        let logs = vec![
            record(0, 0, 0, true, 90.0),
            record(0, 1, 1, false, 40.0),
            record(1, 0, 0, false, 30.0),
            record(0, 0, 2, true, 80.0),
        ];
        let rows = extract_interaction_features(&logs, &users, &items).unwrap();

        assert_eq!(rows[0].user_num_attempts, 0);
        assert_eq!(rows[0].user_success_rate, 0.0);
        assert_eq!(rows[0].item_avg_quiz, 0.0);

        assert_eq!(rows[1].user_num_attempts, 1);
        assert!((rows[1].user_avg_quiz - 90.0).abs() < 1e-9);
        assert_eq!(rows[1].item_num_attempts, 0);

        // User 1 has no history, item 0 has one prior success
        assert_eq!(rows[2].user_num_attempts, 0);
        assert_eq!(rows[2].item_num_attempts, 1);
        assert!((rows[2].item_avg_success - 1.0).abs() < 1e-9);

        assert_eq!(rows[3].user_num_attempts, 2);
        assert!((rows[3].user_success_rate - 0.5).abs() < 1e-9);
        assert_eq!(rows[3].item_num_attempts, 2);
        assert!((rows[3].item_avg_quiz - 60.0).abs() < 1e-9);
    }

    #[test]
    fn test_no_leakage_from_current_or_future_rows() {
        let (users, items) = fixtures();
        let logs = vec![
            record(0, 0, 0, true, 90.0),
            record(1, 0, 0, false, 35.0),
            record(0, 0, 1, true, 85.0),
            record(0, 1, 2, false, 20.0),
        ];
        let baseline = extract_interaction_features(&logs, &users, &items).unwrap();

        // Perturb row 2 onwards
        let mut perturbed_logs = logs.clone();
        for r in perturbed_logs.iter_mut().skip(2) {
            r.success = !r.success;
            r.quiz_score = 3.0;
            r.time_spent = 999.0;
        }
        let perturbed = extract_interaction_features(&perturbed_logs, &users, &items).unwrap();

        for column in [
            "user_success_rate",
            "user_avg_quiz",
            "user_avg_time",
            "user_num_attempts",
            "item_avg_success",
            "item_avg_quiz",
            "item_avg_time",
        ] {
            for idx in 0..=2 {
                assert_eq!(
                    baseline[idx].feature(column),
                    perturbed[idx].feature(column),
                    "{} changed at row {}",
                    column,
                    idx
                );
            }
        }
    }

    #[test]
    fn test_unknown_ids_rejected() {
        let (users, items) = fixtures();
        let err = extract_interaction_features(&[record(9, 0, 0, true, 50.0)], &users, &items)
            .unwrap_err();
        assert!(matches!(err, FeatureError::UnknownUser(9)));

        let err = extract_interaction_features(&[record(0, 9, 0, true, 50.0)], &users, &items)
            .unwrap_err();
        assert!(matches!(err, FeatureError::UnknownItem(9)));
    }

    #[test]
    fn test_every_column_resolves() {
        let (users, items) = fixtures();
        let rows = extract_interaction_features(&[record(0, 1, 0, false, 10.0)], &users, &items)
            .unwrap();
        for column in InteractionFeatures::COLUMNS {
            assert!(rows[0].feature(column).is_some(), "missing {}", column);
        }
        assert_eq!(rows[0].feature("no_such_column"), None);
    }
}
