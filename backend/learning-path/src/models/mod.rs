use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::warn;

pub type UserId = u32;
pub type ItemId = u32;

/// A synthetic learner.
///
/// `mastery` is the only mutable part of a user; the simulation driver owns
/// the user table and lends `&mut User` to one interaction step at a time.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct User {
    pub user_id: UserId,
    /// Per-skill competence in [0, 1]
    pub mastery: Vec<f64>,
    /// Fraction of the remaining gap closed on a successful attempt (0.05 - 0.3)
    pub learning_rate: f64,
    /// Divisor applied to item difficulty (0.5 - 1.5)
    pub difficulty_tolerance: f64,
    /// Scales the dropout probability after consecutive failures (0 - 1)
    pub dropout_sensitivity: f64,
}

impl User {
    /// Normalized dot product of mastery and the item's skill coverage.
    pub fn skill_match(&self, item: &Item) -> f64 {
        let skill_count = item.skill_count();
        if skill_count == 0.0 {
            return 0.0;
        }

        let dot: f64 = self
            .mastery
            .iter()
            .zip(&item.skills)
            .map(|(m, s)| m * s)
            .sum();
        dot / skill_count
    }

    pub fn mean_mastery(&self) -> f64 {
        crate::utils::mean(&self.mastery)
    }

    /// True when every prerequisite skill of the item is at or above `threshold`.
    pub fn satisfies_prerequisites(&self, item: &Item, threshold: f64) -> bool {
        item.prerequisites
            .iter()
            .all(|&skill| self.mastery.get(skill).copied().unwrap_or(0.0) >= threshold)
    }
}

/// A learning item in the catalog. Immutable once generated.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Item {
    pub item_id: ItemId,
    /// Binary skill coverage vector (0.0 / 1.0)
    pub skills: Vec<f64>,
    /// Difficulty level 1 - 5
    pub difficulty: u8,
    /// Skill indices that should be mastered before attempting the item
    pub prerequisites: BTreeSet<usize>,
    /// Expected completion time in minutes (>= 5.0)
    pub estimated_time: f64,
}

impl Item {
    /// Sum of the skill coverage vector.
    pub fn skill_count(&self) -> f64 {
        self.skills.iter().sum()
    }

    /// Indices of the skills this item covers.
    pub fn covered_skills(&self) -> impl Iterator<Item = usize> + '_ {
        self.skills
            .iter()
            .enumerate()
            .filter(|(_, s)| **s != 0.0)
            .map(|(idx, _)| idx)
    }

    pub fn num_covered_skills(&self) -> usize {
        self.covered_skills().count()
    }
}

/// One row of the interaction log.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InteractionRecord {
    pub user_id: UserId,
    pub item_id: ItemId,
    pub step: usize,
    pub success: bool,
    pub quiz_score: f64,
    pub time_spent: f64,
    pub skill_match: f64,
    /// Item difficulty divided by the user's difficulty tolerance
    pub difficulty_gap: f64,
    pub skill_gain: f64,
    pub difficulty: u8,
    pub estimated_time: f64,
    pub num_prerequisites: usize,
    pub dropout_sensitivity: f64,
}

impl InteractionRecord {
    /// Success as a 0/1 value, the way it enters aggregates and targets.
    pub fn success_value(&self) -> f64 {
        if self.success {
            1.0
        } else {
            0.0
        }
    }
}

/// Model output for one (user, item) pair.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RelevanceScore {
    pub user_id: UserId,
    pub item_id: ItemId,
    pub relevance_score: f64,
}

/// Scored pairs fed into the recommender.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RelevanceTable {
    pub rows: Vec<RelevanceScore>,
}

impl RelevanceTable {
    pub const COLUMNS: [&'static str; 3] = ["user_id", "item_id", "relevance_score"];

    pub fn new(rows: Vec<RelevanceScore>) -> Self {
        Self { rows }
    }

    /// Build a table from loosely-typed records (e.g. JSON rows from a caller).
    ///
    /// A record set missing any required column yields an empty table.
    pub fn from_records(records: &[serde_json::Value]) -> Self {
        let mut rows = Vec::with_capacity(records.len());

        for record in records {
            match serde_json::from_value::<RelevanceScore>(record.clone()) {
                Ok(row) => rows.push(row),
                Err(e) => {
                    warn!(
                        error = %e,
                        required = ?Self::COLUMNS,
                        "Malformed relevance record, treating table as empty"
                    );
                    return Self::default();
                }
            }
        }

        Self { rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// One ranked recommendation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Recommendation {
    pub user_id: UserId,
    pub item_id: ItemId,
    pub relevance_score: f64,
    /// 1-based position within the user's list
    pub rank: usize,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RecommendationTable {
    pub rows: Vec<Recommendation>,
}

impl RecommendationTable {
    pub const COLUMNS: [&'static str; 4] = ["user_id", "item_id", "relevance_score", "rank"];

    pub fn columns(&self) -> &'static [&'static str] {
        &Self::COLUMNS
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Number of distinct users with at least one row.
    pub fn num_users(&self) -> usize {
        self.rows
            .iter()
            .map(|r| r.user_id)
            .collect::<BTreeSet<_>>()
            .len()
    }

    pub fn mean_relevance(&self) -> f64 {
        let scores: Vec<f64> = self.rows.iter().map(|r| r.relevance_score).collect();
        crate::utils::mean(&scores)
    }
}
