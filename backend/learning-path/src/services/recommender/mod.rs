/// Recommender Module
///
/// Turns per-pair relevance scores into ranked top-K lists.
///
/// # Rules
/// - Scores below `min_relevance` and excluded items are dropped
/// - Remaining items are sorted by score descending; ties keep input order
/// - At most `top_k` items per user, ranked from 1
/// - Duplicate (user, item) rows collapse: last score wins, first position kept
use crate::config::RecommenderConfig;
use crate::models::{
    ItemId, Recommendation, RecommendationTable, RelevanceScore, RelevanceTable, UserId,
};
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use tracing::debug;

#[derive(Debug, Clone)]
pub struct RecommenderSystem {
    top_k: usize,
    min_relevance: f64,
}

impl RecommenderSystem {
    pub fn new(top_k: usize, min_relevance: f64) -> Self {
        Self {
            top_k,
            min_relevance,
        }
    }

    pub fn from_config(config: &RecommenderConfig) -> Self {
        Self::new(config.top_k, config.min_relevance)
    }

    pub fn top_k(&self) -> usize {
        self.top_k
    }

    pub fn min_relevance(&self) -> f64 {
        self.min_relevance
    }

    /// Top-K `(item_id, score)` for one user, highest score first.
    ///
    /// `relevance_scores` is read as an ordered map: the iteration order
    /// breaks ties.
    pub fn recommend(
        &self,
        user_id: UserId,
        relevance_scores: &[(ItemId, f64)],
        exclude_items: &HashSet<ItemId>,
    ) -> Vec<(ItemId, f64)> {
        let mut candidates: Vec<(ItemId, f64)> = collapse_duplicates(relevance_scores)
            .into_iter()
            .filter(|(item_id, score)| {
                *score >= self.min_relevance && !exclude_items.contains(item_id)
            })
            .collect();

        // sort_by is stable, so equal scores keep their input order
        candidates.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));
        candidates.truncate(self.top_k);

        debug!(
            user_id,
            candidates = relevance_scores.len(),
            kept = candidates.len(),
            "Recommended items for user"
        );

        candidates
    }

    /// Recommendations for every user in the table, users in first-appearance
    /// order.
    ///
    /// With `exclude_seen`, items the user already has a relevance row for are
    /// excluded.
    pub fn recommend_batch(
        &self,
        relevance: &RelevanceTable,
        exclude_seen: bool,
    ) -> RecommendationTable {
        if relevance.is_empty() {
            return RecommendationTable::default();
        }

        let mut user_order: Vec<UserId> = Vec::new();
        let mut per_user: HashMap<UserId, Vec<(ItemId, f64)>> = HashMap::new();
        for RelevanceScore {
            user_id,
            item_id,
            relevance_score,
        } in &relevance.rows
        {
            per_user
                .entry(*user_id)
                .or_insert_with(|| {
                    user_order.push(*user_id);
                    Vec::new()
                })
                .push((*item_id, *relevance_score));
        }

        let mut rows = Vec::new();
        for user_id in user_order {
            let scores = per_user.remove(&user_id).unwrap_or_default();
            let exclude: HashSet<ItemId> = if exclude_seen {
                scores.iter().map(|(item_id, _)| *item_id).collect()
            } else {
                HashSet::new()
            };

            let recs = self.recommend(user_id, &scores, &exclude);
            rows.extend(
                recs.into_iter()
                    .enumerate()
                    .map(|(i, (item_id, relevance_score))| Recommendation {
                        user_id,
                        item_id,
                        relevance_score,
                        rank: i + 1,
                    }),
            );
        }

        RecommendationTable { rows }
    }

    /// One user's rows from a batch result, sorted by rank.
    pub fn get_recommendations_for_user(
        &self,
        user_id: UserId,
        recommendations: &RecommendationTable,
    ) -> Vec<Recommendation> {
        let mut rows: Vec<Recommendation> = recommendations
            .rows
            .iter()
            .filter(|r| r.user_id == user_id)
            .cloned()
            .collect();
        rows.sort_by_key(|r| r.rank);
        rows
    }
}

impl Default for RecommenderSystem {
    fn default() -> Self {
        Self::from_config(&RecommenderConfig::default())
    }
}

/// Map semantics over a pair list: a repeated item keeps the position of its
/// first appearance and the score of its last.
fn collapse_duplicates(scores: &[(ItemId, f64)]) -> Vec<(ItemId, f64)> {
    let mut position: HashMap<ItemId, usize> = HashMap::with_capacity(scores.len());
    let mut out: Vec<(ItemId, f64)> = Vec::with_capacity(scores.len());

    for &(item_id, score) in scores {
        match position.get(&item_id) {
            Some(&idx) => out[idx].1 = score,
            None => {
                position.insert(item_id, out.len());
                out.push((item_id, score));
            }
        }
    }

    out
}
