use crate::config::DEFAULT_FEATURE_COLUMNS;
use crate::error::{AppError, Result};
use crate::models::{InteractionRecord, ItemId, UserId};
use crate::services::features::{extract_interaction_features, InteractionFeatures};
use crate::services::simulator::{ItemCatalog, UserTable};
use std::collections::HashMap;
use tracing::info;

/// Feature extraction stage: logs + population + catalog -> feature rows.
pub struct DataPipeline<'a> {
    users: &'a UserTable,
    items: &'a ItemCatalog,
    feature_columns: Vec<String>,
    features: Option<Vec<InteractionFeatures>>,
}

impl<'a> DataPipeline<'a> {
    pub fn new(users: &'a UserTable, items: &'a ItemCatalog) -> Self {
        Self::with_feature_columns(
            users,
            items,
            DEFAULT_FEATURE_COLUMNS.iter().map(|c| c.to_string()).collect(),
        )
    }

    pub fn with_feature_columns(
        users: &'a UserTable,
        items: &'a ItemCatalog,
        feature_columns: Vec<String>,
    ) -> Self {
        Self {
            users,
            items,
            feature_columns,
            features: None,
        }
    }

    pub fn process(&mut self, logs: &[InteractionRecord]) -> Result<&[InteractionFeatures]> {
        let features = extract_interaction_features(logs, self.users, self.items)?;

        info!(
            rows = features.len(),
            columns = InteractionFeatures::COLUMNS.len(),
            "Extracted interaction features"
        );

        Ok(self.features.insert(features).as_slice())
    }

    pub fn features(&self) -> Result<&[InteractionFeatures]> {
        self.features.as_deref().ok_or(AppError::NotProcessed)
    }

    /// Columns the ranking model trains on.
    pub fn feature_columns(&self) -> Result<&[String]> {
        if self.features.is_none() {
            return Err(AppError::NotProcessed);
        }
        Ok(&self.feature_columns)
    }

    /// Scoring table: the latest feature row for each distinct (user, item)
    /// pair, pairs in order of first appearance in the log.
    pub fn pair_features(&self) -> Result<Vec<InteractionFeatures>> {
        let features = self.features()?;

        let mut position: HashMap<(UserId, ItemId), usize> = HashMap::new();
        let mut pairs: Vec<InteractionFeatures> = Vec::new();
        for row in features {
            let key = (row.user_id, row.item_id);
            match position.get(&key) {
                Some(&idx) => pairs[idx] = row.clone(),
                None => {
                    position.insert(key, pairs.len());
                    pairs.push(row.clone());
                }
            }
        }

        Ok(pairs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Item, User};
    use std::collections::BTreeSet;

    fn fixtures() -> (UserTable, ItemCatalog) {
        let mut users = UserTable::new();
        for id in 0..2u32 {
            users.insert(
                id,
                User {
                    user_id: id,
                    mastery: vec![0.5, 0.5],
                    learning_rate: 0.1,
                    difficulty_tolerance: 1.0,
                    dropout_sensitivity: 0.3,
                },
            );
        }
        let mut items = ItemCatalog::new();
        for id in 0..2u32 {
            items.insert(
                id,
                Item {
                    item_id: id,
                    skills: vec![1.0, 0.0],
                    difficulty: 2,
                    prerequisites: BTreeSet::new(),
                    estimated_time: 20.0,
                },
            );
        }
        (users, items)
    }

    fn record(user_id: u32, item_id: u32, step: usize, quiz: f64) -> InteractionRecord {
        InteractionRecord {
            user_id,
            item_id,
            step,
            success: true,
            quiz_score: quiz,
            time_spent: 20.0,
            skill_match: 0.5,
            difficulty_gap: 2.0,
            skill_gain: 0.01,
            difficulty: 2,
            estimated_time: 20.0,
            num_prerequisites: 0,
            dropout_sensitivity: 0.3,
        }
    }

    #[test]
    fn test_not_processed() {
        let (users, items) = fixtures();
        let pipeline = DataPipeline::new(&users, &items);
        assert!(matches!(pipeline.features(), Err(AppError::NotProcessed)));
        assert!(matches!(pipeline.feature_columns(), Err(AppError::NotProcessed)));
        assert!(matches!(pipeline.pair_features(), Err(AppError::NotProcessed)));
    }

    #[test]
    fn test_pair_features_latest_row_first_position() {
        let (users, items) = fixtures();
        let mut pipeline = DataPipeline::new(&users, &items);
        let logs = vec![
            record(1, 0, 0, 10.0),
            record(0, 1, 0, 20.0),
            record(1, 0, 1, 30.0),
            record(1, 1, 2, 40.0),
        ];
        assert_eq!(pipeline.process(&logs).unwrap().len(), 4);
        assert_eq!(pipeline.feature_columns().unwrap().len(), DEFAULT_FEATURE_COLUMNS.len());

        let pairs = pipeline.pair_features().unwrap();
        let keys: Vec<(u32, u32)> = pairs.iter().map(|r| (r.user_id, r.item_id)).collect();
        assert_eq!(keys, vec![(1, 0), (0, 1), (1, 1)]);
        assert_eq!(pairs[0].quiz_score, 30.0);
        // Only the user's first row precedes it
        assert_eq!(pairs[0].user_num_attempts, 1);
    }

    #[test]
    fn test_unknown_item_propagates() {
        let (users, items) = fixtures();
        let mut pipeline = DataPipeline::new(&users, &items);
        let result = pipeline.process(&[record(0, 9, 0, 50.0)]);
        assert!(matches!(result, Err(AppError::Feature(_))));
    }
}
