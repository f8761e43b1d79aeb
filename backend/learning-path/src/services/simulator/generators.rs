use super::{ItemCatalog, Result, SimulationError, UserTable};
use crate::config::SimulationConfig;
use crate::models::{Item, User};
use rand::seq::index;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rand_distr::{Beta, Distribution, StandardNormal};
use std::collections::BTreeSet;
use tracing::debug;

/// Maximum number of skills a single item covers.
const MAX_SKILLS_PER_ITEM: usize = 3;
/// Items at or above this difficulty may carry prerequisites.
const PREREQUISITE_MIN_DIFFICULTY: u8 = 3;
/// Minutes of estimated time per difficulty level.
const BASE_TIME_PER_LEVEL: f64 = 10.0;
const MIN_ESTIMATED_TIME: f64 = 5.0;

/// Generate the learner population.
///
/// Mastery is drawn per skill from Beta(mastery_alpha, mastery_beta), which
/// with the default (2, 5) skews toward low initial mastery. Behavioral
/// traits are uniform over their documented ranges.
pub fn generate_users(config: &SimulationConfig) -> Result<UserTable> {
    let mastery_dist = Beta::new(config.mastery_alpha, config.mastery_beta)
        .map_err(|e| SimulationError::InvalidConfig(format!("mastery distribution: {}", e)))?;

    let mut rng = ChaCha8Rng::seed_from_u64(config.seed);
    let mut users = UserTable::new();

    for user_id in 0..config.num_users as u32 {
        let mastery: Vec<f64> = (0..config.num_skills)
            .map(|_| mastery_dist.sample(&mut rng))
            .collect();

        let learning_rate = rng.gen_range(0.05..0.3);
        let difficulty_tolerance = rng.gen_range(0.5..1.5);
        let dropout_sensitivity = rng.gen_range(0.0..1.0);

        users.insert(
            user_id,
            User {
                user_id,
                mastery,
                learning_rate,
                difficulty_tolerance,
                dropout_sensitivity,
            },
        );
    }

    debug!(num_users = users.len(), seed = config.seed, "Generated users");
    Ok(users)
}

/// Generate the item catalog.
pub fn generate_items(config: &SimulationConfig) -> Result<ItemCatalog> {
    let num_skills = config.num_skills;
    if num_skills == 0 {
        return Err(SimulationError::InvalidConfig(
            "items need at least one skill".to_string(),
        ));
    }

    let mut rng = ChaCha8Rng::seed_from_u64(config.seed);
    let mut items = ItemCatalog::new();

    for item_id in 0..config.num_items as u32 {
        let difficulty: u8 = rng.gen_range(1..=5);

        let num_item_skills = rng.gen_range(1..=num_skills.min(MAX_SKILLS_PER_ITEM));
        let skill_indices = index::sample(&mut rng, num_skills, num_item_skills).into_vec();

        let mut skills = vec![0.0; num_skills];
        for &s in &skill_indices {
            skills[s] = 1.0;
        }

        // Prerequisites only come from skills earlier than a covered one
        let mut prerequisites = BTreeSet::new();
        if difficulty >= PREREQUISITE_MIN_DIFFICULTY {
            for &s in &skill_indices {
                if s > 0 && rng.gen::<f64>() < 0.5 {
                    prerequisites.insert(rng.gen_range(0..s));
                }
            }
        }

        let noise: f64 = rng.sample::<f64, _>(StandardNormal) * 2.0;
        let estimated_time =
            (BASE_TIME_PER_LEVEL * difficulty as f64 + noise).max(MIN_ESTIMATED_TIME);

        items.insert(
            item_id,
            Item {
                item_id,
                skills,
                difficulty,
                prerequisites,
                estimated_time,
            },
        );
    }

    debug!(num_items = items.len(), seed = config.seed, "Generated items");
    Ok(items)
}
