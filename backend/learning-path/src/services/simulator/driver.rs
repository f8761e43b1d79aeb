use super::interaction::simulate_interaction;
use super::{generate_items, generate_users, ItemCatalog, Result, UserTable};
use crate::config::SimulationConfig;
use crate::models::{InteractionRecord, Item, User};
use rand::distributions::WeightedIndex;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::{debug, info};

/// Users, catalog and the interaction log of one simulation run.
#[derive(Debug, Clone)]
pub struct SimulationOutput {
    /// Population after simulation (mastery reflects every successful attempt)
    pub users: UserTable,
    pub items: ItemCatalog,
    pub logs: Vec<InteractionRecord>,
}

/// Draw one index with probability proportional to its score.
///
/// Returns `None` when there is nothing to draw from (empty input, or no
/// positive finite weight).
pub fn sample_by_score<R: Rng + ?Sized>(scores: &[f64], rng: &mut R) -> Option<usize> {
    let dist = WeightedIndex::new(scores).ok()?;
    Some(rng.sample(dist))
}

/// Pick the next item for a user.
///
/// Candidates are items whose prerequisites the user has mastered; when none
/// qualify the whole catalog is used. Each candidate is weighted by
/// `exp(-|difficulty - (avg_mastery * 5 + 1)|)`, preferring items one level
/// above the user's current level on the item's skills.
pub fn select_item<'a, R: Rng + ?Sized>(
    user: &User,
    items: &'a ItemCatalog,
    prerequisite_threshold: f64,
    rng: &mut R,
) -> Option<&'a Item> {
    let mut candidates: Vec<&Item> = items
        .values()
        .filter(|item| user.satisfies_prerequisites(item, prerequisite_threshold))
        .collect();

    if candidates.is_empty() {
        debug!(
            user_id = user.user_id,
            "No prerequisite-satisfying items, falling back to full catalog"
        );
        candidates = items.values().collect();
    }

    let scores: Vec<f64> = candidates
        .iter()
        .map(|item| {
            let target_level = user.skill_match(item) * 5.0 + 1.0;
            (-(item.difficulty as f64 - target_level).abs()).exp()
        })
        .collect();

    sample_by_score(&scores, rng).map(|idx| candidates[idx])
}

/// Run every user through up to `config.steps_per_user` attempts.
///
/// Users are simulated one after another from a single generator seeded with
/// `config.seed`. Each step borrows exactly one user mutably; nothing is
/// shared between users besides the generator.
pub fn run_simulation_core(
    users: &mut UserTable,
    items: &ItemCatalog,
    config: &SimulationConfig,
) -> Vec<InteractionRecord> {
    let mut rng = ChaCha8Rng::seed_from_u64(config.seed);
    let mut logs = Vec::with_capacity(users.len() * config.steps_per_user);

    for user in users.values_mut() {
        let mut consecutive_failures = 0u32;
        let mut steps_taken = 0usize;

        for step in 0..config.steps_per_user {
            let Some(item) = select_item(user, items, config.prerequisite_threshold, &mut rng)
            else {
                break;
            };

            let mut record = simulate_interaction(user, item, config, &mut rng);
            record.step = step;

            if record.success {
                consecutive_failures = 0;
            } else {
                consecutive_failures += 1;
            }
            logs.push(record);
            steps_taken = step + 1;

            let dropout_prob = (config.dropout_rate
                * consecutive_failures as f64
                * user.dropout_sensitivity)
                .min(1.0);

            if rng.gen::<f64>() < dropout_prob {
                debug!(
                    user_id = user.user_id,
                    step,
                    consecutive_failures,
                    "User dropped out"
                );
                break;
            }
        }

        debug!(user_id = user.user_id, steps_taken, "User sequence finished");
    }

    logs
}

/// Generate users and items from the config seed and simulate them.
pub fn run_simulation(config: &SimulationConfig) -> Result<SimulationOutput> {
    let mut users = generate_users(config)?;
    let items = generate_items(config)?;

    let logs = run_simulation_core(&mut users, &items, config);

    info!(
        num_users = users.len(),
        num_items = items.len(),
        num_interactions = logs.len(),
        "Simulation complete"
    );

    Ok(SimulationOutput { users, items, logs })
}
