use crate::config::SimulationConfig;
use crate::models::{InteractionRecord, Item, User};
use crate::utils::sigmoid;
use rand::Rng;
use rand_distr::StandardNormal;

/// Simulate a single attempt of `item` by `user`.
///
/// Draws exactly three values from `rng`, always in the same order:
/// success, quiz score noise, time noise. On success the user's mastery
/// moves toward 1.0 on every covered skill; a failure leaves it untouched.
///
/// The returned record has `step = 0`; the driver tags it with the real step.
pub fn simulate_interaction<R: Rng + ?Sized>(
    user: &mut User,
    item: &Item,
    config: &SimulationConfig,
    rng: &mut R,
) -> InteractionRecord {
    let skill_match = user.skill_match(item);
    let difficulty_gap = item.difficulty as f64 / user.difficulty_tolerance;

    let logit = config.success_alpha * skill_match - config.difficulty_beta * difficulty_gap;
    let success_prob = sigmoid(logit);
    let success = rng.gen::<f64>() < success_prob;

    let (quiz_mean, quiz_scale) = if success {
        (80.0 + 20.0 * skill_match, 5.0)
    } else {
        (40.0 + 20.0 * skill_match, 10.0)
    };
    let quiz_noise: f64 = rng.sample(StandardNormal);
    let quiz_score = (quiz_mean + quiz_scale * quiz_noise).clamp(0.0, 100.0);

    let time_noise: f64 = rng.sample::<f64, _>(StandardNormal) * 2.0;
    let time_factor = if success {
        1.0 + 0.1 * difficulty_gap
    } else {
        1.5 + 0.2 * difficulty_gap
    };
    let time_spent = (item.estimated_time * time_factor + time_noise).max(1.0);

    let skill_gain = if success {
        apply_mastery_update(user, item)
    } else {
        0.0
    };

    InteractionRecord {
        user_id: user.user_id,
        item_id: item.item_id,
        step: 0,
        success,
        quiz_score,
        time_spent,
        skill_match,
        difficulty_gap,
        skill_gain,
        difficulty: item.difficulty,
        estimated_time: item.estimated_time,
        num_prerequisites: item.prerequisites.len(),
        dropout_sensitivity: user.dropout_sensitivity,
    }
}

/// Move mastery toward 1.0 on the item's skills; returns the mean gain over
/// covered skills, clipped to [0, 1].
fn apply_mastery_update(user: &mut User, item: &Item) -> f64 {
    let mut gained = 0.0;
    let mut covered = 0usize;

    for (mastery, &weight) in user.mastery.iter_mut().zip(&item.skills) {
        let before = *mastery;
        *mastery = (before + user.learning_rate * weight * (1.0 - before)).clamp(0.0, 1.0);

        if weight != 0.0 {
            gained += *mastery - before;
            covered += 1;
        }
    }

    if covered == 0 {
        0.0
    } else {
        (gained / covered as f64).clamp(0.0, 1.0)
    }
}
