// ============================================
// Learner Simulator
// ============================================
//
// Synthetic population + catalog, and the stochastic dynamics that
// evolve per-user mastery over a sequence of item attempts:
// 1. Generators (users, items)
// 2. Interaction step (one user, one item)
// 3. Driver (item selection, dropout, per-user sequences)
//
// All randomness comes from ChaCha8Rng seeded from the run config, so a
// run is fully reproducible from its seed.

pub mod driver;
pub mod generators;
pub mod interaction;

pub use driver::{
    run_simulation, run_simulation_core, sample_by_score, select_item, SimulationOutput,
};
pub use generators::{generate_items, generate_users};
pub use interaction::simulate_interaction;

use crate::models::{Item, ItemId, User, UserId};
use std::collections::BTreeMap;
use thiserror::Error;

/// Population keyed by user id, iterated in id order.
pub type UserTable = BTreeMap<UserId, User>;
/// Catalog keyed by item id, iterated in id order.
pub type ItemCatalog = BTreeMap<ItemId, Item>;

#[derive(Debug, Error)]
pub enum SimulationError {
    #[error("Invalid simulation config: {0}")]
    InvalidConfig(String),
}

pub type Result<T> = std::result::Result<T, SimulationError>;
