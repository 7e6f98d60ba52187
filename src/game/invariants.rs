//! Game invariants - sanity checks that detect bugs.
//!
//! No sequence of commands should be able to trigger these. A violation means
//! the engine itself is wrong.

use std::collections::HashMap;

use crate::game::{GameEngine, MAX_USERNAME_LEN, is_valid_username};

/// Invariant violation error.
#[derive(Debug, Clone)]
pub struct InvariantViolation {
    /// Description of the violated invariant.
    pub message: String,
}

impl std::fmt::Display for InvariantViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Invariant violation: {}", self.message)
    }
}

impl std::error::Error for InvariantViolation {}

/// Check all game invariants.
///
/// Returns a list of violations found, or empty if all invariants hold.
#[must_use]
pub fn check_invariants(engine: &GameEngine) -> Vec<InvariantViolation> {
    let mut violations = Vec::new();
    let map = engine.map();

    if !engine.is_active() && engine.player_count() > 0 {
        violations.push(InvariantViolation {
            message: format!(
                "Game over but {} players still registered",
                engine.player_count()
            ),
        });
    }

    let mut occupants = HashMap::new();
    for player in engine.sessions() {
        let position = player.position();

        if !map.in_bounds(position) {
            violations.push(InvariantViolation {
                message: format!("Player {} is off the map at {position:?}", player.id()),
            });
        } else if !map.tile_at(position).is_passable() {
            violations.push(InvariantViolation {
                message: format!("Player {} is inside a wall at {position:?}", player.id()),
            });
        }

        if let Some(other) = occupants.insert(position, player.id()) {
            violations.push(InvariantViolation {
                message: format!(
                    "Players {other} and {} share tile {position:?}",
                    player.id()
                ),
            });
        }

        let name = player.username();
        if name.chars().count() > MAX_USERNAME_LEN || !is_valid_username(name) {
            violations.push(InvariantViolation {
                message: format!("Player {} has invalid username {name:?}", player.id()),
            });
        }
    }

    violations
}
