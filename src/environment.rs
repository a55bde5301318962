//! World-level conditions the heart reacts to.

use bevy_ecs::prelude::*;
use serde::{Deserialize, Serialize};

/// Length of a full day in ticks.
pub const DAY_LENGTH: u64 = 24_000;

/// Day-time window (half open) during which hearts are awake.
pub const CREAKING_ACTIVE_WINDOW: (u64, u64) = (12_600, 23_401);

/// Day clock and difficulty.
#[derive(Resource, Debug, Clone, Serialize, Deserialize)]
pub struct Environment {
    /// Absolute day clock; the time of day is `day_time % DAY_LENGTH`.
    pub day_time: u64,
    /// False on peaceful difficulty.
    pub spawn_monsters: bool,
}

impl Default for Environment {
    fn default() -> Self {
        Self {
            day_time: 0,
            spawn_monsters: true,
        }
    }
}

impl Environment {
    pub fn time_of_day(&self) -> u64 {
        self.day_time % DAY_LENGTH
    }

    /// Whether hearts are in their active (night) window.
    pub fn is_creaking_active(&self) -> bool {
        let (start, end) = CREAKING_ACTIVE_WINDOW;
        (start..end).contains(&self.time_of_day())
    }

    pub fn advance(&mut self) {
        self.day_time = self.day_time.wrapping_add(1);
    }
}

/// Advances the day clock by one tick.
pub fn day_clock_system(mut env: ResMut<Environment>) {
    env.advance();
}
