//! Simulation configuration and tuning constants.
//!
//! Every number the heart and puppet state machines depend on lives here as a
//! named field. Defaults reproduce the observed behavior; any of them can be
//! overridden from JSON.

use crate::error::SimResult;
use bevy_ecs::prelude::*;
use serde::{Deserialize, Serialize};

/// Top-level simulation configuration.
#[derive(Resource, Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Fixed timestep in seconds (1/20 = 20 ticks per second).
    pub fixed_timestep: f32,
    /// Seed for the simulation's random generator.
    pub seed: u64,
    /// Day clock value at world creation.
    pub start_day_time: u64,
    /// Heart / puppet tuning.
    pub creaking: CreakingConfig,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            fixed_timestep: 1.0 / 20.0,
            seed: 0x5eed_c0de,
            start_day_time: 0,
            creaking: CreakingConfig::default(),
        }
    }
}

impl SimConfig {
    /// Parse a config document; missing fields keep their defaults.
    pub fn from_json(data: &str) -> SimResult<Self> {
        Ok(serde_json::from_str(data)?)
    }

    pub fn to_json_pretty(&self) -> SimResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }
}

/// Tuning for the heart / puppet pair.
#[derive(Resource, Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CreakingConfig {
    // Heart
    /// A player must be this close to an awake heart for it to summon.
    pub spawn_player_radius: f32,
    /// A bound puppet farther than this from its heart is dismissed.
    pub despawn_distance: f32,
    /// Distance mapped onto the 0..=15 comparator range.
    pub comparator_range: f32,
    /// Slow-cycle countdown is reset to `base + rand(0..jitter)`.
    pub update_interval_base: i32,
    pub update_interval_jitter: i32,
    /// Length of the post-damage trail sequence.
    pub trail_duration: u32,
    /// Failed puppet resolutions tolerated before the binding is forgotten.
    pub reference_grace_ticks: u32,
    pub spawn_attempts: u32,
    pub spawn_horizontal_range: i32,
    pub spawn_vertical_range: i32,
    pub regrowth_max_depth: u32,
    pub regrowth_max_visits: usize,
    pub regrowth_min_placements: u32,
    pub regrowth_max_placements: u32,

    // Puppet
    pub puppet_max_health: f32,
    /// Squared distance within which a gazing viewer activates the puppet.
    pub activation_distance_sq: f32,
    /// Gaze tolerance: look·direction must exceed `1 - tolerance`.
    pub gaze_tolerance: f32,
    /// Viewers farther than this are not sensed at all.
    pub sense_range: f32,
    pub invulnerability_ticks: u32,
    pub attack_animation_ticks: u32,
    pub attack_damage: f32,
    pub attack_reach: f32,
    /// Blocks per tick while chasing a target.
    pub chase_speed: f32,
    pub crumble_ticks: u32,
    pub generic_death_ticks: u32,
    /// Contact ticks above which the puppet counts as stuck with a viewer.
    pub stuck_contact_ticks: u32,
}

impl Default for CreakingConfig {
    fn default() -> Self {
        Self {
            spawn_player_radius: 32.0,
            despawn_distance: 34.0,
            comparator_range: 32.0,
            update_interval_base: 20,
            update_interval_jitter: 5,
            trail_duration: 100,
            reference_grace_ticks: 30,
            spawn_attempts: 5,
            spawn_horizontal_range: 16,
            spawn_vertical_range: 8,
            regrowth_max_depth: 2,
            regrowth_max_visits: 64,
            regrowth_min_placements: 2,
            regrowth_max_placements: 3,

            puppet_max_health: 1.0,
            activation_distance_sq: 144.0,
            gaze_tolerance: 0.5,
            sense_range: 32.0,
            invulnerability_ticks: 8,
            attack_animation_ticks: 15,
            attack_damage: 3.0,
            attack_reach: 1.8,
            chase_speed: 0.13,
            crumble_ticks: 45,
            generic_death_ticks: 20,
            stuck_contact_ticks: 4,
        }
    }
}
