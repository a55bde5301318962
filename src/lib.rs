//! Creaking Sim - heart / puppet binding core
//!
//! A deterministic, fixed-timestep ECS simulation of a stationary heart block
//! and the single puppet it summons, binds and supervises.
//! Uses `bevy_ecs` for the entity-component-system architecture.

pub mod api;
pub mod blocks;
pub mod components;
pub mod config;
pub mod effects;
pub mod environment;
pub mod error;
pub mod gaze;
pub mod index;
pub mod random;
pub mod regrowth;
pub mod spatial;
pub mod systems;
pub mod weak_ref;
pub mod world;

pub use api::SimWorld;
pub use blocks::{Axis, BlockGrid, BlockPos, Direction, HeartState, Material};
pub use components::*;
pub use config::{CreakingConfig, SimConfig};
pub use effects::{Effect, EffectBuffer, GameEventKind, ParticleKind, SoundKind};
pub use environment::Environment;
pub use error::{SimError, SimResult};
pub use spatial::{ViewerEntry, ViewerGrid};
pub use systems::*;
pub use weak_ref::{Resolution, WeakRef};
pub use world::{SimTick, Snapshot};
