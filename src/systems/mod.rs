//! ECS systems for the heart / puppet simulation.
//!
//! Systems contain the game logic that operates on components.
//!
//! ## Tick order
//!
//! Every fixed update runs the systems below as one chain:
//!
//! **Environment and sensing**
//! - `day_clock_system` - advances the day clock
//! - `viewer_grid_update_system` - rebuilds the viewer grid
//!
//! **Puppet**
//! - `puppet_rooting_system` - gaze checks, activation, freeze/unfreeze
//! - `puppet_home_check_system` - orphaned puppets drop dead
//! - `puppet_death_system` - generic death countdown and crumbling
//!
//! **Heart**
//! - `heart_tick_system` - comparator, trail, slow cycle (exclusive)
//!
//! **Locomotion**
//! - `pursuit_system` - chase the remembered target
//! - `strike_system` - melee swing
//! - `movement_system` - apply velocity
//!
//! Rooting runs before the heart so a summon or dismissal in the heart tick
//! sees this tick's gaze state, and before locomotion so a frozen puppet never
//! moves in the tick it is looked at.

pub mod combat;
pub mod heart;
pub mod movement;
pub mod puppet;
pub mod serialization;

pub use combat::*;
pub use heart::*;
pub use movement::*;
pub use puppet::*;
pub use serialization::*;
