//! ECS Components for the heart / puppet simulation.
//!
//! Components are pure data containers attached to entities.
//! The state machines that mutate them live in `systems`.

use crate::blocks::BlockPos;
use crate::weak_ref::WeakRef;
use bevy_ecs::prelude::*;
use glam::Vec3;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ============================================================================
// SPATIAL COMPONENTS
// ============================================================================

/// World position of an entity's feet.
#[derive(Component, Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Position {
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    pub fn from_vec3(v: Vec3) -> Self {
        Self::new(v.x, v.y, v.z)
    }

    pub fn as_vec3(&self) -> Vec3 {
        Vec3::new(self.x, self.y, self.z)
    }

    pub fn distance_to(&self, other: &Position) -> f32 {
        self.as_vec3().distance(other.as_vec3())
    }
}

/// Per-tick displacement.
#[derive(Component, Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Velocity {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Velocity {
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    pub fn as_vec3(&self) -> Vec3 {
        Vec3::new(self.x, self.y, self.z)
    }

    pub fn from_vec3(v: Vec3) -> Self {
        Self::new(v.x, v.y, v.z)
    }
}

/// Axis-aligned bounding box.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    pub fn contains(&self, point: Vec3) -> bool {
        point.cmpge(self.min).all() && point.cmplt(self.max).all()
    }

    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    pub fn size(&self) -> Vec3 {
        self.max - self.min
    }
}

/// Collision body dimensions, anchored at the feet.
#[derive(Component, Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Body {
    pub width: f32,
    pub height: f32,
    pub eye_height: f32,
}

impl Body {
    pub const PLAYER: Body = Body {
        width: 0.6,
        height: 1.8,
        eye_height: 1.62,
    };

    pub const PUPPET: Body = Body {
        width: 0.9,
        height: 2.7,
        eye_height: 2.3,
    };

    pub fn aabb(&self, pos: &Position) -> Aabb {
        let half = self.width / 2.0;
        Aabb {
            min: Vec3::new(pos.x - half, pos.y, pos.z - half),
            max: Vec3::new(pos.x + half, pos.y + self.height, pos.z + half),
        }
    }

    pub fn eye(&self, pos: &Position) -> Vec3 {
        Vec3::new(pos.x, pos.y + self.eye_height, pos.z)
    }
}

impl Default for Body {
    fn default() -> Self {
        Self::PLAYER
    }
}

// ============================================================================
// IDENTITY COMPONENTS
// ============================================================================

/// Persistent identifier, stable across save/load.
#[derive(Component, Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityUuid(pub Uuid);

/// Scoreboard team; members of the same team never target each other.
#[derive(Component, Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Team(pub u32);

/// Marker for mobs that must never be dismissed by environment rules
/// (e.g. name-tagged).
#[derive(Component, Debug, Clone, Copy, Default)]
pub struct Persistent;

// ============================================================================
// COMBAT COMPONENTS
// ============================================================================

/// Hit points.
#[derive(Component, Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Health {
    pub current: f32,
    pub max: f32,
}

impl Health {
    pub fn new(max: f32) -> Self {
        Self { current: max, max }
    }

    pub fn is_alive(&self) -> bool {
        self.current > 0.0
    }

    pub fn damage(&mut self, amount: f32) {
        self.current = (self.current - amount).max(0.0);
    }

    pub fn kill(&mut self) {
        self.current = 0.0;
    }
}

impl Default for Health {
    fn default() -> Self {
        Self::new(20.0)
    }
}

// ============================================================================
// VIEWER COMPONENTS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum GameMode {
    #[default]
    Survival,
    Creative,
    Spectator,
}

/// A player: the only kind of viewer that can root or wake a puppet.
#[derive(Component, Debug, Clone, Copy)]
pub struct Player {
    /// Unit look direction.
    pub look: Vec3,
    pub mode: GameMode,
    /// Wearing a gaze disguise (carved pumpkin).
    pub gaze_disguise: bool,
}

impl Player {
    pub fn new(look: Vec3) -> Self {
        Self {
            look: look.normalize_or_zero(),
            mode: GameMode::Survival,
            gaze_disguise: false,
        }
    }

    pub fn look_at(&mut self, eye: Vec3, target: Vec3) {
        self.look = (target - eye).normalize_or_zero();
    }

    pub fn is_spectator(&self) -> bool {
        self.mode == GameMode::Spectator
    }

    /// Whether mobs may pick this player as a target.
    pub fn can_be_targeted(&self) -> bool {
        self.mode == GameMode::Survival
    }
}

impl Default for Player {
    fn default() -> Self {
        Self::new(Vec3::Z)
    }
}

// ============================================================================
// BEHAVIOR COMPONENTS
// ============================================================================

/// The touchpoints the puppet needs from the external behavior scheduler.
pub trait TargetMemory {
    fn remember_attack_target(&mut self, target: Entity);
    fn forget_attack_target(&mut self);
    fn attack_target(&self) -> Option<Entity>;
    /// Drop any in-flight navigation.
    fn stop_navigation(&mut self);
}

/// Minimal behavior memory: an attack target and a walk goal.
#[derive(Component, Debug, Clone, Copy, Default)]
pub struct Brain {
    pub attack_target: Option<Entity>,
    pub walk_target: Option<Vec3>,
}

impl TargetMemory for Brain {
    fn remember_attack_target(&mut self, target: Entity) {
        self.attack_target = Some(target);
    }

    fn forget_attack_target(&mut self) {
        self.attack_target = None;
        self.walk_target = None;
    }

    fn attack_target(&self) -> Option<Entity> {
        self.attack_target
    }

    fn stop_navigation(&mut self) {
        self.walk_target = None;
    }
}

/// Viewers the puppet currently senses, nearest first.
#[derive(Component, Debug, Clone, Default)]
pub struct SensedViewers(pub Vec<Entity>);

// ============================================================================
// HEART / PUPPET COMPONENTS
// ============================================================================

/// Block entity data of a creaking heart.
#[derive(Component, Debug, Clone)]
pub struct Heart {
    pub pos: BlockPos,
    /// The bound puppet, if any.
    pub puppet: Option<WeakRef<Puppet>>,
    pub ticks: u64,
    pub update_timer: i32,
    pub trail_timer: u32,
    pub last_puppet_pos: Option<Vec3>,
    pub comparator: u8,
}

impl Heart {
    pub fn new(pos: BlockPos) -> Self {
        Self {
            pos,
            puppet: None,
            ticks: 0,
            update_timer: 0,
            trail_timer: 0,
            last_puppet_pos: None,
            comparator: 0,
        }
    }

    /// Whether this heart's binding names the puppet with `id`.
    pub fn binds(&self, id: Uuid) -> bool {
        self.puppet.as_ref().is_some_and(|r| r.refers_to(id))
    }

    pub fn has_puppet(&self) -> bool {
        self.puppet.is_some()
    }
}

/// Creaking puppet state.
#[derive(Component, Debug, Clone, Default)]
pub struct Puppet {
    /// Owning heart, set once by `init_home`.
    pub home: Option<BlockPos>,
    /// Frozen by a gazing viewer this tick.
    pub rooted: bool,
    /// Sticky "noticed" flag.
    pub active: bool,
    pub invuln_window: u32,
    pub attack_window: u32,
    /// Heart-issued death in progress.
    pub crumbling: bool,
    /// Ticks spent dead (crumbling or generic).
    pub death_ticks: u32,
    pub viewer_contact_ticks: u32,
    pub glowing_eyes: bool,
    pub next_eye_flicker: u32,
}

impl Puppet {
    /// Bind this puppet to its heart. Called once, right after creation.
    pub fn init_home(&mut self, home: BlockPos) {
        self.home = Some(home);
    }

    /// Bound to a heart (as opposed to a free-roaming creaking).
    pub fn is_transient(&self) -> bool {
        self.home.is_some()
    }
}

// ============================================================================
// BUNDLE HELPERS
// ============================================================================

/// Bundle for spawning a viewer.
#[derive(Bundle)]
pub struct PlayerBundle {
    pub id: EntityUuid,
    pub player: Player,
    pub position: Position,
    pub velocity: Velocity,
    pub body: Body,
    pub health: Health,
}

impl PlayerBundle {
    pub fn new(id: Uuid, position: Position, look: Vec3) -> Self {
        Self {
            id: EntityUuid(id),
            player: Player::new(look),
            position,
            velocity: Velocity::default(),
            body: Body::PLAYER,
            health: Health::new(20.0),
        }
    }
}

/// Bundle for spawning a puppet.
#[derive(Bundle)]
pub struct PuppetBundle {
    pub id: EntityUuid,
    pub puppet: Puppet,
    pub position: Position,
    pub velocity: Velocity,
    pub body: Body,
    pub health: Health,
    pub brain: Brain,
    pub sensed: SensedViewers,
}

impl PuppetBundle {
    pub fn new(id: Uuid, position: Position, max_health: f32) -> Self {
        Self {
            id: EntityUuid(id),
            puppet: Puppet::default(),
            position,
            velocity: Velocity::default(),
            body: Body::PUPPET,
            health: Health::new(max_health),
            brain: Brain::default(),
            sensed: SensedViewers::default(),
        }
    }
}
