//! Public API for the simulation.
//!
//! This module is the interface a host (a game server, a test harness, the
//! demo) uses to drive the heart / puppet simulation.
//!
//! ## Fixed Timestep
//!
//! The simulation uses a fixed timestep internally (default 20 Hz). When
//! `step(dt)` is called, the simulation accumulates time and runs fixed updates
//! as needed; `tick()` runs exactly one update.
//!
//! ## Block entity lifecycle
//!
//! Hearts are placed, removed, unloaded and loaded through this API. Removing
//! or unloading a heart never touches its puppet: the puppet keeps only its
//! home position and sorts itself out through its own home check.

use crate::blocks::{Axis, BlockGrid, BlockPos, HeartState, Material};
use crate::components::*;
use crate::config::SimConfig;
use crate::effects::{Effect, EffectBuffer};
use crate::environment::{day_clock_system, Environment};
use crate::error::{SimError, SimResult};
use crate::index::{BlockEntities, EntityIndex};
use crate::random::SimRng;
use crate::spatial::viewer_grid_update_system;
use crate::systems::*;
use crate::world::{init_resources, SimTick, Snapshot};
use bevy_ecs::prelude::*;
use glam::Vec3;
use tracing::debug;
use uuid::Uuid;

/// The main simulation world container.
///
/// Holds the ECS world and schedule, providing a clean API for:
/// - Initializing the simulation
/// - Stepping the simulation forward
/// - Editing blocks and hearts
/// - Spawning and steering viewers
/// - Saving, loading and snapshotting
pub struct SimWorld {
    world: World,
    schedule: Schedule,
    tick: u64,
    time: f32,
    /// Accumulated time for fixed timestep.
    time_accumulator: f32,
}

impl SimWorld {
    /// Create a new empty simulation world.
    pub fn new() -> Self {
        Self::with_config(SimConfig::default())
    }

    /// Create a new simulation world with custom configuration.
    pub fn with_config(config: SimConfig) -> Self {
        let mut world = World::new();
        init_resources(&mut world, &config);

        let mut schedule = Schedule::default();
        schedule.add_systems(
            (
                day_clock_system,
                viewer_grid_update_system,
                puppet_rooting_system,
                puppet_home_check_system,
                puppet_death_system,
                heart_tick_system,
                pursuit_system,
                strike_system,
                movement_system,
            )
                .chain(),
        );

        Self {
            world,
            schedule,
            tick: 0,
            time: 0.0,
            time_accumulator: 0.0,
        }
    }

    /// Rebuild a world from a save produced by [`SimWorld::save`].
    pub fn from_save(data: &str, config: SimConfig) -> SimResult<Self> {
        let save: WorldSave = serde_json::from_str(data)?;
        let grace = config.creaking.reference_grace_ticks;
        let max_health = config.creaking.puppet_max_health;
        let mut sim = Self::with_config(config);
        restore_world(&mut sim.world, &save, grace, max_health);
        sim.tick = save.tick;
        sim.world.resource_mut::<SimTick>().0 = save.tick;
        Ok(sim)
    }

    /// Step the simulation forward by `dt` seconds.
    ///
    /// Uses fixed timestep internally - accumulates time and runs fixed updates
    /// as needed. This ensures deterministic behavior regardless of frame rate.
    pub fn step(&mut self, dt: f32) {
        let fixed_dt = self.config().fixed_timestep;
        self.time_accumulator += dt;
        while self.time_accumulator >= fixed_dt {
            self.tick();
            self.time_accumulator -= fixed_dt;
        }
    }

    /// Run a single fixed update.
    ///
    /// Effects accumulate across ticks until [`SimWorld::drain_effects`] is
    /// called. Hosts should drain after every `tick` or `step`.
    pub fn tick(&mut self) {
        let fixed_dt = self.config().fixed_timestep;
        self.world.resource_mut::<SimTick>().increment();
        self.schedule.run(&mut self.world);
        self.tick += 1;
        self.time += fixed_dt;
    }

    /// Run `n` fixed updates.
    pub fn run_ticks(&mut self, n: u64) {
        for _ in 0..n {
            self.tick();
        }
    }

    pub fn current_tick(&self) -> u64 {
        self.tick
    }

    /// Elapsed simulation time in seconds.
    pub fn current_time(&self) -> f32 {
        self.time
    }

    pub fn config(&self) -> &SimConfig {
        self.world.resource::<SimConfig>()
    }

    // ------------------------------------------------------------------
    // Environment
    // ------------------------------------------------------------------

    pub fn environment(&self) -> &Environment {
        self.world.resource::<Environment>()
    }

    pub fn set_day_time(&mut self, day_time: u64) {
        self.world.resource_mut::<Environment>().day_time = day_time;
    }

    /// Toggle hostile spawning (false behaves like peaceful difficulty).
    pub fn set_spawn_monsters(&mut self, enabled: bool) {
        self.world.resource_mut::<Environment>().spawn_monsters = enabled;
    }

    // ------------------------------------------------------------------
    // Blocks and hearts
    // ------------------------------------------------------------------

    pub fn block(&self, pos: BlockPos) -> Material {
        self.world.resource::<BlockGrid>().get(pos)
    }

    /// Set a block. Overwriting a heart block removes its block entity.
    pub fn set_block(&mut self, pos: BlockPos, material: Material) -> Material {
        if material.heart_state().is_none() {
            self.drop_heart_entity(pos);
        }
        let previous = self.world.resource_mut::<BlockGrid>().set(pos, material);
        self.world
            .resource_mut::<EffectBuffer>()
            .push(Effect::BlockChanged { pos });
        previous
    }

    /// Fill the inclusive box `min..=max`, block by block through
    /// [`SimWorld::set_block`], so overwritten hearts lose their block entity.
    pub fn fill_blocks(&mut self, min: BlockPos, max: BlockPos, material: Material) {
        for x in min.x..=max.x {
            for y in min.y..=max.y {
                for z in min.z..=max.z {
                    self.set_block(BlockPos::new(x, y, z), material);
                }
            }
        }
    }

    /// Place a heart block and its block entity. The block starts uprooted;
    /// the first slow cycle derives its real state.
    pub fn place_heart(&mut self, pos: BlockPos, axis: Axis) -> SimResult<Entity> {
        if self.world.resource::<BlockEntities>().get(pos).is_some() {
            return Err(SimError::HeartExists(pos));
        }
        self.world.resource_mut::<BlockGrid>().set(
            pos,
            Material::Heart {
                axis,
                state: HeartState::Uprooted,
            },
        );
        let entity = self.world.spawn(Heart::new(pos)).id();
        self.world.resource_mut::<BlockEntities>().insert(pos, entity);
        debug!(%pos, "heart placed");
        Ok(entity)
    }

    /// Break a heart. Its binding is released; the puppet is not killed.
    pub fn remove_heart(&mut self, pos: BlockPos) -> SimResult<()> {
        if self.world.resource::<BlockEntities>().get(pos).is_none() {
            return Err(SimError::NoHeartAt(pos));
        }
        self.set_block(pos, Material::Air);
        Ok(())
    }

    fn drop_heart_entity(&mut self, pos: BlockPos) -> Option<Heart> {
        let entity = self.world.resource_mut::<BlockEntities>().remove(pos)?;
        let heart = self.world.get::<Heart>(entity).cloned();
        self.world.despawn(entity);
        debug!(%pos, "heart block entity removed");
        heart
    }

    pub fn heart_entity(&self, pos: BlockPos) -> Option<Entity> {
        self.world.resource::<BlockEntities>().get(pos)
    }

    pub fn heart(&self, pos: BlockPos) -> Option<&Heart> {
        self.world.get::<Heart>(self.heart_entity(pos)?)
    }

    /// Live puppet currently bound to the heart at `pos`.
    pub fn bound_puppet(&self, pos: BlockPos) -> Option<Entity> {
        let id = self.heart(pos)?.puppet.as_ref()?.id()?;
        let entity = self.entity_by_id(id)?;
        self.world.get::<Puppet>(entity).map(|_| entity)
    }

    /// Forcibly end the puppet bound to the heart at `pos`.
    pub fn kill_puppet(&mut self, pos: BlockPos, cause: Option<&Damage>) -> SimResult<bool> {
        let entity = self.heart_entity(pos).ok_or(SimError::NoHeartAt(pos))?;
        Ok(kill_puppet(&mut self.world, entity, cause))
    }

    // ------------------------------------------------------------------
    // Entities
    // ------------------------------------------------------------------

    pub fn entity_by_id(&self, id: Uuid) -> Option<Entity> {
        self.world.resource::<EntityIndex>().get(id)
    }

    /// Spawn a survival-mode viewer with a fresh identifier.
    pub fn spawn_player(&mut self, pos: Vec3, look: Vec3) -> Entity {
        let id = self.world.resource_mut::<SimRng>().uuid();
        let entity = self
            .world
            .spawn(PlayerBundle::new(id, Position::from_vec3(pos), look))
            .id();
        self.world.resource_mut::<EntityIndex>().insert(id, entity);
        entity
    }

    pub fn move_player(&mut self, entity: Entity, pos: Vec3) {
        if let Some(mut position) = self.world.get_mut::<Position>(entity) {
            *position = Position::from_vec3(pos);
        }
    }

    pub fn set_player_look(&mut self, entity: Entity, look: Vec3) {
        if let Some(mut player) = self.world.get_mut::<Player>(entity) {
            player.look = look.normalize_or_zero();
        }
    }

    /// Turn a viewer's eyes toward `target`.
    pub fn look_at(&mut self, entity: Entity, target: Vec3) {
        let Some(eye) = self.body_eye(entity) else {
            return;
        };
        if let Some(mut player) = self.world.get_mut::<Player>(entity) {
            player.look_at(eye, target);
        }
    }

    fn body_eye(&self, entity: Entity) -> Option<Vec3> {
        let pos = self.world.get::<Position>(entity)?;
        Some(self.world.get::<Body>(entity)?.eye(pos))
    }

    pub fn set_player_mode(&mut self, entity: Entity, mode: GameMode) {
        if let Some(mut player) = self.world.get_mut::<Player>(entity) {
            player.mode = mode;
        }
    }

    /// Wearing a gaze disguise (a carved pumpkin).
    pub fn set_gaze_disguise(&mut self, entity: Entity, disguised: bool) {
        if let Some(mut player) = self.world.get_mut::<Player>(entity) {
            player.gaze_disguise = disguised;
        }
    }

    pub fn set_team(&mut self, entity: Entity, team: Option<Team>) {
        if self.world.get::<EntityUuid>(entity).is_none() {
            return;
        }
        let mut entity_mut = self.world.entity_mut(entity);
        match team {
            Some(team) => {
                entity_mut.insert(team);
            }
            None => {
                entity_mut.remove::<Team>();
            }
        }
    }

    /// Deliver a hit. Returns whether it was accepted.
    pub fn damage(&mut self, target: Entity, damage: &Damage) -> bool {
        damage_entity(&mut self.world, target, damage)
    }

    /// Knockback or any other push. Ignored by rooted puppets.
    pub fn apply_impulse(&mut self, target: Entity, impulse: Vec3) -> bool {
        apply_impulse(&mut self.world, target, impulse)
    }

    pub fn puppet(&self, entity: Entity) -> Option<&Puppet> {
        self.world.get::<Puppet>(entity)
    }

    pub fn position(&self, entity: Entity) -> Option<Position> {
        self.world.get::<Position>(entity).copied()
    }

    pub fn health(&self, entity: Entity) -> Option<Health> {
        self.world.get::<Health>(entity).copied()
    }

    pub fn puppet_count(&mut self) -> usize {
        let mut query = self.world.query::<&Puppet>();
        query.iter(&self.world).count()
    }

    // ------------------------------------------------------------------
    // Persistence
    // ------------------------------------------------------------------

    /// Serialize the whole world.
    pub fn save(&mut self) -> SimResult<String> {
        let save = capture_world(&mut self.world, self.tick);
        Ok(serde_json::to_string(&save)?)
    }

    /// Unload a heart: persist its document and drop the block entity while
    /// the block itself stays in place.
    pub fn unload_heart(&mut self, pos: BlockPos) -> SimResult<HeartDocument> {
        let entity = self.heart_entity(pos).ok_or(SimError::NoHeartAt(pos))?;
        let doc = save_heart(&self.world, entity).ok_or(SimError::NoHeartAt(pos))?;
        self.world.resource_mut::<BlockEntities>().remove(pos);
        self.world.despawn(entity);
        debug!(%pos, creaking = ?doc.creaking, "heart unloaded");
        Ok(doc)
    }

    pub fn load_heart(&mut self, doc: &HeartDocument) -> SimResult<Entity> {
        if self.heart_entity(doc.pos).is_some() {
            return Err(SimError::HeartExists(doc.pos));
        }
        let grace = self.config().creaking.reference_grace_ticks;
        Ok(load_heart(&mut self.world, doc, grace))
    }

    /// Unload a puppet (chunk unload): persist it and remove it from the world.
    pub fn unload_puppet(&mut self, id: Uuid) -> SimResult<PuppetDocument> {
        let entity = self.entity_by_id(id).ok_or(SimError::UnknownEntity(id))?;
        let doc = save_puppet(&self.world, entity).ok_or(SimError::UnknownEntity(id))?;
        self.world.resource_mut::<EntityIndex>().remove(id);
        self.world.despawn(entity);
        debug!(%id, "puppet unloaded");
        Ok(doc)
    }

    pub fn load_puppet(&mut self, doc: &PuppetDocument) -> SimResult<Entity> {
        if self.world.resource::<EntityIndex>().contains(doc.uuid) {
            return Err(SimError::DuplicateEntity(doc.uuid));
        }
        let max_health = self.config().creaking.puppet_max_health;
        Ok(load_puppet(&mut self.world, doc, max_health))
    }

    // ------------------------------------------------------------------
    // Output
    // ------------------------------------------------------------------

    /// Get a snapshot of the current simulation state.
    pub fn snapshot(&mut self) -> Snapshot {
        Snapshot::from_world(&mut self.world, self.tick)
    }

    /// Get the snapshot as a JSON string.
    pub fn snapshot_json(&mut self) -> String {
        self.snapshot().to_json().unwrap_or_else(|_| "{}".to_string())
    }

    /// Take every side effect emitted since the last drain.
    pub fn drain_effects(&mut self) -> Vec<Effect> {
        self.world.resource_mut::<EffectBuffer>().drain()
    }

    pub fn effects(&self) -> &EffectBuffer {
        self.world.resource::<EffectBuffer>()
    }

    /// Get direct access to the ECS world (for advanced usage).
    pub fn world(&self) -> &World {
        &self.world
    }

    /// Get mutable access to the ECS world (for advanced usage).
    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }
}

impl Default for SimWorld {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_world() {
        let sim = SimWorld::new();
        assert_eq!(sim.current_tick(), 0);
        assert_eq!(sim.config().creaking.crumble_ticks, 45);
    }

    #[test]
    fn test_step_advances_tick() {
        let mut sim = SimWorld::new();
        sim.step(0.05);
        assert_eq!(sim.current_tick(), 1);
        sim.step(0.12);
        assert_eq!(sim.current_tick(), 3);
        assert_eq!(sim.environment().day_time, 3);
    }

    #[test]
    fn test_place_heart_twice_is_an_error() {
        let mut sim = SimWorld::new();
        let pos = BlockPos::new(0, 1, 0);
        sim.place_heart(pos, Axis::Y).unwrap();
        assert!(matches!(sim.place_heart(pos, Axis::Y), Err(SimError::HeartExists(_))));
    }

    #[test]
    fn test_remove_missing_heart_is_an_error() {
        let mut sim = SimWorld::new();
        assert!(matches!(
            sim.remove_heart(BlockPos::new(5, 5, 5)),
            Err(SimError::NoHeartAt(_))
        ));
    }

    #[test]
    fn test_overwriting_heart_block_drops_entity() {
        let mut sim = SimWorld::new();
        let pos = BlockPos::new(0, 1, 0);
        let entity = sim.place_heart(pos, Axis::Y).unwrap();
        sim.set_block(pos, Material::Solid);
        assert!(sim.heart_entity(pos).is_none());
        assert!(sim.world().get::<Heart>(entity).is_none());
    }

    /// A night-time heart in a log column, with a player in range.
    fn grove_with_player(heart: BlockPos) -> SimWorld {
        let mut sim = SimWorld::with_config(SimConfig::default().with_seed(7));
        sim.fill_blocks(BlockPos::new(-24, -1, -24), BlockPos::new(24, -1, 24), Material::Solid);
        sim.set_block(heart.up(-1), Material::Log { axis: Axis::Y });
        sim.set_block(heart.up(1), Material::Log { axis: Axis::Y });
        sim.place_heart(heart, Axis::Y).unwrap();
        sim.set_day_time(13_000);
        sim.spawn_player(Vec3::new(0.5, 0.0, 20.5), Vec3::Y);
        sim
    }

    #[test]
    fn test_fill_over_heart_releases_it() {
        let heart = BlockPos::new(0, 1, 0);
        let mut sim = grove_with_player(heart);
        let puppet = (0..30)
            .find_map(|_| {
                sim.tick();
                sim.bound_puppet(heart)
            })
            .expect("heart summoned");
        sim.drain_effects();

        sim.fill_blocks(heart, heart, Material::Solid);
        assert_eq!(sim.block(heart), Material::Solid);
        assert!(sim.heart_entity(heart).is_none());
        assert!(sim
            .effects()
            .iter()
            .any(|e| matches!(e, Effect::BlockChanged { pos } if *pos == heart)));

        sim.tick();
        assert!(!sim.health(puppet).unwrap().is_alive(), "orphaned puppet drops dead");
        assert!(sim.place_heart(heart, Axis::Y).is_ok());
    }

    #[test]
    fn test_drain_effects_empties_buffer() {
        let mut sim = grove_with_player(BlockPos::new(0, 1, 0));
        sim.run_ticks(30);
        assert!(!sim.drain_effects().is_empty());
        assert!(sim.effects().is_empty());
    }

    #[test]
    fn test_spawned_player_is_indexed() {
        let mut sim = SimWorld::new();
        let player = sim.spawn_player(Vec3::ZERO, Vec3::Z);
        let id = sim.world().get::<EntityUuid>(player).unwrap().0;
        assert_eq!(sim.entity_by_id(id), Some(player));
    }

    #[test]
    fn test_snapshot_json() {
        let mut sim = SimWorld::new();
        sim.place_heart(BlockPos::new(0, 1, 0), Axis::Y).unwrap();
        let json = sim.snapshot_json();
        assert!(json.contains("hearts"));
        assert!(json.contains("puppets"));
    }

    #[test]
    fn test_unknown_puppet_unload_is_an_error() {
        let mut sim = SimWorld::new();
        let id = Uuid::from_u128(99);
        assert!(matches!(sim.unload_puppet(id), Err(SimError::UnknownEntity(_))));
    }

    #[test]
    fn test_loading_a_loaded_puppet_is_an_error() {
        let mut sim = SimWorld::new();
        let doc = PuppetDocument {
            uuid: Uuid::from_u128(42),
            pos: Position::new(0.5, 0.0, 0.5),
            health: 1.0,
            home_pos: None,
            persistent: false,
        };
        sim.load_puppet(&doc).unwrap();
        assert!(matches!(sim.load_puppet(&doc), Err(SimError::DuplicateEntity(_))));
        assert_eq!(sim.puppet_count(), 1);
    }
}
