//! Heart state machine.
//!
//! Every tick a heart resolves its puppet, refreshes its comparator signal and
//! plays the post-damage trail. Every 20-24 ticks it runs the slow cycle:
//! re-derive its block state, summon a puppet when awake and watched, or
//! dismiss the bound one when it strays, outlives the night or traps a viewer.
//!
//! Heart logic runs in exclusive systems because it spawns and removes
//! puppets. The component is cloned out, mutated and written back, so puppet
//! callbacks made in between never observe a half-updated heart.

use crate::blocks::{BlockGrid, BlockPos, HeartState, Material};
use crate::components::*;
use crate::config::CreakingConfig;
use crate::effects::{
    Effect, EffectBuffer, EntityStatus, GameEventKind, SoundKind, TRAIL_TOWARD_HEART,
    TRAIL_TOWARD_PUPPET,
};
use crate::environment::Environment;
use crate::index::{BlockEntities, EntityIndex};
use crate::random::SimRng;
use crate::regrowth::{grow_resin, SearchLimits};
use crate::spatial::ViewerGrid;
use crate::weak_ref::{Resolution, WeakRef, WorldLookup};
use super::combat::Damage;
use super::puppet::{finish_crumbling, init_home, is_stuck_with_player, kill_from_heart};
use bevy_ecs::prelude::*;
use glam::Vec3;
use rand::Rng;
use tracing::{debug, trace};

/// Runs one tick of every loaded heart, in position order.
pub fn heart_tick_system(world: &mut World) {
    let hearts: Vec<Entity> = {
        let index = world.resource::<BlockEntities>();
        index
            .positions()
            .into_iter()
            .filter_map(|pos| index.get(pos))
            .collect()
    };
    for entity in hearts {
        tick_heart(world, entity);
    }
}

/// Clone the heart out of `entity`, run `f` on it and store it back.
fn with_heart<R>(
    world: &mut World,
    entity: Entity,
    f: impl FnOnce(&mut World, &mut Heart) -> R,
) -> Option<R> {
    let mut heart = world.get::<Heart>(entity).cloned()?;
    let result = f(world, &mut heart);
    if let Some(mut stored) = world.get_mut::<Heart>(entity) {
        *stored = heart;
    }
    Some(result)
}

/// One tick of a single heart.
pub fn tick_heart(world: &mut World, entity: Entity) {
    let config = world.resource::<CreakingConfig>().clone();
    with_heart(world, entity, |world, heart| {
        heart.ticks += 1;
        let puppet = resolve_puppet(world, heart);

        let signal = comparator_signal(world, heart.pos, puppet, config.comparator_range);
        if signal != heart.comparator {
            heart.comparator = signal;
            world.resource_mut::<EffectBuffer>().push(Effect::ComparatorChanged {
                pos: heart.pos,
                signal,
            });
        }

        if heart.trail_timer > 0 {
            run_trail(world, heart, puppet, &config);
        }

        let expired = heart.update_timer < 0;
        heart.update_timer -= 1;
        if expired {
            let jitter = world
                .resource_mut::<SimRng>()
                .between(0, config.update_interval_jitter - 1);
            heart.update_timer = config.update_interval_base + jitter;
            slow_cycle(world, heart, puppet, &config);
        }
    });
}

/// Resolve the bound puppet, forgetting the binding once its grace runs out.
pub fn resolve_puppet(world: &World, heart: &mut Heart) -> Option<Entity> {
    let link = heart.puppet.as_mut()?;
    match link.resolve(&WorldLookup::new(world)) {
        Resolution::Live(entity) => Some(entity),
        Resolution::Pending => None,
        Resolution::Gone => {
            debug!(pos = %heart.pos, "heart forgot its puppet");
            heart.puppet = None;
            None
        }
    }
}

/// Distance from the puppet's feet to the bottom center of the heart.
pub fn distance_to_heart(world: &World, heart_pos: BlockPos, puppet: Entity) -> Option<f32> {
    let pos = world.get::<Position>(puppet)?;
    Some(pos.as_vec3().distance(heart_pos.bottom_center()))
}

fn puppet_center(world: &World, puppet: Entity) -> Option<Vec3> {
    let pos = world.get::<Position>(puppet)?;
    let body = world.get::<Body>(puppet)?;
    Some(body.aabb(pos).center())
}

/// 15 right next to the heart, falling to 0 at `range`; 0 without a puppet.
pub fn comparator_signal(world: &World, heart_pos: BlockPos, puppet: Option<Entity>, range: f32) -> u8 {
    let Some(distance) = puppet.and_then(|p| distance_to_heart(world, heart_pos, p)) else {
        return 0;
    };
    let fraction = distance.clamp(0.0, range) / range;
    15 - (fraction * 15.0).floor() as u8
}

fn run_trail(world: &mut World, heart: &mut Heart, puppet: Option<Entity>, config: &CreakingConfig) {
    let t = heart.trail_timer;
    if t > config.trail_duration / 2 {
        emit_trails(world, heart.pos, puppet, 1, true);
        emit_trails(world, heart.pos, puppet, 1, false);
    }

    if t % 10 == 0 {
        if let Some(mut last) = heart.last_puppet_pos {
            if let Some(center) = puppet.and_then(|p| puppet_center(world, p)) {
                last = center;
                heart.last_puppet_pos = Some(center);
            }
            let duration = config.trail_duration.max(1) as f32;
            let progress = 0.2 + 0.8 * (duration - t as f32) / duration;
            let point = last + (heart.pos.center() - last) * progress;
            let volume = t as f32 / 2.0 / duration + 0.5;
            world.resource_mut::<EffectBuffer>().sound_with_volume(
                SoundKind::HeartHurt,
                BlockPos::containing(point).center(),
                volume,
            );
        }
    }

    heart.trail_timer -= 1;
}

/// Trail particles between the heart and random points on the puppet.
fn emit_trails(
    world: &mut World,
    heart_pos: BlockPos,
    puppet: Option<Entity>,
    count: usize,
    toward_puppet: bool,
) {
    let Some(aabb) = puppet.and_then(|p| {
        let pos = world.get::<Position>(p)?;
        Some(world.get::<Body>(p)?.aabb(pos))
    }) else {
        return;
    };
    let color = if toward_puppet {
        TRAIL_TOWARD_PUPPET
    } else {
        TRAIL_TOWARD_HEART
    };

    let trails: Vec<Effect> = {
        let mut rng = world.resource_mut::<SimRng>();
        (0..count)
            .map(|_| {
                let on_puppet = aabb.min + Vec3::new(rng.unit(), rng.unit(), rng.unit()) * aabb.size();
                let on_heart = heart_pos.corner() + Vec3::new(rng.unit(), rng.unit(), rng.unit());
                let (from, to) = if toward_puppet {
                    (on_heart, on_puppet)
                } else {
                    (on_puppet, on_heart)
                };
                Effect::Trail {
                    from,
                    to,
                    color,
                    duration: rng.between(10, 49) as u32,
                }
            })
            .collect()
    };

    let mut effects = world.resource_mut::<EffectBuffer>();
    for trail in trails {
        effects.push(trail);
    }
}

fn slow_cycle(world: &mut World, heart: &mut Heart, puppet: Option<Entity>, config: &CreakingConfig) {
    let (axis, current, embedded) = {
        let grid = world.resource::<BlockGrid>();
        let Material::Heart { axis, state } = grid.get(heart.pos) else {
            return;
        };
        (axis, state, grid.heart_is_embedded(heart.pos))
    };
    let (creaking_active, spawn_monsters) = {
        let env = world.resource::<Environment>();
        (env.is_creaking_active(), env.spawn_monsters)
    };

    let state = if !embedded && !heart.has_puppet() {
        HeartState::Uprooted
    } else if creaking_active {
        HeartState::Awake
    } else {
        HeartState::Dormant
    };
    if state != current {
        world
            .resource_mut::<BlockGrid>()
            .set(heart.pos, Material::Heart { axis, state });
        world
            .resource_mut::<EffectBuffer>()
            .push(Effect::BlockChanged { pos: heart.pos });
        debug!(pos = %heart.pos, ?state, "heart state changed");
        if state == HeartState::Uprooted {
            return;
        }
    }

    if !heart.has_puppet() {
        if state == HeartState::Awake
            && spawn_monsters
            && world
                .resource::<ViewerGrid>()
                .any_within(heart.pos.corner(), config.spawn_player_radius)
        {
            spawn_puppet(world, heart, config);
        }
        return;
    }

    let Some(puppet) = puppet else {
        return;
    };
    let persistent = world.get::<Persistent>(puppet).is_some();
    let distance = distance_to_heart(world, heart.pos, puppet).unwrap_or(0.0);
    let out_of_season = !creaking_active && !persistent;
    let strayed = distance > config.despawn_distance;
    let stuck = is_stuck_with_player(world, puppet);
    if out_of_season || strayed || stuck {
        debug!(pos = %heart.pos, out_of_season, strayed, stuck, "dismissing puppet");
        kill_bound_puppet(world, heart, Some(puppet), None);
    }
}

/// Search a standing spot for a puppet around `origin`.
///
/// Each attempt picks a random column and scans it top-down for the first
/// passable cell over a sturdy floor; the attempt succeeds if the puppet's
/// full height fits there.
pub fn find_spawn_spot<R: Rng + ?Sized>(
    grid: &BlockGrid,
    origin: BlockPos,
    rng: &mut R,
    config: &CreakingConfig,
) -> Option<BlockPos> {
    let h = config.spawn_horizontal_range.max(0);
    let v = config.spawn_vertical_range.max(0);
    let clearance = Body::PUPPET.height.ceil() as i32;

    for _ in 0..config.spawn_attempts {
        let dx = rng.gen_range(-h..=h);
        let dz = rng.gen_range(-h..=h);
        let landing = (-v..=v)
            .rev()
            .map(|dy| BlockPos::new(origin.x + dx, origin.y + dy, origin.z + dz))
            .find(|cell| grid.get(cell.up(-1)).is_sturdy_floor() && grid.get(*cell).is_passable());
        if let Some(cell) = landing {
            if (0..clearance).all(|i| grid.get(cell.up(i)).is_passable()) {
                return Some(cell);
            }
        }
    }
    None
}

fn spawn_puppet(world: &mut World, heart: &mut Heart, config: &CreakingConfig) -> Option<Entity> {
    let spot = world.resource_scope(|world, mut rng: Mut<SimRng>| {
        find_spawn_spot(world.resource::<BlockGrid>(), heart.pos, &mut rng.0, config)
    });
    let Some(spot) = spot else {
        trace!(pos = %heart.pos, "no room to summon a puppet");
        return None;
    };

    let id = world.resource_mut::<SimRng>().uuid();
    let position = Position::from_vec3(spot.bottom_center());
    let entity = world
        .spawn(PuppetBundle::new(id, position, config.puppet_max_health))
        .id();
    world.resource_mut::<EntityIndex>().insert(id, entity);
    {
        let mut effects = world.resource_mut::<EffectBuffer>();
        effects.game_event(GameEventKind::EntityPlace, position.as_vec3());
        effects.push(Effect::EntityStatus {
            entity,
            status: EntityStatus::DeathParticles,
        });
    }
    init_home(world, entity, heart.pos);

    heart.puppet = Some(WeakRef::resolved(entity, id).with_grace(config.reference_grace_ticks));
    world
        .resource_mut::<EffectBuffer>()
        .sound(SoundKind::HeartSpawn, heart.pos.center());
    debug!(pos = %heart.pos, %id, at = %spot, "heart summoned puppet");
    Some(entity)
}

fn kill_bound_puppet(
    world: &mut World,
    heart: &mut Heart,
    puppet: Option<Entity>,
    cause: Option<&Damage>,
) -> bool {
    let Some(puppet) = puppet else {
        return false;
    };
    match cause {
        None => {
            finish_crumbling(world, puppet);
        }
        Some(cause) => kill_from_heart(world, puppet, cause),
    }
    heart.puppet = None;
    true
}

/// Forcibly end the heart's puppet. Without a cause the puppet crumbles away
/// at once; with one it dies and plays the crumbling sequence. Returns whether
/// a live puppet was bound.
pub fn kill_puppet(world: &mut World, heart_entity: Entity, cause: Option<&Damage>) -> bool {
    with_heart(world, heart_entity, |world, heart| {
        let puppet = resolve_puppet(world, heart);
        kill_bound_puppet(world, heart, puppet, cause)
    })
    .unwrap_or(false)
}

/// Called by the bound puppet when it absorbs a hit.
pub fn on_puppet_damage(world: &mut World, heart_entity: Entity) {
    let config = world.resource::<CreakingConfig>().clone();
    with_heart(world, heart_entity, |world, heart| {
        let Some(puppet) = resolve_puppet(world, heart) else {
            return;
        };
        if heart.trail_timer > 0 {
            return;
        }

        emit_trails(world, heart.pos, Some(puppet), 20, false);

        if world.resource::<BlockGrid>().get(heart.pos).heart_state() == Some(HeartState::Awake) {
            let limits = SearchLimits {
                max_depth: config.regrowth_max_depth,
                max_visits: config.regrowth_max_visits,
            };
            let origin = heart.pos;
            let placed: Vec<BlockPos> = world.resource_scope(|world, mut rng: Mut<SimRng>| {
                let attempts = rng.between(
                    config.regrowth_min_placements as i32,
                    config.regrowth_max_placements as i32,
                );
                let mut grid = world.resource_mut::<BlockGrid>();
                (0..attempts)
                    .filter_map(|_| grow_resin(&mut grid, origin, limits, &mut rng.0))
                    .collect()
            });
            let mut effects = world.resource_mut::<EffectBuffer>();
            for pos in placed {
                effects.sound(SoundKind::ResinPlace, pos.center());
                effects.game_event(GameEventKind::BlockPlace, pos.center());
            }
        }

        heart.trail_timer = config.trail_duration;
        heart.last_puppet_pos = puppet_center(world, puppet);
        trace!(pos = %heart.pos, "heart hurt trail started");
    });
}

/// Whether the heart at `heart_entity` binds the puppet with `id`.
pub fn is_puppet(world: &World, heart_entity: Entity, id: uuid::Uuid) -> bool {
    world.get::<Heart>(heart_entity).is_some_and(|h| h.binds(id))
}
