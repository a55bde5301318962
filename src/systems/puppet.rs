//! Puppet state machine: rooting, activation, damage intake and death.
//!
//! A puppet is frozen ("rooted") in any tick where a qualifying viewer is
//! looking at it. Its first noticed gaze activates it, which makes the viewer
//! its attack target. Damage never hurts a bound puppet directly; it is
//! forwarded to the heart instead. Death comes either from the heart
//! (crumbling) or the generic countdown.

use crate::blocks::{BlockGrid, BlockPos};
use crate::components::*;
use crate::config::CreakingConfig;
use crate::effects::{Effect, EffectBuffer, EntityStatus, GameEventKind, ParticleKind, SoundKind};
use crate::gaze::{is_gazing, sample_heights, GazeCheck};
use crate::index::{BlockEntities, EntityIndex};
use crate::random::SimRng;
use crate::spatial::ViewerGrid;
use super::combat::{apply_generic_damage, Damage};
use bevy_ecs::prelude::*;
use glam::Vec3;
use tracing::debug;

/// What the rooting decision needs to know about one sensed viewer.
#[derive(Debug, Clone, Copy)]
pub struct ViewerView {
    pub entity: Entity,
    pub pos: Vec3,
    pub eye: Vec3,
    pub look: Vec3,
    pub targetable: bool,
    pub disguised: bool,
    pub team: Option<Team>,
}

impl ViewerView {
    fn qualifies_against(&self, own_team: Option<Team>) -> bool {
        self.targetable && !(own_team.is_some() && self.team == own_team)
    }
}

fn activate(
    puppet: &mut Puppet,
    brain: &mut impl TargetMemory,
    viewer: Entity,
    effects: &mut EffectBuffer,
    at: Vec3,
) {
    brain.remember_attack_target(viewer);
    effects.game_event(GameEventKind::EntityAction, at);
    effects.sound(SoundKind::PuppetActivate, at);
    puppet.active = true;
    debug!(?viewer, "puppet activated");
}

fn deactivate(puppet: &mut Puppet, brain: &mut impl TargetMemory, effects: &mut EffectBuffer, at: Vec3) {
    brain.forget_attack_target();
    effects.game_event(GameEventKind::EntityAction, at);
    effects.sound(SoundKind::PuppetDeactivate, at);
    puppet.active = false;
    debug!("puppet deactivated");
}

/// Decide whether the puppet may move this tick, activating or deactivating
/// it along the way. `viewers` must be sorted nearest first.
#[allow(clippy::too_many_arguments)]
pub fn should_be_unrooted(
    puppet: &mut Puppet,
    brain: &mut impl TargetMemory,
    viewers: &[ViewerView],
    own_team: Option<Team>,
    puppet_pos: Vec3,
    activation_distance_sq: f32,
    mut gazing: impl FnMut(&ViewerView) -> bool,
    effects: &mut EffectBuffer,
) -> bool {
    let was_active = puppet.active;
    if viewers.is_empty() {
        if was_active {
            deactivate(puppet, brain, effects, puppet_pos);
        }
        return true;
    }

    let mut any_qualifying = false;
    for viewer in viewers {
        if !viewer.qualifies_against(own_team) {
            continue;
        }
        any_qualifying = true;
        if (!was_active || !viewer.disguised) && gazing(viewer) {
            if was_active {
                return false;
            }
            if viewer.pos.distance_squared(puppet_pos) < activation_distance_sq {
                activate(puppet, brain, viewer.entity, effects, puppet_pos);
                return false;
            }
        }
    }

    if !any_qualifying && was_active {
        deactivate(puppet, brain, effects, puppet_pos);
    }
    true
}

/// Per-tick puppet upkeep: countdowns, viewer sensing, rooting and the
/// viewer-contact counter.
#[allow(clippy::type_complexity)]
pub fn puppet_rooting_system(
    config: Res<CreakingConfig>,
    grid: Res<ViewerGrid>,
    blocks: Res<BlockGrid>,
    mut effects: ResMut<EffectBuffer>,
    viewers: Query<(&Position, &Body, &Player, Option<&Team>), Without<Puppet>>,
    mut puppets: Query<(
        &mut Puppet,
        &Position,
        &Body,
        &Health,
        &mut Brain,
        &mut SensedViewers,
        Option<&Team>,
    )>,
) {
    let check = GazeCheck::new(config.gaze_tolerance);

    for (mut puppet, pos, body, health, mut brain, mut sensed, team) in puppets.iter_mut() {
        puppet.invuln_window = puppet.invuln_window.saturating_sub(1);
        puppet.attack_window = puppet.attack_window.saturating_sub(1);
        if !health.is_alive() {
            continue;
        }

        let at = pos.as_vec3();
        sensed.0 = grid
            .query_radius(at, config.sense_range)
            .into_iter()
            .map(|entry| entry.entity)
            .collect();
        let views: Vec<ViewerView> = sensed
            .0
            .iter()
            .filter_map(|&entity| {
                let (vpos, vbody, player, vteam) = viewers.get(entity).ok()?;
                Some(ViewerView {
                    entity,
                    pos: vpos.as_vec3(),
                    eye: vbody.eye(vpos),
                    look: player.look,
                    targetable: player.can_be_targeted(),
                    disguised: player.gaze_disguise,
                    team: vteam.copied(),
                })
            })
            .collect();

        let heights = sample_heights(pos.y, body.eye(pos).y);
        let unrooted = should_be_unrooted(
            &mut puppet,
            &mut *brain,
            &views,
            team.copied(),
            at,
            config.activation_distance_sq,
            |v| is_gazing(&blocks, v.eye, v.look, at, &heights, check),
            &mut effects,
        );

        let rooted = !unrooted;
        if rooted != puppet.rooted {
            effects.game_event(GameEventKind::EntityAction, at);
            if rooted {
                brain.stop_navigation();
                effects.sound(SoundKind::PuppetFreeze, at);
            } else {
                effects.sound(SoundKind::PuppetUnfreeze, at);
            }
            puppet.rooted = rooted;
        }

        let aabb = body.aabb(pos);
        if views.iter().any(|v| aabb.contains(v.eye)) {
            puppet.viewer_contact_ticks += 1;
        } else {
            puppet.viewer_contact_ticks = 0;
        }
    }
}

/// Kills a living puppet whose home is no longer a heart that binds it.
/// A heart block whose block entity is not loaded yet is left alone.
pub fn puppet_home_check_system(
    blocks: Res<BlockGrid>,
    block_entities: Res<BlockEntities>,
    hearts: Query<&Heart>,
    mut puppets: Query<(&EntityUuid, &Puppet, &mut Health)>,
) {
    for (id, puppet, mut health) in puppets.iter_mut() {
        let Some(home) = puppet.home else {
            continue;
        };
        if !health.is_alive() || puppet.crumbling {
            continue;
        }

        let orphaned = if blocks.get(home).heart_state().is_none() {
            true
        } else {
            match block_entities.get(home).and_then(|e| hearts.get(e).ok()) {
                Some(heart) => !heart.binds(id.0),
                None => false,
            }
        };

        if orphaned {
            debug!(id = %id.0, %home, "puppet lost its heart");
            health.kill();
        }
    }
}

/// Advances dying puppets through either the crumbling or generic sequence.
pub fn puppet_death_system(world: &mut World) {
    let config = world.resource::<CreakingConfig>().clone();
    let mut query = world.query::<(Entity, &Puppet, &Health)>();
    let dying: Vec<Entity> = query
        .iter(world)
        .filter(|(_, _, health)| !health.is_alive())
        .map(|(entity, _, _)| entity)
        .collect();

    for entity in dying {
        advance_death(world, entity, &config);
    }
}

fn advance_death(world: &mut World, entity: Entity, config: &CreakingConfig) {
    let (ticks, crumbling, glowing, next_flicker) = {
        let Some(mut puppet) = world.get_mut::<Puppet>(entity) else {
            return;
        };
        puppet.death_ticks += 1;
        (
            puppet.death_ticks,
            puppet.crumbling && puppet.is_transient(),
            puppet.glowing_eyes,
            puppet.next_eye_flicker,
        )
    };

    if !crumbling {
        if ticks >= config.generic_death_ticks {
            if let Some(at) = body_center(world, entity) {
                world.resource_mut::<EffectBuffer>().push(Effect::Particles {
                    kind: ParticleKind::Poof,
                    at,
                    count: 20,
                    spread: Vec3::splat(0.5),
                });
            }
            despawn_puppet(world, entity);
        }
        return;
    }

    if ticks > next_flicker {
        let (lo, hi) = if glowing { (2, 8) } else { (ticks / 4, ticks / 2) };
        let delay = world.resource_mut::<SimRng>().between(lo as i32, hi as i32).max(0) as u32;
        if let Some(mut puppet) = world.get_mut::<Puppet>(entity) {
            puppet.next_eye_flicker = ticks + delay;
            puppet.glowing_eyes = !glowing;
        }
    }

    if ticks > config.crumble_ticks {
        finish_crumbling(world, entity);
    }
}

fn body_center(world: &World, entity: Entity) -> Option<Vec3> {
    let pos = world.get::<Position>(entity)?;
    let body = world.get::<Body>(entity)?;
    Some(body.aabb(pos).center())
}

fn despawn_puppet(world: &mut World, entity: Entity) {
    if let Some(id) = world.get::<EntityUuid>(entity).copied() {
        world.resource_mut::<EntityIndex>().remove(id.0);
    }
    world.despawn(entity);
}

/// End the crumbling sequence: decay particles, one death sound, removal.
/// Returns false (and does nothing) if the puppet is already gone.
pub fn finish_crumbling(world: &mut World, entity: Entity) -> bool {
    if world.get::<Puppet>(entity).is_none() {
        return false;
    }
    let (Some(pos), Some(body)) = (
        world.get::<Position>(entity).copied(),
        world.get::<Body>(entity).copied(),
    ) else {
        return false;
    };

    let aabb = body.aabb(&pos);
    let spread = aabb.size() * 0.3;
    let mut effects = world.resource_mut::<EffectBuffer>();
    effects.push(Effect::Particles {
        kind: ParticleKind::CrumbleWood,
        at: aabb.center(),
        count: 100,
        spread,
    });
    effects.push(Effect::Particles {
        kind: ParticleKind::CrumbleHeart,
        at: aabb.center(),
        count: 10,
        spread,
    });
    effects.sound(SoundKind::PuppetDeath, pos.as_vec3());

    despawn_puppet(world, entity);
    debug!(?entity, "puppet crumbled");
    true
}

/// Heart-issued lethal strike: start the crumbling sequence.
pub fn kill_from_heart(world: &mut World, entity: Entity, cause: &Damage) {
    let Some(pos) = world.get::<Position>(entity).copied() else {
        return;
    };
    if let (Some(attacker), Some(mut brain)) = (cause.attacker, world.get_mut::<Brain>(entity)) {
        brain.remember_attack_target(attacker);
    }
    world
        .resource_mut::<EffectBuffer>()
        .sound(SoundKind::PuppetTwitch, pos.as_vec3());
    if let Some(mut puppet) = world.get_mut::<Puppet>(entity) {
        puppet.crumbling = true;
    }
    if let Some(mut health) = world.get_mut::<Health>(entity) {
        health.kill();
    }
}

/// Bind a freshly spawned puppet to its heart.
pub fn init_home(world: &mut World, entity: Entity, home: BlockPos) {
    if let Some(mut puppet) = world.get_mut::<Puppet>(entity) {
        puppet.init_home(home);
    }
}

/// Whether a viewer's eyes have been inside the puppet for too long.
pub fn is_stuck_with_player(world: &World, entity: Entity) -> bool {
    let limit = world.resource::<CreakingConfig>().stuck_contact_ticks;
    world
        .get::<Puppet>(entity)
        .is_some_and(|p| p.viewer_contact_ticks > limit)
}

/// Heart entity at `home` that currently binds the puppet with `id`.
fn binding_heart(world: &World, home: BlockPos, id: uuid::Uuid) -> Option<Entity> {
    let heart_entity = world.resource::<BlockEntities>().get(home)?;
    world.get::<Heart>(heart_entity)?.binds(id).then_some(heart_entity)
}

/// Damage intake for puppets. Returns whether the hit was accepted.
pub fn hurt_puppet(world: &mut World, entity: Entity, damage: &Damage) -> bool {
    let (Some(puppet), Some(health), Some(pos), Some(id)) = (
        world.get::<Puppet>(entity).cloned(),
        world.get::<Health>(entity).copied(),
        world.get::<Position>(entity).copied(),
        world.get::<EntityUuid>(entity).copied(),
    ) else {
        return false;
    };

    let home = match puppet.home {
        Some(home) if !damage.kind.bypasses_invulnerability() => home,
        _ => return apply_generic_damage(world, entity, damage.amount),
    };
    if puppet.invuln_window > 0 || !health.is_alive() {
        return false;
    }

    if let (Some(attacker), Some(mut brain)) = (damage.attacker, world.get_mut::<Brain>(entity)) {
        brain.remember_attack_target(attacker);
    }
    if damage.attacker.is_none() && !damage.projectile {
        return false;
    }

    let invuln = world.resource::<CreakingConfig>().invulnerability_ticks;
    if let Some(mut puppet) = world.get_mut::<Puppet>(entity) {
        puppet.invuln_window = invuln;
    }
    let at = pos.as_vec3();
    {
        let mut effects = world.resource_mut::<EffectBuffer>();
        effects.push(Effect::EntityStatus {
            entity,
            status: EntityStatus::InvulnerableHit,
        });
        effects.game_event(GameEventKind::EntityAction, at);
    }

    if let Some(heart_entity) = binding_heart(world, home, id.0) {
        super::heart::on_puppet_damage(world, heart_entity);
        world.resource_mut::<EffectBuffer>().sound(SoundKind::PuppetSway, at);
    }
    true
}
