//! Damage plumbing and the puppet's melee strike.

use crate::components::*;
use crate::config::CreakingConfig;
use crate::effects::{Effect, EffectBuffer, EntityStatus, SoundKind};
use bevy_ecs::prelude::*;
use tracing::trace;

/// Kind of incoming damage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DamageKind {
    #[default]
    Generic,
    /// Falling out of the world.
    OutOfWorld,
    /// Administrative kill.
    Kill,
}

impl DamageKind {
    /// Damage that ignores every invulnerability rule.
    pub fn bypasses_invulnerability(self) -> bool {
        matches!(self, DamageKind::OutOfWorld | DamageKind::Kill)
    }
}

/// A single damage event.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Damage {
    pub amount: f32,
    pub kind: DamageKind,
    /// Living entity responsible for the hit.
    pub attacker: Option<Entity>,
    /// Delivered by a projectile.
    pub projectile: bool,
}

impl Damage {
    /// Damage with no source at all (e.g. a cactus).
    pub fn environmental(amount: f32) -> Self {
        Self {
            amount,
            kind: DamageKind::Generic,
            attacker: None,
            projectile: false,
        }
    }

    pub fn melee(attacker: Entity, amount: f32) -> Self {
        Self {
            attacker: Some(attacker),
            ..Self::environmental(amount)
        }
    }

    pub fn projectile(shooter: Option<Entity>, amount: f32) -> Self {
        Self {
            attacker: shooter,
            projectile: true,
            ..Self::environmental(amount)
        }
    }

    pub fn out_of_world(amount: f32) -> Self {
        Self {
            kind: DamageKind::OutOfWorld,
            ..Self::environmental(amount)
        }
    }

    pub fn kill() -> Self {
        Self {
            kind: DamageKind::Kill,
            ..Self::environmental(f32::MAX)
        }
    }
}

/// Route a damage event to its target. Returns whether the hit landed.
pub fn damage_entity(world: &mut World, target: Entity, damage: &Damage) -> bool {
    if world.get::<Puppet>(target).is_some() {
        return super::puppet::hurt_puppet(world, target, damage);
    }
    apply_generic_damage(world, target, damage.amount)
}

/// The generic pipeline: living targets lose HP, dead ones ignore the hit.
pub fn apply_generic_damage(world: &mut World, target: Entity, amount: f32) -> bool {
    let Some(mut health) = world.get_mut::<Health>(target) else {
        return false;
    };
    if !health.is_alive() {
        return false;
    }
    health.damage(amount);
    true
}

/// Unrooted puppets swing at their remembered target once it is in reach.
pub fn strike_system(
    config: Res<CreakingConfig>,
    mut effects: ResMut<EffectBuffer>,
    mut puppets: Query<(Entity, &mut Puppet, &Position, &Health, &Brain)>,
    mut targets: Query<(&Position, &mut Health), Without<Puppet>>,
) {
    for (entity, mut puppet, pos, health, brain) in puppets.iter_mut() {
        if puppet.rooted || !puppet.active || !health.is_alive() || puppet.attack_window > 0 {
            continue;
        }
        let Some(target) = brain.attack_target() else {
            continue;
        };
        let Ok((target_pos, mut target_health)) = targets.get_mut(target) else {
            continue;
        };
        if !target_health.is_alive() || pos.distance_to(target_pos) > config.attack_reach {
            continue;
        }

        puppet.attack_window = config.attack_animation_ticks;
        target_health.damage(config.attack_damage);
        effects.push(Effect::EntityStatus {
            entity,
            status: EntityStatus::AttackSwing,
        });
        effects.sound(SoundKind::PuppetAttack, pos.as_vec3());
        trace!(?entity, ?target, "puppet strike");
    }
}
