//! Fire-and-forget side effects (sounds, particles, game events).
//!
//! The simulation never plays anything itself; it records what happened in the
//! `EffectBuffer` and a presentation layer drains it after each step.

use crate::blocks::BlockPos;
use bevy_ecs::prelude::*;
use glam::Vec3;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SoundKind {
    HeartSpawn,
    HeartHurt,
    ResinPlace,
    PuppetActivate,
    PuppetDeactivate,
    PuppetFreeze,
    PuppetUnfreeze,
    PuppetAttack,
    PuppetSway,
    PuppetTwitch,
    PuppetDeath,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ParticleKind {
    /// Wood crumble at the end of the crumbling sequence.
    CrumbleWood,
    /// Heart-colored crumble at the end of the crumbling sequence.
    CrumbleHeart,
    /// Generic death poof.
    Poof,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GameEventKind {
    EntityAction,
    EntityPlace,
    BlockPlace,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntityStatus {
    InvulnerableHit,
    AttackSwing,
    DeathParticles,
}

/// Trail color heading toward the puppet.
pub const TRAIL_TOWARD_PUPPET: u32 = 0xFC7812;
/// Trail color heading toward the heart.
pub const TRAIL_TOWARD_HEART: u32 = 0x5F5F5F;

#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    Sound {
        kind: SoundKind,
        at: Vec3,
        volume: f32,
    },
    Particles {
        kind: ParticleKind,
        at: Vec3,
        count: u32,
        spread: Vec3,
    },
    Trail {
        from: Vec3,
        to: Vec3,
        color: u32,
        duration: u32,
    },
    GameEvent {
        kind: GameEventKind,
        at: Vec3,
    },
    EntityStatus {
        entity: Entity,
        status: EntityStatus,
    },
    ComparatorChanged {
        pos: BlockPos,
        signal: u8,
    },
    BlockChanged {
        pos: BlockPos,
    },
}

/// Effects recorded since the last drain. Nothing is dropped or trimmed
/// here; the host owns draining it.
#[derive(Resource, Debug, Default)]
pub struct EffectBuffer {
    effects: Vec<Effect>,
}

impl EffectBuffer {
    pub fn push(&mut self, effect: Effect) {
        self.effects.push(effect);
    }

    pub fn sound(&mut self, kind: SoundKind, at: Vec3) {
        self.sound_with_volume(kind, at, 1.0);
    }

    pub fn sound_with_volume(&mut self, kind: SoundKind, at: Vec3, volume: f32) {
        self.push(Effect::Sound { kind, at, volume });
    }

    pub fn game_event(&mut self, kind: GameEventKind, at: Vec3) {
        self.push(Effect::GameEvent { kind, at });
    }

    pub fn drain(&mut self) -> Vec<Effect> {
        self.effects.drain(..).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Effect> {
        self.effects.iter()
    }

    pub fn len(&self) -> usize {
        self.effects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.effects.is_empty()
    }

    pub fn clear(&mut self) {
        self.effects.clear();
    }

    /// Number of buffered sounds of one kind.
    pub fn count_sounds(&self, kind: SoundKind) -> usize {
        self.effects
            .iter()
            .filter(|e| matches!(e, Effect::Sound { kind: k, .. } if *k == kind))
            .count()
    }

    /// Number of buffered trail particles.
    pub fn count_trails(&self) -> usize {
        self.effects
            .iter()
            .filter(|e| matches!(e, Effect::Trail { .. }))
            .count()
    }
}
