//! Movement - the puppet's chase behavior and velocity integration.
//!
//! A rooted puppet is skipped by every system here, so its position and
//! velocity stay exactly as they were in the previous tick.

use crate::components::*;
use crate::config::CreakingConfig;
use bevy_ecs::prelude::*;
use glam::Vec3;

/// Stand-in for the behavior scheduler: an unrooted puppet walks straight at
/// its remembered target and stops once it is in reach.
pub fn pursuit_system(
    config: Res<CreakingConfig>,
    targets: Query<&Position, Without<Puppet>>,
    mut puppets: Query<(&Puppet, &Health, &Position, &mut Velocity, &mut Brain)>,
) {
    for (puppet, health, pos, mut vel, mut brain) in puppets.iter_mut() {
        if puppet.rooted || !health.is_alive() {
            continue;
        }

        let goal = brain
            .attack_target()
            .and_then(|target| targets.get(target).ok())
            .map(Position::as_vec3);
        brain.walk_target = goal;

        let Some(goal) = goal else {
            *vel = Velocity::default();
            continue;
        };
        let offset = Vec3::new(goal.x - pos.x, 0.0, goal.z - pos.z);
        if offset.length() <= config.attack_reach {
            *vel = Velocity::default();
        } else {
            *vel = Velocity::from_vec3(offset.normalize() * config.chase_speed);
        }
    }
}

/// Applies velocity to position.
pub fn movement_system(
    mut query: Query<(&mut Position, &Velocity, Option<&Puppet>, Option<&Health>)>,
) {
    for (mut pos, vel, puppet, health) in query.iter_mut() {
        if puppet.is_some_and(|p| p.rooted) || health.is_some_and(|h| !h.is_alive()) {
            continue;
        }
        let step = vel.as_vec3();
        if step == Vec3::ZERO {
            continue;
        }
        *pos = Position::from_vec3(pos.as_vec3() + step);
    }
}

/// Push an entity. Rooted puppets ignore knockback entirely.
pub fn apply_impulse(world: &mut World, entity: Entity, impulse: Vec3) -> bool {
    if world.get::<Puppet>(entity).is_some_and(|p| p.rooted) {
        return false;
    }
    let Some(mut vel) = world.get_mut::<Velocity>(entity) else {
        return false;
    };
    *vel = Velocity::from_vec3(vel.as_vec3() + impulse);
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn chase_world() -> (World, Entity) {
        let mut world = World::new();
        world.insert_resource(CreakingConfig::default());
        let player = world
            .spawn(PlayerBundle::new(Uuid::from_u128(1), Position::new(10.0, 0.0, 0.0), Vec3::X))
            .id();
        let mut bundle = PuppetBundle::new(Uuid::from_u128(2), Position::new(0.0, 0.0, 0.0), 1.0);
        bundle.brain.remember_attack_target(player);
        let puppet = world.spawn(bundle).id();
        (world, puppet)
    }

    fn schedule() -> Schedule {
        let mut schedule = Schedule::default();
        schedule.add_systems((pursuit_system, movement_system).chain());
        schedule
    }

    #[test]
    fn test_unrooted_puppet_closes_in() {
        let (mut world, puppet) = chase_world();
        schedule().run(&mut world);
        let pos = world.get::<Position>(puppet).unwrap();
        assert!((pos.x - 0.13).abs() < 1e-5);
        assert_eq!(pos.z, 0.0);
    }

    #[test]
    fn test_rooted_puppet_holds_position_and_velocity() {
        let (mut world, puppet) = chase_world();
        let mut schedule = schedule();
        schedule.run(&mut world);

        let before_pos = *world.get::<Position>(puppet).unwrap();
        let before_vel = *world.get::<Velocity>(puppet).unwrap();
        world.get_mut::<Puppet>(puppet).unwrap().rooted = true;
        for _ in 0..10 {
            schedule.run(&mut world);
        }
        assert_eq!(*world.get::<Position>(puppet).unwrap(), before_pos);
        assert_eq!(*world.get::<Velocity>(puppet).unwrap(), before_vel);
    }

    #[test]
    fn test_rooted_puppet_ignores_impulse() {
        let (mut world, puppet) = chase_world();
        world.get_mut::<Puppet>(puppet).unwrap().rooted = true;
        assert!(!apply_impulse(&mut world, puppet, Vec3::X));
        assert_eq!(*world.get::<Velocity>(puppet).unwrap(), Velocity::default());

        world.get_mut::<Puppet>(puppet).unwrap().rooted = false;
        assert!(apply_impulse(&mut world, puppet, Vec3::X));
        assert_eq!(world.get::<Velocity>(puppet).unwrap().x, 1.0);
    }
}
