//! End-to-end heart / puppet scenarios driven through `SimWorld`.

use bevy_ecs::prelude::*;
use creaking_sim::*;
use glam::Vec3;

const HEART: BlockPos = BlockPos::new(0, 1, 0);

/// A heart embedded in a two-log column on a stone floor, at night.
fn grove() -> SimWorld {
    let mut sim = SimWorld::with_config(SimConfig::default().with_seed(7));
    sim.fill_blocks(BlockPos::new(-24, -1, -24), BlockPos::new(24, -1, 24), Material::Solid);
    sim.set_block(BlockPos::new(0, 0, 0), Material::Log { axis: Axis::Y });
    sim.set_block(BlockPos::new(0, 2, 0), Material::Log { axis: Axis::Y });
    sim.place_heart(HEART, Axis::Y).unwrap();
    sim.set_day_time(13_000);
    sim
}

/// Stand a player near the heart, looking at the sky, until it summons.
fn summon(sim: &mut SimWorld) -> (Entity, Entity) {
    let player = sim.spawn_player(Vec3::new(0.5, 0.0, 20.5), Vec3::Y);
    for _ in 0..30 {
        sim.tick();
        if let Some(puppet) = sim.bound_puppet(HEART) {
            return (player, puppet);
        }
    }
    panic!("heart never summoned a puppet");
}

fn send_away(sim: &mut SimWorld, player: Entity) {
    sim.move_player(player, Vec3::new(0.5, 0.0, 80.5));
}

fn place(sim: &mut SimWorld, entity: Entity, pos: Vec3) {
    *sim.world_mut().get_mut::<Position>(entity).unwrap() = Position::from_vec3(pos);
}

fn puppet_id(sim: &SimWorld, puppet: Entity) -> uuid::Uuid {
    sim.world().get::<EntityUuid>(puppet).unwrap().0
}

fn tick_until_unbound(sim: &mut SimWorld) {
    for _ in 0..30 {
        sim.tick();
        if !sim.heart(HEART).unwrap().has_puppet() {
            return;
        }
    }
    panic!("heart kept its puppet");
}

#[test]
fn awake_heart_summons_once_for_a_nearby_player() {
    let mut sim = grove();
    sim.drain_effects();
    let (_, puppet) = summon(&mut sim);

    let id = puppet_id(&sim, puppet);
    assert!(sim.heart(HEART).unwrap().binds(id));
    assert_eq!(sim.puppet(puppet).unwrap().home, Some(HEART));
    assert_eq!(sim.effects().count_sounds(SoundKind::HeartSpawn), 1);
    assert_eq!(sim.puppet_count(), 1);
    assert_eq!(sim.block(HEART).heart_state(), Some(HeartState::Awake));
}

#[test]
fn uprooted_heart_never_summons() {
    let mut sim = grove();
    sim.set_block(BlockPos::new(0, 2, 0), Material::Air);
    sim.spawn_player(Vec3::new(0.5, 0.0, 10.5), Vec3::Y);
    sim.run_ticks(60);

    assert!(sim.bound_puppet(HEART).is_none());
    assert_eq!(sim.puppet_count(), 0);
    assert_eq!(sim.block(HEART).heart_state(), Some(HeartState::Uprooted));
}

#[test]
fn strayed_puppet_is_dismissed_in_one_cycle() {
    let mut sim = grove();
    let (player, puppet) = summon(&mut sim);
    send_away(&mut sim, player);
    place(&mut sim, puppet, Vec3::new(40.5, 0.0, 0.5));
    sim.drain_effects();

    tick_until_unbound(&mut sim);
    assert!(sim.puppet(puppet).is_none());
    assert_eq!(sim.puppet_count(), 0);
    assert_eq!(sim.effects().count_sounds(SoundKind::PuppetDeath), 1);
}

#[test]
fn dawn_dismisses_the_puppet() {
    let mut sim = grove();
    let (player, puppet) = summon(&mut sim);
    send_away(&mut sim, player);
    sim.set_day_time(1_000);

    tick_until_unbound(&mut sim);
    assert!(sim.puppet(puppet).is_none());
    assert_eq!(sim.block(HEART).heart_state(), Some(HeartState::Dormant));
}

#[test]
fn two_gazing_viewers_activate_the_puppet_once() {
    let mut sim = grove();
    let (player, puppet) = summon(&mut sim);
    send_away(&mut sim, player);

    let spot = Vec3::new(8.5, 0.0, -8.5);
    let eyes = spot + Vec3::Y * Body::PUPPET.eye_height;
    place(&mut sim, puppet, spot);
    let a = sim.spawn_player(Vec3::new(8.5, 0.0, -4.5), Vec3::Z);
    let b = sim.spawn_player(Vec3::new(8.5, 0.0, -12.5), Vec3::Z);
    sim.look_at(a, eyes);
    sim.look_at(b, eyes);
    sim.drain_effects();

    sim.tick();
    assert_eq!(sim.effects().count_sounds(SoundKind::PuppetActivate), 1);
    assert_eq!(sim.effects().count_sounds(SoundKind::PuppetFreeze), 1);
    let state = sim.puppet(puppet).unwrap();
    assert!(state.active);
    assert!(state.rooted);
    let target = sim.world().get::<Brain>(puppet).unwrap().attack_target;
    assert!(target == Some(a) || target == Some(b));
}

#[test]
fn rooted_puppet_does_not_move_until_released() {
    let mut sim = grove();
    let (player, puppet) = summon(&mut sim);
    send_away(&mut sim, player);

    let spot = Vec3::new(8.5, 0.0, -8.5);
    place(&mut sim, puppet, spot);
    let watcher = sim.spawn_player(Vec3::new(8.5, 0.0, -4.5), Vec3::Z);
    sim.look_at(watcher, spot + Vec3::Y * Body::PUPPET.eye_height);
    sim.tick();
    assert!(sim.puppet(puppet).unwrap().rooted);

    for _ in 0..10 {
        let before = sim.position(puppet).unwrap();
        let velocity = *sim.world().get::<Velocity>(puppet).unwrap();
        assert!(!sim.apply_impulse(puppet, Vec3::new(1.0, 0.0, 0.0)));
        sim.tick();
        assert_eq!(sim.position(puppet).unwrap(), before);
        assert_eq!(*sim.world().get::<Velocity>(puppet).unwrap(), velocity);
    }

    sim.set_player_look(watcher, Vec3::Y);
    sim.drain_effects();
    sim.tick();
    assert!(!sim.puppet(puppet).unwrap().rooted);
    assert_eq!(sim.effects().count_sounds(SoundKind::PuppetUnfreeze), 1);
    assert_ne!(sim.position(puppet).unwrap(), Position::from_vec3(spot));
}

#[test]
fn bound_puppet_absorbs_hits_and_hurts_its_heart() {
    let mut sim = grove();
    let (player, puppet) = summon(&mut sim);
    sim.drain_effects();

    assert!(sim.damage(puppet, &Damage::melee(player, 5.0)));
    assert_eq!(sim.health(puppet).unwrap().current, 1.0);
    assert_eq!(sim.puppet(puppet).unwrap().invuln_window, 8);
    assert_eq!(sim.heart(HEART).unwrap().trail_timer, 100);
    assert_eq!(sim.effects().count_trails(), 20);
    assert_eq!(sim.effects().count_sounds(SoundKind::PuppetSway), 1);

    // Inside the invulnerability window nothing happens.
    sim.drain_effects();
    assert!(!sim.damage(puppet, &Damage::melee(player, 5.0)));
    assert!(sim.effects().is_empty());
}

#[test]
fn bypassing_damage_ignores_invulnerability() {
    let mut sim = grove();
    let (player, puppet) = summon(&mut sim);
    assert!(sim.damage(puppet, &Damage::melee(player, 5.0)));
    assert!(sim.puppet(puppet).unwrap().invuln_window > 0);

    assert!(sim.damage(puppet, &Damage::out_of_world(0.25)));
    assert_eq!(sim.health(puppet).unwrap().current, 0.75);
}

#[test]
fn lethal_kill_crumbles_then_finishes_once() {
    let mut sim = grove();
    let (player, puppet) = summon(&mut sim);
    send_away(&mut sim, player);
    sim.drain_effects();

    assert!(sim.kill_puppet(HEART, Some(&Damage::melee(player, 1.0))).unwrap());
    assert!(!sim.heart(HEART).unwrap().has_puppet());
    assert!(sim.puppet(puppet).unwrap().crumbling);
    assert!(!sim.health(puppet).unwrap().is_alive());
    assert_eq!(sim.effects().count_sounds(SoundKind::PuppetTwitch), 1);

    sim.run_ticks(45);
    assert!(sim.puppet(puppet).is_some());
    sim.tick();
    assert!(sim.puppet(puppet).is_none());
    assert_eq!(sim.effects().count_sounds(SoundKind::PuppetDeath), 1);

    assert!(!finish_crumbling(sim.world_mut(), puppet));
    assert_eq!(sim.effects().count_sounds(SoundKind::PuppetDeath), 1);
}

#[test]
fn soft_kill_finishes_immediately() {
    let mut sim = grove();
    let (player, puppet) = summon(&mut sim);
    send_away(&mut sim, player);
    sim.drain_effects();

    assert!(sim.kill_puppet(HEART, None).unwrap());
    assert!(sim.puppet(puppet).is_none());
    assert_eq!(sim.effects().count_sounds(SoundKind::PuppetDeath), 1);
    assert!(!sim.kill_puppet(HEART, None).unwrap());
}

#[test]
fn removed_heart_releases_without_killing() {
    let mut sim = grove();
    let (player, puppet) = summon(&mut sim);
    send_away(&mut sim, player);

    sim.remove_heart(HEART).unwrap();
    assert!(sim.health(puppet).unwrap().is_alive());

    // The orphan notices on its own and dies the ordinary way.
    sim.tick();
    assert!(!sim.health(puppet).unwrap().is_alive());
    assert!(!sim.puppet(puppet).unwrap().crumbling);
    sim.run_ticks(25);
    assert!(sim.puppet(puppet).is_none());
}

#[test]
fn save_and_reload_keeps_the_binding() {
    let mut sim = grove();
    let (_, puppet) = summon(&mut sim);
    let id = puppet_id(&sim, puppet);
    let data = sim.save().unwrap();

    let mut loaded = SimWorld::from_save(&data, SimConfig::default().with_seed(7)).unwrap();
    assert_eq!(loaded.current_tick(), sim.current_tick());
    let restored = loaded.bound_puppet(HEART).unwrap();
    assert_eq!(puppet_id(&loaded, restored), id);
    assert_eq!(loaded.puppet(restored).unwrap().home, Some(HEART));

    loaded.tick();
    assert!(loaded.heart(HEART).unwrap().comparator > 0);
    assert!(loaded.health(restored).unwrap().is_alive());
}

#[test]
fn puppet_loaded_late_within_grace_is_picked_up() {
    let mut sim = grove();
    let (player, puppet) = summon(&mut sim);
    send_away(&mut sim, player);
    let id = puppet_id(&sim, puppet);

    let doc = sim.unload_puppet(id).unwrap();
    sim.run_ticks(29);
    assert!(sim.heart(HEART).unwrap().binds(id));
    assert_eq!(sim.heart(HEART).unwrap().comparator, 0);

    let restored = sim.load_puppet(&doc).unwrap();
    sim.tick();
    assert_eq!(sim.bound_puppet(HEART), Some(restored));
    assert!(sim.heart(HEART).unwrap().comparator > 0);
    assert!(sim.health(restored).unwrap().is_alive());
}

#[test]
fn forgotten_binding_is_persisted_and_the_orphan_dies() {
    let mut sim = grove();
    let (player, puppet) = summon(&mut sim);
    send_away(&mut sim, player);
    let id = puppet_id(&sim, puppet);

    let doc = sim.unload_puppet(id).unwrap();
    sim.run_ticks(30);
    assert!(!sim.heart(HEART).unwrap().has_puppet());

    let heart_doc = sim.unload_heart(HEART).unwrap();
    assert_eq!(heart_doc.creaking, None);
    assert!(!serde_json::to_string(&heart_doc).unwrap().contains("creaking"));
    sim.load_heart(&heart_doc).unwrap();

    let orphan = sim.load_puppet(&doc).unwrap();
    sim.tick();
    assert!(!sim.health(orphan).unwrap().is_alive());
}

#[test]
fn unloaded_heart_does_not_kill_its_puppet() {
    let mut sim = grove();
    let (player, puppet) = summon(&mut sim);
    send_away(&mut sim, player);

    let doc = sim.unload_heart(HEART).unwrap();
    sim.run_ticks(5);
    assert!(sim.health(puppet).unwrap().is_alive());

    sim.load_heart(&doc).unwrap();
    sim.tick();
    assert_eq!(sim.bound_puppet(HEART), Some(puppet));
    assert!(sim.health(puppet).unwrap().is_alive());
}

#[test]
fn same_seed_same_run() {
    let run = || {
        let mut sim = grove();
        summon(&mut sim);
        sim.run_ticks(40);
        sim.snapshot_json()
    };
    assert_eq!(run(), run());
}
