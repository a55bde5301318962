//! Basic demonstration of the heart / puppet simulation.
//!
//! Run with: cargo run --example basic_demo
//! Set `RUST_LOG=creaking_sim=debug` to watch state transitions.

use creaking_sim::{Axis, BlockPos, Damage, Material, SimWorld, SoundKind};
use glam::Vec3;
use tracing_subscriber::EnvFilter;

const HEART: BlockPos = BlockPos::new(0, 1, 0);

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    println!("=== Creaking Heart - Simulation Demo ===\n");

    let mut sim = SimWorld::new();
    if let Ok(config) = sim.config().to_json_pretty() {
        tracing::debug!(%config, "simulation config");
    }
    sim.fill_blocks(BlockPos::new(-24, -1, -24), BlockPos::new(24, -1, 24), Material::Solid);
    sim.set_block(BlockPos::new(0, 0, 0), Material::Log { axis: Axis::Y });
    sim.set_block(BlockPos::new(0, 2, 0), Material::Log { axis: Axis::Y });
    sim.place_heart(HEART, Axis::Y).expect("fresh world has no heart");
    sim.set_day_time(12_900);

    let player = sim.spawn_player(Vec3::new(0.5, 0.0, 12.5), Vec3::new(0.0, 0.0, -1.0));

    println!("Night falls; a player waits nearby. Running 100 ticks (5 seconds)...\n");
    for _ in 0..100 {
        sim.step(0.05);
    }
    print_snapshot(&mut sim);

    let Some(puppet) = sim.bound_puppet(HEART) else {
        println!("\nThe heart found no room to summon a puppet.");
        return;
    };

    println!("\n--- The player stares at the puppet ---\n");
    if let Some(pos) = sim.position(puppet) {
        sim.look_at(player, pos.as_vec3() + Vec3::Y * 2.3);
    }
    sim.run_ticks(20);
    print_snapshot(&mut sim);

    println!("\n--- The player strikes it ---\n");
    let accepted = sim.damage(puppet, &Damage::melee(player, 4.0));
    println!(
        "  hit accepted: {}  resin placed: {}",
        accepted,
        sim.effects().count_sounds(SoundKind::ResinPlace)
    );
    print_snapshot(&mut sim);

    println!("\n--- The heart is broken ---\n");
    sim.remove_heart(HEART).expect("heart was placed above");
    sim.run_ticks(40);
    print_snapshot(&mut sim);

    println!("\n=== Final State (JSON) ===\n");
    println!("{}", sim.snapshot().to_json_pretty().unwrap_or_default());
}

fn print_snapshot(sim: &mut SimWorld) {
    let snapshot = sim.snapshot();
    println!("  tick {} day_time {}", snapshot.tick, snapshot.day_time);
    for heart in &snapshot.hearts {
        println!(
            "    heart {}: state={:?} comparator={} bound={}",
            heart.pos,
            heart.state,
            heart.comparator,
            heart.puppet.is_some()
        );
    }
    for puppet in &snapshot.puppets {
        println!(
            "    puppet {}: pos=({:.1}, {:.1}, {:.1}) hp={:.1} active={} rooted={} crumbling={}",
            puppet.id, puppet.x, puppet.y, puppet.z, puppet.health, puppet.active, puppet.rooted, puppet.crumbling
        );
    }
    println!("    effects since last snapshot: {}", sim.drain_effects().len());
}
