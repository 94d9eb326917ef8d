//! Performance benchmarks for the roulette hot paths

use server::config::EngineConfig;
use server::effects::EffectRegistry;
use server::engine::Engine;
use server::game::GameState;
use server::host::Participant;
use server::selector::{RecentTargets, Selector};
use shared::Team;
use std::time::Instant;

fn crowded_session(players: u32) -> (Engine, GameState) {
    let mut game = GameState::new();
    for id in 1..=players {
        game.add_player(id, false);
    }
    let config = EngineConfig {
        seed: Some(2024),
        ..EngineConfig::default()
    };
    let mut engine = Engine::new(config).unwrap();
    engine.start_session(&mut game, 0);
    (engine, game)
}

/// Benchmarks selection throughput over a full roster
#[test]
fn benchmark_selection() {
    let selector = Selector::new(&EngineConfig::default());
    let registry = EffectRegistry::new();
    let recent = RecentTargets::new(2);
    let roster: Vec<Participant> = (1..=64)
        .map(|id| Participant {
            id,
            team: Some(if id % 2 == 0 { Team::Red } else { Team::Blue }),
            alive: true,
            connected: true,
            spawns: 0,
        })
        .collect();

    let iterations = 10_000u64;
    let start = Instant::now();

    for seed in 0..iterations {
        let _ = selector.select(&registry, seed, &roster, &recent);
    }

    let duration = start.elapsed();
    println!(
        "Selection: {} rolls in {:?} ({:.2} μs/roll)",
        iterations,
        duration,
        duration.as_micros() as f64 / iterations as f64
    );

    // 10k selections over 64 participants should stay well under a second
    assert!(duration.as_millis() < 1000);
}

/// Benchmarks engine ticks with everyone carrying an active effect
#[test]
fn benchmark_engine_tick_with_active_effects() {
    let (mut engine, mut game) = crowded_session(64);
    engine.submit(None, "test jitter 5 all").unwrap();

    let mut now = 50;
    while now <= 10_100 {
        game.update(now);
        engine.tick(&mut game, now);
        now += 50;
    }
    assert_eq!(engine.store().len(), 64);

    let ticks = 2_000;
    let start = Instant::now();

    for _ in 0..ticks {
        now += 50;
        game.update(now);
        engine.tick(&mut game, now);
    }

    let duration = start.elapsed();
    println!(
        "Engine tick: {} ticks with 64 effects in {:?} ({:.2} μs/tick)",
        ticks,
        duration,
        duration.as_micros() as f64 / ticks as f64
    );

    // At 20Hz a tick has 50ms; it should use a tiny fraction of that
    assert!(duration.as_millis() < 1000);
}

/// Benchmarks a whole simulated session with automatic rolls
#[test]
fn benchmark_long_session() {
    let (mut engine, mut game) = crowded_session(32);

    let start = Instant::now();
    let mut now = 0;
    // Ten simulated minutes at 20Hz
    while now <= 600_000 {
        game.update(now);
        engine.tick(&mut game, now);
        now += 50;
    }

    let duration = start.elapsed();
    let applied = game
        .take_outbox()
        .iter()
        .filter(|(_, m)| matches!(m, shared::Presentation::EffectApplied { .. }))
        .count();
    println!(
        "Long session: 12000 ticks, {} effects applied in {:?}",
        applied, duration
    );

    assert!(applied > 0);
    assert!(duration.as_secs() < 5);
}
