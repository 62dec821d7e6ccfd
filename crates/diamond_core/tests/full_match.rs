//! Whole-match integration tests on fixture rosters.

use std::sync::{Arc, Mutex};

use diamond_core::error::ListenerError;

use diamond_core::config::{MatchConfig, MercyRule};
use diamond_core::controller::{simulate, Match, Termination};
use diamond_core::dugout::{DugoutListener, DUGOUT_TOPICS};
use diamond_core::events::{EventKind, FnListener, MatchEvent};
use diamond_core::player::TeamSide;
use diamond_core::replay::MatchReplay;
use diamond_core::telemetry::{ForwardingSink, MemorySink, TelemetryCollector, TelemetryRecord};
use diamond_test_utils::determinism::{run_parallel_scoped, verify_determinism};
use diamond_test_utils::fixtures::{exhibition_setup, game_data, setup_with_config};

#[test]
fn test_seeds_play_to_a_consistent_finish() {
    let data = game_data();
    for seed in 0..20 {
        let result = simulate(exhibition_setup(seed), Arc::clone(&data)).unwrap();
        let home_line: u32 = result.line_score(TeamSide::Home).iter().sum();
        let away_line: u32 = result.line_score(TeamSide::Away).iter().sum();
        assert_eq!(home_line, result.home_score, "seed {seed}");
        assert_eq!(away_line, result.away_score, "seed {seed}");
        match result.termination {
            Termination::Draw => assert_eq!(result.winner, None),
            _ => assert!(result.winner.is_some(), "seed {seed}"),
        }
        assert!(matches!(result.log.first(), Some(MatchEvent::MatchStarted { .. })));
        assert!(matches!(result.log.last(), Some(MatchEvent::MatchEnded { .. })));
    }
}

#[test]
fn test_determinism_harness_on_fixtures() {
    let data = game_data();
    verify_determinism(3, &exhibition_setup(99), &data).assert_deterministic();
    run_parallel_scoped(4, &exhibition_setup(100), &data).assert_deterministic();
}

#[test]
fn test_mercy_rule_can_end_early() {
    let config = MatchConfig {
        mercy: Some(MercyRule {
            run_margin: 1,
            from_inning: 1,
        }),
        ..MatchConfig::default()
    };
    let data = game_data();
    let mut saw_mercy = false;
    for seed in 0..30 {
        let result = simulate(setup_with_config(seed, config.clone()), Arc::clone(&data)).unwrap();
        if result.termination == Termination::Mercy {
            saw_mercy = true;
            assert!(result.home_score.abs_diff(result.away_score) >= 1);
            assert!(result.innings < config.regulation_innings);
        }
    }
    assert!(saw_mercy, "a one-run mercy rule should fire within 30 seeds");
}

#[test]
fn test_listeners_attached_through_the_match() {
    let setup = exhibition_setup(5);
    let sink = MemorySink::new();
    let mut game = Match::new(setup.clone(), game_data()).unwrap();
    game.subscribe(
        Box::new(
            TelemetryCollector::new(16)
                .with_sink(Box::new(sink.clone()))
                .with_sink(Box::new(ForwardingSink::default())),
        ),
        &[],
    );
    game.subscribe(Box::new(DugoutListener::new(&setup.home, &setup.away)), DUGOUT_TOPICS);
    let result = game.play().unwrap();

    let stored = sink.records();
    assert!(stored
        .iter()
        .any(|r| matches!(r, TelemetryRecord::GameOver { .. })));
    let innings = stored
        .iter()
        .filter(|r| matches!(r, TelemetryRecord::InningComplete { .. }))
        .count();
    assert_eq!(innings, result.halves.len());
    assert!(result
        .log
        .iter()
        .any(|e| e.kind() == EventKind::TelemetryFlushed));
}

#[test]
fn test_replay_round_trip_on_fixtures() {
    let (replay, result) = MatchReplay::capture(exhibition_setup(77), game_data()).unwrap();
    let bytes = replay.to_bytes().unwrap();
    let restored = MatchReplay::from_bytes(&bytes).unwrap();
    let again = restored.verify(game_data()).unwrap();
    assert_eq!(again.log_hash, result.log_hash);
    assert_eq!(again.home_score, result.home_score);
}

#[test]
fn test_runs_scored_events_match_score() {
    let seen = Arc::new(Mutex::new(0u32));
    let counter = Arc::clone(&seen);
    let mut game = Match::new(exhibition_setup(8), game_data()).unwrap();
    game.subscribe(
        Box::new(FnListener::new(
            "runs",
            move |event: &MatchEvent, _: &mut Vec<MatchEvent>| -> Result<(), ListenerError> {
                if matches!(event, MatchEvent::RunScored { .. }) {
                    *counter.lock().unwrap() += 1;
                }
                Ok(())
            },
        )),
        &[EventKind::RunScored],
    );
    let result = game.play().unwrap();
    assert_eq!(*seen.lock().unwrap(), result.home_score + result.away_score);
}
