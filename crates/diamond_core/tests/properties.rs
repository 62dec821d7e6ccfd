//! Property tests over the bounded quantities of a match.

use diamond_core::at_bat::PlateAppearanceResult;
use diamond_core::confidence::{
    BatteryCushion, ConfidenceEvent, ConfidenceLedger, CONFIDENCE_MAX, CONFIDENCE_MIN,
};
use diamond_core::config::Tuning;
use diamond_core::controller::simulate;
use diamond_core::events::MatchEvent;
use diamond_core::momentum::{MomentumKey, MomentumMeters};
use diamond_core::player::TeamSide;
use diamond_test_utils::fixtures::{exhibition_setup, game_data, opposing_teams, HOME_BASE_ID};
use diamond_test_utils::strategies::{arb_confidence_delta, arb_rating, arb_seed, arb_setup};
use proptest::prelude::*;

const EVENTS: [ConfidenceEvent; 10] = [
    ConfidenceEvent::StrikeoutPitched,
    ConfidenceEvent::StruckOut,
    ConfidenceEvent::Hit,
    ConfidenceEvent::HitAllowed,
    ConfidenceEvent::HomeRun,
    ConfidenceEvent::HomeRunAllowed,
    ConfidenceEvent::Walk,
    ConfidenceEvent::Error,
    ConfidenceEvent::Ejection,
    ConfidenceEvent::Rally,
];

const KEYS: [MomentumKey; 7] = [
    MomentumKey::Strikeout,
    MomentumKey::DoublePlay,
    MomentumKey::Error,
    MomentumKey::Single,
    MomentumKey::Double,
    MomentumKey::Triple,
    MomentumKey::HomeRun,
];

/// Walk the log half by half and check that outs only accrue.
///
/// Starting outs never drop within a half, and a strikeout adds exactly
/// one out on top of any runners retired on the bases during it.
fn check_out_progression(log: &[MatchEvent]) -> Result<(), String> {
    let mut last_start: Option<u8> = None;
    let mut runner_outs = 0u8;
    let mut strikeout_from: Option<u8> = None;
    for (i, event) in log.iter().enumerate() {
        let settled = match event {
            MatchEvent::HalfInningStarted { .. } => {
                last_start = None;
                strikeout_from = None;
                None
            }
            MatchEvent::PlateAppearanceStarted { outs, .. } => {
                if let Some(prev) = last_start {
                    if *outs < prev {
                        return Err(format!("event {i}: outs fell from {prev} to {outs}"));
                    }
                }
                let settled = strikeout_from.take().map(|from| (from, *outs));
                last_start = Some(*outs);
                runner_outs = 0;
                settled
            }
            MatchEvent::StealResolved { success: false, .. }
            | MatchEvent::PickoffResolved { picked: true, .. } => {
                runner_outs += 1;
                None
            }
            MatchEvent::PlateAppearanceEnded {
                result: PlateAppearanceResult::Strikeout,
                ..
            } => {
                strikeout_from = last_start.map(|start| start + runner_outs);
                None
            }
            MatchEvent::HalfInningEnded { outs, .. } => {
                last_start = None;
                strikeout_from.take().map(|from| (from, *outs))
            }
            _ => None,
        };
        if let Some((from, to)) = settled {
            if to != from + 1 {
                return Err(format!("event {i}: strikeout moved outs from {from} to {to}"));
            }
        }
    }
    Ok(())
}

#[test]
fn test_strikeouts_add_one_out_on_fixture_seeds() {
    for seed in 0..20 {
        let result = simulate(exhibition_setup(seed), game_data()).unwrap();
        if let Err(message) = check_out_progression(&result.log) {
            panic!("seed {seed}: {message}");
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn test_cushion_keeps_sign_and_bounds(
        delta in arb_confidence_delta(),
        loyalty in arb_rating(),
        trust in arb_rating(),
        volatility in arb_rating(),
    ) {
        let cushion = BatteryCushion {
            catcher_loyalty: f64::from(loyalty),
            trust: f64::from(trust),
        };
        let raw = f64::from(delta);
        let scaled = cushion.scale(raw, f64::from(volatility));
        prop_assert!(scaled.abs() >= raw.abs() * 0.35 - 1e-9);
        prop_assert!(scaled.abs() <= raw.abs() * 1.75 + 1e-9);
        prop_assert!(scaled * raw >= 0.0);
    }

    #[test]
    fn test_confidence_stays_clamped(picks in prop::collection::vec((0usize..EVENTS.len(), 0u32..9), 1..200)) {
        let (home, away) = opposing_teams();
        let data = game_data();
        let tuning = Tuning::default();
        let mut ledger = ConfidenceLedger::new(&home, &away, &data.traits);
        for (event, slot) in picks {
            for change in ledger.adjust(HOME_BASE_ID + slot, EVENTS[event], None, &tuning) {
                prop_assert!((CONFIDENCE_MIN..=CONFIDENCE_MAX).contains(&change.new));
            }
        }
        for (_, value) in ledger.values() {
            prop_assert!((CONFIDENCE_MIN..=CONFIDENCE_MAX).contains(&value));
        }
    }

    #[test]
    fn test_momentum_stays_bounded_and_mirrored(picks in prop::collection::vec((0usize..KEYS.len(), any::<bool>()), 1..300)) {
        let tuning = Tuning::default();
        let mut meters = MomentumMeters::new(&tuning);
        for (key, home) in picks {
            let side = if home { TeamSide::Home } else { TeamSide::Away };
            meters.record(side, KEYS[key]);
            let value = meters.value(TeamSide::Home);
            prop_assert!(value.abs() <= tuning.momentum_bound);
            prop_assert_eq!(value, -meters.value(TeamSide::Away));
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(12))]

    #[test]
    fn test_counts_stay_in_range(seed in arb_seed()) {
        let (home, away) = opposing_teams();
        let setup = diamond_core::controller::MatchSetup::new(home, away, seed);
        let result = simulate(setup, game_data()).unwrap();
        for event in &result.log {
            if let MatchEvent::PitchResolved { balls, strikes, .. } = event {
                prop_assert!(*balls <= 4 && *strikes <= 3, "count {balls}-{strikes}");
            }
            if let MatchEvent::HalfInningEnded { outs, .. } = event {
                prop_assert!(*outs <= 3);
            }
        }
        prop_assert_eq!(check_out_progression(&result.log), Ok(()));
    }

    #[test]
    fn test_any_setup_is_deterministic(setup in arb_setup()) {
        let first = simulate(setup.clone(), game_data()).unwrap();
        let second = simulate(setup, game_data()).unwrap();
        prop_assert_eq!(first.log_hash, second.log_hash);
        prop_assert_eq!(first.home_score, second.home_score);
        prop_assert_eq!(first.away_score, second.away_score);
    }
}
