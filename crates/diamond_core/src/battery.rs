//! Battery negotiation: catcher sign-calling, shake-offs and trust.
//!
//! The catcher ranks the pitcher's repertoire for the situation and calls
//! the best pitch plus a location. The pitcher may shake it off with a
//! probability set by personality and softened by trust in the catcher.
//! Each shake excludes the rejected pitch from the next call. Once the
//! shake cap is used up the next call is forced: no roll, the pitcher
//! throws it.
//!
//! The [`BatteryBook`] is the per-match notebook: catcher memory per
//! (catcher, batter, pitch), trust and sync per (pitcher, catcher), and the
//! last pitch each pitcher threw.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::data::PitchTable;
use crate::physics::PitchLocation;
use crate::player::{PitchGrip, PitchKind, PitcherPersonality, PlayerId, PlayerSnapshot};
use crate::rng::MatchRng;

/// Starting trust for a battery.
pub const BASE_TRUST: i32 = 50;
/// Sync bound (symmetric).
pub const SYNC_BOUND: f64 = 5.0;

/// Reference velocity used to turn velocity modifiers into km/h gaps.
const REFERENCE_KMH: f64 = 140.0;

/// How a called pitch worked out, from the catcher's notebook's view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignOutcome {
    /// Strike, whiff or weak contact.
    Win,
    /// Hit hard.
    HardContact,
    /// Nothing worth noting beyond the attempt.
    Neutral,
}

/// Catcher memory for one pitch against one batter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PitchMemory {
    /// Times called.
    pub attempts: u32,
    /// Times it won the pitch.
    pub wins: u32,
    /// Times it was hit hard.
    pub hard_contact: u32,
    /// Location of the last call.
    pub last_location: PitchLocation,
}

impl Default for PitchMemory {
    fn default() -> Self {
        Self {
            attempts: 0,
            wins: 0,
            hard_contact: 0,
            last_location: PitchLocation::Zone,
        }
    }
}

impl PitchMemory {
    /// Share of attempts that won; 0.5 before any attempt.
    #[must_use]
    pub fn success_rate(&self) -> f64 {
        if self.attempts == 0 {
            0.5
        } else {
            f64::from(self.wins) / f64::from(self.attempts)
        }
    }
}

/// What the catcher knows about the batter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BatterRead {
    /// Batter.
    pub id: PlayerId,
    /// Sits on the zone when contact is high.
    pub hot_zone: bool,
    /// Expands the zone when discipline is low.
    pub chase_prone: bool,
    /// Hunts fastballs to pull.
    pub pull_power: bool,
}

impl BatterRead {
    /// Read a batter's ratings.
    #[must_use]
    pub fn of(batter: &PlayerSnapshot) -> Self {
        let b = &batter.batting;
        Self {
            id: batter.id,
            hot_zone: b.contact >= 65,
            chase_prone: b.discipline <= 45,
            pull_power: b.power >= 70 && batter.personality.drive >= 60,
        }
    }
}

/// Inputs for one sign.
#[derive(Debug, Clone, Copy)]
pub struct SignInputs<'a> {
    /// Catcher calling the game.
    pub catcher: PlayerId,
    /// Pitcher on the mound.
    pub pitcher: PlayerId,
    /// Batter at the plate.
    pub batter: BatterRead,
    /// Pitcher's repertoire (already defaulted when empty).
    pub repertoire: &'a [PitchGrip],
    /// Pitch physics table.
    pub pitches: &'a PitchTable,
    /// Pitches thrown so far.
    pub pitch_count: u32,
    /// Pitcher stamina.
    pub stamina: f64,
    /// Balls in the count.
    pub balls: u8,
    /// Strikes in the count.
    pub strikes: u8,
}

/// A called sign.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sign {
    /// Grip called.
    pub grip: PitchGrip,
    /// Location called.
    pub location: PitchLocation,
}

/// One step of the sign exchange, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NegotiationStep {
    /// Catcher put down a sign.
    Called {
        /// Sign shown.
        sign: Sign,
        /// Shakes so far.
        shakes: u8,
    },
    /// Pitcher shook it off.
    Shaken {
        /// Sign rejected.
        sign: Sign,
        /// Shakes including this one.
        shakes: u8,
    },
    /// Cap reached; this sign is thrown.
    Forced {
        /// Sign thrown.
        sign: Sign,
    },
}

/// Result of a full sign exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Negotiation {
    /// Sign agreed or forced.
    pub sign: Sign,
    /// Shakes used.
    pub shakes: u8,
    /// Whether the final sign was forced.
    pub forced: bool,
    /// Every step for publication.
    pub steps: Vec<NegotiationStep>,
}

/// Trust delta handed back at match end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrustDelta {
    /// Pitcher.
    pub pitcher: PlayerId,
    /// Catcher.
    pub catcher: PlayerId,
    /// Final trust minus the starting trust.
    pub delta: i32,
}

/// Per-match battery notebook.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatteryBook {
    memory: BTreeMap<(PlayerId, PlayerId, PitchKind), PitchMemory>,
    trust: BTreeMap<(PlayerId, PlayerId), i32>,
    sync: BTreeMap<(PlayerId, PlayerId), f64>,
    last_pitch: BTreeMap<PlayerId, PitchKind>,
}

/// Shake-off probability for a personality at a trust level.
#[must_use]
pub fn shake_chance(personality: PitcherPersonality, trust: i32) -> f64 {
    let trust_mod = f64::from(trust - BASE_TRUST) / 100.0 * personality.trust_factor();
    (personality.shake_probability() - trust_mod).clamp(0.0, 1.0)
}

fn velocity_synergy(gap_kmh: f64) -> f64 {
    if gap_kmh < 6.0 {
        -0.5
    } else if gap_kmh < 11.0 {
        0.6
    } else if gap_kmh < 24.0 {
        2.3
    } else if gap_kmh < 35.0 {
        3.2
    } else {
        3.8
    }
}

impl BatteryBook {
    /// Trust for a battery; starts at [`BASE_TRUST`].
    #[must_use]
    pub fn trust(&self, pitcher: PlayerId, catcher: PlayerId) -> i32 {
        self.trust.get(&(pitcher, catcher)).copied().unwrap_or(BASE_TRUST)
    }

    /// Nudge trust, clamped to `[0, 100]`.
    pub fn adjust_trust(&mut self, pitcher: PlayerId, catcher: PlayerId, delta: i32) -> i32 {
        let value = (self.trust(pitcher, catcher) + delta).clamp(0, 100);
        self.trust.insert((pitcher, catcher), value);
        value
    }

    /// Sync for a battery; starts at zero.
    #[must_use]
    pub fn sync(&self, pitcher: PlayerId, catcher: PlayerId) -> f64 {
        self.sync.get(&(pitcher, catcher)).copied().unwrap_or(0.0)
    }

    fn adjust_sync(&mut self, pitcher: PlayerId, catcher: PlayerId, delta: f64) -> f64 {
        let value = (self.sync(pitcher, catcher) + delta).clamp(-SYNC_BOUND, SYNC_BOUND);
        self.sync.insert((pitcher, catcher), value);
        value
    }

    /// Catcher memory for a pitch against a batter.
    #[must_use]
    pub fn memory(&self, catcher: PlayerId, batter: PlayerId, kind: PitchKind) -> Option<&PitchMemory> {
        self.memory.get(&(catcher, batter, kind))
    }

    /// Write a pitch outcome into the catcher's notebook.
    pub fn record_outcome(
        &mut self,
        catcher: PlayerId,
        batter: PlayerId,
        kind: PitchKind,
        location: PitchLocation,
        outcome: SignOutcome,
    ) {
        let entry = self.memory.entry((catcher, batter, kind)).or_default();
        entry.attempts += 1;
        entry.last_location = location;
        match outcome {
            SignOutcome::Win => entry.wins += 1,
            SignOutcome::HardContact => entry.hard_contact += 1,
            SignOutcome::Neutral => {}
        }
    }

    /// Remember the pitch a pitcher just threw.
    pub fn note_thrown(&mut self, pitcher: PlayerId, kind: PitchKind) {
        self.last_pitch.insert(pitcher, kind);
    }

    /// Last pitch thrown by a pitcher.
    #[must_use]
    pub fn last_pitch(&self, pitcher: PlayerId) -> Option<PitchKind> {
        self.last_pitch.get(&pitcher).copied()
    }

    /// Every battery whose trust moved, for hand-back at match end.
    #[must_use]
    pub fn trust_deltas(&self) -> Vec<TrustDelta> {
        self.trust
            .iter()
            .filter(|(_, v)| **v != BASE_TRUST)
            .map(|((pitcher, catcher), v)| TrustDelta {
                pitcher: *pitcher,
                catcher: *catcher,
                delta: v - BASE_TRUST,
            })
            .collect()
    }

    /// Situational score for one grip. Deterministic apart from the final jitter.
    fn score(&self, rng: &mut MatchRng, grip: &PitchGrip, inputs: &SignInputs<'_>) -> f64 {
        let profile = inputs.pitches.profile(grip.kind);
        let mut score = f64::from(grip.quality);

        let fatigue = (f64::from(inputs.pitch_count) - inputs.stamina).max(0.0) * 0.25;
        if fatigue > 2.0 {
            let guard = if profile.stamina_cost >= 1.3 {
                (fatigue - 3.0) * 0.6
            } else if profile.stamina_cost >= 1.15 {
                (fatigue - 5.0) * 0.4
            } else {
                0.0
            };
            score -= guard.clamp(0.0, 4.0);
        }

        if inputs.batter.pull_power && grip.kind.is_fastball() {
            score -= 3.0;
        }
        if inputs.batter.chase_prone && !grip.kind.is_fastball() {
            score += 2.0;
        }

        if let Some(memory) = self.memory(inputs.catcher, inputs.batter.id, grip.kind) {
            score += (memory.success_rate() - 0.5) * 10.0;
            score -= f64::from(memory.hard_contact) * 1.5;
        }

        if let Some(last) = self.last_pitch(inputs.pitcher) {
            if last == grip.kind {
                score -= 2.5;
            } else {
                let prev = inputs.pitches.profile(last);
                let gap = (prev.velocity_mod - profile.velocity_mod).abs() * REFERENCE_KMH;
                score += velocity_synergy(gap);
                if prev.plane != profile.plane {
                    score += 1.5;
                }
            }
            if last.is_fastball() == grip.kind.is_fastball() {
                score -= 1.0;
            }
        }

        score + rng.uniform(-1.0, 1.0)
    }

    fn choose_location(&self, inputs: &SignInputs<'_>, kind: PitchKind) -> PitchLocation {
        let memory = self.memory(inputs.catcher, inputs.batter.id, kind);
        let rate = memory.map(PitchMemory::success_rate);
        if inputs.strikes >= 2 && (inputs.batter.chase_prone || rate.is_some_and(|r| r >= 0.6)) {
            PitchLocation::Chase
        } else if i32::from(inputs.balls) - i32::from(inputs.strikes) >= 2 {
            PitchLocation::Zone
        } else if memory
            .is_some_and(|m| m.last_location == PitchLocation::Chase && m.success_rate() >= 0.55)
        {
            PitchLocation::Chase
        } else if !inputs.batter.hot_zone && inputs.strikes >= 1 {
            PitchLocation::Chase
        } else {
            PitchLocation::Zone
        }
    }

    /// The catcher's best sign, skipping `exclude` when anything else is left.
    pub fn suggest(
        &self,
        rng: &mut MatchRng,
        inputs: &SignInputs<'_>,
        exclude: Option<PitchKind>,
    ) -> Sign {
        let fallback = PitchGrip::default_repertoire();
        let repertoire = if inputs.repertoire.is_empty() {
            fallback.as_slice()
        } else {
            inputs.repertoire
        };
        let mut candidates: Vec<&PitchGrip> = repertoire
            .iter()
            .filter(|g| Some(g.kind) != exclude)
            .collect();
        if candidates.is_empty() {
            candidates = repertoire.iter().collect();
        }

        let mut best = *candidates[0];
        let mut best_score = f64::NEG_INFINITY;
        for grip in candidates {
            let score = self.score(rng, grip, inputs);
            if score > best_score {
                best_score = score;
                best = *grip;
            }
        }
        Sign {
            grip: best,
            location: self.choose_location(inputs, best.kind),
        }
    }

    /// Run the sign exchange for an AI pitcher.
    ///
    /// At most `shake_cap` shakes happen. When the cap is used up, the
    /// next call is forced and published exactly once.
    pub fn negotiate(
        &mut self,
        rng: &mut MatchRng,
        inputs: &SignInputs<'_>,
        personality: PitcherPersonality,
        shake_cap: u8,
    ) -> Negotiation {
        let trust = self.trust(inputs.pitcher, inputs.catcher);
        let mut steps = Vec::new();
        let mut shakes = 0u8;
        let mut sign = self.suggest(rng, inputs, None);

        loop {
            if shakes >= shake_cap {
                steps.push(NegotiationStep::Forced { sign });
                return Negotiation {
                    sign,
                    shakes,
                    forced: true,
                    steps,
                };
            }
            steps.push(NegotiationStep::Called { sign, shakes });
            if !rng.chance(shake_chance(personality, trust)) {
                break;
            }
            shakes += 1;
            self.adjust_sync(inputs.pitcher, inputs.catcher, -0.2);
            steps.push(NegotiationStep::Shaken { sign, shakes });
            sign = self.suggest(rng, inputs, Some(sign.grip.kind));
        }

        let settle = if shakes == 0 { 0.15 } else { -0.05 * f64::from(shakes) };
        self.adjust_sync(inputs.pitcher, inputs.catcher, settle);
        Negotiation {
            sign,
            shakes,
            forced: false,
            steps,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::player::Position;

    fn table() -> PitchTable {
        PitchTable::from_ron(include_str!("../data/pitches.ron")).unwrap()
    }

    fn inputs<'a>(repertoire: &'a [PitchGrip], pitches: &'a PitchTable) -> SignInputs<'a> {
        let batter = PlayerSnapshot::league_average(10, "B", Position::LeftField);
        SignInputs {
            catcher: 2,
            pitcher: 1,
            batter: BatterRead::of(&batter),
            repertoire,
            pitches,
            pitch_count: 0,
            stamina: 50.0,
            balls: 0,
            strikes: 0,
        }
    }

    #[test]
    fn test_shake_chance_by_personality() {
        assert!((shake_chance(PitcherPersonality::Stubborn, 50) - 0.5).abs() < 1e-9);
        assert!(shake_chance(PitcherPersonality::Nervous, 100) < 1e-9);
        assert!(
            shake_chance(PitcherPersonality::Confident, 20)
                > shake_chance(PitcherPersonality::Confident, 80)
        );
    }

    #[test]
    fn test_cap_forces_exactly_once() {
        let pitches = table();
        let repertoire = PitchGrip::default_repertoire();
        let mut book = BatteryBook::default();
        // Drive trust to zero so a stubborn pitcher shakes more often.
        book.adjust_trust(1, 2, -100);
        let mut rng = MatchRng::new(4);
        let mut forced_seen = false;
        for _ in 0..300 {
            let n = book.negotiate(&mut rng, &inputs(&repertoire, &pitches), PitcherPersonality::Stubborn, 3);
            let forced = n
                .steps
                .iter()
                .filter(|s| matches!(s, NegotiationStep::Forced { .. }))
                .count();
            let shaken = n
                .steps
                .iter()
                .filter(|s| matches!(s, NegotiationStep::Shaken { .. }))
                .count();
            assert!(n.shakes <= 3);
            assert_eq!(shaken, usize::from(n.shakes));
            assert_eq!(forced, usize::from(n.forced));
            if n.forced {
                assert_eq!(n.shakes, 3);
                assert!(matches!(n.steps.last(), Some(NegotiationStep::Forced { .. })));
                forced_seen = true;
            }
        }
        assert!(forced_seen);
        assert!(book.sync(1, 2) >= -SYNC_BOUND);
    }

    #[test]
    fn test_shaken_pitch_excluded() {
        let pitches = table();
        let repertoire = PitchGrip::default_repertoire();
        let book = BatteryBook::default();
        let mut rng = MatchRng::new(9);
        for _ in 0..20 {
            let sign = book.suggest(&mut rng, &inputs(&repertoire, &pitches), Some(PitchKind::FourSeam));
            assert_eq!(sign.grip.kind, PitchKind::Slider);
        }
    }

    #[test]
    fn test_single_pitch_survives_exclusion() {
        let pitches = table();
        let repertoire = [PitchGrip::new(PitchKind::Knuckleball, 70, 80)];
        let book = BatteryBook::default();
        let sign = book.suggest(
            &mut MatchRng::new(1),
            &inputs(&repertoire, &pitches),
            Some(PitchKind::Knuckleball),
        );
        assert_eq!(sign.grip.kind, PitchKind::Knuckleball);
    }

    #[test]
    fn test_empty_repertoire_defaults() {
        let pitches = table();
        let book = BatteryBook::default();
        let sign = book.suggest(&mut MatchRng::new(1), &inputs(&[], &pitches), None);
        assert!(PitchGrip::default_repertoire().contains(&sign.grip));
    }

    #[test]
    fn test_chase_prone_two_strikes_goes_chase() {
        let pitches = table();
        let repertoire = PitchGrip::default_repertoire();
        let mut i = inputs(&repertoire, &pitches);
        i.batter.chase_prone = true;
        i.strikes = 2;
        let book = BatteryBook::default();
        let sign = book.suggest(&mut MatchRng::new(2), &i, None);
        assert_eq!(sign.location, PitchLocation::Chase);
        i.strikes = 0;
        i.balls = 3;
        let sign = book.suggest(&mut MatchRng::new(2), &i, None);
        assert_eq!(sign.location, PitchLocation::Zone);
    }

    #[test]
    fn test_trust_clamps_and_reports() {
        let mut book = BatteryBook::default();
        assert_eq!(book.adjust_trust(1, 2, 70), 100);
        assert_eq!(book.adjust_trust(3, 4, -1), 49);
        let deltas = book.trust_deltas();
        assert_eq!(deltas.len(), 2);
        assert_eq!(deltas[0].delta, 50);
        assert_eq!(deltas[1].delta, -1);
    }

    #[test]
    fn test_memory_tracks_success() {
        let mut book = BatteryBook::default();
        book.record_outcome(2, 10, PitchKind::Slider, PitchLocation::Chase, SignOutcome::Win);
        book.record_outcome(2, 10, PitchKind::Slider, PitchLocation::Zone, SignOutcome::HardContact);
        let m = book.memory(2, 10, PitchKind::Slider).unwrap();
        assert_eq!(m.attempts, 2);
        assert!((m.success_rate() - 0.5).abs() < 1e-9);
        assert_eq!(m.last_location, PitchLocation::Zone);
        assert!(book.memory(2, 11, PitchKind::Slider).is_none());
    }
}
