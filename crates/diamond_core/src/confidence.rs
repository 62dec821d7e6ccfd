//! Per-player confidence ledger.
//!
//! Confidence is a bounded integer per rostered player. Discrete events
//! adjust the involved player by a base delta scaled by that player's own
//! temperament. The adjusted delta then spreads to teammates on the same
//! side: loyal teammates are pulled toward a positive swing and volatile
//! teammates are dragged by a negative one.
//!
//! # Invariants
//!
//! - Every value stays within `[CONFIDENCE_MIN, CONFIDENCE_MAX]`.
//! - Only players registered at construction are ever touched. An unknown
//!   player id is a no-op, so nothing leaks across rosters.
//! - Propagation never crosses sides.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::config::Tuning;
use crate::data::{TraitFlag, TraitTable};
use crate::player::{PlayerId, PlayerSnapshot, Stat, TeamSide, TeamSnapshot};

/// Lowest confidence value.
pub const CONFIDENCE_MIN: i32 = -100;
/// Highest confidence value.
pub const CONFIDENCE_MAX: i32 = 100;

/// Loyalty at which a teammate soaks up a positive swing.
const LOYAL_TEAMMATE: f64 = 72.0;
/// Volatility at which a teammate is rattled by a negative swing.
const VOLATILE_TEAMMATE: f64 = 65.0;

fn clamp(value: f64) -> i32 {
    if value.is_nan() {
        return 0;
    }
    (value.round() as i32).clamp(CONFIDENCE_MIN, CONFIDENCE_MAX)
}

/// Why a confidence value moved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConfidenceEvent {
    /// Pitcher recorded a strikeout.
    StrikeoutPitched,
    /// Batter struck out.
    StruckOut,
    /// Batter got a hit.
    Hit,
    /// Pitcher gave up a hit.
    HitAllowed,
    /// Batter homered.
    HomeRun,
    /// Pitcher gave up a home run.
    HomeRunAllowed,
    /// Batter drew a walk.
    Walk,
    /// Pitcher issued a walk.
    WalkAllowed,
    /// Fielder committed an error.
    Error,
    /// A neighbouring fielder committed an error.
    ErrorNearby,
    /// Pitcher threw a wild pitch.
    WildPitch,
    /// Player was ejected.
    Ejection,
    /// Came through in a clutch moment.
    Clutch,
    /// Lineup kept the line moving.
    Rally,
    /// Home crowd at the first pitch.
    HomeField,
    /// Hostile crowd at the first pitch.
    RoadGame,
}

impl ConfidenceEvent {
    /// Unscaled delta.
    #[must_use]
    pub const fn base_delta(self) -> f64 {
        match self {
            ConfidenceEvent::StrikeoutPitched => 6.0,
            ConfidenceEvent::StruckOut => -6.0,
            ConfidenceEvent::Hit => 5.0,
            ConfidenceEvent::HitAllowed => -4.0,
            ConfidenceEvent::HomeRun => 10.0,
            ConfidenceEvent::HomeRunAllowed => -8.0,
            ConfidenceEvent::Walk => 2.0,
            ConfidenceEvent::WalkAllowed => -3.0,
            ConfidenceEvent::Error => -18.0,
            ConfidenceEvent::ErrorNearby => -7.0,
            ConfidenceEvent::WildPitch => -5.0,
            ConfidenceEvent::Ejection => -25.0,
            ConfidenceEvent::Clutch => 8.0,
            ConfidenceEvent::Rally => 3.0,
            ConfidenceEvent::HomeField => 2.0,
            ConfidenceEvent::RoadGame => -1.0,
        }
    }

    /// Setbacks that volatile players amplify.
    const fn rattles(self) -> bool {
        matches!(
            self,
            ConfidenceEvent::Error
                | ConfidenceEvent::ErrorNearby
                | ConfidenceEvent::WildPitch
                | ConfidenceEvent::StruckOut
        )
    }

    /// Successes that driven players amplify.
    const fn inspires(self) -> bool {
        matches!(
            self,
            ConfidenceEvent::StrikeoutPitched
                | ConfidenceEvent::Hit
                | ConfidenceEvent::HomeRun
                | ConfidenceEvent::Walk
                | ConfidenceEvent::Clutch
        )
    }

    /// Setbacks that mental fortitude cushions.
    const fn tests_resolve(self) -> bool {
        matches!(
            self,
            ConfidenceEvent::Error
                | ConfidenceEvent::WildPitch
                | ConfidenceEvent::StruckOut
                | ConfidenceEvent::HitAllowed
                | ConfidenceEvent::HomeRunAllowed
                | ConfidenceEvent::WalkAllowed
        )
    }

    /// Whether the swing spreads to teammates.
    const fn contagious(self) -> bool {
        !matches!(
            self,
            ConfidenceEvent::Error
                | ConfidenceEvent::ErrorNearby
                | ConfidenceEvent::Rally
                | ConfidenceEvent::HomeField
                | ConfidenceEvent::RoadGame
        )
    }
}

/// Catcher influence on the active pitcher's swings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BatteryCushion {
    /// Catcher loyalty.
    pub catcher_loyalty: f64,
    /// Battery trust in `[0, 100]`.
    pub trust: f64,
}

impl BatteryCushion {
    /// Scale a delta for a pitcher with the given volatility.
    ///
    /// Loyalty and trust boost positive swings and soften negative ones;
    /// volatility does the opposite. Clamped to `[0.35, 1.75]`.
    #[must_use]
    pub fn scale(&self, delta: f64, pitcher_volatility: f64) -> f64 {
        let loyalty = ((self.catcher_loyalty - 50.0) / 50.0).clamp(-1.0, 1.0);
        let volatility = ((pitcher_volatility - 50.0) / 50.0).clamp(-1.0, 1.0);
        let trust = ((self.trust - 50.0) / 50.0).clamp(-1.0, 1.0);
        let scale = if delta > 0.0 {
            1.0 + loyalty * 0.35 + trust * 0.25 - volatility * 0.3
        } else {
            1.0 - loyalty * 0.3 - trust * 0.15 + volatility * 0.45
        };
        delta * scale.clamp(0.35, 1.75)
    }
}

/// One recorded change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfidenceChange {
    /// Player affected.
    pub player: PlayerId,
    /// Player's side.
    pub side: TeamSide,
    /// Event behind the change.
    pub reason: ConfidenceEvent,
    /// Value before.
    pub old: i32,
    /// Value after.
    pub new: i32,
}

impl ConfidenceChange {
    /// Whether the change is large enough to publish.
    #[must_use]
    pub fn is_material(&self, threshold: i32) -> bool {
        (self.new - self.old).abs() >= threshold
    }
}

/// Traits that shape how a player's confidence moves.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
struct Temperament {
    side: TeamSide,
    drive: f64,
    loyalty: f64,
    volatility: f64,
    mental: f64,
    mental_wall: bool,
}

impl Temperament {
    fn of(player: &PlayerSnapshot, side: TeamSide, traits: &TraitTable) -> Self {
        let mut volatility = traits.effective_stat(player, Stat::Volatility, None);
        if traits.has_flag(player, TraitFlag::ControlFreak) {
            volatility = volatility.min(55.0);
        }
        Self {
            side,
            drive: traits.effective_stat(player, Stat::Drive, None),
            loyalty: traits.effective_stat(player, Stat::Loyalty, None),
            volatility,
            mental: traits.effective_stat(player, Stat::Mental, None),
            mental_wall: traits.has_flag(player, TraitFlag::MentalWall),
        }
    }
}

/// Starting confidence from personality.
#[must_use]
pub fn base_confidence(player: &PlayerSnapshot) -> i32 {
    let p = &player.personality;
    let base = (f64::from(p.drive) - 50.0) * 1.4 + (f64::from(p.morale) - 60.0) * 0.4
        + (f64::from(p.loyalty) - 50.0) * 0.2
        - (f64::from(p.volatility) - 50.0) * 0.8
        - f64::from(p.slump) * 1.5;
    clamp(base)
}

/// Confidence for every rostered player.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceLedger {
    values: BTreeMap<PlayerId, i32>,
    initial: BTreeMap<PlayerId, i32>,
    temperaments: BTreeMap<PlayerId, Temperament>,
}

impl ConfidenceLedger {
    /// Seed the ledger for both rosters.
    ///
    /// Each player starts from [`base_confidence`]. Loyal players drift a
    /// quarter of the way toward their captain, each starting battery meets
    /// in the middle, and the home crowd lifts the home side while the road
    /// side dips.
    #[must_use]
    pub fn new(home: &TeamSnapshot, away: &TeamSnapshot, traits: &TraitTable) -> Self {
        let mut ledger = Self {
            values: BTreeMap::new(),
            initial: BTreeMap::new(),
            temperaments: BTreeMap::new(),
        };
        for (side, team) in [(TeamSide::Home, home), (TeamSide::Away, away)] {
            for player in team.players() {
                ledger.values.insert(player.id, base_confidence(player));
                ledger
                    .temperaments
                    .insert(player.id, Temperament::of(player, side, traits));
            }
        }
        for (side, team) in [(TeamSide::Home, home), (TeamSide::Away, away)] {
            ledger.sync_captain(team);
            if let Some(catcher) = team.catcher() {
                let pitcher = team.starting_pitcher;
                let mean = f64::from(ledger.get(pitcher) + ledger.get(catcher.id)) / 2.0;
                ledger.nudge_toward(pitcher, mean, 0.2);
                ledger.nudge_toward(catcher.id, mean, 0.2);
            }
            for player in &team.lineup {
                let reason = match side {
                    TeamSide::Home => ConfidenceEvent::HomeField,
                    TeamSide::Away => ConfidenceEvent::RoadGame,
                };
                let mut delta = reason.base_delta();
                if side == TeamSide::Home && player.personality.captain {
                    delta += 1.0;
                }
                ledger.shift(player.id, delta);
            }
        }
        ledger.initial = ledger.values.clone();
        ledger
    }

    fn sync_captain(&mut self, team: &TeamSnapshot) {
        let Some(captain) = team.players().find(|p| p.personality.captain) else {
            return;
        };
        let target = f64::from(self.get(captain.id));
        for player in team.players().filter(|p| p.id != captain.id) {
            if player.personality.loyalty >= 75 {
                self.nudge_toward(player.id, target, 0.25);
            }
        }
    }

    fn nudge_toward(&mut self, player: PlayerId, target: f64, ratio: f64) {
        if let Some(value) = self.values.get_mut(&player) {
            let current = f64::from(*value);
            *value = clamp(current + (target - current) * ratio);
        }
    }

    fn shift(&mut self, player: PlayerId, delta: f64) -> Option<(i32, i32)> {
        let value = self.values.get_mut(&player)?;
        let old = *value;
        *value = clamp(f64::from(old) + delta);
        Some((old, *value))
    }

    /// Current value; zero for unknown players.
    #[must_use]
    pub fn get(&self, player: PlayerId) -> i32 {
        self.values.get(&player).copied().unwrap_or(0)
    }

    /// Value after match setup.
    #[must_use]
    pub fn initial(&self, player: PlayerId) -> i32 {
        self.initial.get(&player).copied().unwrap_or(0)
    }

    /// Whether the player is registered.
    #[must_use]
    pub fn contains(&self, player: PlayerId) -> bool {
        self.values.contains_key(&player)
    }

    /// All values in player-id order.
    pub fn values(&self) -> impl Iterator<Item = (PlayerId, i32)> + '_ {
        self.values.iter().map(|(id, v)| (*id, *v))
    }

    /// Setup values in player-id order.
    pub fn initial_values(&self) -> impl Iterator<Item = (PlayerId, i32)> + '_ {
        self.initial.iter().map(|(id, v)| (*id, *v))
    }

    /// Base delta after the player's own temperament.
    fn scaled_delta(&self, t: &Temperament, event: ConfidenceEvent) -> f64 {
        let mut delta = event.base_delta();
        if delta < 0.0 && event.rattles() {
            delta *= 1.0 + ((t.volatility - 55.0) / 90.0).max(0.0);
        } else if delta > 0.0 && event.inspires() {
            delta *= 1.0 + ((t.drive - 60.0) / 120.0).max(0.0);
        }
        if delta < 0.0 && event.tests_resolve() {
            if t.mental < 45.0 {
                delta -= 4.0;
            } else if t.mental >= 70.0 {
                delta *= 0.5;
            }
        }
        if delta < 0.0 && t.mental_wall {
            delta *= 0.5;
        }
        delta
    }

    /// Apply an event to a player and spread it to teammates.
    ///
    /// `cushion` applies when the player is the active pitcher. Returns
    /// every change, the subject first. Unknown players yield nothing.
    pub fn adjust(
        &mut self,
        player: PlayerId,
        event: ConfidenceEvent,
        cushion: Option<BatteryCushion>,
        tuning: &Tuning,
    ) -> Vec<ConfidenceChange> {
        let Some(t) = self.temperaments.get(&player).copied() else {
            return Vec::new();
        };
        let mut delta = self.scaled_delta(&t, event);
        if let Some(cushion) = cushion {
            delta = cushion.scale(delta, t.volatility);
        }
        let mut changes = Vec::new();
        let Some((old, new)) = self.shift(player, delta) else {
            return changes;
        };
        if old == new {
            return changes;
        }
        changes.push(ConfidenceChange {
            player,
            side: t.side,
            reason: event,
            old,
            new,
        });
        if event.contagious() {
            self.propagate(player, t.side, new - old, event, tuning, &mut changes);
        }
        changes
    }

    fn propagate(
        &mut self,
        source: PlayerId,
        side: TeamSide,
        delta: i32,
        reason: ConfidenceEvent,
        tuning: &Tuning,
        changes: &mut Vec<ConfidenceChange>,
    ) {
        let target = f64::from(self.get(source));
        let mates: Vec<(PlayerId, Temperament)> = self
            .temperaments
            .iter()
            .filter(|(id, t)| **id != source && t.side == side)
            .map(|(id, t)| (*id, *t))
            .collect();
        for (mate, t) in mates {
            let old = self.get(mate);
            if delta > 0 && t.loyalty >= LOYAL_TEAMMATE {
                self.nudge_toward(mate, target, tuning.loyalty_pull);
            } else if delta < 0 && t.volatility >= VOLATILE_TEAMMATE {
                self.shift(mate, f64::from(delta) * tuning.volatility_drag);
            } else {
                continue;
            }
            let new = self.get(mate);
            if new != old {
                changes.push(ConfidenceChange {
                    player: mate,
                    side,
                    reason,
                    old,
                    new,
                });
            }
        }
    }

    /// A fielding error: the fielder takes the full hit, neighbours a lesser one.
    pub fn fielding_error(
        &mut self,
        fielder: PlayerId,
        neighbours: &[PlayerId],
        tuning: &Tuning,
    ) -> Vec<ConfidenceChange> {
        let mut changes = self.adjust(fielder, ConfidenceEvent::Error, None, tuning);
        for &mate in neighbours.iter().filter(|id| **id != fielder) {
            changes.extend(self.adjust(mate, ConfidenceEvent::ErrorNearby, None, tuning));
        }
        changes
    }

    /// Rally bonus for every lineup player on a side.
    pub fn rally(&mut self, lineup: &[PlayerId], tuning: &Tuning) -> Vec<ConfidenceChange> {
        lineup
            .iter()
            .flat_map(|id| self.adjust(*id, ConfidenceEvent::Rally, None, tuning))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fielding::{DefenseProfile, Shift};
    use crate::player::{Controller, Position};

    fn team(base: PlayerId) -> TeamSnapshot {
        let lineup: Vec<PlayerSnapshot> = Position::FIELD
            .iter()
            .enumerate()
            .map(|(i, pos)| PlayerSnapshot::league_average(base + i as u32, format!("P{i}"), *pos))
            .collect();
        TeamSnapshot {
            id: base,
            name: format!("Team {base}"),
            lineup,
            bullpen: Vec::new(),
            starting_pitcher: base,
            defense: DefenseProfile::default(),
            shift: Shift::None,
            controller: Controller::Ai,
        }
    }

    fn ledger() -> ConfidenceLedger {
        ConfidenceLedger::new(&team(100), &team(200), &TraitTable::default())
    }

    #[test]
    fn test_home_field_lifts_home() {
        let l = ledger();
        assert!(l.get(100) > l.get(200));
        assert_eq!(l.get(101) - l.get(201), 3);
    }

    #[test]
    fn test_base_confidence_from_personality() {
        let mut p = PlayerSnapshot::league_average(1, "A", Position::Catcher);
        assert_eq!(base_confidence(&p), 0);
        p.personality.drive = 80;
        assert_eq!(base_confidence(&p), 42);
        p.personality.slump = 100;
        assert!(base_confidence(&p) >= CONFIDENCE_MIN);
    }

    #[test]
    fn test_volatility_amplifies_strikeouts() {
        let mut home = team(100);
        home.lineup[3].personality.volatility = 100;
        let mut l = ConfidenceLedger::new(&home, &team(200), &TraitTable::default());
        let tuning = Tuning::default();
        let calm = l.adjust(104, ConfidenceEvent::StruckOut, None, &tuning);
        let jumpy = l.adjust(103, ConfidenceEvent::StruckOut, None, &tuning);
        assert!((jumpy[0].new - jumpy[0].old) < (calm[0].new - calm[0].old));
    }

    #[test]
    fn test_mental_fortitude_halves() {
        let mut home = team(100);
        home.lineup[3].personality.mental = 80;
        let mut l = ConfidenceLedger::new(&home, &team(200), &TraitTable::default());
        let change = l.adjust(103, ConfidenceEvent::HitAllowed, None, &Tuning::default());
        assert_eq!(change[0].new - change[0].old, -2);
    }

    #[test]
    fn test_loyal_teammates_pulled_up() {
        let mut home = team(100);
        home.lineup[5].personality.loyalty = 75;
        let mut l = ConfidenceLedger::new(&home, &team(200), &TraitTable::default());
        let before = l.get(105);
        let changes = l.adjust(101, ConfidenceEvent::HomeRun, None, &Tuning::default());
        assert_eq!(changes[0].player, 101);
        assert!(l.get(105) > before);
        assert!(changes.iter().all(|c| c.side == TeamSide::Home));
    }

    #[test]
    fn test_volatile_teammates_dragged() {
        let mut away = team(200);
        away.lineup[2].personality.volatility = 80;
        let mut l = ConfidenceLedger::new(&team(100), &away, &TraitTable::default());
        let before = l.get(202);
        l.adjust(205, ConfidenceEvent::StruckOut, None, &Tuning::default());
        assert!(l.get(202) < before);
    }

    #[test]
    fn test_unknown_player_is_noop() {
        let mut l = ledger();
        let snapshot: Vec<_> = l.values().collect();
        assert!(l
            .adjust(999, ConfidenceEvent::Ejection, None, &Tuning::default())
            .is_empty());
        assert_eq!(l.values().collect::<Vec<_>>(), snapshot);
    }

    #[test]
    fn test_fielding_error_hits_neighbours() {
        let mut l = ledger();
        let tuning = Tuning::default();
        let shortstop = 105;
        let changes = l.fielding_error(shortstop, &[103, 104], &tuning);
        assert_eq!(changes.len(), 3);
        assert_eq!(changes[0].new - changes[0].old, -18);
        assert!(changes[1..].iter().all(|c| c.reason == ConfidenceEvent::ErrorNearby));
    }

    #[test]
    fn test_cushion_softens_for_trusted_battery() {
        let cushion = BatteryCushion {
            catcher_loyalty: 90.0,
            trust: 90.0,
        };
        assert!(cushion.scale(-10.0, 50.0) > -10.0);
        assert!(cushion.scale(10.0, 50.0) > 10.0);
    }

    #[test]
    fn test_clamp_holds_under_repetition() {
        let mut l = ledger();
        let tuning = Tuning::default();
        for _ in 0..50 {
            l.adjust(102, ConfidenceEvent::Ejection, None, &tuning);
        }
        assert_eq!(l.get(102), CONFIDENCE_MIN);
        for _ in 0..50 {
            l.adjust(102, ConfidenceEvent::HomeRun, None, &tuning);
        }
        assert_eq!(l.get(102), CONFIDENCE_MAX);
    }
}
