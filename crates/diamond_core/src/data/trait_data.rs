//! Trait definitions and the requirement/condition interpreter.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::parse_ron;
use crate::context::SituationContext;
use crate::error::Result;
use crate::player::{PitcherRole, PlayerSnapshot, Position, Stat};

/// How a trait applies its effects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TraitKind {
    /// Always-on positive modifiers.
    PassiveBuff,
    /// Always-on negative (or mixed) modifiers.
    PassiveDebuff,
    /// Modifiers that apply only while the trait's condition holds.
    Situational,
}

/// Situational gate evaluated against a [`SituationContext`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Condition {
    /// No gate.
    #[default]
    Always,
    /// Late innings with a close score.
    LateInningPressure,
    /// Late-and-close or runners in scoring position.
    HighPressureMoment,
    /// Two strikes on the batter.
    TwoStrikeBattle,
    /// Runner on second or third.
    RunnersInScoringPosition,
    /// Runner on first with fewer than two outs.
    DoublePlaySituation,
    /// Batting side trails.
    TeamTrailing,
    /// Batter hits first in the order.
    LineupLeadoff,
    /// Batter hits fourth in the order.
    CleanupSpot,
}

impl Condition {
    /// Whether the condition holds in the given situation.
    #[must_use]
    pub fn holds(self, ctx: &SituationContext) -> bool {
        match self {
            Condition::Always => true,
            Condition::LateInningPressure => ctx.is_clutch(),
            Condition::HighPressureMoment => ctx.is_high_pressure(),
            Condition::TwoStrikeBattle => ctx.two_strikes(),
            Condition::RunnersInScoringPosition => ctx.risp,
            Condition::DoublePlaySituation => ctx.outs < 2 && ctx.runner_on_first,
            Condition::TeamTrailing => ctx.score_margin < 0,
            Condition::LineupLeadoff => ctx.lineup_slot == 1,
            Condition::CleanupSpot => ctx.lineup_slot == 4,
        }
    }
}

/// A single requirement a player must meet to benefit from a trait.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Requirement {
    /// Stat at or above `value`.
    Min {
        /// Stat tested.
        stat: Stat,
        /// Inclusive lower bound.
        value: f64,
    },
    /// Stat at or below `value`.
    Max {
        /// Stat tested.
        stat: Stat,
        /// Inclusive upper bound.
        value: f64,
    },
    /// Stat inside `[min, max]`.
    Between {
        /// Stat tested.
        stat: Stat,
        /// Inclusive lower bound.
        min: f64,
        /// Inclusive upper bound.
        max: f64,
    },
    /// Player fields this position.
    PositionIs(Position),
    /// Player fields any of these positions.
    PositionAny(Vec<Position>),
    /// Pitcher holds any of these staff roles.
    RoleAny(Vec<PitcherRole>),
}

impl Requirement {
    /// Evaluate the requirement against a player.
    #[must_use]
    pub fn is_met(&self, player: &PlayerSnapshot) -> bool {
        match self {
            Requirement::Min { stat, value } => player.stat(*stat) >= *value,
            Requirement::Max { stat, value } => player.stat(*stat) <= *value,
            Requirement::Between { stat, min, max } => {
                let v = player.stat(*stat);
                v >= *min && v <= *max
            }
            Requirement::PositionIs(position) => player.position == *position,
            Requirement::PositionAny(positions) => positions.contains(&player.position),
            Requirement::RoleAny(roles) => roles.contains(&player.pitching.role),
        }
    }
}

/// Additive stat modifier.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StatDelta {
    /// Stat modified.
    pub stat: Stat,
    /// Amount added.
    pub delta: f64,
}

/// Roll families a trait can bias.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RollKind {
    /// Fatigue penalty scale.
    Fatigue,
    /// Injury probability.
    Injury,
    /// Fielding and throwing error probability.
    Error,
}

/// Additive roll modifier.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RollDelta {
    /// Roll family.
    pub roll: RollKind,
    /// Amount added (probability or scale units).
    pub delta: f64,
}

/// Behavioural switches the engine checks by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TraitFlag {
    /// Negative confidence swings are halved.
    MentalWall,
    /// Volatility counts as at most 55 for confidence amplification.
    ControlFreak,
    /// Bunts make contact more reliably.
    BuntMaster,
    /// Better jumps on steals.
    SpeedDemon,
}

/// One data-driven trait.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraitDef {
    /// Lookup key, matched against `PlayerSnapshot::skills`.
    pub key: String,
    /// Display name.
    pub name: String,
    /// Flavour text.
    #[serde(default)]
    pub description: String,
    /// Application mode.
    pub kind: TraitKind,
    /// Gate for situational traits.
    #[serde(default)]
    pub condition: Condition,
    /// Every requirement must hold.
    #[serde(default)]
    pub requirements: Vec<Requirement>,
    /// Stat modifiers.
    #[serde(default)]
    pub modifiers: Vec<StatDelta>,
    /// Roll modifiers.
    #[serde(default)]
    pub roll_modifiers: Vec<RollDelta>,
    /// Behaviour switches.
    #[serde(default)]
    pub flags: Vec<TraitFlag>,
}

impl TraitDef {
    /// Whether the player meets every requirement.
    #[must_use]
    pub fn requirements_met(&self, player: &PlayerSnapshot) -> bool {
        self.requirements.iter().all(|r| r.is_met(player))
    }

    /// Whether the trait's effects apply right now.
    ///
    /// Passive traits ignore the situation. With no situation available,
    /// situational traits are treated as dormant.
    #[must_use]
    pub fn applies(&self, ctx: Option<&SituationContext>) -> bool {
        match self.kind {
            TraitKind::PassiveBuff | TraitKind::PassiveDebuff => true,
            TraitKind::Situational => ctx.is_some_and(|c| self.condition.holds(c)),
        }
    }
}

/// Immutable trait lookup table.
///
/// # Example
///
/// ```
/// use diamond_core::data::TraitTable;
/// use diamond_core::player::{PlayerSnapshot, Position, Stat};
///
/// let table = TraitTable::from_ron(r#"TraitTable(traits: [
///     TraitDef(key: "slugger", name: "Slugger", kind: PassiveBuff,
///              requirements: [Min(stat: Power, value: 60.0)],
///              modifiers: [(stat: Power, delta: 5.0)]),
/// ])"#).unwrap();
///
/// let mut player = PlayerSnapshot::league_average(1, "Ito", Position::FirstBase)
///     .with_skill("slugger");
/// assert_eq!(table.effective_stat(&player, Stat::Power, None), 50.0);
///
/// player.batting.power = 70;
/// assert_eq!(table.effective_stat(&player, Stat::Power, None), 75.0);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TraitTable {
    /// All definitions.
    pub traits: Vec<TraitDef>,
}

impl TraitTable {
    /// Parse a table from RON.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::SimError::DataParse`] on malformed input.
    pub fn from_ron(text: &str) -> Result<Self> {
        parse_ron("traits", text)
    }

    /// Look up a definition by key.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&TraitDef> {
        self.traits.iter().find(|t| t.key.eq_ignore_ascii_case(key))
    }

    /// Traits the player holds and qualifies for, in table order.
    pub fn active_for<'a>(
        &'a self,
        player: &'a PlayerSnapshot,
    ) -> impl Iterator<Item = &'a TraitDef> + 'a {
        self.traits.iter().filter(move |def| {
            player
                .skills
                .iter()
                .any(|s| s.eq_ignore_ascii_case(&def.key))
                && def.requirements_met(player)
        })
    }

    /// Raw stat plus every applicable trait modifier.
    #[must_use]
    pub fn effective_stat(
        &self,
        player: &PlayerSnapshot,
        stat: Stat,
        ctx: Option<&SituationContext>,
    ) -> f64 {
        let bonus: f64 = self
            .active_for(player)
            .filter(|def| def.applies(ctx))
            .flat_map(|def| def.modifiers.iter())
            .filter(|m| m.stat == stat)
            .map(|m| m.delta)
            .sum();
        player.stat(stat) + bonus
    }

    /// Sum of applicable roll modifiers of one kind.
    #[must_use]
    pub fn roll_modifier(
        &self,
        player: &PlayerSnapshot,
        roll: RollKind,
        ctx: Option<&SituationContext>,
    ) -> f64 {
        self.active_for(player)
            .filter(|def| def.applies(ctx))
            .flat_map(|def| def.roll_modifiers.iter())
            .filter(|m| m.roll == roll)
            .map(|m| m.delta)
            .sum()
    }

    /// Whether any held trait grants the flag, regardless of situation.
    #[must_use]
    pub fn has_flag(&self, player: &PlayerSnapshot, flag: TraitFlag) -> bool {
        self.active_for(player).any(|def| def.flags.contains(&flag))
    }

    /// Duplicate keys and empty names.
    pub(crate) fn validate(&self) -> Vec<String> {
        let mut issues = Vec::new();
        let mut seen = BTreeSet::new();
        for def in &self.traits {
            let key = def.key.to_ascii_lowercase();
            if key.is_empty() {
                issues.push(format!("trait '{}' has an empty key", def.name));
            }
            if !seen.insert(key) {
                issues.push(format!("trait key '{}' is defined twice", def.key));
            }
            if def.kind != TraitKind::Situational && def.condition != Condition::Always {
                issues.push(format!(
                    "trait '{}' is passive but declares condition {:?}",
                    def.key, def.condition
                ));
            }
        }
        issues
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::player::TeamSide;

    fn table() -> TraitTable {
        TraitTable::from_ron(include_str!("../../data/traits.ron")).unwrap()
    }

    fn clutch_ctx() -> SituationContext {
        SituationContext {
            inning: 8,
            batting: TeamSide::Home,
            outs: 1,
            balls: 1,
            strikes: 1,
            score_margin: -1,
            runner_on_first: false,
            risp: true,
            bases_loaded: false,
            lineup_slot: 4,
            late: true,
            close: true,
        }
    }

    fn clutch_hitter() -> PlayerSnapshot {
        let mut p = PlayerSnapshot::league_average(7, "Kato", Position::LeftField)
            .with_skill("clutch_hitter");
        p.batting.contact = 60;
        p.batting.power = 60;
        p.batting.clutch = 80;
        p
    }

    #[test]
    fn test_unlisted_trait_never_applies() {
        let t = table();
        let mut p = clutch_hitter();
        p.skills.clear();
        assert_eq!(t.effective_stat(&p, Stat::Contact, Some(&clutch_ctx())), 60.0);
    }

    #[test]
    fn test_situational_trait_gated_by_condition() {
        let t = table();
        let p = clutch_hitter();
        assert_eq!(t.effective_stat(&p, Stat::Contact, Some(&clutch_ctx())), 72.0);

        let mut early = clutch_ctx();
        early.inning = 3;
        early.late = false;
        assert_eq!(t.effective_stat(&p, Stat::Contact, Some(&early)), 60.0);
        assert_eq!(t.effective_stat(&p, Stat::Contact, None), 60.0);
    }

    #[test]
    fn test_requirements_block_unqualified_holder() {
        let t = table();
        let mut p = clutch_hitter();
        p.batting.clutch = 40;
        assert_eq!(t.effective_stat(&p, Stat::Power, Some(&clutch_ctx())), 60.0);
    }

    #[test]
    fn test_position_and_role_requirements() {
        let t = table();
        let mut closer = PlayerSnapshot::league_average(1, "Sasaki", Position::Pitcher)
            .with_skill("shutdown_closer");
        closer.batting.clutch = 75;
        closer.personality.volatility = 30;
        assert_eq!(t.effective_stat(&closer, Stat::Control, Some(&clutch_ctx())), 50.0);

        closer.pitching.role = PitcherRole::Closer;
        assert_eq!(t.effective_stat(&closer, Stat::Control, Some(&clutch_ctx())), 56.0);

        closer.position = Position::FirstBase;
        assert_eq!(t.effective_stat(&closer, Stat::Control, Some(&clutch_ctx())), 50.0);
    }

    #[test]
    fn test_roll_modifiers_and_flags() {
        let t = table();
        let mut p = PlayerSnapshot::league_average(2, "Ono", Position::Pitcher)
            .with_skill("workhorse")
            .with_skill("mental_wall");
        p.pitching.stamina = 70;
        assert!((t.roll_modifier(&p, RollKind::Fatigue, None) + 0.2).abs() < 1e-9);
        assert!(!t.has_flag(&p, TraitFlag::MentalWall));

        p.personality.mental = 80;
        p.batting.discipline = 70;
        p.personality.volatility = 20;
        assert!(t.has_flag(&p, TraitFlag::MentalWall));
    }

    #[test]
    fn test_duplicate_keys_reported() {
        let mut t = table();
        let dup = t.traits[0].clone();
        t.traits.push(dup);
        assert_eq!(t.validate().len(), 1);
    }
}
