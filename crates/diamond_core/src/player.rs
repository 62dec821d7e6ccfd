//! Player and team snapshots.
//!
//! Rosters arrive from the persistence collaborator and are frozen into
//! fully populated value types at match setup. Every rating has a
//! documented default, so the engine never probes for optional fields
//! while a match is running.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SimError};
use crate::fielding::{DefenseProfile, Shift};

/// Stable player identifier supplied by the roster collaborator.
pub type PlayerId = u32;

/// Stable team identifier supplied by the roster collaborator.
pub type TeamId = u32;

/// Number of batters in a lineup.
pub const LINEUP_SIZE: usize = 9;

/// Fielding position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Position {
    /// Pitcher.
    Pitcher,
    /// Catcher.
    Catcher,
    /// First base.
    FirstBase,
    /// Second base.
    SecondBase,
    /// Third base.
    ThirdBase,
    /// Shortstop.
    Shortstop,
    /// Left field.
    LeftField,
    /// Center field.
    CenterField,
    /// Right field.
    RightField,
    /// Designated hitter (bats, does not field).
    DesignatedHitter,
}

impl Position {
    /// The nine defensive positions in scorebook order.
    pub const FIELD: [Position; 9] = [
        Position::Pitcher,
        Position::Catcher,
        Position::FirstBase,
        Position::SecondBase,
        Position::ThirdBase,
        Position::Shortstop,
        Position::LeftField,
        Position::CenterField,
        Position::RightField,
    ];

    /// Scorebook abbreviation.
    #[must_use]
    pub const fn abbreviation(self) -> &'static str {
        match self {
            Position::Pitcher => "P",
            Position::Catcher => "C",
            Position::FirstBase => "1B",
            Position::SecondBase => "2B",
            Position::ThirdBase => "3B",
            Position::Shortstop => "SS",
            Position::LeftField => "LF",
            Position::CenterField => "CF",
            Position::RightField => "RF",
            Position::DesignatedHitter => "DH",
        }
    }

    /// Whether this is an infield position (pitcher and catcher excluded).
    #[must_use]
    pub const fn is_infield(self) -> bool {
        matches!(
            self,
            Position::FirstBase | Position::SecondBase | Position::ThirdBase | Position::Shortstop
        )
    }

    /// Whether this is an outfield position.
    #[must_use]
    pub const fn is_outfield(self) -> bool {
        matches!(
            self,
            Position::LeftField | Position::CenterField | Position::RightField
        )
    }

    /// Neighbouring positions that feel the sting of this fielder's error.
    #[must_use]
    pub const fn adjacent(self) -> &'static [Position] {
        match self {
            Position::Pitcher => &[Position::Catcher],
            Position::Catcher => &[Position::Pitcher],
            Position::FirstBase => &[Position::SecondBase],
            Position::SecondBase => &[Position::FirstBase, Position::Shortstop],
            Position::Shortstop => &[Position::SecondBase, Position::ThirdBase],
            Position::ThirdBase => &[Position::Shortstop],
            Position::LeftField => &[Position::CenterField],
            Position::CenterField => &[Position::LeftField, Position::RightField],
            Position::RightField => &[Position::CenterField],
            Position::DesignatedHitter => &[],
        }
    }
}

/// Pitcher delivery arm slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ArmSlot {
    /// Over the top: more vertical break.
    Overhand,
    /// Balanced slot.
    #[default]
    ThreeQuarters,
    /// Low slot with heavy lateral break.
    Sidearm,
    /// Underhand release with extreme lateral action.
    Submarine,
}

/// Every pitch type the physics layer understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PitchKind {
    /// Four-seam fastball.
    FourSeam,
    /// Two-seam fastball.
    TwoSeam,
    /// Shuuto.
    Shuuto,
    /// Cutter.
    Cutter,
    /// Slider.
    Slider,
    /// Curveball.
    Curveball,
    /// Slow curve.
    SlowCurve,
    /// Slurve.
    Slurve,
    /// Forkball.
    Forkball,
    /// Splitter.
    Splitter,
    /// Sinker.
    Sinker,
    /// Changeup.
    Changeup,
    /// Circle change.
    CircleChange,
    /// Knuckleball.
    Knuckleball,
}

impl PitchKind {
    /// Display name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            PitchKind::FourSeam => "4-Seam Fastball",
            PitchKind::TwoSeam => "2-Seam Fastball",
            PitchKind::Shuuto => "Shuuto",
            PitchKind::Cutter => "Cutter",
            PitchKind::Slider => "Slider",
            PitchKind::Curveball => "Curveball",
            PitchKind::SlowCurve => "Slow Curve",
            PitchKind::Slurve => "Slurve",
            PitchKind::Forkball => "Forkball",
            PitchKind::Splitter => "Splitter",
            PitchKind::Sinker => "Sinker",
            PitchKind::Changeup => "Changeup",
            PitchKind::CircleChange => "Circle Change",
            PitchKind::Knuckleball => "Knuckleball",
        }
    }

    /// Whether the pitch belongs to the fastball family.
    #[must_use]
    pub const fn is_fastball(self) -> bool {
        matches!(
            self,
            PitchKind::FourSeam | PitchKind::TwoSeam | PitchKind::Shuuto | PitchKind::Cutter
        )
    }
}

/// One pitch in a pitcher's repertoire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PitchGrip {
    /// Pitch type.
    pub kind: PitchKind,
    /// Command quality of this pitch (0-100).
    pub quality: u8,
    /// Break level (0-100) before arm-slot scaling.
    pub break_level: u8,
}

impl PitchGrip {
    /// Create a new grip.
    #[must_use]
    pub const fn new(kind: PitchKind, quality: u8, break_level: u8) -> Self {
        Self {
            kind,
            quality,
            break_level,
        }
    }

    /// Fallback repertoire for pitchers whose arsenal is empty.
    #[must_use]
    pub fn default_repertoire() -> Vec<PitchGrip> {
        vec![
            PitchGrip::new(PitchKind::FourSeam, 40, 10),
            PitchGrip::new(PitchKind::Slider, 30, 40),
        ]
    }
}

/// How a pitcher reacts to the catcher's signs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum PitcherPersonality {
    /// Shakes off often and barely listens to trust.
    Stubborn,
    /// Balanced.
    #[default]
    Confident,
    /// Rarely shakes, leans on the catcher.
    Nervous,
    /// Nearly always agrees.
    Agreeable,
}

impl PitcherPersonality {
    /// Base shake-off probability.
    #[must_use]
    pub const fn shake_probability(self) -> f64 {
        match self {
            PitcherPersonality::Stubborn => 0.5,
            PitcherPersonality::Confident => 0.3,
            PitcherPersonality::Nervous => 0.1,
            PitcherPersonality::Agreeable => 0.05,
        }
    }

    /// How strongly trust in the catcher suppresses shaking.
    #[must_use]
    pub const fn trust_factor(self) -> f64 {
        match self {
            PitcherPersonality::Stubborn => 0.2,
            PitcherPersonality::Confident => 0.4,
            PitcherPersonality::Nervous => 0.8,
            PitcherPersonality::Agreeable => 0.9,
        }
    }
}

/// Pitching staff role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum PitcherRole {
    /// Starting pitcher.
    #[default]
    Starter,
    /// Middle reliever.
    Reliever,
    /// Closer.
    Closer,
}

/// Batting ratings (0-100).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BattingRatings {
    /// Bat-to-ball skill.
    pub contact: u8,
    /// Raw power.
    pub power: u8,
    /// Pitch recognition.
    pub eye: u8,
    /// Plate discipline.
    pub discipline: u8,
    /// Running speed.
    pub speed: u8,
    /// Performance under pressure.
    pub clutch: u8,
}

impl Default for BattingRatings {
    fn default() -> Self {
        Self {
            contact: 50,
            power: 50,
            eye: 50,
            discipline: 50,
            speed: 50,
            clutch: 50,
        }
    }
}

/// Fielding ratings (0-100).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldingRatings {
    /// Glove work, range and reliability.
    pub fielding: u8,
    /// Arm strength and accuracy.
    pub throwing: u8,
    /// Game-calling and framing presence (matters for catchers).
    pub leadership: u8,
}

impl Default for FieldingRatings {
    fn default() -> Self {
        Self {
            fielding: 50,
            throwing: 50,
            leadership: 50,
        }
    }
}

/// Pitching ratings.
///
/// Position players carry the defaults; they only matter if a position
/// player is forced onto the mound.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PitchingRatings {
    /// Top fastball velocity in km/h.
    pub velocity_kmh: u16,
    /// Command (0-100).
    pub control: u8,
    /// Endurance (0-100).
    pub stamina: u8,
    /// Pickoff move (0-100).
    pub pickoff: u8,
    /// Fielding athleticism off the mound (0-100).
    pub athleticism: u8,
    /// Delivery arm slot.
    pub arm_slot: ArmSlot,
    /// Repertoire. Empty means the default fastball/slider pair.
    pub arsenal: Vec<PitchGrip>,
    /// Sign-calling temperament.
    pub personality: PitcherPersonality,
    /// Staff role.
    pub role: PitcherRole,
}

impl Default for PitchingRatings {
    fn default() -> Self {
        Self {
            velocity_kmh: 130,
            control: 50,
            stamina: 50,
            pickoff: 50,
            athleticism: 50,
            arm_slot: ArmSlot::ThreeQuarters,
            arsenal: Vec::new(),
            personality: PitcherPersonality::Confident,
            role: PitcherRole::Starter,
        }
    }
}

/// Personality traits that drive confidence and psychology (0-100).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Personality {
    /// Ambition; amplifies positive swings.
    pub drive: u8,
    /// Current morale.
    pub morale: u8,
    /// Attachment to teammates; pulls toward their good moments.
    pub loyalty: u8,
    /// Emotional volatility; amplifies negative swings.
    pub volatility: u8,
    /// Mental fortitude.
    pub mental: u8,
    /// Baserunning awareness.
    pub awareness: u8,
    /// Current slump depth (0 = none).
    pub slump: u8,
    /// Team captain.
    pub captain: bool,
}

impl Default for Personality {
    fn default() -> Self {
        Self {
            drive: 50,
            morale: 60,
            loyalty: 50,
            volatility: 50,
            mental: 50,
            awareness: 50,
            slump: 0,
            captain: false,
        }
    }
}

/// Rateable attributes addressable by the trait interpreter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Stat {
    /// Batting contact.
    Contact,
    /// Batting power.
    Power,
    /// Batting eye.
    Eye,
    /// Plate discipline.
    Discipline,
    /// Running speed.
    Speed,
    /// Clutch.
    Clutch,
    /// Fielding.
    Fielding,
    /// Throwing.
    Throwing,
    /// Catcher leadership.
    Leadership,
    /// Pitch velocity (km/h).
    Velocity,
    /// Pitching control.
    Control,
    /// Pitching stamina.
    Stamina,
    /// Pickoff move.
    Pickoff,
    /// Pitcher athleticism.
    Athleticism,
    /// Drive.
    Drive,
    /// Morale.
    Morale,
    /// Loyalty.
    Loyalty,
    /// Volatility.
    Volatility,
    /// Mental fortitude.
    Mental,
    /// Baserunning awareness.
    Awareness,
}

/// Whether the AI or a human makes a team's choices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Controller {
    /// Engine AI decides.
    #[default]
    Ai,
    /// Choices are requested from the human-input collaborator.
    Human,
}

/// Immutable-for-the-match player record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerSnapshot {
    /// Stable identifier.
    pub id: PlayerId,
    /// Display name.
    pub name: String,
    /// Primary fielding position for this match.
    pub position: Position,
    /// Batting ratings.
    pub batting: BattingRatings,
    /// Fielding ratings.
    pub fielding: FieldingRatings,
    /// Pitching ratings.
    pub pitching: PitchingRatings,
    /// Personality.
    pub personality: Personality,
    /// Skill keys granted by progression, resolved against the trait table.
    pub skills: Vec<String>,
}

impl PlayerSnapshot {
    /// A league-average player at the given position.
    #[must_use]
    pub fn league_average(id: PlayerId, name: impl Into<String>, position: Position) -> Self {
        Self {
            id,
            name: name.into(),
            position,
            batting: BattingRatings::default(),
            fielding: FieldingRatings::default(),
            pitching: PitchingRatings::default(),
            personality: Personality::default(),
            skills: Vec::new(),
        }
    }

    /// Builder: replace batting ratings.
    #[must_use]
    pub fn with_batting(mut self, batting: BattingRatings) -> Self {
        self.batting = batting;
        self
    }

    /// Builder: replace fielding ratings.
    #[must_use]
    pub fn with_fielding(mut self, fielding: FieldingRatings) -> Self {
        self.fielding = fielding;
        self
    }

    /// Builder: replace pitching ratings.
    #[must_use]
    pub fn with_pitching(mut self, pitching: PitchingRatings) -> Self {
        self.pitching = pitching;
        self
    }

    /// Builder: replace personality.
    #[must_use]
    pub fn with_personality(mut self, personality: Personality) -> Self {
        self.personality = personality;
        self
    }

    /// Builder: add a skill key.
    #[must_use]
    pub fn with_skill(mut self, key: impl Into<String>) -> Self {
        self.skills.push(key.into());
        self
    }

    /// Raw rating for the trait interpreter and the physics layers.
    #[must_use]
    pub fn stat(&self, stat: Stat) -> f64 {
        let raw = match stat {
            Stat::Contact => self.batting.contact,
            Stat::Power => self.batting.power,
            Stat::Eye => self.batting.eye,
            Stat::Discipline => self.batting.discipline,
            Stat::Speed => self.batting.speed,
            Stat::Clutch => self.batting.clutch,
            Stat::Fielding => self.fielding.fielding,
            Stat::Throwing => self.fielding.throwing,
            Stat::Leadership => self.fielding.leadership,
            Stat::Velocity => return f64::from(self.pitching.velocity_kmh),
            Stat::Control => self.pitching.control,
            Stat::Stamina => self.pitching.stamina,
            Stat::Pickoff => self.pitching.pickoff,
            Stat::Athleticism => self.pitching.athleticism,
            Stat::Drive => self.personality.drive,
            Stat::Morale => self.personality.morale,
            Stat::Loyalty => self.personality.loyalty,
            Stat::Volatility => self.personality.volatility,
            Stat::Mental => self.personality.mental,
            Stat::Awareness => self.personality.awareness,
        };
        f64::from(raw)
    }

    /// Arsenal with the default repertoire substituted when empty.
    #[must_use]
    pub fn repertoire(&self) -> Vec<PitchGrip> {
        if self.pitching.arsenal.is_empty() {
            PitchGrip::default_repertoire()
        } else {
            self.pitching.arsenal.clone()
        }
    }
}

/// Which side of the scoreboard a team occupies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TeamSide {
    /// Visiting team, bats in the top half.
    Away,
    /// Home team, bats in the bottom half.
    Home,
}

impl TeamSide {
    /// The other side.
    #[must_use]
    pub const fn opponent(self) -> Self {
        match self {
            TeamSide::Away => TeamSide::Home,
            TeamSide::Home => TeamSide::Away,
        }
    }

    /// Index for two-element per-side arrays.
    #[must_use]
    pub const fn index(self) -> usize {
        match self {
            TeamSide::Away => 0,
            TeamSide::Home => 1,
        }
    }
}

/// A team's match-day roster.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeamSnapshot {
    /// Stable identifier.
    pub id: TeamId,
    /// Display name.
    pub name: String,
    /// Batting order; exactly nine players.
    pub lineup: Vec<PlayerSnapshot>,
    /// Relief pitchers available for a pitching change.
    pub bullpen: Vec<PlayerSnapshot>,
    /// Starting pitcher; must appear in the lineup.
    pub starting_pitcher: PlayerId,
    /// Team-level defensive tendencies.
    pub defense: DefenseProfile,
    /// Live defensive shift.
    pub shift: Shift,
    /// Who makes this team's choices.
    pub controller: Controller,
}

impl TeamSnapshot {
    /// Validate the roster before a match starts.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::InvalidRoster`] when the lineup is not nine
    /// players, player ids repeat, or the starting pitcher is missing.
    pub fn validate(&self) -> Result<()> {
        let invalid = |reason: String| SimError::InvalidRoster {
            team: self.name.clone(),
            reason,
        };

        if self.lineup.len() != LINEUP_SIZE {
            return Err(invalid(format!(
                "lineup has {} players, expected {}",
                self.lineup.len(),
                LINEUP_SIZE
            )));
        }

        let mut seen = HashSet::new();
        for player in self.lineup.iter().chain(self.bullpen.iter()) {
            if !seen.insert(player.id) {
                return Err(invalid(format!("player id {} appears twice", player.id)));
            }
        }

        if !self.lineup.iter().any(|p| p.id == self.starting_pitcher) {
            return Err(invalid(format!(
                "starting pitcher {} is not in the lineup",
                self.starting_pitcher
            )));
        }

        Ok(())
    }

    /// Look up any rostered player (lineup or bullpen).
    #[must_use]
    pub fn player(&self, id: PlayerId) -> Option<&PlayerSnapshot> {
        self.lineup
            .iter()
            .chain(self.bullpen.iter())
            .find(|p| p.id == id)
    }

    /// Whether the player belongs to this roster.
    #[must_use]
    pub fn contains(&self, id: PlayerId) -> bool {
        self.player(id).is_some()
    }

    /// All rostered players, lineup first.
    pub fn players(&self) -> impl Iterator<Item = &PlayerSnapshot> {
        self.lineup.iter().chain(self.bullpen.iter())
    }

    /// The catcher, falling back to the first lineup slot.
    #[must_use]
    pub fn catcher(&self) -> Option<&PlayerSnapshot> {
        self.lineup
            .iter()
            .find(|p| p.position == Position::Catcher)
            .or_else(|| self.lineup.first())
    }

    /// The lineup player assigned to a fielding position.
    #[must_use]
    pub fn fielder_at(&self, position: Position) -> Option<&PlayerSnapshot> {
        self.lineup.iter().find(|p| p.position == position)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nine() -> Vec<PlayerSnapshot> {
        Position::FIELD
            .iter()
            .enumerate()
            .map(|(i, pos)| PlayerSnapshot::league_average(i as PlayerId + 1, format!("P{i}"), *pos))
            .collect()
    }

    fn team() -> TeamSnapshot {
        TeamSnapshot {
            id: 1,
            name: "Test".into(),
            lineup: nine(),
            bullpen: vec![PlayerSnapshot::league_average(
                50,
                "Relief",
                Position::Pitcher,
            )],
            starting_pitcher: 1,
            defense: DefenseProfile::default(),
            shift: Shift::None,
            controller: Controller::Ai,
        }
    }

    #[test]
    fn test_valid_roster() {
        assert!(team().validate().is_ok());
    }

    #[test]
    fn test_short_lineup_rejected() {
        let mut t = team();
        t.lineup.pop();
        assert!(matches!(t.validate(), Err(SimError::InvalidRoster { .. })));
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let mut t = team();
        t.bullpen[0].id = 3;
        assert!(t.validate().is_err());
    }

    #[test]
    fn test_missing_starter_rejected() {
        let mut t = team();
        t.starting_pitcher = 50;
        assert!(t.validate().is_err());
    }

    #[test]
    fn test_catcher_fallback_to_first_slot() {
        let mut t = team();
        t.lineup[1].position = Position::DesignatedHitter;
        assert_eq!(t.catcher().map(|p| p.id), Some(1));
    }

    #[test]
    fn test_empty_arsenal_uses_default() {
        let p = PlayerSnapshot::league_average(1, "Ace", Position::Pitcher);
        let rep = p.repertoire();
        assert_eq!(rep.len(), 2);
        assert_eq!(rep[0].kind, PitchKind::FourSeam);
    }

    #[test]
    fn test_stat_lookup() {
        let p = PlayerSnapshot::league_average(1, "Ace", Position::Pitcher);
        assert_eq!(p.stat(Stat::Velocity), 130.0);
        assert_eq!(p.stat(Stat::Morale), 60.0);
    }
}
