//! Scenario loading and configuration.
//!
//! A scenario names the two rosters, the rules, and optionally the plate
//! umpire and weather for headless runs. Seeds are not part of a
//! scenario; the runner supplies them so one scenario can drive a batch.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use diamond_core::config::MatchConfig;
use diamond_core::controller::MatchSetup;
use diamond_core::error::SimError;
use diamond_core::fielding::{DefenseProfile, Shift};
use diamond_core::player::{
    ArmSlot, BattingRatings, Controller, FieldingRatings, PitchGrip, PitchKind,
    PitcherPersonality, PitcherRole, PitchingRatings, PlayerId, PlayerSnapshot, Position,
    TeamId, TeamSnapshot,
};

/// Error type for scenario operations.
#[derive(Error, Debug)]
pub enum ScenarioError {
    /// File not found.
    #[error("Scenario file not found: {0}")]
    FileNotFound(String),
    /// Failed to read or write the file.
    #[error("Failed to read scenario file: {0}")]
    ReadError(#[from] std::io::Error),
    /// Failed to parse RON.
    #[error("Failed to parse scenario: {0}")]
    ParseError(#[from] ron::error::SpannedError),
    /// Failed to write RON.
    #[error("Failed to encode scenario: {0}")]
    EncodeError(#[from] ron::Error),
    /// Rosters or rules rejected by the simulation.
    #[error("Invalid scenario: {0}")]
    Invalid(#[from] SimError),
}

/// A complete scenario configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    /// Scenario name.
    pub name: String,
    /// Human-readable description.
    #[serde(default)]
    pub description: String,
    /// Home roster.
    pub home: TeamSnapshot,
    /// Visiting roster.
    pub away: TeamSnapshot,
    /// Plate umpire key; drawn per match when absent.
    #[serde(default)]
    pub umpire: Option<String>,
    /// Weather key; drawn per match when absent.
    #[serde(default)]
    pub weather: Option<String>,
    /// Rules.
    #[serde(default)]
    pub config: MatchConfig,
}

impl Default for Scenario {
    fn default() -> Self {
        Self::exhibition()
    }
}

impl Scenario {
    /// Load a scenario from a RON file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ScenarioError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ScenarioError::FileNotFound(path.display().to_string()));
        }
        let contents = std::fs::read_to_string(path)?;
        Self::from_ron_str(&contents)
    }

    /// Load from a RON string.
    pub fn from_ron_str(ron: &str) -> Result<Self, ScenarioError> {
        let scenario: Scenario = ron::from_str(ron)?;
        Ok(scenario)
    }

    /// Encode as pretty RON.
    pub fn to_ron_string(&self) -> Result<String, ScenarioError> {
        Ok(ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())?)
    }

    /// Write the scenario as RON, creating parent directories.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), ScenarioError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, self.to_ron_string()?)?;
        Ok(())
    }

    /// Match setup for one seed.
    #[must_use]
    pub fn to_setup(&self, seed: u64) -> MatchSetup {
        MatchSetup {
            home: self.home.clone(),
            away: self.away.clone(),
            config: self.config.clone(),
            seed,
            umpire: self.umpire.clone(),
            weather: self.weather.clone(),
        }
    }

    /// Check rosters and rules without playing.
    pub fn validate(&self) -> Result<(), ScenarioError> {
        self.to_setup(0).validate()?;
        Ok(())
    }

    /// Two hand-built clubs with distinct strengths: a contact-and-speed
    /// home side against a power-hitting visitor.
    #[must_use]
    pub fn exhibition() -> Self {
        Self {
            name: "Exhibition".to_string(),
            description: "Harbor Cranes host the Valley Comets under default rules".to_string(),
            home: cranes(),
            away: comets(),
            umpire: None,
            weather: None,
            config: MatchConfig::default(),
        }
    }
}

/// (name, position, contact, power, eye, speed, fielding, throwing)
type Line = (&'static str, Position, u8, u8, u8, u8, u8, u8);

fn club(
    id: TeamId,
    name: &str,
    base: PlayerId,
    lines: &[Line; 9],
    ace: PitchingRatings,
    bullpen: Vec<PlayerSnapshot>,
) -> TeamSnapshot {
    let lineup: Vec<PlayerSnapshot> = lines
        .iter()
        .zip(base..)
        .map(|(&(who, pos, contact, power, eye, speed, fielding, throwing), id)| {
            let mut player = PlayerSnapshot::league_average(id, who, pos)
                .with_batting(BattingRatings {
                    contact,
                    power,
                    eye,
                    discipline: eye,
                    speed,
                    clutch: 50,
                })
                .with_fielding(FieldingRatings {
                    fielding,
                    throwing,
                    leadership: if pos == Position::Catcher { 70 } else { 50 },
                });
            if pos == Position::Pitcher {
                player = player.with_pitching(ace.clone());
            }
            player
        })
        .collect();
    TeamSnapshot {
        id,
        name: name.to_string(),
        starting_pitcher: lineup
            .iter()
            .find(|p| p.position == Position::Pitcher)
            .map_or(base, |p| p.id),
        lineup,
        bullpen,
        defense: DefenseProfile::default(),
        shift: Shift::None,
        controller: Controller::Ai,
    }
}

fn arm(
    velocity_kmh: u16,
    control: u8,
    stamina: u8,
    arm_slot: ArmSlot,
    personality: PitcherPersonality,
    role: PitcherRole,
    arsenal: Vec<PitchGrip>,
) -> PitchingRatings {
    PitchingRatings {
        velocity_kmh,
        control,
        stamina,
        arm_slot,
        arsenal,
        personality,
        role,
        ..PitchingRatings::default()
    }
}

fn reliever(id: PlayerId, name: &str, ratings: PitchingRatings) -> PlayerSnapshot {
    PlayerSnapshot::league_average(id, name, Position::Pitcher).with_pitching(ratings)
}

fn cranes() -> TeamSnapshot {
    let lines: [Line; 9] = [
        ("Ren Aoki", Position::CenterField, 68, 40, 62, 78, 66, 55),
        ("Daichi Kondo", Position::SecondBase, 64, 38, 58, 66, 70, 60),
        ("Kenji Mori", Position::RightField, 60, 58, 52, 52, 55, 68),
        ("Sho Yamada", Position::FirstBase, 58, 66, 55, 40, 52, 50),
        ("Yuto Hayashi", Position::ThirdBase, 55, 55, 48, 45, 60, 66),
        ("Takumi Ono", Position::LeftField, 57, 45, 50, 60, 54, 52),
        ("Haruto Ishii", Position::Shortstop, 52, 35, 47, 64, 72, 70),
        ("Kaito Fujita", Position::Catcher, 48, 42, 50, 35, 62, 64),
        ("Masato Okada", Position::Pitcher, 30, 20, 30, 40, 50, 60),
    ];
    let ace = arm(
        146,
        64,
        70,
        ArmSlot::ThreeQuarters,
        PitcherPersonality::Confident,
        PitcherRole::Starter,
        vec![
            PitchGrip::new(PitchKind::FourSeam, 60, 10),
            PitchGrip::new(PitchKind::Slider, 55, 45),
            PitchGrip::new(PitchKind::Forkball, 50, 55),
        ],
    );
    let bullpen = vec![
        reliever(
            110,
            "Yuki Sano",
            arm(141, 58, 45, ArmSlot::Sidearm, PitcherPersonality::Agreeable, PitcherRole::Reliever, vec![
                PitchGrip::new(PitchKind::Sinker, 55, 30),
                PitchGrip::new(PitchKind::Shuuto, 50, 35),
            ]),
        ),
        reliever(
            111,
            "Riku Endo",
            arm(152, 55, 35, ArmSlot::Overhand, PitcherPersonality::Stubborn, PitcherRole::Closer, vec![
                PitchGrip::new(PitchKind::FourSeam, 65, 10),
                PitchGrip::new(PitchKind::Splitter, 60, 50),
            ]),
        ),
    ];
    club(1, "Harbor Cranes", 101, &lines, ace, bullpen)
}

fn comets() -> TeamSnapshot {
    let lines: [Line; 9] = [
        ("Sora Inoue", Position::Shortstop, 62, 45, 55, 70, 66, 62),
        ("Taiga Kimura", Position::CenterField, 58, 52, 50, 68, 62, 58),
        ("Hiroto Saito", Position::FirstBase, 55, 74, 52, 35, 48, 50),
        ("Kota Matsuda", Position::LeftField, 52, 70, 45, 45, 50, 55),
        ("Asahi Nakano", Position::ThirdBase, 54, 62, 50, 42, 58, 68),
        ("Minato Ueda", Position::RightField, 50, 60, 46, 50, 52, 70),
        ("Eita Kato", Position::SecondBase, 56, 40, 54, 58, 64, 56),
        ("Ryo Takeda", Position::Catcher, 45, 50, 48, 30, 60, 66),
        ("Naoki Shimizu", Position::Pitcher, 28, 22, 30, 38, 48, 58),
    ];
    let ace = arm(
        150,
        55,
        65,
        ArmSlot::Overhand,
        PitcherPersonality::Stubborn,
        PitcherRole::Starter,
        vec![
            PitchGrip::new(PitchKind::FourSeam, 65, 10),
            PitchGrip::new(PitchKind::Curveball, 50, 60),
            PitchGrip::new(PitchKind::Changeup, 45, 30),
        ],
    );
    let bullpen = vec![
        reliever(
            210,
            "Gen Hirano",
            arm(138, 62, 50, ArmSlot::Submarine, PitcherPersonality::Nervous, PitcherRole::Reliever, vec![
                PitchGrip::new(PitchKind::SlowCurve, 55, 50),
                PitchGrip::new(PitchKind::Sinker, 50, 35),
            ]),
        ),
        reliever(
            211,
            "Jin Murata",
            arm(149, 60, 38, ArmSlot::ThreeQuarters, PitcherPersonality::Confident, PitcherRole::Closer, vec![
                PitchGrip::new(PitchKind::Cutter, 60, 25),
                PitchGrip::new(PitchKind::Slider, 60, 45),
            ]),
        ),
    ];
    club(2, "Valley Comets", 201, &lines, ace, bullpen)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exhibition_is_valid() {
        let scenario = Scenario::exhibition();
        scenario.validate().unwrap();
        assert_eq!(scenario.home.starting_pitcher, 109);
        assert_eq!(scenario.away.starting_pitcher, 209);
        assert_eq!(scenario.home.bullpen.len(), 2);
    }

    #[test]
    fn test_ron_round_trip() {
        let scenario = Scenario::exhibition();
        let text = scenario.to_ron_string().unwrap();
        let parsed = Scenario::from_ron_str(&text).unwrap();
        assert_eq!(parsed, scenario);
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("exhibition.ron");
        let mut scenario = Scenario::exhibition();
        scenario.umpire = Some("sato".into());
        scenario.save(&path).unwrap();
        assert_eq!(Scenario::load(&path).unwrap(), scenario);
    }

    #[test]
    fn test_missing_file() {
        let err = Scenario::load("/definitely/not/here.ron").unwrap_err();
        assert!(matches!(err, ScenarioError::FileNotFound(_)));
    }

    #[test]
    fn test_parse_error_is_reported() {
        let err = Scenario::from_ron_str("Scenario(name: 3)").unwrap_err();
        assert!(matches!(err, ScenarioError::ParseError(_)));
    }

    #[test]
    fn test_setup_carries_keys() {
        let mut scenario = Scenario::exhibition();
        scenario.weather = Some("steady_rain".into());
        let setup = scenario.to_setup(42);
        assert_eq!(setup.seed, 42);
        assert_eq!(setup.weather.as_deref(), Some("steady_rain"));
        assert_eq!(setup.umpire, None);
    }
}
