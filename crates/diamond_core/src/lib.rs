//! # Diamond Core
//!
//! Deterministic in-match baseball simulation.
//!
//! This crate contains **only** match logic:
//! - No rendering
//! - No file or network IO
//! - No system randomness (one seeded generator per match)
//! - No process-wide state
//!
//! That keeps matches reproducible from a seed, so replays, batch runs on
//! worker threads and determinism tests all work off the same code.
//!
//! ## Crate Structure
//!
//! - [`controller`] - inning loop, pitching changes, match results
//! - [`at_bat`] - the plate-appearance state machine
//! - [`battery`], [`umpire`], [`physics`] - signs, calls, pitch and swing resolution
//! - [`fielding`], [`baserunning`] - batted balls, defense, runners
//! - [`confidence`], [`psychology`], [`momentum`] - mental layers
//! - [`events`] - the event bus every layer publishes through
//! - [`telemetry`], [`dugout`] - bundled bus listeners
//! - [`data`] - RON trait, umpire, weather and pitch tables

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]

pub mod at_bat;
pub mod baserunning;
pub mod battery;
pub mod confidence;
pub mod config;
pub mod context;
pub mod controller;
pub mod data;
pub mod dugout;
pub mod error;
pub mod events;
pub mod fielding;
pub mod momentum;
pub mod physics;
pub mod player;
pub mod psychology;
pub mod replay;
pub mod rng;
pub mod state;
pub mod telemetry;
pub mod umpire;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::at_bat::{
        ActionOutcome, DecisionProvider, PlateAppearanceResult, ScriptedDecisions, SkipReason,
        SpecialAction,
    };
    pub use crate::config::{MatchConfig, MercyRule, Tuning};
    pub use crate::controller::{
        hand_back, simulate, Carryover, HalfInningSummary, Match, MatchResult, MatchSetup,
        ResultSink, Termination,
    };
    pub use crate::data::GameData;
    pub use crate::dugout::{DugoutListener, DUGOUT_TOPICS};
    pub use crate::error::{ListenerError, Result, SimError, SinkError};
    pub use crate::events::{
        log_hash, EventBus, EventKind, EventListener, EventRecorder, FnListener, MatchEvent,
    };
    pub use crate::fielding::{DefenseProfile, Shift};
    pub use crate::player::{
        Controller, PitchGrip, PitchKind, PlayerId, PlayerSnapshot, Position, TeamSide,
        TeamSnapshot,
    };
    pub use crate::replay::MatchReplay;
    pub use crate::rng::MatchRng;
    pub use crate::state::{Half, MatchState, PlayerStats};
    pub use crate::telemetry::{
        FlushReason, ForwardingSink, MemorySink, TelemetryCollector, TelemetryRecord, TelemetrySink,
    };
}
