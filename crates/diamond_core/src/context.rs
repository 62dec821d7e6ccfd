//! Situational context for the current plate appearance.
//!
//! A [`SituationContext`] is a cheap, copyable read of the match state
//! that trait conditions, psychology and the AI decision paths consult.
//! It never mutates anything.

use serde::{Deserialize, Serialize};

use crate::player::TeamSide;
use crate::state::{Base, MatchState};

/// Inning at which a game counts as "late".
pub const LATE_INNING: u32 = 7;

/// Score margin (either way) that counts as "close".
pub const CLOSE_MARGIN: i32 = 2;

/// Snapshot of the game situation from the batting side's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SituationContext {
    /// Current inning (1-based).
    pub inning: u32,
    /// Side currently batting.
    pub batting: TeamSide,
    /// Outs in the half-inning.
    pub outs: u8,
    /// Balls in the count.
    pub balls: u8,
    /// Strikes in the count.
    pub strikes: u8,
    /// Batting score minus fielding score.
    pub score_margin: i32,
    /// Runner on first.
    pub runner_on_first: bool,
    /// Runner in scoring position.
    pub risp: bool,
    /// All three bases occupied.
    pub bases_loaded: bool,
    /// Batting-order slot of the batter (1-9).
    pub lineup_slot: usize,
    /// Inning 7 or later.
    pub late: bool,
    /// Margin of two runs or fewer.
    pub close: bool,
}

impl SituationContext {
    /// Capture the context from the live match state.
    #[must_use]
    pub fn capture(state: &MatchState) -> Self {
        let batting = state.half().batting();
        let score_margin = state.score(batting) as i32 - state.score(batting.opponent()) as i32;
        let count = state.count();
        let bases = state.bases();
        let late = state.inning() >= LATE_INNING;
        let close = score_margin.abs() <= CLOSE_MARGIN;
        Self {
            inning: state.inning(),
            batting,
            outs: state.outs(),
            balls: count.balls,
            strikes: count.strikes,
            score_margin,
            runner_on_first: bases.is_occupied(Base::First),
            risp: bases.runners_in_scoring_position(),
            bases_loaded: bases.loaded(),
            lineup_slot: state.team(batting).lineup_index() + 1,
            late,
            close,
        }
    }

    /// Late and close.
    #[must_use]
    pub const fn is_clutch(&self) -> bool {
        self.late && self.close
    }

    /// Clutch or runners in scoring position.
    #[must_use]
    pub const fn is_high_pressure(&self) -> bool {
        self.is_clutch() || self.risp
    }

    /// Two strikes on the batter.
    #[must_use]
    pub const fn two_strikes(&self) -> bool {
        self.strikes >= 2
    }

    /// Leverage index in `[0.5, 2.5]`.
    ///
    /// Baseline 1.0, raised by late innings, a close score, runners in
    /// scoring position, loaded bases and two outs; lowered in blowouts.
    #[must_use]
    pub fn leverage(&self) -> f64 {
        let mut leverage: f64 = 1.0;
        if self.late {
            leverage += 0.3;
        }
        if self.close {
            leverage += 0.3;
        } else if self.score_margin.abs() >= 6 {
            leverage -= 0.4;
        }
        if self.risp {
            leverage += 0.3;
        }
        if self.bases_loaded {
            leverage += 0.2;
        }
        if self.outs == 2 {
            leverage += 0.1;
        }
        if self.is_clutch() && self.inning >= 9 {
            leverage += 0.3;
        }
        leverage.clamp(0.5, 2.5)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quiet() -> SituationContext {
        SituationContext {
            inning: 2,
            batting: TeamSide::Away,
            outs: 0,
            balls: 0,
            strikes: 0,
            score_margin: 0,
            runner_on_first: false,
            risp: false,
            bases_loaded: false,
            lineup_slot: 1,
            late: false,
            close: true,
        }
    }

    #[test]
    fn test_clutch_requires_late_and_close() {
        let mut ctx = quiet();
        assert!(!ctx.is_clutch());
        ctx.late = true;
        ctx.inning = 8;
        assert!(ctx.is_clutch());
        ctx.close = false;
        assert!(!ctx.is_clutch());
    }

    #[test]
    fn test_leverage_bounds() {
        let mut ctx = quiet();
        ctx.inning = 9;
        ctx.late = true;
        ctx.risp = true;
        ctx.bases_loaded = true;
        ctx.outs = 2;
        assert!((ctx.leverage() - 2.5).abs() < 1e-9);

        let mut blowout = quiet();
        blowout.close = false;
        blowout.score_margin = -9;
        assert!((blowout.leverage() - 0.6).abs() < 1e-9);
    }
}
