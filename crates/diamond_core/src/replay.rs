//! Match replays.
//!
//! A match is fully determined by its [`MatchSetup`], so a replay stores
//! only the encoded setup plus a fingerprint of the outcome: the event
//! count and the event-log hash. Verifying a replay re-runs the match and
//! compares fingerprints.
//!
//! Replays are plain bytes here. Reading and writing files is left to the
//! host.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::controller::{simulate, MatchResult, MatchSetup};
use crate::data::GameData;
use crate::error::{Result, SimError};

/// Replay format version for compatibility.
pub const REPLAY_VERSION: u32 = 1;

/// Recorded match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchReplay {
    /// Replay format version.
    pub version: u32,
    /// Seed the match was played with.
    pub seed: u64,
    /// Bincode-encoded [`MatchSetup`].
    pub setup: Vec<u8>,
    /// Events in the recorded log.
    pub event_count: u64,
    /// Hash of the recorded log.
    pub final_hash: u64,
}

impl MatchReplay {
    /// Fingerprint a finished match.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::Serialization`] if the setup cannot be encoded.
    pub fn record(setup: &MatchSetup, result: &MatchResult) -> Result<Self> {
        Ok(Self {
            version: REPLAY_VERSION,
            seed: setup.seed,
            setup: setup.to_bytes()?,
            event_count: result.log.len() as u64,
            final_hash: result.log_hash,
        })
    }

    /// Play a match and record it.
    ///
    /// # Errors
    ///
    /// Fails if the setup is invalid or cannot be encoded.
    pub fn capture(setup: MatchSetup, data: Arc<GameData>) -> Result<(Self, MatchResult)> {
        let bytes = setup.to_bytes()?;
        let seed = setup.seed;
        let result = simulate(setup, data)?;
        let replay = Self {
            version: REPLAY_VERSION,
            seed,
            setup: bytes,
            event_count: result.log.len() as u64,
            final_hash: result.log_hash,
        };
        Ok((replay, result))
    }

    /// Decode the stored setup.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::Serialization`] on corrupt bytes.
    pub fn setup(&self) -> Result<MatchSetup> {
        MatchSetup::from_bytes(&self.setup)
    }

    /// Re-run the match and check it reproduces the recorded log.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::ReplayMismatch`] when the hashes or event counts
    /// differ.
    pub fn verify(&self, data: Arc<GameData>) -> Result<MatchResult> {
        let result = simulate(self.setup()?, data)?;
        if result.log_hash != self.final_hash || result.log.len() as u64 != self.event_count {
            return Err(SimError::ReplayMismatch {
                expected: self.final_hash,
                actual: result.log_hash,
            });
        }
        Ok(result)
    }

    /// Encode the replay itself.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::Serialization`] if bincode fails.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        bincode::serialize(self).map_err(|e| SimError::Serialization(format!("replay: {e}")))
    }

    /// Decode a replay and check its version.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::Serialization`] for corrupt bytes or a version
    /// this build does not read.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let replay: Self = bincode::deserialize(bytes)
            .map_err(|e| SimError::Serialization(format!("replay: {e}")))?;
        if replay.version != REPLAY_VERSION {
            return Err(SimError::Serialization(format!(
                "replay version mismatch: expected {REPLAY_VERSION}, got {}",
                replay.version
            )));
        }
        Ok(replay)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fielding::{DefenseProfile, Shift};
    use crate::player::{Controller, PlayerId, PlayerSnapshot, Position, TeamSnapshot};

    fn roster(id: u32, base: PlayerId) -> TeamSnapshot {
        TeamSnapshot {
            id,
            name: format!("Team {id}"),
            lineup: Position::FIELD
                .iter()
                .enumerate()
                .map(|(i, pos)| PlayerSnapshot::league_average(base + i as PlayerId, format!("P{i}"), *pos))
                .collect(),
            bullpen: Vec::new(),
            starting_pitcher: base,
            defense: DefenseProfile::default(),
            shift: Shift::None,
            controller: Controller::Ai,
        }
    }

    fn data() -> Arc<GameData> {
        Arc::new(GameData::builtin().unwrap())
    }

    #[test]
    fn test_capture_then_verify() {
        let setup = MatchSetup::new(roster(1, 10), roster(2, 40), 2024);
        let (replay, result) = MatchReplay::capture(setup, data()).unwrap();
        assert_eq!(replay.event_count, result.log.len() as u64);
        let again = replay.verify(data()).unwrap();
        assert_eq!(again.log_hash, result.log_hash);
    }

    #[test]
    fn test_tampered_hash_is_a_mismatch() {
        let setup = MatchSetup::new(roster(1, 10), roster(2, 40), 7);
        let (mut replay, _) = MatchReplay::capture(setup, data()).unwrap();
        replay.final_hash ^= 1;
        assert!(matches!(
            replay.verify(data()),
            Err(SimError::ReplayMismatch { .. })
        ));
    }

    #[test]
    fn test_bytes_round_trip_and_version_check() {
        let setup = MatchSetup::new(roster(1, 10), roster(2, 40), 3);
        let (replay, _) = MatchReplay::capture(setup.clone(), data()).unwrap();
        let decoded = MatchReplay::from_bytes(&replay.to_bytes().unwrap()).unwrap();
        assert_eq!(decoded, replay);
        assert_eq!(decoded.setup().unwrap(), setup);

        let mut future = replay;
        future.version = REPLAY_VERSION + 1;
        let bytes = future.to_bytes().unwrap();
        assert!(matches!(
            MatchReplay::from_bytes(&bytes),
            Err(SimError::Serialization(_))
        ));
    }
}
