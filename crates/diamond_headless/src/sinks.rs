//! File-backed sinks.
//!
//! [`JsonLinesSink`] appends telemetry records to a JSON-lines file, one
//! record per line. [`JsonResultSink`] writes each finished match as a
//! pretty-printed JSON document into a directory.

use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use diamond_core::controller::{MatchResult, ResultSink};
use diamond_core::error::SinkError;
use diamond_core::telemetry::{FlushReason, TelemetryRecord, TelemetrySink};

/// Telemetry sink writing one JSON object per line.
#[derive(Debug)]
pub struct JsonLinesSink {
    path: PathBuf,
    writer: BufWriter<File>,
}

impl JsonLinesSink {
    /// Open (or create) `path` for appending.
    pub fn create(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self {
            path,
            writer: BufWriter::new(file),
        })
    }

    /// Target file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl TelemetrySink for JsonLinesSink {
    fn name(&self) -> &str {
        "json-lines"
    }

    fn write(&mut self, records: &[TelemetryRecord], _reason: FlushReason) -> Result<(), SinkError> {
        for record in records {
            serde_json::to_writer(&mut self.writer, record)
                .map_err(|e| SinkError::Write(e.to_string()))?;
            self.writer
                .write_all(b"\n")
                .map_err(|e| SinkError::Write(e.to_string()))?;
        }
        self.writer
            .flush()
            .map_err(|e| SinkError::Write(e.to_string()))
    }
}

/// Read a JSON-lines telemetry file back.
pub fn read_json_lines(path: impl AsRef<Path>) -> std::io::Result<Vec<TelemetryRecord>> {
    fs::read_to_string(path)?
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| serde_json::from_str(line).map_err(std::io::Error::other))
        .collect()
}

/// Result sink writing `match_<seed>.json` files.
#[derive(Debug, Clone)]
pub struct JsonResultSink {
    dir: PathBuf,
}

impl JsonResultSink {
    /// Sink rooted at `dir` (created on first write).
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Where a result for `seed` lands.
    pub fn path_for(&self, seed: u64) -> PathBuf {
        self.dir.join(format!("match_{seed}.json"))
    }
}

impl ResultSink for JsonResultSink {
    fn name(&self) -> &str {
        "json-result"
    }

    fn store(&mut self, result: &MatchResult) -> Result<(), SinkError> {
        fs::create_dir_all(&self.dir).map_err(|e| SinkError::Unavailable(e.to_string()))?;
        let json =
            serde_json::to_string_pretty(result).map_err(|e| SinkError::Write(e.to_string()))?;
        fs::write(self.path_for(result.seed), json).map_err(|e| SinkError::Write(e.to_string()))
    }
}

/// Load a result saved by [`JsonResultSink`].
pub fn load_result(path: impl AsRef<Path>) -> std::io::Result<MatchResult> {
    let json = fs::read_to_string(path)?;
    serde_json::from_str(&json).map_err(std::io::Error::other)
}

#[cfg(test)]
mod tests {
    use super::*;
    use diamond_core::controller::simulate;
    use diamond_core::state::Half;
    use diamond_test_utils::fixtures::{exhibition_setup, game_data};

    #[test]
    fn test_json_lines_append_and_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("telemetry").join("match.jsonl");
        let mut sink = JsonLinesSink::create(&path).unwrap();
        let records = vec![
            TelemetryRecord::InningComplete {
                inning: 1,
                half: Half::Top,
                runs: 2,
                outs: 3,
            },
            TelemetryRecord::Walkoff { inning: 9, runs: 1 },
        ];
        sink.write(&records, FlushReason::HalfInning).unwrap();
        sink.write(&records[..1], FlushReason::Manual).unwrap();

        let back = read_json_lines(sink.path()).unwrap();
        assert_eq!(back.len(), 3);
        assert_eq!(back[0], records[0]);
        assert_eq!(back[1], records[1]);
    }

    #[test]
    fn test_result_sink_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let result = simulate(exhibition_setup(4), game_data()).unwrap();
        let mut sink = JsonResultSink::new(dir.path());
        sink.store(&result).unwrap();
        let loaded = load_result(sink.path_for(4)).unwrap();
        assert_eq!(loaded.log_hash, result.log_hash);
        assert_eq!(loaded.home_score, result.home_score);
        assert_eq!(loaded.stats, result.stats);
    }
}
