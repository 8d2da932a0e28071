//! Component I: the telemetry sink. An append-only JSONL file, one line per
//! flight per tick plus scheduler-level snapshot/status lines, buffered and
//! flushed every 100 snapshot cycles or on shutdown (§4.I). This is the
//! artifact P5's byte-identical-replay check compares across runs.

use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::error::EngineError;
use crate::events::{EngineEvent, EventEnvelope};

pub struct TelemetrySink {
    writer: BufWriter<std::fs::File>,
    path: PathBuf,
    lines_since_flush: u32,
    flush_every: u32,
}

impl TelemetrySink {
    /// Opens a new telemetry file under `dir`, named with the engine's UTC
    /// start timestamp so concurrent runs never collide.
    pub fn open(dir: impl AsRef<Path>, started_at: DateTime<Utc>, flush_every: u32) -> Result<Self, EngineError> {
        std::fs::create_dir_all(dir.as_ref())
            .map_err(|e| EngineError::Config(format!("cannot create telemetry dir: {e}")))?;

        let filename = format!("run-{}.jsonl", started_at.format("%Y%m%dT%H%M%S%.3fZ"));
        let path = dir.as_ref().join(filename);
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| EngineError::Config(format!("cannot open telemetry file {path:?}: {e}")))?;

        info!(target: "TELEMETRY", path = %path.display(), "telemetry file opened");

        Ok(Self {
            writer: BufWriter::new(file),
            path,
            lines_since_flush: 0,
            flush_every,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Appends one event, flushing once `flush_every` lines have accumulated.
    pub fn record(&mut self, event: &EngineEvent, timestamp: DateTime<Utc>) -> Result<(), EngineError> {
        let envelope = EventEnvelope::wrap(event, timestamp)
            .map_err(|e| EngineError::Config(format!("telemetry encode failed: {e}")))?;
        let line = envelope
            .to_jsonl()
            .map_err(|e| EngineError::Config(format!("telemetry serialize failed: {e}")))?;

        writeln!(self.writer, "{line}")
            .map_err(|e| EngineError::Config(format!("telemetry write failed: {e}")))?;

        self.lines_since_flush += 1;
        if self.lines_since_flush >= self.flush_every {
            self.flush()?;
        }
        Ok(())
    }

    pub fn flush(&mut self) -> Result<(), EngineError> {
        self.writer
            .flush()
            .map_err(|e| EngineError::Config(format!("telemetry flush failed: {e}")))?;
        debug!(target: "TELEMETRY", lines = self.lines_since_flush, "telemetry flushed");
        self.lines_since_flush = 0;
        Ok(())
    }
}

impl Drop for TelemetrySink {
    fn drop(&mut self) {
        let _ = self.writer.flush();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn records_are_newline_delimited_json() {
        let dir = std::env::temp_dir().join(format!("arrival-engine-telemetry-test-{}", std::process::id()));
        let started = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
        let mut sink = TelemetrySink::open(&dir, started, 100).unwrap();

        let event = EngineEvent::StateSnapshot {
            tick: 5,
            active_flights: 2,
        };
        sink.record(&event, started).unwrap();
        sink.flush().unwrap();

        let contents = std::fs::read_to_string(sink.path()).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 1);
        let parsed: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(parsed["type"], "engine.state_snapshot");
        assert_eq!(parsed["data"]["tick"], 5);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn flushes_automatically_once_threshold_reached() {
        let dir = std::env::temp_dir().join(format!("arrival-engine-telemetry-test-flush-{}", std::process::id()));
        let started = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
        let mut sink = TelemetrySink::open(&dir, started, 2).unwrap();

        let event = EngineEvent::StateSnapshot {
            tick: 1,
            active_flights: 0,
        };
        sink.record(&event, started).unwrap();
        assert_eq!(sink.lines_since_flush, 1);
        sink.record(&event, started).unwrap();
        assert_eq!(sink.lines_since_flush, 0); // flushed automatically

        std::fs::remove_dir_all(&dir).ok();
    }
}
