//! JSON-lines event log for design runs.
//!
//! Each line is one [`MetricsEvent`] tagged with `event` and stamped with the
//! milliseconds elapsed since the recorder was opened, so a run's timeline can
//! be read without wall-clock offsets.

use std::{
    fs::{self, File},
    io::{self, BufWriter, Write},
    path::{Path, PathBuf},
    time::Instant,
};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

/// The `[metrics]` table of a design file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    pub enabled: bool,
    pub output: Option<PathBuf>,
}

impl MetricsConfig {
    /// Open the configured log, or `None` when metrics are disabled.
    pub fn build_recorder(&self) -> io::Result<Option<MetricsRecorder>> {
        if !self.enabled {
            return Ok(None);
        }
        match &self.output {
            Some(path) => MetricsRecorder::new(path).map(Some),
            None => Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "metrics.output must be set when metrics are enabled",
            )),
        }
    }
}

/// Shared sink for run events; safe to call from rayon workers.
pub struct MetricsRecorder {
    sink: Mutex<BufWriter<File>>,
    opened: Instant,
}

impl MetricsRecorder {
    pub fn new(path: &Path) -> io::Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        Ok(Self {
            sink: Mutex::new(BufWriter::new(File::create(path)?)),
            opened: Instant::now(),
        })
    }

    /// Append one event. Write failures are logged and otherwise ignored so a
    /// full disk never aborts a search.
    pub fn emit(&self, event: MetricsEvent<'_>) {
        let line = StampedEvent {
            elapsed_ms: self.opened.elapsed().as_secs_f64() * 1000.0,
            event,
        };
        if let Err(err) = self.append(&line) {
            log::error!("[metrics] failed to write event: {err}");
        }
    }

    fn append(&self, line: &StampedEvent<'_>) -> io::Result<()> {
        let mut sink = self.sink.lock();
        serde_json::to_writer(&mut *sink, line)?;
        sink.write_all(b"\n")?;
        sink.flush()
    }
}

#[derive(Serialize)]
struct StampedEvent<'a> {
    elapsed_ms: f64,
    #[serde(flatten)]
    event: MetricsEvent<'a>,
}

#[derive(Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum MetricsEvent<'a> {
    PipelineStart {
        method: &'a str,
        objective: &'a str,
        dimension: usize,
        truncation: usize,
        half_width: usize,
        initial_score: f64,
    },
    Generation {
        generation: usize,
        best_score: f64,
        mean_score: f64,
        spread: f64,
        evaluations: usize,
    },
    GlobalDone {
        score: f64,
        success: bool,
        generations: usize,
        evaluations: usize,
        polished: bool,
        duration_ms: f64,
    },
    LocalRefine {
        score: f64,
        converged: bool,
        status: &'a str,
        iterations: usize,
        evaluations: usize,
        duration_ms: f64,
    },
    PipelineDone {
        final_score: f64,
        failed_evaluations: usize,
        cache_hits: usize,
        cache_misses: usize,
        duration_ms: f64,
    },
}
