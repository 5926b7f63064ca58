//! Ranked CSV output for multi-start runs.

use std::fs::{self, File};
use std::io::{self, BufWriter, Write};

use trimod_core::params::FreeParameter;

use crate::config::OutputConfig;
use crate::driver::StartResult;

/// Writes one CSV row per refined start, best first.
pub struct OutputWriter {
    writer: BufWriter<File>,
    free: Vec<FreeParameter>,
    limit: Option<usize>,
    rows: usize,
}

impl OutputWriter {
    pub fn new(config: &OutputConfig, free: &[FreeParameter]) -> io::Result<Self> {
        if let Some(parent) = config.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let mut writer = BufWriter::new(File::create(&config.path)?);
        write!(
            writer,
            "rank,start_index,score,converged,status,iterations,evaluations"
        )?;
        for param in free {
            write!(writer, ",start_{}", param.slot)?;
        }
        for param in free {
            write!(writer, ",{}", param.slot)?;
        }
        writeln!(writer)?;
        Ok(Self {
            writer,
            free: free.to_vec(),
            limit: config.top,
            rows: 0,
        })
    }

    /// Append a result; rows past the configured limit are skipped.
    pub fn write_result(&mut self, rank: usize, result: &StartResult) -> io::Result<()> {
        if self.limit.is_some_and(|limit| self.rows >= limit) {
            return Ok(());
        }
        let local = &result.result;
        write!(
            self.writer,
            "{rank},{},{:.12e},{},{:?},{},{}",
            result.index,
            local.score,
            local.converged,
            local.status.to_string(),
            local.iterations,
            local.evaluations
        )?;
        debug_assert_eq!(result.start.len(), self.free.len());
        for value in &result.start {
            write!(self.writer, ",{value:.9}")?;
        }
        for value in &local.x {
            write!(self.writer, ",{value:.9}")?;
        }
        writeln!(self.writer)?;
        self.rows += 1;
        Ok(())
    }

    pub fn rows_written(&self) -> usize {
        self.rows
    }

    pub fn finalize(&mut self) -> io::Result<()> {
        self.writer.flush()
    }
}
