use std::ffi::OsString;
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::debug;

use super::{SinkError, SinkResult};
use crate::engine::types::DepthSnapshot;
use crate::telemetry;

/// Write `depth` to `path` atomically: readers see the old file or the new
/// one, never a partial write. The temp file is removed on failure.
pub fn write_atomic(path: &Path, depth: &DepthSnapshot) -> SinkResult<()> {
    let tmp = tmp_path(path);
    let result = write_then_rename(&tmp, path, depth);
    if result.is_err() {
        let _ = fs::remove_file(&tmp);
    }
    result
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(".tmp");
    PathBuf::from(name)
}

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> SinkError {
    let path = path.display().to_string();
    move |source| SinkError::Io { path, source }
}

fn write_then_rename(tmp: &Path, path: &Path, depth: &DepthSnapshot) -> SinkResult<()> {
    let file = File::create(tmp).map_err(io_error(tmp))?;
    let mut out = BufWriter::new(file);
    serde_json::to_writer(&mut out, depth)?;
    let file = out.into_inner().map_err(|e| io_error(tmp)(e.into_error()))?;
    file.sync_all().map_err(io_error(tmp))?;
    fs::rename(tmp, path).map_err(io_error(path))?;
    Ok(())
}

/// Throttled depth file writer.
///
/// A throttled offer is kept as pending and written by `flush_pending` once
/// the interval has passed, so the last depth of a quiet period still lands.
pub struct DepthJsonSink {
    path: PathBuf,
    min_interval: Duration,
    last_write: Option<Instant>,
    pending: Option<Arc<DepthSnapshot>>,
    written: u64,
}

impl DepthJsonSink {
    pub fn new(path: impl Into<PathBuf>, min_interval: Duration) -> Self {
        Self {
            path: path.into(),
            min_interval,
            last_write: None,
            pending: None,
            written: 0,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn written(&self) -> u64 {
        self.written
    }

    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Time left before a pending depth may be written, `None` if nothing is pending.
    pub fn pending_due_in(&self) -> Option<Duration> {
        self.pending.as_ref()?;
        let due_in = self
            .last_write
            .map_or(Duration::ZERO, |at| self.min_interval.saturating_sub(at.elapsed()));
        Some(due_in)
    }

    /// Write unless the last write was less than `min_interval` ago, in which
    /// case `depth` replaces any pending one. `force` skips the throttle.
    /// Returns whether the file was written.
    pub fn offer(&mut self, depth: Arc<DepthSnapshot>, force: bool) -> SinkResult<bool> {
        let due = self
            .last_write
            .map_or(true, |at| at.elapsed() >= self.min_interval);
        if !force && !due {
            self.pending = Some(depth);
            return Ok(false);
        }
        self.write(&depth)?;
        Ok(true)
    }

    /// Write the pending depth, if any, regardless of the throttle. A failed
    /// write drops it.
    pub fn flush_pending(&mut self) -> SinkResult<bool> {
        let Some(depth) = self.pending.take() else {
            return Ok(false);
        };
        self.write(&depth)?;
        Ok(true)
    }

    fn write(&mut self, depth: &DepthSnapshot) -> SinkResult<()> {
        write_atomic(&self.path, depth)?;
        self.last_write = Some(Instant::now());
        self.pending = None;
        self.written += 1;
        metrics::counter!(telemetry::DEPTH_DUMPS_WRITTEN).increment(1);
        debug!(path = %self.path.display(), "wrote depth file");
        Ok(())
    }
}
