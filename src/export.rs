//! Snapshot exporters.
//!
//! The orchestrator hands its one snapshot to a [`MetricsExporter`] and
//! depends on nothing else about the report format.

use std::cell::RefCell;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::rc::Rc;

use tracing::info;

use crate::error::FogResult;
use crate::metrics::MetricsSnapshot;

pub trait MetricsExporter {
    fn export(&mut self, snapshot: &MetricsSnapshot) -> FogResult<()>;
}

// ── JSON ──────────────────────────────────────────────────────────────

/// Writes each snapshot as pretty JSON followed by a newline.
pub struct JsonExporter<W: Write> {
    out: W,
}

impl JsonExporter<io::Stdout> {
    /// The console exporter.
    pub fn stdout() -> Self {
        JsonExporter { out: io::stdout() }
    }
}

impl<W: Write> JsonExporter<W> {
    pub fn new(out: W) -> Self {
        JsonExporter { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> MetricsExporter for JsonExporter<W> {
    fn export(&mut self, snapshot: &MetricsSnapshot) -> FogResult<()> {
        serde_json::to_writer_pretty(&mut self.out, snapshot)?;
        writeln!(self.out)?;
        self.out.flush()?;
        Ok(())
    }
}

// ── File ──────────────────────────────────────────────────────────────

/// Writes the snapshot as JSON to a file, replacing previous contents.
pub struct FileExporter {
    path: PathBuf,
}

impl FileExporter {
    pub fn new(path: impl AsRef<Path>) -> Self {
        FileExporter {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl MetricsExporter for FileExporter {
    fn export(&mut self, snapshot: &MetricsSnapshot) -> FogResult<()> {
        let file = File::create(&self.path)?;
        JsonExporter::new(BufWriter::new(file)).export(snapshot)?;
        info!(path = %self.path.display(), "metrics written");
        Ok(())
    }
}

// ── In-memory ─────────────────────────────────────────────────────────

/// Keeps every exported snapshot. Clones share the same store, so a
/// test can keep one handle and give the other to the orchestrator.
#[derive(Debug, Clone, Default)]
pub struct CollectingExporter {
    snapshots: Rc<RefCell<Vec<MetricsSnapshot>>>,
}

impl CollectingExporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshots(&self) -> Vec<MetricsSnapshot> {
        self.snapshots.borrow().clone()
    }

    pub fn len(&self) -> usize {
        self.snapshots.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl MetricsExporter for CollectingExporter {
    fn export(&mut self, snapshot: &MetricsSnapshot) -> FogResult<()> {
        self.snapshots.borrow_mut().push(snapshot.clone());
        Ok(())
    }
}

/// Discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopExporter;

impl MetricsExporter for NoopExporter {
    fn export(&mut self, _snapshot: &MetricsSnapshot) -> FogResult<()> {
        Ok(())
    }
}
