//! Append-only completion log, the single source of truth for resume.
//!
//! One line per fully completed work item: the item's group key followed by
//! the file names of every frame rendered for it. The log is opened, written,
//! and closed per append, so a crash can lose at most the in-flight item.
//! Single-writer by construction; there is no locking.

use std::{
    fs::OpenOptions,
    io::Write as _,
    path::{Path, PathBuf},
};

use anyhow::Context as _;

use crate::error::{PaperpanError, PaperpanResult};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CheckpointRecord {
    pub group_key: String,
    pub frame_files: Vec<String>,
}

impl CheckpointRecord {
    pub fn new(group_key: impl Into<String>, frame_files: Vec<String>) -> Self {
        Self {
            group_key: group_key.into(),
            frame_files,
        }
    }

    fn to_line(&self) -> String {
        let mut line = self.group_key.clone();
        for file in &self.frame_files {
            line.push_str(", ");
            line.push_str(file);
        }
        line
    }
}

#[derive(Clone, Debug)]
pub struct CheckpointLog {
    path: PathBuf,
}

impl CheckpointLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one completion record. The caller must only do this after
    /// every frame of the item has been rendered successfully.
    pub fn append(&self, record: &CheckpointRecord) -> PaperpanResult<()> {
        if record.group_key.trim().is_empty() {
            return Err(PaperpanError::checkpoint(
                "refusing to append a record with an empty group key",
            ));
        }

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("create checkpoint log directory '{}'", parent.display())
            })?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("open checkpoint log '{}'", self.path.display()))?;

        // Single write of the full line including the terminator, then an
        // explicit flush, so a reader can never observe a torn record.
        let mut line = record.to_line();
        line.push('\n');
        file.write_all(line.as_bytes())
            .with_context(|| format!("append to checkpoint log '{}'", self.path.display()))?;
        file.flush()
            .with_context(|| format!("flush checkpoint log '{}'", self.path.display()))?;
        Ok(())
    }

    /// Group key of the last completed item, or `None` when the log does not
    /// exist or holds no data lines. Trailing blank lines are ignored.
    pub fn last_group_key(&self) -> PaperpanResult<Option<String>> {
        let contents = match std::fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(PaperpanError::checkpoint(format!(
                    "read checkpoint log '{}': {e}",
                    self.path.display()
                )));
            }
        };

        let last = contents
            .lines()
            .rev()
            .find(|line| !line.trim().is_empty())
            .and_then(|line| line.split(',').next())
            .map(|field| field.trim().to_string());

        Ok(last.filter(|key| !key.is_empty()))
    }
}
