//! Work enumeration: a stable, sorted, depth-first walk of the input tree,
//! filtered to eligible images, with checkpoint-based resume suppression.
//!
//! The walk order is lexical per directory on both files and subdirectories.
//! That ordering is what makes the resume boundary reproducible across runs
//! and platforms, so it is a correctness requirement, not a nicety.

use std::path::{Path, PathBuf};

use anyhow::Context as _;

use crate::error::{PaperpanError, PaperpanResult};

/// One source image scheduled for transformation. Identity is the source
/// path; immutable once discovered.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WorkItem {
    pub source_path: PathBuf,
    /// Slash-joined segment chain from the anchor segment (inclusive) down
    /// to but excluding the file name, e.g. `images/box_07/page_scans`.
    pub group_key: String,
    /// File name without its extension.
    pub stem: String,
}

/// Derive the group key for `source_path`: the directory segments from the
/// first occurrence of `anchor_segment` onward. Missing anchor is a fatal
/// configuration error.
pub fn derive_group_key(source_path: &Path, anchor_segment: &str) -> PaperpanResult<String> {
    let parent = source_path.parent().unwrap_or_else(|| Path::new(""));
    let segments: Vec<String> = parent
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();

    let anchor_at = segments.iter().position(|s| s == anchor_segment);
    match anchor_at {
        Some(idx) => Ok(segments[idx..].join("/")),
        None => Err(PaperpanError::configuration(format!(
            "anchor segment '{anchor_segment}' does not appear in '{}'",
            source_path.display()
        ))),
    }
}

/// True when the trailing path components of `dir` spell out `group_key`.
/// The comparison is segment-wise, never substring-wise.
fn dir_matches_group_key(dir: &Path, group_key: &str) -> bool {
    let key_segments: Vec<&str> = group_key.split('/').filter(|s| !s.is_empty()).collect();
    if key_segments.is_empty() {
        return false;
    }

    let dir_segments: Vec<String> = dir
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    if dir_segments.len() < key_segments.len() {
        return false;
    }

    dir_segments[dir_segments.len() - key_segments.len()..]
        .iter()
        .zip(&key_segments)
        .all(|(a, b)| a == b)
}

enum PendingEntry {
    Dir(PathBuf),
    File(PathBuf),
}

/// Lazy, stable-order enumeration of eligible work items.
pub struct Enumerator {
    anchor_segment: String,
    image_ext: String,
    /// `Some(key)` while items are being suppressed ahead of the resume
    /// boundary; cleared permanently once the boundary directory is seen.
    suppress_until: Option<String>,
    stack: Vec<PendingEntry>,
}

impl Enumerator {
    /// Start a walk at `input_root`. With `resume_key = Some(k)` every item
    /// is suppressed until a directory whose trailing segments match `k` is
    /// encountered; that directory's whole contents, and everything after it
    /// in walk order, are yielded. The partially finished group is thereby
    /// re-done in full (directory-granularity resume).
    pub fn new(
        input_root: impl Into<PathBuf>,
        anchor_segment: impl Into<String>,
        image_ext: impl Into<String>,
        resume_key: Option<String>,
    ) -> Self {
        Self {
            anchor_segment: anchor_segment.into(),
            image_ext: image_ext.into(),
            suppress_until: resume_key.filter(|k| !k.trim().is_empty()),
            stack: vec![PendingEntry::Dir(input_root.into())],
        }
    }

    fn push_dir_contents(&mut self, dir: &Path) -> PaperpanResult<()> {
        let entries = std::fs::read_dir(dir)
            .with_context(|| format!("read directory '{}'", dir.display()))?;

        let mut paths = Vec::new();
        for entry in entries {
            let entry =
                entry.with_context(|| format!("read directory entry in '{}'", dir.display()))?;
            let file_type = entry
                .file_type()
                .with_context(|| format!("stat '{}'", entry.path().display()))?;
            paths.push((entry.path(), file_type.is_dir()));
        }

        // Lexical order per directory; pushed reversed so pops come out sorted.
        paths.sort_by(|(a, _), (b, _)| a.file_name().cmp(&b.file_name()));
        for (path, is_dir) in paths.into_iter().rev() {
            self.stack.push(if is_dir {
                PendingEntry::Dir(path)
            } else {
                PendingEntry::File(path)
            });
        }
        Ok(())
    }

    fn extension_matches(&self, path: &Path) -> bool {
        path.extension()
            .map(|ext| ext.to_string_lossy().eq_ignore_ascii_case(&self.image_ext))
            .unwrap_or(false)
    }

    fn make_item(&self, path: PathBuf) -> PaperpanResult<WorkItem> {
        let group_key = derive_group_key(&path, &self.anchor_segment)?;
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .ok_or_else(|| {
                PaperpanError::configuration(format!(
                    "cannot derive a file stem from '{}'",
                    path.display()
                ))
            })?;
        Ok(WorkItem {
            source_path: path,
            group_key,
            stem,
        })
    }
}

impl Iterator for Enumerator {
    type Item = PaperpanResult<WorkItem>;

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(entry) = self.stack.pop() {
            match entry {
                PendingEntry::Dir(dir) => {
                    let at_boundary = self
                        .suppress_until
                        .as_deref()
                        .is_some_and(|key| dir_matches_group_key(&dir, key));
                    if at_boundary {
                        self.suppress_until = None;
                    }
                    if let Err(e) = self.push_dir_contents(&dir) {
                        return Some(Err(e));
                    }
                }
                PendingEntry::File(path) => {
                    if !self.extension_matches(&path) {
                        continue;
                    }
                    if self.suppress_until.is_some() {
                        continue;
                    }
                    return Some(self.make_item(path));
                }
            }
        }
        None
    }
}
