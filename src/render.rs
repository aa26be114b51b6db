//! The frame-export driver and the narrow boundary to the frame renderer.
//!
//! The renderer behind [`FrameRenderer`] is treated as a pure, possibly slow,
//! possibly process-fatal function from (scene, camera path, frame index) to
//! one image file. A frame failure is deliberately not caught here: it
//! propagates, takes the worker process down, and is recovered by the
//! supervisor restarting the whole process.

use std::path::{Path, PathBuf};

use anyhow::Context as _;
use tracing::debug;

use crate::{camera_anim::CameraPath, error::PaperpanResult, scene::Scene};

/// External rendering engine boundary: write exactly one still image for
/// `frame` at `out_path`. Synchronous and blocking.
pub trait FrameRenderer {
    fn render_frame(
        &mut self,
        scene: &Scene,
        path: &CameraPath,
        frame: u64,
        out_path: &Path,
    ) -> PaperpanResult<()>;
}

/// Frame indices exported for one item: `start, start+interval, ...` up to
/// and including `end` when it lands on the stride.
pub fn frame_indices(frame_start: u64, frame_end: u64, interval: u64) -> Vec<u64> {
    debug_assert!(interval > 0);
    (frame_start..=frame_end).step_by(interval as usize).collect()
}

pub fn frame_file_name(file_prefix: &str, frame: u64) -> String {
    format!("{file_prefix}_{frame:04}.png")
}

#[derive(Clone, Debug)]
pub struct RenderDriver {
    pub frame_start: u64,
    pub frame_end: u64,
    pub interval: u64,
}

impl RenderDriver {
    pub fn new(frame_start: u64, frame_end: u64, interval: u64) -> Self {
        Self {
            frame_start,
            frame_end,
            interval,
        }
    }

    /// Render the full frame range of one item into `output_dir`, one file
    /// per frame, and return the file names in render order. The output
    /// directory is created if absent. Each frame's output path is computed
    /// here and handed to the renderer per call, so the renderer handle
    /// carries no path state between items.
    pub fn render(
        &self,
        scene: &Scene,
        path: &CameraPath,
        output_dir: &Path,
        file_prefix: &str,
        renderer: &mut dyn FrameRenderer,
    ) -> PaperpanResult<Vec<String>> {
        std::fs::create_dir_all(output_dir)
            .with_context(|| format!("create output directory '{}'", output_dir.display()))?;

        let mut files = Vec::new();
        for frame in frame_indices(self.frame_start, self.frame_end, self.interval) {
            let file_name = frame_file_name(file_prefix, frame);
            let out_path: PathBuf = output_dir.join(&file_name);
            debug!(frame, out = %out_path.display(), "rendering frame");
            renderer.render_frame(scene, path, frame, &out_path)?;
            files.push(file_name);
        }
        Ok(files)
    }
}
