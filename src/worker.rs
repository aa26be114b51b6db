//! The per-item worker loop: resume lookup, enumeration, scene synthesis,
//! animation, frame export, checkpoint append.
//!
//! The worker is strictly sequential, one item and one frame at a time; the
//! rendering context is a singleton resource. Any failure propagates out and
//! becomes a non-zero process exit, which is exactly the signal the
//! supervisor restarts on.

use rand::Rng;
use tracing::{info, warn};

use crate::{
    camera_anim::{AnimateParams, animate},
    checkpoint::{CheckpointLog, CheckpointRecord},
    config::RunConfig,
    error::PaperpanResult,
    render::{FrameRenderer, RenderDriver},
    scene::{SceneParams, SceneSynthesizer},
    workitem::Enumerator,
};

impl From<&RunConfig> for AnimateParams {
    fn from(cfg: &RunConfig) -> Self {
        Self {
            total_frames: cfg.total_frames,
            stall_frames: cfg.stall_frames,
            move_distance: cfg.move_distance,
            rise_amount: cfg.rise_amount,
            drift_range: cfg.drift_range,
            keyframe_interval: cfg.keyframe_interval,
        }
    }
}

/// Run one worker pass over the input tree. Returns the number of items
/// completed in this pass. Exits early (successfully) once `limit` items
/// have been completed across the whole run.
pub fn run_worker(
    config: &RunConfig,
    renderer: &mut dyn FrameRenderer,
    rng: &mut impl Rng,
) -> PaperpanResult<u64> {
    config.validate()?;

    let log = CheckpointLog::new(config.checkpoint_log_path());
    let resume_key = log.last_group_key()?;
    match &resume_key {
        Some(key) => info!(resume_group = %key, "resuming from checkpoint"),
        None => info!("no checkpoint found, starting from the beginning"),
    }

    let synthesizer = SceneSynthesizer::new(SceneParams::from(config));
    let animate_params = AnimateParams::from(config);
    let driver = RenderDriver::new(0, config.total_frames, config.frame_interval);

    let items = Enumerator::new(
        config.input_root.clone(),
        config.anchor_segment.clone(),
        config.image_ext.clone(),
        resume_key,
    );

    let mut completed: u64 = 0;
    for item in items {
        if let Some(limit) = config.limit
            && completed >= limit
        {
            info!(limit, "item limit reached, stopping");
            return Ok(completed);
        }

        let item = item?;
        info!(
            source = %item.source_path.display(),
            group = %item.group_key,
            "processing item"
        );

        // Fresh scene per item; the previous item's scene is gone by now.
        let scene = synthesizer.build(&item.source_path, rng)?;
        let path = animate(&scene, &animate_params, rng);

        let output_dir = config.output_root.join(&item.group_key);
        let files = driver.render(&scene, &path, &output_dir, &item.stem, renderer)?;

        // Only a fully rendered item earns a checkpoint record.
        log.append(&CheckpointRecord::new(item.group_key.clone(), files))?;
        completed += 1;
    }

    if completed == 0 {
        warn!("no items processed this pass");
    }
    info!(completed, "worker pass finished");
    Ok(completed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{camera_anim::CameraPath, error::PaperpanError, scene::Scene};
    use rand::{SeedableRng as _, rngs::StdRng};
    use std::path::{Path, PathBuf};

    /// Renders nothing; records requested paths and optionally fails on the
    /// n-th frame request to simulate a mid-item crash.
    struct FakeRenderer {
        rendered: Vec<PathBuf>,
        fail_after: Option<usize>,
    }

    impl FakeRenderer {
        fn new() -> Self {
            Self {
                rendered: Vec::new(),
                fail_after: None,
            }
        }
    }

    impl FrameRenderer for FakeRenderer {
        fn render_frame(
            &mut self,
            _scene: &Scene,
            _path: &CameraPath,
            _frame: u64,
            out_path: &Path,
        ) -> PaperpanResult<()> {
            if let Some(n) = self.fail_after
                && self.rendered.len() >= n
            {
                return Err(PaperpanError::render("simulated renderer crash"));
            }
            std::fs::write(out_path, b"frame").unwrap();
            self.rendered.push(out_path.to_path_buf());
            Ok(())
        }
    }

    fn page(root: &Path, rel: &str) {
        let path = root.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        image::RgbaImage::from_pixel(20, 16, image::Rgba([255, 255, 255, 255]))
            .save(&path)
            .unwrap();
    }

    fn config(root: &Path) -> RunConfig {
        RunConfig {
            input_root: root.join("in"),
            output_root: root.join("out"),
            anchor_segment: "images".to_string(),
            image_ext: "png".to_string(),
            total_frames: 20,
            stall_frames: 2,
            frame_interval: 10,
            keyframe_interval: 5,
            ..RunConfig::default()
        }
    }

    #[test]
    fn full_pass_checkpoints_every_item() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        page(root, "in/images/a/p1.png");
        page(root, "in/images/a/p2.png");
        page(root, "in/images/b/p1.png");

        let cfg = config(root);
        let mut renderer = FakeRenderer::new();
        let completed =
            run_worker(&cfg, &mut renderer, &mut StdRng::seed_from_u64(1)).unwrap();

        assert_eq!(completed, 3);
        // 3 frames per item (0, 10, 20).
        assert_eq!(renderer.rendered.len(), 9);
        assert!(root.join("out/images/a/p1_0000.png").is_file());
        assert!(root.join("out/images/b/p1_0020.png").is_file());

        let log = CheckpointLog::new(cfg.checkpoint_log_path());
        assert_eq!(log.last_group_key().unwrap(), Some("images/b".to_string()));
    }

    #[test]
    fn limit_caps_completed_items_and_still_succeeds() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        page(root, "in/images/a/p1.png");
        page(root, "in/images/a/p2.png");
        page(root, "in/images/b/p1.png");

        let mut cfg = config(root);
        cfg.limit = Some(2);
        let mut renderer = FakeRenderer::new();
        let completed =
            run_worker(&cfg, &mut renderer, &mut StdRng::seed_from_u64(1)).unwrap();

        assert_eq!(completed, 2);
        let log = CheckpointLog::new(cfg.checkpoint_log_path());
        assert_eq!(log.last_group_key().unwrap(), Some("images/a".to_string()));
    }

    #[test]
    fn crash_mid_item_leaves_no_record_for_that_item() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        page(root, "in/images/a/p1.png");
        page(root, "in/images/b/p1.png");

        let cfg = config(root);
        let mut renderer = FakeRenderer::new();
        // First item renders 3 frames; fail inside the second item.
        renderer.fail_after = Some(4);

        let err = run_worker(&cfg, &mut renderer, &mut StdRng::seed_from_u64(1)).unwrap_err();
        assert!(matches!(err, PaperpanError::Render(_)));

        let log = CheckpointLog::new(cfg.checkpoint_log_path());
        assert_eq!(log.last_group_key().unwrap(), Some("images/a".to_string()));
    }
}
