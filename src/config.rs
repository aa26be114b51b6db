use std::path::PathBuf;

use crate::error::{PaperpanError, PaperpanResult};

/// Checkpoint log file name, created under the output root.
pub const CHECKPOINT_LOG_NAME: &str = "render_checkpoint_log.csv";

/// Startup configuration for one batch run. Everything here is fixed for the
/// lifetime of the run; nothing is runtime-mutable.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Root of the scanned-document tree to enumerate.
    pub input_root: PathBuf,
    /// Root under which frames and the checkpoint log are written.
    pub output_root: PathBuf,
    /// Path segment that anchors group keys (outputs mirror the tree from
    /// this segment onward).
    pub anchor_segment: String,
    /// Source image extension, matched case-insensitively.
    pub image_ext: String,
    /// Cap on successfully completed items for the whole run.
    pub limit: Option<u64>,

    // Animation / export parameters.
    pub total_frames: u64,
    pub stall_frames: u64,
    pub frame_interval: u64,
    pub keyframe_interval: u64,
    pub move_distance: f64,
    pub rise_amount: f64,
    pub drift_range: f64,

    // Scene parameters.
    pub subdivision_cuts: u32,
    pub edge_displace_strength: f64,
    pub edge_noise_scale: f64,
    pub warp_strength: f64,
    pub warp_noise_scale: f64,
    pub camera_standoff: f64,

    // Supervisor parameters.
    pub restart_delay_secs: u64,
    pub max_retries: Option<u32>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            input_root: PathBuf::from("input"),
            output_root: PathBuf::from("output"),
            anchor_segment: "images".to_string(),
            image_ext: "tif".to_string(),
            limit: None,
            total_frames: 120,
            stall_frames: 10,
            frame_interval: 10,
            keyframe_interval: 20,
            move_distance: 5.0,
            rise_amount: 1.0,
            drift_range: 1.0,
            subdivision_cuts: 50,
            edge_displace_strength: 0.05,
            edge_noise_scale: 10.0,
            warp_strength: 0.05,
            warp_noise_scale: 1.0,
            camera_standoff: 1.5,
            restart_delay_secs: 2,
            max_retries: None,
        }
    }
}

impl RunConfig {
    pub fn validate(&self) -> PaperpanResult<()> {
        if self.anchor_segment.trim().is_empty() {
            return Err(PaperpanError::configuration(
                "anchor_segment must be non-empty",
            ));
        }
        if self.image_ext.trim().is_empty() {
            return Err(PaperpanError::configuration("image_ext must be non-empty"));
        }
        if self.total_frames == 0 {
            return Err(PaperpanError::configuration("total_frames must be > 0"));
        }
        if self.stall_frames >= self.total_frames {
            return Err(PaperpanError::configuration(
                "stall_frames must be < total_frames",
            ));
        }
        if self.frame_interval == 0 {
            return Err(PaperpanError::configuration("frame_interval must be > 0"));
        }
        if self.keyframe_interval == 0 {
            return Err(PaperpanError::configuration(
                "keyframe_interval must be > 0",
            ));
        }
        if self.move_distance < 0.5 {
            return Err(PaperpanError::configuration(
                "move_distance must be >= 0.5 (forward travel is sampled from [0.5, move_distance])",
            ));
        }
        if self.rise_amount < 0.0 || self.drift_range < 0.0 {
            return Err(PaperpanError::configuration(
                "rise_amount and drift_range must be >= 0",
            ));
        }
        if self.subdivision_cuts == 0 {
            return Err(PaperpanError::configuration(
                "subdivision_cuts must be > 0",
            ));
        }
        if self.camera_standoff <= 0.0 {
            return Err(PaperpanError::configuration("camera_standoff must be > 0"));
        }
        Ok(())
    }

    /// Path of the checkpoint log for this run.
    pub fn checkpoint_log_path(&self) -> PathBuf {
        self.output_root.join(CHECKPOINT_LOG_NAME)
    }
}
