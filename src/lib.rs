#![forbid(unsafe_code)]

pub mod camera_anim;
pub mod checkpoint;
pub mod config;
pub mod error;
pub mod math;
pub mod render;
pub mod render_cpu;
pub mod scene;
pub mod supervisor;
pub mod worker;
pub mod workitem;

pub use camera_anim::{AnimateParams, CameraKey, CameraPath, CameraPose, animate};
pub use checkpoint::{CheckpointLog, CheckpointRecord};
pub use config::{CHECKPOINT_LOG_NAME, RunConfig};
pub use error::{PaperpanError, PaperpanResult};
pub use math::{NoiseField, Quat, Vec3};
pub use render::{FrameRenderer, RenderDriver, frame_file_name, frame_indices};
pub use render_cpu::CpuRenderer;
pub use scene::{GridMesh, Light, LightKind, Scene, SceneParams, SceneSynthesizer};
pub use supervisor::{
    CommandLauncher, Launcher, SupervisorOutcome, SupervisorPolicy, SupervisorState,
    WorkerProcess, supervise,
};
pub use worker::run_worker;
pub use workitem::{Enumerator, WorkItem, derive_group_key};
