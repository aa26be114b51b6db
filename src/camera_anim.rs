//! Camera animation: a stall followed by a randomized pan that keeps the
//! document centered, persisted as sparse keyframes.

use rand::Rng;

use crate::{
    math::{Lerp as _, Quat, Vec3},
    scene::Scene,
};

/// Parameters of the pan. All values are startup configuration.
#[derive(Clone, Copy, Debug)]
pub struct AnimateParams {
    pub total_frames: u64,
    pub stall_frames: u64,
    pub move_distance: f64,
    pub rise_amount: f64,
    pub drift_range: f64,
    pub keyframe_interval: u64,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CameraPose {
    pub position: Vec3,
    pub orientation: Quat,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CameraKey {
    pub frame: u64,
    pub pose: CameraPose,
}

/// Piecewise-linear keyframed trajectory. Frames between keys are
/// interpolated by the renderer via [`CameraPath::pose_at`].
#[derive(Clone, Debug)]
pub struct CameraPath {
    /// Sorted by frame, first at 0, last at the final frame.
    pub keys: Vec<CameraKey>,
}

impl CameraPath {
    /// Pose at `frame`, clamped to the first/last key outside the range.
    pub fn pose_at(&self, frame: u64) -> CameraPose {
        debug_assert!(!self.keys.is_empty());

        let idx = self.keys.partition_point(|k| k.frame <= frame);
        if idx == 0 {
            return self.keys[0].pose;
        }
        if idx >= self.keys.len() {
            return self.keys[self.keys.len() - 1].pose;
        }

        let a = &self.keys[idx - 1];
        let b = &self.keys[idx];
        let denom = b.frame.saturating_sub(a.frame);
        if denom == 0 {
            return a.pose;
        }

        let t = (frame - a.frame) as f64 / denom as f64;
        CameraPose {
            position: Vec3::lerp(&a.pose.position, &b.pose.position, t),
            orientation: Quat::lerp(&a.pose.orientation, &b.pose.orientation, t),
        }
    }

    pub fn key_frames(&self) -> Vec<u64> {
        self.keys.iter().map(|k| k.frame).collect()
    }
}

/// Build the pan for a scene's camera: hold the starting pose through the
/// stall, then lerp toward a randomly drawn end position while re-aiming at
/// the origin every frame. Only every `keyframe_interval`-th moving frame
/// (plus the final frame) is persisted as a key.
pub fn animate(scene: &Scene, params: &AnimateParams, rng: &mut impl Rng) -> CameraPath {
    let start = CameraPose {
        position: scene.camera.position,
        orientation: scene.camera.orientation,
    };

    let mut keys = Vec::new();

    // Stall bracket: two keys pin the hold, whatever the interval is.
    keys.push(CameraKey {
        frame: 0,
        pose: start,
    });
    if params.stall_frames > 0 {
        keys.push(CameraKey {
            frame: params.stall_frames,
            pose: start,
        });
    }

    let drift = rng.random_range(-params.drift_range..=params.drift_range);
    let travel = rng.random_range(0.5..=params.move_distance);
    let rise = rng.random_range(0.0..=params.rise_amount);
    let end_position = Vec3::new(
        start.position.x + drift,
        start.position.y - travel,
        start.position.z + rise,
    );

    let span = params.total_frames - params.stall_frames;
    for frame in params.stall_frames + 1..=params.total_frames {
        let moved = frame - params.stall_frames;
        if moved % params.keyframe_interval != 0 && frame != params.total_frames {
            continue;
        }

        let t = moved as f64 / span as f64;
        let position = Vec3::lerp(&start.position, &end_position, t);
        let orientation = Quat::looking_along(Vec3::ZERO - position);
        keys.push(CameraKey {
            frame,
            pose: CameraPose {
                position,
                orientation,
            },
        });
    }

    CameraPath { keys }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::{SceneParams, SceneSynthesizer};
    use rand::{SeedableRng as _, rngs::StdRng};

    fn test_scene(dir: &tempfile::TempDir) -> Scene {
        let path = dir.path().join("page.png");
        image::RgbaImage::from_pixel(64, 40, image::Rgba([255, 255, 255, 255]))
            .save(&path)
            .unwrap();
        SceneSynthesizer::new(SceneParams {
            subdivision_cuts: 2,
            edge_displace_strength: 0.0,
            edge_noise_scale: 10.0,
            warp_strength: 0.0,
            warp_noise_scale: 1.0,
            camera_standoff: 1.5,
        })
        .build(&path, &mut StdRng::seed_from_u64(1))
        .unwrap()
    }

    fn pan_params() -> AnimateParams {
        AnimateParams {
            total_frames: 120,
            stall_frames: 10,
            move_distance: 5.0,
            rise_amount: 1.0,
            drift_range: 1.0,
            keyframe_interval: 20,
        }
    }

    #[test]
    fn keyframes_land_on_stall_interval_and_final() {
        let dir = tempfile::tempdir().unwrap();
        let scene = test_scene(&dir);
        let path = animate(&scene, &pan_params(), &mut StdRng::seed_from_u64(5));
        assert_eq!(path.key_frames(), [0, 10, 30, 50, 70, 90, 110, 120]);
    }

    #[test]
    fn camera_holds_its_pose_through_the_stall() {
        let dir = tempfile::tempdir().unwrap();
        let scene = test_scene(&dir);
        let path = animate(&scene, &pan_params(), &mut StdRng::seed_from_u64(5));

        let at0 = path.pose_at(0);
        for frame in [3, 7, 10] {
            let pose = path.pose_at(frame);
            assert!((pose.position - at0.position).length() < 1e-12);
        }
        // After the stall the camera starts moving.
        let later = path.pose_at(40);
        assert!((later.position - at0.position).length() > 1e-6);
    }

    #[test]
    fn end_pose_stays_within_the_drawn_ranges() {
        let dir = tempfile::tempdir().unwrap();
        let scene = test_scene(&dir);
        let params = pan_params();
        for seed in 0..16 {
            let path = animate(&scene, &params, &mut StdRng::seed_from_u64(seed));
            let end = path.keys.last().unwrap().pose.position;
            let start = path.keys[0].pose.position;
            assert!((end.x - start.x).abs() <= params.drift_range + 1e-9);
            let travel = start.y - end.y;
            assert!((0.5..=params.move_distance + 1e-9).contains(&travel));
            let rise = end.z - start.z;
            assert!((0.0..=params.rise_amount + 1e-9).contains(&rise));
        }
    }

    #[test]
    fn moving_keys_face_the_origin() {
        let dir = tempfile::tempdir().unwrap();
        let scene = test_scene(&dir);
        let path = animate(&scene, &pan_params(), &mut StdRng::seed_from_u64(9));

        for key in path.keys.iter().filter(|k| k.frame > 10) {
            let forward = key.pose.orientation.rotate(Vec3::new(0.0, 0.0, -1.0));
            let to_origin = (Vec3::ZERO - key.pose.position).normalized();
            assert!(
                (forward - to_origin).length() < 1e-9,
                "frame {} does not face the origin",
                key.frame
            );
        }
    }

    #[test]
    fn pose_at_clamps_outside_the_range() {
        let dir = tempfile::tempdir().unwrap();
        let scene = test_scene(&dir);
        let path = animate(&scene, &pan_params(), &mut StdRng::seed_from_u64(2));
        assert_eq!(path.pose_at(999), path.keys.last().unwrap().pose);
    }

    #[test]
    fn repeated_animate_calls_start_fresh() {
        let dir = tempfile::tempdir().unwrap();
        let scene = test_scene(&dir);
        let a = animate(&scene, &pan_params(), &mut StdRng::seed_from_u64(21));
        let b = animate(&scene, &pan_params(), &mut StdRng::seed_from_u64(21));
        assert_eq!(a.keys.len(), b.keys.len());
        assert_eq!(a.keys[0], b.keys[0]);
        assert_eq!(a.keys.last(), b.keys.last());
    }
}
