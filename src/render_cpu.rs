//! Built-in CPU frame renderer: a small z-buffered rasterizer for the
//! textured document plane with single-light Lambert shading.
//!
//! This is the shipped stand-in behind the [`FrameRenderer`] boundary. It
//! keeps to the same contract as any external engine would: scene in, one
//! PNG out, no state carried between frames.

use std::path::Path;

use anyhow::Context as _;

use crate::{
    camera_anim::{CameraPath, CameraPose},
    error::{PaperpanError, PaperpanResult},
    math::Vec3,
    render::FrameRenderer,
    scene::{Light, LightKind, Scene},
};

const AMBIENT: f64 = 0.15;
const CLEAR_RGBA: [u8; 4] = [18, 20, 28, 255];

#[derive(Clone, Copy, Debug, Default)]
pub struct CpuRenderer;

impl CpuRenderer {
    pub fn new() -> Self {
        Self
    }
}

impl FrameRenderer for CpuRenderer {
    fn render_frame(
        &mut self,
        scene: &Scene,
        path: &CameraPath,
        frame: u64,
        out_path: &Path,
    ) -> PaperpanResult<()> {
        let pose = path.pose_at(frame);
        let image = rasterize(scene, path, pose)?;

        image::save_buffer_with_format(
            out_path,
            &image.data,
            image.width,
            image.height,
            image::ColorType::Rgba8,
            image::ImageFormat::Png,
        )
        .with_context(|| format!("write frame '{}'", out_path.display()))?;
        Ok(())
    }
}

struct RasterFrame {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

struct ViewBasis {
    origin: Vec3,
    right: Vec3,
    up: Vec3,
    forward: Vec3,
}

impl ViewBasis {
    fn from_pose(pose: CameraPose) -> Self {
        Self {
            origin: pose.position,
            right: pose.orientation.rotate(Vec3::new(1.0, 0.0, 0.0)),
            up: pose.orientation.rotate(Vec3::new(0.0, 1.0, 0.0)),
            forward: pose.orientation.rotate(Vec3::new(0.0, 0.0, -1.0)),
        }
    }

    /// World point to (view-space x, y, depth-in-front-of-camera).
    fn to_view(&self, p: Vec3) -> Vec3 {
        let d = p - self.origin;
        Vec3::new(d.dot(self.right), d.dot(self.up), d.dot(self.forward))
    }
}

fn rasterize(scene: &Scene, path: &CameraPath, pose: CameraPose) -> PaperpanResult<RasterFrame> {
    let width = scene.camera.resolution_x;
    let height = scene.camera.resolution_y;
    if width == 0 || height == 0 {
        return Err(PaperpanError::render("camera resolution must be non-zero"));
    }

    let view = ViewBasis::from_pose(pose);

    // Field of view chosen so the configured framing extent fills the image
    // width at the starting standoff distance.
    let start_distance = path
        .keys
        .first()
        .map(|k| k.pose.position.length())
        .unwrap_or_else(|| pose.position.length())
        .max(1e-6);
    let tan_half_x = (scene.camera.framing_scale * 0.5) / start_distance;
    let tan_half_y = tan_half_x * f64::from(height) / f64::from(width);

    let mut data = vec![0u8; (width * height * 4) as usize];
    for px in data.chunks_exact_mut(4) {
        px.copy_from_slice(&CLEAR_RGBA);
    }
    let mut depth = vec![f64::INFINITY; (width * height) as usize];

    let mesh = &scene.mesh;
    let project = |p: Vec3| -> Option<(f64, f64, f64)> {
        let v = view.to_view(p);
        if v.z <= 1e-6 {
            return None;
        }
        let ndc_x = (v.x / v.z) / tan_half_x;
        let ndc_y = (v.y / v.z) / tan_half_y;
        let sx = (ndc_x * 0.5 + 0.5) * f64::from(width - 1);
        let sy = (0.5 - ndc_y * 0.5) * f64::from(height - 1);
        Some((sx, sy, v.z))
    };

    for tri in mesh.triangles() {
        let [ia, ib, ic] = tri;
        let (pa, pb, pc) = (mesh.positions[ia], mesh.positions[ib], mesh.positions[ic]);
        let (Some(a), Some(b), Some(c)) = (project(pa), project(pb), project(pc)) else {
            continue;
        };

        let normal = (pb - pa).cross(pc - pa).normalized();

        let min_x = a.0.min(b.0).min(c.0).floor().max(0.0) as u32;
        let max_x = (a.0.max(b.0).max(c.0).ceil() as i64).clamp(0, i64::from(width - 1)) as u32;
        let min_y = a.1.min(b.1).min(c.1).floor().max(0.0) as u32;
        let max_y = (a.1.max(b.1).max(c.1).ceil() as i64).clamp(0, i64::from(height - 1)) as u32;
        if min_x > max_x || min_y > max_y {
            continue;
        }

        let area = edge(a, b, c.0, c.1);
        if area.abs() <= f64::EPSILON {
            continue;
        }

        for y in min_y..=max_y {
            for x in min_x..=max_x {
                let (fx, fy) = (f64::from(x) + 0.5, f64::from(y) + 0.5);
                let w0 = edge(b, c, fx, fy) / area;
                let w1 = edge(c, a, fx, fy) / area;
                let w2 = edge(a, b, fx, fy) / area;
                if w0 < 0.0 || w1 < 0.0 || w2 < 0.0 {
                    continue;
                }

                let z = w0 * a.2 + w1 * b.2 + w2 * c.2;
                let pixel = (y * width + x) as usize;
                if z >= depth[pixel] {
                    continue;
                }
                depth[pixel] = z;

                let (ua, va) = mesh.uvs[ia];
                let (ub, vb) = mesh.uvs[ib];
                let (uc, vc) = mesh.uvs[ic];
                let u = w0 * ua + w1 * ub + w2 * uc;
                let v = w0 * va + w1 * vb + w2 * vc;
                let tex = sample_texture(&scene.texture, u, v);

                let world = pa * w0 + pb * w1 + pc * w2;
                let shade = shade_at(&scene.light, world, normal);

                let out = &mut data[pixel * 4..pixel * 4 + 4];
                for ch in 0..3 {
                    let lit = f64::from(tex[ch]) * shade[ch];
                    out[ch] = lit.round().clamp(0.0, 255.0) as u8;
                }
                out[3] = 255;
            }
        }
    }

    Ok(RasterFrame {
        width,
        height,
        data,
    })
}

fn edge(a: (f64, f64, f64), b: (f64, f64, f64), px: f64, py: f64) -> f64 {
    (b.0 - a.0) * (py - a.1) - (b.1 - a.1) * (px - a.0)
}

fn sample_texture(texture: &image::RgbaImage, u: f64, v: f64) -> [u8; 4] {
    let (w, h) = texture.dimensions();
    let x = (u.clamp(0.0, 1.0) * f64::from(w - 1)).round() as u32;
    let y = (v.clamp(0.0, 1.0) * f64::from(h - 1)).round() as u32;
    texture.get_pixel(x, y).0
}

/// Ambient plus single-bounce Lambert, with a per-kind mapping from the
/// configured light energy to a unitless irradiance.
fn shade_at(light: &Light, point: Vec3, normal: Vec3) -> [f64; 3] {
    let n = if normal.z < 0.0 { -normal } else { normal };

    let (dir, irradiance) = match light.kind {
        LightKind::Directional => (light.position.normalized(), light.energy / 5.0),
        LightKind::Point => {
            let to_light = light.position - point;
            let d2 = to_light.dot(to_light).max(1e-6);
            (
                to_light.normalized(),
                light.energy / (4.0 * std::f64::consts::PI * d2) / 10.0,
            )
        }
        LightKind::Area => {
            let to_light = light.position - point;
            let d2 = to_light.dot(to_light).max(1e-6);
            (
                to_light.normalized(),
                light.energy / (4.0 * std::f64::consts::PI * d2) / 4.0,
            )
        }
    };

    let lambert = n.dot(dir).max(0.0);
    let mut shade = [0.0f64; 3];
    for (s, c) in shade.iter_mut().zip(light.color) {
        *s = (AMBIENT + irradiance * lambert * c).clamp(0.0, 1.0);
    }
    shade
}
