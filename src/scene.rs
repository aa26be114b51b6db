//! Scene synthesis: one randomized "document as a 3D object" per work item.
//!
//! Every call to [`SceneSynthesizer::build`] produces a fresh, fully owned
//! [`Scene`]. The worker drops the previous item's scene before building the
//! next one, so no state can leak between items.

use std::path::{Path, PathBuf};

use anyhow::Context as _;
use rand::Rng;

use crate::{
    config::RunConfig,
    error::{PaperpanError, PaperpanResult},
    math::{NoiseField, Quat, Vec3},
};

/// Vertical resolution of every rendered frame; the horizontal resolution
/// follows the document's aspect ratio.
pub const BASE_RESOLUTION_Y: u32 = 1080;

#[derive(Clone, Copy, Debug, serde::Serialize, serde::Deserialize)]
pub struct SceneParams {
    pub subdivision_cuts: u32,
    pub edge_displace_strength: f64,
    pub edge_noise_scale: f64,
    pub warp_strength: f64,
    pub warp_noise_scale: f64,
    pub camera_standoff: f64,
}

impl From<&RunConfig> for SceneParams {
    fn from(cfg: &RunConfig) -> Self {
        Self {
            subdivision_cuts: cfg.subdivision_cuts,
            edge_displace_strength: cfg.edge_displace_strength,
            edge_noise_scale: cfg.edge_noise_scale,
            warp_strength: cfg.warp_strength,
            warp_noise_scale: cfg.warp_noise_scale,
            camera_standoff: cfg.camera_standoff,
        }
    }
}

/// Regular grid mesh over the document plane. Cells are quads; the renderer
/// splits each into two triangles.
#[derive(Clone, Debug)]
pub struct GridMesh {
    /// Vertices per side along x.
    pub cols: usize,
    /// Vertices per side along y.
    pub rows: usize,
    pub positions: Vec<Vec3>,
    /// Texture coordinates, `(u, v)` in `[0, 1]`, v = 0 at the top edge.
    pub uvs: Vec<(f64, f64)>,
    pub scale_x: f64,
    pub scale_y: f64,
}

impl GridMesh {
    /// Unit plane at the origin scaled to `(scale_x, scale_y)`, split into
    /// `cuts + 1` cells per side.
    pub fn plane(scale_x: f64, scale_y: f64, cuts: u32) -> Self {
        let cells = cuts as usize + 1;
        let cols = cells + 1;
        let rows = cells + 1;

        let mut positions = Vec::with_capacity(cols * rows);
        let mut uvs = Vec::with_capacity(cols * rows);
        for row in 0..rows {
            let v = row as f64 / (rows - 1) as f64;
            for col in 0..cols {
                let u = col as f64 / (cols - 1) as f64;
                positions.push(Vec3::new(
                    (u - 0.5) * scale_x,
                    (0.5 - v) * scale_y,
                    0.0,
                ));
                uvs.push((u, v));
            }
        }

        Self {
            cols,
            rows,
            positions,
            uvs,
            scale_x,
            scale_y,
        }
    }

    pub fn vertex_count(&self) -> usize {
        self.cols * self.rows
    }

    fn index(&self, col: usize, row: usize) -> usize {
        row * self.cols + col
    }

    /// Split every cell in four, bilinearly interpolating positions and uvs.
    /// Prior displacement survives the refinement.
    pub fn subdivide(&mut self) {
        let new_cols = (self.cols - 1) * 2 + 1;
        let new_rows = (self.rows - 1) * 2 + 1;

        let mut positions = Vec::with_capacity(new_cols * new_rows);
        let mut uvs = Vec::with_capacity(new_cols * new_rows);
        for row in 0..new_rows {
            let fy = row as f64 / 2.0;
            let y0 = (fy.floor() as usize).min(self.rows - 1);
            let y1 = (y0 + 1).min(self.rows - 1);
            let ty = fy - y0 as f64;
            for col in 0..new_cols {
                let fx = col as f64 / 2.0;
                let x0 = (fx.floor() as usize).min(self.cols - 1);
                let x1 = (x0 + 1).min(self.cols - 1);
                let tx = fx - x0 as f64;

                let lerp2 = |a: Vec3, b: Vec3, c: Vec3, d: Vec3| {
                    use crate::math::Lerp as _;
                    let top = Vec3::lerp(&a, &b, tx);
                    let bottom = Vec3::lerp(&c, &d, tx);
                    Vec3::lerp(&top, &bottom, ty)
                };
                positions.push(lerp2(
                    self.positions[self.index(x0, y0)],
                    self.positions[self.index(x1, y0)],
                    self.positions[self.index(x0, y1)],
                    self.positions[self.index(x1, y1)],
                ));

                let (ua, va) = self.uvs[self.index(x0, y0)];
                let (ub, vb) = self.uvs[self.index(x1, y0)];
                let (uc, vc) = self.uvs[self.index(x0, y1)];
                let (ud, vd) = self.uvs[self.index(x1, y1)];
                let u = (ua + (ub - ua) * tx) + ((uc + (ud - uc) * tx) - (ua + (ub - ua) * tx)) * ty;
                let v = (va + (vb - va) * tx) + ((vc + (vd - vc) * tx) - (va + (vb - va) * tx)) * ty;
                uvs.push((u, v));
            }
        }

        self.cols = new_cols;
        self.rows = new_rows;
        self.positions = positions;
        self.uvs = uvs;
    }

    /// Vertex indices on the mesh boundary, computed from edge-to-face
    /// adjacency: a vertex is on the boundary when it touches an edge with
    /// exactly one adjacent face.
    pub fn boundary_vertices(&self) -> Vec<usize> {
        use std::collections::HashMap;

        let mut edge_faces: HashMap<(usize, usize), u32> = HashMap::new();
        let mut bump = |a: usize, b: usize, map: &mut HashMap<(usize, usize), u32>| {
            let key = (a.min(b), a.max(b));
            *map.entry(key).or_insert(0) += 1;
        };

        for row in 0..self.rows - 1 {
            for col in 0..self.cols - 1 {
                let v00 = self.index(col, row);
                let v10 = self.index(col + 1, row);
                let v01 = self.index(col, row + 1);
                let v11 = self.index(col + 1, row + 1);
                bump(v00, v10, &mut edge_faces);
                bump(v10, v11, &mut edge_faces);
                bump(v11, v01, &mut edge_faces);
                bump(v01, v00, &mut edge_faces);
            }
        }

        let mut on_boundary = vec![false; self.vertex_count()];
        for ((a, b), faces) in edge_faces {
            if faces == 1 {
                on_boundary[a] = true;
                on_boundary[b] = true;
            }
        }

        (0..self.vertex_count()).filter(|&i| on_boundary[i]).collect()
    }

    /// Triangle index list (two per cell, counter-clockwise).
    pub fn triangles(&self) -> Vec<[usize; 3]> {
        let mut tris = Vec::with_capacity((self.cols - 1) * (self.rows - 1) * 2);
        for row in 0..self.rows - 1 {
            for col in 0..self.cols - 1 {
                let v00 = self.index(col, row);
                let v10 = self.index(col + 1, row);
                let v01 = self.index(col, row + 1);
                let v11 = self.index(col + 1, row + 1);
                tris.push([v00, v11, v10]);
                tris.push([v00, v01, v11]);
            }
        }
        tris
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LightKind {
    Point,
    Directional,
    Area,
}

#[derive(Clone, Debug)]
pub struct Light {
    pub kind: LightKind,
    pub position: Vec3,
    pub energy: f64,
    pub color: [f64; 3],
}

/// Camera hovering above the document, plus the output framing derived from
/// the document's aspect ratio.
#[derive(Clone, Debug)]
pub struct CameraRig {
    pub position: Vec3,
    pub orientation: Quat,
    /// World-space extent the camera is expected to keep in frame.
    pub framing_scale: f64,
    pub resolution_x: u32,
    pub resolution_y: u32,
}

/// Fully built per-item scene. Ephemeral: lives exactly as long as one work
/// item takes to render.
#[derive(Clone, Debug)]
pub struct Scene {
    pub source_path: PathBuf,
    pub mesh: GridMesh,
    pub texture: image::RgbaImage,
    pub camera: CameraRig,
    pub light: Light,
}

/// Builds one randomized scene per source image.
#[derive(Clone, Debug)]
pub struct SceneSynthesizer {
    params: SceneParams,
}

impl SceneSynthesizer {
    pub fn new(params: SceneParams) -> Self {
        Self { params }
    }

    pub fn build(&self, image_path: &Path, rng: &mut impl Rng) -> PaperpanResult<Scene> {
        let texture = image::open(image_path)
            .with_context(|| format!("load source image '{}'", image_path.display()))?
            .to_rgba8();
        let (width, height) = texture.dimensions();
        if width == 0 || height == 0 {
            return Err(PaperpanError::render(format!(
                "source image '{}' has a zero dimension",
                image_path.display()
            )));
        }

        let aspect = f64::from(width) / f64::from(height);
        let mut mesh = GridMesh::plane(aspect, 1.0, self.params.subdivision_cuts);

        self.add_jagged_edges(&mut mesh, rng);
        mesh.subdivide();
        self.add_paper_warp(&mut mesh, rng);

        let camera = camera_for_mesh(&mesh, self.params.camera_standoff);
        let light = random_light(rng);

        Ok(Scene {
            source_path: image_path.to_path_buf(),
            mesh,
            texture,
            camera,
            light,
        })
    }

    /// Tear up the document outline: displace only boundary vertices along
    /// the plane normal by a fresh noise field.
    fn add_jagged_edges(&self, mesh: &mut GridMesh, rng: &mut impl Rng) {
        let noise = NoiseField::new(rng.random(), self.params.edge_noise_scale);
        for idx in mesh.boundary_vertices() {
            let p = mesh.positions[idx];
            let offset = (noise.sample(p) - 0.5) * self.params.edge_displace_strength;
            mesh.positions[idx].z += offset;
        }
    }

    /// Crease and buckle the whole sheet: volumetric displacement from an
    /// independently anchored hard noise field. Strength is jittered by
    /// [0.8, 1.2] and the displacement midpoint by ±0.1.
    fn add_paper_warp(&self, mesh: &mut GridMesh, rng: &mut impl Rng) {
        let anchor = Vec3::new(
            rng.random_range(-10.0..10.0),
            rng.random_range(-10.0..10.0),
            rng.random_range(-10.0..10.0),
        );
        let noise = NoiseField::new(rng.random(), self.params.warp_noise_scale)
            .with_octaves(2)
            .hard();
        let strength = self.params.warp_strength * rng.random_range(0.8..1.2);
        let mid_level = 0.5 + rng.random_range(-0.1..0.1);

        for p in &mut mesh.positions {
            let offset = (noise.sample(*p + anchor) - mid_level) * strength;
            p.z += offset;
        }
    }
}

/// Camera at a fixed standoff straight above the mesh, facing down, with the
/// output resolution derived from the mesh aspect ratio.
fn camera_for_mesh(mesh: &GridMesh, standoff: f64) -> CameraRig {
    let aspect = mesh.scale_x / mesh.scale_y;
    let resolution_y = BASE_RESOLUTION_Y;
    let resolution_x = (aspect * f64::from(resolution_y)).round() as u32;

    CameraRig {
        position: Vec3::new(0.0, 0.0, standoff),
        orientation: Quat::looking_along(Vec3::new(0.0, 0.0, -1.0)),
        framing_scale: mesh.scale_x.max(mesh.scale_y) * 2.0,
        resolution_x,
        resolution_y,
    }
}

/// One light per scene, kind chosen uniformly, brightness range per kind,
/// color softly jittered around a small fixed palette.
fn random_light(rng: &mut impl Rng) -> Light {
    let kind = match rng.random_range(0..3) {
        0 => LightKind::Point,
        1 => LightKind::Directional,
        _ => LightKind::Area,
    };

    let energy = match kind {
        LightKind::Directional => rng.random_range(1.0..5.0),
        LightKind::Point => rng.random_range(500.0..1500.0),
        LightKind::Area => rng.random_range(100.0..1000.0),
    };

    let position = Vec3::new(
        rng.random_range(-2.0..2.0),
        rng.random_range(-2.0..2.0),
        rng.random_range(2.0..5.0),
    );

    const PALETTE: [[f64; 3]; 4] = [
        [1.0, 1.0, 1.0],   // white
        [1.0, 0.95, 0.85], // warm
        [0.85, 0.9, 1.0],  // cool
        [1.0, 1.0, 0.9],   // daylight
    ];
    let base = PALETTE[rng.random_range(0..PALETTE.len())];
    let mut color = [0.0f64; 3];
    for (c, b) in color.iter_mut().zip(base) {
        *c = (b + rng.random_range(-0.05..0.05)).clamp(0.0, 1.0);
    }

    Light {
        kind,
        position,
        energy,
        color,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{SeedableRng as _, rngs::StdRng};

    fn params() -> SceneParams {
        SceneParams {
            subdivision_cuts: 6,
            edge_displace_strength: 0.05,
            edge_noise_scale: 10.0,
            warp_strength: 0.05,
            warp_noise_scale: 1.0,
            camera_standoff: 1.5,
        }
    }

    fn write_test_image(dir: &Path, name: &str, w: u32, h: u32) -> PathBuf {
        let path = dir.join(name);
        image::RgbaImage::from_pixel(w, h, image::Rgba([200, 180, 150, 255]))
            .save(&path)
            .unwrap();
        path
    }

    #[test]
    fn plane_mesh_spans_the_scaled_extents() {
        let mesh = GridMesh::plane(1.6, 1.0, 3);
        assert_eq!(mesh.cols, 5);
        assert_eq!(mesh.rows, 5);
        let min_x = mesh.positions.iter().map(|p| p.x).fold(f64::MAX, f64::min);
        let max_x = mesh.positions.iter().map(|p| p.x).fold(f64::MIN, f64::max);
        assert!((min_x + 0.8).abs() < 1e-9);
        assert!((max_x - 0.8).abs() < 1e-9);
    }

    #[test]
    fn boundary_vertices_form_the_outer_ring() {
        let mesh = GridMesh::plane(1.0, 1.0, 2);
        // 4x4 grid: 16 vertices, 12 on the ring.
        let boundary = mesh.boundary_vertices();
        assert_eq!(boundary.len(), 12);
        assert!(!boundary.contains(&mesh.index(1, 1)));
        assert!(boundary.contains(&mesh.index(0, 0)));
        assert!(boundary.contains(&mesh.index(3, 2)));
    }

    #[test]
    fn subdivide_doubles_cells_and_keeps_extents() {
        let mut mesh = GridMesh::plane(2.0, 1.0, 1);
        let before_cols = mesh.cols;
        mesh.subdivide();
        assert_eq!(mesh.cols, (before_cols - 1) * 2 + 1);
        let max_x = mesh.positions.iter().map(|p| p.x).fold(f64::MIN, f64::max);
        assert!((max_x - 1.0).abs() < 1e-9);
    }

    #[test]
    fn scene_scale_and_resolution_follow_the_source_aspect() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_test_image(dir.path(), "page.png", 1600, 1000);

        let mut rng = StdRng::seed_from_u64(7);
        let scene = SceneSynthesizer::new(params()).build(&path, &mut rng).unwrap();

        assert!((scene.mesh.scale_x - 1.6).abs() < 1e-9);
        assert!((scene.mesh.scale_y - 1.0).abs() < 1e-9);
        assert_eq!(scene.camera.resolution_x, 1728);
        assert_eq!(scene.camera.resolution_y, 1080);
        assert!((scene.camera.framing_scale - 3.2).abs() < 1e-9);
    }

    #[test]
    fn jagged_edges_leave_interior_flat() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_test_image(dir.path(), "page.png", 100, 100);

        let mut p = params();
        p.warp_strength = 0.0; // isolate the edge pass
        let mut rng = StdRng::seed_from_u64(11);
        let scene = SceneSynthesizer::new(p).build(&path, &mut rng).unwrap();

        let mesh = &scene.mesh;
        let displaced = mesh.positions.iter().filter(|p| p.z.abs() > 1e-12).count();
        assert!(displaced > 0, "some boundary vertices must move");
        // The strict interior (away from the refined boundary band) stays flat.
        let mid = mesh.positions[mesh.index(mesh.cols / 2, mesh.rows / 2)];
        assert!(mid.z.abs() < 1e-12);
    }

    #[test]
    fn paper_warp_displaces_the_interior() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_test_image(dir.path(), "page.png", 100, 100);

        let mut p = params();
        p.edge_displace_strength = 0.0;
        let mut rng = StdRng::seed_from_u64(13);
        let scene = SceneSynthesizer::new(p).build(&path, &mut rng).unwrap();

        let mesh = &scene.mesh;
        let mid = mesh.positions[mesh.index(mesh.cols / 2, mesh.rows / 2)];
        let any_interior_moved = (1..mesh.rows - 1).any(|row| {
            (1..mesh.cols - 1).any(|col| mesh.positions[mesh.index(col, row)].z.abs() > 1e-12)
        });
        assert!(any_interior_moved || mid.z.abs() > 1e-12);
    }

    #[test]
    fn seeded_builds_replay_identically() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_test_image(dir.path(), "page.png", 120, 80);

        let synth = SceneSynthesizer::new(params());
        let a = synth
            .build(&path, &mut StdRng::seed_from_u64(99))
            .unwrap();
        let b = synth
            .build(&path, &mut StdRng::seed_from_u64(99))
            .unwrap();

        assert_eq!(a.light.kind, b.light.kind);
        assert_eq!(a.light.energy, b.light.energy);
        assert_eq!(a.mesh.positions.len(), b.mesh.positions.len());
        for (pa, pb) in a.mesh.positions.iter().zip(&b.mesh.positions) {
            assert_eq!(pa, pb);
        }
    }

    #[test]
    fn light_palette_stays_in_unit_range() {
        let mut rng = StdRng::seed_from_u64(3);
        for _ in 0..64 {
            let light = random_light(&mut rng);
            for c in light.color {
                assert!((0.0..=1.0).contains(&c));
            }
            assert!(light.energy > 0.0);
            assert!(light.position.z >= 2.0);
        }
    }
}
