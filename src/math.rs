//! Small numeric core: 3D vector/quaternion types, linear interpolation,
//! and the hash-lattice value noise that drives the procedural deformations.

pub trait Lerp: Sized {
    fn lerp(a: &Self, b: &Self, t: f64) -> Self;
}

impl Lerp for f64 {
    fn lerp(a: &Self, b: &Self, t: f64) -> Self {
        a + (b - a) * t
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Vec3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vec3 {
    pub const ZERO: Self = Self {
        x: 0.0,
        y: 0.0,
        z: 0.0,
    };

    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn dot(self, rhs: Self) -> f64 {
        self.x * rhs.x + self.y * rhs.y + self.z * rhs.z
    }

    pub fn cross(self, rhs: Self) -> Self {
        Self::new(
            self.y * rhs.z - self.z * rhs.y,
            self.z * rhs.x - self.x * rhs.z,
            self.x * rhs.y - self.y * rhs.x,
        )
    }

    pub fn length(self) -> f64 {
        self.dot(self).sqrt()
    }

    pub fn normalized(self) -> Self {
        let len = self.length();
        if len <= f64::EPSILON {
            return Self::ZERO;
        }
        self * (1.0 / len)
    }

}

impl std::ops::Add for Vec3 {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        Self::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl std::ops::Sub for Vec3 {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self {
        Self::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl std::ops::Mul<f64> for Vec3 {
    type Output = Self;
    fn mul(self, rhs: f64) -> Self {
        Self::new(self.x * rhs, self.y * rhs, self.z * rhs)
    }
}

impl std::ops::Neg for Vec3 {
    type Output = Self;
    fn neg(self) -> Self {
        Self::new(-self.x, -self.y, -self.z)
    }
}

impl Lerp for Vec3 {
    fn lerp(a: &Self, b: &Self, t: f64) -> Self {
        Self::new(
            a.x + (b.x - a.x) * t,
            a.y + (b.y - a.y) * t,
            a.z + (b.z - a.z) * t,
        )
    }
}

/// Unit quaternion. Identity is a camera looking along -Z with +Y up.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Quat {
    pub w: f64,
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Quat {
    pub const IDENTITY: Self = Self {
        w: 1.0,
        x: 0.0,
        y: 0.0,
        z: 0.0,
    };

    /// Orientation whose local -Z points along `forward`, with local +Y
    /// steered toward world +Z (the tracking convention of the renderer).
    /// Falls back to world +Y when `forward` is (anti)parallel to +Z, which
    /// covers the straight-down starting pose.
    pub fn looking_along(forward: Vec3) -> Self {
        let back = (-forward).normalized();
        if back.length() <= f64::EPSILON {
            return Self::IDENTITY;
        }

        let mut right = Vec3::new(0.0, 0.0, 1.0).cross(back);
        if right.length() <= 1e-9 {
            right = Vec3::new(0.0, 1.0, 0.0).cross(back);
        }
        let right = right.normalized();
        let up = back.cross(right);

        Self::from_axes(right, up, back)
    }

    /// Build from an orthonormal basis (columns of the rotation matrix).
    pub fn from_axes(right: Vec3, up: Vec3, back: Vec3) -> Self {
        let (m00, m01, m02) = (right.x, up.x, back.x);
        let (m10, m11, m12) = (right.y, up.y, back.y);
        let (m20, m21, m22) = (right.z, up.z, back.z);

        let trace = m00 + m11 + m22;
        let q = if trace > 0.0 {
            let s = (trace + 1.0).sqrt() * 2.0;
            Self {
                w: 0.25 * s,
                x: (m21 - m12) / s,
                y: (m02 - m20) / s,
                z: (m10 - m01) / s,
            }
        } else if m00 > m11 && m00 > m22 {
            let s = (1.0 + m00 - m11 - m22).sqrt() * 2.0;
            Self {
                w: (m21 - m12) / s,
                x: 0.25 * s,
                y: (m01 + m10) / s,
                z: (m02 + m20) / s,
            }
        } else if m11 > m22 {
            let s = (1.0 + m11 - m00 - m22).sqrt() * 2.0;
            Self {
                w: (m02 - m20) / s,
                x: (m01 + m10) / s,
                y: 0.25 * s,
                z: (m12 + m21) / s,
            }
        } else {
            let s = (1.0 + m22 - m00 - m11).sqrt() * 2.0;
            Self {
                w: (m10 - m01) / s,
                x: (m02 + m20) / s,
                y: (m12 + m21) / s,
                z: 0.25 * s,
            }
        };
        q.normalized()
    }

    pub fn normalized(self) -> Self {
        let n = (self.w * self.w + self.x * self.x + self.y * self.y + self.z * self.z).sqrt();
        if n <= f64::EPSILON {
            return Self::IDENTITY;
        }
        Self {
            w: self.w / n,
            x: self.x / n,
            y: self.y / n,
            z: self.z / n,
        }
    }

    pub fn rotate(self, v: Vec3) -> Vec3 {
        // v' = v + 2 * qv x (qv x v + w*v)
        let qv = Vec3::new(self.x, self.y, self.z);
        let t = qv.cross(v) * 2.0;
        v + t * self.w + qv.cross(t)
    }
}

impl Lerp for Quat {
    /// Normalized lerp with hemisphere correction. Keyframes along a camera
    /// pan are close together, so nlerp is indistinguishable from slerp here.
    fn lerp(a: &Self, b: &Self, t: f64) -> Self {
        let dot = a.w * b.w + a.x * b.x + a.y * b.y + a.z * b.z;
        let sign = if dot < 0.0 { -1.0 } else { 1.0 };
        Self {
            w: a.w + (b.w * sign - a.w) * t,
            x: a.x + (b.x * sign - a.x) * t,
            y: a.y + (b.y * sign - a.y) * t,
            z: a.z + (b.z * sign - a.z) * t,
        }
        .normalized()
    }
}

#[derive(Clone, Copy, Debug)]
pub(crate) struct Fnv1a64(u64);

impl Fnv1a64 {
    const OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0000_0100_0000_01B3;

    pub(crate) fn new(seed: u64) -> Self {
        Self(Self::OFFSET_BASIS ^ seed.wrapping_mul(Self::PRIME))
    }

    pub(crate) fn write_i64(&mut self, v: i64) {
        let mut h = self.0;
        for b in v.to_le_bytes() {
            h ^= u64::from(b);
            h = h.wrapping_mul(Self::PRIME);
        }
        self.0 = h;
    }

    pub(crate) fn finish(self) -> u64 {
        self.0
    }
}

/// Fractal value noise over a seeded integer lattice. Stands in for the
/// cloud textures that drive edge tearing and paper creasing: `scale` is the
/// feature size, `octaves` the detail depth, and `hard` folds the field
/// around its midpoint for creased ridges.
#[derive(Clone, Copy, Debug)]
pub struct NoiseField {
    pub seed: u64,
    pub scale: f64,
    pub octaves: u32,
    pub hard: bool,
}

impl NoiseField {
    pub fn new(seed: u64, scale: f64) -> Self {
        Self {
            seed,
            scale,
            octaves: 1,
            hard: false,
        }
    }

    pub fn with_octaves(mut self, octaves: u32) -> Self {
        self.octaves = octaves.max(1);
        self
    }

    pub fn hard(mut self) -> Self {
        self.hard = true;
        self
    }

    /// Sample in `[0, 1]`.
    pub fn sample(&self, p: Vec3) -> f64 {
        let scale = if self.scale.abs() <= f64::EPSILON {
            1.0
        } else {
            self.scale
        };

        let mut total = 0.0;
        let mut amplitude = 1.0;
        let mut frequency = 1.0 / scale;
        let mut norm = 0.0;
        for octave in 0..self.octaves {
            total += self.value_at(p * frequency, u64::from(octave)) * amplitude;
            norm += amplitude;
            amplitude *= 0.5;
            frequency *= 2.0;
        }

        let n = total / norm;
        if self.hard { (2.0 * n - 1.0).abs() } else { n }
    }

    fn value_at(&self, p: Vec3, octave: u64) -> f64 {
        let (x0, fx) = split(p.x);
        let (y0, fy) = split(p.y);
        let (z0, fz) = split(p.z);

        let sx = smooth(fx);
        let sy = smooth(fy);
        let sz = smooth(fz);

        let mut corners = [0.0f64; 8];
        for (i, c) in corners.iter_mut().enumerate() {
            let dx = (i & 1) as i64;
            let dy = ((i >> 1) & 1) as i64;
            let dz = ((i >> 2) & 1) as i64;
            *c = self.lattice(x0 + dx, y0 + dy, z0 + dz, octave);
        }

        let x00 = f64::lerp(&corners[0], &corners[1], sx);
        let x10 = f64::lerp(&corners[2], &corners[3], sx);
        let x01 = f64::lerp(&corners[4], &corners[5], sx);
        let x11 = f64::lerp(&corners[6], &corners[7], sx);
        let y0v = f64::lerp(&x00, &x10, sy);
        let y1v = f64::lerp(&x01, &x11, sy);
        f64::lerp(&y0v, &y1v, sz)
    }

    fn lattice(&self, x: i64, y: i64, z: i64, octave: u64) -> f64 {
        let mut h = Fnv1a64::new(self.seed.wrapping_add(octave.wrapping_mul(0x9e37_79b9)));
        h.write_i64(x);
        h.write_i64(y);
        h.write_i64(z);
        (h.finish() >> 11) as f64 / (1u64 << 53) as f64
    }
}

fn split(v: f64) -> (i64, f64) {
    let floor = v.floor();
    (floor as i64, v - floor)
}

fn smooth(t: f64) -> f64 {
    t * t * (3.0 - 2.0 * t)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vec3_lerp_midpoint() {
        let a = Vec3::new(0.0, 0.0, 0.0);
        let b = Vec3::new(2.0, -4.0, 6.0);
        let m = Vec3::lerp(&a, &b, 0.5);
        assert_eq!(m, Vec3::new(1.0, -2.0, 3.0));
    }

    #[test]
    fn looking_straight_down_is_identity() {
        let q = Quat::looking_along(Vec3::new(0.0, 0.0, -1.0));
        let fwd = q.rotate(Vec3::new(0.0, 0.0, -1.0));
        assert!((fwd - Vec3::new(0.0, 0.0, -1.0)).length() < 1e-9);
        let up = q.rotate(Vec3::new(0.0, 1.0, 0.0));
        assert!((up - Vec3::new(0.0, 1.0, 0.0)).length() < 1e-9);
    }

    #[test]
    fn look_rotation_tracks_forward() {
        let dir = Vec3::new(0.3, -0.5, -0.8).normalized();
        let q = Quat::looking_along(dir);
        let fwd = q.rotate(Vec3::new(0.0, 0.0, -1.0));
        assert!((fwd - dir).length() < 1e-9);
        // rotation stays orthonormal
        let r = q.rotate(Vec3::new(1.0, 0.0, 0.0));
        let u = q.rotate(Vec3::new(0.0, 1.0, 0.0));
        assert!(r.dot(u).abs() < 1e-9);
        assert!((r.length() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn noise_is_deterministic_and_bounded() {
        let field = NoiseField::new(42, 2.0).with_octaves(2);
        let p = Vec3::new(0.7, -1.3, 4.2);
        let a = field.sample(p);
        let b = field.sample(p);
        assert_eq!(a, b);
        assert!((0.0..=1.0).contains(&a));

        let other = NoiseField::new(43, 2.0).with_octaves(2);
        assert_ne!(field.sample(p), other.sample(p));
    }

    #[test]
    fn hard_noise_folds_into_unit_range() {
        let field = NoiseField::new(7, 1.0).with_octaves(2).hard();
        for i in 0..32 {
            let v = field.sample(Vec3::new(f64::from(i) * 0.37, 0.1, -0.9));
            assert!((0.0..=1.0).contains(&v));
        }
    }
}
