//! Frustum extraction and per-frame cull parameters.
//!
//! Extracts frustum planes from the view-projection matrix and packs them,
//! with the camera position and cull distance, into the uniform the vote
//! stage reads. The host-side predicate here is the exact mirror of the
//! WGSL one, so reference results match the device bit for bit away from
//! plane boundaries.

use bytemuck::{Pod, Zeroable};

use crate::layout::DispatchLayout;

/// A plane in 3D space (Ax + By + Cz + D = 0).
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Pod, Zeroable)]
pub struct Plane {
    /// Normal X component.
    pub a: f32,
    /// Normal Y component.
    pub b: f32,
    /// Normal Z component.
    pub c: f32,
    /// Distance from origin.
    pub d: f32,
}

impl Plane {
    /// Creates a new plane.
    #[must_use]
    pub const fn new(a: f32, b: f32, c: f32, d: f32) -> Self {
        Self { a, b, c, d }
    }

    /// Normalizes the plane.
    #[must_use]
    pub fn normalized(self) -> Self {
        let len = (self.a * self.a + self.b * self.b + self.c * self.c).sqrt();
        if len > 0.0 {
            Self {
                a: self.a / len,
                b: self.b / len,
                c: self.c / len,
                d: self.d / len,
            }
        } else {
            self
        }
    }

    /// Returns the signed distance from a point to the plane.
    #[inline]
    #[must_use]
    pub fn distance_to_point(&self, p: [f32; 3]) -> f32 {
        self.a * p[0] + self.b * p[1] + self.c * p[2] + self.d
    }

    /// Converts to array format.
    #[must_use]
    pub const fn as_array(&self) -> [f32; 4] {
        [self.a, self.b, self.c, self.d]
    }

    /// Reads the `[a, b, c, d]` uniform layout.
    #[must_use]
    pub const fn from_array(v: [f32; 4]) -> Self {
        Self::new(v[0], v[1], v[2], v[3])
    }
}

/// View frustum for culling.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Frustum {
    /// Left, right, bottom, top, near, far planes.
    pub planes: [Plane; 6],
}

impl Frustum {
    /// Left plane index.
    pub const LEFT: usize = 0;
    /// Right plane index.
    pub const RIGHT: usize = 1;
    /// Bottom plane index.
    pub const BOTTOM: usize = 2;
    /// Top plane index.
    pub const TOP: usize = 3;
    /// Near plane index.
    pub const NEAR: usize = 4;
    /// Far plane index.
    pub const FAR: usize = 5;

    /// Extracts frustum planes from a column-major view-projection matrix.
    ///
    /// Uses the `-w <= z <= w` clip volume. For zero-to-one depth
    /// projections the near plane is conservative (never culls too much).
    #[must_use]
    pub fn from_view_projection(m: &[[f32; 4]; 4]) -> Self {
        let row = |r: usize| [m[0][r], m[1][r], m[2][r], m[3][r]];
        let (r0, r1, r2, r3) = (row(0), row(1), row(2), row(3));
        let add = |x: [f32; 4], y: [f32; 4]| Plane::new(x[0] + y[0], x[1] + y[1], x[2] + y[2], x[3] + y[3]).normalized();
        let sub = |x: [f32; 4], y: [f32; 4]| Plane::new(x[0] - y[0], x[1] - y[1], x[2] - y[2], x[3] - y[3]).normalized();

        let mut planes = [Plane::default(); 6];
        planes[Self::LEFT] = add(r3, r0);
        planes[Self::RIGHT] = sub(r3, r0);
        planes[Self::BOTTOM] = add(r3, r1);
        planes[Self::TOP] = sub(r3, r1);
        planes[Self::NEAR] = add(r3, r2);
        planes[Self::FAR] = sub(r3, r2);

        Self { planes }
    }

    /// Converts planes to array format for GPU upload.
    #[must_use]
    pub fn as_arrays(&self) -> [[f32; 4]; 6] {
        self.planes.map(|p| p.as_array())
    }

    /// Rebuilds a frustum from uniform plane arrays.
    #[must_use]
    pub fn from_arrays(planes: &[[f32; 4]; 6]) -> Self {
        Self {
            planes: planes.map(Plane::from_array),
        }
    }

    /// Tests if a sphere intersects the frustum.
    ///
    /// Rejects only when the sphere lies wholly behind some plane, the same
    /// comparison the vote kernel makes.
    #[must_use]
    pub fn test_sphere(&self, center: [f32; 3], radius: f32) -> bool {
        !self
            .planes
            .iter()
            .any(|plane| plane.distance_to_point(center) < -radius)
    }
}

/// Which halves of the visibility predicate are active.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CullMode {
    /// Distance to camera only.
    DistanceOnly,
    /// View frustum only.
    FrustumOnly,
    /// Both tests must pass.
    #[default]
    DistanceAndFrustum,
}

impl CullMode {
    /// Flag bit: distance test enabled.
    pub const FLAG_DISTANCE: u32 = 1 << 0;
    /// Flag bit: frustum test enabled.
    pub const FLAG_FRUSTUM: u32 = 1 << 1;

    /// Flag word written into the uniform.
    #[must_use]
    pub const fn flags(self) -> u32 {
        match self {
            Self::DistanceOnly => Self::FLAG_DISTANCE,
            Self::FrustumOnly => Self::FLAG_FRUSTUM,
            Self::DistanceAndFrustum => Self::FLAG_DISTANCE | Self::FLAG_FRUSTUM,
        }
    }
}

/// Per-frame camera inputs to the vote stage.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameParams {
    /// Column-major view-projection matrix.
    pub view_proj: [[f32; 4]; 4],
    /// Camera world position.
    pub camera_position: [f32; 3],
    /// Instances farther than this are rejected.
    pub cull_distance: f32,
    /// Active predicate halves.
    pub mode: CullMode,
}

impl FrameParams {
    /// Creates frame params with both tests enabled.
    #[must_use]
    pub const fn new(view_proj: [[f32; 4]; 4], camera_position: [f32; 3], cull_distance: f32) -> Self {
        Self {
            view_proj,
            camera_position,
            cull_distance,
            mode: CullMode::DistanceAndFrustum,
        }
    }

    /// Distance-only params (no frustum test).
    #[must_use]
    pub const fn distance_only(camera_position: [f32; 3], cull_distance: f32) -> Self {
        Self {
            view_proj: IDENTITY,
            camera_position,
            cull_distance,
            mode: CullMode::DistanceOnly,
        }
    }

    /// Returns a copy with another predicate mode.
    #[must_use]
    pub const fn with_mode(mut self, mode: CullMode) -> Self {
        self.mode = mode;
        self
    }

    /// Packs the params and the current layout into the vote-stage uniform.
    #[must_use]
    pub fn to_uniform(&self, layout: &DispatchLayout) -> CullParams {
        let frustum = Frustum::from_view_projection(&self.view_proj);
        let p = self.camera_position;
        CullParams {
            view_proj: self.view_proj,
            frustum_planes: frustum.as_arrays(),
            camera_position: [p[0], p[1], p[2], self.cull_distance],
            counts: [
                layout.instance_count(),
                layout.num_blocks(),
                layout.padded_blocks(),
                self.mode.flags(),
            ],
        }
    }
}

/// Uniform block read by every stage.
///
/// Mirrors `struct CullParams` in the WGSL kernels.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Pod, Zeroable)]
pub struct CullParams {
    /// View-projection matrix.
    pub view_proj: [[f32; 4]; 4],
    /// Normalized frustum planes (left, right, bottom, top, near, far).
    pub frustum_planes: [[f32; 4]; 6],
    /// Camera position in xyz, cull distance in w.
    pub camera_position: [f32; 4],
    /// Instance count, block count, padded block count, mode flags.
    pub counts: [u32; 4],
}

impl CullParams {
    /// Size in bytes.
    pub const SIZE: usize = std::mem::size_of::<Self>();

    /// The visibility predicate, as evaluated by the vote kernel.
    #[must_use]
    pub fn is_visible(&self, center: [f32; 3], radius: f32) -> bool {
        let flags = self.counts[3];
        if flags & CullMode::FLAG_DISTANCE != 0 {
            let dx = center[0] - self.camera_position[0];
            let dy = center[1] - self.camera_position[1];
            let dz = center[2] - self.camera_position[2];
            if (dx * dx + dy * dy + dz * dz).sqrt() > self.camera_position[3] {
                return false;
            }
        }
        if flags & CullMode::FLAG_FRUSTUM != 0 {
            return Frustum::from_arrays(&self.frustum_planes).test_sphere(center, radius);
        }
        true
    }
}

/// Identity matrix.
pub const IDENTITY: [[f32; 4]; 4] = [
    [1.0, 0.0, 0.0, 0.0],
    [0.0, 1.0, 0.0, 0.0],
    [0.0, 0.0, 1.0, 0.0],
    [0.0, 0.0, 0.0, 1.0],
];

// =============================================================================
// CAMERA MATRICES (column-major, right-handed, -1..1 depth)
// =============================================================================

/// Multiplies two column-major matrices (`a * b`).
#[must_use]
pub fn mat4_mul(a: &[[f32; 4]; 4], b: &[[f32; 4]; 4]) -> [[f32; 4]; 4] {
    let mut out = [[0.0f32; 4]; 4];
    for (c, column) in out.iter_mut().enumerate() {
        for (r, value) in column.iter_mut().enumerate() {
            *value = (0..4).map(|k| a[k][r] * b[c][k]).sum();
        }
    }
    out
}

/// Right-handed perspective projection.
#[must_use]
pub fn perspective(fov_y_radians: f32, aspect: f32, near: f32, far: f32) -> [[f32; 4]; 4] {
    let f = 1.0 / (fov_y_radians * 0.5).tan();
    let range = near - far;
    [
        [f / aspect, 0.0, 0.0, 0.0],
        [0.0, f, 0.0, 0.0],
        [0.0, 0.0, (far + near) / range, -1.0],
        [0.0, 0.0, 2.0 * far * near / range, 0.0],
    ]
}

/// Symmetric orthographic projection of the box `[-half, half]^3`.
#[must_use]
pub fn orthographic(half_extent: f32) -> [[f32; 4]; 4] {
    let s = 1.0 / half_extent;
    [
        [s, 0.0, 0.0, 0.0],
        [0.0, s, 0.0, 0.0],
        [0.0, 0.0, s, 0.0],
        [0.0, 0.0, 0.0, 1.0],
    ]
}

/// Right-handed look-at view matrix.
#[must_use]
pub fn look_at(eye: [f32; 3], target: [f32; 3], up: [f32; 3]) -> [[f32; 4]; 4] {
    let sub = |a: [f32; 3], b: [f32; 3]| [a[0] - b[0], a[1] - b[1], a[2] - b[2]];
    let dot = |a: [f32; 3], b: [f32; 3]| a[0] * b[0] + a[1] * b[1] + a[2] * b[2];
    let cross = |a: [f32; 3], b: [f32; 3]| {
        [
            a[1] * b[2] - a[2] * b[1],
            a[2] * b[0] - a[0] * b[2],
            a[0] * b[1] - a[1] * b[0],
        ]
    };
    let normalize = |a: [f32; 3]| {
        let len = dot(a, a).sqrt();
        if len > 0.0 { [a[0] / len, a[1] / len, a[2] / len] } else { a }
    };

    let f = normalize(sub(target, eye));
    let s = normalize(cross(f, up));
    let u = cross(s, f);

    [
        [s[0], u[0], -f[0], 0.0],
        [s[1], u[1], -f[1], 0.0],
        [s[2], u[2], -f[2], 0.0],
        [-dot(s, eye), -dot(u, eye), dot(f, eye), 1.0],
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plane_normalization() {
        let plane = Plane::new(3.0, 4.0, 0.0, 10.0);
        let normalized = plane.normalized();

        // 3-4-5 triangle, so length is 5
        assert!((normalized.a - 0.6).abs() < 0.001);
        assert!((normalized.b - 0.8).abs() < 0.001);
        assert!((normalized.d - 2.0).abs() < 0.001);
    }

    #[test]
    fn test_orthographic_box() {
        let frustum = Frustum::from_view_projection(&orthographic(10.0));
        assert!(frustum.test_sphere([9.0, -9.0, 0.0], 0.1));
        assert!(!frustum.test_sphere([12.0, 0.0, 0.0], 1.0));
        // Sphere straddling the right plane still counts
        assert!(frustum.test_sphere([10.5, 0.0, 0.0], 1.0));
    }

    #[test]
    fn test_perspective_looks_down_negative_z() {
        let proj = perspective(std::f32::consts::FRAC_PI_2, 1.0, 0.1, 100.0);
        let view = look_at([0.0, 0.0, 0.0], [0.0, 0.0, -1.0], [0.0, 1.0, 0.0]);
        let frustum = Frustum::from_view_projection(&mat4_mul(&proj, &view));

        assert!(frustum.test_sphere([0.0, 0.0, -10.0], 0.5));
        assert!(!frustum.test_sphere([0.0, 0.0, 10.0], 0.5));
        assert!(!frustum.test_sphere([0.0, 0.0, -200.0], 0.5));
    }

    #[test]
    fn test_predicate_modes() {
        let layout = DispatchLayout::with_defaults(1).unwrap();
        let frame = FrameParams::new(orthographic(10.0), [0.0, 0.0, 0.0], 5.0);

        // Inside box, beyond distance
        let far = [8.0, 0.0, 0.0];
        assert!(!frame.to_uniform(&layout).is_visible(far, 0.1));
        assert!(frame.with_mode(CullMode::FrustumOnly).to_uniform(&layout).is_visible(far, 0.1));

        // Within distance, outside box
        let frame = FrameParams::new(orthographic(1.0), [0.0, 0.0, 0.0], 5.0);
        let outside = [3.0, 0.0, 0.0];
        assert!(!frame.to_uniform(&layout).is_visible(outside, 0.1));
        assert!(frame.with_mode(CullMode::DistanceOnly).to_uniform(&layout).is_visible(outside, 0.1));
    }

    #[test]
    fn test_uniform_planes_round_trip_through_frustum() {
        let layout = DispatchLayout::with_defaults(1).unwrap();
        let view_proj = mat4_mul(
            &perspective(1.0, 1.5, 0.1, 80.0),
            &look_at([3.0, 4.0, 5.0], [0.0, 0.0, 0.0], [0.0, 1.0, 0.0]),
        );
        let frustum = Frustum::from_view_projection(&view_proj);
        let params = FrameParams::new(view_proj, [3.0, 4.0, 5.0], 0.0)
            .with_mode(CullMode::FrustumOnly)
            .to_uniform(&layout);

        assert_eq!(Frustum::from_arrays(&params.frustum_planes), frustum);
        for center in [[0.0, 0.0, 0.0], [-20.0, 0.0, 0.0], [0.0, 50.0, 0.0], [-3.0, -4.0, -90.0]] {
            assert_eq!(params.is_visible(center, 1.0), frustum.test_sphere(center, 1.0), "{center:?}");
        }
    }

    #[test]
    fn test_uniform_size() {
        // mat4 + 6 planes + camera + counts, 16-byte aligned
        assert_eq!(CullParams::SIZE, 64 + 96 + 16 + 16);
    }
}
