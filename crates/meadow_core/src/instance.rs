//! Instance payloads consumed by the culling pipeline.
//!
//! The pipeline never interprets a payload beyond its bounding sphere; the
//! compact stage copies whole records. A payload type therefore only has to
//! describe its WGSL layout and where its sphere lives.

use bytemuck::{Pod, Zeroable};

/// A record the pipeline can vote on and compact.
///
/// # Layout contract
///
/// `WGSL_STRUCT` must declare `struct Instance` with exactly the same size
/// and field offsets as the `#[repr(C)]` Rust type. Stick to `vec4<f32>` /
/// `vec4<u32>` members so the WGSL array stride equals `size_of::<Self>()`.
pub trait CullInstance: Pod + Send + Sync + 'static {
    /// WGSL declaration of `struct Instance`.
    const WGSL_STRUCT: &'static str;

    /// WGSL expression over `inst: Instance` evaluating to
    /// `vec4<f32>(center.xyz, radius)`.
    const WGSL_BOUNDING_SPHERE: &'static str;

    /// Host-side bounding sphere, identical to the WGSL expression.
    fn bounding_sphere(&self) -> ([f32; 3], f32);
}

/// A grass blade or small scattered prop: position plus uniform size.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Pod, Zeroable)]
pub struct BladeInstance {
    /// World position (x, y, z) + size packed in w.
    pub position_size: [f32; 4],
}

impl BladeInstance {
    /// Size in bytes.
    pub const SIZE: usize = std::mem::size_of::<Self>();

    /// Creates a blade at `position` with the given size.
    #[must_use]
    pub const fn new(position: [f32; 3], size: f32) -> Self {
        Self {
            position_size: [position[0], position[1], position[2], size],
        }
    }

    /// World position.
    #[must_use]
    pub const fn position(&self) -> [f32; 3] {
        [self.position_size[0], self.position_size[1], self.position_size[2]]
    }
}

impl CullInstance for BladeInstance {
    const WGSL_STRUCT: &'static str = "struct Instance {\n    position_size: vec4<f32>,\n}\n";
    const WGSL_BOUNDING_SPHERE: &'static str = "vec4<f32>(inst.position_size.xyz, inst.position_size.w)";

    fn bounding_sphere(&self) -> ([f32; 3], f32) {
        (self.position(), self.position_size[3])
    }
}

/// A fully transformed prop: position, non-uniform scale and rotation.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Pod, Zeroable)]
pub struct PropInstance {
    /// World position in xyz, w unused.
    pub position: [f32; 4],
    /// Scale in xyz, w unused.
    pub scale: [f32; 4],
    /// Rotation quaternion (x, y, z, w).
    pub rotation: [f32; 4],
}

impl PropInstance {
    /// Size in bytes.
    pub const SIZE: usize = std::mem::size_of::<Self>();

    /// Creates a prop.
    #[must_use]
    pub const fn new(position: [f32; 3], scale: [f32; 3], rotation: [f32; 4]) -> Self {
        Self {
            position: [position[0], position[1], position[2], 1.0],
            scale: [scale[0], scale[1], scale[2], 0.0],
            rotation,
        }
    }

    /// Largest scale axis; rotation never grows the sphere past it.
    #[must_use]
    pub fn radius(&self) -> f32 {
        self.scale[0].abs().max(self.scale[1].abs()).max(self.scale[2].abs())
    }
}

impl CullInstance for PropInstance {
    const WGSL_STRUCT: &'static str =
        "struct Instance {\n    position: vec4<f32>,\n    scale: vec4<f32>,\n    rotation: vec4<f32>,\n}\n";
    const WGSL_BOUNDING_SPHERE: &'static str =
        "vec4<f32>(inst.position.xyz, max(max(abs(inst.scale.x), abs(inst.scale.y)), abs(inst.scale.z)))";

    fn bounding_sphere(&self) -> ([f32; 3], f32) {
        ([self.position[0], self.position[1], self.position[2]], self.radius())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_instance_sizes() {
        // WGSL array stride of a single vec4 / three vec4 struct
        assert_eq!(BladeInstance::SIZE, 16);
        assert_eq!(PropInstance::SIZE, 48);
    }

    #[test]
    fn test_prop_radius_uses_largest_axis() {
        let prop = PropInstance::new([1.0, 2.0, 3.0], [0.5, -2.0, 1.0], [0.0, 0.0, 0.0, 1.0]);
        let (center, radius) = prop.bounding_sphere();
        assert_eq!(center, [1.0, 2.0, 3.0]);
        assert_eq!(radius, 2.0);
    }
}
