//! Data handed to the external renderer.

use glam::{DMat4, Mat4};

use crate::events::ObjectId;
use crate::mesh::TriMesh;

/// Colour of an active object (`#FF0000`).
pub const ACTIVE_COLOR: [f32; 4] = [1.0, 0.0, 0.0, 1.0];
/// Colour of an inactive object (`#000000`).
pub const INACTIVE_COLOR: [f32; 4] = [0.0, 0.0, 0.0, 1.0];

/// Whether an object is the one receiving keybind input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ColorState {
    Active,
    #[default]
    Inactive,
}

impl ColorState {
    /// Returns the state for an active flag.
    pub fn from_active(active: bool) -> Self {
        if active {
            Self::Active
        } else {
            Self::Inactive
        }
    }

    /// Returns the RGBA colour for this state.
    #[must_use]
    pub fn color(self) -> [f32; 4] {
        match self {
            Self::Active => ACTIVE_COLOR,
            Self::Inactive => INACTIVE_COLOR,
        }
    }
}

/// GPU-compatible per-object uniforms.
#[repr(C)]
#[derive(Debug, Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
pub struct ObjectUniforms {
    /// Column-major model matrix, micrometers.
    pub model: [[f32; 4]; 4],
    /// RGBA colour.
    pub color: [f32; 4],
}

impl ObjectUniforms {
    /// Builds uniforms from a world transform and colour state.
    pub fn new(world: &DMat4, state: ColorState) -> Self {
        Self {
            model: world.as_mat4().to_cols_array_2d(),
            color: state.color(),
        }
    }
}

impl Default for ObjectUniforms {
    fn default() -> Self {
        Self {
            model: Mat4::IDENTITY.to_cols_array_2d(),
            color: INACTIVE_COLOR,
        }
    }
}

/// One mesh to draw: local-frame geometry plus its current uniforms.
#[derive(Debug, Clone, Copy)]
pub struct RenderItem<'a> {
    pub object: ObjectId,
    pub mesh: &'a TriMesh,
    pub uniforms: ObjectUniforms,
}

#[cfg(test)]
mod tests {
    use glam::DVec3;

    use super::*;

    #[test]
    fn test_uniforms_from_world() {
        let world = DMat4::from_translation(DVec3::new(10.0, -20.0, 30.0));
        let u = ObjectUniforms::new(&world, ColorState::Active);
        assert_eq!(u.model[3], [10.0, -20.0, 30.0, 1.0]);
        assert_eq!(u.color, ACTIVE_COLOR);
        assert_eq!(bytemuck::bytes_of(&u).len(), 80);
    }

    #[test]
    fn test_color_state() {
        assert_eq!(ColorState::from_active(false).color(), INACTIVE_COLOR);
        assert_eq!(ColorState::default(), ColorState::Inactive);
    }
}
