//! Core abstractions for probescope.
//!
//! This crate provides the building blocks the probe structures are made of:
//! - [`Pose`] and the rigid transform functions in [`transform`]
//! - [`TriMesh`] with line casting, and mesh file loading in [`mesh_io`]
//! - Configuration: preferences, keybind tables and custom mesh registrations
//! - Types crossing the renderer boundary: input events, scene events, uniforms

// Documentation lints - internal functions don't need exhaustive panic/error docs
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::missing_errors_doc)]
// Preferences legitimately have several warning flags
#![allow(clippy::struct_excessive_bools)]
#![allow(clippy::must_use_candidate)]
// ML/AP/DV coordinates are conventionally named alike
#![allow(clippy::similar_names)]
#![allow(clippy::module_name_repetitions)]

pub mod bounds;
pub mod config;
pub mod error;
pub mod events;
pub mod input;
pub mod keybinds;
pub mod mesh;
pub mod mesh_io;
pub mod options;
pub mod render;
pub mod transform;

pub use bounds::Aabb;
pub use config::{load_or_create, write_json, Config, ConfigPaths};
pub use error::{ProbescopeError, Result};
pub use events::{EventBus, ObjectId, SceneEvent, SceneListener};
pub use input::{KeyEvent, Modifier, Modifiers, PickEvent};
pub use keybinds::{
    KeyChord, MovementBinding, MovementIntent, MovementKeybinds, StaticAction, StaticKeybinds,
};
pub use mesh::TriMesh;
pub use mesh_io::load_mesh;
pub use options::{
    AtlasTransformation, MeshTransform, MeshTransformRegistry, Preferences, ProbeGeometrySpec,
    ProbeGeometryTable, ShankSpec,
};
pub use render::{ColorState, ObjectUniforms, RenderItem};
pub use transform::{
    compose, from_euler, rotation_xyz, to_euler, to_euler_near, to_matrix, EulerAngles, Pose,
};

// Re-export glam types for convenience
pub use glam::{DMat3, DMat4, DQuat, DVec3};
