//! Probe structures for probescope.
//!
//! This crate provides the objects a planning scene is made of:
//! - Probe geometries (shank arrays, holder assemblies, custom meshes)
//! - Probe poses and the entry/depth insertion solver
//! - Atlases, their coordinate space and region crossings
//! - The scene registry, keyboard movement and experiment files

// Voxel indices and mesh counts are cast between integer and float types
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
// Documentation lints - internal functions don't need exhaustive panic/error docs
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::similar_names)]

pub mod atlas;
pub mod experiment;
pub mod geometry;
pub mod insertion;
pub mod instance;
pub mod intersect;
pub mod movement;
pub mod pose;
pub mod registry;

pub use atlas::{
    AnnotationVolume, Atlas, AtlasRegion, AtlasSpace, BrainGlobeMetadata, BrainGlobeProvider,
    StructureRecord, VoxelRun,
};
pub use experiment::{
    AtlasRecord, ExperimentRecord, ExportRecord, LoadReport, ObjectRecord, ProbeExport,
    SkippedObject,
};
pub use geometry::{
    available_objects, Chassis, CustomMesh, GeometryBuilder, GeometryKind, HolderAssembly,
    ProbeGeometry, Shank, ShankArray,
};
pub use insertion::{EntryDepth, InsertionSolver, InsertionSpec};
pub use instance::ProbeInstance;
pub use intersect::{intersect, RegionCrossing, RegionIntersector, ShankCrossings};
pub use movement::{CrossingTracker, MovementController, PoseDelta};
pub use pose::{ProbePose, ProbeReport, StereotaxicPoint};
pub use registry::SceneRegistry;
