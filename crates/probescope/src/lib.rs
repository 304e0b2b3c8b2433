//! probescope: plan stereotaxic probe trajectories against a brain atlas.
//!
//! Probes (Neuropixels shank arrays, chronic holder assemblies, or any
//! registered mesh) are placed in stereotaxic micrometers from bregma, moved
//! with the keyboard, and queried for the atlas regions each shank crosses.
//!
//! # Quick Start
//!
//! ```no_run
//! use probescope::*;
//!
//! fn main() -> Result<()> {
//!     let config = load_default_config()?;
//!     let mut scene = Scene::open(config)?;
//!
//!     let probe = scene.add_object_at(
//!         &GeometryKind::builtin("NP24"),
//!         &InsertionSpec::EntryDepth {
//!             entry: DVec2::new(-1578.0, -2485.0),
//!             angles: EulerAngles::new(115.0, 0.0, -10.0),
//!             depth: 3110.0,
//!         },
//!     )?;
//!
//!     scene.handle_key(&KeyEvent::plain("w"));
//!     scene.refresh();
//!     for shank in scene.crossings(probe).unwrap_or_default() {
//!         for crossing in &shank.crossings {
//!             println!("{}: {} {:.0}-{:.0}", shank.shank, crossing.acronym,
//!                 crossing.entry_depth, crossing.exit_depth);
//!         }
//!     }
//!     Ok(())
//! }
//! ```
//!
//! # Coordinates
//!
//! x is ML (right positive), y is AP (anterior positive) and z is DV (dorsal
//! positive). Angles are elevation, spin and azimuth in degrees; a vertical
//! probe has elevation 90.

// Documentation lints - internal functions don't need exhaustive panic/error docs
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::module_name_repetitions)]

mod init;
mod scene;

pub use init::{init_logging, load_default_config};
pub use scene::Scene;

// Re-export core types
pub use probescope_core::{
    config::{Config, ConfigPaths},
    error::{ProbescopeError, Result},
    events::{ObjectId, SceneEvent, SceneListener},
    input::{KeyEvent, Modifier, Modifiers, PickEvent},
    keybinds::{MovementIntent, MovementKeybinds, StaticAction, StaticKeybinds},
    mesh::TriMesh,
    options::{AtlasTransformation, MeshTransform, Preferences},
    render::{ColorState, ObjectUniforms, RenderItem},
    transform::{EulerAngles, Pose},
    DMat3, DMat4, DVec3,
};

// Re-export structures
pub use probescope_structures::{
    Atlas, AtlasRegion, AtlasSpace, BrainGlobeProvider, Chassis, CrossingTracker, EntryDepth,
    ExperimentRecord, ExportRecord, GeometryKind, InsertionSpec, LoadReport, ProbeGeometry,
    ProbeInstance, ProbePose, ProbeReport, RegionCrossing, RegionIntersector, SceneRegistry,
    ShankCrossings,
};

pub use glam::DVec2;
