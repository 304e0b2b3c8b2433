//! Error types for probescope.

use std::path::PathBuf;

use thiserror::Error;

/// The main error type for probescope operations.
///
/// Errors are local to the object that produced them: a failed pose update leaves
/// the previous pose in place and a failed mesh load only keeps that object out of
/// the scene.
#[derive(Error, Debug)]
pub enum ProbescopeError {
    /// A pose input was non-finite or otherwise malformed.
    #[error("invalid pose: {0}")]
    InvalidPose(String),

    /// The entry or tip ray never crosses the atlas outer surface.
    #[error("probe axis does not intersect the atlas outer surface")]
    NoSurfaceIntersection,

    /// A custom mesh could not be used as probe geometry.
    #[error("invalid mesh specification: {0}")]
    InvalidMeshSpec(String),

    /// A custom mesh file has no registered origin/rotation transform.
    #[error("no transformation registered for custom mesh '{0}'")]
    MissingMeshTransform(String),

    /// The probe type is not one of the builtin variants.
    #[error("unknown probe type '{0}'")]
    UnknownProbeType(String),

    /// No atlas region matches the given acronym or id.
    #[error("region '{0}' not found in atlas")]
    UnknownRegion(String),

    /// A keybind entry could not be parsed.
    #[error("invalid keybind: {0}")]
    InvalidKeybind(String),

    /// No scene object has the given id.
    #[error("object {0} not found")]
    ObjectNotFound(u64),

    /// A mesh file could not be read or parsed.
    #[error("failed to load mesh {path}: {reason}")]
    MeshLoad { path: PathBuf, reason: String },

    /// The atlas data is inconsistent.
    #[error("invalid atlas: {0}")]
    InvalidAtlas(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

/// A specialized Result type for probescope operations.
pub type Result<T> = std::result::Result<T, ProbescopeError>;
