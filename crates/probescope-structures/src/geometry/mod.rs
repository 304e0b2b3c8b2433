//! Static probe shapes.
//!
//! A [`ProbeGeometry`] is built once and never changes. Every variant answers the
//! same two questions: where its shanks are ([`ProbeGeometry::shanks`]) and which
//! point it pivots about ([`ProbeGeometry::local_origin`]). All coordinates are in
//! the probe's local frame, micrometers, with `+Y` running from the tip up the
//! shank.

mod builtin;
mod custom;

use std::fmt;
use std::path::{Path, PathBuf};

use glam::DVec3;
use probescope_core::config::Config;
use probescope_core::error::{ProbescopeError, Result};
use probescope_core::mesh::TriMesh;
use probescope_core::options::{MeshTransformRegistry, ProbeGeometryTable};
use probescope_core::transform::Pose;
use serde::{Deserialize, Serialize};

pub use builtin::{Chassis, HolderAssembly, ShankArray, HOLDER_SCALE};
pub use custom::{custom_object_name, discover_custom_meshes, CustomMesh};

/// One insertion element, as a line segment from tip to top.
#[derive(Debug, Clone, PartialEq)]
pub struct Shank {
    pub name: String,
    /// Lower end, the first point to enter tissue.
    pub tip: DVec3,
    /// Upper end.
    pub top: DVec3,
    /// Width across the shank, for display only.
    pub width: f64,
}

impl Shank {
    /// Returns the shank length.
    #[must_use]
    pub fn length(&self) -> f64 {
        (self.top - self.tip).length()
    }

    /// Unit vector from the tip toward the top.
    #[must_use]
    pub fn axis(&self) -> DVec3 {
        (self.top - self.tip).normalize_or_zero()
    }

    /// Returns the shank placed by `pose`.
    #[must_use]
    pub fn transformed(&self, pose: &Pose) -> Self {
        Self {
            name: self.name.clone(),
            tip: pose.transform_point(self.tip),
            top: pose.transform_point(self.top),
            width: self.width,
        }
    }
}

/// The shape of a scene object.
#[derive(Debug, Clone)]
pub enum ProbeGeometry {
    /// One or more bare shanks (Neuropixels, Utah arrays).
    ShankArray(ShankArray),
    /// A chronic holder mesh carrying a probe.
    Holder(HolderAssembly),
    /// A user-supplied mesh.
    Custom(CustomMesh),
}

impl ProbeGeometry {
    /// Returns the shanks in the local frame. Each call starts over.
    pub fn shanks(&self) -> std::slice::Iter<'_, Shank> {
        match self {
            Self::ShankArray(a) => a.shanks().iter(),
            Self::Holder(h) => h.probe().shanks().iter(),
            Self::Custom(c) => c.shanks().iter(),
        }
    }

    /// Returns the number of shanks.
    #[must_use]
    pub fn num_shanks(&self) -> usize {
        self.shanks().len()
    }

    /// The point all moves and rotations pivot about.
    ///
    /// Geometries are built so this is the local frame origin: the probe center at
    /// tip level for shank arrays and holders, the registered origin for custom
    /// meshes.
    #[must_use]
    pub fn local_origin(&self) -> DVec3 {
        DVec3::ZERO
    }

    /// Returns the meshes to draw, in the local frame.
    pub fn render_meshes(&self) -> Vec<&TriMesh> {
        match self {
            Self::ShankArray(a) => a.meshes().iter().collect(),
            Self::Holder(h) => std::iter::once(h.holder_mesh())
                .chain(h.probe().meshes())
                .collect(),
            Self::Custom(c) => vec![c.mesh()],
        }
    }

    /// Human-readable name, as shown in object lists.
    #[must_use]
    pub fn display_name(&self) -> String {
        match self {
            Self::ShankArray(a) => a.probe_type().to_string(),
            Self::Holder(h) => h.display_name(),
            Self::Custom(c) => custom_object_name(c.stem()),
        }
    }
}

/// Serializable identifier of a geometry variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GeometryKind {
    Builtin { probe_type: String },
    Holder { probe_type: String, chassis: Chassis },
    Custom { file: PathBuf },
}

impl GeometryKind {
    /// A builtin shank array.
    pub fn builtin(probe_type: impl Into<String>) -> Self {
        Self::Builtin {
            probe_type: probe_type.into(),
        }
    }
}

impl fmt::Display for GeometryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Builtin { probe_type } => f.write_str(probe_type),
            Self::Holder { probe_type, chassis } => {
                f.write_str(&HolderAssembly::name_for(probe_type, *chassis))
            }
            Self::Custom { file } => {
                let stem = file.file_stem().and_then(|s| s.to_str()).unwrap_or("?");
                f.write_str(&custom_object_name(stem))
            }
        }
    }
}

/// Resolves a [`GeometryKind`] into a [`ProbeGeometry`].
#[derive(Debug, Clone)]
pub struct GeometryBuilder<'a> {
    table: &'a ProbeGeometryTable,
    transforms: &'a MeshTransformRegistry,
    mesh_dir: PathBuf,
}

impl<'a> GeometryBuilder<'a> {
    /// Creates a builder over explicit tables.
    pub fn new(
        table: &'a ProbeGeometryTable,
        transforms: &'a MeshTransformRegistry,
        mesh_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            table,
            transforms,
            mesh_dir: mesh_dir.into(),
        }
    }

    /// Creates a builder from the loaded configuration.
    pub fn from_config(config: &'a Config) -> Self {
        Self::new(
            &config.probe_geometries,
            &config.mesh_transforms,
            &config.preferences.mesh_dir,
        )
    }

    /// Returns the directory holder meshes are read from.
    #[must_use]
    pub fn mesh_dir(&self) -> &Path {
        &self.mesh_dir
    }

    /// Builds the geometry for `kind`.
    pub fn build(&self, kind: &GeometryKind) -> Result<ProbeGeometry> {
        let geometry = match kind {
            GeometryKind::Builtin { probe_type } => {
                ProbeGeometry::ShankArray(self.shank_array(probe_type)?)
            }
            GeometryKind::Holder { probe_type, chassis } => {
                let probe = self.shank_array(probe_type)?;
                ProbeGeometry::Holder(HolderAssembly::load(probe, *chassis, &self.mesh_dir)?)
            }
            GeometryKind::Custom { file } => {
                ProbeGeometry::Custom(CustomMesh::load(file, self.transforms)?)
            }
        };
        log::debug!(
            "built geometry '{}' with {} shank(s)",
            geometry.display_name(),
            geometry.num_shanks()
        );
        Ok(geometry)
    }

    fn shank_array(&self, probe_type: &str) -> Result<ShankArray> {
        let spec = self
            .table
            .get(probe_type)
            .ok_or_else(|| ProbescopeError::UnknownProbeType(probe_type.to_string()))?;
        Ok(ShankArray::from_spec(probe_type, spec))
    }
}

/// Every object that can be added, with its display name.
///
/// Builtin shank arrays and holder assemblies come first, followed by one entry
/// per file in `user_mesh_dir`.
pub fn available_objects(
    table: &ProbeGeometryTable,
    user_mesh_dir: &Path,
) -> Vec<(String, GeometryKind)> {
    let mut objects: Vec<(String, GeometryKind)> = table
        .names()
        .map(|name| (name.to_string(), GeometryKind::builtin(name)))
        .collect();
    for (probe_type, chassis) in HolderAssembly::VARIANTS {
        objects.push((
            HolderAssembly::name_for(probe_type, chassis),
            GeometryKind::Holder {
                probe_type: probe_type.to_string(),
                chassis,
            },
        ));
    }
    for file in discover_custom_meshes(user_mesh_dir) {
        let kind = GeometryKind::Custom { file };
        objects.push((kind.to_string(), kind));
    }
    objects
}

#[cfg(test)]
mod tests {
    use super::*;

    fn builder<'a>(
        table: &'a ProbeGeometryTable,
        transforms: &'a MeshTransformRegistry,
    ) -> GeometryBuilder<'a> {
        GeometryBuilder::new(table, transforms, std::env::temp_dir())
    }

    #[test]
    fn test_np24_shanks() {
        let table = ProbeGeometryTable::default();
        let transforms = MeshTransformRegistry::default();
        let geometry = builder(&table, &transforms)
            .build(&GeometryKind::builtin("NP24"))
            .unwrap();
        let xs: Vec<f64> = geometry.shanks().map(|s| s.tip.x).collect();
        assert_eq!(xs, vec![-375.0, -125.0, 125.0, 375.0]);
        for shank in geometry.shanks() {
            assert_eq!(shank.tip.y, 0.0);
            assert_eq!(shank.length(), 10_000.0);
            assert!(shank.axis().abs_diff_eq(DVec3::Y, 1e-12));
        }
        assert_eq!(geometry.render_meshes().len(), 4);
    }

    #[test]
    fn test_shanks_restartable() {
        let table = ProbeGeometryTable::default();
        let transforms = MeshTransformRegistry::default();
        let geometry = builder(&table, &transforms)
            .build(&GeometryKind::builtin("NP1"))
            .unwrap();
        let first: Vec<Shank> = geometry.shanks().cloned().collect();
        let second: Vec<Shank> = geometry.shanks().cloned().collect();
        assert_eq!(first, second);
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].tip, DVec3::ZERO);
    }

    #[test]
    fn test_unknown_probe_type() {
        let table = ProbeGeometryTable::default();
        let transforms = MeshTransformRegistry::default();
        let err = builder(&table, &transforms)
            .build(&GeometryKind::builtin("NP3"))
            .unwrap_err();
        assert!(matches!(err, ProbescopeError::UnknownProbeType(_)));
    }

    #[test]
    fn test_kind_serde_and_display() {
        let kind = GeometryKind::Holder {
            probe_type: "NP1".into(),
            chassis: Chassis::FreelyMoving,
        };
        let json = serde_json::to_string(&kind).unwrap();
        assert_eq!(
            json,
            r#"{"kind":"holder","probe_type":"NP1","chassis":"freely_moving"}"#
        );
        assert_eq!(kind.to_string(), "NP1 chronic holder - freely moving");
        let custom = GeometryKind::Custom {
            file: PathBuf::from("/meshes/window.stl"),
        };
        assert_eq!(custom.to_string(), "window [CUSTOM OBJECT]");
    }

    #[test]
    fn test_available_objects_lists_builtins_and_holders() {
        let table = ProbeGeometryTable::default();
        let objects = available_objects(&table, Path::new("/nonexistent/probescope"));
        let names: Vec<&str> = objects.iter().map(|(n, _)| n.as_str()).collect();
        assert!(names.contains(&"NP24"));
        assert!(names.contains(&"utah10x10"));
        assert!(names.contains(&"NP2a chronic holder - head fixed"));
        assert_eq!(objects.len(), 3 + 6);
    }
}
