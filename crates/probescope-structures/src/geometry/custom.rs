//! User-supplied meshes.
//!
//! Any OBJ, PLY or STL file dropped into the user mesh directory can be added to
//! the scene once it has an entry in `custom_user_mesh_transformations.json`
//! keyed by its file stem.

use std::path::{Path, PathBuf};

use glam::DVec3;
use probescope_core::error::{ProbescopeError, Result};
use probescope_core::mesh::TriMesh;
use probescope_core::mesh_io::load_mesh;
use probescope_core::options::{MeshTransform, MeshTransformRegistry};
use probescope_core::transform::rotation_xyz;

use super::Shank;

const MIN_EXTENT: f64 = 1e-9;

/// Name shown for a custom mesh file.
#[must_use]
pub fn custom_object_name(stem: &str) -> String {
    format!("{stem} [CUSTOM OBJECT]")
}

/// Lists the files in `dir`, sorted. A missing directory yields nothing.
pub fn discover_custom_meshes(dir: &Path) -> Vec<PathBuf> {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut files: Vec<PathBuf> = entries
        .filter_map(std::result::Result::ok)
        .map(|e| e.path())
        .filter(|p| p.is_file())
        .collect();
    files.sort();
    files
}

/// A custom mesh placed in its local frame.
#[derive(Debug, Clone)]
pub struct CustomMesh {
    source: PathBuf,
    stem: String,
    mesh: TriMesh,
    shanks: Vec<Shank>,
}

impl CustomMesh {
    /// Loads `path` using its registered transform.
    pub fn load(path: &Path, registry: &MeshTransformRegistry) -> Result<Self> {
        let stem = path
            .file_stem()
            .and_then(|s| s.to_str())
            .ok_or_else(|| ProbescopeError::InvalidMeshSpec(format!("bad file name {}", path.display())))?;
        let transform = registry
            .get(stem)
            .ok_or_else(|| ProbescopeError::MissingMeshTransform(stem.to_string()))?;
        let raw = load_mesh(path).map_err(|e| ProbescopeError::InvalidMeshSpec(e.to_string()))?;
        Self::from_mesh(path, stem, &raw, transform)
    }

    /// Places an already loaded mesh.
    ///
    /// The mesh is scaled, shifted by `origin` and rotated about x, y then z.
    pub fn from_mesh(
        source: &Path,
        stem: &str,
        raw: &TriMesh,
        transform: &MeshTransform,
    ) -> Result<Self> {
        if !(transform.scale.is_finite() && transform.scale > 0.0) {
            return Err(ProbescopeError::InvalidMeshSpec(format!(
                "{stem}: scale must be positive, got {}",
                transform.scale
            )));
        }
        let mesh = raw
            .scaled(transform.scale)
            .translated(DVec3::from_array(transform.origin))
            .rotated(&rotation_xyz(transform.angles));
        if mesh.is_empty() {
            return Err(ProbescopeError::InvalidMeshSpec(format!("{stem}: mesh has no triangles")));
        }
        let bounds = mesh.bounds();
        if bounds.diagonal() <= MIN_EXTENT {
            return Err(ProbescopeError::InvalidMeshSpec(format!("{stem}: mesh has zero extent")));
        }

        let shanks = if transform.shanks.is_empty() {
            // One shank along the local Y extent, through the origin.
            let shank = Shank {
                name: "shank0".to_string(),
                tip: DVec3::new(0.0, bounds.min.y, 0.0),
                top: DVec3::new(0.0, bounds.max.y, 0.0),
                width: 0.0,
            };
            if shank.length() <= MIN_EXTENT {
                Vec::new()
            } else {
                vec![shank]
            }
        } else {
            transform
                .shanks
                .iter()
                .enumerate()
                .filter(|(_, s)| s.length.is_finite() && s.length > 0.0 && s.tip.is_finite())
                .map(|(i, s)| Shank {
                    name: s.name.clone().unwrap_or_else(|| format!("shank{i}")),
                    tip: s.tip,
                    top: s.tip + DVec3::Y * s.length,
                    width: 0.0,
                })
                .collect()
        };
        if shanks.is_empty() {
            return Err(ProbescopeError::InvalidMeshSpec(format!("{stem}: no usable shanks")));
        }

        Ok(Self {
            source: source.to_path_buf(),
            stem: stem.to_string(),
            mesh,
            shanks,
        })
    }

    /// File the mesh was read from.
    #[must_use]
    pub fn source(&self) -> &Path {
        &self.source
    }

    #[must_use]
    pub fn stem(&self) -> &str {
        &self.stem
    }

    #[must_use]
    pub fn mesh(&self) -> &TriMesh {
        &self.mesh
    }

    #[must_use]
    pub fn shanks(&self) -> &[Shank] {
        &self.shanks
    }
}

#[cfg(test)]
mod tests {
    use probescope_core::options::ShankSpec;

    use super::*;

    fn transform(scale: f64) -> MeshTransform {
        MeshTransform {
            angles: [0.0, 0.0, 0.0],
            origin: [0.0, 0.0, 0.0],
            scale,
            shanks: Vec::new(),
        }
    }

    #[test]
    fn test_derived_shank_spans_y_extent() {
        let raw = TriMesh::cuboid(DVec3::new(-1.0, -2.0, -1.0), DVec3::new(1.0, 3.0, 1.0));
        let custom = CustomMesh::from_mesh(Path::new("box.obj"), "box", &raw, &transform(1000.0)).unwrap();
        assert_eq!(custom.shanks().len(), 1);
        assert_eq!(custom.shanks()[0].tip, DVec3::new(0.0, -2000.0, 0.0));
        assert_eq!(custom.shanks()[0].top, DVec3::new(0.0, 3000.0, 0.0));
    }

    #[test]
    fn test_declared_shanks_are_used() {
        let raw = TriMesh::cuboid(DVec3::ZERO, DVec3::ONE);
        let mut t = transform(1.0);
        t.shanks = vec![ShankSpec {
            name: Some("fiber".into()),
            tip: DVec3::new(0.5, -3.0, 0.5),
            length: 4.0,
        }];
        let custom = CustomMesh::from_mesh(Path::new("fiber.stl"), "fiber", &raw, &t).unwrap();
        assert_eq!(custom.shanks()[0].name, "fiber");
        assert_eq!(custom.shanks()[0].top, DVec3::new(0.5, 1.0, 0.5));
    }

    #[test]
    fn test_degenerate_meshes_rejected() {
        let empty = TriMesh::empty();
        let err = CustomMesh::from_mesh(Path::new("e.obj"), "e", &empty, &transform(1.0)).unwrap_err();
        assert!(matches!(err, ProbescopeError::InvalidMeshSpec(_)));

        // Flat in Y: nothing to derive a shank from.
        let flat = TriMesh::rectangle(DVec3::ZERO, DVec3::X, DVec3::Z);
        let err = CustomMesh::from_mesh(Path::new("f.obj"), "f", &flat, &transform(1.0)).unwrap_err();
        assert!(matches!(err, ProbescopeError::InvalidMeshSpec(_)));
    }

    #[test]
    fn test_unregistered_file() {
        let err = CustomMesh::load(Path::new("/tmp/unregistered.stl"), &MeshTransformRegistry::default())
            .unwrap_err();
        assert!(matches!(err, ProbescopeError::MissingMeshTransform(stem) if stem == "unregistered"));
    }

    #[test]
    fn test_discover_lists_files() {
        let dir = std::env::temp_dir().join(format!("probescope_custom_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("b.stl"), "solid b\nendsolid b\n").unwrap();
        std::fs::write(dir.join("a.obj"), "").unwrap();
        let files = discover_custom_meshes(&dir);
        assert_eq!(files, vec![dir.join("a.obj"), dir.join("b.stl")]);
        std::fs::remove_dir_all(dir).ok();
    }
}
