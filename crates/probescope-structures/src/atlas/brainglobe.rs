//! Reading atlases laid out in the `BrainGlobe` directory format.
//!
//! An atlas directory holds `metadata.json`, `structures.json`, one OBJ per
//! structure under `meshes/<id>.obj` in native atlas micrometers, and usually
//! an `annotation.tiff` voxel stack of structure ids.

use std::path::{Path, PathBuf};

use glam::DVec3;
use probescope_core::error::{ProbescopeError, Result};
use probescope_core::mesh_io::load_mesh;
use probescope_core::options::AtlasTransformation;
use serde::{Deserialize, Serialize};

use super::{AnnotationVolume, Atlas, AtlasRegion, AtlasSpace, ROOT_ACRONYM};

/// File name of the voxel annotation inside an atlas directory.
pub const ANNOTATION_FILE: &str = "annotation.tiff";

/// Contents of `metadata.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrainGlobeMetadata {
    pub name: String,
    pub species: String,
    pub citation: String,
    /// Micrometers per voxel.
    pub resolution: [f64; 3],
    pub shape: [usize; 3],
    pub orientation: String,
    pub version: String,
}

impl Default for BrainGlobeMetadata {
    fn default() -> Self {
        Self {
            name: String::new(),
            species: String::new(),
            citation: String::new(),
            resolution: [1.0, 1.0, 1.0],
            shape: [0, 0, 0],
            orientation: "asr".to_string(),
            version: String::new(),
        }
    }
}

/// One entry of `structures.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructureRecord {
    pub acronym: String,
    pub id: u32,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub structure_id_path: Vec<u32>,
    #[serde(default = "default_rgb")]
    pub rgb_triplet: [u8; 3],
}

fn default_rgb() -> [u8; 3] {
    [128, 128, 128]
}

/// Loads atlases from a directory of atlas folders.
#[derive(Debug, Clone)]
pub struct BrainGlobeProvider {
    atlas_dir: PathBuf,
}

impl BrainGlobeProvider {
    pub fn new(atlas_dir: impl Into<PathBuf>) -> Self {
        Self {
            atlas_dir: atlas_dir.into(),
        }
    }

    #[must_use]
    pub fn atlas_dir(&self) -> &Path {
        &self.atlas_dir
    }

    /// Finds the folder for `name`, accepting a versioned `name_v*` folder.
    pub fn resolve(&self, name: &str) -> Result<PathBuf> {
        let exact = self.atlas_dir.join(name);
        if exact.is_dir() {
            return Ok(exact);
        }
        let prefix = format!("{name}_v");
        let mut versioned: Vec<PathBuf> = std::fs::read_dir(&self.atlas_dir)?
            .filter_map(std::result::Result::ok)
            .map(|e| e.path())
            .filter(|p| {
                p.is_dir()
                    && p.file_name()
                        .and_then(|f| f.to_str())
                        .is_some_and(|f| f.starts_with(&prefix))
            })
            .collect();
        versioned.sort();
        versioned
            .pop()
            .ok_or_else(|| ProbescopeError::InvalidAtlas(format!("no atlas '{name}' in {}", self.atlas_dir.display())))
    }

    /// Reads the metadata of atlas `name`.
    pub fn metadata(&self, name: &str) -> Result<BrainGlobeMetadata> {
        let dir = self.resolve(name)?;
        read_json(&dir.join("metadata.json"))
    }

    /// Reads the structure list of atlas `name`.
    pub fn structures(&self, name: &str) -> Result<Vec<StructureRecord>> {
        let dir = self.resolve(name)?;
        read_json(&dir.join("structures.json"))
    }

    /// Builds atlas `name` placed by `transformation`.
    ///
    /// Structures deeper than `max_tree_depth` are left out; the root structure is
    /// always loaded and becomes the outer surface. The annotation stack is
    /// attached when present and shaped as the metadata says; otherwise region
    /// crossings fall back to meshes.
    pub fn load(
        &self,
        name: &str,
        transformation: &AtlasTransformation,
        max_tree_depth: Option<usize>,
    ) -> Result<Atlas> {
        let dir = self.resolve(name)?;
        let metadata: BrainGlobeMetadata = read_json(&dir.join("metadata.json"))?;
        let structures: Vec<StructureRecord> = read_json(&dir.join("structures.json"))?;
        let space = AtlasSpace::new(DVec3::from_array(metadata.resolution), transformation);
        log::info!(
            "loading atlas '{name}' from {} ({} structures)",
            dir.display(),
            structures.len()
        );

        let mut surface = None;
        let mut regions = Vec::new();
        for record in structures {
            let is_root = record.acronym == ROOT_ACRONYM;
            let depth = record.structure_id_path.len().max(1);
            if !is_root && max_tree_depth.is_some_and(|max| depth > max) {
                continue;
            }
            let mesh_path = dir.join("meshes").join(format!("{}.obj", record.id));
            let mesh = match load_mesh(&mesh_path) {
                Ok(mesh) => mesh.map_points(|p| space.native_to_bregma_um(p)),
                Err(e) => {
                    log::warn!("skipping region '{}': {e}", record.acronym);
                    continue;
                }
            };
            if is_root {
                surface = Some(mesh.clone());
            }
            regions.push(AtlasRegion {
                id: record.id,
                name: if record.name.is_empty() {
                    record.acronym.clone()
                } else {
                    record.name
                },
                acronym: record.acronym,
                structure_id_path: if record.structure_id_path.is_empty() {
                    vec![record.id]
                } else {
                    record.structure_id_path
                },
                rgb: record.rgb_triplet,
                mesh,
            });
        }

        let surface = surface.ok_or_else(|| {
            ProbescopeError::InvalidAtlas(format!("{name}: root mesh is missing"))
        })?;
        let atlas = Atlas::new(name, space, surface, regions)?;

        let annotation_path = dir.join(ANNOTATION_FILE);
        if !annotation_path.is_file() {
            log::info!("atlas '{name}' has no {ANNOTATION_FILE}; using region meshes");
            return Ok(atlas);
        }
        match AnnotationVolume::read_tiff(&annotation_path) {
            Ok(volume) if metadata.shape == [0; 3] || volume.shape() == metadata.shape => {
                Ok(atlas.with_annotation(volume))
            }
            Ok(volume) => {
                log::warn!(
                    "ignoring annotation of shape {:?}; metadata says {:?}",
                    volume.shape(),
                    metadata.shape
                );
                Ok(atlas)
            }
            Err(e) => {
                log::warn!("ignoring annotation: {e}");
                Ok(atlas)
            }
        }
    }
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let text = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&text)?)
}
