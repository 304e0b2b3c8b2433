//! User preferences and geometry tables stored as JSON.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use glam::DVec3;
use serde::{Deserialize, Serialize};

/// Directory name under the user's home that holds every probescope file.
pub const CONFIG_DIR_NAME: &str = ".probescope";

/// Returns the default configuration root, `$HOME/.probescope`.
///
/// Falls back to the current directory when no home directory is set.
#[must_use]
pub fn default_root() -> PathBuf {
    std::env::var_os("HOME")
        .or_else(|| std::env::var_os("USERPROFILE"))
        .map_or_else(|| PathBuf::from("."), PathBuf::from)
        .join(CONFIG_DIR_NAME)
}

/// Placement of an atlas's native space relative to bregma.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AtlasTransformation {
    /// Bregma position in atlas voxels.
    pub bregma_location: [f64; 3],
    /// Rotation from atlas axes to ML/AP/DV, in degrees about x, y, z.
    pub angles: [f64; 3],
    /// Per-axis scaling applied after rotation.
    #[serde(default = "unit_scaling")]
    pub scaling: [f64; 3],
}

fn unit_scaling() -> [f64; 3] {
    [1.0, 1.0, 1.0]
}

/// Global user preferences.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Preferences {
    /// Atlas loaded when none is named explicitly.
    pub default_atlas: String,
    /// Known atlas placements keyed by atlas name.
    pub atlas_transformations: BTreeMap<String, AtlasTransformation>,
    /// Where experiments are saved by default.
    pub default_save_dir: PathBuf,
    /// Where user-supplied custom meshes are discovered.
    pub user_mesh_dir: PathBuf,
    /// Where builtin holder meshes are read from.
    pub mesh_dir: PathBuf,
    /// Where exports are written.
    pub export_dir: PathBuf,
    /// Root of the on-disk atlas collection.
    pub atlas_dir: PathBuf,
    pub warn_collisions: bool,
    pub warn_overwrite: bool,
    pub warn_delete: bool,
}

impl Preferences {
    /// Default preferences with every directory placed under `root`.
    #[must_use]
    pub fn with_root(root: &Path) -> Self {
        let mut atlas_transformations = BTreeMap::new();
        atlas_transformations.insert(
            "allen_mouse_25um".to_string(),
            AtlasTransformation {
                bregma_location: [216.0, 18.0, 228.0],
                // -5 corrects the small pitch of the Allen CCF.
                angles: [90.0, -5.0, 90.0],
                scaling: unit_scaling(),
            },
        );
        atlas_transformations.insert(
            "whs_sd_rat_39um".to_string(),
            AtlasTransformation {
                bregma_location: [371.0, 72.0, 266.0],
                angles: [90.0, -4.0, 90.0],
                scaling: unit_scaling(),
            },
        );
        Self {
            default_atlas: "allen_mouse_25um".to_string(),
            atlas_transformations,
            default_save_dir: root.join("experiments"),
            user_mesh_dir: root.join("custom_user_meshes"),
            mesh_dir: root.join("meshes"),
            export_dir: root.join("exports"),
            atlas_dir: root.join("atlases"),
            warn_collisions: true,
            warn_overwrite: true,
            warn_delete: true,
        }
    }

    /// Returns the placement for `atlas`, if known.
    #[must_use]
    pub fn atlas_transformation(&self, atlas: &str) -> Option<&AtlasTransformation> {
        self.atlas_transformations.get(atlas)
    }
}

impl Default for Preferences {
    fn default() -> Self {
        Self::with_root(&default_root())
    }
}

/// Shank layout of one probe type.
///
/// Each shank is a thin rectangle with its corner at `shank_offsets_um[i]` and
/// edge lengths `shank_dims_um[i]` (width along x, length along y, thickness
/// along z). A negative length hangs the shank below its offset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbeGeometrySpec {
    pub full_name: String,
    pub shank_offsets_um: Vec<[f64; 3]>,
    pub shank_dims_um: Vec<[f64; 3]>,
}

/// Probe types keyed by their short name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProbeGeometryTable(pub BTreeMap<String, ProbeGeometrySpec>);

impl ProbeGeometryTable {
    /// Looks up a probe type. `NP24a` shares the `NP24` layout.
    #[must_use]
    pub fn get(&self, probe_type: &str) -> Option<&ProbeGeometrySpec> {
        self.0
            .get(probe_type)
            .or_else(|| self.0.get(&probe_type.replace("4a", "4")))
    }

    /// Returns the known probe type names.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }
}

fn utah_array(rows: u32, cols: u32, pitch_um: f64, dims: [f64; 3]) -> ProbeGeometrySpec {
    let mut offsets = Vec::new();
    for r in 0..rows {
        for c in 0..cols {
            let x = (f64::from(c) - f64::from(cols - 1) / 2.0) * pitch_um - dims[0] / 2.0;
            let z = (f64::from(r) - f64::from(rows - 1) / 2.0) * pitch_um;
            offsets.push([x, 0.0, z]);
        }
    }
    let n = offsets.len();
    ProbeGeometrySpec {
        full_name: format!("Utah Array 1043-29 ({rows} x {cols})"),
        shank_offsets_um: offsets,
        shank_dims_um: vec![dims; n],
    }
}

impl Default for ProbeGeometryTable {
    fn default() -> Self {
        let np_shank = [70.0, 10_000.0, 0.0];
        let mut table = BTreeMap::new();
        table.insert(
            "NP1".to_string(),
            ProbeGeometrySpec {
                full_name: "Neuropixels 1.0".to_string(),
                shank_offsets_um: vec![[-35.0, 0.0, 0.0]],
                shank_dims_um: vec![np_shank],
            },
        );
        table.insert(
            "NP24".to_string(),
            ProbeGeometrySpec {
                full_name: "Neuropixels 2.0 - 4Shank".to_string(),
                shank_offsets_um: vec![
                    [-410.0, 0.0, 0.0],
                    [-160.0, 0.0, 0.0],
                    [90.0, 0.0, 0.0],
                    [340.0, 0.0, 0.0],
                ],
                shank_dims_um: vec![np_shank; 4],
            },
        );
        table.insert(
            "utah10x10".to_string(),
            utah_array(10, 10, 400.0, [30.0, -1000.0, 0.0]),
        );
        Self(table)
    }
}

/// A shank declared for a custom mesh, in the mesh's local frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShankSpec {
    #[serde(default)]
    pub name: Option<String>,
    /// Tip position relative to the local origin.
    pub tip: DVec3,
    /// Length along local +Y.
    pub length: f64,
}

/// How a custom mesh file is placed in its local frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeshTransform {
    /// Rotation in degrees about x, then y, then z.
    pub angles: [f64; 3],
    /// Offset added before rotating, in scaled units.
    pub origin: [f64; 3],
    /// Factor from file units to micrometers (most meshes are in mm).
    pub scale: f64,
    /// Shanks used for region crossings; empty means derive one from the mesh.
    #[serde(default)]
    pub shanks: Vec<ShankSpec>,
}

/// Custom mesh transforms keyed by file stem.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MeshTransformRegistry(pub BTreeMap<String, MeshTransform>);

impl MeshTransformRegistry {
    /// Returns the transform registered for `stem`.
    #[must_use]
    pub fn get(&self, stem: &str) -> Option<&MeshTransform> {
        self.0.get(stem)
    }
}

impl Default for MeshTransformRegistry {
    fn default() -> Self {
        let mut map = BTreeMap::new();
        map.insert(
            "logo".to_string(),
            MeshTransform {
                angles: [0.0, 0.0, 0.0],
                origin: [0.0, 0.0, 0.0],
                scale: 1000.0,
                shanks: Vec::new(),
            },
        );
        Self(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_keys_use_defaults() {
        let prefs: Preferences = serde_json::from_str(r#"{"default_atlas": "whs_sd_rat_39um"}"#).unwrap();
        assert_eq!(prefs.default_atlas, "whs_sd_rat_39um");
        assert!(prefs.warn_delete);
        let allen = prefs.atlas_transformation("allen_mouse_25um").unwrap();
        assert_eq!(allen.bregma_location, [216.0, 18.0, 228.0]);
    }

    #[test]
    fn test_scaling_defaults_to_unit() {
        let t: AtlasTransformation =
            serde_json::from_str(r#"{"bregma_location": [1, 2, 3], "angles": [0, 0, 0]}"#).unwrap();
        assert_eq!(t.scaling, [1.0, 1.0, 1.0]);
    }

    #[test]
    fn test_np24a_alias() {
        let table = ProbeGeometryTable::default();
        assert_eq!(table.get("NP24a").unwrap().shank_offsets_um.len(), 4);
        assert!(table.get("NP3").is_none());
    }

    #[test]
    fn test_utah_grid_is_centered() {
        let spec = ProbeGeometryTable::default().get("utah10x10").unwrap().clone();
        assert_eq!(spec.shank_offsets_um.len(), 100);
        let mean_x: f64 = spec
            .shank_offsets_um
            .iter()
            .zip(&spec.shank_dims_um)
            .map(|(o, d)| o[0] + d[0] / 2.0)
            .sum::<f64>()
            / 100.0;
        assert!(mean_x.abs() < 1e-9);
    }
}
