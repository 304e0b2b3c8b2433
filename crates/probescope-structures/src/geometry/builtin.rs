//! Builtin probes and chronic holder assemblies.

use std::fmt;
use std::path::Path;

use glam::DVec3;
use probescope_core::error::{ProbescopeError, Result};
use probescope_core::mesh::TriMesh;
use probescope_core::mesh_io::load_mesh;
use probescope_core::options::ProbeGeometrySpec;
use probescope_core::transform::rotation_xyz;
use serde::{Deserialize, Serialize};

use super::Shank;

/// Holder meshes are stored in millimeters.
pub const HOLDER_SCALE: f64 = 1000.0;

/// A set of thin rectangular shanks.
#[derive(Debug, Clone)]
pub struct ShankArray {
    probe_type: String,
    full_name: String,
    shanks: Vec<Shank>,
    meshes: Vec<TriMesh>,
}

impl ShankArray {
    /// Lays out the shanks described by `spec`.
    ///
    /// A shank's corner sits at its offset; its center line runs through the
    /// middle of its width and thickness. Negative lengths hang below the offset.
    pub fn from_spec(probe_type: &str, spec: &ProbeGeometrySpec) -> Self {
        let mut shanks = Vec::with_capacity(spec.shank_offsets_um.len());
        let mut meshes = Vec::with_capacity(spec.shank_offsets_um.len());
        for (i, (offset, dims)) in spec
            .shank_offsets_um
            .iter()
            .zip(&spec.shank_dims_um)
            .enumerate()
        {
            let corner = DVec3::from_array(*offset);
            let [width, length, thickness] = *dims;
            let x = corner.x + width / 2.0;
            let z = corner.z + thickness / 2.0;
            let (lo, hi) = if length >= 0.0 {
                (corner.y, corner.y + length)
            } else {
                (corner.y + length, corner.y)
            };
            shanks.push(Shank {
                name: format!("shank{i}"),
                tip: DVec3::new(x, lo, z),
                top: DVec3::new(x, hi, z),
                width,
            });
            meshes.push(TriMesh::rectangle(
                corner,
                DVec3::new(width, 0.0, 0.0),
                DVec3::new(0.0, length, 0.0),
            ));
        }
        Self {
            probe_type: probe_type.to_string(),
            full_name: spec.full_name.clone(),
            shanks,
            meshes,
        }
    }

    #[must_use]
    pub fn probe_type(&self) -> &str {
        &self.probe_type
    }

    #[must_use]
    pub fn full_name(&self) -> &str {
        &self.full_name
    }

    #[must_use]
    pub fn shanks(&self) -> &[Shank] {
        &self.shanks
    }

    /// One rectangle per shank.
    #[must_use]
    pub fn meshes(&self) -> &[TriMesh] {
        &self.meshes
    }
}

/// How a chronic holder is mounted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Chassis {
    HeadFixed,
    FreelyMoving,
}

impl fmt::Display for Chassis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::HeadFixed => "head fixed",
            Self::FreelyMoving => "freely moving",
        })
    }
}

/// Placement of a holder mesh relative to the probe it carries.
struct HolderPlacement {
    /// Degrees about x, then y, then z.
    rotation: [f64; 3],
    /// Offset in file units, applied after scaling.
    origin_mm: [f64; 3],
}

fn holder_placement(probe_type: &str) -> Option<HolderPlacement> {
    match probe_type {
        "NP24" => Some(HolderPlacement {
            rotation: [0.0, 0.0, 90.0],
            origin_mm: [32.399, 12.612, -16.973],
        }),
        "NP24a" => Some(HolderPlacement {
            rotation: [0.0, 0.0, 90.0],
            origin_mm: [33.259, -2.768, 2.080],
        }),
        "NP1" => Some(HolderPlacement {
            rotation: [-90.0, 0.0, 0.0],
            origin_mm: [0.081, -1.978, 9.762],
        }),
        _ => None,
    }
}

fn holder_file(probe_type: &str, chassis: Chassis) -> Option<String> {
    let prefix = match probe_type {
        "NP24" => "np2",
        "NP24a" => "np2a",
        "NP1" => "np1",
        _ => return None,
    };
    let suffix = match chassis {
        Chassis::HeadFixed => "head_fixed",
        Chassis::FreelyMoving => "freely_moving",
    };
    Some(format!("{prefix}_{suffix}.stl"))
}

/// A chronic holder mesh with an embedded probe.
#[derive(Debug, Clone)]
pub struct HolderAssembly {
    probe: ShankArray,
    chassis: Chassis,
    holder_mesh: TriMesh,
}

impl HolderAssembly {
    /// Every supported probe/chassis pair.
    pub const VARIANTS: [(&'static str, Chassis); 6] = [
        ("NP24", Chassis::HeadFixed),
        ("NP24", Chassis::FreelyMoving),
        ("NP24a", Chassis::HeadFixed),
        ("NP24a", Chassis::FreelyMoving),
        ("NP1", Chassis::HeadFixed),
        ("NP1", Chassis::FreelyMoving),
    ];

    /// Loads the holder mesh for `probe` from `mesh_dir`.
    ///
    /// The probe sits at the local origin with no extra offset; the holder mesh is
    /// scaled to micrometers, shifted and rotated onto it.
    pub fn load(probe: ShankArray, chassis: Chassis, mesh_dir: &Path) -> Result<Self> {
        let probe_type = probe.probe_type().to_string();
        let (Some(placement), Some(file)) =
            (holder_placement(&probe_type), holder_file(&probe_type, chassis))
        else {
            return Err(ProbescopeError::UnknownProbeType(format!(
                "{probe_type} has no {chassis} chronic holder"
            )));
        };
        let origin = DVec3::from_array(placement.origin_mm) * HOLDER_SCALE;
        let holder_mesh = load_mesh(&mesh_dir.join(file))?
            .scaled(HOLDER_SCALE)
            .translated(origin)
            .rotated(&rotation_xyz(placement.rotation));
        Ok(Self {
            probe,
            chassis,
            holder_mesh,
        })
    }

    /// Name used in object lists and experiment files.
    #[must_use]
    pub fn name_for(probe_type: &str, chassis: Chassis) -> String {
        let short = match probe_type {
            "NP24" => "NP2",
            "NP24a" => "NP2a",
            other => other,
        };
        format!("{short} chronic holder - {chassis}")
    }

    #[must_use]
    pub fn display_name(&self) -> String {
        Self::name_for(self.probe.probe_type(), self.chassis)
    }

    #[must_use]
    pub fn probe(&self) -> &ShankArray {
        &self.probe
    }

    #[must_use]
    pub fn chassis(&self) -> Chassis {
        self.chassis
    }

    /// The holder mesh in the probe's local frame.
    #[must_use]
    pub fn holder_mesh(&self) -> &TriMesh {
        &self.holder_mesh
    }
}
