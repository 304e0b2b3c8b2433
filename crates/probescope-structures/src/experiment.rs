//! Saving, restoring and exporting a planned experiment.
//!
//! An experiment file records which atlas was used and, for every object, what it
//! was built from and where it is. Loading rebuilds each object independently:
//! an object that cannot be rebuilt is skipped and reported, the rest load.

use std::path::Path;
use std::sync::Arc;

use probescope_core::config::write_json;
use probescope_core::error::Result;
use probescope_core::events::ObjectId;
use serde::{Deserialize, Serialize};

use crate::atlas::Atlas;
use crate::geometry::{GeometryBuilder, GeometryKind, ProbeGeometry};
use crate::intersect::{RegionIntersector, ShankCrossings};
use crate::pose::ProbeReport;
use crate::registry::SceneRegistry;

/// Atlas settings stored with an experiment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AtlasRecord {
    pub name: String,
    #[serde(default)]
    pub visible_regions: Vec<String>,
    pub bregma_location: [f64; 3],
    pub rotation_angles: [f64; 3],
    pub scaling: [f64; 3],
}

impl AtlasRecord {
    pub fn from_atlas(atlas: &Atlas) -> Self {
        let space = atlas.space();
        Self {
            name: atlas.name().to_string(),
            visible_regions: atlas.visible_regions().to_vec(),
            bregma_location: space.bregma_voxel.to_array(),
            rotation_angles: space.angles,
            scaling: space.scaling.to_array(),
        }
    }
}

/// One saved object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectRecord {
    pub variant: GeometryKind,
    pub name: String,
    #[serde(default)]
    pub info: String,
    #[serde(default)]
    pub active: bool,
    #[serde(flatten)]
    pub report: ProbeReport,
}

/// A saved experiment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentRecord {
    pub atlas: AtlasRecord,
    pub objects: Vec<ObjectRecord>,
    /// RFC 3339 time of saving.
    #[serde(default)]
    pub saved_at: String,
}

/// An object that could not be restored.
#[derive(Debug, Clone, PartialEq)]
pub struct SkippedObject {
    pub name: String,
    pub reason: String,
}

/// Outcome of [`ExperimentRecord::restore`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoadReport {
    pub loaded: Vec<ObjectId>,
    pub skipped: Vec<SkippedObject>,
}

impl ExperimentRecord {
    /// Records the current scene.
    pub fn capture(atlas: &Atlas, registry: &SceneRegistry) -> Self {
        let objects = registry
            .iter()
            .map(|object| ObjectRecord {
                variant: object.kind().clone(),
                name: object.name(),
                info: object.info().to_string(),
                active: object.is_active(),
                report: object.probe_report(Some(atlas.surface())),
            })
            .collect();
        Self {
            atlas: AtlasRecord::from_atlas(atlas),
            objects,
            saved_at: chrono::Utc::now().to_rfc3339(),
        }
    }

    /// Writes the record as pretty JSON.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        write_json(path, self)?;
        log::info!("saved {} objects to {}", self.objects.len(), path.display());
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let record: Self = serde_json::from_str(&text)?;
        log::info!(
            "read experiment {} ({} objects, saved {})",
            path.display(),
            record.objects.len(),
            record.saved_at
        );
        Ok(record)
    }

    /// Adds every recorded object to `registry`, placed by its saved tip and
    /// angles. The object saved as active becomes active; if none was, nothing is.
    pub fn restore(&self, builder: &GeometryBuilder<'_>, registry: &mut SceneRegistry) -> LoadReport {
        let mut report = LoadReport::default();
        let mut built: Vec<(GeometryKind, Arc<ProbeGeometry>)> = Vec::new();
        let mut active = None;

        for record in &self.objects {
            let geometry = match built.iter().find(|(kind, _)| *kind == record.variant) {
                Some((_, geometry)) => Arc::clone(geometry),
                None => match builder.build(&record.variant) {
                    Ok(geometry) => {
                        let geometry = Arc::new(geometry);
                        built.push((record.variant.clone(), Arc::clone(&geometry)));
                        geometry
                    }
                    Err(e) => {
                        log::warn!("skipping '{}': {e}", record.name);
                        report.skipped.push(SkippedObject {
                            name: record.name.clone(),
                            reason: e.to_string(),
                        });
                        continue;
                    }
                },
            };

            let id = registry.add(record.variant.clone(), geometry);
            let placed = registry.get_mut(id).map(|object| {
                object.set_info(record.info.clone());
                object
                    .pose_mut()
                    .set_from_tip_angles(record.report.tip.into(), record.report.angles)
            });
            if let Some(Err(e)) = placed {
                log::warn!("skipping '{}': {e}", record.name);
                registry.remove(id);
                report.skipped.push(SkippedObject {
                    name: record.name.clone(),
                    reason: e.to_string(),
                });
                continue;
            }
            if record.active {
                active = Some(id);
            }
            report.loaded.push(id);
        }

        match active {
            Some(id) => {
                if let Err(e) = registry.select(id) {
                    log::warn!("cannot reactivate restored object: {e}");
                }
            }
            None => registry.deselect(),
        }
        report
    }

    /// Shows the saved visible regions that exist in `atlas`.
    pub fn restore_regions(&self, atlas: &mut Atlas) {
        atlas.clear_visible();
        for acronym in &self.atlas.visible_regions {
            if let Err(e) = atlas.show_region(acronym) {
                log::warn!("not restoring region: {e}");
            }
        }
    }
}

/// One probe in an export.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbeExport {
    pub name: String,
    pub info: String,
    pub variant: GeometryKind,
    #[serde(flatten)]
    pub report: ProbeReport,
    pub shanks: Vec<ShankCrossings>,
}

/// A flat per-probe summary with current region crossings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportRecord {
    pub atlas: String,
    pub exported_at: String,
    pub probes: Vec<ProbeExport>,
}

impl ExportRecord {
    pub fn capture(atlas: &Atlas, registry: &SceneRegistry) -> Self {
        let intersector = RegionIntersector::new(atlas);
        let probes = registry
            .iter()
            .map(|object| ProbeExport {
                name: object.name(),
                info: object.info().to_string(),
                variant: object.kind().clone(),
                report: object.probe_report(Some(atlas.surface())),
                shanks: intersector.shank_crossings(object),
            })
            .collect();
        Self {
            atlas: atlas.name().to_string(),
            exported_at: chrono::Utc::now().to_rfc3339(),
            probes,
        }
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        write_json(path, self)?;
        log::info!("exported {} probes to {}", self.probes.len(), path.display());
        Ok(())
    }
}
