//! Brain atlas: coordinate space, outer surface and named regions.
//!
//! All region meshes held by an [`Atlas`] are already in stereotaxic
//! micrometers from bregma. [`AtlasSpace`] converts between that frame and the
//! atlas's native voxel grid.

mod annotation;
mod brainglobe;

use std::collections::HashMap;

use glam::{DMat3, DVec3};
use probescope_core::error::{ProbescopeError, Result};
use probescope_core::mesh::TriMesh;
use probescope_core::options::AtlasTransformation;
use probescope_core::transform::rotation_xyz;
use serde::{Deserialize, Serialize};

pub use annotation::{AnnotationVolume, VoxelRun};
pub use brainglobe::{BrainGlobeMetadata, BrainGlobeProvider, StructureRecord};

/// Acronym of the whole-brain structure used as the outer surface.
pub const ROOT_ACRONYM: &str = "root";

/// Placement of an atlas's voxel grid relative to bregma.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AtlasSpace {
    /// Micrometers per voxel along each atlas axis.
    pub resolution: DVec3,
    /// Bregma in voxel coordinates.
    pub bregma_voxel: DVec3,
    /// Degrees about x, then y, then z, from atlas axes to ML/AP/DV.
    pub angles: [f64; 3],
    /// Per-axis scaling applied after rotation.
    pub scaling: DVec3,
}

impl AtlasSpace {
    /// Builds the space from a stored transformation and the atlas resolution.
    pub fn new(resolution: DVec3, transformation: &AtlasTransformation) -> Self {
        Self {
            resolution,
            bregma_voxel: DVec3::from_array(transformation.bregma_location),
            angles: transformation.angles,
            scaling: DVec3::from_array(transformation.scaling),
        }
    }

    /// A space whose voxels are micrometers with bregma at the origin.
    pub fn identity() -> Self {
        Self {
            resolution: DVec3::ONE,
            bregma_voxel: DVec3::ZERO,
            angles: [0.0; 3],
            scaling: DVec3::ONE,
        }
    }

    /// Rotation from atlas axes into stereotaxic axes.
    #[must_use]
    pub fn rotation(&self) -> DMat3 {
        rotation_xyz(self.angles)
    }

    fn bregma_um(&self) -> DVec3 {
        self.bregma_voxel * self.resolution
    }

    /// Stereotaxic micrometers to continuous voxel coordinates.
    #[must_use]
    pub fn bregma_to_atlas_voxels(&self, p: DVec3) -> DVec3 {
        let native = self.rotation().transpose() * (p / self.scaling) + self.bregma_um();
        native / self.resolution
    }

    /// Voxel coordinates to stereotaxic micrometers.
    #[must_use]
    pub fn atlas_voxels_to_bregma(&self, voxel: DVec3) -> DVec3 {
        self.native_to_bregma_um(voxel * self.resolution)
    }

    /// Native atlas micrometers (as meshes are stored) to stereotaxic micrometers.
    #[must_use]
    pub fn native_to_bregma_um(&self, p: DVec3) -> DVec3 {
        (self.rotation() * (p - self.bregma_um())) * self.scaling
    }

    /// Rounds a stereotaxic point to the nearest voxel index.
    #[must_use]
    pub fn voxel_index(&self, p: DVec3) -> [i64; 3] {
        let v = self.bregma_to_atlas_voxels(p).round();
        #[allow(clippy::cast_possible_truncation)]
        [v.x as i64, v.y as i64, v.z as i64]
    }
}

/// A named anatomical region.
#[derive(Debug, Clone)]
pub struct AtlasRegion {
    pub id: u32,
    pub acronym: String,
    pub name: String,
    /// Ids from the hierarchy root down to this region.
    pub structure_id_path: Vec<u32>,
    pub rgb: [u8; 3],
    /// Surface in stereotaxic micrometers.
    pub mesh: TriMesh,
}

impl AtlasRegion {
    /// A region with no hierarchy information.
    pub fn new(id: u32, acronym: impl Into<String>, mesh: TriMesh) -> Self {
        let acronym = acronym.into();
        Self {
            id,
            name: acronym.clone(),
            acronym,
            structure_id_path: vec![id],
            rgb: [128, 128, 128],
            mesh,
        }
    }

    /// Depth in the structure tree; the root has depth 1.
    #[must_use]
    pub fn tree_depth(&self) -> usize {
        self.structure_id_path.len()
    }
}

/// A loaded atlas.
#[derive(Debug, Clone)]
pub struct Atlas {
    name: String,
    space: AtlasSpace,
    surface: TriMesh,
    regions: Vec<AtlasRegion>,
    by_acronym: HashMap<String, usize>,
    by_id: HashMap<u32, usize>,
    annotation: Option<AnnotationVolume>,
    visible: Vec<String>,
}

impl Atlas {
    /// Creates an atlas. Regions keep the order given, which is also the
    /// tie-break order for crossings.
    pub fn new(
        name: impl Into<String>,
        space: AtlasSpace,
        surface: TriMesh,
        regions: Vec<AtlasRegion>,
    ) -> Result<Self> {
        let name = name.into();
        if surface.is_empty() {
            return Err(ProbescopeError::InvalidAtlas(format!("{name}: empty outer surface")));
        }
        let mut by_acronym = HashMap::with_capacity(regions.len());
        let mut by_id = HashMap::with_capacity(regions.len());
        for (i, r) in regions.iter().enumerate() {
            if by_acronym.insert(r.acronym.clone(), i).is_some() {
                return Err(ProbescopeError::InvalidAtlas(format!(
                    "{name}: duplicate region '{}'",
                    r.acronym
                )));
            }
            if by_id.insert(r.id, i).is_some() {
                return Err(ProbescopeError::InvalidAtlas(format!(
                    "{name}: duplicate region id {}",
                    r.id
                )));
            }
        }
        log::info!("atlas '{name}' ready with {} regions", regions.len());
        Ok(Self {
            name,
            space,
            surface,
            regions,
            by_acronym,
            by_id,
            annotation: None,
            visible: Vec::new(),
        })
    }

    /// Attaches a voxel annotation volume.
    #[must_use]
    pub fn with_annotation(mut self, annotation: AnnotationVolume) -> Self {
        self.annotation = Some(annotation);
        self
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn space(&self) -> &AtlasSpace {
        &self.space
    }

    /// The outer brain surface.
    #[must_use]
    pub fn surface(&self) -> &TriMesh {
        &self.surface
    }

    /// Regions in insertion order.
    #[must_use]
    pub fn regions(&self) -> &[AtlasRegion] {
        &self.regions
    }

    #[must_use]
    pub fn annotation(&self) -> Option<&AnnotationVolume> {
        self.annotation.as_ref()
    }

    /// Looks up a region by acronym.
    pub fn region(&self, acronym: &str) -> Result<&AtlasRegion> {
        self.by_acronym
            .get(acronym)
            .map(|&i| &self.regions[i])
            .ok_or_else(|| ProbescopeError::UnknownRegion(acronym.to_string()))
    }

    #[must_use]
    pub fn region_by_id(&self, id: u32) -> Option<&AtlasRegion> {
        self.by_id.get(&id).map(|&i| &self.regions[i])
    }

    /// Position of region `id` in insertion order.
    #[must_use]
    pub fn region_index(&self, id: u32) -> Option<usize> {
        self.by_id.get(&id).copied()
    }

    /// Marks a region as shown.
    pub fn show_region(&mut self, acronym: &str) -> Result<()> {
        self.region(acronym)?;
        if !self.visible.iter().any(|v| v == acronym) {
            self.visible.push(acronym.to_string());
        }
        Ok(())
    }

    /// Marks a region as hidden. Returns false if it was not shown.
    pub fn hide_region(&mut self, acronym: &str) -> bool {
        let before = self.visible.len();
        self.visible.retain(|v| v != acronym);
        self.visible.len() != before
    }

    /// Hides every region.
    pub fn clear_visible(&mut self) {
        self.visible.clear();
    }

    /// Shown regions, in the order they were shown.
    #[must_use]
    pub fn visible_regions(&self) -> &[String] {
        &self.visible
    }

    /// Region at a stereotaxic point, from the annotation volume.
    #[must_use]
    pub fn structure_at(&self, p: DVec3) -> Option<&AtlasRegion> {
        let annotation = self.annotation.as_ref()?;
        let id = annotation.get(self.space.voxel_index(p));
        self.region_by_id(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn allen_space() -> AtlasSpace {
        AtlasSpace::new(
            DVec3::splat(25.0),
            &AtlasTransformation {
                bregma_location: [216.0, 18.0, 228.0],
                angles: [90.0, -5.0, 90.0],
                scaling: [1.0, 1.0, 1.0],
            },
        )
    }

    #[test]
    fn test_bregma_maps_to_bregma_voxel() {
        let space = allen_space();
        let v = space.bregma_to_atlas_voxels(DVec3::ZERO);
        assert!(v.abs_diff_eq(DVec3::new(216.0, 18.0, 228.0), 1e-9));
        assert_eq!(space.voxel_index(DVec3::ZERO), [216, 18, 228]);
    }

    #[test]
    fn test_voxel_roundtrip() {
        let mut space = allen_space();
        space.scaling = DVec3::new(1.0, 0.95, 1.1);
        let p = DVec3::new(-1200.0, 2500.0, -3000.0);
        let back = space.atlas_voxels_to_bregma(space.bregma_to_atlas_voxels(p));
        assert!(back.abs_diff_eq(p, 1e-9));
    }

    #[test]
    fn test_first_voxel_axis_lands_on_ap() {
        let mut space = allen_space();
        space.angles = [90.0, 0.0, 90.0];
        let step = space.atlas_voxels_to_bregma(DVec3::new(217.0, 18.0, 228.0));
        assert!(step.abs_diff_eq(DVec3::new(0.0, 25.0, 0.0), 1e-9));
    }

    #[test]
    fn test_region_lookup_and_visibility() {
        let surface = TriMesh::cuboid(DVec3::splat(-10.0), DVec3::splat(10.0));
        let regions = vec![
            AtlasRegion::new(1, "VISp", TriMesh::cuboid(DVec3::ZERO, DVec3::ONE)),
            AtlasRegion::new(2, "CP", TriMesh::cuboid(DVec3::ZERO, DVec3::ONE)),
        ];
        let mut atlas = Atlas::new("test", AtlasSpace::identity(), surface, regions).unwrap();
        assert_eq!(atlas.region("CP").unwrap().id, 2);
        assert_eq!(atlas.region_index(2), Some(1));
        assert!(matches!(atlas.region("MOp"), Err(ProbescopeError::UnknownRegion(_))));

        atlas.show_region("CP").unwrap();
        atlas.show_region("VISp").unwrap();
        atlas.show_region("CP").unwrap();
        assert_eq!(atlas.visible_regions(), ["CP", "VISp"]);
        assert!(atlas.hide_region("CP"));
        assert!(!atlas.hide_region("CP"));
        assert!(atlas.show_region("MOp").is_err());
    }

    #[test]
    fn test_duplicate_regions_rejected() {
        let surface = TriMesh::cuboid(DVec3::splat(-10.0), DVec3::splat(10.0));
        let regions = vec![
            AtlasRegion::new(1, "VISp", TriMesh::empty()),
            AtlasRegion::new(2, "VISp", TriMesh::empty()),
        ];
        assert!(Atlas::new("dup", AtlasSpace::identity(), surface, regions).is_err());
    }
}
