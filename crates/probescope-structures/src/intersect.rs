//! Which atlas regions a shank passes through, and at what depths.
//!
//! Segment queries measure depth from the segment's first point. Shank queries
//! measure it from where the shank's axis crosses the outer surface, growing
//! toward the tip. Every query is a pure read of the current pose and atlas;
//! nothing is cached between calls.

use glam::DVec3;
use probescope_core::mesh::{TriMesh, HIT_MERGE_TOLERANCE};
use serde::{Deserialize, Serialize};

use crate::atlas::{Atlas, AtlasRegion, ROOT_ACRONYM};
use crate::geometry::Shank;
use crate::insertion::InsertionSolver;
use crate::instance::ProbeInstance;

/// A depth interval spent inside one region.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionCrossing {
    pub region_id: u32,
    pub acronym: String,
    pub entry_depth: f64,
    pub exit_depth: f64,
}

impl RegionCrossing {
    #[must_use]
    pub fn length(&self) -> f64 {
        self.exit_depth - self.entry_depth
    }
}

/// Crossings of one shank.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShankCrossings {
    pub shank: String,
    pub crossings: Vec<RegionCrossing>,
}

/// Crossings of the segment `a`-`b` through `regions`.
///
/// Each region's mesh is treated as a closed surface: crossings along the full
/// line are paired into inside intervals and clipped to the segment. Overlapping
/// intervals of the same region are merged. The result is sorted by entry depth;
/// regions entered at the same depth keep their order in `regions`.
#[must_use]
pub fn intersect<'r>(
    a: DVec3,
    b: DVec3,
    regions: impl IntoIterator<Item = &'r AtlasRegion>,
) -> Vec<RegionCrossing> {
    let mut found: Vec<(usize, RegionCrossing)> = Vec::new();
    let len = (b - a).length();
    if !(a.is_finite() && b.is_finite()) || len <= f64::EPSILON {
        return Vec::new();
    }
    let dir = (b - a) / len;

    for (index, region) in regions.into_iter().enumerate() {
        if !region.mesh.bounds().intersects_segment(a, b) {
            continue;
        }
        for (entry, exit) in inside_intervals(&region.mesh, a, dir, len) {
            found.push((
                index,
                RegionCrossing {
                    region_id: region.id,
                    acronym: region.acronym.clone(),
                    entry_depth: entry,
                    exit_depth: exit,
                },
            ));
        }
    }
    order_crossings(found)
}

/// Inside intervals of `mesh` along `a + t * dir`, clipped to `[0, len]`.
fn inside_intervals(mesh: &TriMesh, a: DVec3, dir: DVec3, len: f64) -> Vec<(f64, f64)> {
    let bounds = mesh.bounds();
    let reach = (a - bounds.center()).length() + bounds.diagonal();
    let hits = mesh.line_hits(a, dir, -reach, len + reach);

    let mut intervals: Vec<(f64, f64)> = hits
        .chunks_exact(2)
        .map(|pair| (pair[0].max(0.0), pair[1].min(len)))
        .filter(|(entry, exit)| exit - entry > HIT_MERGE_TOLERANCE)
        .collect();
    if hits.len() % 2 == 1 {
        log::debug!("open mesh: dropping unpaired crossing at t = {:?}", hits.last());
    }

    intervals.sort_by(|x, y| x.0.total_cmp(&y.0));
    let mut merged: Vec<(f64, f64)> = Vec::with_capacity(intervals.len());
    for (entry, exit) in intervals {
        match merged.last_mut() {
            Some(last) if entry <= last.1 + HIT_MERGE_TOLERANCE => last.1 = last.1.max(exit),
            _ => merged.push((entry, exit)),
        }
    }
    merged
}

/// Sorts by entry depth; entries within tolerance of each other are ordered by
/// region index.
fn order_crossings(mut found: Vec<(usize, RegionCrossing)>) -> Vec<RegionCrossing> {
    found.sort_by(|x, y| x.1.entry_depth.total_cmp(&y.1.entry_depth));
    let mut ordered = Vec::with_capacity(found.len());
    let mut start = 0;
    while start < found.len() {
        let base = found[start].1.entry_depth;
        let mut end = start + 1;
        while end < found.len() && found[end].1.entry_depth - base <= HIT_MERGE_TOLERANCE {
            end += 1;
        }
        found[start..end].sort_by_key(|(index, _)| *index);
        ordered.extend(found[start..end].iter().map(|(_, c)| c.clone()));
        start = end;
    }
    ordered
}

/// Crossing queries against one atlas.
#[derive(Debug, Clone, Copy)]
pub struct RegionIntersector<'a> {
    atlas: &'a Atlas,
}

impl<'a> RegionIntersector<'a> {
    pub fn new(atlas: &'a Atlas) -> Self {
        Self { atlas }
    }

    /// Regions tested by [`RegionIntersector::intersect`]: every region except
    /// the root, whose mesh is the outer surface.
    fn candidate_regions(&self) -> impl Iterator<Item = &'a AtlasRegion> {
        self.atlas
            .regions()
            .iter()
            .filter(|r| r.acronym != ROOT_ACRONYM)
    }

    /// Mesh crossings of the segment `a`-`b`.
    #[must_use]
    pub fn intersect(&self, a: DVec3, b: DVec3) -> Vec<RegionCrossing> {
        intersect(a, b, self.candidate_regions())
    }

    /// Crossings of the segment `a`-`b` read from the annotation volume.
    ///
    /// Walks every voxel the segment touches. Voxels outside the brain (id 0)
    /// and ids with no loaded region are skipped. Returns nothing if the atlas
    /// has no annotation.
    #[must_use]
    pub fn intersect_volume(&self, a: DVec3, b: DVec3) -> Vec<RegionCrossing> {
        let Some(annotation) = self.atlas.annotation() else {
            return Vec::new();
        };
        let len = (b - a).length();
        if !(a.is_finite() && b.is_finite()) || len <= f64::EPSILON {
            return Vec::new();
        }
        let space = self.atlas.space();
        let runs = annotation.walk(space.bregma_to_atlas_voxels(a), space.bregma_to_atlas_voxels(b));

        let mut crossings: Vec<RegionCrossing> = Vec::new();
        for run in runs.into_iter().filter(|r| r.id != 0) {
            let Some(region) = self.atlas.region_by_id(run.id) else {
                log::debug!("annotation id {} has no loaded region", run.id);
                continue;
            };
            let (entry, exit) = (run.t_start * len, run.t_end * len);
            match crossings.last_mut() {
                Some(last) if last.region_id == run.id => last.exit_depth = exit,
                _ => crossings.push(RegionCrossing {
                    region_id: run.id,
                    acronym: region.acronym.clone(),
                    entry_depth: entry,
                    exit_depth: exit,
                }),
            }
        }
        crossings
    }

    /// Crossings of one placed shank, with depths measured from its surface
    /// entry toward the tip.
    ///
    /// Only the part of the shank below the surface is walked. A shank whose
    /// axis never crosses the surface has no crossings. Uses the annotation
    /// volume when the atlas has one, meshes otherwise.
    #[must_use]
    pub fn shank_path(&self, shank: &Shank) -> Vec<RegionCrossing> {
        let length = shank.length();
        if length <= f64::EPSILON {
            return Vec::new();
        }
        let axis = shank.axis();
        let Some(entry) = InsertionSolver::new(self.atlas.surface()).axis_entry(shank.tip, axis)
        else {
            return Vec::new();
        };
        // Start at the surface, or at the top when the whole shank is buried.
        let start = entry.min(length);
        let from = shank.tip + axis * start;
        let mut crossings = if self.atlas.annotation().is_some() {
            self.intersect_volume(from, shank.tip)
        } else {
            self.intersect(from, shank.tip)
        };
        let offset = entry - start;
        for crossing in &mut crossings {
            crossing.entry_depth += offset;
            crossing.exit_depth += offset;
        }
        crossings
    }

    /// Crossings of every shank of `instance`.
    #[must_use]
    pub fn shank_crossings(&self, instance: &ProbeInstance) -> Vec<ShankCrossings> {
        instance
            .world_shanks()
            .into_iter()
            .map(|shank| ShankCrossings {
                crossings: self.shank_path(&shank),
                shank: shank.name,
            })
            .collect()
    }
}
