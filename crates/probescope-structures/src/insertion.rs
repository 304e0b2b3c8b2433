//! Converting between entry/depth and tip placements.
//!
//! An insertion is described either by where the probe crosses the brain surface
//! (AP/ML of the entry point, angles, depth along the shank) or by where its tip
//! is. The surface point is found by casting against the atlas outer surface;
//! every cast is clipped to the surface's bounding box, so it always terminates.

use glam::{DVec2, DVec3};
use probescope_core::error::{ProbescopeError, Result};
use probescope_core::mesh::TriMesh;
use probescope_core::transform::{from_euler, EulerAngles};
use serde::{Deserialize, Serialize};

/// Clearance above the surface from which the entry ray starts.
const RAY_CLEARANCE: f64 = 1000.0;

/// How far apart (µm) the axis crossing and the top-down crossing may be.
const ENTRY_TOLERANCE: f64 = 1e-3;

/// The two equivalent ways of placing a probe.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum InsertionSpec {
    /// Entry point `(ML, AP)` on the surface, angles, and depth along the shank.
    EntryDepth {
        entry: DVec2,
        angles: EulerAngles,
        depth: f64,
    },
    /// Tip position `(ML, AP, DV)` and angles.
    Tip { tip: DVec3, angles: EulerAngles },
}

/// The entry/depth view of a placement.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EntryDepth {
    /// Surface crossing `(ML, AP, DV)`.
    pub entry: DVec3,
    pub angles: EulerAngles,
    /// Distance from the entry point to the tip along the shank axis.
    pub depth: f64,
}

impl EntryDepth {
    /// Returns the `(ML, AP)` part of the entry point.
    #[must_use]
    pub fn entry_ml_ap(&self) -> DVec2 {
        self.entry.truncate()
    }
}

/// Unit vector from the tip up the shank for `angles`.
#[must_use]
pub fn shank_axis(angles: EulerAngles) -> DVec3 {
    from_euler(angles) * DVec3::Y
}

/// Casts against an outer surface mesh.
#[derive(Debug, Clone, Copy)]
pub struct InsertionSolver<'a> {
    surface: &'a TriMesh,
}

impl<'a> InsertionSolver<'a> {
    pub fn new(surface: &'a TriMesh) -> Self {
        Self { surface }
    }

    /// Finds the surface point straight below `(ML, AP)`.
    ///
    /// The ray comes down the DV axis from above the surface; if it crosses the
    /// surface more than once the highest crossing wins.
    pub fn surface_point(&self, entry: DVec2) -> Result<DVec3> {
        let bounds = self.surface.bounds();
        if bounds.is_empty() || !entry.is_finite() {
            return Err(ProbescopeError::NoSurfaceIntersection);
        }
        let origin = entry.extend(bounds.max.z + RAY_CLEARANCE);
        let reach = bounds.extent().z + 2.0 * RAY_CLEARANCE;
        let hits = self.surface.line_hits(origin, DVec3::NEG_Z, 0.0, reach);
        let t = hits.first().ok_or(ProbescopeError::NoSurfaceIntersection)?;
        let point = origin + DVec3::NEG_Z * *t;
        log::debug!("entry ray at ({}, {}) hit the surface at DV {}", entry.x, entry.y, point.z);
        Ok(point)
    }

    /// Tip position for an entry point, angles and depth.
    pub fn tip_from_entry(&self, entry: DVec2, angles: EulerAngles, depth: f64) -> Result<DVec3> {
        if !depth.is_finite() || !angles.is_finite() {
            return Err(ProbescopeError::InvalidPose(format!(
                "depth {depth} and angles {:?} must be finite",
                angles.to_array()
            )));
        }
        let surface_point = self.surface_point(entry)?;
        Ok(surface_point - shank_axis(angles) * depth)
    }

    /// Distance from `tip` along the unit vector `axis` to the outermost
    /// surface crossing, or `None` if the axis never crosses the surface.
    #[must_use]
    pub fn axis_entry(&self, tip: DVec3, axis: DVec3) -> Option<f64> {
        let bounds = self.surface.bounds();
        if bounds.is_empty() || !tip.is_finite() || !axis.is_finite() {
            return None;
        }
        let reach = (tip - bounds.center()).length() + bounds.diagonal();
        self.surface.line_hits(tip, axis, 0.0, reach).last().copied()
    }

    /// Entry point and depth for a tip and angles.
    ///
    /// Follows the shank axis up from the tip and takes the outermost surface
    /// crossing. That crossing must also be the one [`Self::surface_point`]
    /// finds above its `(ML, AP)`; an axis leaving through the side or the
    /// underside of the surface has no entry point.
    pub fn entry_from_tip(&self, tip: DVec3, angles: EulerAngles) -> Result<EntryDepth> {
        if !angles.is_finite() {
            return Err(ProbescopeError::NoSurfaceIntersection);
        }
        let axis = shank_axis(angles);
        let depth = self
            .axis_entry(tip, axis)
            .ok_or(ProbescopeError::NoSurfaceIntersection)?;
        let entry = tip + axis * depth;
        let above = self.surface_point(entry.truncate())?;
        if (above.z - entry.z).abs() > ENTRY_TOLERANCE {
            log::debug!(
                "shank axis leaves the surface at DV {} below its top at DV {}",
                entry.z,
                above.z
            );
            return Err(ProbescopeError::NoSurfaceIntersection);
        }
        Ok(EntryDepth {
            entry,
            angles,
            depth,
        })
    }
}
