//! Placement state of one probe.

use glam::{DMat4, DVec2, DVec3};
use probescope_core::error::Result;
use probescope_core::mesh::TriMesh;
use probescope_core::transform::{compose, to_matrix, EulerAngles, Pose};
use serde::{Deserialize, Serialize};

use crate::insertion::{EntryDepth, InsertionSolver, InsertionSpec};

/// A stereotaxic point as written in reports and experiment files.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StereotaxicPoint {
    #[serde(rename = "AP")]
    pub ap: f64,
    #[serde(rename = "ML")]
    pub ml: f64,
    #[serde(rename = "DV")]
    pub dv: f64,
}

impl From<DVec3> for StereotaxicPoint {
    fn from(p: DVec3) -> Self {
        Self {
            ap: p.y,
            ml: p.x,
            dv: p.z,
        }
    }
}

impl From<StereotaxicPoint> for DVec3 {
    fn from(p: StereotaxicPoint) -> Self {
        DVec3::new(p.ml, p.ap, p.dv)
    }
}

/// Position and orientation summary of a probe.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProbeReport {
    pub tip: StereotaxicPoint,
    pub angles: EulerAngles,
    /// Where the shank axis crosses the surface, if it does.
    pub entrypoint: Option<StereotaxicPoint>,
    /// Zero when there is no entry point.
    pub depth_along_probe_axis: f64,
}

/// Where a probe is. The pose's position is the geometry's local origin.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProbePose {
    pose: Pose,
}

impl ProbePose {
    /// Angles of a freshly placed probe.
    pub const HOME_ANGLES: EulerAngles = EulerAngles::VERTICAL;

    pub fn new(pose: Pose) -> Self {
        Self { pose }
    }

    /// A vertical probe with its tip at bregma.
    pub fn home_pose() -> Self {
        Self::new(Pose::new(DVec3::ZERO, Self::HOME_ANGLES))
    }

    #[must_use]
    pub fn pose(&self) -> &Pose {
        &self.pose
    }

    /// Tip position in micrometers from bregma.
    #[must_use]
    pub fn tip(&self) -> DVec3 {
        self.pose.position()
    }

    #[must_use]
    pub fn angles(&self) -> EulerAngles {
        self.pose.angles()
    }

    /// Unit vector from the tip up the shank.
    #[must_use]
    pub fn shank_axis(&self) -> DVec3 {
        self.pose.transform_vector(DVec3::Y)
    }

    /// Matrix handed to the renderer.
    #[must_use]
    pub fn world_matrix(&self) -> DMat4 {
        to_matrix(&self.pose)
    }

    /// Places the tip directly. Non-finite input leaves the pose unchanged.
    pub fn set_from_tip_angles(&mut self, tip: DVec3, angles: EulerAngles) -> Result<()> {
        self.pose = Pose::try_new(tip, angles)?;
        Ok(())
    }

    /// Places the probe by entry point, angles and depth below the surface.
    ///
    /// On error the pose is unchanged.
    pub fn set_from_entry_depth_angles(
        &mut self,
        entry: DVec2,
        angles: EulerAngles,
        depth: f64,
        surface: &TriMesh,
    ) -> Result<()> {
        let tip = InsertionSolver::new(surface).tip_from_entry(entry, angles, depth)?;
        self.set_from_tip_angles(tip, angles)
    }

    /// Applies either form of [`InsertionSpec`].
    pub fn apply_spec(&mut self, spec: &InsertionSpec, surface: &TriMesh) -> Result<()> {
        match *spec {
            InsertionSpec::EntryDepth {
                entry,
                angles,
                depth,
            } => self.set_from_entry_depth_angles(entry, angles, depth, surface),
            InsertionSpec::Tip { tip, angles } => self.set_from_tip_angles(tip, angles),
        }
    }

    /// The entry/depth view of the current pose.
    pub fn to_entry_depth_angles(&self, surface: &TriMesh) -> Result<EntryDepth> {
        InsertionSolver::new(surface).entry_from_tip(self.tip(), self.angles())
    }

    /// Applies `delta` in the probe's own frame.
    pub fn apply_local(&mut self, delta: &Pose) {
        self.pose = compose(&self.pose, delta);
    }

    /// Moves the probe by a world-frame offset.
    pub fn translate_world(&mut self, offset: DVec3) {
        let local = self.pose.rotation().inverse() * offset;
        self.apply_local(&Pose::from_translation(local));
    }

    /// Adds `delta` to the angles, pivoting about the tip.
    pub fn rotate(&mut self, delta: EulerAngles) {
        self.pose = self.pose.rotated_by(delta);
    }

    /// Back to bregma, vertical.
    pub fn home(&mut self) {
        *self = Self::home_pose();
    }

    /// Tip, angles and, when the axis crosses `surface`, entry point and depth.
    #[must_use]
    pub fn probe_report(&self, surface: Option<&TriMesh>) -> ProbeReport {
        let entry = surface.and_then(|s| self.to_entry_depth_angles(s).ok());
        ProbeReport {
            tip: self.tip().into(),
            angles: self.angles(),
            entrypoint: entry.map(|e| e.entry.into()),
            depth_along_probe_axis: entry.map_or(0.0, |e| e.depth),
        }
    }
}

#[cfg(test)]
mod tests {
    use probescope_core::error::ProbescopeError;
    use probescope_core::transform::is_orthonormal;
    use proptest::prelude::*;

    use super::*;

    fn brain() -> TriMesh {
        TriMesh::cuboid(DVec3::new(-6000.0, -9000.0, -8000.0), DVec3::new(6000.0, 6000.0, 0.0))
    }

    #[test]
    fn test_entry_depth_scenario() {
        let surface = brain();
        let mut pose = ProbePose::home_pose();
        let angles = EulerAngles::new(115.0, 0.0, -10.0);
        pose.set_from_entry_depth_angles(DVec2::new(-1578.0, -2485.0), angles, 3110.0, &surface)
            .unwrap();
        let back = pose.to_entry_depth_angles(&surface).unwrap();
        assert!(back.entry_ml_ap().abs_diff_eq(DVec2::new(-1578.0, -2485.0), 1e-3));
        assert!((back.depth - 3110.0).abs() < 1e-3);
        assert_eq!(back.angles, angles);
        assert!(pose.tip().z < 0.0);
    }

    #[test]
    fn test_failed_entry_keeps_pose() {
        let surface = brain();
        let mut pose = ProbePose::home_pose();
        pose.set_from_tip_angles(DVec3::new(10.0, 20.0, -30.0), EulerAngles::VERTICAL)
            .unwrap();
        let before = pose;
        let err = pose
            .set_from_entry_depth_angles(DVec2::new(5.0e6, 0.0), EulerAngles::VERTICAL, 100.0, &surface)
            .unwrap_err();
        assert!(matches!(err, ProbescopeError::NoSurfaceIntersection));
        assert_eq!(pose, before);
        assert!(pose.tip().is_finite());
    }

    #[test]
    fn test_nan_tip_rejected() {
        let mut pose = ProbePose::home_pose();
        let err = pose
            .set_from_tip_angles(DVec3::new(f64::NAN, 0.0, 0.0), EulerAngles::VERTICAL)
            .unwrap_err();
        assert!(matches!(err, ProbescopeError::InvalidPose(_)));
        assert_eq!(pose, ProbePose::home_pose());
    }

    #[test]
    fn test_report_without_entry() {
        let surface = brain();
        let mut pose = ProbePose::home_pose();
        pose.set_from_tip_angles(DVec3::new(0.0, 0.0, 2000.0), EulerAngles::VERTICAL)
            .unwrap();
        let report = pose.probe_report(Some(&surface));
        assert!(report.entrypoint.is_none());
        assert_eq!(report.depth_along_probe_axis, 0.0);
        assert_eq!(report.tip.dv, 2000.0);

        let json = serde_json::to_value(report).unwrap();
        assert_eq!(json["tip"]["DV"], 2000.0);
        assert_eq!(json["angles"]["elevation"], 90.0);
    }

    #[test]
    fn test_translate_world_ignores_orientation() {
        let mut pose = ProbePose::home_pose();
        pose.rotate(EulerAngles::new(-30.0, 10.0, 45.0));
        pose.translate_world(DVec3::new(100.0, 0.0, 0.0));
        assert!(pose.tip().abs_diff_eq(DVec3::new(100.0, 0.0, 0.0), 1e-9));
        assert_eq!(pose.angles(), EulerAngles::new(60.0, 10.0, 45.0));
    }

    proptest! {
        #[test]
        fn prop_tip_entry_tip_roundtrip(
            x in -3000.0f64..3000.0,
            y in -5000.0f64..3000.0,
            z in -6000.0f64..-500.0,
            elevation in 60.0f64..120.0,
            azimuth in -180.0f64..180.0,
            spin in -180.0f64..180.0,
        ) {
            let surface = brain();
            let angles = EulerAngles::new(elevation, spin, azimuth);
            let mut pose = ProbePose::home_pose();
            pose.set_from_tip_angles(DVec3::new(x, y, z), angles).unwrap();
            match pose.to_entry_depth_angles(&surface) {
                Ok(entry) => {
                    let mut again = ProbePose::home_pose();
                    again
                        .set_from_entry_depth_angles(entry.entry_ml_ap(), entry.angles, entry.depth, &surface)
                        .unwrap();
                    prop_assert!(again.tip().abs_diff_eq(pose.tip(), 1e-3));
                }
                Err(e) => {
                    // Only axes leaving through a side face have no entry point.
                    prop_assert!(matches!(e, ProbescopeError::NoSurfaceIntersection));
                    let depth = InsertionSolver::new(&surface)
                        .axis_entry(pose.tip(), pose.shank_axis())
                        .unwrap();
                    prop_assert!((pose.tip() + pose.shank_axis() * depth).z < -1e-3);
                }
            }
            prop_assert!(is_orthonormal(&pose.pose().rotation_matrix(), 1e-9));
        }
    }
}
