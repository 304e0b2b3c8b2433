//! A probe placed in the scene.

use std::sync::Arc;

use probescope_core::events::ObjectId;
use probescope_core::mesh::TriMesh;
use probescope_core::render::{ColorState, ObjectUniforms, RenderItem};

use crate::geometry::{GeometryKind, ProbeGeometry, Shank};
use crate::pose::{ProbePose, ProbeReport};

/// One object in the scene: shared geometry plus its own pose.
#[derive(Debug, Clone)]
pub struct ProbeInstance {
    id: ObjectId,
    info: String,
    kind: GeometryKind,
    geometry: Arc<ProbeGeometry>,
    pose: ProbePose,
    active: bool,
}

impl ProbeInstance {
    /// Creates an inactive instance at the home pose.
    pub fn new(id: ObjectId, kind: GeometryKind, geometry: Arc<ProbeGeometry>) -> Self {
        Self {
            id,
            info: String::new(),
            kind,
            geometry,
            pose: ProbePose::home_pose(),
            active: false,
        }
    }

    #[must_use]
    pub fn id(&self) -> ObjectId {
        self.id
    }

    /// Free-form user label.
    #[must_use]
    pub fn info(&self) -> &str {
        &self.info
    }

    pub fn set_info(&mut self, info: impl Into<String>) {
        self.info = info.into();
    }

    /// What the geometry was built from.
    #[must_use]
    pub fn kind(&self) -> &GeometryKind {
        &self.kind
    }

    #[must_use]
    pub fn geometry(&self) -> &Arc<ProbeGeometry> {
        &self.geometry
    }

    #[must_use]
    pub fn name(&self) -> String {
        self.geometry.display_name()
    }

    #[must_use]
    pub fn pose(&self) -> &ProbePose {
        &self.pose
    }

    pub fn pose_mut(&mut self) -> &mut ProbePose {
        &mut self.pose
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.active
    }

    pub(crate) fn set_active(&mut self, active: bool) {
        self.active = active;
    }

    #[must_use]
    pub fn color_state(&self) -> ColorState {
        ColorState::from_active(self.active)
    }

    /// Uniforms for every mesh of this object.
    #[must_use]
    pub fn uniforms(&self) -> ObjectUniforms {
        ObjectUniforms::new(&self.pose.world_matrix(), self.color_state())
    }

    /// Meshes to draw, each with this object's uniforms.
    pub fn render_items(&self) -> Vec<RenderItem<'_>> {
        let uniforms = self.uniforms();
        self.geometry
            .render_meshes()
            .into_iter()
            .map(|mesh| RenderItem {
                object: self.id,
                mesh,
                uniforms,
            })
            .collect()
    }

    /// Shanks in stereotaxic coordinates.
    pub fn world_shanks(&self) -> Vec<Shank> {
        self.geometry
            .shanks()
            .map(|s| s.transformed(self.pose.pose()))
            .collect()
    }

    #[must_use]
    pub fn probe_report(&self, surface: Option<&TriMesh>) -> ProbeReport {
        self.pose.probe_report(surface)
    }
}
