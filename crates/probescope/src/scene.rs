//! The planning scene: configuration, atlas, objects and their movement.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use probescope_core::config::Config;
use probescope_core::error::{ProbescopeError, Result};
use probescope_core::events::{ObjectId, SceneEvent, SceneListener};
use probescope_core::input::{KeyEvent, PickEvent};
use probescope_core::render::RenderItem;
use probescope_structures::atlas::{Atlas, BrainGlobeProvider};
use probescope_structures::experiment::{ExperimentRecord, ExportRecord, LoadReport};
use probescope_structures::geometry::{available_objects, GeometryBuilder, GeometryKind, ProbeGeometry};
use probescope_structures::insertion::InsertionSpec;
use probescope_structures::intersect::{RegionIntersector, ShankCrossings};
use probescope_structures::movement::{CrossingTracker, MovementController};
use probescope_structures::pose::{ProbePose, ProbeReport};
use probescope_structures::registry::SceneRegistry;

/// Everything needed to plan one experiment.
///
/// Key and pick events go through [`Scene::handle_key`] and
/// [`Scene::handle_pick`]. Region crossings are recomputed lazily: call
/// [`Scene::refresh`] after events, then read [`Scene::crossings`].
#[derive(Debug)]
pub struct Scene {
    config: Config,
    atlas: Atlas,
    registry: SceneRegistry,
    controller: MovementController,
    tracker: CrossingTracker,
    geometries: Vec<(GeometryKind, Arc<ProbeGeometry>)>,
    crossings: BTreeMap<ObjectId, Vec<ShankCrossings>>,
}

impl Scene {
    /// Creates an empty scene over `atlas`.
    pub fn new(config: Config, atlas: Atlas) -> Self {
        let mut controller = MovementController::from_config(&config);
        let tracker = CrossingTracker::new();
        controller.subscribe(Box::new(tracker.clone()));
        log::info!("scene created over atlas '{}'", atlas.name());
        Self {
            config,
            atlas,
            registry: SceneRegistry::new(),
            controller,
            tracker,
            geometries: Vec::new(),
            crossings: BTreeMap::new(),
        }
    }

    /// Creates a scene over the configured default atlas, read from the atlas
    /// directory.
    pub fn open(config: Config) -> Result<Self> {
        let prefs = &config.preferences;
        let name = prefs.default_atlas.clone();
        let transformation = prefs.atlas_transformation(&name).ok_or_else(|| {
            ProbescopeError::InvalidAtlas(format!("no transformation configured for '{name}'"))
        })?;
        let atlas = BrainGlobeProvider::new(&prefs.atlas_dir).load(&name, transformation, None)?;
        Ok(Self::new(config, atlas))
    }

    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Re-reads the configuration files and applies the new keybinds.
    pub fn reload_config(&mut self) -> Result<()> {
        self.config.reload()?;
        self.controller.set_keybinds(
            self.config.movement_keybinds.clone(),
            self.config.static_keybinds.clone(),
        );
        self.geometries.clear();
        Ok(())
    }

    #[must_use]
    pub fn atlas(&self) -> &Atlas {
        &self.atlas
    }

    pub fn atlas_mut(&mut self) -> &mut Atlas {
        &mut self.atlas
    }

    #[must_use]
    pub fn registry(&self) -> &SceneRegistry {
        &self.registry
    }

    /// Adds a listener for scene events.
    pub fn subscribe(&mut self, listener: Box<dyn SceneListener>) {
        self.controller.subscribe(listener);
    }

    /// Every object the user can add, builtin ones first.
    pub fn available_objects(&self) -> Vec<(String, GeometryKind)> {
        available_objects(&self.config.probe_geometries, &self.config.preferences.user_mesh_dir)
    }

    fn geometry(&mut self, kind: &GeometryKind) -> Result<Arc<ProbeGeometry>> {
        if let Some((_, geometry)) = self.geometries.iter().find(|(k, _)| k == kind) {
            return Ok(Arc::clone(geometry));
        }
        let geometry = Arc::new(GeometryBuilder::from_config(&self.config).build(kind)?);
        self.geometries.push((kind.clone(), Arc::clone(&geometry)));
        Ok(geometry)
    }

    /// Adds an object at the home pose and makes it active.
    ///
    /// A geometry that cannot be built leaves the scene unchanged.
    pub fn add_object(&mut self, kind: &GeometryKind) -> Result<ObjectId> {
        let geometry = self.geometry(kind)?;
        let id = self.registry.add(kind.clone(), geometry);
        self.controller.emit(SceneEvent::ObjectAdded(id));
        self.controller.emit(SceneEvent::ActiveChanged(Some(id)));
        Ok(id)
    }

    /// Adds an object placed by `spec`. Nothing is added if the placement fails.
    pub fn add_object_at(&mut self, kind: &GeometryKind, spec: &InsertionSpec) -> Result<ObjectId> {
        let mut pose = ProbePose::home_pose();
        pose.apply_spec(spec, self.atlas.surface())?;
        let id = self.add_object(kind)?;
        if let Some(object) = self.registry.get_mut(id) {
            *object.pose_mut() = pose;
        }
        Ok(id)
    }

    /// Places an existing object. On error its pose is unchanged.
    pub fn set_insertion(&mut self, id: ObjectId, spec: &InsertionSpec) -> Result<()> {
        let surface = self.atlas.surface();
        let object = self
            .registry
            .get_mut(id)
            .ok_or(ProbescopeError::ObjectNotFound(id.0))?;
        object.pose_mut().apply_spec(spec, surface)?;
        self.controller.emit(SceneEvent::PoseChanged(id));
        Ok(())
    }

    /// Removes an object. Removing the active one leaves nothing active.
    pub fn remove_object(&mut self, id: ObjectId) -> Result<()> {
        let was_active = self.registry.active_id() == Some(id);
        self.registry
            .remove(id)
            .ok_or(ProbescopeError::ObjectNotFound(id.0))?;
        self.crossings.remove(&id);
        self.controller.emit(SceneEvent::ObjectRemoved(id));
        if was_active {
            self.controller.emit(SceneEvent::ActiveChanged(None));
        }
        Ok(())
    }

    pub fn handle_key(&mut self, event: &KeyEvent) -> Vec<SceneEvent> {
        let events = self.controller.handle_key(&mut self.registry, event);
        for event in &events {
            if let SceneEvent::ObjectRemoved(id) = event {
                self.crossings.remove(id);
            }
        }
        events
    }

    pub fn handle_pick(&mut self, event: &PickEvent) -> Vec<SceneEvent> {
        self.controller.handle_pick(&mut self.registry, event)
    }

    /// Meshes and uniforms for every object.
    pub fn render_items(&self) -> Vec<RenderItem<'_>> {
        self.registry.iter().flat_map(|o| o.render_items()).collect()
    }

    /// Recomputes crossings for objects that moved since the last refresh.
    /// Returns the ids that were recomputed.
    pub fn refresh(&mut self) -> Vec<ObjectId> {
        let intersector = RegionIntersector::new(&self.atlas);
        let mut updated = Vec::new();
        for id in self.tracker.take_dirty() {
            if let Some(object) = self.registry.get(id) {
                self.crossings.insert(id, intersector.shank_crossings(object));
                updated.push(id);
            }
        }
        updated
    }

    /// Crossings as of the last [`Scene::refresh`].
    #[must_use]
    pub fn crossings(&self, id: ObjectId) -> Option<&[ShankCrossings]> {
        self.crossings.get(&id).map(Vec::as_slice)
    }

    pub fn probe_report(&self, id: ObjectId) -> Result<ProbeReport> {
        self.registry
            .get(id)
            .map(|o| o.probe_report(Some(self.atlas.surface())))
            .ok_or(ProbescopeError::ObjectNotFound(id.0))
    }

    /// Saves the scene to `path`.
    pub fn save(&self, path: &Path) -> Result<()> {
        ExperimentRecord::capture(&self.atlas, &self.registry).save(path)
    }

    /// Replaces the scene's objects with those saved in `path`.
    ///
    /// Objects that cannot be rebuilt are skipped and listed in the report.
    pub fn load(&mut self, path: &Path) -> Result<LoadReport> {
        let record = ExperimentRecord::load(path)?;
        if record.atlas.name != self.atlas.name() {
            log::warn!(
                "experiment was planned on '{}', loading into '{}'",
                record.atlas.name,
                self.atlas.name()
            );
        }
        for id in self.registry.ids().collect::<Vec<_>>() {
            self.remove_object(id)?;
        }
        let report = record.restore(&GeometryBuilder::from_config(&self.config), &mut self.registry);
        record.restore_regions(&mut self.atlas);
        for &id in &report.loaded {
            self.controller.emit(SceneEvent::ObjectAdded(id));
        }
        self.controller
            .emit(SceneEvent::ActiveChanged(self.registry.active_id()));
        Ok(report)
    }

    /// Writes a per-probe summary with fresh region crossings.
    pub fn export(&self, path: &Path) -> Result<()> {
        ExportRecord::capture(&self.atlas, &self.registry).write(path)
    }
}
