//! Keyboard-driven movement of the active object.
//!
//! The controller has no state of its own beyond its keybind tables and
//! listeners: every key press is resolved, applied to the registry's active
//! object and announced before the call returns.

use std::cell::RefCell;
use std::collections::BTreeSet;
use std::rc::Rc;

use glam::DVec3;
use probescope_core::config::Config;
use probescope_core::events::{EventBus, ObjectId, SceneEvent, SceneListener};
use probescope_core::input::{KeyEvent, PickEvent};
use probescope_core::keybinds::{
    MovementBinding, MovementIntent, MovementKeybinds, StaticAction, StaticKeybinds,
};
use probescope_core::transform::{EulerAngles, Pose};

use crate::pose::ProbePose;
use crate::registry::SceneRegistry;

/// The change one movement intent makes to a pose.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PoseDelta {
    /// Offset in stereotaxic axes, independent of orientation.
    World(DVec3),
    /// Offset along the probe's own axes.
    Local(DVec3),
    /// Added to the angles, pivoting about the tip.
    Angles(EulerAngles),
}

impl PoseDelta {
    /// The delta for `intent` with magnitude `step`.
    #[must_use]
    pub fn for_intent(intent: MovementIntent, step: f64) -> Self {
        use MovementIntent::{
            Advance, Anterior, Dorsal, Left, Posterior, Retract, Right, RotateLeft, RotateRight,
            SpinLeft, SpinRight, TiltDown, TiltUp, Ventral,
        };
        match intent {
            Left => Self::World(DVec3::new(-step, 0.0, 0.0)),
            Right => Self::World(DVec3::new(step, 0.0, 0.0)),
            Dorsal => Self::World(DVec3::new(0.0, 0.0, step)),
            Ventral => Self::World(DVec3::new(0.0, 0.0, -step)),
            Anterior => Self::World(DVec3::new(0.0, step, 0.0)),
            Posterior => Self::World(DVec3::new(0.0, -step, 0.0)),
            // +Y runs up the shank, so advancing drives toward -Y.
            Advance => Self::Local(DVec3::new(0.0, -step, 0.0)),
            Retract => Self::Local(DVec3::new(0.0, step, 0.0)),
            TiltUp => Self::Angles(EulerAngles::new(step, 0.0, 0.0)),
            TiltDown => Self::Angles(EulerAngles::new(-step, 0.0, 0.0)),
            SpinLeft => Self::Angles(EulerAngles::new(0.0, step, 0.0)),
            SpinRight => Self::Angles(EulerAngles::new(0.0, -step, 0.0)),
            RotateLeft => Self::Angles(EulerAngles::new(0.0, 0.0, step)),
            RotateRight => Self::Angles(EulerAngles::new(0.0, 0.0, -step)),
        }
    }

    /// Applies the delta to `pose`.
    pub fn apply(self, pose: &mut ProbePose) {
        match self {
            Self::World(offset) => pose.translate_world(offset),
            Self::Local(offset) => pose.apply_local(&Pose::from_translation(offset)),
            Self::Angles(delta) => pose.rotate(delta),
        }
    }
}

/// Turns key and pick events into registry changes and scene events.
#[derive(Debug)]
pub struct MovementController {
    movement: MovementKeybinds,
    statics: StaticKeybinds,
    bus: EventBus,
}

impl Default for MovementController {
    fn default() -> Self {
        Self::new(MovementKeybinds::default(), StaticKeybinds::default())
    }
}

impl MovementController {
    pub fn new(movement: MovementKeybinds, statics: StaticKeybinds) -> Self {
        Self {
            movement,
            statics,
            bus: EventBus::new(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.movement_keybinds.clone(), config.static_keybinds.clone())
    }

    /// Replaces both keybind tables, keeping the listeners.
    pub fn set_keybinds(&mut self, movement: MovementKeybinds, statics: StaticKeybinds) {
        self.movement = movement;
        self.statics = statics;
    }

    #[must_use]
    pub fn movement_keybinds(&self) -> &MovementKeybinds {
        &self.movement
    }

    #[must_use]
    pub fn static_keybinds(&self) -> &StaticKeybinds {
        &self.statics
    }

    pub fn subscribe(&mut self, listener: Box<dyn SceneListener>) {
        self.bus.subscribe(listener);
    }

    /// Sends `event` to every listener.
    pub fn emit(&mut self, event: SceneEvent) {
        self.bus.emit(event);
    }

    fn emit_all(&mut self, events: Vec<SceneEvent>) -> Vec<SceneEvent> {
        self.bus.emit_all(events.iter().copied());
        events
    }

    /// Handles one key press and returns the events it caused.
    ///
    /// Static bindings are tried first. Unmapped keys, and movement keys with no
    /// active object, change nothing and return no events.
    pub fn handle_key(&mut self, registry: &mut SceneRegistry, event: &KeyEvent) -> Vec<SceneEvent> {
        if let Some(action) = self.statics.resolve(event) {
            log::debug!("key {:?} -> {action:?}", event.key);
            let events = Self::run_static(registry, action);
            return self.emit_all(events);
        }
        let Some(binding) = self.movement.resolve(event) else {
            log::trace!("key {:?} is not bound", event.key);
            return Vec::new();
        };
        log::debug!("key {:?} -> {:?} by {}", event.key, binding.intent, binding.step);
        match Self::apply_binding(registry, binding) {
            Some(moved) => self.emit_all(vec![SceneEvent::PoseChanged(moved)]),
            None => Vec::new(),
        }
    }

    /// Makes the picked object active. Unknown ids are ignored.
    pub fn handle_pick(&mut self, registry: &mut SceneRegistry, pick: &PickEvent) -> Vec<SceneEvent> {
        if registry.active_id() == Some(pick.object) || registry.select(pick.object).is_err() {
            return Vec::new();
        }
        self.emit_all(vec![SceneEvent::ActiveChanged(Some(pick.object))])
    }

    /// Moves the active object. Returns its id, or `None` if nothing is active.
    pub fn apply_binding(registry: &mut SceneRegistry, binding: MovementBinding) -> Option<ObjectId> {
        let active = registry.active_mut()?;
        PoseDelta::for_intent(binding.intent, binding.step).apply(active.pose_mut());
        Some(active.id())
    }

    fn run_static(registry: &mut SceneRegistry, action: StaticAction) -> Vec<SceneEvent> {
        match action {
            StaticAction::NextObject => registry
                .select_next()
                .map(|id| vec![SceneEvent::ActiveChanged(Some(id))])
                .unwrap_or_default(),
            StaticAction::PreviousObject => registry
                .select_previous()
                .map(|id| vec![SceneEvent::ActiveChanged(Some(id))])
                .unwrap_or_default(),
            StaticAction::DeleteObject => registry
                .remove_active()
                .map(|removed| {
                    vec![
                        SceneEvent::ObjectRemoved(removed.id()),
                        SceneEvent::ActiveChanged(None),
                    ]
                })
                .unwrap_or_default(),
            StaticAction::Home => registry
                .active_mut()
                .map(|active| {
                    active.pose_mut().home();
                    vec![SceneEvent::PoseChanged(active.id())]
                })
                .unwrap_or_default(),
        }
    }
}

/// Remembers which objects need their region crossings recomputed.
///
/// Clones share the same set, so one clone can be subscribed to a controller
/// while another is polled.
#[derive(Debug, Clone, Default)]
pub struct CrossingTracker {
    dirty: Rc<RefCell<BTreeSet<ObjectId>>>,
}

impl CrossingTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mark(&self, id: ObjectId) {
        self.dirty.borrow_mut().insert(id);
    }

    #[must_use]
    pub fn is_dirty(&self, id: ObjectId) -> bool {
        self.dirty.borrow().contains(&id)
    }

    /// Returns the pending ids and clears them.
    pub fn take_dirty(&self) -> BTreeSet<ObjectId> {
        std::mem::take(&mut *self.dirty.borrow_mut())
    }
}

impl SceneListener for CrossingTracker {
    fn on_event(&mut self, event: &SceneEvent) {
        match *event {
            SceneEvent::PoseChanged(id) | SceneEvent::ObjectAdded(id) => self.mark(id),
            SceneEvent::ObjectRemoved(id) => {
                self.dirty.borrow_mut().remove(&id);
            }
            SceneEvent::ActiveChanged(_) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use probescope_core::input::Modifiers;
    use probescope_core::options::ProbeGeometryTable;
    use probescope_core::transform::is_orthonormal;
    use proptest::prelude::*;

    use super::*;
    use crate::geometry::{GeometryKind, ProbeGeometry, ShankArray};

    fn scene(n: usize) -> (SceneRegistry, MovementController, CrossingTracker) {
        let table = ProbeGeometryTable::default();
        let geometry = Arc::new(ProbeGeometry::ShankArray(ShankArray::from_spec(
            "NP1",
            table.get("NP1").unwrap(),
        )));
        let mut registry = SceneRegistry::new();
        for _ in 0..n {
            registry.add(GeometryKind::builtin("NP1"), Arc::clone(&geometry));
        }
        let mut controller = MovementController::default();
        let tracker = CrossingTracker::new();
        controller.subscribe(Box::new(tracker.clone()));
        (registry, controller, tracker)
    }

    fn tip(registry: &SceneRegistry) -> DVec3 {
        registry.active().unwrap().pose().tip()
    }

    #[test]
    fn test_world_translation() {
        let (mut registry, mut controller, tracker) = scene(1);
        let id = registry.active_id().unwrap();
        let events = controller.handle_key(&mut registry, &KeyEvent::plain("a"));
        assert_eq!(events, vec![SceneEvent::PoseChanged(id)]);
        assert!(tip(&registry).abs_diff_eq(DVec3::new(-100.0, 0.0, 0.0), 1e-9));
        assert!(tracker.is_dirty(id));
        assert_eq!(tracker.take_dirty().len(), 1);
        assert!(!tracker.is_dirty(id));
    }

    #[test]
    fn test_fine_step_is_exact() {
        let (mut registry, mut controller, _) = scene(1);
        registry
            .active_mut()
            .unwrap()
            .pose_mut()
            .set_from_tip_angles(DVec3::new(0.0, 0.0, -1000.0), EulerAngles::new(115.0, 0.0, -10.0))
            .unwrap();
        let before = tip(&registry);
        let axis = registry.active().unwrap().pose().shank_axis();

        let fine_advance = KeyEvent::new("c", Modifiers { ctrl: true, shift: true, alt: false });
        controller.handle_key(&mut registry, &fine_advance);
        let moved = tip(&registry) - before;
        assert!((moved.length() - 10.0).abs() < 1e-9);
        assert!(moved.abs_diff_eq(-axis * 10.0, 1e-9));

        let before = tip(&registry);
        controller.handle_key(&mut registry, &KeyEvent::new("d", Modifiers::CTRL));
        assert!((tip(&registry) - before).abs_diff_eq(DVec3::new(10.0, 0.0, 0.0), 1e-9));
    }

    #[test]
    fn test_rotation_keys() {
        let (mut registry, mut controller, _) = scene(1);
        controller.handle_key(&mut registry, &KeyEvent::new("s", Modifiers::SHIFT));
        controller.handle_key(&mut registry, &KeyEvent::new("a", Modifiers::SHIFT));
        controller.handle_key(&mut registry, &KeyEvent::plain("e"));
        let angles = registry.active().unwrap().pose().angles();
        assert_eq!(angles, EulerAngles::new(95.0, -5.0, 5.0));
        assert!(tip(&registry).abs_diff_eq(DVec3::ZERO, 1e-9));
    }

    #[test]
    fn test_unmapped_key_is_noop() {
        let (mut registry, mut controller, tracker) = scene(1);
        let before = *registry.active().unwrap().pose();
        assert!(controller.handle_key(&mut registry, &KeyEvent::plain("z")).is_empty());
        assert_eq!(*registry.active().unwrap().pose(), before);
        assert!(tracker.take_dirty().is_empty());
    }

    #[test]
    fn test_delete_then_move_is_noop() {
        let (mut registry, mut controller, tracker) = scene(2);
        let id = registry.active_id().unwrap();
        let events = controller.handle_key(&mut registry, &KeyEvent::plain("Delete"));
        assert_eq!(
            events,
            vec![SceneEvent::ObjectRemoved(id), SceneEvent::ActiveChanged(None)]
        );
        assert_eq!(registry.active_id(), None);
        let remaining = registry.iter().next().unwrap();
        let before = *remaining.pose();
        let remaining_id = remaining.id();
        assert!(controller.handle_key(&mut registry, &KeyEvent::plain("w")).is_empty());
        assert_eq!(*registry.get(remaining_id).unwrap().pose(), before);
        assert!(tracker.take_dirty().is_empty());
    }

    #[test]
    fn test_home_and_cycle() {
        let (mut registry, mut controller, _) = scene(2);
        let ids: Vec<ObjectId> = registry.ids().collect();
        controller.handle_key(&mut registry, &KeyEvent::plain("f"));
        controller.handle_key(&mut registry, &KeyEvent::plain("h"));
        assert_eq!(*registry.active().unwrap().pose(), ProbePose::home_pose());

        let events = controller.handle_key(&mut registry, &KeyEvent::plain("n"));
        assert_eq!(events, vec![SceneEvent::ActiveChanged(Some(ids[0]))]);
        let events = controller.handle_pick(&mut registry, &PickEvent { object: ids[1] });
        assert_eq!(events, vec![SceneEvent::ActiveChanged(Some(ids[1]))]);
        assert!(controller
            .handle_pick(&mut registry, &PickEvent { object: ObjectId(99) })
            .is_empty());
    }

    fn key_strategy() -> impl Strategy<Value = KeyEvent> {
        let keys = prop::sample::select(vec!["a", "d", "f", "c", "w", "s", "q", "e"]);
        (keys, any::<bool>(), any::<bool>()).prop_map(|(key, shift, ctrl)| {
            KeyEvent::new(key, Modifiers { ctrl, shift, alt: false })
        })
    }

    proptest! {
        #[test]
        fn prop_rotation_stays_orthonormal(keys in prop::collection::vec(key_strategy(), 1..200)) {
            let (mut registry, mut controller, _) = scene(1);
            for key in &keys {
                controller.handle_key(&mut registry, key);
            }
            let pose = registry.active().unwrap().pose();
            let m = pose.pose().rotation_matrix();
            prop_assert!(is_orthonormal(&m, 1e-9));
            prop_assert!((m.determinant() - 1.0).abs() < 1e-9);
            prop_assert!(pose.tip().is_finite());
        }
    }
}
