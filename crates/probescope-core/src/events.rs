//! Scene notifications.
//!
//! Every applied pose delta and every registry change is announced as a
//! [`SceneEvent`]. Subscribers (the renderer, crossing bookkeeping, UI status
//! lines) decide on their own what to do with it.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Stable identifier of a scene object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObjectId(pub u64);

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Something that changed in the scene.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SceneEvent {
    /// The object's pose was updated.
    PoseChanged(ObjectId),
    /// The active object changed; `None` when nothing is active.
    ActiveChanged(Option<ObjectId>),
    /// A new object entered the scene.
    ObjectAdded(ObjectId),
    /// An object was deleted.
    ObjectRemoved(ObjectId),
}

impl SceneEvent {
    /// Returns the object the event is about, if any.
    #[must_use]
    pub fn object(&self) -> Option<ObjectId> {
        match *self {
            Self::PoseChanged(id) | Self::ObjectAdded(id) | Self::ObjectRemoved(id) => Some(id),
            Self::ActiveChanged(id) => id,
        }
    }
}

/// Receives scene events.
pub trait SceneListener {
    /// Called once per event, in emission order.
    fn on_event(&mut self, event: &SceneEvent);
}

impl<F> SceneListener for F
where
    F: FnMut(&SceneEvent),
{
    fn on_event(&mut self, event: &SceneEvent) {
        self(event);
    }
}

/// Fans events out to subscribed listeners.
#[derive(Default)]
pub struct EventBus {
    listeners: Vec<Box<dyn SceneListener>>,
}

impl EventBus {
    /// Creates a bus with no listeners.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a listener.
    pub fn subscribe(&mut self, listener: Box<dyn SceneListener>) {
        self.listeners.push(listener);
    }

    /// Delivers `event` to every listener.
    pub fn emit(&mut self, event: SceneEvent) {
        log::trace!("scene event {event:?}");
        for listener in &mut self.listeners {
            listener.on_event(&event);
        }
    }

    /// Delivers a batch of events in order.
    pub fn emit_all(&mut self, events: impl IntoIterator<Item = SceneEvent>) {
        for event in events {
            self.emit(event);
        }
    }

    /// Returns the number of listeners.
    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    /// Returns true if nobody is listening.
    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;

    #[test]
    fn test_bus_delivers_in_order() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        let mut bus = EventBus::new();
        bus.subscribe(Box::new(move |e: &SceneEvent| sink.borrow_mut().push(*e)));
        bus.emit_all([
            SceneEvent::ObjectAdded(ObjectId(1)),
            SceneEvent::ActiveChanged(Some(ObjectId(1))),
            SceneEvent::PoseChanged(ObjectId(1)),
        ]);
        assert_eq!(
            *seen.borrow(),
            vec![
                SceneEvent::ObjectAdded(ObjectId(1)),
                SceneEvent::ActiveChanged(Some(ObjectId(1))),
                SceneEvent::PoseChanged(ObjectId(1)),
            ]
        );
    }

    #[test]
    fn test_event_object() {
        assert_eq!(SceneEvent::ActiveChanged(None).object(), None);
        assert_eq!(
            SceneEvent::ObjectRemoved(ObjectId(4)).object(),
            Some(ObjectId(4))
        );
    }
}
