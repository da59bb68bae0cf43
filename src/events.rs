//! Named surface events and a synchronous dispatcher.

use std::collections::HashMap;
use std::panic::{AssertUnwindSafe, catch_unwind};

use uuid::Uuid;

use crate::recording::Stroke;

/// Event names as seen by subscribers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EventKind {
    StrokeStart,
    StrokeEnd,
    StrokeRecorded,
    Dirty,
    Clean,
    FillStart,
    FillEnd,
}

impl EventKind {
    pub fn name(&self) -> &'static str {
        match self {
            EventKind::StrokeStart => "strokestart",
            EventKind::StrokeEnd => "strokeend",
            EventKind::StrokeRecorded => "strokerecorded",
            EventKind::Dirty => "dirty",
            EventKind::Clean => "clean",
            EventKind::FillStart => "fillstart",
            EventKind::FillEnd => "fillend",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::all().iter().copied().find(|k| k.name() == name)
    }

    pub fn all() -> &'static [EventKind] {
        &[
            EventKind::StrokeStart,
            EventKind::StrokeEnd,
            EventKind::StrokeRecorded,
            EventKind::Dirty,
            EventKind::Clean,
            EventKind::FillStart,
            EventKind::FillEnd,
        ]
    }
}

/// An emitted event with its payload.
#[derive(Clone, Debug, PartialEq)]
pub enum Event {
    StrokeStart { x: f64, y: f64 },
    StrokeEnd { x: f64, y: f64 },
    StrokeRecorded { stroke: Stroke },
    Dirty,
    Clean,
    FillStart { x: f64, y: f64 },
    FillEnd,
}

impl Event {
    pub fn kind(&self) -> EventKind {
        match self {
            Event::StrokeStart { .. } => EventKind::StrokeStart,
            Event::StrokeEnd { .. } => EventKind::StrokeEnd,
            Event::StrokeRecorded { .. } => EventKind::StrokeRecorded,
            Event::Dirty => EventKind::Dirty,
            Event::Clean => EventKind::Clean,
            Event::FillStart { .. } => EventKind::FillStart,
            Event::FillEnd => EventKind::FillEnd,
        }
    }
}

/// Handle returned by [`EventTarget::add_listener`], used to unsubscribe.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ListenerId(Uuid);

pub type Handler = Box<dyn FnMut(&Event)>;

/// Listener registry keyed by event kind.
///
/// Handlers run synchronously in registration order.  A handler that panics
/// is logged and skipped; the remaining handlers still run.
#[derive(Default)]
pub struct EventTarget {
    listeners: HashMap<EventKind, Vec<(ListenerId, Handler)>>,
}

impl EventTarget {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_listener(&mut self, kind: EventKind, handler: impl FnMut(&Event) + 'static) -> ListenerId {
        let id = ListenerId(Uuid::new_v4());
        self.listeners
            .entry(kind)
            .or_default()
            .push((id, Box::new(handler)));
        id
    }

    /// Subscribe by event name (`"fillend"`, ...). `None` for unknown names.
    pub fn add_listener_by_name(
        &mut self,
        name: &str,
        handler: impl FnMut(&Event) + 'static,
    ) -> Option<ListenerId> {
        let kind = EventKind::from_name(name)?;
        Some(self.add_listener(kind, handler))
    }

    /// Returns `true` if the listener was registered.
    pub fn remove_listener(&mut self, kind: EventKind, id: ListenerId) -> bool {
        let Some(handlers) = self.listeners.get_mut(&kind) else {
            return false;
        };
        let before = handlers.len();
        handlers.retain(|(hid, _)| *hid != id);
        handlers.len() != before
    }

    pub fn listener_count(&self, kind: EventKind) -> usize {
        self.listeners.get(&kind).map_or(0, Vec::len)
    }

    pub fn dispatch(&mut self, event: &Event) {
        let Some(handlers) = self.listeners.get_mut(&event.kind()) else {
            return;
        };
        for (_, handler) in handlers.iter_mut() {
            if catch_unwind(AssertUnwindSafe(|| handler(event))).is_err() {
                crate::log_err!("'{}' handler panicked", event.kind().name());
            }
        }
    }
}
