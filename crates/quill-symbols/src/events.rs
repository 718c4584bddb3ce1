//! In-process symbol event channel.
//!
//! The store publishes every create/amend/remove of symbols, aliases and
//! locations here. Alias reference counts are maintained by an ordinary
//! subscriber (`AliasCounter`), so external consumers see exactly the same
//! stream the bookkeeping does.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use crate::types::{SymbolId, SymbolLocation, UsageKind};

/// Something that happened to the symbol table
#[derive(Debug, Clone, PartialEq)]
pub enum SymbolEvent {
    SymbolCreated {
        symbol: SymbolId,
        category: String,
        identifier: String,
    },
    SymbolAmended {
        symbol: SymbolId,
    },
    SymbolRemoved {
        symbol: SymbolId,
        category: String,
        identifier: String,
    },
    AliasCreated {
        alias: SymbolId,
        target: SymbolId,
    },
    AliasRemoved {
        alias: SymbolId,
        target: SymbolId,
    },
    LocationCreated {
        symbol: SymbolId,
        kind: UsageKind,
        location: SymbolLocation,
    },
    LocationRemoved {
        symbol: SymbolId,
        kind: UsageKind,
        location: SymbolLocation,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    SymbolCreated,
    SymbolAmended,
    SymbolRemoved,
    AliasCreated,
    AliasRemoved,
    LocationCreated,
    LocationRemoved,
}

impl SymbolEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            SymbolEvent::SymbolCreated { .. } => EventKind::SymbolCreated,
            SymbolEvent::SymbolAmended { .. } => EventKind::SymbolAmended,
            SymbolEvent::SymbolRemoved { .. } => EventKind::SymbolRemoved,
            SymbolEvent::AliasCreated { .. } => EventKind::AliasCreated,
            SymbolEvent::AliasRemoved { .. } => EventKind::AliasRemoved,
            SymbolEvent::LocationCreated { .. } => EventKind::LocationCreated,
            SymbolEvent::LocationRemoved { .. } => EventKind::LocationRemoved,
        }
    }
}

/// Opaque handle returned by `EventBus::on`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

struct Listener {
    id: SubscriptionId,
    kind: EventKind,
    callback: Box<dyn FnMut(&SymbolEvent)>,
}

/// Observer list keyed by event kind
#[derive(Default)]
pub struct EventBus {
    next_id: u64,
    listeners: Vec<Listener>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `callback` for every event of `kind`
    pub fn on<F>(&mut self, kind: EventKind, callback: F) -> SubscriptionId
    where
        F: FnMut(&SymbolEvent) + 'static,
    {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        self.listeners.push(Listener {
            id,
            kind,
            callback: Box::new(callback),
        });
        id
    }

    /// Remove a subscription. Returns false if it was already gone.
    pub fn off(&mut self, id: SubscriptionId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|l| l.id != id);
        self.listeners.len() != before
    }

    /// Deliver `event` to its listeners in registration order
    pub fn emit(&mut self, event: &SymbolEvent) {
        let kind = event.kind();
        for listener in self.listeners.iter_mut().filter(|l| l.kind == kind) {
            (listener.callback)(event);
        }
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

// ============================================================================
// Alias counting
// ============================================================================

/// Live alias count per target, fed by alias and removal events.
///
/// A target that was never aliased has no entry (`None`), which is distinct
/// from a target whose aliases have all gone (`Some(0)`).
#[derive(Debug, Clone, Default)]
pub struct AliasCounter {
    counts: Rc<RefCell<HashMap<SymbolId, u32>>>,
}

impl AliasCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe this counter to `bus`
    pub fn attach(&self, bus: &mut EventBus) -> [SubscriptionId; 3] {
        let counts = Rc::clone(&self.counts);
        let created = bus.on(EventKind::AliasCreated, move |event| {
            if let SymbolEvent::AliasCreated { target, .. } = event {
                *counts.borrow_mut().entry(*target).or_insert(0) += 1;
            }
        });

        let counts = Rc::clone(&self.counts);
        let removed = bus.on(EventKind::AliasRemoved, move |event| {
            if let SymbolEvent::AliasRemoved { target, .. } = event {
                if let Some(count) = counts.borrow_mut().get_mut(target) {
                    *count = count.saturating_sub(1);
                }
            }
        });

        // A removed target takes its count with it
        let counts = Rc::clone(&self.counts);
        let dropped = bus.on(EventKind::SymbolRemoved, move |event| {
            if let SymbolEvent::SymbolRemoved { symbol, .. } = event {
                counts.borrow_mut().remove(symbol);
            }
        });

        [created, removed, dropped]
    }

    pub fn get(&self, target: SymbolId) -> Option<u32> {
        self.counts.borrow().get(&target).copied()
    }

    /// True if at least one live alias points at `target`
    pub fn is_aliased(&self, target: SymbolId) -> bool {
        self.get(target).unwrap_or(0) > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(index: u32) -> SymbolId {
        SymbolId::from_raw_parts(index, 0)
    }

    #[test]
    fn test_listeners_filtered_by_kind() {
        let mut bus = EventBus::new();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        bus.on(EventKind::SymbolAmended, move |event| sink.borrow_mut().push(event.clone()));

        bus.emit(&SymbolEvent::SymbolAmended { symbol: id(1) });
        bus.emit(&SymbolEvent::AliasCreated { alias: id(1), target: id(2) });

        assert_eq!(seen.borrow().len(), 1);
        assert_eq!(seen.borrow()[0].kind(), EventKind::SymbolAmended);
    }

    #[test]
    fn test_off_unsubscribes() {
        let mut bus = EventBus::new();
        let hits = Rc::new(RefCell::new(0));
        let sink = Rc::clone(&hits);
        let sub = bus.on(EventKind::SymbolAmended, move |_| *sink.borrow_mut() += 1);

        bus.emit(&SymbolEvent::SymbolAmended { symbol: id(1) });
        assert!(bus.off(sub));
        assert!(!bus.off(sub));
        bus.emit(&SymbolEvent::SymbolAmended { symbol: id(1) });

        assert_eq!(*hits.borrow(), 1);
        assert_eq!(bus.listener_count(), 0);
    }

    #[test]
    fn test_alias_counter_tracks_events() {
        let mut bus = EventBus::new();
        let counter = AliasCounter::new();
        counter.attach(&mut bus);

        let target = id(7);
        assert_eq!(counter.get(target), None);

        bus.emit(&SymbolEvent::AliasCreated { alias: id(1), target });
        bus.emit(&SymbolEvent::AliasCreated { alias: id(2), target });
        assert_eq!(counter.get(target), Some(2));

        bus.emit(&SymbolEvent::AliasRemoved { alias: id(1), target });
        bus.emit(&SymbolEvent::AliasRemoved { alias: id(2), target });
        assert_eq!(counter.get(target), Some(0));
        assert!(!counter.is_aliased(target));

        bus.emit(&SymbolEvent::SymbolRemoved {
            symbol: target,
            category: "type".into(),
            identifier: "T".into(),
        });
        assert_eq!(counter.get(target), None);
    }
}
