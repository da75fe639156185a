//! Ordered event bus with copy-on-write receiver snapshots.
//!
//! Receivers are invoked in registration order. A publish iterates the
//! snapshot taken when it started, so receivers can unregister themselves
//! or each other mid-dispatch and the change applies from the next publish.
//! Packet events are routed through a by-kind index so a publish only walks
//! the receivers interested in that kind. Lifecycle events go to every
//! receiver whatever its interest.

use crate::protocol::packet::PacketKind;
use crate::session::event::Event;
use crate::session::Session;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock, Weak};
use tracing::trace;

/// Something observing a session's events.
pub trait EventReceiver: Send + Sync {
    fn on_event(&self, session: &Session, event: &mut Event, registration: &Registration);
}

impl<F> EventReceiver for F
where
    F: Fn(&Session, &mut Event, &Registration) + Send + Sync,
{
    fn on_event(&self, session: &Session, event: &mut Event, registration: &Registration) {
        self(session, event, registration)
    }
}

/// Which events a receiver wants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Interest {
    /// Every packet and every lifecycle event.
    AllEvents,
    /// Packet events of the listed kinds, plus every lifecycle event.
    Packets(Vec<PacketKind>),
}

impl Interest {
    pub fn packets(kinds: &[PacketKind]) -> Self {
        Interest::Packets(kinds.to_vec())
    }

    fn accepts(&self, kind: PacketKind) -> bool {
        match self {
            Interest::AllEvents => true,
            Interest::Packets(kinds) => kinds.contains(&kind),
        }
    }
}

/// Handle to one registered receiver.
#[derive(Clone)]
pub struct Registration {
    id: u64,
    bus: Weak<BusInner>,
}

impl Registration {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Removes the receiver. Takes effect from the next publish.
    pub fn unregister(&self) {
        if let Some(bus) = self.bus.upgrade() {
            bus.remove(self.id);
        }
    }
}

impl std::fmt::Debug for Registration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registration").field("id", &self.id).finish()
    }
}

struct Entry {
    interest: Interest,
    receiver: Arc<dyn EventReceiver>,
    registration: Registration,
}

/// Immutable dispatch table rebuilt on every change.
#[derive(Default)]
struct ReceiverTable {
    ordered: Vec<Arc<Entry>>,
    by_kind: HashMap<PacketKind, Vec<Arc<Entry>>>,
    wildcard: Vec<Arc<Entry>>,
}

impl ReceiverTable {
    fn build(ordered: Vec<Arc<Entry>>) -> Self {
        let mut by_kind: HashMap<PacketKind, Vec<Arc<Entry>>> = HashMap::new();
        for entry in &ordered {
            if let Interest::Packets(kinds) = &entry.interest {
                for kind in kinds {
                    by_kind.entry(*kind).or_default();
                }
            }
        }
        for (kind, targets) in by_kind.iter_mut() {
            targets.extend(
                ordered
                    .iter()
                    .filter(|entry| entry.interest.accepts(*kind))
                    .cloned(),
            );
        }
        let wildcard = ordered
            .iter()
            .filter(|entry| entry.interest == Interest::AllEvents)
            .cloned()
            .collect();

        Self {
            ordered,
            by_kind,
            wildcard,
        }
    }

    fn targets(&self, event: &Event) -> &[Arc<Entry>] {
        match event {
            Event::Packet(packet) => self
                .by_kind
                .get(&packet.kind())
                .map(Vec::as_slice)
                .unwrap_or(&self.wildcard),
            _ => &self.ordered,
        }
    }
}

struct BusInner {
    table: RwLock<Arc<ReceiverTable>>,
    next_id: AtomicU64,
}

impl BusInner {
    fn snapshot(&self) -> Arc<ReceiverTable> {
        match self.table.read() {
            Ok(guard) => Arc::clone(&guard),
            Err(poisoned) => Arc::clone(&poisoned.into_inner()),
        }
    }

    fn update<F>(&self, change: F)
    where
        F: FnOnce(&mut Vec<Arc<Entry>>),
    {
        let mut guard = match self.table.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let mut ordered = guard.ordered.clone();
        change(&mut ordered);
        *guard = Arc::new(ReceiverTable::build(ordered));
    }

    fn remove(&self, id: u64) {
        self.update(|ordered| ordered.retain(|entry| entry.registration.id != id));
        trace!(id, "Receiver unregistered");
    }
}

pub struct EventBus {
    inner: Arc<BusInner>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(BusInner {
                table: RwLock::new(Arc::new(ReceiverTable::default())),
                next_id: AtomicU64::new(1),
            }),
        }
    }

    pub fn register<R>(&self, interest: Interest, receiver: R) -> Registration
    where
        R: EventReceiver + 'static,
    {
        let registration = Registration {
            id: self.inner.next_id.fetch_add(1, Ordering::Relaxed),
            bus: Arc::downgrade(&self.inner),
        };
        let entry = Arc::new(Entry {
            interest,
            receiver: Arc::new(receiver),
            registration: registration.clone(),
        });
        self.inner.update(|ordered| ordered.push(entry));
        trace!(id = registration.id, "Receiver registered");
        registration
    }

    /// Delivers `event` in registration order. Returns whether a receiver
    /// consumed it, which also ends delivery.
    pub fn publish(&self, session: &Session, event: &mut Event) -> bool {
        let table = self.inner.snapshot();
        for entry in table.targets(event) {
            entry
                .receiver
                .on_event(session, event, &entry.registration);
            if event.is_consumed() {
                return true;
            }
        }
        false
    }

    pub fn len(&self) -> usize {
        self.inner.snapshot().ordered.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
