//! Half-sessions and the per-direction leg state around them.

use crate::auth::SessionKey;
use crate::error::{poisoned, RelayError, Result};
use crate::protocol::codec::Codec;
use crate::protocol::packet::{CompressionAlgorithm, Direction, Packet};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, OnceLock};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

/// One transport leg of the relay, implemented by the transport layer.
pub trait HalfSession: Send + Sync {
    /// Buffered send, flushed with the transport's next batch.
    fn send(&self, packet: Packet);

    /// Send without waiting for the next batch.
    fn send_immediately(&self, packet: Packet);

    fn set_codec(&self, codec: Arc<Codec>);

    fn set_compression(&self, algorithm: CompressionAlgorithm);

    fn enable_encryption(&self, key: &SessionKey);

    fn disconnect(&self, reason: &str);
}

#[derive(Debug)]
pub(crate) struct QueuedPacket {
    pub packet: Packet,
    pub immediate: bool,
}

enum Slot {
    Pending(VecDeque<QueuedPacket>),
    Installed(Arc<dyn HalfSession>),
}

/// Handle to the concurrent-mode worker draining one leg's arrivals.
pub(crate) struct Worker {
    pub arrivals: mpsc::UnboundedSender<Packet>,
    pub cancel: CancellationToken,
}

pub(crate) struct Leg {
    direction: Direction,
    slot: Mutex<Slot>,
    closed: AtomicBool,
    pub worker: OnceLock<Worker>,
}

fn deliver(half: &dyn HalfSession, packet: Packet, immediate: bool) {
    if immediate {
        half.send_immediately(packet);
    } else {
        half.send(packet);
    }
}

impl Leg {
    pub fn new(direction: Direction) -> Self {
        Self {
            direction,
            slot: Mutex::new(Slot::Pending(VecDeque::new())),
            closed: AtomicBool::new(false),
            worker: OnceLock::new(),
        }
    }

    /// Sends through the installed half, or queues until one installs.
    pub fn send(&self, packet: Packet, immediate: bool) {
        if self.is_closed() {
            trace!(direction = ?self.direction, kind = ?packet.kind(), "Dropped send on closed leg");
            return;
        }
        let half = {
            let mut slot = match self.slot.lock() {
                Ok(slot) => slot,
                Err(poisoned) => poisoned.into_inner(),
            };
            match &mut *slot {
                Slot::Installed(half) => Arc::clone(half),
                Slot::Pending(queue) => {
                    queue.push_back(QueuedPacket { packet, immediate });
                    return;
                }
            }
        };
        deliver(half.as_ref(), packet, immediate);
    }

    /// Installs `half` and drains the queue into it in FIFO order.
    pub fn install(&self, half: Arc<dyn HalfSession>) -> Result<()> {
        let mut slot = self.slot.lock().map_err(poisoned)?;
        if self.is_closed() {
            return Err(RelayError::Runtime(format!(
                "{:?} leg is already torn down",
                self.direction
            )));
        }
        let queued = match &mut *slot {
            Slot::Installed(_) => return Err(RelayError::AlreadyInstalled(self.direction)),
            Slot::Pending(queue) => std::mem::take(queue),
        };

        let drained = queued.len();
        for entry in queued {
            deliver(half.as_ref(), entry.packet, entry.immediate);
        }
        *slot = Slot::Installed(half);
        debug!(direction = ?self.direction, drained, "Half-session installed");
        Ok(())
    }

    pub fn installed(&self) -> Option<Arc<dyn HalfSession>> {
        let slot = match self.slot.lock() {
            Ok(slot) => slot,
            Err(poisoned) => poisoned.into_inner(),
        };
        match &*slot {
            Slot::Installed(half) => Some(Arc::clone(half)),
            Slot::Pending(_) => None,
        }
    }

    pub fn pending(&self) -> usize {
        match self.slot.lock() {
            Ok(slot) => match &*slot {
                Slot::Pending(queue) => queue.len(),
                Slot::Installed(_) => 0,
            },
            Err(_) => 0,
        }
    }

    /// Drops queued packets without closing the leg.
    pub fn release(&self) {
        let mut slot = match self.slot.lock() {
            Ok(slot) => slot,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Slot::Pending(queue) = &mut *slot {
            queue.clear();
        }
    }

    /// Marks the leg torn down. Returns false if it already was.
    pub fn close(&self) -> bool {
        !self.closed.swap(true, Ordering::AcqRel)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}
