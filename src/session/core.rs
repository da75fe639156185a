//! The relay session: two half-sessions, their queues, and the bus between them.

use crate::error::Result;
use crate::protocol::codec::{Codec, CodecHelper};
use crate::protocol::packet::{Direction, Packet, PacketKind};
use crate::relay::Relay;
use crate::session::bus::{EventBus, EventReceiver, Interest, Registration};
use crate::session::event::{DisconnectEvent, Event, PacketEvent};
use crate::session::half::{HalfSession, Leg, Worker};
use futures::StreamExt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock, Weak};
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

/// Pairs the client-facing and server-facing legs of one relayed connection.
///
/// Messages arriving on one leg are published as a [`PacketEvent`] headed for
/// the other leg and forwarded unchanged unless a receiver consumes them.
/// Each session negotiates its own codec, starting from the relay default.
pub struct Session {
    relay: Arc<Relay>,
    bus: EventBus,
    codec: RwLock<Arc<Codec>>,
    codec_helper: RwLock<Option<Arc<CodecHelper>>>,
    inbound: Leg,
    outbound: Leg,
    concurrent: AtomicBool,
    mode_chosen: AtomicBool,
    this: Weak<Session>,
}

impl Session {
    pub fn new(relay: Arc<Relay>) -> Arc<Self> {
        let codec = relay.default_codec();
        Arc::new_cyclic(|this| Self {
            relay,
            bus: EventBus::new(),
            codec: RwLock::new(codec),
            codec_helper: RwLock::new(None),
            inbound: Leg::new(Direction::Inbound),
            outbound: Leg::new(Direction::Outbound),
            concurrent: AtomicBool::new(false),
            mode_chosen: AtomicBool::new(false),
            this: this.clone(),
        })
    }

    pub fn relay(&self) -> &Arc<Relay> {
        &self.relay
    }

    /// The codec this session speaks.
    pub fn codec(&self) -> Arc<Codec> {
        match self.codec.read() {
            Ok(codec) => Arc::clone(&codec),
            Err(poisoned) => Arc::clone(&poisoned.into_inner()),
        }
    }

    pub fn set_codec(&self, codec: Arc<Codec>) {
        info!(
            protocol = codec.protocol_version(),
            version = codec.minecraft_version(),
            "Codec selected"
        );
        match self.codec.write() {
            Ok(mut current) => *current = codec,
            Err(poisoned) => *poisoned.into_inner() = codec,
        }
    }

    pub fn codec_helper(&self) -> Option<Arc<CodecHelper>> {
        match self.codec_helper.read() {
            Ok(helper) => helper.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn set_codec_helper(&self, helper: Arc<CodecHelper>) {
        match self.codec_helper.write() {
            Ok(mut current) => *current = Some(helper),
            Err(poisoned) => *poisoned.into_inner() = Some(helper),
        }
    }

    fn leg(&self, direction: Direction) -> &Leg {
        match direction {
            Direction::Inbound => &self.inbound,
            Direction::Outbound => &self.outbound,
        }
    }

    // ---- receivers ----

    pub fn register<R>(&self, interest: Interest, receiver: R) -> Registration
    where
        R: EventReceiver + 'static,
    {
        self.bus.register(interest, receiver)
    }

    /// Registers a closure for every event.
    pub fn on_event<F>(&self, handler: F) -> Registration
    where
        F: Fn(&Session, &mut Event, &Registration) + Send + Sync + 'static,
    {
        self.bus.register(Interest::AllEvents, handler)
    }

    /// Registers a closure for packet events of the given kinds.
    pub fn on_packets<F>(&self, kinds: &[PacketKind], handler: F) -> Registration
    where
        F: Fn(&Session, &mut PacketEvent, &Registration) + Send + Sync + 'static,
    {
        self.bus.register(
            Interest::packets(kinds),
            move |session: &Session, event: &mut Event, registration: &Registration| {
                if let Event::Packet(packet) = event {
                    handler(session, packet, registration);
                }
            },
        )
    }

    pub fn receiver_count(&self) -> usize {
        self.bus.len()
    }

    /// Publishes `event`; true if a receiver consumed it.
    pub fn publish(&self, event: &mut Event) -> bool {
        self.bus.publish(self, event)
    }

    // ---- sending ----

    /// Buffered send towards `direction`, queued until that leg installs.
    pub fn send(&self, direction: Direction, packet: Packet) {
        self.leg(direction).send(packet, false);
    }

    /// Immediate send towards `direction`, queued until that leg installs.
    pub fn send_immediately(&self, direction: Direction, packet: Packet) {
        self.leg(direction).send(packet, true);
    }

    pub fn inbound(&self) -> Option<Arc<dyn HalfSession>> {
        self.inbound.installed()
    }

    pub fn outbound(&self) -> Option<Arc<dyn HalfSession>> {
        self.outbound.installed()
    }

    pub fn half(&self, direction: Direction) -> Option<Arc<dyn HalfSession>> {
        self.leg(direction).installed()
    }

    /// Packets waiting for the `direction` leg to install.
    pub fn pending(&self, direction: Direction) -> usize {
        self.leg(direction).pending()
    }

    // ---- transport entry points ----

    pub fn install_inbound(&self, half: Arc<dyn HalfSession>) -> Result<()> {
        self.install(Direction::Inbound, half)
    }

    pub fn install_outbound(&self, half: Arc<dyn HalfSession>) -> Result<()> {
        self.install(Direction::Outbound, half)
    }

    fn install(&self, direction: Direction, half: Arc<dyn HalfSession>) -> Result<()> {
        half.set_codec(self.codec());
        self.leg(direction).install(half)
    }

    /// Opens the outbound leg through the relay's connector.
    pub fn connect_outbound(&self) -> Result<()> {
        let session = self.this.upgrade().ok_or_else(|| {
            crate::error::RelayError::Runtime("session dropped while connecting".to_string())
        })?;
        self.relay.connect(&session)
    }

    /// A message from the client.
    pub fn on_inbound_packet(&self, packet: Packet) {
        self.arrive(Direction::Inbound, packet);
    }

    /// A message from the server.
    pub fn on_outbound_packet(&self, packet: Packet) {
        self.arrive(Direction::Outbound, packet);
    }

    pub fn on_inbound_disconnect(&self, reason: &str) {
        self.leg_disconnected(Direction::Inbound, reason);
    }

    pub fn on_outbound_disconnect(&self, reason: &str) {
        self.leg_disconnected(Direction::Outbound, reason);
    }

    fn arrive(&self, leg: Direction, packet: Packet) {
        if self.concurrent.load(Ordering::Acquire) {
            if let Some(worker) = self.leg(leg).worker.get() {
                if let Err(rejected) = worker.arrivals.send(packet) {
                    trace!(leg = ?leg, kind = ?rejected.0.kind(), "Worker gone, arrival dropped");
                }
                return;
            }
        }
        self.relay_packet(leg, packet);
    }

    fn relay_packet(&self, leg: Direction, packet: Packet) {
        let heading = leg.opposite();
        let mut event = Event::packet(packet, heading);
        if self.publish(&mut event) {
            return;
        }
        if let Event::Packet(event) = event {
            self.send(heading, event.into_packet());
        }
    }

    fn leg_disconnected(&self, leg: Direction, reason: &str) {
        if !self.leg(leg).close() {
            return;
        }
        info!(leg = ?leg, reason, "Half-session disconnected");

        let mut event = Event::Disconnect(DisconnectEvent {
            reason: reason.to_string(),
            side: leg,
        });
        self.publish(&mut event);

        self.inbound.release();
        self.outbound.release();
        if let Some(worker) = self.leg(leg).worker.get() {
            worker.cancel.cancel();
        }

        let peer = self.leg(leg.opposite());
        match peer.installed() {
            Some(half) => half.disconnect(reason),
            None => {
                peer.close();
            }
        }
    }

    // ---- concurrency mode ----

    pub fn is_concurrent(&self) -> bool {
        self.concurrent.load(Ordering::Acquire)
    }

    /// Chooses between inline and per-direction worker processing. Only the
    /// first call has an effect.
    pub fn set_concurrent(&self, enabled: bool) {
        if self.mode_chosen.swap(true, Ordering::AcqRel) {
            debug!(enabled, "Concurrency mode already chosen, ignoring");
            return;
        }
        if !enabled {
            return;
        }
        let Some(runtime) = self.relay.runtime() else {
            warn!("{}", crate::error::constants::ERR_NO_RUNTIME);
            return;
        };

        for leg in [Direction::Inbound, Direction::Outbound] {
            let (tx, rx) = mpsc::unbounded_channel();
            let cancel = CancellationToken::new();
            if self.leg(leg).is_closed() {
                cancel.cancel();
            }
            runtime.spawn(run_worker(self.this.clone(), leg, rx, cancel.clone()));
            let _ = self.leg(leg).worker.set(Worker {
                arrivals: tx,
                cancel,
            });
        }
        self.concurrent.store(true, Ordering::Release);
        info!("Concurrent packet processing enabled");
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        for leg in [&self.inbound, &self.outbound] {
            if let Some(worker) = leg.worker.get() {
                worker.cancel.cancel();
            }
        }
    }
}

/// Single consumer per leg: arrivals are published in order, and
/// cancellation abandons whatever is still queued.
async fn run_worker(
    session: Weak<Session>,
    leg: Direction,
    arrivals: mpsc::UnboundedReceiver<Packet>,
    cancel: CancellationToken,
) {
    let arrivals = UnboundedReceiverStream::new(arrivals).take_until(cancel.cancelled_owned());
    tokio::pin!(arrivals);
    while let Some(packet) = arrivals.next().await {
        let Some(session) = session.upgrade() else {
            break;
        };
        session.relay_packet(leg, packet);
    }
    trace!(leg = ?leg, "Worker stopped");
}
