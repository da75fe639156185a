//! Keeps the client attached to the relay through server transfers.

use crate::protocol::packet::{Direction, Packet, PacketKind, Transfer};
use crate::relay::RemoteAddress;
use crate::session::{PacketEvent, Registration, Session};
use tracing::info;

/// Points the relay at `target` and sends the client back to the relay itself.
pub fn redirect_through_relay(session: &Session, target: RemoteAddress) {
    let relay = session.relay();
    info!(target = %target, "Redirecting through relay");
    relay.set_remote_address(target);

    let own = relay.redirect_address();
    session.send_immediately(
        Direction::Inbound,
        Packet::Transfer(Transfer {
            address: own.host,
            port: own.port,
        }),
    );
}

/// Consumes server-initiated transfers.
pub fn attach(session: &Session) -> Registration {
    session.on_packets(
        &[PacketKind::Transfer],
        |session: &Session, event: &mut PacketEvent, _: &Registration| {
            if event.direction() != Direction::Inbound {
                return;
            }
            let Packet::Transfer(transfer) = event.packet() else {
                return;
            };
            let target = RemoteAddress::new(transfer.address.clone(), transfer.port);
            event.consume();
            redirect_through_relay(session, target);
        },
    )
}
