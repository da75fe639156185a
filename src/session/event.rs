//! Events published on a session's bus.

use crate::protocol::packet::{Direction, Packet, PacketKind};

/// One decoded message travelling through the relay.
#[derive(Debug, Clone)]
pub struct PacketEvent {
    packet: Packet,
    direction: Direction,
    consumable: bool,
    consumed: bool,
}

impl PacketEvent {
    pub fn new(packet: Packet, direction: Direction) -> Self {
        Self {
            packet,
            direction,
            consumable: true,
            consumed: false,
        }
    }

    /// Where the message is headed.
    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn kind(&self) -> PacketKind {
        self.packet.kind()
    }

    pub fn packet(&self) -> &Packet {
        &self.packet
    }

    /// Receivers may rewrite the message before it is forwarded.
    pub fn packet_mut(&mut self) -> &mut Packet {
        &mut self.packet
    }

    pub fn into_packet(self) -> Packet {
        self.packet
    }

    /// Stops delivery to later receivers and suppresses forwarding.
    pub fn consume(&mut self) {
        if self.consumable {
            self.consumed = true;
        }
    }

    pub fn is_consumed(&self) -> bool {
        self.consumed
    }

    pub fn is_consumable(&self) -> bool {
        self.consumable
    }
}

/// A half-session went away.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisconnectEvent {
    pub reason: String,
    /// The half that disconnected.
    pub side: Direction,
}

#[derive(Debug, Clone)]
pub enum Event {
    Packet(PacketEvent),
    Disconnect(DisconnectEvent),
}

impl Event {
    pub fn packet(packet: Packet, direction: Direction) -> Self {
        Event::Packet(PacketEvent::new(packet, direction))
    }

    /// Only packet events can be consumed.
    pub fn is_consumed(&self) -> bool {
        match self {
            Event::Packet(event) => event.is_consumed(),
            Event::Disconnect(_) => false,
        }
    }

    pub fn as_packet(&self) -> Option<&PacketEvent> {
        match self {
            Event::Packet(event) => Some(event),
            _ => None,
        }
    }

    pub fn as_packet_mut(&mut self) -> Option<&mut PacketEvent> {
        match self {
            Event::Packet(event) => Some(event),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::packet::CommandRequest;

    #[test]
    fn test_consume_marks_packet_event() {
        let mut event = Event::packet(
            Packet::CommandRequest(CommandRequest {
                command: "/echo hi".into(),
            }),
            Direction::Outbound,
        );
        assert!(!event.is_consumed());
        if let Some(packet) = event.as_packet_mut() {
            packet.consume();
        }
        assert!(event.is_consumed());
    }

    #[test]
    fn test_disconnect_is_never_consumed() {
        let event = Event::Disconnect(DisconnectEvent {
            reason: "timeout".into(),
            side: Direction::Inbound,
        });
        assert!(!event.is_consumed());
        assert!(event.as_packet().is_none());
    }
}
