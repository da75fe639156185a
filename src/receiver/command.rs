//! In-band slash commands handled by the relay itself.
//!
//! A command is two receivers: one advertises it in the server's command
//! list so the client autocompletes it, the other intercepts matching
//! command requests before they reach the server.

use crate::config::DEFAULT_PORT;
use crate::error::{constants, RelayError, Result};
use crate::protocol::packet::{CommandData, Direction, Packet, PacketKind, Text};
use crate::receiver::transfer::redirect_through_relay;
use crate::relay::RemoteAddress;
use crate::session::{PacketEvent, Registration, Session};
use std::sync::Arc;
use tracing::debug;

/// Error for an argument count the command does not accept.
pub fn mismatch() -> RelayError {
    RelayError::Command(constants::ERR_MISMATCHED_ARGUMENTS.to_string())
}

/// Registers `/name`. `usages` lists the accepted argument shapes, one
/// overload each. Handler errors are reported back to the player.
pub fn command<F>(
    session: &Session,
    name: &str,
    description: &str,
    usages: &[&[&str]],
    handler: F,
) -> (Registration, Registration)
where
    F: Fn(&Session, &[&str]) -> Result<()> + Send + Sync + 'static,
{
    let data = CommandData {
        name: name.to_string(),
        description: description.to_string(),
        aliases: Vec::new(),
        overloads: usages
            .iter()
            .map(|usage| usage.iter().map(|part| part.to_string()).collect())
            .collect(),
    };
    let advertise = session.on_packets(
        &[PacketKind::AvailableCommands],
        move |_: &Session, event: &mut PacketEvent, _: &Registration| {
            if let Packet::AvailableCommands(available) = event.packet_mut() {
                available.commands.push(data.clone());
            }
        },
    );

    let trigger = format!("/{name}");
    let helps: Arc<str> = usages
        .iter()
        .map(|usage| format!("/{name} {}", usage.join(" ")))
        .collect::<Vec<_>>()
        .join("\n")
        .into();
    let intercept = session.on_packets(
        &[PacketKind::CommandRequest],
        move |session: &Session, event: &mut PacketEvent, _: &Registration| {
            let Packet::CommandRequest(request) = event.packet() else {
                return;
            };
            let input = request.command.trim().to_string();
            let mut words = input.split_whitespace();
            if words.next() != Some(trigger.as_str()) {
                return;
            }
            event.consume();

            let args: Vec<&str> = words.collect();
            debug!(command = %trigger, ?args, "Relay command");
            if let Err(error) = handler(session, &args) {
                let reason = match error {
                    RelayError::Command(message) => message,
                    other => other.to_string(),
                };
                session.send(
                    Direction::Inbound,
                    Packet::Text(Text::raw(format!(
                        "§cParse or execute command failed: \nInput: {trigger} {}\nHelps: {helps}\nError: {reason}",
                        args.join(" ")
                    ))),
                );
            }
        },
    );

    (advertise, intercept)
}

/// `/transfer <ip> [port]`: moves the upstream while keeping the client on the relay.
pub fn transfer_command(session: &Session) -> (Registration, Registration) {
    command(
        session,
        "transfer",
        "Transfer to another server",
        &[&["[ip: string]", "[port: int]"], &["[ip: string]"]],
        |session, args| {
            let target = match args {
                [host] => RemoteAddress::new(*host, DEFAULT_PORT),
                [host, port] => {
                    let port = port.parse::<u16>().map_err(|e| {
                        RelayError::Command(format!("Invalid port '{port}': {e}"))
                    })?;
                    RemoteAddress::new(*host, port)
                }
                _ => return Err(mismatch()),
            };
            redirect_through_relay(session, target);
            Ok(())
        },
    )
}

/// `/echo <words...>`: prints the words back as raw chat.
pub fn echo_command(session: &Session) -> (Registration, Registration) {
    command(
        session,
        "echo",
        "Print a raw text in chat",
        &[&["[messages: any]..."]],
        |session, args| {
            if args.is_empty() {
                return Err(mismatch());
            }
            session.send(Direction::Inbound, Packet::Text(Text::raw(args.join(" "))));
            Ok(())
        },
    )
}
