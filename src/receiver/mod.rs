//! # Receivers
//!
//! Event bus subscribers that give the relay its behavior.
//!
//! ## Components
//! - **Handshake**: codec negotiation, login forging, encryption setup
//! - **Definition**: keeps the definition registries in step with the server
//! - **Transfer**: keeps clients attached to the relay across transfers
//! - **Command**: relay-side slash commands (`/transfer`, `/echo`)
//! - **Packs**: resource pack capture

pub mod command;
pub mod definition;
pub mod handshake;
pub mod packs;
pub mod transfer;

pub use command::{command, echo_command, mismatch, transfer_command};
pub use definition::DefinitionReceiver;
pub use handshake::HandshakeReceiver;
pub use transfer::redirect_through_relay;

use crate::pack::PackDownloader;
use crate::session::{Registration, Session};
use std::sync::Arc;

/// Registers the standard receiver set on a fresh session, handshake first.
/// Pack capture needs a downloader and `packs.enabled` in the relay config.
pub fn attach_defaults(
    session: &Session,
    downloader: Option<Arc<PackDownloader>>,
) -> Vec<Registration> {
    let mut registrations = vec![
        HandshakeReceiver::attach(session),
        DefinitionReceiver::attach(session),
        transfer::attach(session),
    ];
    let (advertise, intercept) = transfer_command(session);
    registrations.extend([advertise, intercept]);
    let (advertise, intercept) = echo_command(session);
    registrations.extend([advertise, intercept]);
    if let Some(downloader) = downloader.filter(|_| session.relay().config().packs.enabled) {
        registrations.push(packs::attach(session, downloader));
    }
    registrations
}
