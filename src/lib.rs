//! # Bedrock Relay
//!
//! Core of an intercepting relay for the Bedrock game protocol. A relay sits
//! between a client and a server, sees every message in both directions and
//! can rewrite, inject or suppress any of them.
//!
//! The transport (reliable UDP) and the byte-level packet serializers are
//! supplied by the embedding application through [`HalfSession`] and
//! [`Connector`]. This crate owns everything in between:
//!
//! - [`session`]: the per-connection event bus and packet queues
//! - [`receiver`]: login forging, codec negotiation, commands, pack capture
//! - [`auth`]: ES384 token forging, chain validation, key agreement
//! - [`protocol`]: typed packets, the codec table, definition registries
//! - [`pack`]: resource pack reassembly and decryption
//!
//! ## Example
//! ```rust,no_run
//! use bedrock_relay::config::RelayConfig;
//! use bedrock_relay::receiver::attach_defaults;
//! use bedrock_relay::relay::{Connector, Relay, RemoteAddress};
//! use bedrock_relay::protocol::codec::Codec;
//! use bedrock_relay::session::Session;
//! use std::sync::Arc;
//!
//! struct Raknet;
//!
//! impl Connector for Raknet {
//!     fn connect(
//!         &self,
//!         _session: Arc<Session>,
//!         _remote: &RemoteAddress,
//!         _codec: Arc<Codec>,
//!     ) -> bedrock_relay::Result<()> {
//!         // Open the server connection, then call `session.install_outbound`.
//!         Ok(())
//!     }
//! }
//!
//! # fn main() -> bedrock_relay::Result<()> {
//! let relay = Relay::builder(RelayConfig::default())
//!     .connector(Arc::new(Raknet))
//!     .build()?;
//!
//! // For every accepted client connection:
//! let session = relay.new_session();
//! let _receivers = attach_defaults(&session, None);
//! # Ok(())
//! # }
//! ```

pub mod auth;
pub mod config;
pub mod error;
pub mod pack;
pub mod protocol;
pub mod receiver;
pub mod relay;
pub mod session;
pub mod utils;

pub use config::RelayConfig;
pub use error::{RelayError, Result};
pub use protocol::packet::{Direction, Packet, PacketKind};
pub use relay::{Connector, Relay, RemoteAddress};
pub use session::{Event, EventReceiver, HalfSession, PacketEvent, Registration, Session};
