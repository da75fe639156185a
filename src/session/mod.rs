//! # Session Core
//!
//! The event bus joining a client-facing and a server-facing half-session.
//!
//! ## Components
//! - **Event**: packet and lifecycle events
//! - **Bus**: ordered receivers over copy-on-write snapshots
//! - **Half**: the transport leg trait and per-leg queueing
//! - **Core**: the [`Session`] itself

pub mod bus;
pub mod core;
pub mod event;
pub mod half;

pub use self::core::Session;
pub use bus::{EventBus, EventReceiver, Interest, Registration};
pub use event::{DisconnectEvent, Event, PacketEvent};
pub use half::HalfSession;
