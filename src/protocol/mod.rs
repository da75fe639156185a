//! # Protocol Model
//!
//! Typed messages, the protocol version table and the runtime definition
//! registries a session negotiates.
//!
//! ## Components
//! - **Packet**: closed set of message kinds the relay inspects
//! - **Codec**: version → codec table, serializer overrides, codec helpers
//! - **Definitions**: item/block/camera registries with snapshot swaps
//! - **Palette**: block palette loading and network id hashing

pub mod codec;
pub mod definitions;
pub mod packet;
pub mod palette;

#[cfg(test)]
mod tests;
