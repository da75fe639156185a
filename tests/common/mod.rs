//! Transport doubles shared by the integration tests.

#![allow(dead_code, clippy::unwrap_used, clippy::expect_used)]

use bedrock_relay::auth::SessionKey;
use bedrock_relay::config::RelayConfig;
use bedrock_relay::protocol::codec::Codec;
use bedrock_relay::protocol::packet::{CompressionAlgorithm, Packet};
use bedrock_relay::relay::{Connector, Relay, RemoteAddress};
use bedrock_relay::session::{HalfSession, Session};
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, PartialEq)]
pub struct Sent {
    pub packet: Packet,
    pub immediate: bool,
}

/// Half-session that records everything the relay asks of it.
#[derive(Default)]
pub struct RecordingHalf {
    pub sent: Mutex<Vec<Sent>>,
    pub codec_versions: Mutex<Vec<i32>>,
    pub compression: Mutex<Option<CompressionAlgorithm>>,
    pub encryption: Mutex<Option<[u8; 32]>>,
    pub disconnected: Mutex<Option<String>>,
}

impl RecordingHalf {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn sent(&self) -> Vec<Sent> {
        self.sent.lock().unwrap().clone()
    }

    pub fn packets(&self) -> Vec<Packet> {
        self.sent().into_iter().map(|s| s.packet).collect()
    }

    pub fn take(&self) -> Vec<Packet> {
        std::mem::take(&mut *self.sent.lock().unwrap())
            .into_iter()
            .map(|s| s.packet)
            .collect()
    }

    pub fn compression(&self) -> Option<CompressionAlgorithm> {
        *self.compression.lock().unwrap()
    }

    pub fn encryption(&self) -> Option<[u8; 32]> {
        *self.encryption.lock().unwrap()
    }

    pub fn disconnected(&self) -> Option<String> {
        self.disconnected.lock().unwrap().clone()
    }

    pub fn last_codec_version(&self) -> Option<i32> {
        self.codec_versions.lock().unwrap().last().copied()
    }
}

impl HalfSession for RecordingHalf {
    fn send(&self, packet: Packet) {
        self.sent.lock().unwrap().push(Sent {
            packet,
            immediate: false,
        });
    }

    fn send_immediately(&self, packet: Packet) {
        self.sent.lock().unwrap().push(Sent {
            packet,
            immediate: true,
        });
    }

    fn set_codec(&self, codec: Arc<Codec>) {
        self.codec_versions
            .lock()
            .unwrap()
            .push(codec.protocol_version());
    }

    fn set_compression(&self, algorithm: CompressionAlgorithm) {
        *self.compression.lock().unwrap() = Some(algorithm);
    }

    fn enable_encryption(&self, key: &SessionKey) {
        *self.encryption.lock().unwrap() = Some(*key.as_bytes());
    }

    fn disconnect(&self, reason: &str) {
        *self.disconnected.lock().unwrap() = Some(reason.to_string());
    }
}

/// Connector that only records connection requests. Tests install the
/// outbound half themselves.
#[derive(Default)]
pub struct RecordingConnector {
    pub requests: Mutex<Vec<(RemoteAddress, i32)>>,
}

impl RecordingConnector {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn requests(&self) -> Vec<(RemoteAddress, i32)> {
        self.requests.lock().unwrap().clone()
    }
}

impl Connector for RecordingConnector {
    fn connect(
        &self,
        _session: Arc<Session>,
        remote: &RemoteAddress,
        codec: Arc<Codec>,
    ) -> bedrock_relay::Result<()> {
        self.requests
            .lock()
            .unwrap()
            .push((remote.clone(), codec.protocol_version()));
        Ok(())
    }
}

pub fn relay_with(config: RelayConfig, connector: Arc<RecordingConnector>) -> Arc<Relay> {
    Relay::builder(config).connector(connector).build().unwrap()
}

pub fn relay() -> (Arc<Relay>, Arc<RecordingConnector>) {
    let connector = RecordingConnector::new();
    (relay_with(RelayConfig::default(), Arc::clone(&connector)), connector)
}

/// A session with both legs installed.
pub fn connected_session() -> (Arc<Session>, Arc<RecordingHalf>, Arc<RecordingHalf>) {
    let (relay, _) = relay();
    let session = relay.new_session();
    let inbound = RecordingHalf::new();
    let outbound = RecordingHalf::new();
    session.install_inbound(inbound.clone()).unwrap();
    session.install_outbound(outbound.clone()).unwrap();
    (session, inbound, outbound)
}
