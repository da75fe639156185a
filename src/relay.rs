//! Relay context shared by every session it accepts.
//!
//! Holds the default codec new sessions start from, the definition tables,
//! the optional online account, the re-pointable upstream address and the
//! discovery advertisement. Transports plug in through [`Connector`].

use crate::auth::Account;
use crate::config::RelayConfig;
use crate::error::{RelayError, Result};
use crate::protocol::codec::{Codec, CodecTable};
use crate::protocol::definitions::Definitions;
use crate::protocol::packet::{Direction, Packet, RequestNetworkSettings};
use crate::session::Session;
use std::fmt;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::{Arc, RwLock};
use tokio::runtime::Handle;
use tracing::info;

/// Upstream server address. Kept as host text so names resolve at connect time.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RemoteAddress {
    pub host: String,
    pub port: u16,
}

impl RemoteAddress {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl fmt::Display for RemoteAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Opens the outbound transport for a session.
///
/// Implementations connect asynchronously and call
/// [`Session::install_outbound`] once the leg is up. Anything sent before
/// that stays queued on the session.
pub trait Connector: Send + Sync {
    fn connect(&self, session: Arc<Session>, remote: &RemoteAddress, codec: Arc<Codec>) -> Result<()>;
}

/// Discovery response fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Advertisement {
    pub edition: String,
    pub motd: String,
    pub protocol_version: i32,
    pub version: String,
    pub player_count: u32,
    pub max_player_count: u32,
    pub guid: i64,
    pub sub_motd: String,
    pub game_type: String,
    pub nintendo_limited: bool,
    pub ipv4_port: u16,
    pub ipv6_port: u16,
}

impl Advertisement {
    pub fn from_config(config: &RelayConfig, codec: &Codec, port: u16) -> Self {
        Self {
            edition: String::from("MCPE"),
            motd: config.server.motd.clone(),
            protocol_version: codec.protocol_version(),
            version: codec.minecraft_version().to_string(),
            player_count: 0,
            max_player_count: config.server.max_players,
            guid: rand::random::<i64>(),
            sub_motd: config.server.sub_motd.clone(),
            game_type: config.server.game_type.clone(),
            nintendo_limited: false,
            ipv4_port: port,
            ipv6_port: port,
        }
    }

    /// Semicolon-separated discovery string.
    pub fn to_motd(&self) -> String {
        format!(
            "{};{};{};{};{};{};{};{};{};{};{};{};",
            self.edition,
            self.motd,
            self.protocol_version,
            self.version,
            self.player_count,
            self.max_player_count,
            self.guid,
            self.sub_motd,
            self.game_type,
            if self.nintendo_limited { 0 } else { 1 },
            self.ipv4_port,
            self.ipv6_port,
        )
    }
}

pub struct Relay {
    config: RelayConfig,
    default_codec: Arc<Codec>,
    definitions: Arc<Definitions>,
    account: Option<Account>,
    local_address: SocketAddr,
    remote: RwLock<RemoteAddress>,
    advertisement: Advertisement,
    connector: Arc<dyn Connector>,
    runtime: Option<Handle>,
}

impl Relay {
    pub fn builder(config: RelayConfig) -> RelayBuilder {
        RelayBuilder {
            config,
            connector: None,
            account: None,
            definitions: None,
            runtime: None,
        }
    }

    pub fn config(&self) -> &RelayConfig {
        &self.config
    }

    /// Codec a session starts with and falls back to for unknown versions.
    pub fn default_codec(&self) -> Arc<Codec> {
        Arc::clone(&self.default_codec)
    }

    pub fn definitions(&self) -> &Arc<Definitions> {
        &self.definitions
    }

    pub fn account(&self) -> Option<&Account> {
        self.account.as_ref()
    }

    pub fn local_address(&self) -> SocketAddr {
        self.local_address
    }

    pub fn remote_address(&self) -> RemoteAddress {
        match self.remote.read() {
            Ok(remote) => remote.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn set_remote_address(&self, remote: RemoteAddress) {
        info!(remote = %remote, "Remote address changed");
        match self.remote.write() {
            Ok(mut current) => *current = remote,
            Err(poisoned) => *poisoned.into_inner() = remote,
        }
    }

    /// Where clients are sent to reconnect to this relay.
    pub fn redirect_address(&self) -> RemoteAddress {
        let host = match &self.config.server.public_host {
            Some(host) => host.clone(),
            None if self.local_address.ip().is_unspecified() => {
                IpAddr::V4(Ipv4Addr::LOCALHOST).to_string()
            }
            None => self.local_address.ip().to_string(),
        };
        RemoteAddress::new(host, self.local_address.port())
    }

    pub fn advertisement(&self) -> &Advertisement {
        &self.advertisement
    }

    pub fn runtime(&self) -> Option<&Handle> {
        self.runtime.as_ref()
    }

    /// A fresh session for a newly accepted client.
    pub fn new_session(self: &Arc<Self>) -> Arc<Session> {
        Session::new(Arc::clone(self))
    }

    /// Opens the outbound leg for `session` with the codec it negotiated and
    /// queues the opening network settings request on it.
    pub fn connect(&self, session: &Arc<Session>) -> Result<()> {
        let remote = self.remote_address();
        let codec = session.codec();
        info!(remote = %remote, protocol = codec.protocol_version(), "Connecting upstream");
        self.connector
            .connect(Arc::clone(session), &remote, Arc::clone(&codec))?;
        session.send_immediately(
            Direction::Outbound,
            Packet::RequestNetworkSettings(RequestNetworkSettings {
                protocol_version: codec.protocol_version(),
            }),
        );
        Ok(())
    }
}

pub struct RelayBuilder {
    config: RelayConfig,
    connector: Option<Arc<dyn Connector>>,
    account: Option<Account>,
    definitions: Option<Arc<Definitions>>,
    runtime: Option<Handle>,
}

impl RelayBuilder {
    pub fn connector(mut self, connector: Arc<dyn Connector>) -> Self {
        self.connector = Some(connector);
        self
    }

    /// Enables online mode.
    pub fn account(mut self, account: Account) -> Self {
        self.account = Some(account);
        self
    }

    pub fn definitions(mut self, definitions: Arc<Definitions>) -> Self {
        self.definitions = Some(definitions);
        self
    }

    /// Runtime for concurrent-mode workers. Defaults to the ambient one.
    pub fn runtime(mut self, runtime: Handle) -> Self {
        self.runtime = Some(runtime);
        self
    }

    pub fn build(self) -> Result<Arc<Relay>> {
        let local_address = self.config.server.socket_addr()?;
        let connector = self
            .connector
            .ok_or_else(|| RelayError::ConfigError("A connector is required".to_string()))?;
        let codec = CodecTable::builtin()
            .default_codec()
            .ok_or(RelayError::UnknownCodec(
                crate::protocol::codec::DEFAULT_PROTOCOL_VERSION,
            ))?;
        let advertisement =
            Advertisement::from_config(&self.config, &codec, local_address.port());
        let remote = RemoteAddress::new(self.config.remote.host.clone(), self.config.remote.port);

        Ok(Arc::new(Relay {
            config: self.config,
            default_codec: codec,
            definitions: self.definitions.unwrap_or_default(),
            account: self.account,
            local_address,
            remote: RwLock::new(remote),
            advertisement,
            connector,
            runtime: self.runtime.or_else(|| Handle::try_current().ok()),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NoopConnector;

    impl Connector for NoopConnector {
        fn connect(&self, _: Arc<Session>, _: &RemoteAddress, _: Arc<Codec>) -> Result<()> {
            Ok(())
        }
    }

    fn relay(config: RelayConfig) -> Arc<Relay> {
        Relay::builder(config)
            .connector(Arc::new(NoopConnector))
            .build()
            .expect("relay builds")
    }

    #[test]
    fn test_motd_layout() {
        let advertisement = Advertisement {
            edition: "MCPE".into(),
            motd: "Relay".into(),
            protocol_version: 827,
            version: "1.21.100".into(),
            player_count: 1,
            max_player_count: 20,
            guid: 42,
            sub_motd: "Sub".into(),
            game_type: "Survival".into(),
            nintendo_limited: false,
            ipv4_port: 19132,
            ipv6_port: 19133,
        };
        assert_eq!(
            advertisement.to_motd(),
            "MCPE;Relay;827;1.21.100;1;20;42;Sub;Survival;1;19132;19133;"
        );
    }

    #[test]
    fn test_redirect_falls_back_to_loopback() {
        let relay = relay(RelayConfig::default());
        assert_eq!(relay.redirect_address(), RemoteAddress::new("127.0.0.1", 19132));

        let relay = relay_with_host();
        assert_eq!(relay.redirect_address(), RemoteAddress::new("relay.lan", 19132));
    }

    fn relay_with_host() -> Arc<Relay> {
        relay(RelayConfig::default_with_overrides(|c| {
            c.server.public_host = Some("relay.lan".into());
        }))
    }

    #[test]
    fn test_defaults() {
        let relay = relay(RelayConfig::default());
        assert_eq!(relay.default_codec().protocol_version(), 827);
        assert_eq!(relay.remote_address(), RemoteAddress::new("127.0.0.1", 19132));
        assert!(relay.account().is_none());
        assert_eq!(relay.advertisement().version, "1.21.100");

        relay.set_remote_address(RemoteAddress::new("play.example.net", 19133));
        assert_eq!(relay.remote_address().to_string(), "play.example.net:19133");
    }

    #[test]
    fn test_connector_is_required() {
        assert!(matches!(
            Relay::builder(RelayConfig::default()).build(),
            Err(RelayError::ConfigError(_))
        ));
    }
}
