//! Login, compression and encryption negotiation for both legs.
//!
//! Steps advance by message kind:
//! 1. client RequestNetworkSettings: negotiate the codec, answer with settings
//! 2. client Login: validate, re-sign as our own identity, open the outbound leg
//! 3. server NetworkSettings: enable compression, flush the held login
//! 4. server ServerToClientHandshake: key agreement, enable encryption, acknowledge

use crate::auth::jwt::{self, Claims};
use crate::auth::keys::parse_public_key;
use crate::auth::{
    derive_session_key, forge_appearance, forge_chained_online, forge_self_signed,
    online_appearance_overrides, trusted_authority_key, validate_chain, verify_client_data,
    ForgeError, IdentityKeyPair,
};
use crate::error::{constants, poisoned, RelayError, Result};
use crate::protocol::codec::{CodecTable, INVENTORY_SERIALIZER_VERSION};
use crate::protocol::packet::{
    ids, CompressionAlgorithm, Direction, Disconnect, Login, NetworkSettings, Packet, PacketKind,
    PlayStatus, RequestNetworkSettings, ServerToClientHandshake,
};
use crate::session::{Event, EventReceiver, Interest, Registration, Session};
use crate::utils::time::unix_seconds;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use std::sync::{Arc, Mutex};
use tracing::{debug, info, instrument, warn};

/// Compression the relay asks clients to use.
pub const CLIENT_COMPRESSION: CompressionAlgorithm = CompressionAlgorithm::Zlib;

#[derive(Default)]
struct HandshakeState {
    key_pair: Option<IdentityKeyPair>,
    pending_login: Option<Login>,
}

/// Per-session handshake state machine.
#[derive(Default)]
pub struct HandshakeReceiver {
    state: Mutex<HandshakeState>,
}

impl HandshakeReceiver {
    pub const KINDS: &'static [PacketKind] = &[
        PacketKind::RequestNetworkSettings,
        PacketKind::Login,
        PacketKind::NetworkSettings,
        PacketKind::ServerToClientHandshake,
    ];

    pub fn attach(session: &Session) -> Registration {
        session.register(Interest::packets(Self::KINDS), Self::default())
    }

    #[instrument(skip_all, fields(requested = request.protocol_version))]
    fn negotiate(&self, session: &Session, request: &RequestNetworkSettings) {
        let relay = session.relay();
        let settings = &relay.config().session;
        let fallback = relay.default_codec();
        let target = if settings.auto_codec {
            CodecTable::builtin().lookup(request.protocol_version, &fallback)
        } else {
            fallback
        };

        let helper = Arc::new(target.create_helper(Arc::clone(relay.definitions())));
        session.set_codec_helper(Arc::clone(&helper));

        if request.protocol_version != target.protocol_version() {
            let status = if request.protocol_version > target.protocol_version() {
                PlayStatus::LoginFailedServerOld
            } else {
                PlayStatus::LoginFailedClientOld
            };
            warn!(resolved = target.protocol_version(), ?status, "Protocol mismatch");
            session.send_immediately(Direction::Inbound, Packet::PlayStatus(status));
            return;
        }

        let mut builder = target.to_builder().helper(helper);
        if settings.patch_codec && request.protocol_version > INVENTORY_SERIALIZER_VERSION {
            builder = builder
                .update_serializer(ids::INVENTORY_CONTENT, INVENTORY_SERIALIZER_VERSION)
                .update_serializer(ids::INVENTORY_SLOT, INVENTORY_SERIALIZER_VERSION);
        }
        let codec = Arc::new(builder.build());
        session.set_codec(Arc::clone(&codec));
        if let Some(inbound) = session.inbound() {
            inbound.set_codec(codec);
        }

        session.send_immediately(
            Direction::Inbound,
            Packet::NetworkSettings(NetworkSettings::new(CLIENT_COMPRESSION, 0)),
        );
        if let Some(inbound) = session.inbound() {
            inbound.set_compression(CLIENT_COMPRESSION);
        }
    }

    #[instrument(skip_all, fields(entries = login.chain.len()))]
    fn login(&self, session: &Session, login: &Login) -> Result<()> {
        let chain = validate_chain(&login.chain, unix_seconds())?;
        let client_claims = verify_client_data(&login.client_jwt, &chain.identity_public_key)
            .map_err(|e| match e {
                ForgeError::SignatureInvalid => RelayError::HandshakeError(
                    constants::ERR_CLIENT_DATA_UNVERIFIED.to_string(),
                ),
                other => other.into(),
            })?;

        let relay = session.relay();
        let protocol_version = session.codec().protocol_version();

        let (key_pair, forged) = match relay.account() {
            None => {
                let key_pair = IdentityKeyPair::generate();
                let identity = forge_self_signed(&key_pair, &chain.extra_data)?;
                let mut forged_chain = login.chain.clone();
                forged_chain.pop();
                forged_chain.push(identity);
                let client_jwt = forge_appearance(&key_pair, &client_claims, &Claims::new())?;
                debug!(name = ?chain.extra_data.get("displayName"), "Offline identity forged");
                (
                    key_pair,
                    Login {
                        protocol_version,
                        chain: forged_chain,
                        client_jwt,
                    },
                )
            }
            Some(account) => {
                let key_pair = account.key_pair()?;
                let forged_chain = forge_chained_online(
                    &key_pair,
                    &account.mojang_jwt,
                    &account.identity_jwt,
                    &trusted_authority_key()?,
                )?;
                let overrides =
                    online_appearance_overrides(account, &relay.remote_address().to_string());
                let client_jwt = forge_appearance(&key_pair, &client_claims, &overrides)?;
                debug!(name = %account.display_name, "Online identity forged");
                (
                    key_pair,
                    Login {
                        protocol_version,
                        chain: forged_chain,
                        client_jwt,
                    },
                )
            }
        };

        {
            let mut state = self.state.lock().map_err(poisoned)?;
            state.key_pair = Some(key_pair);
            state.pending_login = Some(forged);
        }
        session.connect_outbound()
    }

    fn remote_settings(&self, session: &Session, settings: &NetworkSettings) -> Result<()> {
        if let Some(outbound) = session.outbound() {
            outbound.set_compression(settings.compression_algorithm);
        }
        info!(
            threshold = settings.compression_threshold,
            algorithm = ?settings.compression_algorithm,
            "Upstream compression set"
        );

        let login = self.state.lock().map_err(poisoned)?.pending_login.take();
        if let Some(login) = login {
            session.send_immediately(Direction::Outbound, Packet::Login(login));
        }
        Ok(())
    }

    #[instrument(skip_all)]
    fn remote_handshake(&self, session: &Session, handshake: &ServerToClientHandshake) -> Result<()> {
        let token = jwt::decode_unverified(&handshake.jwt)?;
        let server_key = parse_public_key(token.x5u().ok_or(ForgeError::MissingClaim("x5u"))?)?;
        let salt = token
            .claim_str("salt")
            .ok_or_else(|| RelayError::HandshakeError(constants::ERR_SALT_NOT_FOUND.to_string()))?;
        let salt = STANDARD.decode(salt).map_err(ForgeError::from)?;

        let key = {
            let state = self.state.lock().map_err(poisoned)?;
            let key_pair = state
                .key_pair
                .as_ref()
                .ok_or_else(|| RelayError::HandshakeError(constants::ERR_NO_KEY_PAIR.to_string()))?;
            derive_session_key(key_pair, &server_key, &salt)
        };

        if let Some(outbound) = session.outbound() {
            outbound.enable_encryption(&key);
        }
        info!("Upstream encryption enabled");
        session.send_immediately(Direction::Outbound, Packet::ClientToServerHandshake);
        Ok(())
    }

    fn fail(session: &Session, step: &str, error: &RelayError) {
        warn!(step, error = %error, "Handshake step failed");
        session.send(
            Direction::Inbound,
            Packet::Disconnect(Disconnect::with_message(error.to_string())),
        );
    }
}

impl EventReceiver for HandshakeReceiver {
    fn on_event(&self, session: &Session, event: &mut Event, _: &Registration) {
        let Event::Packet(event) = event else {
            return;
        };

        match (event.direction(), event.packet()) {
            (Direction::Outbound, Packet::RequestNetworkSettings(request)) => {
                let request = request.clone();
                event.consume();
                self.negotiate(session, &request);
            }
            (Direction::Outbound, Packet::Login(login)) => {
                let login = login.clone();
                event.consume();
                if let Err(error) = self.login(session, &login) {
                    Self::fail(session, "login", &error);
                }
            }
            (Direction::Inbound, Packet::NetworkSettings(settings)) => {
                let settings = settings.clone();
                event.consume();
                if let Err(error) = self.remote_settings(session, &settings) {
                    Self::fail(session, "network settings", &error);
                }
            }
            (Direction::Inbound, Packet::ServerToClientHandshake(handshake)) => {
                let handshake = handshake.clone();
                event.consume();
                if let Err(error) = self.remote_handshake(session, &handshake) {
                    Self::fail(session, "encryption", &error);
                }
            }
            _ => {}
        }
    }
}
