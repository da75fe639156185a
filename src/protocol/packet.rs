//! Typed protocol messages seen by the relay core.
//!
//! The codec layer turns wire bytes into one of these variants. Only the
//! messages the relay inspects or produces are modelled; everything else
//! travels as [`RawPacket`] and is forwarded untouched.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Relay direction of a message: where it is headed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    /// Towards the game client, sent over the inbound half-session.
    Inbound,
    /// Towards the game server, sent over the outbound half-session.
    Outbound,
}

impl Direction {
    pub fn opposite(self) -> Self {
        match self {
            Direction::Inbound => Direction::Outbound,
            Direction::Outbound => Direction::Inbound,
        }
    }
}

/// Packet ids the codec patching refers to.
pub mod ids {
    pub const INVENTORY_CONTENT: u32 = 0x31;
    pub const INVENTORY_SLOT: u32 = 0x32;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CompressionAlgorithm {
    Zlib,
    Snappy,
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlayStatus {
    LoginSuccess,
    LoginFailedClientOld,
    LoginFailedServerOld,
    PlayerSpawn,
    LoginFailedInvalidTenant,
    LoginFailedEditionMismatch,
    LoginFailedServerFull,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestNetworkSettings {
    pub protocol_version: i32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NetworkSettings {
    pub compression_threshold: u16,
    pub compression_algorithm: CompressionAlgorithm,
    pub client_throttle_enabled: bool,
    pub client_throttle_threshold: u8,
    pub client_throttle_scalar: f32,
}

impl NetworkSettings {
    pub fn new(compression_algorithm: CompressionAlgorithm, compression_threshold: u16) -> Self {
        Self {
            compression_threshold,
            compression_algorithm,
            client_throttle_enabled: false,
            client_throttle_threshold: 0,
            client_throttle_scalar: 0.0,
        }
    }
}

/// Login request: a certificate chain plus the signed client data token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Login {
    pub protocol_version: i32,
    pub chain: Vec<String>,
    pub client_jwt: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Disconnect {
    pub kick_message: String,
    pub hide_disconnect_screen: bool,
}

impl Disconnect {
    pub fn with_message(message: impl Into<String>) -> Self {
        Self {
            kick_message: message.into(),
            hide_disconnect_screen: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerToClientHandshake {
    pub jwt: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextType {
    Raw,
    Chat,
    Translation,
    Popup,
    Tip,
    System,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Text {
    pub kind: TextType,
    pub needs_translation: bool,
    pub source_name: String,
    pub message: String,
    pub xuid: String,
}

impl Text {
    pub fn raw(message: impl Into<String>) -> Self {
        Self {
            kind: TextType::Raw,
            needs_translation: false,
            source_name: String::new(),
            message: message.into(),
            xuid: String::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandRequest {
    pub command: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandData {
    pub name: String,
    pub description: String,
    pub aliases: Vec<String>,
    pub overloads: Vec<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AvailableCommands {
    pub commands: Vec<CommandData>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transfer {
    pub address: String,
    pub port: u16,
}

/// Item entry as carried by StartGame and ItemComponent messages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemEntry {
    pub identifier: String,
    pub runtime_id: i32,
    pub component_based: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StartGame {
    pub item_definitions: Vec<ItemEntry>,
    pub block_network_ids_hashed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ItemComponent {
    pub items: Vec<ItemEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CameraPreset {
    pub identifier: String,
    pub parent: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CameraPresets {
    pub presets: Vec<CameraPreset>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourcePackInfo {
    pub pack_id: Uuid,
    pub version: String,
    pub content_key: Option<String>,
    pub cdn_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ResourcePacksInfo {
    pub packs: Vec<ResourcePackInfo>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourcePackChunkData {
    pub pack_id: Uuid,
    pub chunk_index: u32,
    pub data: Bytes,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackResponseStatus {
    None,
    Refused,
    SendPacks,
    HaveAllPacks,
    Completed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourcePackClientResponse {
    pub status: PackResponseStatus,
    pub pack_ids: Vec<String>,
}

/// Any message the core does not inspect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawPacket {
    pub id: u32,
    pub payload: Bytes,
}

/// Closed set of message kinds the relay dispatches on.
#[derive(Debug, Clone, PartialEq)]
pub enum Packet {
    RequestNetworkSettings(RequestNetworkSettings),
    NetworkSettings(NetworkSettings),
    PlayStatus(PlayStatus),
    Login(Login),
    Disconnect(Disconnect),
    ServerToClientHandshake(ServerToClientHandshake),
    ClientToServerHandshake,
    Text(Text),
    CommandRequest(CommandRequest),
    AvailableCommands(AvailableCommands),
    Transfer(Transfer),
    StartGame(StartGame),
    ItemComponent(ItemComponent),
    CameraPresets(CameraPresets),
    ResourcePacksInfo(ResourcePacksInfo),
    ResourcePackChunkData(ResourcePackChunkData),
    ResourcePackClientResponse(ResourcePackClientResponse),
    Raw(RawPacket),
}

/// Discriminant of [`Packet`], used as the receiver routing key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PacketKind {
    RequestNetworkSettings,
    NetworkSettings,
    PlayStatus,
    Login,
    Disconnect,
    ServerToClientHandshake,
    ClientToServerHandshake,
    Text,
    CommandRequest,
    AvailableCommands,
    Transfer,
    StartGame,
    ItemComponent,
    CameraPresets,
    ResourcePacksInfo,
    ResourcePackChunkData,
    ResourcePackClientResponse,
    Raw,
}

impl Packet {
    #[inline]
    pub fn kind(&self) -> PacketKind {
        match self {
            Packet::RequestNetworkSettings(_) => PacketKind::RequestNetworkSettings,
            Packet::NetworkSettings(_) => PacketKind::NetworkSettings,
            Packet::PlayStatus(_) => PacketKind::PlayStatus,
            Packet::Login(_) => PacketKind::Login,
            Packet::Disconnect(_) => PacketKind::Disconnect,
            Packet::ServerToClientHandshake(_) => PacketKind::ServerToClientHandshake,
            Packet::ClientToServerHandshake => PacketKind::ClientToServerHandshake,
            Packet::Text(_) => PacketKind::Text,
            Packet::CommandRequest(_) => PacketKind::CommandRequest,
            Packet::AvailableCommands(_) => PacketKind::AvailableCommands,
            Packet::Transfer(_) => PacketKind::Transfer,
            Packet::StartGame(_) => PacketKind::StartGame,
            Packet::ItemComponent(_) => PacketKind::ItemComponent,
            Packet::CameraPresets(_) => PacketKind::CameraPresets,
            Packet::ResourcePacksInfo(_) => PacketKind::ResourcePacksInfo,
            Packet::ResourcePackChunkData(_) => PacketKind::ResourcePackChunkData,
            Packet::ResourcePackClientResponse(_) => PacketKind::ResourcePackClientResponse,
            Packet::Raw(_) => PacketKind::Raw,
        }
    }
}
