//! Protocol version → codec table and codec helpers.
//!
//! A [`Codec`] describes how one protocol version is encoded. The byte-level
//! serializers live in the transport's codec layer; this table only decides
//! which version a session speaks and which serializer overrides apply.

use crate::protocol::definitions::{
    BlockRegistry, CameraDefinition, DefinitionRegistry, Definitions, ItemDefinition,
};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::{Arc, OnceLock};

/// Protocol version the relay speaks when a client asks for an unknown one.
pub const DEFAULT_PROTOCOL_VERSION: i32 = 827;

/// Newest protocol whose inventory serializers are reused by later versions.
pub const INVENTORY_SERIALIZER_VERSION: i32 = 729;

/// (protocol version, game version) for every supported codec.
const SUPPORTED_VERSIONS: &[(i32, &str)] = &[
    (291, "1.7.0"),
    (313, "1.8.0"),
    (332, "1.9.0"),
    (340, "1.10.0"),
    (354, "1.11.0"),
    (361, "1.12.0"),
    (388, "1.13.0"),
    (389, "1.14.0"),
    (390, "1.14.60"),
    (407, "1.16.0"),
    (408, "1.16.20"),
    (419, "1.16.100"),
    (422, "1.16.200"),
    (428, "1.16.210"),
    (431, "1.16.220"),
    (440, "1.17.0"),
    (448, "1.17.10"),
    (465, "1.17.30"),
    (471, "1.17.40"),
    (475, "1.18.0"),
    (486, "1.18.10"),
    (503, "1.18.30"),
    (527, "1.19.0"),
    (534, "1.19.10"),
    (544, "1.19.20"),
    (545, "1.19.21"),
    (554, "1.19.30"),
    (557, "1.19.40"),
    (560, "1.19.50"),
    (567, "1.19.60"),
    (568, "1.19.63"),
    (575, "1.19.70"),
    (582, "1.19.80"),
    (589, "1.20.0"),
    (594, "1.20.10"),
    (618, "1.20.30"),
    (622, "1.20.40"),
    (630, "1.20.50"),
    (649, "1.20.60"),
    (662, "1.20.70"),
    (671, "1.20.80"),
    (685, "1.21.0"),
    (686, "1.21.2"),
    (712, "1.21.20"),
    (729, "1.21.30"),
    (748, "1.21.40"),
    (766, "1.21.50"),
    (776, "1.21.60"),
    (786, "1.21.70"),
    (800, "1.21.80"),
    (818, "1.21.90"),
    (819, "1.21.93"),
    (827, "1.21.100"),
];

fn raknet_protocol_for(protocol_version: i32) -> u8 {
    match protocol_version {
        v if v < 389 => 9,
        v if v < 554 => 10,
        _ => 11,
    }
}

/// Limits applied while decoding lists, strings and NBT.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncodingSettings {
    pub max_list_size: usize,
    pub max_byte_array_size: usize,
    pub max_string_length: usize,
    pub max_network_nbt_size: usize,
}

impl EncodingSettings {
    pub const DEFAULT: Self = Self {
        max_list_size: 1500,
        max_byte_array_size: 1024 * 1024,
        max_string_length: 1024 * 1024,
        max_network_nbt_size: 2 * 1024 * 1024,
    };

    /// A relay has to accept whatever the real server sends.
    pub const UNLIMITED: Self = Self {
        max_list_size: usize::MAX,
        max_byte_array_size: usize::MAX,
        max_string_length: usize::MAX,
        max_network_nbt_size: usize::MAX,
    };
}

/// Per-session codec state bound to the definition registries.
pub struct CodecHelper {
    protocol_version: i32,
    definitions: Arc<Definitions>,
    encoding: EncodingSettings,
}

impl CodecHelper {
    pub fn protocol_version(&self) -> i32 {
        self.protocol_version
    }

    pub fn encoding(&self) -> EncodingSettings {
        self.encoding
    }

    pub fn definitions(&self) -> &Arc<Definitions> {
        &self.definitions
    }

    pub fn items(&self) -> Arc<DefinitionRegistry<ItemDefinition>> {
        self.definitions.items()
    }

    pub fn blocks(&self) -> Arc<BlockRegistry> {
        self.definitions.blocks()
    }

    pub fn cameras(&self) -> Arc<DefinitionRegistry<CameraDefinition>> {
        self.definitions.cameras()
    }
}

impl fmt::Debug for CodecHelper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CodecHelper")
            .field("protocol_version", &self.protocol_version)
            .field("encoding", &self.encoding)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone)]
pub struct Codec {
    protocol_version: i32,
    minecraft_version: &'static str,
    raknet_protocol_version: u8,
    serializer_overrides: BTreeMap<u32, i32>,
    helper: Option<Arc<CodecHelper>>,
}

impl Codec {
    pub fn new(protocol_version: i32, minecraft_version: &'static str) -> Self {
        Self {
            protocol_version,
            minecraft_version,
            raknet_protocol_version: raknet_protocol_for(protocol_version),
            serializer_overrides: BTreeMap::new(),
            helper: None,
        }
    }

    pub fn protocol_version(&self) -> i32 {
        self.protocol_version
    }

    pub fn minecraft_version(&self) -> &'static str {
        self.minecraft_version
    }

    pub fn raknet_protocol_version(&self) -> u8 {
        self.raknet_protocol_version
    }

    pub fn helper(&self) -> Option<&Arc<CodecHelper>> {
        self.helper.as_ref()
    }

    /// Protocol version whose serializer handles `packet_id`.
    pub fn serializer_version(&self, packet_id: u32) -> i32 {
        self.serializer_overrides
            .get(&packet_id)
            .copied()
            .unwrap_or(self.protocol_version)
    }

    pub fn create_helper(&self, definitions: Arc<Definitions>) -> CodecHelper {
        CodecHelper {
            protocol_version: self.protocol_version,
            definitions,
            encoding: EncodingSettings::UNLIMITED,
        }
    }

    pub fn to_builder(&self) -> CodecBuilder {
        CodecBuilder {
            codec: self.clone(),
        }
    }
}

pub struct CodecBuilder {
    codec: Codec,
}

impl CodecBuilder {
    pub fn helper(mut self, helper: Arc<CodecHelper>) -> Self {
        self.codec.helper = Some(helper);
        self
    }

    pub fn update_serializer(mut self, packet_id: u32, serializer_version: i32) -> Self {
        self.codec
            .serializer_overrides
            .insert(packet_id, serializer_version);
        self
    }

    pub fn build(self) -> Codec {
        self.codec
    }
}

/// Immutable protocol version → codec map.
#[derive(Debug)]
pub struct CodecTable {
    by_version: HashMap<i32, Arc<Codec>>,
    default_version: i32,
}

impl CodecTable {
    /// The table of every supported protocol version, built on first use.
    pub fn builtin() -> &'static CodecTable {
        static TABLE: OnceLock<CodecTable> = OnceLock::new();
        TABLE.get_or_init(|| {
            CodecTable::from_codecs(
                SUPPORTED_VERSIONS
                    .iter()
                    .map(|(protocol, version)| Codec::new(*protocol, version)),
                DEFAULT_PROTOCOL_VERSION,
            )
        })
    }

    pub fn from_codecs<I: IntoIterator<Item = Codec>>(codecs: I, default_version: i32) -> Self {
        let by_version = codecs
            .into_iter()
            .map(|codec| (codec.protocol_version, Arc::new(codec)))
            .collect();
        Self {
            by_version,
            default_version,
        }
    }

    pub fn get(&self, protocol_version: i32) -> Option<Arc<Codec>> {
        self.by_version.get(&protocol_version).cloned()
    }

    /// Exact match for `protocol_version`, otherwise `fallback`.
    pub fn lookup(&self, protocol_version: i32, fallback: &Arc<Codec>) -> Arc<Codec> {
        self.get(protocol_version)
            .unwrap_or_else(|| Arc::clone(fallback))
    }

    pub fn default_codec(&self) -> Option<Arc<Codec>> {
        self.get(self.default_version)
    }

    pub fn versions(&self) -> Vec<i32> {
        let mut versions: Vec<i32> = self.by_version.keys().copied().collect();
        versions.sort_unstable();
        versions
    }

    pub fn len(&self) -> usize {
        self.by_version.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_version.is_empty()
    }
}
