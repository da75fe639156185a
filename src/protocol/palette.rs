//! Block palette loading and network id hashing.
//!
//! Servers either number block states sequentially in palette order or send
//! a stable hash of each state. The hash is FNV-1a 32 over the little-endian
//! NBT encoding of `{name, states}` with the states sorted by key.

use crate::error::Result;
use crate::protocol::definitions::{BlockDefinition, BlockRegistry, DefinitionRegistry};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

const FNV1_32_INIT: u32 = 0x811c_9dc5;
const FNV1_PRIME_32: u32 = 0x0100_0193;

/// Runtime id reserved for `minecraft:unknown` in hashed palettes.
pub const UNKNOWN_BLOCK_HASH: i32 = -2;

const TAG_END: u8 = 0;
const TAG_BYTE: u8 = 1;
const TAG_INT: u8 = 3;
const TAG_STRING: u8 = 8;
const TAG_COMPOUND: u8 = 10;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StateValue {
    Bool(bool),
    Int(i32),
    String(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockState {
    pub name: String,
    #[serde(default)]
    pub states: BTreeMap<String, StateValue>,
}

impl BlockState {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            states: BTreeMap::new(),
        }
    }

    pub fn with_state(mut self, key: impl Into<String>, value: StateValue) -> Self {
        self.states.insert(key.into(), value);
        self
    }

    /// Network hash of this state.
    pub fn network_hash(&self) -> i32 {
        if self.name == "minecraft:unknown" {
            return UNKNOWN_BLOCK_HASH;
        }
        fnv1a_32(&self.to_nbt_le())
    }

    fn to_nbt_le(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(64);
        out.push(TAG_COMPOUND);
        write_string(&mut out, "");

        out.push(TAG_STRING);
        write_string(&mut out, "name");
        write_string(&mut out, &self.name);

        out.push(TAG_COMPOUND);
        write_string(&mut out, "states");
        for (key, value) in &self.states {
            match value {
                StateValue::Bool(flag) => {
                    out.push(TAG_BYTE);
                    write_string(&mut out, key);
                    out.push(u8::from(*flag));
                }
                StateValue::Int(number) => {
                    out.push(TAG_INT);
                    write_string(&mut out, key);
                    out.extend_from_slice(&number.to_le_bytes());
                }
                StateValue::String(text) => {
                    out.push(TAG_STRING);
                    write_string(&mut out, key);
                    write_string(&mut out, text);
                }
            }
        }
        out.push(TAG_END);

        out.push(TAG_END);
        out
    }
}

fn write_string(out: &mut Vec<u8>, value: &str) {
    let bytes = value.as_bytes();
    let len = u16::try_from(bytes.len()).unwrap_or(u16::MAX);
    out.extend_from_slice(&len.to_le_bytes());
    out.extend_from_slice(&bytes[..usize::from(len)]);
}

pub fn fnv1a_32(data: &[u8]) -> i32 {
    let mut hash = FNV1_32_INIT;
    for byte in data {
        hash ^= u32::from(*byte);
        hash = hash.wrapping_mul(FNV1_PRIME_32);
    }
    hash as i32
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Palette {
    pub blocks: Vec<BlockState>,
}

impl Palette {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&contents)?)
    }

    /// Builds a registry keyed either by palette position or by state hash.
    pub fn build_registry(&self, hashed: bool) -> BlockRegistry {
        let mut builder = DefinitionRegistry::builder();
        for (index, state) in self.blocks.iter().enumerate() {
            let runtime_id = if hashed {
                state.network_hash()
            } else {
                index as i32
            };
            builder = builder.add(BlockDefinition {
                runtime_id,
                state: Some(Arc::new(state.clone())),
            });
        }
        BlockRegistry::Palette(builder.build())
    }
}
