//! Runtime id → definition registries for items, blocks and camera presets.
//!
//! Servers announce these tables during game start. Each table is rebuilt in
//! full and then swapped in as a new immutable snapshot, so readers only ever
//! see a complete table.

use crate::error::Result;
use crate::protocol::packet::ItemEntry;
use crate::protocol::palette::{BlockState, Palette};
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use tracing::{debug, info};

/// Something addressable by network runtime id.
pub trait Definition: Clone + Send + Sync {
    fn runtime_id(&self) -> i32;
    fn identifier(&self) -> &str;
}

pub type ItemDefinition = ItemEntry;

impl Definition for ItemEntry {
    fn runtime_id(&self) -> i32 {
        self.runtime_id
    }

    fn identifier(&self) -> &str {
        &self.identifier
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockDefinition {
    pub runtime_id: i32,
    pub state: Option<Arc<BlockState>>,
}

impl Definition for BlockDefinition {
    fn runtime_id(&self) -> i32 {
        self.runtime_id
    }

    fn identifier(&self) -> &str {
        self.state
            .as_ref()
            .map(|state| state.name.as_str())
            .unwrap_or("minecraft:unknown")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CameraDefinition {
    pub runtime_id: i32,
    pub identifier: String,
}

impl Definition for CameraDefinition {
    fn runtime_id(&self) -> i32 {
        self.runtime_id
    }

    fn identifier(&self) -> &str {
        &self.identifier
    }
}

/// Immutable runtime id lookup table.
#[derive(Debug, Clone)]
pub struct DefinitionRegistry<D> {
    by_id: HashMap<i32, D>,
}

impl<D> Default for DefinitionRegistry<D> {
    fn default() -> Self {
        Self {
            by_id: HashMap::new(),
        }
    }
}

impl<D: Definition> DefinitionRegistry<D> {
    pub fn builder() -> DefinitionRegistryBuilder<D> {
        DefinitionRegistryBuilder {
            by_id: HashMap::new(),
        }
    }

    pub fn get(&self, runtime_id: i32) -> Option<&D> {
        self.by_id.get(&runtime_id)
    }

    pub fn is_registered(&self, definition: &D) -> bool {
        self.by_id
            .get(&definition.runtime_id())
            .is_some_and(|known| known.identifier() == definition.identifier())
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }
}

pub struct DefinitionRegistryBuilder<D> {
    by_id: HashMap<i32, D>,
}

impl<D: Definition> DefinitionRegistryBuilder<D> {
    pub fn add(mut self, definition: D) -> Self {
        self.by_id.insert(definition.runtime_id(), definition);
        self
    }

    pub fn add_all<I: IntoIterator<Item = D>>(mut self, definitions: I) -> Self {
        for definition in definitions {
            self.by_id.insert(definition.runtime_id(), definition);
        }
        self
    }

    pub fn build(self) -> DefinitionRegistry<D> {
        DefinitionRegistry { by_id: self.by_id }
    }
}

/// Block lookups: either every id resolves to a placeholder, or a palette.
#[derive(Debug, Clone)]
pub enum BlockRegistry {
    Unknown,
    Palette(DefinitionRegistry<BlockDefinition>),
}

impl BlockRegistry {
    pub fn get(&self, runtime_id: i32) -> Option<BlockDefinition> {
        match self {
            BlockRegistry::Unknown => Some(BlockDefinition {
                runtime_id,
                state: None,
            }),
            BlockRegistry::Palette(registry) => registry.get(runtime_id).cloned(),
        }
    }
}

/// Atomically replaceable reference to an immutable value.
pub struct Snapshot<T> {
    current: RwLock<Arc<T>>,
}

impl<T> Snapshot<T> {
    pub fn new(value: T) -> Self {
        Self {
            current: RwLock::new(Arc::new(value)),
        }
    }

    pub fn load(&self) -> Arc<T> {
        // A poisoned swap still holds a complete Arc.
        match self.current.read() {
            Ok(guard) => Arc::clone(&guard),
            Err(poisoned) => Arc::clone(&poisoned.into_inner()),
        }
    }

    pub fn store(&self, value: T) {
        let next = Arc::new(value);
        match self.current.write() {
            Ok(mut guard) => *guard = next,
            Err(poisoned) => *poisoned.into_inner() = next,
        }
    }
}

/// The definition tables negotiated for a relay.
pub struct Definitions {
    items: Snapshot<DefinitionRegistry<ItemDefinition>>,
    blocks: Snapshot<BlockRegistry>,
    blocks_hashed: Snapshot<BlockRegistry>,
    cameras: Snapshot<DefinitionRegistry<CameraDefinition>>,
    legacy_ids: Snapshot<HashMap<i32, String>>,
    hashed_block_ids: AtomicBool,
}

impl Default for Definitions {
    fn default() -> Self {
        Self::new()
    }
}

impl Definitions {
    pub fn new() -> Self {
        Self {
            items: Snapshot::new(DefinitionRegistry::default()),
            blocks: Snapshot::new(BlockRegistry::Unknown),
            blocks_hashed: Snapshot::new(BlockRegistry::Unknown),
            cameras: Snapshot::new(DefinitionRegistry::default()),
            legacy_ids: Snapshot::new(HashMap::new()),
            hashed_block_ids: AtomicBool::new(false),
        }
    }

    pub fn items(&self) -> Arc<DefinitionRegistry<ItemDefinition>> {
        self.items.load()
    }

    /// The block registry matching the server's id scheme.
    pub fn blocks(&self) -> Arc<BlockRegistry> {
        if self.hashed_block_ids.load(Ordering::Acquire) {
            self.blocks_hashed.load()
        } else {
            self.blocks.load()
        }
    }

    pub fn cameras(&self) -> Arc<DefinitionRegistry<CameraDefinition>> {
        self.cameras.load()
    }

    pub fn legacy_identifier(&self, runtime_id: i32) -> Option<String> {
        self.legacy_ids.load().get(&runtime_id).cloned()
    }

    pub fn replace_items(&self, registry: DefinitionRegistry<ItemDefinition>) {
        debug!(count = registry.len(), "Item definitions replaced");
        self.items.store(registry);
    }

    pub fn replace_cameras(&self, registry: DefinitionRegistry<CameraDefinition>) {
        debug!(count = registry.len(), "Camera definitions replaced");
        self.cameras.store(registry);
    }

    /// Merges legacy ids into a fresh copy of the table and swaps it in.
    pub fn record_legacy_ids<'a, I>(&self, entries: I)
    where
        I: IntoIterator<Item = (i32, &'a str)>,
    {
        let mut next = (*self.legacy_ids.load()).clone();
        for (runtime_id, identifier) in entries {
            next.insert(runtime_id, identifier.to_string());
        }
        self.legacy_ids.store(next);
    }

    pub fn use_hashed_block_ids(&self, hashed: bool) {
        self.hashed_block_ids.store(hashed, Ordering::Release);
    }

    pub fn install_palette(&self, palette: &Palette) {
        self.blocks.store(palette.build_registry(false));
        self.blocks_hashed.store(palette.build_registry(true));
    }

    /// Loads a block palette file, returning the number of block states.
    pub fn load_block_palette<P: AsRef<Path>>(&self, path: P) -> Result<usize> {
        let palette = Palette::from_file(&path)?;
        self.install_palette(&palette);
        info!(
            path = %path.as_ref().display(),
            states = palette.blocks.len(),
            "Block palette loaded"
        );
        Ok(palette.blocks.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(identifier: &str, runtime_id: i32) -> ItemDefinition {
        ItemEntry {
            identifier: identifier.to_string(),
            runtime_id,
            component_based: false,
        }
    }

    #[test]
    fn test_unknown_block_registry_resolves_everything() {
        let defs = Definitions::new();
        let block = defs.blocks().get(12345).expect("placeholder");
        assert_eq!(block.runtime_id, 12345);
        assert_eq!(block.identifier(), "minecraft:unknown");
    }

    #[test]
    fn test_snapshot_readers_keep_old_table() {
        let defs = Definitions::new();
        defs.replace_items(
            DefinitionRegistry::builder()
                .add(item("minecraft:empty", 0))
                .build(),
        );
        let before = defs.items();

        defs.replace_items(
            DefinitionRegistry::builder()
                .add(item("minecraft:empty", 0))
                .add(item("minecraft:stick", 5))
                .build(),
        );

        assert_eq!(before.len(), 1);
        assert_eq!(defs.items().len(), 2);
        assert!(defs.items().is_registered(&item("minecraft:stick", 5)));
        assert!(!defs.items().is_registered(&item("minecraft:apple", 5)));
    }

    #[test]
    fn test_legacy_ids_merge() {
        let defs = Definitions::new();
        defs.record_legacy_ids([(1, "minecraft:stone")]);
        defs.record_legacy_ids([(2, "minecraft:grass")]);
        assert_eq!(defs.legacy_identifier(1).as_deref(), Some("minecraft:stone"));
        assert_eq!(defs.legacy_identifier(2).as_deref(), Some("minecraft:grass"));
    }

    #[test]
    fn test_hashed_switch() {
        let defs = Definitions::new();
        defs.install_palette(&Palette {
            blocks: vec![BlockState::new("minecraft:air")],
        });
        assert!(defs.blocks().get(0).is_some());
        defs.use_hashed_block_ids(true);
        assert!(defs.blocks().get(0).is_none());
        assert!(defs.blocks().get(-604_749_536).is_some());
    }
}
