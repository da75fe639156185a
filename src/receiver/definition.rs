//! Tracks the definition tables the server announces.

use crate::protocol::definitions::{CameraDefinition, DefinitionRegistry, Definitions};
use crate::protocol::packet::{
    CameraPresets, Direction, ItemComponent, ItemEntry, Packet, PacketKind, StartGame,
};
use crate::session::{Event, EventReceiver, Interest, Registration, Session};
use tracing::debug;

/// First protocol announcing its item table in ItemComponent instead of StartGame.
pub const ITEM_COMPONENT_TABLE_VERSION: i32 = 776;

fn empty_item() -> ItemEntry {
    ItemEntry {
        identifier: "minecraft:empty".to_string(),
        runtime_id: 0,
        component_based: false,
    }
}

/// Rebuilds item, block and camera tables. Never consumes anything.
pub struct DefinitionReceiver {
    concurrent_after_start: bool,
}

impl DefinitionReceiver {
    pub const KINDS: &'static [PacketKind] = &[
        PacketKind::StartGame,
        PacketKind::ItemComponent,
        PacketKind::CameraPresets,
    ];

    pub fn new(concurrent_after_start: bool) -> Self {
        Self {
            concurrent_after_start,
        }
    }

    /// Attaches with the concurrency mode from the relay configuration.
    pub fn attach(session: &Session) -> Registration {
        let concurrent = session.relay().config().session.concurrent_after_start_game;
        session.register(Interest::packets(Self::KINDS), Self::new(concurrent))
    }

    fn start_game(&self, session: &Session, start: &StartGame) {
        let definitions = session.relay().definitions();
        if session.codec().protocol_version() < ITEM_COMPONENT_TABLE_VERSION {
            let registry = DefinitionRegistry::builder()
                .add_all(start.item_definitions.iter().cloned())
                .add(empty_item())
                .build();
            definitions.record_legacy_ids(
                start
                    .item_definitions
                    .iter()
                    .map(|item| (item.runtime_id, item.identifier.as_str())),
            );
            definitions.replace_items(registry);
        }

        definitions.use_hashed_block_ids(start.block_network_ids_hashed);
        debug!(hashed = start.block_network_ids_hashed, "Block id scheme selected");

        session.set_concurrent(self.concurrent_after_start);
    }

    fn item_component(session: &Session, component: &ItemComponent) {
        if session.codec().protocol_version() < ITEM_COMPONENT_TABLE_VERSION {
            return;
        }
        let definitions = session.relay().definitions();
        let registry = DefinitionRegistry::builder()
            .add(empty_item())
            .add_all(component.items.iter().map(|item| ItemEntry {
                identifier: item.identifier.clone(),
                runtime_id: item.runtime_id,
                component_based: false,
            }))
            .build();
        definitions.record_legacy_ids(
            component
                .items
                .iter()
                .map(|item| (item.runtime_id, item.identifier.as_str())),
        );
        definitions.replace_items(registry);
    }

    fn camera_presets(definitions: &Definitions, presets: &CameraPresets) {
        let registry = DefinitionRegistry::builder()
            .add_all(
                presets
                    .presets
                    .iter()
                    .enumerate()
                    .map(|(index, preset)| CameraDefinition {
                        runtime_id: index as i32,
                        identifier: preset.identifier.clone(),
                    }),
            )
            .build();
        definitions.replace_cameras(registry);
    }
}

impl EventReceiver for DefinitionReceiver {
    fn on_event(&self, session: &Session, event: &mut Event, _: &Registration) {
        let Some(event) = event.as_packet() else {
            return;
        };
        if event.direction() != Direction::Inbound {
            return;
        }
        match event.packet() {
            Packet::StartGame(start) => self.start_game(session, start),
            Packet::ItemComponent(component) => Self::item_component(session, component),
            Packet::CameraPresets(presets) => {
                Self::camera_presets(session.relay().definitions(), presets)
            }
            _ => {}
        }
    }
}
