// test-only module included via protocol/mod.rs
#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use crate::protocol::codec::*;
use crate::protocol::definitions::Definitions;
use crate::protocol::packet::ids;
use std::sync::Arc;

#[test]
fn test_builtin_table_covers_every_era() {
    let table = CodecTable::builtin();
    assert_eq!(table.len(), 53);
    assert_eq!(table.versions().first(), Some(&291));
    assert_eq!(table.versions().last(), Some(&DEFAULT_PROTOCOL_VERSION));

    for version in table.versions() {
        let codec = table.get(version).expect("listed version resolves");
        assert_eq!(codec.protocol_version(), version);
    }
}

#[test]
fn test_lookup_exact_or_fallback() {
    let table = CodecTable::builtin();
    let fallback = table.default_codec().expect("default codec");

    assert_eq!(table.lookup(712, &fallback).protocol_version(), 712);
    assert_eq!(table.lookup(100, &fallback).protocol_version(), 827);
    assert_eq!(table.lookup(9999, &fallback).protocol_version(), 827);
}

#[test]
fn test_raknet_versions_by_era() {
    let table = CodecTable::builtin();
    assert_eq!(table.get(291).unwrap().raknet_protocol_version(), 9);
    assert_eq!(table.get(440).unwrap().raknet_protocol_version(), 10);
    assert_eq!(table.get(827).unwrap().raknet_protocol_version(), 11);
}

#[test]
fn test_serializer_patch_is_local_to_built_codec() {
    let table = CodecTable::builtin();
    let base = table.get(766).unwrap();
    let helper = Arc::new(base.create_helper(Arc::new(Definitions::new())));

    let patched = base
        .to_builder()
        .helper(helper)
        .update_serializer(ids::INVENTORY_CONTENT, INVENTORY_SERIALIZER_VERSION)
        .update_serializer(ids::INVENTORY_SLOT, INVENTORY_SERIALIZER_VERSION)
        .build();

    assert_eq!(patched.serializer_version(ids::INVENTORY_CONTENT), 729);
    assert_eq!(patched.serializer_version(ids::INVENTORY_SLOT), 729);
    assert_eq!(patched.serializer_version(0x01), 766);
    assert!(patched.helper().is_some());

    // The table entry itself is untouched.
    assert_eq!(base.serializer_version(ids::INVENTORY_CONTENT), 766);
    assert!(base.helper().is_none());
}

#[test]
fn test_helper_sees_definition_swaps() {
    let definitions = Arc::new(Definitions::new());
    let codec = CodecTable::builtin().get(827).unwrap();
    let helper = codec.create_helper(Arc::clone(&definitions));
    assert_eq!(helper.encoding(), EncodingSettings::UNLIMITED);
    assert!(helper.items().is_empty());

    definitions.replace_items(
        crate::protocol::definitions::DefinitionRegistry::builder()
            .add(crate::protocol::packet::ItemEntry {
                identifier: "minecraft:empty".into(),
                runtime_id: 0,
                component_based: false,
            })
            .build(),
    );
    assert_eq!(helper.items().len(), 1);
}
