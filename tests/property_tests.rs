//! Property-based tests using proptest
//!
//! These tests check ordering and determinism invariants of the relay
//! across randomly generated inputs.

#![allow(clippy::expect_used, clippy::unwrap_used)]

mod common;

use bedrock_relay::config::PacksConfig;
use bedrock_relay::pack::cipher::{decrypt_in_place, encrypt_in_place};
use bedrock_relay::pack::PackDownloader;
use bedrock_relay::protocol::packet::{Direction, Packet, RawPacket};
use bytes::Bytes;
use common::{relay, RecordingHalf, Sent};
use proptest::prelude::*;
use std::sync::OnceLock;
use tokio::runtime::Runtime;
use uuid::Uuid;

fn runtime() -> &'static Runtime {
    static RUNTIME: OnceLock<Runtime> = OnceLock::new();
    RUNTIME.get_or_init(|| {
        tokio::runtime::Builder::new_current_thread()
            .build()
            .expect("test runtime")
    })
}

fn downloader(dir: &std::path::Path) -> PackDownloader {
    let config = PacksConfig {
        directory: dir.to_path_buf(),
        ..PacksConfig::default()
    };
    PackDownloader::new(&config, runtime().handle().clone()).unwrap()
}

fn split(data: &[u8], size: usize) -> Vec<(u32, Bytes)> {
    data.chunks(size)
        .enumerate()
        .map(|(i, c)| (i as u32, Bytes::copy_from_slice(c)))
        .collect()
}

// Property: chunk arrival order never changes the reassembled archive
proptest! {
    #[test]
    fn prop_chunks_reassemble_in_index_order(
        data in prop::collection::vec(any::<u8>(), 1..4096),
        size in 1usize..512,
        seed in any::<u64>(),
    ) {
        let dir = tempfile::tempdir().unwrap();
        let forward = downloader(dir.path());
        let shuffled = downloader(dir.path());
        let id = Uuid::from_u64_pair(seed, !seed);
        forward.register(id, None, None).unwrap();
        shuffled.register(id, None, None).unwrap();

        let chunks = split(&data, size);
        for (index, chunk) in &chunks {
            forward.add_chunk(id, *index, chunk.clone()).unwrap();
        }
        let mut order: Vec<usize> = (0..chunks.len()).collect();
        let len = order.len();
        for i in 0..len {
            order.swap(i, (seed as usize).wrapping_add(i * 31) % len);
        }
        for i in order.into_iter().rev() {
            let (index, chunk) = &chunks[i];
            shuffled.add_chunk(id, *index, chunk.clone()).unwrap();
        }

        let expected = Bytes::from(data);
        prop_assert_eq!(forward.assembled(&id).unwrap(), Some(expected.clone()));
        prop_assert_eq!(shuffled.assembled(&id).unwrap(), Some(expected));
    }
}

// Property: sends queued before install arrive in enqueue order with their flags
proptest! {
    #[test]
    fn prop_queued_sends_are_fifo(sends in prop::collection::vec((any::<u32>(), any::<bool>()), 0..64)) {
        let (relay, _) = relay();
        let session = relay.new_session();
        for (id, immediate) in &sends {
            let packet = Packet::Raw(RawPacket { id: *id, payload: Bytes::new() });
            if *immediate {
                session.send_immediately(Direction::Inbound, packet);
            } else {
                session.send(Direction::Inbound, packet);
            }
        }
        prop_assert_eq!(session.pending(Direction::Inbound), sends.len());

        let inbound = RecordingHalf::new();
        session.install_inbound(inbound.clone()).unwrap();

        let expected: Vec<Sent> = sends
            .iter()
            .map(|(id, immediate)| Sent {
                packet: Packet::Raw(RawPacket { id: *id, payload: Bytes::new() }),
                immediate: *immediate,
            })
            .collect();
        prop_assert_eq!(inbound.sent(), expected);
    }
}

// Property: pack decryption is deterministic and inverts encryption
proptest! {
    #[test]
    fn prop_pack_cipher_deterministic(
        key in prop::collection::vec(any::<u8>(), 32),
        plaintext in prop::collection::vec(any::<u8>(), 0..2048),
    ) {
        let mut ciphertext = plaintext.clone();
        encrypt_in_place(&key, &mut ciphertext).unwrap();

        let mut first = ciphertext.clone();
        let mut second = ciphertext;
        decrypt_in_place(&key, &mut first).unwrap();
        decrypt_in_place(&key, &mut second).unwrap();
        prop_assert_eq!(&first, &second);
        prop_assert_eq!(first, plaintext);
    }
}
