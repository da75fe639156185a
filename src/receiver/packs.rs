//! Feeds the server's resource pack traffic into a [`PackDownloader`].

use crate::pack::PackDownloader;
use crate::protocol::packet::{Direction, Packet, PackResponseStatus, PacketKind};
use crate::session::{PacketEvent, Registration, Session};
use std::sync::Arc;
use tracing::warn;

pub const KINDS: &[PacketKind] = &[
    PacketKind::ResourcePacksInfo,
    PacketKind::ResourcePackChunkData,
    PacketKind::ResourcePackClientResponse,
];

/// Observes pack announcements, chunks and the client's completion. Every
/// packet still reaches its destination.
pub fn attach(session: &Session, downloader: Arc<PackDownloader>) -> Registration {
    session.on_packets(
        KINDS,
        move |_: &Session, event: &mut PacketEvent, _: &Registration| {
            let outcome = match (event.direction(), event.packet()) {
                (Direction::Inbound, Packet::ResourcePacksInfo(info)) => {
                    info.packs.iter().try_for_each(|pack| {
                        downloader.register(
                            pack.pack_id,
                            pack.cdn_url.clone(),
                            pack.content_key.clone(),
                        )
                    })
                }
                (Direction::Inbound, Packet::ResourcePackChunkData(chunk)) => {
                    downloader.add_chunk(chunk.pack_id, chunk.chunk_index, chunk.data.clone())
                }
                (Direction::Outbound, Packet::ResourcePackClientResponse(response))
                    if response.status == PackResponseStatus::Completed =>
                {
                    downloader.process_all().map(|_| ())
                }
                _ => Ok(()),
            };
            if let Err(e) = outcome {
                warn!(error = %e, "Pack capture failed");
            }
        },
    )
}
