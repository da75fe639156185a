//! Background resource pack capture.
//!
//! The server streams packs to the client as numbered chunks (or points it
//! at a CDN). The downloader collects those per pack while the session runs
//! and, once the client reports it has everything, hands each pack to a
//! bounded worker pool that writes a decrypted `<pack-uuid>.zip`.

use crate::config::PacksConfig;
use crate::error::{poisoned, RelayError, Result};
use crate::pack::archive::PackArchive;
use bytes::{Bytes, BytesMut};
use std::collections::{BTreeMap, HashMap};
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::Semaphore;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, instrument};
use uuid::Uuid;

/// Half the available cores, never fewer than two.
pub fn default_workers() -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    (cores / 2).max(2)
}

#[derive(Debug)]
struct PackJob {
    pack_id: Uuid,
    cdn_url: Option<String>,
    content_key: Option<String>,
    chunks: BTreeMap<u32, Bytes>,
}

impl PackJob {
    fn assemble(chunks: &BTreeMap<u32, Bytes>) -> Bytes {
        let total = chunks.values().map(Bytes::len).sum();
        let mut assembled = BytesMut::with_capacity(total);
        for chunk in chunks.values() {
            assembled.extend_from_slice(chunk);
        }
        assembled.freeze()
    }

    #[instrument(skip_all, fields(pack_id = %self.pack_id))]
    fn run(self, directory: &Path, timeout: Duration) -> Result<Option<PathBuf>> {
        let PackJob {
            pack_id,
            cdn_url,
            content_key,
            chunks,
        } = self;
        if chunks.is_empty() && cdn_url.is_none() {
            debug!("Nothing received for pack");
            return Ok(None);
        }

        let path = directory.join(format!("{pack_id}.zip"));
        match cdn_url.as_deref() {
            Some(url) => download(url, &path, timeout)?,
            None => {
                let assembled = Self::assemble(&chunks);
                drop(chunks);
                fs::write(&path, &assembled)?;
            }
        }

        let mut archive = PackArchive::open(&path)?;
        if cdn_url.is_some() {
            archive.unwrap_nested_zip()?;
        }
        archive.orient();
        if let Some(key) = content_key.as_deref() {
            archive.decrypt(key)?;
        }
        archive.save(&path)?;
        Ok(Some(path))
    }
}

fn download(url: &str, path: &Path, timeout: Duration) -> Result<()> {
    debug!(url, "Downloading pack from CDN");
    let agent = ureq::AgentBuilder::new().timeout(timeout).build();
    let response = agent
        .get(url)
        .call()
        .map_err(|e| RelayError::Download(format!("{url}: {e}")))?;
    let mut reader = response.into_reader();
    let mut file = File::create(path)?;
    io::copy(&mut reader, &mut file)?;
    file.sync_all()?;
    Ok(())
}

/// Collects pack chunks per session and processes them off the session's
/// thread. Submitting never blocks; results only show up on disk.
pub struct PackDownloader {
    directory: PathBuf,
    download_timeout: Duration,
    jobs: Mutex<HashMap<Uuid, PackJob>>,
    workers: Arc<Semaphore>,
    tracker: TaskTracker,
    runtime: Handle,
}

impl PackDownloader {
    /// Creates the packs directory if needed.
    pub fn new(config: &PacksConfig, runtime: Handle) -> Result<Self> {
        fs::create_dir_all(&config.directory)?;
        let workers = if config.workers == 0 {
            default_workers()
        } else {
            config.workers
        };
        debug!(directory = %config.directory.display(), workers, "Pack downloader ready");
        Ok(Self {
            directory: config.directory.clone(),
            download_timeout: config.download_timeout,
            jobs: Mutex::new(HashMap::new()),
            workers: Arc::new(Semaphore::new(workers)),
            tracker: TaskTracker::new(),
            runtime,
        })
    }

    /// A shared downloader, or `None` when pack capture is disabled.
    pub fn from_config(config: &PacksConfig, runtime: Handle) -> Result<Option<Arc<Self>>> {
        if !config.enabled {
            debug!("Pack capture disabled");
            return Ok(None);
        }
        Self::new(config, runtime).map(|downloader| Some(Arc::new(downloader)))
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Starts a job for `pack_id`, replacing any job not yet submitted.
    /// Empty URLs and keys count as absent.
    pub fn register(
        &self,
        pack_id: Uuid,
        cdn_url: Option<String>,
        content_key: Option<String>,
    ) -> Result<()> {
        let job = PackJob {
            pack_id,
            cdn_url: cdn_url.filter(|url| !url.is_empty()),
            content_key: content_key.filter(|key| !key.is_empty()),
            chunks: BTreeMap::new(),
        };
        self.jobs.lock().map_err(poisoned)?.insert(pack_id, job);
        Ok(())
    }

    /// Stores chunk `chunk_index` of `pack_id`. Chunks for packs that are
    /// not registered are dropped.
    pub fn add_chunk(&self, pack_id: Uuid, chunk_index: u32, data: Bytes) -> Result<()> {
        let mut jobs = self.jobs.lock().map_err(poisoned)?;
        match jobs.get_mut(&pack_id) {
            Some(job) => {
                job.chunks.insert(chunk_index, data);
            }
            None => debug!(%pack_id, chunk_index, "Chunk for unknown pack ignored"),
        }
        Ok(())
    }

    /// Number of registered jobs not yet submitted.
    pub fn registered(&self) -> Result<usize> {
        Ok(self.jobs.lock().map_err(poisoned)?.len())
    }

    /// Bytes received so far for `pack_id`, in chunk order.
    pub fn assembled(&self, pack_id: &Uuid) -> Result<Option<Bytes>> {
        let jobs = self.jobs.lock().map_err(poisoned)?;
        Ok(jobs.get(pack_id).map(|job| PackJob::assemble(&job.chunks)))
    }

    /// Submits every registered job to the pool and clears the registry.
    /// Returns the number of jobs submitted.
    pub fn process_all(&self) -> Result<usize> {
        let jobs: Vec<PackJob> = {
            let mut registered = self.jobs.lock().map_err(poisoned)?;
            registered.drain().map(|(_, job)| job).collect()
        };
        let submitted = jobs.len();

        for job in jobs {
            let workers = Arc::clone(&self.workers);
            let directory = self.directory.clone();
            let timeout = self.download_timeout;
            self.tracker.spawn_on(
                async move {
                    let pack_id = job.pack_id;
                    let Ok(_permit) = workers.acquire_owned().await else {
                        return;
                    };
                    let outcome =
                        tokio::task::spawn_blocking(move || job.run(&directory, timeout)).await;
                    match outcome {
                        Ok(Ok(Some(path))) => info!(%pack_id, path = %path.display(), "Pack saved"),
                        Ok(Ok(None)) => {}
                        Ok(Err(e)) => error!(%pack_id, error = %e, "Pack job failed"),
                        Err(e) => error!(%pack_id, error = %e, "Pack job panicked"),
                    }
                },
                &self.runtime,
            );
        }

        if submitted > 0 {
            debug!(jobs = submitted, "Submitted pack jobs");
        }
        Ok(submitted)
    }

    /// Waits for every job submitted so far.
    pub async fn join(&self) {
        self.tracker.close();
        self.tracker.wait().await;
        self.tracker.reopen();
    }
}

impl std::fmt::Debug for PackDownloader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PackDownloader")
            .field("directory", &self.directory)
            .field("in_flight", &self.tracker.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(dir: &Path) -> PacksConfig {
        PacksConfig {
            directory: dir.to_path_buf(),
            ..PacksConfig::default()
        }
    }

    #[test]
    fn test_default_workers_floor() {
        assert!(default_workers() >= 2);
    }

    #[tokio::test]
    async fn test_chunks_reassemble_by_index() {
        let dir = tempfile::tempdir().unwrap();
        let downloader = PackDownloader::new(&config(dir.path()), Handle::current()).unwrap();
        let id = Uuid::new_v4();
        downloader.register(id, None, None).unwrap();
        downloader.add_chunk(id, 2, Bytes::from_static(b"c")).unwrap();
        downloader.add_chunk(id, 0, Bytes::from_static(b"a")).unwrap();
        downloader.add_chunk(id, 1, Bytes::from_static(b"b")).unwrap();
        downloader
            .add_chunk(Uuid::new_v4(), 0, Bytes::from_static(b"x"))
            .unwrap();

        assert_eq!(downloader.assembled(&id).unwrap().unwrap(), "abc");
        assert_eq!(downloader.registered().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_process_all_clears_registry() {
        let dir = tempfile::tempdir().unwrap();
        let downloader = PackDownloader::new(&config(dir.path()), Handle::current()).unwrap();
        downloader.register(Uuid::new_v4(), None, None).unwrap();
        downloader.register(Uuid::new_v4(), Some(String::new()), None).unwrap();

        assert_eq!(downloader.process_all().unwrap(), 2);
        assert_eq!(downloader.registered().unwrap(), 0);
        assert_eq!(downloader.process_all().unwrap(), 0);
        downloader.join().await;

        // Jobs with no data write nothing.
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_disabled_config_builds_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let packs = dir.path().join("packs");
        let disabled = PacksConfig {
            enabled: false,
            ..config(&packs)
        };
        assert!(PackDownloader::from_config(&disabled, Handle::current())
            .unwrap()
            .is_none());
        assert!(!packs.exists());

        let enabled = PackDownloader::from_config(&config(&packs), Handle::current()).unwrap();
        assert_eq!(enabled.unwrap().directory(), packs.as_path());
    }
}
