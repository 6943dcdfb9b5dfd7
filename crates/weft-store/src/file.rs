//! Journal-backed datastore
//!
//! Every committed [`Batch`] becomes one frame appended to a journal file:
//!
//! ```text
//! <len:u32le><blake3(payload):32><payload: dag-cbor Vec<BatchOp>>
//! ```
//!
//! Opening the store replays the journal into an in-memory ordered map. An
//! incomplete or unverifiable final frame (a write torn by a crash) is cut
//! off; a bad frame followed by more data is reported as corruption.
//!
//! File work runs on the blocking pool. A caller that drops the future of a
//! `commit` does not interrupt the write: the frame lands (or not) as a whole.
//! Writes pass through a FIFO gate before reaching the pool, so they reach the
//! journal in call order even when an earlier caller has gone away.

use crate::batch::{apply, descendants};
use crate::{decode_cbor, Batch, BatchOp, Datastore, Key, Result, StoreError};
use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Length prefix plus checksum
const FRAME_HEADER: usize = 4 + blake3::OUT_LEN;

/// File datastore configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FileDatastoreConfig {
    /// fsync after every commit
    pub sync_writes: bool,
    /// Rewrite the journal as a single snapshot frame on close
    pub compact_on_close: bool,
}

impl Default for FileDatastoreConfig {
    fn default() -> Self {
        Self {
            sync_writes: true,
            compact_on_close: true,
        }
    }
}

impl FileDatastoreConfig {
    /// Set whether commits are fsynced
    pub fn with_sync_writes(mut self, sync_writes: bool) -> Self {
        self.sync_writes = sync_writes;
        self
    }

    /// Set whether the journal is compacted on close
    pub fn with_compact_on_close(mut self, compact_on_close: bool) -> Self {
        self.compact_on_close = compact_on_close;
        self
    }
}

/// A datastore persisted to an append-only journal file
#[derive(Clone)]
pub struct FileDatastore {
    inner: Arc<Inner>,
    /// Orders journal writes; held until the blocking work finishes
    gate: Arc<tokio::sync::Mutex<()>>,
}

struct Inner {
    path: PathBuf,
    config: FileDatastoreConfig,
    state: Mutex<State>,
}

struct State {
    entries: BTreeMap<Key, Bytes>,
    /// `None` once closed
    journal: Option<File>,
    len: u64,
    frames: usize,
}

impl FileDatastore {
    /// Open (or create) a journal with the default configuration
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self> {
        Self::open_with_config(path, FileDatastoreConfig::default()).await
    }

    /// Open (or create) a journal
    pub async fn open_with_config(
        path: impl Into<PathBuf>,
        config: FileDatastoreConfig,
    ) -> Result<Self> {
        let path = path.into();
        let inner = tokio::task::spawn_blocking(move || Inner::open(path, config)).await??;
        Ok(Self {
            inner: Arc::new(inner),
            gate: Arc::new(tokio::sync::Mutex::new(())),
        })
    }

    /// Get the journal path
    pub fn path(&self) -> &Path {
        &self.inner.path
    }

    /// Get the number of live entries
    pub fn len(&self) -> usize {
        self.inner.state.lock().entries.len()
    }

    /// Check if the store is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Get the number of frames in the journal
    pub fn frames(&self) -> usize {
        self.inner.state.lock().frames
    }

    /// Rewrite the journal as a single snapshot frame
    pub async fn compact(&self) -> Result<()> {
        self.write(|inner| inner.compact()).await
    }

    /// Run journal work on the blocking pool behind the write gate
    async fn write<F>(&self, f: F) -> Result<()>
    where
        F: FnOnce(&Inner) -> Result<()> + Send + 'static,
    {
        let permit = self.gate.clone().lock_owned().await;
        let inner = self.inner.clone();
        tokio::task::spawn_blocking(move || {
            let _permit = permit;
            f(inner.as_ref())
        })
        .await?
    }
}

impl std::fmt::Debug for FileDatastore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileDatastore")
            .field("path", &self.inner.path)
            .finish_non_exhaustive()
    }
}

impl Inner {
    fn open(path: PathBuf, config: FileDatastoreConfig) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let mut journal = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&path)?;
        let mut data = Vec::new();
        journal.read_to_end(&mut data)?;

        let mut entries = BTreeMap::new();
        let (valid, frames) = replay(&data, &mut entries)?;

        if valid < data.len() {
            warn!(
                path = %path.display(),
                discarded = data.len() - valid,
                "Truncating torn journal tail"
            );
            journal.set_len(valid as u64)?;
            journal.sync_all()?;
        }

        debug!(path = %path.display(), frames, entries = entries.len(), "Opened journal");

        Ok(Self {
            path,
            config,
            state: Mutex::new(State {
                entries,
                journal: Some(journal),
                len: valid as u64,
                frames,
            }),
        })
    }

    fn commit(&self, batch: Batch) -> Result<()> {
        let mut guard = self.state.lock();
        let state = &mut *guard;
        let journal = state.journal.as_mut().ok_or(StoreError::Closed)?;
        if batch.is_empty() {
            return Ok(());
        }

        let frame = encode_frame(batch.ops())?;
        if let Err(err) = write_frame(journal, &frame, self.config.sync_writes) {
            // Keep the journal contiguous for the next frame
            if let Err(truncate_err) = journal.set_len(state.len) {
                warn!(error = %truncate_err, "Failed to roll back partial journal frame");
            }
            return Err(err.into());
        }

        state.len += frame.len() as u64;
        state.frames += 1;
        apply(&mut state.entries, batch.into_ops());
        Ok(())
    }

    fn sync(&self) -> Result<()> {
        let state = self.state.lock();
        let journal = state.journal.as_ref().ok_or(StoreError::Closed)?;
        journal.sync_data()?;
        Ok(())
    }

    fn compact(&self) -> Result<()> {
        let mut guard = self.state.lock();
        let state = &mut *guard;
        if state.journal.is_none() {
            return Err(StoreError::Closed);
        }

        let ops: Vec<BatchOp> = state
            .entries
            .iter()
            .map(|(key, value)| BatchOp::Put {
                key: key.clone(),
                value: value.clone(),
            })
            .collect();

        let tmp = self.path.with_extension("compact");
        let mut written = 0u64;
        {
            let mut file = File::create(&tmp)?;
            if !ops.is_empty() {
                let frame = encode_frame(&ops)?;
                file.write_all(&frame)?;
                written = frame.len() as u64;
            }
            file.sync_all()?;
        }
        fs::rename(&tmp, &self.path)?;

        let before = state.len;
        state.journal = Some(OpenOptions::new().read(true).append(true).open(&self.path)?);
        state.len = written;
        state.frames = usize::from(written > 0);

        debug!(path = %self.path.display(), before, after = written, "Compacted journal");
        Ok(())
    }

    fn close(&self) -> Result<()> {
        let open = self.state.lock().journal.is_some();
        if open && self.config.compact_on_close {
            self.compact()?;
        }

        if let Some(journal) = self.state.lock().journal.take() {
            journal.sync_all()?;
            info!(path = %self.path.display(), "Closed journal");
        }
        Ok(())
    }

    fn read<T>(&self, f: impl FnOnce(&BTreeMap<Key, Bytes>) -> T) -> Result<T> {
        let state = self.state.lock();
        if state.journal.is_none() {
            return Err(StoreError::Closed);
        }
        Ok(f(&state.entries))
    }
}

fn encode_frame(ops: &[BatchOp]) -> Result<Vec<u8>> {
    let payload = serde_ipld_dagcbor::to_vec(ops)?;
    let len = u32::try_from(payload.len())
        .map_err(|_| StoreError::Serialization("batch exceeds 4 GiB".to_string()))?;

    let mut frame = Vec::with_capacity(FRAME_HEADER + payload.len());
    frame.extend_from_slice(&len.to_le_bytes());
    frame.extend_from_slice(blake3::hash(&payload).as_bytes());
    frame.extend_from_slice(&payload);
    Ok(frame)
}

fn write_frame(journal: &mut File, frame: &[u8], sync: bool) -> std::io::Result<()> {
    journal.write_all(frame)?;
    if sync {
        journal.sync_data()?;
    }
    Ok(())
}

/// Apply every intact frame; returns the valid length and the frame count
fn replay(data: &[u8], entries: &mut BTreeMap<Key, Bytes>) -> Result<(usize, usize)> {
    let mut offset = 0;
    let mut frames = 0;

    while offset < data.len() {
        let rest = &data[offset..];
        if rest.len() < FRAME_HEADER {
            break;
        }

        let len = u32::from_le_bytes([rest[0], rest[1], rest[2], rest[3]]) as usize;
        let end = FRAME_HEADER + len;
        if rest.len() < end {
            break;
        }

        let payload = &rest[FRAME_HEADER..end];
        if blake3::hash(payload).as_bytes()[..] != rest[4..FRAME_HEADER] {
            if rest.len() == end {
                break;
            }
            return Err(StoreError::Corrupt(format!(
                "checksum mismatch in frame {} at offset {}",
                frames, offset
            )));
        }

        let ops: Vec<BatchOp> = decode_cbor(payload).map_err(|e| {
            StoreError::Corrupt(format!("frame {} at offset {}: {}", frames, offset, e))
        })?;
        apply(entries, ops);

        offset += end;
        frames += 1;
    }

    Ok((offset, frames))
}

#[async_trait]
impl Datastore for FileDatastore {
    async fn get(&self, key: &Key) -> Result<Bytes> {
        self.inner
            .read(|entries| entries.get(key).cloned())?
            .ok_or_else(|| StoreError::NotFound(key.clone()))
    }

    async fn has(&self, key: &Key) -> Result<bool> {
        self.inner.read(|entries| entries.contains_key(key))
    }

    async fn query(&self, prefix: &Key) -> Result<Vec<(Key, Bytes)>> {
        self.inner.read(|entries| {
            descendants(entries, prefix)
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect()
        })
    }

    async fn commit(&self, batch: Batch) -> Result<()> {
        self.write(move |inner| inner.commit(batch)).await
    }

    async fn sync(&self) -> Result<()> {
        self.write(|inner| inner.sync()).await
    }

    async fn close(&self) -> Result<()> {
        self.write(|inner| inner.close()).await
    }
}
