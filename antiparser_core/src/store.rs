use crate::error::AntiparserError;
use crate::snapshot::Snapshot;
use bincode::error::{DecodeError, EncodeError};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

/// Errors raised while persisting snapshots or payload files.
#[derive(Error, Debug)]
pub enum StoreError {
    /// The requested snapshot ID is not in the store's index.
    #[error("Snapshot ID {0} not found in store index")]
    SnapshotNotFound(usize),

    /// Reading or writing the filesystem failed.
    #[error("Store I/O error: {0}")]
    Io(String),

    /// A snapshot or the index could not be encoded.
    #[error("Store serialization error: {0}")]
    Serialization(String),

    /// A snapshot file or the index could not be decoded.
    #[error("Store deserialization error: {0}")]
    Deserialization(String),

    /// A decoded snapshot does not describe a valid container.
    #[error("Stored snapshot is invalid: {0}")]
    Invalid(#[from] AntiparserError),
}

impl From<std::io::Error> for StoreError {
    fn from(err: std::io::Error) -> Self {
        StoreError::Io(err.to_string())
    }
}
impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Deserialization(format!("JSON operation error: {}", err))
    }
}
impl From<EncodeError> for StoreError {
    fn from(err: EncodeError) -> Self {
        StoreError::Serialization(format!("Bincode encoding error: {}", err))
    }
}
impl From<DecodeError> for StoreError {
    fn from(err: DecodeError) -> Self {
        StoreError::Deserialization(format!("Bincode decoding error: {}", err))
    }
}

/// Index entry describing one stored snapshot.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct SnapshotEntry {
    /// File name without extension, e.g. `snapshot_00000003`.
    pub file_stem: String,
    /// Free-form note from the caller, such as the iteration that produced it.
    pub description: String,
    /// Hex MD5 of the recorded payload.
    pub payload_md5: String,
    /// Payload length in bytes.
    pub payload_len: usize,
    /// Number of objects recorded in the snapshot.
    pub object_count: usize,
}

/// A directory of bincode-encoded snapshots plus a JSON index.
///
/// The index lives in `snapshot_index.json` and is rewritten after every save,
/// so a store reopened later sees every snapshot written before.
#[derive(Debug)]
pub struct SnapshotStore {
    dir_path: PathBuf,
    index_file_path: PathBuf,
    entries: Vec<SnapshotEntry>,
}

impl SnapshotStore {
    const INDEX_FILENAME: &'static str = "snapshot_index.json";
    const SNAPSHOT_FILE_EXTENSION: &'static str = "apsnap";

    /// Opens the store at `dir_path`, creating the directory and an empty index if needed.
    ///
    /// An existing index is loaded, so snapshots saved by earlier runs stay
    /// addressable under their old IDs.
    ///
    /// # Arguments
    /// * `dir_path`: Directory holding the index and the snapshot files.
    ///
    /// # Returns
    /// The opened store, or `StoreError::Io` if the path exists but is not a
    /// directory, or `StoreError::Deserialization` if the index is corrupt.
    pub fn open(dir_path: PathBuf) -> Result<Self, StoreError> {
        if !dir_path.exists() {
            fs::create_dir_all(&dir_path).map_err(|e| {
                StoreError::Io(format!(
                    "Failed to create snapshot directory at {:?}: {}",
                    dir_path, e
                ))
            })?;
        } else if !dir_path.is_dir() {
            return Err(StoreError::Io(format!(
                "Snapshot path {:?} exists but is not a directory",
                dir_path
            )));
        }

        let index_file_path = dir_path.join(Self::INDEX_FILENAME);
        let mut store = Self {
            dir_path,
            index_file_path,
            entries: Vec::new(),
        };
        store.load_index()?;
        if !store.index_file_path.exists() {
            store.save_index()?;
        }
        debug!(path = ?store.dir_path, snapshots = store.entries.len(), "snapshot store opened");
        Ok(store)
    }

    fn snapshot_path(&self, file_stem: &str) -> PathBuf {
        self.dir_path
            .join(file_stem)
            .with_extension(Self::SNAPSHOT_FILE_EXTENSION)
    }

    fn save_index(&self) -> Result<(), StoreError> {
        let file = File::create(&self.index_file_path).map_err(|e| {
            StoreError::Io(format!(
                "Failed to create or truncate index file {:?}: {}",
                self.index_file_path, e
            ))
        })?;
        serde_json::to_writer_pretty(BufWriter::new(file), &self.entries).map_err(|e| {
            StoreError::Serialization(format!(
                "Failed to serialize snapshot index to JSON for {:?}: {}",
                self.index_file_path, e
            ))
        })?;
        Ok(())
    }

    fn load_index(&mut self) -> Result<(), StoreError> {
        if !self.index_file_path.is_file() {
            self.entries = Vec::new();
            return Ok(());
        }
        let file = File::open(&self.index_file_path)?;
        if file.metadata()?.len() == 0 {
            self.entries = Vec::new();
            return Ok(());
        }
        self.entries = serde_json::from_reader(BufReader::new(file)).map_err(|e| {
            StoreError::Deserialization(format!(
                "Failed to parse JSON from index file {:?}: {}. The file might be corrupted.",
                self.index_file_path, e
            ))
        })?;
        Ok(())
    }

    /// Writes `snapshot` to a new file and records it in the index.
    ///
    /// # Arguments
    /// * `snapshot`: The snapshot to encode with bincode.
    /// * `description`: A free-form note stored in the index entry.
    ///
    /// # Returns
    /// The ID under which the snapshot can be loaded again.
    pub fn save(&mut self, snapshot: &Snapshot, description: &str) -> Result<usize, StoreError> {
        let id = self.entries.len();
        let file_stem = format!("snapshot_{:08}", id);
        let file_path = self.snapshot_path(&file_stem);

        fs::write(&file_path, snapshot.to_bincode()?).map_err(|e| {
            StoreError::Io(format!(
                "Failed to write snapshot file {:?}: {}",
                file_path, e
            ))
        })?;

        self.entries.push(SnapshotEntry {
            file_stem,
            description: description.to_string(),
            payload_md5: format!("{:x}", md5::compute(&snapshot.payload)),
            payload_len: snapshot.payload.len(),
            object_count: snapshot.objects.len(),
        });
        self.save_index()?;
        info!(id, path = ?file_path, "snapshot saved");
        Ok(id)
    }

    /// Reads back the snapshot stored under `id`.
    ///
    /// # Arguments
    /// * `id`: An ID previously returned by [`SnapshotStore::save`].
    ///
    /// # Returns
    /// The decoded snapshot, `StoreError::SnapshotNotFound` for an unknown ID,
    /// or `StoreError::Deserialization` for an empty or undecodable file.
    /// The snapshot is not validated; pass it to
    /// [`crate::snapshot::import_snapshot`] for that.
    pub fn load(&self, id: usize) -> Result<Snapshot, StoreError> {
        let entry = self.entries.get(id).ok_or(StoreError::SnapshotNotFound(id))?;
        let file_path = self.snapshot_path(&entry.file_stem);
        let bytes = fs::read(&file_path).map_err(|e| {
            StoreError::Io(format!(
                "Failed to read snapshot file {:?}: {}",
                file_path, e
            ))
        })?;
        if bytes.is_empty() {
            return Err(StoreError::Deserialization(format!(
                "Snapshot file {:?} is empty, cannot deserialize.",
                file_path
            )));
        }
        Ok(Snapshot::from_bincode(&bytes)?)
    }

    /// Index entries in ID order; an entry's position is its snapshot ID.
    pub fn entries(&self) -> &[SnapshotEntry] {
        &self.entries
    }

    /// Number of snapshots recorded in the index.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Writes a payload to `path` for file-format fuzzing, creating the parent
/// directory if it does not exist yet.
///
/// # Arguments
/// * `path`: Destination file; an existing file is overwritten.
/// * `payload`: The raw bytes, typically [`crate::Container::payload`].
pub fn write_payload(path: &Path, payload: &[u8]) -> Result<(), StoreError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| {
            StoreError::Io(format!(
                "Failed to create payload directory {:?}: {}",
                parent, e
            ))
        })?;
    }
    fs::write(path, payload)
        .map_err(|e| StoreError::Io(format!("Failed to write payload file {:?}: {}", path, e)))?;
    debug!(path = ?path, len = payload.len(), "payload written");
    Ok(())
}
