//! Named byte slots that survive restarts.
//!
//! Slots are written whole: readers either see the previous contents or the new ones. The in-memory
//! implementation can simulate a power loss that leaves a slot half written, which is how the
//! channel records are tested against torn writes.

use std::{
  collections::HashMap,
  fmt::Debug,
  fs::{self, File},
  io::{self, Write},
  path::PathBuf,
  sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use crate::error::RtsResult;

pub trait Storage: Debug + Send {
  /// Read the slot, `None` if it has never been written.
  fn read(&self, key: &str) -> RtsResult<Option<Vec<u8>>>;

  /// Replace the contents of the slot.
  fn write(&mut self, key: &str, data: &[u8]) -> RtsResult<()>;
}

/// Stores every slot as a file in a directory.
///
/// A write goes to a temporary file which is synced and then renamed over the slot. The directory
/// is synced after the rename, so the new slot is on disk before the write returns.
#[derive(Debug, Clone)]
pub struct FileStorage {
  root: PathBuf,
}

impl FileStorage {
  pub fn open(root: impl Into<PathBuf>) -> RtsResult<FileStorage> {
    let root = root.into();
    fs::create_dir_all(&root)?;
    log::debug!("Opened storage at {}", root.display());
    Ok(FileStorage { root })
  }

  fn path(&self, key: &str) -> PathBuf {
    self.root.join(key)
  }
}

impl Storage for FileStorage {
  fn read(&self, key: &str) -> RtsResult<Option<Vec<u8>>> {
    match fs::read(self.path(key)) {
      Ok(data) => Ok(Some(data)),
      Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
      Err(err) => Err(err.into()),
    }
  }

  fn write(&mut self, key: &str, data: &[u8]) -> RtsResult<()> {
    let path = self.path(key);
    let temp_path = self.path(&format!("{key}.tmp"));

    let mut file = File::create(&temp_path)?;
    file.write_all(data)?;
    file.sync_all()?;
    fs::rename(&temp_path, &path)?;
    // the rename itself only lasts once the directory entry is on disk
    File::open(&self.root)?.sync_all()?;

    Ok(())
  }
}

#[derive(Debug, Default)]
struct MemorySlots {
  slots: HashMap<String, Vec<u8>>,
  /// If set, the next write only stores this many bytes and then fails
  torn_write: Option<usize>,
  writes: usize,
}

/// Keeps slots in memory. Clones share the same slots.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
  inner: Arc<Mutex<MemorySlots>>,
}

impl MemoryStorage {
  pub fn new() -> Self {
    MemoryStorage::default()
  }

  fn lock(&self) -> MutexGuard<'_, MemorySlots> {
    self.inner.lock().unwrap_or_else(PoisonError::into_inner)
  }

  /// The next write stores only its first `written` bytes and then reports an error, like a
  /// device losing power halfway through a flash write.
  pub fn simulate_power_loss(&self, written: usize) {
    self.lock().torn_write = Some(written);
  }

  pub fn slot(&self, key: &str) -> Option<Vec<u8>> {
    self.lock().slots.get(key).cloned()
  }

  /// Number of writes attempted so far, including failed ones
  pub fn writes(&self) -> usize {
    self.lock().writes
  }
}

impl Storage for MemoryStorage {
  fn read(&self, key: &str) -> RtsResult<Option<Vec<u8>>> {
    Ok(self.slot(key))
  }

  fn write(&mut self, key: &str, data: &[u8]) -> RtsResult<()> {
    let mut inner = self.lock();
    inner.writes += 1;

    if let Some(written) = inner.torn_write.take() {
      let partial = data[..written.min(data.len())].to_vec();
      inner.slots.insert(key.to_owned(), partial);
      return Err(io::Error::new(io::ErrorKind::Other, "simulated power loss").into());
    }

    inner.slots.insert(key.to_owned(), data.to_vec());
    Ok(())
  }
}
