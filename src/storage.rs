//! Persisted filters: the on-disk representation behind each managed name.
//!
//! Each filter owns one directory, `<data_dir>/bloomd.<name>`, holding a
//! bincode snapshot of the bit array. The snapshot is rewritten atomically
//! on flush (temp file, sync, rename), so a crash mid-write leaves the
//! previous snapshot intact.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use parking_lot::RwLock;
use tracing::{debug, info};

use crate::config::FilterParams;
use crate::domain::BloomFilter;
use crate::error::FilterError;

/// Prefix of every filter directory under the data dir.
pub const FOLDER_PREFIX: &str = "bloomd.";

/// Snapshot file inside each filter directory.
const SNAPSHOT_FILE: &str = "filter.bin";

/// A bloom filter backed by a directory on disk.
///
/// The in-memory bit array can be released with [`close`](Self::close)
/// and is faulted back in lazily by the next keyed operation.
/// [`destroy`](Self::destroy) ends the filter's life without touching its
/// on-disk layout; [`purge`](Self::purge) removes the layout as well.
///
/// Mutating entry points serialize through an internal lock, so shared
/// references stay sound while a flush is writing the snapshot.
pub struct StoredFilter {
    name: String,
    dir: PathBuf,
    params: FilterParams,
    state: RwLock<FilterState>,
}

struct FilterState {
    bloom: Option<BloomFilter>,
    dirty: bool,
    destroyed: bool,
}

impl StoredFilter {
    /// Open or create the filter named `name` under `data_dir`.
    ///
    /// An existing snapshot wins over `params`: the serialized geometry is
    /// reconstructed as-is. With `create_if_absent`, a missing filter gets
    /// a fresh directory and an initial snapshot; without it, a missing
    /// filter is an error.
    pub fn init(
        params: FilterParams,
        name: &str,
        data_dir: &Path,
        create_if_absent: bool,
    ) -> Result<Self, FilterError> {
        params.validate()?;

        let dir = data_dir.join(format!("{FOLDER_PREFIX}{name}"));
        let snapshot = dir.join(SNAPSHOT_FILE);

        let bloom = if snapshot.is_file() {
            let bytes = fs::read(&snapshot)?;
            let bloom = BloomFilter::from_bytes(&bytes)?;
            debug!(
                filter = name,
                bits = bloom.size_bits(),
                keys = bloom.len(),
                "opened existing filter"
            );
            bloom
        } else if create_if_absent {
            fs::create_dir_all(&dir)?;
            let bloom = BloomFilter::with_params(&params);
            write_snapshot(&dir, &bloom)?;
            info!(
                filter = name,
                capacity = params.capacity,
                bits = bloom.size_bits(),
                "created filter"
            );
            bloom
        } else {
            return Err(FilterError::MissingOnDisk(name.to_string()));
        };

        Ok(Self {
            name: name.to_string(),
            dir,
            params,
            state: RwLock::new(FilterState {
                bloom: Some(bloom),
                dirty: false,
                destroyed: false,
            }),
        })
    }

    /// Name of the filter, without the directory prefix.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Parameters the filter was opened with.
    pub fn params(&self) -> FilterParams {
        self.params
    }

    /// Directory holding the filter's on-disk state.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Number of keys added so far.
    pub fn key_count(&self) -> Result<usize, FilterError> {
        {
            let state = self.state.read();
            if state.destroyed {
                return Err(FilterError::Destroyed(self.name.clone()));
            }
            if let Some(bloom) = &state.bloom {
                return Ok(bloom.len());
            }
        }

        let mut state = self.state.write();
        let bloom = self.fault_in(&mut state)?;
        Ok(bloom.len())
    }

    /// Probe for a key, re-opening the snapshot if the filter was closed.
    pub fn contains(&self, key: &[u8]) -> Result<bool, FilterError> {
        {
            let state = self.state.read();
            if state.destroyed {
                return Err(FilterError::Destroyed(self.name.clone()));
            }
            if let Some(bloom) = &state.bloom {
                return Ok(bloom.contains(key));
            }
        }

        let mut state = self.state.write();
        let bloom = self.fault_in(&mut state)?;
        Ok(bloom.contains(key))
    }

    /// Add a key; `true` when it was not already present.
    pub fn add(&self, key: &[u8]) -> Result<bool, FilterError> {
        let mut state = self.state.write();
        let added = self.fault_in(&mut state)?.add(key);
        if added {
            state.dirty = true;
        }
        Ok(added)
    }

    /// Write the snapshot if there are unflushed adds.
    pub fn flush(&self) -> Result<(), FilterError> {
        let mut state = self.state.write();
        if state.destroyed {
            return Err(FilterError::Destroyed(self.name.clone()));
        }
        self.flush_locked(&mut state)
    }

    /// Flush and release the in-memory bit array.
    ///
    /// The filter stays on disk and re-opens on the next keyed operation.
    pub fn close(&self) -> Result<(), FilterError> {
        let mut state = self.state.write();
        if state.destroyed {
            return Err(FilterError::Destroyed(self.name.clone()));
        }
        self.flush_locked(&mut state)?;
        state.bloom = None;
        Ok(())
    }

    /// Close and permanently retire this filter.
    ///
    /// The on-disk directory is left in place; [`purge`](Self::purge) is
    /// the explicit disk-removal operation. Idempotent.
    pub fn destroy(&self) -> Result<(), FilterError> {
        let mut state = self.state.write();
        if state.destroyed {
            return Ok(());
        }
        self.flush_locked(&mut state)?;
        state.bloom = None;
        state.destroyed = true;
        Ok(())
    }

    /// Destroy the filter and delete its directory from disk.
    pub fn purge(&self) -> Result<(), FilterError> {
        let mut state = self.state.write();
        state.bloom = None;
        state.dirty = false;
        state.destroyed = true;
        if self.dir.exists() {
            fs::remove_dir_all(&self.dir)?;
        }
        Ok(())
    }

    fn flush_locked(&self, state: &mut FilterState) -> Result<(), FilterError> {
        if !state.dirty {
            return Ok(());
        }
        if let Some(bloom) = &state.bloom {
            write_snapshot(&self.dir, bloom)?;
        }
        state.dirty = false;
        Ok(())
    }

    fn fault_in<'a>(&self, state: &'a mut FilterState) -> Result<&'a mut BloomFilter, FilterError> {
        if state.destroyed {
            return Err(FilterError::Destroyed(self.name.clone()));
        }
        match &mut state.bloom {
            Some(bloom) => Ok(bloom),
            slot @ None => {
                let bytes = fs::read(self.dir.join(SNAPSHOT_FILE))?;
                let bloom = BloomFilter::from_bytes(&bytes)?;
                debug!(filter = %self.name, "re-opened filter");
                Ok(slot.insert(bloom))
            }
        }
    }
}

fn write_snapshot(dir: &Path, bloom: &BloomFilter) -> Result<(), FilterError> {
    let bytes = bloom.to_bytes()?;

    let final_path = dir.join(SNAPSHOT_FILE);
    let temp_path = final_path.with_extension("tmp");

    let mut file = fs::File::create(&temp_path)?;
    file.write_all(&bytes)?;
    file.sync_all()?;

    fs::rename(&temp_path, &final_path)?;
    Ok(())
}
