//! The filter manager: named-filter registry, reference-counted handles,
//! and the hot set consumed by the background flusher.
//!
//! Lock order is create serializer, then registry lock, then handle
//! rwlock, then hot lock. Every call site that holds more than one
//! acquires them in that order.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tracing::{error, info, warn};

use crate::config::{FilterParams, ManagerConfig};
use crate::error::{FilterError, ManagerError};
use crate::metrics::Metrics;
use crate::storage::{StoredFilter, FOLDER_PREFIX};

/// One managed filter plus the lock that guards keyed access to it.
///
/// The rwlock makes each batch atomic against unmap and drop: readers
/// share it for check and flush, writers take it for set and unmap.
struct FilterHandle {
    filter: RwLock<StoredFilter>,
}

/// Registry slot for one filter.
///
/// `active` and `refs` are guarded by the registry lock, never by the
/// handle's rwlock. A filter stays in the registry while `refs > 0`;
/// the transition to zero is the unique destruction trigger.
struct FilterEntry {
    active: bool,
    refs: i64,
    handle: Arc<FilterHandle>,
}

/// Owns every named filter, mediating concurrent access and lifecycle.
///
/// Construction discovers filters already present on disk; dropping the
/// manager closes and destroys every filter still registered (all callers
/// must have quiesced by then).
pub struct FilterManager {
    config: ManagerConfig,
    /// Name to entry. Critical sections are pointer and counter work only.
    filters: Mutex<HashMap<String, FilterEntry>>,
    /// Names touched by recent operations, drained by the flusher.
    hot_filters: Mutex<HashSet<String>>,
    /// Serializes create so racing creates of one name see one winner.
    create_lock: Mutex<()>,
    metrics: Metrics,
}

impl FilterManager {
    /// Build a manager over `config.data_dir`, loading any filters already
    /// present on disk.
    ///
    /// Discovery runs before the manager is shared; a failed directory
    /// scan is logged and yields an empty manager, and individual filters
    /// that fail to load are logged and skipped.
    pub fn new(config: ManagerConfig) -> Self {
        let mgr = Self {
            filters: Mutex::new(HashMap::new()),
            hot_filters: Mutex::new(HashSet::new()),
            create_lock: Mutex::new(()),
            metrics: Metrics::new(),
            config,
        };
        mgr.load_existing_filters();
        mgr
    }

    /// Number of registered filters, active or draining.
    pub fn num_filters(&self) -> usize {
        self.filters.lock().len()
    }

    /// Configuration the manager was constructed with.
    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    /// Operation counters.
    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// Probe `keys` against the named filter.
    ///
    /// The output has one boolean per key, in input order; `true` means
    /// possibly present. The batch is atomic against drop and unmap but
    /// not against interleaved sets from other callers.
    pub fn check_keys<K: AsRef<[u8]>>(
        &self,
        filter_name: &str,
        keys: &[K],
    ) -> Result<Vec<bool>, ManagerError> {
        let handle = self
            .take_filter(filter_name)
            .ok_or_else(|| ManagerError::NoSuchFilter(filter_name.to_string()))?;

        let outcome = {
            let filter = handle.filter.read();
            let mut result = Vec::with_capacity(keys.len());
            let mut failure = None;
            for key in keys {
                match filter.contains(key.as_ref()) {
                    Ok(found) => result.push(found),
                    Err(e) => {
                        failure = Some(e);
                        break;
                    }
                }
            }
            match failure {
                None => Ok(result),
                Some(e) => Err(e),
            }
        };

        if outcome.is_ok() {
            self.add_hot_filter(filter_name);
        }
        self.return_filter(filter_name);

        let result = outcome.map_err(|e| ManagerError::internal(filter_name, e))?;
        self.metrics.record_check(result.len());
        Ok(result)
    }

    /// Add `keys` to the named filter.
    ///
    /// The output has one boolean per key, in input order; `true` means
    /// the key was newly added, `false` that it was already present or
    /// collides in the probabilistic sense.
    pub fn set_keys<K: AsRef<[u8]>>(
        &self,
        filter_name: &str,
        keys: &[K],
    ) -> Result<Vec<bool>, ManagerError> {
        let handle = self
            .take_filter(filter_name)
            .ok_or_else(|| ManagerError::NoSuchFilter(filter_name.to_string()))?;

        let outcome = {
            let filter = handle.filter.write();
            let mut result = Vec::with_capacity(keys.len());
            let mut failure = None;
            for key in keys {
                match filter.add(key.as_ref()) {
                    Ok(added) => result.push(added),
                    Err(e) => {
                        failure = Some(e);
                        break;
                    }
                }
            }
            match failure {
                None => Ok(result),
                Some(e) => Err(e),
            }
        };

        if outcome.is_ok() {
            self.add_hot_filter(filter_name);
        }
        self.return_filter(filter_name);

        let result = outcome.map_err(|e| ManagerError::internal(filter_name, e))?;
        self.metrics.record_set(result.len());
        Ok(result)
    }

    /// Flush the named filter's snapshot to disk.
    ///
    /// Runs in read mode: the underlying filter serializes the write
    /// through its own internal discipline, so concurrent checks proceed.
    pub fn flush_filter(&self, filter_name: &str) -> Result<(), ManagerError> {
        let handle = self
            .take_filter(filter_name)
            .ok_or_else(|| ManagerError::NoSuchFilter(filter_name.to_string()))?;

        let outcome = {
            let filter = handle.filter.read();
            filter.flush()
        };

        if outcome.is_ok() {
            self.add_hot_filter(filter_name);
        }
        self.return_filter(filter_name);

        outcome.map_err(|e| ManagerError::internal(filter_name, e))?;
        self.metrics.record_flush();
        Ok(())
    }

    /// Release the named filter's in-memory buffers.
    ///
    /// The filter stays registered and on disk; the next keyed operation
    /// re-opens it lazily.
    pub fn unmap_filter(&self, filter_name: &str) -> Result<(), ManagerError> {
        let handle = self
            .take_filter(filter_name)
            .ok_or_else(|| ManagerError::NoSuchFilter(filter_name.to_string()))?;

        let outcome = {
            let filter = handle.filter.write();
            filter.close()
        };

        self.return_filter(filter_name);

        outcome.map_err(|e| ManagerError::internal(filter_name, e))?;
        self.metrics.record_unmap();
        Ok(())
    }

    /// Create a new filter.
    ///
    /// `custom_params`, when given, override the manager defaults for this
    /// filter only. Underlying initialization may create the on-disk
    /// folder and initial snapshot.
    pub fn create_filter(
        &self,
        filter_name: &str,
        custom_params: Option<FilterParams>,
    ) -> Result<(), ManagerError> {
        let _create = self.create_lock.lock();

        // Existence probe only. take_filter would bump the ref count and
        // skip inactive entries; a draining filter still owns its name.
        let exists = self.filters.lock().contains_key(filter_name);
        if exists {
            return Err(ManagerError::FilterExists(filter_name.to_string()));
        }

        let params = custom_params.unwrap_or(self.config.default_params);
        self.add_filter(filter_name, params)
            .map_err(|e| ManagerError::CreateFailed {
                name: filter_name.to_string(),
                source: e,
            })?;

        self.metrics.record_create();
        Ok(())
    }

    /// Drop the named filter.
    ///
    /// The filter is marked inactive immediately, so new takes fail;
    /// in-flight operations finish under their existing references, and
    /// the last one to return triggers destruction.
    pub fn drop_filter(&self, filter_name: &str) -> Result<(), ManagerError> {
        let _handle = self
            .take_filter(filter_name)
            .ok_or_else(|| ManagerError::NoSuchFilter(filter_name.to_string()))?;

        {
            let mut filters = self.filters.lock();
            if let Some(entry) = filters.get_mut(filter_name) {
                // Shed the registry's own reference along with ours.
                entry.refs -= 1;
                entry.active = false;
            }
        }

        self.return_filter(filter_name);
        self.metrics.record_drop();
        Ok(())
    }

    /// Swap the hot set for an empty one and hand back the drained names.
    ///
    /// This is the consumer primitive for the periodic flusher.
    pub fn drain_hot_filters(&self) -> HashSet<String> {
        std::mem::take(&mut *self.hot_filters.lock())
    }

    /// Resolve a name to its handle and acquire a reference.
    ///
    /// Fails when the name is absent or the filter is draining after a
    /// drop. The lookup and increment are one critical section, so a
    /// concurrent drop cannot race the acquisition.
    fn take_filter(&self, filter_name: &str) -> Option<Arc<FilterHandle>> {
        let mut filters = self.filters.lock();
        let entry = filters.get_mut(filter_name)?;
        if !entry.active {
            return None;
        }
        entry.refs += 1;
        Some(Arc::clone(&entry.handle))
    }

    /// Release a reference acquired by `take_filter`.
    ///
    /// The last reference unlinks the entry under the registry lock and
    /// destroys the filter after the lock is released.
    fn return_filter(&self, filter_name: &str) {
        let removed = {
            let mut filters = self.filters.lock();
            match filters.get_mut(filter_name) {
                Some(entry) => {
                    entry.refs -= 1;
                    if entry.refs <= 0 {
                        filters.remove(filter_name)
                    } else {
                        None
                    }
                }
                None => {
                    // Callers hold a reference for the duration of their
                    // operation, so the name must still resolve.
                    error!(
                        filter = filter_name,
                        "returned a filter that is no longer registered"
                    );
                    None
                }
            }
        };

        if let Some(entry) = removed {
            delete_filter(filter_name, &entry.handle);
        }
    }

    /// Mark a filter as recently touched.
    fn add_hot_filter(&self, filter_name: &str) {
        self.hot_filters.lock().insert(filter_name.to_string());
        self.metrics.record_hot_mark();
    }

    /// Initialize a filter and register it with one reference.
    ///
    /// Shared by create and discovery. A failed initialization leaves the
    /// registry untouched; the partial filter is dropped.
    fn add_filter(&self, filter_name: &str, params: FilterParams) -> Result<(), FilterError> {
        let filter = StoredFilter::init(params, filter_name, &self.config.data_dir, true)?;

        let entry = FilterEntry {
            active: true,
            refs: 1,
            handle: Arc::new(FilterHandle {
                filter: RwLock::new(filter),
            }),
        };
        self.filters.lock().insert(filter_name.to_string(), entry);
        Ok(())
    }

    /// Load filters left on disk by a previous run.
    ///
    /// Not thread safe; runs during construction with exclusive ownership.
    fn load_existing_filters(&self) {
        let entries = match std::fs::read_dir(&self.config.data_dir) {
            Ok(entries) => entries,
            Err(e) => {
                error!(
                    dir = %self.config.data_dir.display(),
                    error = %e,
                    "failed to scan data directory for existing filters"
                );
                return;
            }
        };

        let mut found = 0usize;
        for entry in entries {
            let Ok(entry) = entry else { continue };
            if !entry.path().is_dir() {
                continue;
            }
            let folder_name = entry.file_name();
            let Some(folder_name) = folder_name.to_str() else {
                continue;
            };
            if folder_name.len() < 8 || !folder_name.starts_with(FOLDER_PREFIX) {
                continue;
            }

            let filter_name = &folder_name[FOLDER_PREFIX.len()..];
            match self.add_filter(filter_name, self.config.default_params) {
                Ok(()) => found += 1,
                Err(e) => {
                    warn!(
                        filter = filter_name,
                        error = %e,
                        "skipping filter that failed to load"
                    );
                }
            }
        }

        info!(count = found, "discovered existing filters");
    }
}

impl Drop for FilterManager {
    /// Teardown: close and destroy every registered filter.
    ///
    /// Assumes all external callers have quiesced; a surviving reference
    /// at this point is a bug in the caller.
    fn drop(&mut self) {
        let filters = self.filters.get_mut();
        for (name, entry) in filters.drain() {
            delete_filter(&name, &entry.handle);
        }
        self.hot_filters.get_mut().clear();
    }
}

/// Close and destroy a filter whose last reference was released.
///
/// Runs outside the registry lock. Destruction failures are logged and
/// the handle is freed anyway; retrying has no defined semantics.
fn delete_filter(name: &str, handle: &FilterHandle) {
    let filter = handle.filter.write();

    if let Err(e) = filter.close() {
        warn!(filter = name, error = %e, "failed to close filter during destruction");
    }
    if let Err(e) = filter.destroy() {
        warn!(filter = name, error = %e, "failed to destroy filter; releasing handle anyway");
    }
}
