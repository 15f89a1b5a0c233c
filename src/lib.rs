//! # bloomd
//!
//! Filter manager for a networked bloom filter service: a registry of
//! named, disk-backed probabilistic set-membership filters shared by many
//! concurrent request handlers.
//!
//! ## Architecture
//!
//! - **Domain Layer** (`domain/`): pure filter logic, no I/O
//!   - `BloomFilter`: the probabilistic data structure
//!   - parameter math and murmur3 double hashing
//! - **Storage Layer** (`storage`): `StoredFilter`, a filter backed by a
//!   `bloomd.<name>` directory with an atomically rewritten snapshot;
//!   supports close/re-open (unmap) and destroy
//! - **Manager Layer** (`manager`): `FilterManager`, the concurrency and
//!   lifecycle core: reference-counted handles, reader/writer exclusion
//!   per filter, the hot set for the background flusher, create
//!   serialization, and startup discovery
//! - **Configuration** (`config`): validated manager and filter parameters
//! - **Metrics** (`metrics`): atomic operation counters
//!
//! The wire protocol, command dispatch, and the periodic flusher that
//! drains the hot set live outside this crate.
//!
//! ## Invariants
//!
//! - A filter is reachable from the registry iff its reference count is
//!   positive; the count reaching zero is the unique destruction trigger.
//! - A keyed batch is atomic against drop and unmap, and its output
//!   preserves input order.
//! - `contains` never reports a false negative for an added key.
//!
//! ## Usage Example
//!
//! ```ignore
//! use bloomd::{FilterManager, ManagerConfig};
//!
//! let mgr = FilterManager::new(ManagerConfig::new("/var/lib/bloomd"));
//! mgr.create_filter("users", None)?;
//!
//! let added = mgr.set_keys("users", &["alice", "bob"])?;
//! let found = mgr.check_keys("users", &["alice", "carol"])?;
//!
//! for name in mgr.drain_hot_filters() {
//!     mgr.flush_filter(&name)?;
//! }
//! ```

pub mod config;
pub mod domain;
pub mod error;
pub mod manager;
pub mod metrics;
pub mod storage;

// Re-exports for convenience
pub use config::{FilterParams, ManagerConfig};
pub use domain::BloomFilter;
pub use error::{FilterError, ManagerError};
pub use manager::FilterManager;
pub use metrics::{Metrics, MetricsSnapshot};
pub use storage::StoredFilter;
