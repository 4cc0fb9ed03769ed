//! Storage layer for Turnkeeper.
//!
//! All scheduler state goes through [`StateStore::transact`], one serialized
//! read-modify-write at a time. Two implementations:
//! - [`SqliteStore`]: append-only JSONL journal (source of truth) plus an SQLite index
//! - [`MemoryStore`]: in-process, for tests
//!
//! # Example
//!
//! ```ignore
//! use turnkeeper::store::{SqliteStore, StateStore};
//!
//! let store = SqliteStore::open(&state_dir, Path::new("/path/to/project"))?;
//! store.transact(|ledger| {
//!     ledger.modes.warp_enabled = true;
//!     Ok(())
//! })?;
//! ```

mod memory;
mod sqlite;
mod traits;

pub use memory::MemoryStore;
pub use sqlite::{COMPACT_AFTER_LINES, SqliteStore, compute_project_hash};
pub use traits::{Ledger, StateStore};
