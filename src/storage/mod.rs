//! Storage subsystem
//!
//! Holds the engine's complete state in memory and, when a data directory is
//! configured, persists it as one checksummed file after every committed
//! transaction.
//!
//! # Guarantees
//!
//! - A checksum mismatch on load is corruption and FATAL
//! - Saves are atomic: temp file, fsync, rename, directory fsync
//! - Deleting a record only unbinds stage pointers; history is kept

mod checksum;
mod errors;
mod file;
mod state;
mod view;

pub use checksum::{compute_checksum, verify_checksum};
pub use errors::{StorageError, StorageResult};
pub use file::StateFile;
pub use state::StoreState;
pub use view::StageView;
