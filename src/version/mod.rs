//! Version subsystem
//!
//! Per-record, append-only version history:
//! - `VersionNumber` - per-record number, allocated as max + 1
//! - `Sequence` - global logical clock for writes and bindings
//! - `Version` - immutable field snapshot
//! - `VersionHistory` - ordered versions of one record
//! - `VersionStore` - histories keyed by record identity

mod errors;
mod history;
mod number;
mod snapshot;
mod store;

pub use errors::{VersionError, VersionResult};
pub use history::VersionHistory;
pub use number::{Sequence, VersionNumber};
pub use snapshot::Version;
pub use store::VersionStore;
