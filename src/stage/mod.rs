//! Stage pointer subsystem
//!
//! Maps every record identity to the version bound on DRAFT and on LIVE,
//! and keeps the history of those bindings.

mod table;

pub use table::{Binding, StagePointers, StageTable};
