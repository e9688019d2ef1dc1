//! Core type definitions for the Satchel file store.
//!
//! Everything the engine crates agree on lives here: identifier newtypes,
//! the file-tree metadata record, and the sibling-name arithmetic used for
//! deterministic conflict renames.

mod ids;
mod metadata;
mod name;

pub use ids::{Cursor, FileId};
pub use metadata::{FileKind, FileMetadata, Side};
pub use name::{unique_sibling_name, NameComponents, CONFLICT_MARKER};
