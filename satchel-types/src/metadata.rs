//! File-tree metadata records.
//!
//! One `FileMetadata` per entry. Deletion is a tombstone flag, not removal:
//! tombstoned entries stay in the store so deletions propagate across
//! devices, and are only removed by an explicit purge.

use crate::FileId;
use serde::{Deserialize, Serialize};

/// Whether an entry is a document (has content) or a folder (has children).
/// Immutable after creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FileKind {
    Document,
    Folder,
}

/// Which side produced the current version of an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Side {
    Local,
    Remote,
}

/// One file-tree entry.
///
/// The parent graph is a forest: every non-root entry has exactly one parent
/// reachable up to the root, and the root references itself as its parent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileMetadata {
    /// Globally unique, immutable identifier.
    pub id: FileId,
    /// Containing folder; the root entry references itself.
    pub parent: FileId,
    /// Human-readable name, unique among non-deleted siblings (case-sensitive).
    pub name: String,
    /// Document or folder.
    pub kind: FileKind,
    /// Tombstone flag. Once set, the entry is logically absent but retained.
    pub deleted: bool,
    /// Monotonically advancing marker, bumped on every content or metadata
    /// change. Used to detect divergence between local and remote copies.
    pub content_version: u64,
    /// Advances only when document bytes change. Distinguishes a rename
    /// from an edit when classifying divergence; always 0 for folders.
    pub content_revision: u64,
    /// Origin of the current version, used for conflict context.
    pub last_modified_by: Side,
}

impl FileMetadata {
    /// Creates the root folder for an account. The root is its own parent.
    #[must_use]
    pub fn root(name: impl Into<String>) -> Self {
        let id = FileId::new();
        Self {
            id,
            parent: id,
            name: name.into(),
            kind: FileKind::Folder,
            deleted: false,
            content_version: 1,
            content_revision: 0,
            last_modified_by: Side::Local,
        }
    }

    /// Creates a new entry under `parent`.
    #[must_use]
    pub fn new(parent: FileId, name: impl Into<String>, kind: FileKind) -> Self {
        Self {
            id: FileId::new(),
            parent,
            name: name.into(),
            kind,
            deleted: false,
            content_version: 1,
            content_revision: if kind == FileKind::Document { 1 } else { 0 },
            last_modified_by: Side::Local,
        }
    }

    /// True for the root entry (self-parented).
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.id == self.parent
    }

    /// True for folders.
    #[must_use]
    pub fn is_folder(&self) -> bool {
        self.kind == FileKind::Folder
    }

    /// True for documents.
    #[must_use]
    pub fn is_document(&self) -> bool {
        self.kind == FileKind::Document
    }

    /// Advances the version marker and records which side made the change.
    /// For metadata-only changes (rename, move, tombstone).
    pub fn bump_version(&mut self, side: Side) {
        self.content_version += 1;
        self.last_modified_by = side;
    }

    /// Advances both markers; for document content writes.
    pub fn bump_content(&mut self, side: Side) {
        self.content_version += 1;
        self.content_revision += 1;
        self.last_modified_by = side;
    }
}
