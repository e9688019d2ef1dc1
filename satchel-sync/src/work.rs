//! Work units and sync outcomes.

use satchel_types::{Cursor, FileId, FileMetadata};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Which way a pending change flows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    /// A local change not yet on the remote.
    PushLocal,
    /// A remote change not yet reflected locally.
    PullRemote,
}

/// What a unit transfers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnitKind {
    /// Structure only: create, rename, move.
    Metadata,
    /// Document bytes (and the metadata that versions them).
    Content,
    /// Tombstone propagation.
    Deletion,
}

/// One pending, directional change for a single file-tree entry.
///
/// Ephemeral: produced per pass, never persisted. An interrupted pass
/// recomputes its queue from durable state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkUnit {
    pub target: FileId,
    pub direction: Direction,
    pub kind: UnitKind,
    /// Both sides changed this id since their last common synced state.
    /// Resolved during execution, not calculation.
    pub conflict: bool,
}

impl fmt::Display for WorkUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let direction = match self.direction {
            Direction::PushLocal => "push",
            Direction::PullRemote => "pull",
        };
        let kind = match self.kind {
            UnitKind::Metadata => "metadata",
            UnitKind::Content => "content",
            UnitKind::Deletion => "deletion",
        };
        let conflict = if self.conflict { " (conflict)" } else { "" };
        write!(f, "{direction} {kind} {}{conflict}", self.target)
    }
}

/// A remote change after name decryption, with its server sequence.
#[derive(Debug, Clone)]
pub struct RemoteEntry {
    pub seq: u64,
    pub metadata: FileMetadata,
}

/// The calculator's output: the ordered unit queue plus the decrypted
/// remote state the executor applies from.
#[derive(Debug, Default)]
pub struct WorkPlan {
    pub units: Vec<WorkUnit>,
    /// Decrypted remote state by id, for every fetched change.
    pub remote: HashMap<FileId, RemoteEntry>,
    /// The fetch's sequence high-water mark.
    pub as_of: Cursor,
}

impl WorkPlan {
    /// True when there is nothing to do.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }
}

/// How the executor resolved a conflicting unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ConflictResolution {
    /// Remote metadata won; the divergent local state was preserved as a
    /// new sibling entry (`None` when local and remote agreed on the
    /// fields, e.g. a move raced a rename without overlap).
    RemoteMetadataKept {
        id: FileId,
        preserved: Option<FileId>,
        preserved_name: Option<String>,
    },
    /// Remote bytes won at the original id; the divergent local bytes were
    /// duplicated into a new sibling document.
    ContentDuplicated {
        id: FileId,
        duplicate: FileId,
        duplicate_name: String,
    },
    /// A deletion raced an edit; the edit won and the tombstone was
    /// cleared.
    Resurrected { id: FileId },
    /// Both sides had tombstoned the entry; nothing to transfer.
    BothDeleted { id: FileId },
}

/// One successfully applied unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Applied {
    pub unit: WorkUnit,
    pub resolution: Option<ConflictResolution>,
}

/// What a sync pass did: every unit applied, every conflict resolution,
/// and where the cursor ended up.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SyncSummary {
    pub applied: Vec<Applied>,
    pub cursor: Cursor,
    /// True when the pass stopped early because cancellation was requested.
    pub cancelled: bool,
}

impl SyncSummary {
    /// True when the pass had nothing to do.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.applied.is_empty()
    }

    /// The conflict resolutions encountered, in application order.
    pub fn conflicts(&self) -> impl Iterator<Item = &ConflictResolution> {
        self.applied.iter().filter_map(|a| a.resolution.as_ref())
    }
}
