//! Sync engine for Satchel.
//!
//! Synchronization is a discrete, caller-triggered operation, not a
//! background stream. One pass runs in three steps:
//!
//! 1. **Calculate**: diff the local store against the remote change feed
//!    into an ordered queue of [`WorkUnit`]s (read-only, deterministic).
//! 2. **Execute**: apply units one at a time. Each unit's local commit is a
//!    single store transaction; conflicts resolve remote-wins with the
//!    divergent local state preserved as a new sibling entry.
//! 3. **Advance**: the sync cursor moves forward as pulled history becomes
//!    durable, so an interrupted pass resumes where it stopped.
//!
//! The engine guarantees convergence: repeated passes with no further edits
//! reach a fixed point where the calculator returns an empty queue.

mod calculator;
mod error;
mod executor;
mod orchestrator;
mod work;

pub use calculator::calculate;
pub use error::{SyncError, SyncResult, UnitError};
pub use executor::WorkExecutor;
pub use orchestrator::{ProgressFn, SyncFlag, SyncOrchestrator, SyncPhase, SyncProgress};
pub use work::{
    Applied, ConflictResolution, Direction, RemoteEntry, SyncSummary, UnitKind, WorkPlan,
    WorkUnit,
};
