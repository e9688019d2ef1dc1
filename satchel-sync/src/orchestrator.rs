//! Sync orchestration: Idle -> Calculating -> Executing -> Idle.
//!
//! Drives calculator and executor to completion or first unresolved error.
//! Exclusive per store: a second concurrent synchronize() fails fast
//! instead of blocking. Cancellation is cooperative and checked between
//! units, so a cancelled pass still leaves the stores consistent and
//! resumable.

use crate::calculator::calculate;
use crate::error::{SyncError, SyncResult};
use crate::executor::WorkExecutor;
use crate::work::{SyncSummary, WorkPlan};
use satchel_crypto::MasterKey;
use satchel_remote::RemoteGateway;
use satchel_store::Db;
use satchel_types::Cursor;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;
use tracing::{info, warn};

/// Cooperative cancellation flag, checked between units.
pub type SyncFlag = Arc<AtomicBool>;

/// Progress callback payload: one report per unit about to execute.
#[derive(Debug, Clone)]
pub struct SyncProgress {
    pub total: usize,
    pub done: usize,
    pub current: String,
}

/// Progress callback type.
pub type ProgressFn = Box<dyn Fn(&SyncProgress) + Send>;

/// Where a sync pass currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncPhase {
    Idle,
    Calculating,
    Executing,
}

impl SyncPhase {
    fn from_u8(raw: u8) -> Self {
        match raw {
            1 => Self::Calculating,
            2 => Self::Executing,
            _ => Self::Idle,
        }
    }
}

/// Drives work calculation and execution as one idempotent operation.
pub struct SyncOrchestrator {
    db: Db,
    gateway: Arc<dyn RemoteGateway>,
    key: MasterKey,
    executor: WorkExecutor,
    syncing: AtomicBool,
    cancel: SyncFlag,
    phase: AtomicU8,
}

impl SyncOrchestrator {
    pub fn new(db: Db, gateway: Arc<dyn RemoteGateway>, key: MasterKey) -> Self {
        let executor = WorkExecutor::new(db.clone(), gateway.clone(), key.clone());
        Self {
            db,
            gateway,
            key,
            executor,
            syncing: AtomicBool::new(false),
            cancel: Arc::new(AtomicBool::new(false)),
            phase: AtomicU8::new(SyncPhase::Idle as u8),
        }
    }

    /// The current phase of the state machine.
    pub fn phase(&self) -> SyncPhase {
        SyncPhase::from_u8(self.phase.load(Ordering::SeqCst))
    }

    /// A handle that cancels the in-progress pass when set.
    pub fn cancel_flag(&self) -> SyncFlag {
        self.cancel.clone()
    }

    /// Requests cooperative cancellation of the in-progress pass.
    pub fn request_cancel(&self) {
        self.cancel.store(true, Ordering::SeqCst);
    }

    /// Computes the pending work without applying any of it.
    pub async fn calculate_work(&self) -> SyncResult<WorkPlan> {
        calculate(&self.db, self.gateway.as_ref(), &self.key).await
    }

    /// Synchronizes everything. Idempotent: with nothing pending it returns
    /// an immediate empty summary. On failure, everything applied before
    /// the failing unit stays committed and a later call resumes there.
    pub async fn synchronize(&self, progress: Option<ProgressFn>) -> SyncResult<SyncSummary> {
        if self.syncing.swap(true, Ordering::SeqCst) {
            return Err(SyncError::AlreadySyncing);
        }
        let _guard = PassGuard { syncing: &self.syncing, phase: &self.phase };
        self.cancel.store(false, Ordering::SeqCst);

        self.phase.store(SyncPhase::Calculating as u8, Ordering::SeqCst);
        let plan = calculate(&self.db, self.gateway.as_ref(), &self.key).await?;

        self.phase.store(SyncPhase::Executing as u8, Ordering::SeqCst);
        let total = plan.units.len();
        let mut summary = SyncSummary::default();

        for (done, unit) in plan.units.iter().enumerate() {
            if self.cancel.load(Ordering::SeqCst) {
                info!(done, total, "sync cancelled between units");
                summary.cancelled = true;
                break;
            }
            if let Some(report) = &progress {
                report(&SyncProgress { total, done, current: unit.to_string() });
            }
            match self.executor.execute(unit, &plan).await {
                Ok(applied) => summary.applied.push(applied),
                Err(source) => {
                    warn!(%unit, error = %source, "sync halted at failing unit");
                    return Err(SyncError::Unit { unit: *unit, source });
                }
            }
        }

        summary.cursor = self.db.with_tx(|tx| {
            if !summary.cancelled {
                // A clean pass has incorporated all fetched history, so the
                // cursor may take the fetch's high-water mark; this is what
                // keeps already-reflected changes from being refetched
                // forever.
                let current = tx.cursor()?;
                tx.set_cursor(current.max(plan.as_of))?;
            }
            tx.cursor()
        })?;

        info!(
            applied = summary.applied.len(),
            cursor = %summary.cursor,
            cancelled = summary.cancelled,
            "sync pass finished"
        );
        Ok(summary)
    }

    /// The stored cursor, for callers inspecting sync state.
    pub fn last_synced(&self) -> SyncResult<Cursor> {
        Ok(self.db.with_tx(|tx| tx.cursor())?)
    }
}

/// Resets the exclusive flag and phase when a pass ends, however it ends.
struct PassGuard<'a> {
    syncing: &'a AtomicBool,
    phase: &'a AtomicU8,
}

impl Drop for PassGuard<'_> {
    fn drop(&mut self) {
        self.phase.store(SyncPhase::Idle as u8, Ordering::SeqCst);
        self.syncing.store(false, Ordering::Relaxed);
    }
}
