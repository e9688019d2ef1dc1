//! Satchel core: the context object everything hangs off.
//!
//! A [`Satchel`] owns one account's world: key material, the local
//! metadata/content stores, the remote gateway, and the sync orchestrator.
//! There is no process-wide session state; callers hold a `Satchel` and
//! pass it around.
//!
//! Offline editing goes through the file operations in this crate (create,
//! rename, move, delete, read, write), all validated before any mutation.
//! Synchronization is explicit: [`Satchel::sync`] runs one pass and
//! reports exactly what it did.

mod account;
mod error;
mod files;

pub use account::Account;
pub use error::{CoreError, CoreResult, ValidationError};

use satchel_remote::RemoteGateway;
use satchel_store::{ContentStore, Db, MetadataStore, Tx};
use satchel_sync::{ProgressFn, SyncOrchestrator, SyncPhase, SyncSummary, WorkPlan};
use satchel_types::Cursor;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

/// Where the local store lives.
#[derive(Debug, Clone)]
pub struct CoreConfig {
    pub data_dir: PathBuf,
}

const DB_FILE: &str = "satchel.db";

/// One account's stores, keys, and sync engine.
pub struct Satchel {
    account: Account,
    db: Db,
    metadata: MetadataStore,
    content: ContentStore,
    orchestrator: SyncOrchestrator,
}

impl Satchel {
    /// Creates a brand-new account store: persists the account and stages
    /// the account's root folder for the first push.
    pub fn create(
        config: &CoreConfig,
        account: Account,
        gateway: Arc<dyn RemoteGateway>,
    ) -> CoreResult<Self> {
        std::fs::create_dir_all(&config.data_dir)
            .map_err(satchel_store::StorageError::Io)?;
        let db = Db::open(&config.data_dir.join(DB_FILE))?;
        Self::attach(db, account, gateway, true)
    }

    /// Sets up a store for an account imported from another device. The
    /// file tree, root included, arrives with the first sync.
    pub fn restore(
        config: &CoreConfig,
        account: Account,
        gateway: Arc<dyn RemoteGateway>,
    ) -> CoreResult<Self> {
        std::fs::create_dir_all(&config.data_dir)
            .map_err(satchel_store::StorageError::Io)?;
        let db = Db::open(&config.data_dir.join(DB_FILE))?;
        Self::attach(db, account, gateway, false)
    }

    /// Opens an existing store and reads its account row.
    pub fn load(config: &CoreConfig, gateway: Arc<dyn RemoteGateway>) -> CoreResult<Self> {
        let db = Db::open(&config.data_dir.join(DB_FILE))?;
        let json = db.with_tx(|tx| tx.account_json())?.ok_or(CoreError::NoAccount)?;
        let account = Account::from_json(&json)?;
        Self::attach(db, account, gateway, false)
    }

    /// In-memory variant of [`Satchel::create`], for tests.
    pub fn create_in_memory(
        account: Account,
        gateway: Arc<dyn RemoteGateway>,
    ) -> CoreResult<Self> {
        Self::attach(Db::open_in_memory()?, account, gateway, true)
    }

    /// In-memory variant of [`Satchel::restore`], for tests.
    pub fn restore_in_memory(
        account: Account,
        gateway: Arc<dyn RemoteGateway>,
    ) -> CoreResult<Self> {
        Self::attach(Db::open_in_memory()?, account, gateway, false)
    }

    fn attach(
        db: Db,
        account: Account,
        gateway: Arc<dyn RemoteGateway>,
        create_root: bool,
    ) -> CoreResult<Self> {
        let account_json = account.to_json()?;
        db.with_tx(|tx| {
            if tx.account_json()?.is_none() {
                tx.set_account_json(&account_json)?;
            }
            Ok(())
        })?;

        if create_root {
            let root = satchel_types::FileMetadata::root(&account.username);
            db.with_tx(|tx| {
                if tx.root()?.is_none() {
                    tx.set_root(root.id)?;
                    tx.upsert_local(&root)?;
                    info!(root = %root.id, "created account root");
                }
                Ok(())
            })?;
        }

        let orchestrator =
            SyncOrchestrator::new(db.clone(), gateway, account.master_key().clone());
        Ok(Self {
            account,
            metadata: MetadataStore::new(db.clone()),
            content: ContentStore::new(db.clone()),
            db,
            orchestrator,
        })
    }

    /// The account this context operates for.
    #[must_use]
    pub fn account(&self) -> &Account {
        &self.account
    }

    // ── Sync entry points ────────────────────────────────────────

    /// Runs one synchronization pass to completion or first unresolved
    /// error. Idempotent when nothing is pending.
    pub async fn sync(&self, progress: Option<ProgressFn>) -> CoreResult<SyncSummary> {
        let summary = self.orchestrator.synchronize(progress).await?;
        self.adopt_root_if_needed()?;
        Ok(summary)
    }

    /// Computes pending work without applying any of it.
    pub async fn calculate_work(&self) -> CoreResult<WorkPlan> {
        Ok(self.orchestrator.calculate_work().await?)
    }

    /// The stored sync cursor.
    pub fn last_synced(&self) -> CoreResult<Cursor> {
        Ok(self.metadata.cursor()?)
    }

    /// Overrides the stored sync cursor. Rewinding forces the next pass to
    /// refetch history.
    pub fn set_last_synced(&self, cursor: Cursor) -> CoreResult<()> {
        Ok(self.metadata.set_cursor(cursor)?)
    }

    /// Requests cooperative cancellation of an in-progress sync.
    pub fn cancel_sync(&self) {
        self.orchestrator.request_cancel();
    }

    /// Where the sync state machine currently is.
    #[must_use]
    pub fn sync_phase(&self) -> SyncPhase {
        self.orchestrator.phase()
    }

    /// On a restored device the root arrives with the first pull; record
    /// it once it shows up.
    fn adopt_root_if_needed(&self) -> CoreResult<()> {
        self.db.with_tx(|tx| {
            if tx.root()?.is_none() {
                if let Some(root) = tx.all()?.into_iter().find(|m| m.is_root()) {
                    tx.set_root(root.id)?;
                }
            }
            Ok(())
        })?;
        Ok(())
    }

    // ── Internal plumbing ────────────────────────────────────────

    pub(crate) fn metadata(&self) -> &MetadataStore {
        &self.metadata
    }

    pub(crate) fn content(&self) -> &ContentStore {
        &self.content
    }

    /// Runs a validated mutation in one transaction. Validation failures
    /// are values, not storage errors, so the closure checks everything
    /// before its first write and nothing is half-applied.
    pub(crate) fn transact<T>(
        &self,
        f: impl FnOnce(&Tx<'_>) -> Result<Result<T, ValidationError>, satchel_store::StorageError>,
    ) -> CoreResult<T> {
        Ok(self.db.with_tx(f)??)
    }
}
