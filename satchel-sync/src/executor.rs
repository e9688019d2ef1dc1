//! Work execution: apply one unit at a time.
//!
//! Every unit's local commit is a single store transaction, so a crash or
//! network loss between units leaves the tree at a unit boundary and the
//! next pass resumes from durable state. Conflicts resolve remote-wins; the
//! divergent local state always survives, either as the canonical record
//! (only the local side touched the bytes) or as a new sibling entry. It is
//! never silently discarded.

use crate::error::UnitError;
use crate::work::{Applied, ConflictResolution, Direction, UnitKind, WorkPlan, WorkUnit};
use satchel_crypto::MasterKey;
use satchel_remote::{MetadataDiff, RemoteError, RemoteFileMetadata, RemoteGateway};
use satchel_store::{Db, StorageResult, Tx};
use satchel_types::{unique_sibling_name, Cursor, FileId, FileMetadata, NameComponents, Side};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info};

/// Applies work units against the stores and the gateway.
pub struct WorkExecutor {
    db: Db,
    gateway: Arc<dyn RemoteGateway>,
    key: MasterKey,
}

impl WorkExecutor {
    pub fn new(db: Db, gateway: Arc<dyn RemoteGateway>, key: MasterKey) -> Self {
        Self { db, gateway, key }
    }

    /// Applies one unit. On success the unit's effects are durable; on
    /// failure nothing of the unit is visible.
    pub async fn execute(&self, unit: &WorkUnit, plan: &WorkPlan) -> Result<Applied, UnitError> {
        debug!(%unit, "executing");
        match (unit.direction, unit.conflict) {
            (Direction::PushLocal, _) => self.push(unit).await,
            (Direction::PullRemote, false) => self.pull(unit, plan).await,
            (Direction::PullRemote, true) => self.resolve_conflict(unit, plan).await,
        }
    }

    // ── Push ─────────────────────────────────────────────────────

    async fn push(&self, unit: &WorkUnit) -> Result<Applied, UnitError> {
        let id = unit.target;
        let (base, local) = self
            .db
            .with_tx(|tx| Ok((tx.base_get(id)?, tx.local_get(id)?)))?;
        let Some(local) = local else {
            // overlay already promoted by an earlier, interrupted pass
            return Ok(Applied { unit: *unit, resolution: None });
        };

        let diff = MetadataDiff {
            old: base.map(|b| RemoteFileMetadata::seal(&b, &self.key)).transpose()?,
            new: RemoteFileMetadata::seal(&local, &self.key)?,
        };
        let assigned = self.gateway.push_metadata(&diff).await?;

        if unit.kind == UnitKind::Content {
            let bytes = self.db.with_tx(|tx| tx.get_document(id))?.ok_or_else(|| {
                UnitError::InconsistentPlan(format!("no bytes for content push of {id}"))
            })?;
            self.gateway.push_content(id, &bytes).await?;
        }

        // The push is on the server; record it as the new common ancestor.
        // When the assigned sequence directly follows the cursor, the only
        // new remote history is this push, so the cursor may take it; any
        // gap means interleaved foreign changes that still need fetching.
        self.db.with_tx(|tx| {
            tx.promote_local(id)?;
            let current = tx.cursor()?;
            if assigned.value() == current.value() + 1 {
                tx.set_cursor(assigned)?;
            }
            Ok(())
        })?;
        Ok(Applied { unit: *unit, resolution: None })
    }

    // ── Plain pull ───────────────────────────────────────────────

    async fn pull(&self, unit: &WorkUnit, plan: &WorkPlan) -> Result<Applied, UnitError> {
        let id = unit.target;
        let Some(entry) = plan.remote.get(&id) else {
            if unit.kind == UnitKind::Deletion {
                return self.apply_cascade_tombstone(unit);
            }
            return Err(UnitError::InconsistentPlan(format!(
                "pull unit for {id} with no fetched state"
            )));
        };

        let meta = entry.metadata.clone();
        let seq = entry.seq;
        let bytes = if unit.kind == UnitKind::Content {
            Some(self.gateway.fetch_content(id).await?)
        } else {
            None
        };

        self.db.with_tx(|tx| {
            tx.upsert_base(&meta)?;
            if let Some(bytes) = &bytes {
                tx.put_document(id, bytes)?;
            }
            advance_cursor(tx, seq)
        })?;
        Ok(Applied { unit: *unit, resolution: None })
    }

    /// A deletion synthesized by folder-cascade expansion: the entry exists
    /// only locally, under a folder the remote tombstoned.
    fn apply_cascade_tombstone(&self, unit: &WorkUnit) -> Result<Applied, UnitError> {
        let id = unit.target;
        self.db.with_tx(|tx| {
            let Some(mut meta) = tx.get(id)? else {
                return Ok(()); // already gone
            };
            if tx.base_get(id)?.is_none() {
                // never synced: nothing to propagate, remove outright
                tx.purge(id)
            } else if !meta.deleted {
                // known to the server: tombstone locally and let the next
                // pass push the cascade
                meta.deleted = true;
                meta.bump_version(Side::Local);
                tx.upsert_local(&meta)
            } else {
                Ok(())
            }
        })?;
        Ok(Applied { unit: *unit, resolution: None })
    }

    // ── Conflict resolution ──────────────────────────────────────

    async fn resolve_conflict(
        &self,
        unit: &WorkUnit,
        plan: &WorkPlan,
    ) -> Result<Applied, UnitError> {
        let id = unit.target;
        let entry = plan.remote.get(&id).ok_or_else(|| {
            UnitError::InconsistentPlan(format!("conflict unit for {id} with no fetched state"))
        })?;
        let remote = entry.metadata.clone();
        let seq = entry.seq;

        let (base, local) = self
            .db
            .with_tx(|tx| Ok((tx.base_get(id)?, tx.local_get(id)?)))?;
        let Some(local) = local else {
            // overlay gone (resumed pass already resolved this): plain pull
            return self.pull(unit, plan).await;
        };

        let base_revision = base.as_ref().map(|b| b.content_revision);
        let resolution = match (local.deleted, remote.deleted) {
            (true, true) => self.collapse_both_deleted(id, &remote, seq)?,
            (false, true) => self.resurrect_local(id, &local, &remote, seq)?,
            (true, false) => {
                self.revive_from_remote(id, base_revision, &remote, seq).await?
            }
            (false, false) => {
                if is_echo(&local, &remote) {
                    return self.reconcile_echo(unit, &local, base_revision, seq).await;
                }
                let local_bytes_diverged =
                    local.is_document() && base_revision != Some(local.content_revision);
                let remote_bytes_diverged =
                    remote.is_document() && base_revision != Some(remote.content_revision);
                let name_diverged = local.name != remote.name
                    && base.as_ref().map(|b| b.name.as_str()) != Some(local.name.as_str());

                if local_bytes_diverged && remote_bytes_diverged {
                    self.duplicate_local_content(id, &local, &remote, seq).await?
                } else if local_bytes_diverged {
                    self.adopt_remote_metadata(id, &local, &remote, name_diverged, seq)?
                } else {
                    self.keep_remote_state(
                        id,
                        &local,
                        &remote,
                        remote_bytes_diverged,
                        name_diverged,
                        seq,
                    )
                    .await?
                }
            }
        };

        info!(%unit, ?resolution, "conflict resolved");
        Ok(Applied { unit: *unit, resolution: Some(resolution) })
    }

    /// The fetched metadata is exactly our staged state. Usually that is
    /// the echo of a push that reached the server but died before
    /// committing locally, so finish the job. But concurrent edits from the
    /// same ancestor produce equal version numbers too, so when bytes are
    /// in play they must be compared: matching metadata with differing
    /// bytes is a real content conflict.
    async fn reconcile_echo(
        &self,
        unit: &WorkUnit,
        local: &FileMetadata,
        base_revision: Option<u64>,
        seq: u64,
    ) -> Result<Applied, UnitError> {
        let id = unit.target;
        let bytes_in_play = local.is_document() && base_revision != Some(local.content_revision);

        if bytes_in_play {
            let local_bytes = self.db.with_tx(|tx| tx.get_document(id))?;
            match self.gateway.fetch_content(id).await {
                // our metadata landed but the content upload did not
                Err(RemoteError::NotFound(_)) => {
                    if let Some(bytes) = &local_bytes {
                        self.gateway.push_content(id, bytes).await?;
                    }
                }
                Ok(remote_bytes) => {
                    if local_bytes.as_ref() != Some(&remote_bytes) {
                        // same version numbers, different bytes: a genuine
                        // concurrent edit, not an echo
                        let remote =
                            FileMetadata { last_modified_by: Side::Remote, ..local.clone() };
                        let resolution =
                            self.duplicate_local_content(id, local, &remote, seq).await?;
                        info!(%unit, ?resolution, "conflict resolved");
                        return Ok(Applied { unit: *unit, resolution: Some(resolution) });
                    }
                }
                Err(err) => return Err(err.into()),
            }
        }

        debug!(%id, "reconciled interrupted push");
        self.db.with_tx(|tx| {
            tx.promote_local(id)?;
            advance_cursor(tx, seq)
        })?;
        Ok(Applied { unit: *unit, resolution: None })
    }

    fn collapse_both_deleted(
        &self,
        id: FileId,
        remote: &FileMetadata,
        seq: u64,
    ) -> Result<ConflictResolution, UnitError> {
        self.db.with_tx(|tx| {
            tx.upsert_base(remote)?;
            tx.remove_local(id)?;
            advance_cursor(tx, seq)
        })?;
        Ok(ConflictResolution::BothDeleted { id })
    }

    /// Remote deleted, local edited: the edit wins. Record the remote
    /// tombstone as the common ancestor and keep the live local state
    /// staged ahead of it, so the next pass pushes the resurrection.
    fn resurrect_local(
        &self,
        id: FileId,
        local: &FileMetadata,
        remote: &FileMetadata,
        seq: u64,
    ) -> Result<ConflictResolution, UnitError> {
        let mut revived = local.clone();
        if revived.content_version <= remote.content_version {
            revived.content_version = remote.content_version + 1;
        }
        self.db.with_tx(|tx| {
            tx.upsert_base(remote)?;
            tx.upsert_local(&revived)?;
            advance_cursor(tx, seq)
        })?;
        Ok(ConflictResolution::Resurrected { id })
    }

    /// Local deleted, remote edited: the edit wins. Clear the tombstone and
    /// take the remote state, bytes included when they moved.
    async fn revive_from_remote(
        &self,
        id: FileId,
        base_revision: Option<u64>,
        remote: &FileMetadata,
        seq: u64,
    ) -> Result<ConflictResolution, UnitError> {
        let bytes = if remote.is_document() && base_revision != Some(remote.content_revision) {
            Some(self.gateway.fetch_content(id).await?)
        } else {
            None
        };
        self.db.with_tx(|tx| {
            tx.upsert_base(remote)?;
            tx.remove_local(id)?;
            if let Some(bytes) = &bytes {
                tx.put_document(id, bytes)?;
            }
            advance_cursor(tx, seq)
        })?;
        Ok(ConflictResolution::Resurrected { id })
    }

    /// Both sides changed the bytes: remote bytes become canonical at the
    /// original id; the divergent local bytes survive as a new sibling
    /// document carrying a conflict marker. No byte merging, ever.
    async fn duplicate_local_content(
        &self,
        id: FileId,
        local: &FileMetadata,
        remote: &FileMetadata,
        seq: u64,
    ) -> Result<ConflictResolution, UnitError> {
        let remote_bytes = self.gateway.fetch_content(id).await?;
        let empty = satchel_crypto::encrypt(&self.key, b"")?;
        let duplicate_id = FileId::new();
        let desired = NameComponents::parse(&local.name)
            .with_conflict_marker()
            .to_name();
        let local_kind = local.kind;

        let duplicate_name = self.db.with_tx(|tx| {
            let local_bytes = tx.get_document(id)?;
            tx.upsert_base(remote)?;
            tx.remove_local(id)?;
            tx.put_document(id, &remote_bytes)?;

            let name = unique_sibling_name(&desired, &sibling_names(tx, remote.parent, id)?);
            let mut duplicate = FileMetadata::new(remote.parent, name.clone(), local_kind);
            duplicate.id = duplicate_id;
            tx.upsert_local(&duplicate)?;
            tx.put_document(duplicate_id, local_bytes.as_ref().unwrap_or(&empty))?;
            advance_cursor(tx, seq)?;
            Ok(name)
        })?;

        Ok(ConflictResolution::ContentDuplicated {
            id,
            duplicate: duplicate_id,
            duplicate_name,
        })
    }

    /// Only the local side touched the bytes while the remote changed
    /// metadata: the remote metadata wins the canonical record, the local
    /// bytes stay in place and get pushed on the next pass.
    fn adopt_remote_metadata(
        &self,
        id: FileId,
        local: &FileMetadata,
        remote: &FileMetadata,
        name_diverged: bool,
        seq: u64,
    ) -> Result<ConflictResolution, UnitError> {
        let mut merged = remote.clone();
        merged.content_revision = local.content_revision;
        merged.content_version = remote.content_version.max(local.content_version) + 1;
        merged.last_modified_by = Side::Local;

        let (duplicate_id, desired) = preservation(local, name_diverged);
        let preserved_name = self.db.with_tx(|tx| {
            let local_bytes = tx.get_document(id)?;
            tx.upsert_base(remote)?;
            tx.upsert_local(&merged)?;
            let name = self.preserve_sibling(tx, id, local, remote, duplicate_id, &desired, local_bytes)?;
            advance_cursor(tx, seq)?;
            Ok(name)
        })?;

        Ok(ConflictResolution::RemoteMetadataKept { id, preserved: duplicate_id, preserved_name })
    }

    /// Remote wins outright (metadata, and bytes when they moved). A
    /// locally divergent name survives as a new sibling entry.
    async fn keep_remote_state(
        &self,
        id: FileId,
        local: &FileMetadata,
        remote: &FileMetadata,
        fetch_bytes: bool,
        name_diverged: bool,
        seq: u64,
    ) -> Result<ConflictResolution, UnitError> {
        let bytes = if fetch_bytes {
            Some(self.gateway.fetch_content(id).await?)
        } else {
            None
        };

        let (duplicate_id, desired) = preservation(local, name_diverged);
        let preserved_name = self.db.with_tx(|tx| {
            let local_bytes = tx.get_document(id)?;
            tx.upsert_base(remote)?;
            tx.remove_local(id)?;
            if let Some(bytes) = &bytes {
                tx.put_document(id, bytes)?;
            }
            let name = self.preserve_sibling(tx, id, local, remote, duplicate_id, &desired, local_bytes)?;
            advance_cursor(tx, seq)?;
            Ok(name)
        })?;

        Ok(ConflictResolution::RemoteMetadataKept { id, preserved: duplicate_id, preserved_name })
    }

    /// Creates the sibling entry that carries a divergent local name.
    /// Documents duplicate their current bytes; folders are recreated
    /// empty. No-op when nothing is being preserved.
    #[allow(clippy::too_many_arguments)]
    fn preserve_sibling(
        &self,
        tx: &Tx<'_>,
        id: FileId,
        local: &FileMetadata,
        remote: &FileMetadata,
        duplicate_id: Option<FileId>,
        desired: &Option<String>,
        local_bytes: Option<satchel_crypto::EncryptedBytes>,
    ) -> StorageResult<Option<String>> {
        let (Some(dup_id), Some(desired)) = (duplicate_id, desired) else {
            return Ok(None);
        };
        let name = unique_sibling_name(desired, &sibling_names(tx, remote.parent, id)?);
        let mut duplicate = FileMetadata::new(remote.parent, name.clone(), local.kind);
        duplicate.id = dup_id;
        tx.upsert_local(&duplicate)?;
        if local.is_document() {
            if let Some(bytes) = &local_bytes {
                tx.put_document(dup_id, bytes)?;
            }
        }
        Ok(Some(name))
    }
}

fn preservation(local: &FileMetadata, name_diverged: bool) -> (Option<FileId>, Option<String>) {
    if name_diverged {
        (Some(FileId::new()), Some(local.name.clone()))
    } else {
        (None, None)
    }
}

/// Names already taken among the live staged siblings under `parent`,
/// excluding the entry being resolved.
fn sibling_names(tx: &Tx<'_>, parent: FileId, resolving: FileId) -> StorageResult<HashSet<String>> {
    Ok(tx
        .children(parent)?
        .into_iter()
        .filter(|m| !m.deleted && m.id != resolving)
        .map(|m| m.name)
        .collect())
}

fn advance_cursor(tx: &Tx<'_>, seq: u64) -> StorageResult<()> {
    let current = tx.cursor()?;
    tx.set_cursor(current.max(Cursor::new(seq)))
}

/// True when the fetched state is exactly the staged local state: the
/// echo of an interrupted push, not a divergence.
fn is_echo(local: &FileMetadata, remote: &FileMetadata) -> bool {
    local.content_version == remote.content_version
        && local.content_revision == remote.content_revision
        && local.name == remote.name
        && local.parent == remote.parent
        && local.deleted == remote.deleted
        && local.kind == remote.kind
}
