//! Work calculation: diff local state against the remote change feed.
//!
//! Read-only with respect to the stores and deterministic given the same
//! store and server states. The queue it returns is ordered so that a unit
//! never references state a later unit creates: parents before children for
//! creations and renames, children before parents for deletions, ties by
//! ascending id.

use crate::error::SyncResult;
use crate::work::{Direction, RemoteEntry, UnitKind, WorkPlan, WorkUnit};
use satchel_crypto::MasterKey;
use satchel_remote::RemoteGateway;
use satchel_store::{Db, StorageError};
use satchel_types::{FileId, FileMetadata};
use std::collections::{HashMap, HashSet, VecDeque};
use tracing::{debug, warn};

/// Produces the ordered work queue for one sync pass.
pub async fn calculate(
    db: &Db,
    gateway: &dyn RemoteGateway,
    key: &MasterKey,
) -> SyncResult<WorkPlan> {
    let cursor = db.with_tx(|tx| tx.cursor())?;
    let change_set = gateway.fetch_changes(cursor).await?;

    // One snapshot of local state, read after the fetch so nothing fetched
    // can be newer than what we compare against.
    let (base_list, dirty, staged) = db.with_tx(|tx| {
        Ok((tx.all_base()?, tx.dirty()?, tx.all()?))
    })?;
    let base: HashMap<FileId, FileMetadata> =
        base_list.into_iter().map(|m| (m.id, m)).collect();

    // Decrypt remote names. A name that fails to open means the feed is
    // malformed for this account: fatal for the pass.
    let mut remote: HashMap<FileId, RemoteEntry> = HashMap::new();
    for change in change_set.changes {
        let metadata = change.metadata.open(key)?;
        remote.insert(metadata.id, RemoteEntry { seq: change.seq, metadata });
    }

    prune_remote_orphans(&mut remote, &staged);

    let dirty_ids: HashSet<FileId> = dirty.iter().map(|m| m.id).collect();
    let mut units: Vec<WorkUnit> = Vec::new();

    // Local changes not yet on the remote. A fetched change that merely
    // echoes what base already holds does not make a dirty entry
    // conflicting.
    for local in &dirty {
        let base_entry = base.get(&local.id);
        let remote_diverged = remote
            .get(&local.id)
            .is_some_and(|e| diverged(base_entry, &e.metadata));
        if remote_diverged {
            continue; // both sides changed: handled as a conflict below
        }
        if let Some(kind) = classify_local(base_entry, local) {
            units.push(WorkUnit {
                target: local.id,
                direction: Direction::PushLocal,
                kind,
                conflict: false,
            });
        }
    }

    // Remote changes not yet reflected locally, and conflicts.
    for entry in remote.values() {
        let id = entry.metadata.id;
        let base_entry = base.get(&id);
        if dirty_ids.contains(&id) {
            if !diverged(base_entry, &entry.metadata) {
                continue; // plain push, emitted above
            }
            let local = dirty
                .iter()
                .find(|m| m.id == id)
                .ok_or_else(|| StorageError::Corruption(format!("dirty set lost {id}")))?;
            units.push(WorkUnit {
                target: id,
                direction: Direction::PullRemote,
                kind: classify_conflict(base_entry, local, &entry.metadata),
                conflict: true,
            });
        } else if let Some(kind) = classify_remote(base_entry, &entry.metadata) {
            units.push(WorkUnit {
                target: id,
                direction: Direction::PullRemote,
                kind,
                conflict: false,
            });
        }
    }

    expand_folder_deletions(&mut units, &remote, &staged);
    order_units(&mut units, &remote, &staged)?;

    debug!(
        count = units.len(),
        as_of = change_set.as_of.value(),
        "work calculated"
    );
    Ok(WorkPlan { units, remote, as_of: change_set.as_of })
}

/// Drops fetched changes whose parent exists on neither side. A partial
/// feed can reference folders this account cannot see; carrying them would
/// orphan entries locally.
fn prune_remote_orphans(remote: &mut HashMap<FileId, RemoteEntry>, staged: &[FileMetadata]) {
    let staged_ids: HashSet<FileId> = staged.iter().map(|m| m.id).collect();
    loop {
        let orphans: Vec<FileId> = remote
            .values()
            .filter(|e| {
                !e.metadata.is_root()
                    && !remote.contains_key(&e.metadata.parent)
                    && !staged_ids.contains(&e.metadata.parent)
            })
            .map(|e| e.metadata.id)
            .collect();
        if orphans.is_empty() {
            return;
        }
        for id in orphans {
            warn!(%id, "pruning remote orphan from plan");
            remote.remove(&id);
        }
    }
}

/// What kind of push a dirty entry needs, or `None` when there is nothing
/// the remote should see (overlay identical to base, or an entry that was
/// created and deleted without ever syncing).
fn classify_local(base: Option<&FileMetadata>, local: &FileMetadata) -> Option<UnitKind> {
    match base {
        None => {
            if local.deleted {
                return None;
            }
            Some(creation_kind(local))
        }
        Some(base) => {
            if base.content_version == local.content_version {
                return None;
            }
            if local.deleted && !base.deleted {
                return Some(UnitKind::Deletion);
            }
            if local.is_document() && local.content_revision != base.content_revision {
                return Some(UnitKind::Content);
            }
            Some(UnitKind::Metadata)
        }
    }
}

/// What kind of pull a remote change needs, or `None` when it is already
/// reflected in base (our own push echoing back) or a tombstone for an
/// entry this store never knew.
fn classify_remote(base: Option<&FileMetadata>, remote: &FileMetadata) -> Option<UnitKind> {
    match base {
        None => {
            if remote.deleted {
                return None;
            }
            Some(creation_kind(remote))
        }
        Some(base) => {
            if base.content_version == remote.content_version {
                return None;
            }
            if remote.deleted && !base.deleted {
                return Some(UnitKind::Deletion);
            }
            if remote.is_document() && remote.content_revision != base.content_revision {
                return Some(UnitKind::Content);
            }
            Some(UnitKind::Metadata)
        }
    }
}

/// Conflict units carry the strongest kind either side diverged by:
/// a deletion on either side dominates, then content, then metadata.
fn classify_conflict(
    base: Option<&FileMetadata>,
    local: &FileMetadata,
    remote: &FileMetadata,
) -> UnitKind {
    if local.deleted || remote.deleted {
        return UnitKind::Deletion;
    }
    let base_revision = base.map(|b| b.content_revision);
    let content_diverged = local.is_document()
        && (base_revision != Some(local.content_revision)
            || base_revision != Some(remote.content_revision));
    if content_diverged {
        UnitKind::Content
    } else {
        UnitKind::Metadata
    }
}

fn creation_kind(meta: &FileMetadata) -> UnitKind {
    if meta.is_document() { UnitKind::Content } else { UnitKind::Metadata }
}

/// True when the remote state moved past the last common synced state.
fn diverged(base: Option<&FileMetadata>, remote: &FileMetadata) -> bool {
    base.is_none_or(|b| b.content_version != remote.content_version)
}

/// A folder deletion must still tombstone descendants the other side has
/// never seen: expand every non-conflicting pulled folder deletion into
/// deletion units for each live staged descendant not already targeted.
fn expand_folder_deletions(
    units: &mut Vec<WorkUnit>,
    remote: &HashMap<FileId, RemoteEntry>,
    staged: &[FileMetadata],
) {
    // A descendant with a pending push still needs its tombstone (the
    // push runs first, the cascade tombstone after); only an existing
    // deletion unit makes the synthetic one redundant.
    let mut already_deleting: HashSet<FileId> = units
        .iter()
        .filter(|u| u.kind == UnitKind::Deletion)
        .map(|u| u.target)
        .collect();
    let mut children_of: HashMap<FileId, Vec<&FileMetadata>> = HashMap::new();
    for meta in staged {
        if !meta.is_root() {
            children_of.entry(meta.parent).or_default().push(meta);
        }
    }

    let folder_deletions: Vec<FileId> = units
        .iter()
        .filter(|u| {
            u.direction == Direction::PullRemote
                && u.kind == UnitKind::Deletion
                && !u.conflict
                && remote.get(&u.target).is_some_and(|e| e.metadata.is_folder())
        })
        .map(|u| u.target)
        .collect();

    let mut synthetic = Vec::new();
    for folder in folder_deletions {
        let mut queue = VecDeque::from([folder]);
        while let Some(next) = queue.pop_front() {
            let Some(children) = children_of.get(&next) else { continue };
            for child in children {
                queue.push_back(child.id);
                if !child.deleted && already_deleting.insert(child.id) {
                    synthetic.push(WorkUnit {
                        target: child.id,
                        direction: Direction::PullRemote,
                        kind: UnitKind::Deletion,
                        conflict: false,
                    });
                }
            }
        }
    }
    units.extend(synthetic);
}

/// Sorts units so creations and renames run parents-first, deletions run
/// children-first and after everything else, with ascending-id tie breaks.
fn order_units(
    units: &mut [WorkUnit],
    remote: &HashMap<FileId, RemoteEntry>,
    staged: &[FileMetadata],
) -> SyncResult<()> {
    // Target tree: remote state overlaid on staged. Depth is computed
    // against the tree as it will exist once the pass completes.
    let mut parents: HashMap<FileId, FileId> = staged
        .iter()
        .map(|m| (m.id, m.parent))
        .collect();
    for entry in remote.values() {
        parents.insert(entry.metadata.id, entry.metadata.parent);
    }

    let mut depths: HashMap<FileId, i64> = HashMap::new();
    for unit in units.iter() {
        let depth = depth_of(unit.target, &parents, &mut depths)?;
        depths.insert(unit.target, depth);
    }

    units.sort_by_key(|u| {
        let depth = depths.get(&u.target).copied().unwrap_or(i64::MAX);
        match u.kind {
            UnitKind::Deletion => (1u8, -depth, u.target),
            _ => (0u8, depth, u.target),
        }
    });
    Ok(())
}

fn depth_of(
    id: FileId,
    parents: &HashMap<FileId, FileId>,
    memo: &mut HashMap<FileId, i64>,
) -> SyncResult<i64> {
    if let Some(&depth) = memo.get(&id) {
        return Ok(depth);
    }
    let mut chain = Vec::new();
    let mut current = id;
    loop {
        if let Some(&depth) = memo.get(&current) {
            record_chain(&chain, depth, memo);
            return Ok(memo[&id]);
        }
        let Some(&parent) = parents.get(&current) else {
            return Err(StorageError::Corruption(format!(
                "entry {current} has no parent on either side"
            ))
            .into());
        };
        if parent == current {
            memo.insert(current, 0);
            record_chain(&chain, 0, memo);
            return Ok(memo[&id]);
        }
        if chain.contains(&current) {
            return Err(StorageError::Corruption(format!(
                "cycle in parent graph near {current}"
            ))
            .into());
        }
        chain.push(current);
        current = parent;
    }
}

fn record_chain(chain: &[FileId], anchor_depth: i64, memo: &mut HashMap<FileId, i64>) {
    for (i, &node) in chain.iter().rev().enumerate() {
        memo.insert(node, anchor_depth + i as i64 + 1);
    }
}
