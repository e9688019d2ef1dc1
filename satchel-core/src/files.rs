//! Validated file-tree operations.
//!
//! These are the offline-editing surface: they mutate the staged local
//! tree directly and never touch the network. Every operation validates
//! before its first write, inside the same transaction that performs the
//! mutation, so a rejected call leaves no trace.

use crate::error::{CoreResult, ValidationError};
use crate::Satchel;
use satchel_store::Tx;
use satchel_types::{FileId, FileKind, FileMetadata, Side};
use std::collections::HashSet;
use tracing::debug;

/// Longest accepted file name.
pub const MAX_NAME_LENGTH: usize = 230;

impl Satchel {
    // ── Creating, renaming, moving, deleting ─────────────────────

    /// Creates a document or folder under `parent`. Documents start with
    /// empty content.
    pub fn create_file(
        &self,
        parent: FileId,
        name: &str,
        kind: FileKind,
    ) -> CoreResult<FileMetadata> {
        let empty = satchel_crypto::encrypt(self.account().master_key(), b"")?;
        let name = name.to_string();
        let created = self.transact(move |tx| {
            let Some(parent_meta) = tx.get(parent)? else {
                return Ok(Err(ValidationError::NotFound(parent)));
            };
            if parent_meta.deleted {
                return Ok(Err(ValidationError::Deleted(parent)));
            }
            if !parent_meta.is_folder() {
                return Ok(Err(ValidationError::ParentNotAFolder(parent)));
            }
            if let Err(reason) = check_name(&name) {
                return Ok(Err(reason));
            }
            if live_sibling_names(tx, parent, None)?.contains(&name) {
                return Ok(Err(ValidationError::DuplicateSiblingName(name)));
            }

            let meta = FileMetadata::new(parent, name, kind);
            tx.upsert_local(&meta)?;
            if meta.is_document() {
                tx.put_document(meta.id, &empty)?;
            }
            Ok(Ok(meta))
        })?;
        debug!(id = %created.id, name = %created.name, "created entry");
        Ok(created)
    }

    /// Renames an entry. Root cannot be renamed.
    pub fn rename_file(&self, id: FileId, new_name: &str) -> CoreResult<()> {
        let new_name = new_name.to_string();
        self.transact(move |tx| {
            let Some(mut meta) = tx.get(id)? else {
                return Ok(Err(ValidationError::NotFound(id)));
            };
            if meta.is_root() {
                return Ok(Err(ValidationError::RootImmutable));
            }
            if meta.deleted {
                return Ok(Err(ValidationError::Deleted(id)));
            }
            if let Err(reason) = check_name(&new_name) {
                return Ok(Err(reason));
            }
            if live_sibling_names(tx, meta.parent, Some(id))?.contains(&new_name) {
                return Ok(Err(ValidationError::DuplicateSiblingName(new_name)));
            }

            meta.name = new_name;
            meta.bump_version(Side::Local);
            tx.upsert_local(&meta)?;
            Ok(Ok(()))
        })
    }

    /// Moves an entry under another folder. Rejects cycles.
    pub fn move_file(&self, id: FileId, new_parent: FileId) -> CoreResult<()> {
        self.transact(move |tx| {
            let Some(mut meta) = tx.get(id)? else {
                return Ok(Err(ValidationError::NotFound(id)));
            };
            if meta.is_root() {
                return Ok(Err(ValidationError::RootImmutable));
            }
            if meta.deleted {
                return Ok(Err(ValidationError::Deleted(id)));
            }
            let Some(parent_meta) = tx.get(new_parent)? else {
                return Ok(Err(ValidationError::NotFound(new_parent)));
            };
            if parent_meta.deleted {
                return Ok(Err(ValidationError::Deleted(new_parent)));
            }
            if !parent_meta.is_folder() {
                return Ok(Err(ValidationError::ParentNotAFolder(new_parent)));
            }
            if new_parent == id
                || tx.descendants(id)?.iter().any(|m| m.id == new_parent)
            {
                return Ok(Err(ValidationError::Cycle(id)));
            }
            if live_sibling_names(tx, new_parent, Some(id))?.contains(&meta.name) {
                return Ok(Err(ValidationError::DuplicateSiblingName(meta.name)));
            }

            meta.parent = new_parent;
            meta.bump_version(Side::Local);
            tx.upsert_local(&meta)?;
            Ok(Ok(()))
        })
    }

    /// Tombstones an entry; for folders the tombstone cascades to every
    /// live descendant. Entries the server has never seen are removed
    /// outright (there is nothing to propagate). Content is retained until
    /// an explicit purge.
    pub fn delete_file(&self, id: FileId) -> CoreResult<()> {
        self.transact(move |tx| {
            let Some(meta) = tx.get(id)? else {
                return Ok(Err(ValidationError::NotFound(id)));
            };
            if meta.is_root() {
                return Ok(Err(ValidationError::RootImmutable));
            }
            if meta.deleted {
                return Ok(Err(ValidationError::Deleted(id)));
            }

            let descendants = tx.descendants(id)?;
            for target in std::iter::once(meta).chain(descendants) {
                tombstone(tx, target)?;
            }
            Ok(Ok(()))
        })
    }

    /// Permanently removes a tombstoned entry, its descendants, and their
    /// content. Never implicit: this is the only way content is destroyed.
    pub fn purge_file(&self, id: FileId) -> CoreResult<()> {
        self.transact(move |tx| {
            let Some(meta) = tx.get(id)? else {
                return Ok(Err(ValidationError::NotFound(id)));
            };
            if !meta.deleted {
                return Ok(Err(ValidationError::NotDeleted(id)));
            }

            for target in tx.descendants(id)?.into_iter().chain(std::iter::once(meta)) {
                tx.purge(target.id)?;
            }
            Ok(Ok(()))
        })
    }

    // ── Reading the tree ─────────────────────────────────────────

    /// The staged metadata of an entry, tombstoned or not.
    pub fn get_file(&self, id: FileId) -> CoreResult<FileMetadata> {
        self.metadata()
            .get(id)?
            .ok_or_else(|| ValidationError::NotFound(id).into())
    }

    /// The account's root folder.
    pub fn root(&self) -> CoreResult<FileMetadata> {
        let Some(root_id) = self.metadata().root()? else {
            return Err(ValidationError::NoSuchPath("/".to_string()).into());
        };
        self.get_file(root_id)
    }

    /// Live children of a folder, sorted by name.
    pub fn list_children(&self, parent: FileId) -> CoreResult<Vec<FileMetadata>> {
        if self.metadata().get(parent)?.is_none() {
            return Err(ValidationError::NotFound(parent).into());
        }
        let mut children: Vec<FileMetadata> = self
            .metadata()
            .children(parent)?
            .into_iter()
            .filter(|m| !m.deleted)
            .collect();
        children.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(children)
    }

    /// The absolute path of an entry; the root is `/`.
    pub fn path_by_id(&self, id: FileId) -> CoreResult<String> {
        let mut meta = self.get_file(id)?;
        let mut segments = Vec::new();
        let mut seen = HashSet::from([meta.id]);
        while !meta.is_root() {
            segments.push(meta.name.clone());
            meta = self.get_file(meta.parent)?;
            if !seen.insert(meta.id) {
                return Err(satchel_store::StorageError::Corruption(format!(
                    "cycle in parent graph near {id}"
                ))
                .into());
            }
        }
        segments.reverse();
        Ok(format!("/{}", segments.join("/")))
    }

    /// Resolves a `/`-separated path against the live tree.
    pub fn get_by_path(&self, path: &str) -> CoreResult<FileMetadata> {
        let mut current = self.root()?;
        for segment in path.split('/').filter(|s| !s.is_empty()) {
            let next = self
                .metadata()
                .children(current.id)?
                .into_iter()
                .find(|m| !m.deleted && m.name == segment);
            match next {
                Some(meta) => current = meta,
                None => return Err(ValidationError::NoSuchPath(segment.to_string()).into()),
            }
        }
        Ok(current)
    }

    // ── Document contents ────────────────────────────────────────

    /// Decrypts and returns a document's bytes.
    pub fn read_document(&self, id: FileId) -> CoreResult<Vec<u8>> {
        let meta = self.get_file(id)?;
        if !meta.is_document() {
            return Err(ValidationError::NotADocument(id).into());
        }
        if meta.deleted {
            return Err(ValidationError::Deleted(id).into());
        }
        let encrypted = self.content().get(id)?.ok_or_else(|| {
            satchel_store::StorageError::Corruption(format!("document {id} has no content"))
        })?;
        Ok(satchel_crypto::decrypt(self.account().master_key(), &encrypted)?)
    }

    /// Encrypts and writes a document's bytes, advancing its version.
    pub fn write_document(&self, id: FileId, bytes: &[u8]) -> CoreResult<()> {
        let encrypted = satchel_crypto::encrypt(self.account().master_key(), bytes)?;
        self.transact(move |tx| {
            let Some(mut meta) = tx.get(id)? else {
                return Ok(Err(ValidationError::NotFound(id)));
            };
            if !meta.is_document() {
                return Ok(Err(ValidationError::NotADocument(id)));
            }
            if meta.deleted {
                return Ok(Err(ValidationError::Deleted(id)));
            }

            meta.bump_content(Side::Local);
            tx.upsert_local(&meta)?;
            tx.put_document(id, &encrypted)?;
            Ok(Ok(()))
        })
    }
}

/// Tombstones one entry, or removes it outright when the server has never
/// seen it.
fn tombstone(tx: &Tx<'_>, mut meta: FileMetadata) -> satchel_store::StorageResult<()> {
    if meta.deleted {
        return Ok(());
    }
    if tx.base_get(meta.id)?.is_none() {
        tx.purge(meta.id)
    } else {
        meta.deleted = true;
        meta.bump_version(Side::Local);
        tx.upsert_local(&meta)
    }
}

fn check_name(name: &str) -> Result<(), ValidationError> {
    if name.is_empty() {
        return Err(ValidationError::InvalidName("name is empty".to_string()));
    }
    if name.len() > MAX_NAME_LENGTH {
        return Err(ValidationError::InvalidName(format!(
            "name exceeds {MAX_NAME_LENGTH} bytes"
        )));
    }
    if name.contains('/') {
        return Err(ValidationError::InvalidName("name contains '/'".to_string()));
    }
    Ok(())
}

/// Names of live siblings under `parent`, optionally excluding one id.
fn live_sibling_names(
    tx: &Tx<'_>,
    parent: FileId,
    excluding: Option<FileId>,
) -> satchel_store::StorageResult<HashSet<String>> {
    Ok(tx
        .children(parent)?
        .into_iter()
        .filter(|m| !m.deleted && Some(m.id) != excluding)
        .map(|m| m.name)
        .collect())
}
