//! Raw SQL operations shared by the transaction wrapper and the store views.
//!
//! Metadata rows are stored as JSON, keyed by the id's string form. The
//! staged view is computed here: `local_metadata` rows shadow
//! `base_metadata` rows with the same id.

use crate::error::{StorageError, StorageResult};
use rusqlite::{params, Connection, OptionalExtension};
use satchel_crypto::EncryptedBytes;
use satchel_types::{Cursor, FileId, FileMetadata};
use std::collections::{HashMap, VecDeque};

// ── Metadata tables ──────────────────────────────────────────────

pub(crate) fn meta_get(
    conn: &Connection,
    table: &str,
    id: FileId,
) -> StorageResult<Option<FileMetadata>> {
    let json: Option<String> = conn
        .query_row(
            &format!("SELECT meta FROM {table} WHERE id = ?1"),
            params![id.to_string()],
            |row| row.get(0),
        )
        .optional()?;
    json.map(|j| serde_json::from_str(&j).map_err(Into::into))
        .transpose()
}

pub(crate) fn meta_all(conn: &Connection, table: &str) -> StorageResult<Vec<FileMetadata>> {
    let mut stmt = conn.prepare(&format!("SELECT meta FROM {table}"))?;
    let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
    let mut out = Vec::new();
    for json in rows {
        out.push(serde_json::from_str(&json?)?);
    }
    Ok(out)
}

pub(crate) fn meta_upsert(
    conn: &Connection,
    table: &str,
    meta: &FileMetadata,
) -> StorageResult<()> {
    let json = serde_json::to_string(meta)?;
    conn.execute(
        &format!(
            "INSERT INTO {table} (id, meta) VALUES (?1, ?2)
             ON CONFLICT(id) DO UPDATE SET meta = excluded.meta"
        ),
        params![meta.id.to_string(), json],
    )?;
    Ok(())
}

pub(crate) fn meta_remove(conn: &Connection, table: &str, id: FileId) -> StorageResult<()> {
    conn.execute(
        &format!("DELETE FROM {table} WHERE id = ?1"),
        params![id.to_string()],
    )?;
    Ok(())
}

// ── Staged view ──────────────────────────────────────────────────

pub(crate) fn staged_get(conn: &Connection, id: FileId) -> StorageResult<Option<FileMetadata>> {
    match meta_get(conn, "local_metadata", id)? {
        Some(meta) => Ok(Some(meta)),
        None => meta_get(conn, "base_metadata", id),
    }
}

pub(crate) fn staged_all(conn: &Connection) -> StorageResult<Vec<FileMetadata>> {
    let mut by_id: HashMap<FileId, FileMetadata> = meta_all(conn, "base_metadata")?
        .into_iter()
        .map(|m| (m.id, m))
        .collect();
    for meta in meta_all(conn, "local_metadata")? {
        by_id.insert(meta.id, meta);
    }
    let mut all: Vec<FileMetadata> = by_id.into_values().collect();
    all.sort_by_key(|m| m.id);
    Ok(all)
}

pub(crate) fn staged_children(
    conn: &Connection,
    parent: FileId,
) -> StorageResult<Vec<FileMetadata>> {
    Ok(staged_all(conn)?
        .into_iter()
        .filter(|m| m.parent == parent && m.id != parent)
        .collect())
}

pub(crate) fn staged_descendants(
    conn: &Connection,
    id: FileId,
) -> StorageResult<Vec<FileMetadata>> {
    let all = staged_all(conn)?;
    let mut children_of: HashMap<FileId, Vec<&FileMetadata>> = HashMap::new();
    for meta in &all {
        if !meta.is_root() {
            children_of.entry(meta.parent).or_default().push(meta);
        }
    }

    let mut result = Vec::new();
    let mut queue = VecDeque::from([id]);
    while let Some(next) = queue.pop_front() {
        if let Some(children) = children_of.get(&next) {
            for child in children {
                if result.len() >= all.len() {
                    return Err(StorageError::Corruption(format!(
                        "cycle in parent graph near {next}"
                    )));
                }
                result.push((*child).clone());
                queue.push_back(child.id);
            }
        }
    }
    Ok(result)
}

// ── Documents ────────────────────────────────────────────────────

pub(crate) fn document_put(
    conn: &Connection,
    id: FileId,
    content: &EncryptedBytes,
) -> StorageResult<()> {
    conn.execute(
        "INSERT INTO documents (id, nonce, body) VALUES (?1, ?2, ?3)
         ON CONFLICT(id) DO UPDATE SET nonce = excluded.nonce, body = excluded.body",
        params![id.to_string(), content.nonce.as_slice(), content.ciphertext],
    )?;
    Ok(())
}

pub(crate) fn document_get(
    conn: &Connection,
    id: FileId,
) -> StorageResult<Option<EncryptedBytes>> {
    let row: Option<(Vec<u8>, Vec<u8>)> = conn
        .query_row(
            "SELECT nonce, body FROM documents WHERE id = ?1",
            params![id.to_string()],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()?;
    row.map(|(nonce, body)| {
        let nonce: [u8; satchel_crypto::NONCE_SIZE] = nonce.try_into().map_err(|_| {
            StorageError::Corruption(format!("document {id} has malformed nonce"))
        })?;
        Ok(EncryptedBytes { nonce, ciphertext: body })
    })
    .transpose()
}

pub(crate) fn document_remove(conn: &Connection, id: FileId) -> StorageResult<()> {
    conn.execute("DELETE FROM documents WHERE id = ?1", params![id.to_string()])?;
    Ok(())
}

// ── Sync state key-value rows ────────────────────────────────────

pub(crate) fn kv_get(conn: &Connection, key: &str) -> StorageResult<Option<String>> {
    Ok(conn
        .query_row(
            "SELECT value FROM sync_state WHERE key = ?1",
            params![key],
            |row| row.get(0),
        )
        .optional()?)
}

pub(crate) fn kv_set(conn: &Connection, key: &str, value: &str) -> StorageResult<()> {
    conn.execute(
        "INSERT INTO sync_state (key, value) VALUES (?1, ?2)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        params![key, value],
    )?;
    Ok(())
}

pub(crate) fn cursor_get(conn: &Connection) -> StorageResult<Cursor> {
    match kv_get(conn, "cursor")? {
        Some(value) => {
            let seq = value.parse::<u64>().map_err(|_| {
                StorageError::Corruption(format!("cursor row is not a number: {value}"))
            })?;
            Ok(Cursor::new(seq))
        }
        None => Ok(Cursor::ZERO),
    }
}

pub(crate) fn cursor_set(conn: &Connection, cursor: Cursor) -> StorageResult<()> {
    kv_set(conn, "cursor", &cursor.value().to_string())
}

pub(crate) fn root_get(conn: &Connection) -> StorageResult<Option<FileId>> {
    kv_get(conn, "root")?
        .map(|value| {
            FileId::parse(&value)
                .map_err(|_| StorageError::Corruption(format!("root row is not an id: {value}")))
        })
        .transpose()
}

pub(crate) fn root_set(conn: &Connection, id: FileId) -> StorageResult<()> {
    kv_set(conn, "root", &id.to_string())
}
