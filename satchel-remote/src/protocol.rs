//! Wire types exchanged with the remote server.

use satchel_crypto::{CryptoError, MasterKey};
use satchel_types::{Cursor, FileId, FileKind, FileMetadata, Side};
use serde::{Deserialize, Serialize};

/// Metadata as the server sees it: structure in the clear, name encrypted.
///
/// `name` is the base64-encoded AEAD envelope of the plaintext name; only
/// clients holding the account key can read it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteFileMetadata {
    pub id: FileId,
    pub parent: FileId,
    /// AEAD-encrypted name, base64.
    pub name: String,
    pub kind: FileKind,
    pub deleted: bool,
    pub content_version: u64,
    pub content_revision: u64,
}

impl RemoteFileMetadata {
    /// Encrypts a local entry's name for the wire.
    pub fn seal(meta: &FileMetadata, key: &MasterKey) -> Result<Self, CryptoError> {
        Ok(Self {
            id: meta.id,
            parent: meta.parent,
            name: satchel_crypto::encrypt_string(key, &meta.name)?,
            kind: meta.kind,
            deleted: meta.deleted,
            content_version: meta.content_version,
            content_revision: meta.content_revision,
        })
    }

    /// Decrypts the name back into a local entry, attributed to the remote
    /// side.
    pub fn open(&self, key: &MasterKey) -> Result<FileMetadata, CryptoError> {
        Ok(FileMetadata {
            id: self.id,
            parent: self.parent,
            name: satchel_crypto::decrypt_string(key, &self.name)?,
            kind: self.kind,
            deleted: self.deleted,
            content_version: self.content_version,
            content_revision: self.content_revision,
            last_modified_by: Side::Remote,
        })
    }
}

/// One entry of remote history: a metadata state and the server sequence
/// number at which it was recorded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteChange {
    pub seq: u64,
    pub metadata: RemoteFileMetadata,
}

/// Everything that changed on the server since a cursor, plus the
/// high-water mark the cursor may advance to once it is all incorporated.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChangeSet {
    pub changes: Vec<RemoteChange>,
    pub as_of: Cursor,
}

/// A compare-and-set metadata push: `old` is the state the client believes
/// the server holds (`None` for a brand-new entry). The server rejects the
/// diff if its copy has moved past `old`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetadataDiff {
    pub old: Option<RemoteFileMetadata>,
    pub new: RemoteFileMetadata,
}

/// Request body for fetching changes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchChangesRequest {
    pub since: Cursor,
}

/// Response body for a metadata push.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PushMetadataResponse {
    pub cursor: Cursor,
}

/// Response body for a content fetch: the base64 AEAD envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentResponse {
    pub content: String,
}
