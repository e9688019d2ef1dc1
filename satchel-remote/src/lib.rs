//! Remote gateway layer for Satchel.
//!
//! The sync engine talks to the server exclusively through the
//! [`RemoteGateway`] trait: fetch metadata changes since a cursor, push a
//! metadata diff, fetch or push one document's ciphertext. Everything on
//! the wire is either opaque ciphertext or structural metadata; plaintext
//! names and contents never leave the client.
//!
//! Two implementations ship here:
//!
//! - [`HttpGateway`]: the production client (reqwest, request signing)
//! - [`MemoryGateway`]: an in-process reference server used by tests and
//!   local development; it enforces the same sequencing and stale-diff
//!   rules the real server does

mod error;
mod gateway;
mod http;
mod memory;
mod protocol;

pub use error::{RemoteError, RemoteResult};
pub use gateway::RemoteGateway;
pub use http::{HttpGateway, HttpGatewayConfig};
pub use memory::MemoryGateway;
pub use protocol::{ChangeSet, ContentResponse, FetchChangesRequest, MetadataDiff,
    PushMetadataResponse, RemoteChange, RemoteFileMetadata};
