//! Encryption layer for Satchel.
//!
//! Document contents and file names are encrypted on the client before they
//! reach the remote gateway; the server only ever stores ciphertext. This
//! crate supplies that capability as two independent pieces:
//!
//! - **Content encryption**: ChaCha20-Poly1305 AEAD keyed by a 32-byte
//!   master key. The [`EncryptedBytes`] envelope (nonce + ciphertext) is
//!   what the stores and the gateway pass around.
//! - **Account identity**: an Ed25519 keypair used to sign requests and
//!   verify server responses.
//!
//! The sync engine consumes both as opaque capabilities; nothing outside
//! this crate depends on the primitive choices.

mod cipher;
mod error;
mod key;
mod signing;

pub use cipher::{decrypt, decrypt_string, encrypt, encrypt_string, EncryptedBytes, NONCE_SIZE, TAG_SIZE};
pub use error::{CryptoError, CryptoResult};
pub use key::{MasterKey, KEY_SIZE};
pub use signing::{KeyPair, Signature, SigningKey, VerifyingKey};
