//! Account material: username, endpoint, and key material.
//!
//! Created once by account creation or import, immutable thereafter. The
//! exported account string is a base64url JSON payload carrying both keys;
//! importing it on another device yields the same identity and the ability
//! to decrypt everything the account ever stored.

use crate::error::{CoreError, CoreResult};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use satchel_crypto::{KeyPair, MasterKey};
use serde::{Deserialize, Serialize};

/// One account: who we are, where the server is, and the keys.
pub struct Account {
    pub username: String,
    pub api_url: String,
    master: MasterKey,
    signing_secret: [u8; 32],
}

/// Serialized form of an account, used for export and for the store's
/// account row. Key material is base64url.
#[derive(Serialize, Deserialize)]
struct AccountPayload {
    username: String,
    api_url: String,
    master_key: String,
    signing_key: String,
}

impl Account {
    /// Creates a brand-new account with fresh keys.
    #[must_use]
    pub fn generate(username: impl Into<String>, api_url: impl Into<String>) -> Self {
        let keypair = KeyPair::generate();
        Self {
            username: username.into(),
            api_url: api_url.into(),
            master: MasterKey::generate(),
            signing_secret: keypair.signing_key.to_bytes(),
        }
    }

    /// The symmetric content key.
    #[must_use]
    pub fn master_key(&self) -> &MasterKey {
        &self.master
    }

    /// The Ed25519 identity keypair.
    #[must_use]
    pub fn keypair(&self) -> KeyPair {
        KeyPair::from_secret_bytes(&self.signing_secret)
    }

    /// Exports the account as a single string the user can carry to
    /// another device.
    pub fn export(&self) -> CoreResult<String> {
        let payload = AccountPayload {
            username: self.username.clone(),
            api_url: self.api_url.clone(),
            master_key: self.master.to_base64(),
            signing_key: URL_SAFE_NO_PAD.encode(self.signing_secret),
        };
        let json = serde_json::to_string(&payload)
            .map_err(|e| CoreError::InvalidAccount(e.to_string()))?;
        Ok(URL_SAFE_NO_PAD.encode(json))
    }

    /// Imports an exported account string.
    pub fn import(exported: &str) -> CoreResult<Self> {
        let json = URL_SAFE_NO_PAD
            .decode(exported.trim())
            .map_err(|e| CoreError::InvalidAccount(format!("not base64: {e}")))?;
        let payload: AccountPayload = serde_json::from_slice(&json)
            .map_err(|e| CoreError::InvalidAccount(format!("bad payload: {e}")))?;
        Self::from_payload(payload)
    }

    /// Serializes for the store's account row.
    pub(crate) fn to_json(&self) -> CoreResult<String> {
        let payload = AccountPayload {
            username: self.username.clone(),
            api_url: self.api_url.clone(),
            master_key: self.master.to_base64(),
            signing_key: URL_SAFE_NO_PAD.encode(self.signing_secret),
        };
        serde_json::to_string(&payload).map_err(|e| CoreError::InvalidAccount(e.to_string()))
    }

    /// Deserializes from the store's account row.
    pub(crate) fn from_json(json: &str) -> CoreResult<Self> {
        let payload: AccountPayload = serde_json::from_str(json)
            .map_err(|e| CoreError::InvalidAccount(format!("bad account row: {e}")))?;
        Self::from_payload(payload)
    }

    fn from_payload(payload: AccountPayload) -> CoreResult<Self> {
        let master = MasterKey::from_base64(&payload.master_key)?;
        let signing = URL_SAFE_NO_PAD
            .decode(&payload.signing_key)
            .map_err(|e| CoreError::InvalidAccount(format!("bad signing key: {e}")))?;
        let signing_secret: [u8; 32] = signing
            .try_into()
            .map_err(|_| CoreError::InvalidAccount("signing key must be 32 bytes".to_string()))?;
        Ok(Self {
            username: payload.username,
            api_url: payload.api_url,
            master,
            signing_secret,
        })
    }
}

impl std::fmt::Debug for Account {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Account")
            .field("username", &self.username)
            .field("api_url", &self.api_url)
            .field("keys", &"[REDACTED]")
            .finish()
    }
}
