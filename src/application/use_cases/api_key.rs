use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rand::RngCore;
use sha2::{Digest, Sha256};

use crate::app_error::{AppError, AppResult};
use crate::domain::entities::api_key::{ApiKey, PermissionSet};

/// Length of the generated secret in raw bytes (64 hex characters on the wire).
const SECRET_BYTES: usize = 32;
/// Hex characters of the secret stored in clear as the lookup prefix.
pub const PREFIX_LEN: usize = 8;

// ============================================================================
// Repository Trait
// ============================================================================

#[async_trait]
pub trait ApiKeyRepo: Send + Sync {
    async fn create(
        &self,
        owner_id: i64,
        name: &str,
        key_prefix: &str,
        key_digest: &str,
        permissions: PermissionSet,
        expires_at: Option<DateTime<Utc>>,
    ) -> AppResult<ApiKey>;

    /// Equality lookup on (prefix, digest), restricted to enabled keys.
    /// Expiry is checked by the caller so the two gates stay independent.
    async fn find_active(&self, key_prefix: &str, key_digest: &str)
    -> AppResult<Option<ApiKey>>;

    async fn get_by_id(&self, id: i64) -> AppResult<Option<ApiKey>>;

    async fn update(&self, id: i64, patch: ApiKeyPatch) -> AppResult<ApiKey>;

    /// Hard delete. Returns false when the key did not exist.
    async fn delete(&self, id: i64) -> AppResult<bool>;

    async fn list_by_owner(&self, owner_id: i64) -> AppResult<Vec<ApiKey>>;

    async fn update_last_used(&self, id: i64) -> AppResult<()>;
}

/// Partial update for a key. The secret itself is immutable: rotation is
/// delete + recreate, which keeps the one-time-reveal property intact.
#[derive(Debug, Clone, Default)]
pub struct ApiKeyPatch {
    pub name: Option<String>,
    pub permissions: Option<PermissionSet>,
    pub enabled: Option<bool>,
    /// `Some(None)` clears the expiry ("never expires").
    pub expires_at: Option<Option<DateTime<Utc>>>,
}

// ============================================================================
// Key Codec
// ============================================================================

#[derive(Debug, Clone)]
pub struct GeneratedKey {
    /// Plaintext secret, revealed exactly once in the create response.
    pub secret: String,
    pub prefix: String,
    pub digest: String,
}

/// Generate a new secret: 32 random bytes, hex-encoded.
pub fn generate_key() -> GeneratedKey {
    let mut bytes = [0u8; SECRET_BYTES];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    let secret = hex::encode(bytes);

    GeneratedKey {
        prefix: secret[..PREFIX_LEN].to_string(),
        digest: digest_secret(&secret),
        secret,
    }
}

/// SHA-256 hex digest of a secret. Shared by generation and validation.
pub fn digest_secret(secret: &str) -> String {
    hex::encode(Sha256::digest(secret.as_bytes()))
}

// ============================================================================
// Use Cases
// ============================================================================

#[derive(Clone)]
pub struct ApiKeyUseCases {
    repo: Arc<dyn ApiKeyRepo>,
}

impl ApiKeyUseCases {
    pub fn new(repo: Arc<dyn ApiKeyRepo>) -> Self {
        Self { repo }
    }

    // ========================================================================
    // Dashboard Operations
    // ========================================================================

    /// Create a new API key. Returns the stored key and the plaintext secret,
    /// which is never persisted or retrievable again.
    pub async fn create_key(
        &self,
        owner_id: i64,
        name: &str,
        permissions: Option<PermissionSet>,
        expires_at: Option<DateTime<Utc>>,
    ) -> AppResult<(ApiKey, String)> {
        let generated = generate_key();

        let name = name.trim();
        let name = if name.is_empty() { "Default" } else { name };

        let key = self
            .repo
            .create(
                owner_id,
                name,
                &generated.prefix,
                &generated.digest,
                permissions.unwrap_or_default(),
                expires_at,
            )
            .await?;

        Ok((key, generated.secret))
    }

    pub async fn update_key(&self, id: i64, patch: ApiKeyPatch) -> AppResult<ApiKey> {
        if let Some(name) = &patch.name
            && name.trim().is_empty()
        {
            return Err(AppError::InvalidInput("name must not be empty".into()));
        }
        self.repo.update(id, patch).await
    }

    pub async fn delete_key(&self, id: i64) -> AppResult<bool> {
        self.repo.delete(id).await
    }

    pub async fn list_keys(&self, owner_id: i64) -> AppResult<Vec<ApiKey>> {
        self.repo.list_by_owner(owner_id).await
    }

    pub async fn get_key(&self, id: i64) -> AppResult<ApiKey> {
        self.repo.get_by_id(id).await?.ok_or(AppError::NotFound)
    }

    // ========================================================================
    // Validation
    // ========================================================================

    /// Validate a presented secret. Returns the key (with its permission set)
    /// when the secret matches an enabled, unexpired key; `None` otherwise.
    ///
    /// Store read errors also yield `None`: validation fails closed rather
    /// than leaking internals of a security-sensitive check.
    pub async fn validate(&self, presented: &str) -> Option<ApiKey> {
        // Shorter secrets degrade to a whole-string prefix; the lookup simply
        // finds nothing.
        let prefix = presented.get(..PREFIX_LEN).unwrap_or(presented);
        let digest = digest_secret(presented);

        let key = match self.repo.find_active(prefix, &digest).await {
            Ok(found) => found?,
            Err(err) => {
                tracing::warn!(error = %err, "API key lookup failed, failing closed");
                return None;
            }
        };

        if key.is_expired(Utc::now()) {
            return None;
        }

        // Best-effort, off the request path. A failed write must not fail
        // the validation.
        let repo = self.repo.clone();
        let key_id = key.id;
        tokio::spawn(async move {
            if let Err(err) = repo.update_last_used(key_id).await {
                tracing::warn!(key_id, error = %err, "Failed to update last_used_at");
            }
        });

        Some(key)
    }
}
