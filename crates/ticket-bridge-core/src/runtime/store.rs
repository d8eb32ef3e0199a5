// crates/ticket-bridge-core/src/runtime/store.rs
// ============================================================================
// Module: Ticket Bridge In-Memory Credential Store
// Description: Map-backed tenant configuration store with pluggable decryption.
// Purpose: Provide a deterministic credential store for tests and local runs.
// Dependencies: crate::core, crate::interfaces
// ============================================================================

//! ## Overview
//! This module provides [`InMemoryCredentialStore`], a simple implementation of
//! [`CredentialStore`] for tests and local demos. Decryption is delegated to a
//! [`SecretDecryptor`] so hosts can plug in their key management.
//! [`PlaintextDecryptor`] accepts `plain:`-prefixed values and is not intended
//! for production use.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;

use async_trait::async_trait;

use crate::core::EncryptedSecret;
use crate::core::Secret;
use crate::core::TenantConfig;
use crate::core::TenantId;
use crate::interfaces::CredentialError;
use crate::interfaces::CredentialStore;

// ============================================================================
// SECTION: Decryption
// ============================================================================

/// Prefix marking plaintext values for [`PlaintextDecryptor`].
pub const PLAINTEXT_PREFIX: &str = "plain:";

/// Synchronous secret decryption backend.
pub trait SecretDecryptor: Send + Sync {
    /// Decrypts ciphertext into secret material.
    ///
    /// # Errors
    ///
    /// Returns [`CredentialError::Decryption`] when the ciphertext is invalid.
    fn decrypt(&self, ciphertext: &EncryptedSecret) -> Result<Secret, CredentialError>;
}

/// Development decryptor that unwraps `plain:`-prefixed values.
///
/// # Invariants
/// - Values without the prefix or with an empty remainder fail to decrypt.
#[derive(Debug, Default, Clone, Copy)]
pub struct PlaintextDecryptor;

impl PlaintextDecryptor {
    /// Wraps plaintext in the form this decryptor accepts.
    #[must_use]
    pub fn seal(plaintext: &str) -> EncryptedSecret {
        EncryptedSecret::new(format!("{PLAINTEXT_PREFIX}{plaintext}"))
    }
}

impl SecretDecryptor for PlaintextDecryptor {
    fn decrypt(&self, ciphertext: &EncryptedSecret) -> Result<Secret, CredentialError> {
        match ciphertext.ciphertext().strip_prefix(PLAINTEXT_PREFIX) {
            Some(value) if !value.is_empty() => Ok(Secret::new(value)),
            _ => Err(CredentialError::Decryption("unrecognized ciphertext".to_string())),
        }
    }
}

// ============================================================================
// SECTION: In-Memory Store
// ============================================================================

/// In-memory credential store for tests and examples.
#[derive(Clone)]
pub struct InMemoryCredentialStore {
    /// Tenant configuration map protected by a mutex.
    tenants: Arc<Mutex<BTreeMap<TenantId, TenantConfig>>>,
    /// Decryption backend.
    decryptor: Arc<dyn SecretDecryptor>,
}

impl Default for InMemoryCredentialStore {
    fn default() -> Self {
        Self::new(Arc::new(PlaintextDecryptor))
    }
}

impl InMemoryCredentialStore {
    /// Creates an empty store using the given decryptor.
    #[must_use]
    pub fn new(decryptor: Arc<dyn SecretDecryptor>) -> Self {
        Self { tenants: Arc::new(Mutex::new(BTreeMap::new())), decryptor }
    }

    /// Inserts or replaces a tenant configuration.
    ///
    /// # Errors
    ///
    /// Returns [`CredentialError::Unavailable`] when the store lock is poisoned.
    pub fn upsert(&self, config: TenantConfig) -> Result<Option<TenantConfig>, CredentialError> {
        let mut guard = self.lock()?;
        Ok(guard.insert(config.tenant_id.clone(), config))
    }

    /// Soft-deletes a tenant; returns false when it is unknown.
    ///
    /// # Errors
    ///
    /// Returns [`CredentialError::Unavailable`] when the store lock is poisoned.
    pub fn deactivate(&self, tenant_id: &TenantId) -> Result<bool, CredentialError> {
        let mut guard = self.lock()?;
        let Some(config) = guard.get_mut(tenant_id) else {
            return Ok(false);
        };
        config.active = false;
        Ok(true)
    }

    /// Acquires the tenant map lock.
    fn lock(&self) -> Result<MutexGuard<'_, BTreeMap<TenantId, TenantConfig>>, CredentialError> {
        self.tenants
            .lock()
            .map_err(|_| {
                CredentialError::Unavailable("credential store mutex poisoned".to_string())
            })
    }
}

#[async_trait]
impl CredentialStore for InMemoryCredentialStore {
    async fn lookup(&self, tenant_id: &TenantId) -> Result<Option<TenantConfig>, CredentialError> {
        let guard = self.lock()?;
        Ok(guard.get(tenant_id).cloned())
    }

    async fn decrypt(&self, ciphertext: &EncryptedSecret) -> Result<Secret, CredentialError> {
        self.decryptor.decrypt(ciphertext)
    }
}
