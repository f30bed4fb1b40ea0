// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Wallet model and the stores the service consumes.
//!
//! ## Modules
//!
//! - `keys` - secp256k1 key pairs and signature verification
//! - `permissions` - per-hostname permission policy
//! - `store` - `WalletStore` contract, wallet events, in-memory store
//! - `networks` - `NetworkStore` contract and in-memory store
//! - `tokens` - `TokenStore` contract for long-living API tokens

use std::collections::HashMap;

pub mod keys;
pub mod networks;
pub mod permissions;
pub mod store;
pub mod tokens;

pub use keys::{KeyPair, Metadata};
pub use networks::{InMemoryNetworkStore, Network, NetworkStore};
pub use permissions::{AccessMode, Permissions, PublicKeysPermission};
pub use store::{InMemoryWalletStore, StoreError, WalletEvent, WalletStore};
pub use tokens::{
    InMemoryTokenStore, TokenDescription, TokenEvent, TokenStore, WalletCredentials,
};

#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum WalletError {
    #[error("the public key {0:?} does not exist")]
    PublicKeyDoesNotExist(String),

    #[error("the public key {0:?} is tainted")]
    PublicKeyIsTainted(String),

    #[error("the public key {0:?} is already tainted")]
    PublicKeyAlreadyTainted(String),

    #[error("the public key {0:?} is not tainted")]
    PublicKeyIsNotTainted(String),

    #[error("the wallet name is required")]
    NameIsRequired,
}

/// A named set of key pairs plus the permissions granted to each hostname.
#[derive(Debug, Clone)]
pub struct Wallet {
    name: String,
    key_pairs: Vec<KeyPair>,
    permissions: HashMap<String, Permissions>,
}

impl Wallet {
    pub fn new(name: impl Into<String>) -> Result<Self, WalletError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(WalletError::NameIsRequired);
        }
        Ok(Self {
            name,
            key_pairs: Vec::new(),
            permissions: HashMap::new(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) -> Result<(), WalletError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(WalletError::NameIsRequired);
        }
        self.name = name;
        Ok(())
    }

    pub fn generate_key_pair(&mut self, metadata: Vec<Metadata>) -> KeyPair {
        let index = self.key_pairs.len() as u32 + 1;
        let key_pair = KeyPair::generate(index, metadata);
        self.key_pairs.push(key_pair.clone());
        key_pair
    }

    pub fn list_key_pairs(&self) -> &[KeyPair] {
        &self.key_pairs
    }

    pub fn describe_key_pair(&self, public_key: &str) -> Result<&KeyPair, WalletError> {
        self.key_pairs
            .iter()
            .find(|kp| kp.public_key() == public_key)
            .ok_or_else(|| WalletError::PublicKeyDoesNotExist(public_key.to_string()))
    }

    fn key_pair_mut(&mut self, public_key: &str) -> Result<&mut KeyPair, WalletError> {
        self.key_pairs
            .iter_mut()
            .find(|kp| kp.public_key() == public_key)
            .ok_or_else(|| WalletError::PublicKeyDoesNotExist(public_key.to_string()))
    }

    pub fn taint_key(&mut self, public_key: &str) -> Result<(), WalletError> {
        let kp = self.key_pair_mut(public_key)?;
        if kp.is_tainted() {
            return Err(WalletError::PublicKeyAlreadyTainted(public_key.to_string()));
        }
        kp.set_tainted(true);
        Ok(())
    }

    pub fn untaint_key(&mut self, public_key: &str) -> Result<(), WalletError> {
        let kp = self.key_pair_mut(public_key)?;
        if !kp.is_tainted() {
            return Err(WalletError::PublicKeyIsNotTainted(public_key.to_string()));
        }
        kp.set_tainted(false);
        Ok(())
    }

    pub fn annotate_key(
        &mut self,
        public_key: &str,
        metadata: Vec<Metadata>,
    ) -> Result<(), WalletError> {
        self.key_pair_mut(public_key)?.set_metadata(metadata);
        Ok(())
    }

    /// Permissions granted to `hostname`, or the deny-all default.
    pub fn permissions(&self, hostname: &str) -> Permissions {
        self.permissions.get(hostname).cloned().unwrap_or_default()
    }

    /// Replaces the permissions of `hostname`.
    ///
    /// Every allow-listed key must exist and be untainted at grant time.
    pub fn update_permissions(
        &mut self,
        hostname: &str,
        permissions: Permissions,
    ) -> Result<(), WalletError> {
        for public_key in &permissions.public_keys.allowed_keys {
            let kp = self.describe_key_pair(public_key)?;
            if kp.is_tainted() {
                return Err(WalletError::PublicKeyIsTainted(public_key.clone()));
            }
        }
        self.permissions.insert(hostname.to_string(), permissions);
        Ok(())
    }

    /// Stores `permissions` without checking the allow-list against the keys.
    #[cfg(test)]
    pub(crate) fn set_permissions_unchecked(&mut self, hostname: &str, permissions: Permissions) {
        self.permissions.insert(hostname.to_string(), permissions);
    }

    pub fn revoke_permissions(&mut self, hostname: &str) {
        self.permissions.remove(hostname);
    }

    pub fn purge_permissions(&mut self) {
        self.permissions.clear();
    }

    pub fn permitted_hostnames(&self) -> Vec<String> {
        let mut hostnames: Vec<String> = self.permissions.keys().cloned().collect();
        hostnames.sort();
        hostnames
    }

    /// Signs `message` with the key identified by `public_key`.
    ///
    /// Tainted keys are refused regardless of any connection policy.
    pub fn sign(&self, public_key: &str, message: &[u8]) -> Result<String, WalletError> {
        let kp = self.describe_key_pair(public_key)?;
        if kp.is_tainted() {
            return Err(WalletError::PublicKeyIsTainted(public_key.to_string()));
        }
        Ok(kp.sign(message))
    }
}
