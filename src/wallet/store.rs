// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Wallet store contract and an in-memory implementation.
//!
//! The service never persists wallets itself: it talks to a [`WalletStore`].
//! Stores are expected to serialize concurrent mutations of a given wallet.
//! Changes made behind the service's back are announced as [`WalletEvent`]s
//! so live connections can be kept in sync.

use std::collections::{HashMap, HashSet};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use tokio::sync::broadcast;

use super::Wallet;

const EVENT_CHANNEL_CAPACITY: usize = 64;

#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("the wallet {0:?} does not exist")]
    WalletDoesNotExist(String),

    #[error("the wallet {0:?} already exists")]
    WalletAlreadyExists(String),

    #[error("the wallet {0:?} is locked")]
    WalletIsLocked(String),

    #[error("wrong passphrase")]
    WrongPassphrase,

    #[error("store error: {0}")]
    Internal(String),
}

/// Change made to a wallet outside of a connection.
#[derive(Debug, Clone)]
pub enum WalletEvent {
    Updated(Wallet),
    Renamed { previous_name: String, wallet: Wallet },
    Locked(String),
    Removed(String),
}

#[async_trait]
pub trait WalletStore: Send + Sync {
    async fn wallet_exists(&self, name: &str) -> Result<bool, StoreError>;

    async fn list_wallets(&self) -> Result<Vec<String>, StoreError>;

    /// Returns the wallet. It must have been unlocked first.
    async fn get_wallet(&self, name: &str) -> Result<Wallet, StoreError>;

    async fn unlock_wallet(&self, name: &str, passphrase: &str) -> Result<(), StoreError>;

    async fn lock_wallet(&self, name: &str) -> Result<(), StoreError>;

    async fn is_wallet_already_unlocked(&self, name: &str) -> Result<bool, StoreError>;

    /// Creates or overwrites a wallet protected by `passphrase`.
    async fn save_wallet(&self, wallet: &Wallet, passphrase: &str) -> Result<(), StoreError>;

    /// Persists changes to an unlocked wallet.
    async fn update_wallet(&self, wallet: &Wallet) -> Result<(), StoreError>;

    fn subscribe(&self) -> broadcast::Receiver<WalletEvent>;
}

struct StoredWallet {
    wallet: Wallet,
    passphrase_digest: [u8; 32],
}

#[derive(Default)]
struct Inner {
    wallets: HashMap<String, StoredWallet>,
    unlocked: HashSet<String>,
}

/// Wallet store kept in process memory.
pub struct InMemoryWalletStore {
    inner: RwLock<Inner>,
    events: broadcast::Sender<WalletEvent>,
}

fn digest(passphrase: &str) -> [u8; 32] {
    Sha256::digest(passphrase.as_bytes()).into()
}

impl InMemoryWalletStore {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            inner: RwLock::new(Inner::default()),
            events,
        }
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Inner>, StoreError> {
        self.inner
            .read()
            .map_err(|_| StoreError::Internal("wallet store lock poisoned".to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Inner>, StoreError> {
        self.inner
            .write()
            .map_err(|_| StoreError::Internal("wallet store lock poisoned".to_string()))
    }

    fn publish(&self, event: WalletEvent) {
        // No subscriber is not an error.
        let _ = self.events.send(event);
    }

    /// Creates a wallet with one key and leaves it unlocked.
    pub fn create_wallet(&self, name: &str, passphrase: &str) -> Result<Wallet, StoreError> {
        let mut wallet =
            Wallet::new(name).map_err(|e| StoreError::Internal(e.to_string()))?;
        wallet.generate_key_pair(vec![]);

        let mut inner = self.write()?;
        if inner.wallets.contains_key(name) {
            return Err(StoreError::WalletAlreadyExists(name.to_string()));
        }
        inner.wallets.insert(
            name.to_string(),
            StoredWallet {
                wallet: wallet.clone(),
                passphrase_digest: digest(passphrase),
            },
        );
        inner.unlocked.insert(name.to_string());
        Ok(wallet)
    }

    pub fn delete_wallet(&self, name: &str) -> Result<(), StoreError> {
        {
            let mut inner = self.write()?;
            if inner.wallets.remove(name).is_none() {
                return Err(StoreError::WalletDoesNotExist(name.to_string()));
            }
            inner.unlocked.remove(name);
        }
        self.publish(WalletEvent::Removed(name.to_string()));
        Ok(())
    }

    pub fn rename_wallet(&self, name: &str, new_name: &str) -> Result<(), StoreError> {
        let renamed = {
            let mut inner = self.write()?;
            if inner.wallets.contains_key(new_name) {
                return Err(StoreError::WalletAlreadyExists(new_name.to_string()));
            }
            let mut stored = inner
                .wallets
                .remove(name)
                .ok_or_else(|| StoreError::WalletDoesNotExist(name.to_string()))?;
            stored
                .wallet
                .set_name(new_name)
                .map_err(|e| StoreError::Internal(e.to_string()))?;
            let wallet = stored.wallet.clone();
            inner.wallets.insert(new_name.to_string(), stored);
            if inner.unlocked.remove(name) {
                inner.unlocked.insert(new_name.to_string());
            }
            wallet
        };
        self.publish(WalletEvent::Renamed {
            previous_name: name.to_string(),
            wallet: renamed,
        });
        Ok(())
    }
}

impl Default for InMemoryWalletStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl WalletStore for InMemoryWalletStore {
    async fn wallet_exists(&self, name: &str) -> Result<bool, StoreError> {
        Ok(self.read()?.wallets.contains_key(name))
    }

    async fn list_wallets(&self) -> Result<Vec<String>, StoreError> {
        let mut names: Vec<String> = self.read()?.wallets.keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    async fn get_wallet(&self, name: &str) -> Result<Wallet, StoreError> {
        let inner = self.read()?;
        let stored = inner
            .wallets
            .get(name)
            .ok_or_else(|| StoreError::WalletDoesNotExist(name.to_string()))?;
        if !inner.unlocked.contains(name) {
            return Err(StoreError::WalletIsLocked(name.to_string()));
        }
        Ok(stored.wallet.clone())
    }

    async fn unlock_wallet(&self, name: &str, passphrase: &str) -> Result<(), StoreError> {
        let mut inner = self.write()?;
        let stored = inner
            .wallets
            .get(name)
            .ok_or_else(|| StoreError::WalletDoesNotExist(name.to_string()))?;
        if stored.passphrase_digest != digest(passphrase) {
            return Err(StoreError::WrongPassphrase);
        }
        inner.unlocked.insert(name.to_string());
        Ok(())
    }

    async fn lock_wallet(&self, name: &str) -> Result<(), StoreError> {
        {
            let mut inner = self.write()?;
            if !inner.wallets.contains_key(name) {
                return Err(StoreError::WalletDoesNotExist(name.to_string()));
            }
            inner.unlocked.remove(name);
        }
        self.publish(WalletEvent::Locked(name.to_string()));
        Ok(())
    }

    async fn is_wallet_already_unlocked(&self, name: &str) -> Result<bool, StoreError> {
        let inner = self.read()?;
        if !inner.wallets.contains_key(name) {
            return Err(StoreError::WalletDoesNotExist(name.to_string()));
        }
        Ok(inner.unlocked.contains(name))
    }

    async fn save_wallet(&self, wallet: &Wallet, passphrase: &str) -> Result<(), StoreError> {
        let existed = {
            let mut inner = self.write()?;
            let existed = inner
                .wallets
                .insert(
                    wallet.name().to_string(),
                    StoredWallet {
                        wallet: wallet.clone(),
                        passphrase_digest: digest(passphrase),
                    },
                )
                .is_some();
            inner.unlocked.insert(wallet.name().to_string());
            existed
        };
        if existed {
            self.publish(WalletEvent::Updated(wallet.clone()));
        }
        Ok(())
    }

    async fn update_wallet(&self, wallet: &Wallet) -> Result<(), StoreError> {
        {
            let mut inner = self.write()?;
            if !inner.unlocked.contains(wallet.name()) {
                return if inner.wallets.contains_key(wallet.name()) {
                    Err(StoreError::WalletIsLocked(wallet.name().to_string()))
                } else {
                    Err(StoreError::WalletDoesNotExist(wallet.name().to_string()))
                };
            }
            let stored = inner
                .wallets
                .get_mut(wallet.name())
                .ok_or_else(|| StoreError::WalletDoesNotExist(wallet.name().to_string()))?;
            stored.wallet = wallet.clone();
        }
        self.publish(WalletEvent::Updated(wallet.clone()));
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<WalletEvent> {
        self.events.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn wallets_must_be_unlocked_to_be_read() {
        let store = InMemoryWalletStore::new();
        store.create_wallet("w1", "pass").unwrap();
        assert!(store.get_wallet("w1").await.is_ok());

        store.lock_wallet("w1").await.unwrap();
        assert_eq!(
            store.get_wallet("w1").await.unwrap_err(),
            StoreError::WalletIsLocked("w1".to_string())
        );
        assert_eq!(
            store.unlock_wallet("w1", "nope").await.unwrap_err(),
            StoreError::WrongPassphrase
        );
        store.unlock_wallet("w1", "pass").await.unwrap();
        assert!(store.is_wallet_already_unlocked("w1").await.unwrap());
        assert_eq!(
            store.get_wallet("missing").await.unwrap_err(),
            StoreError::WalletDoesNotExist("missing".to_string())
        );
    }

    #[tokio::test]
    async fn mutations_are_announced() {
        let store = InMemoryWalletStore::new();
        let mut events = store.subscribe();
        let mut wallet = store.create_wallet("w1", "pass").unwrap();

        wallet.generate_key_pair(vec![]);
        store.update_wallet(&wallet).await.unwrap();
        match events.recv().await.unwrap() {
            WalletEvent::Updated(updated) => assert_eq!(updated.list_key_pairs().len(), 2),
            other => panic!("unexpected event {other:?}"),
        }

        store.rename_wallet("w1", "w2").unwrap();
        match events.recv().await.unwrap() {
            WalletEvent::Renamed {
                previous_name,
                wallet,
            } => {
                assert_eq!(previous_name, "w1");
                assert_eq!(wallet.name(), "w2");
            }
            other => panic!("unexpected event {other:?}"),
        }
        assert!(store.get_wallet("w2").await.is_ok());

        store.lock_wallet("w2").await.unwrap();
        assert!(matches!(events.recv().await.unwrap(), WalletEvent::Locked(n) if n == "w2"));

        store.delete_wallet("w2").unwrap();
        assert!(matches!(events.recv().await.unwrap(), WalletEvent::Removed(n) if n == "w2"));
        assert_eq!(store.list_wallets().await.unwrap(), Vec::<String>::new());
    }
}
