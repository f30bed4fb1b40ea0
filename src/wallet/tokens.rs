// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Long-living API tokens.
//!
//! A long-living token is bound to a wallet and its passphrase so that
//! unattended clients can use the wallet without any review.
//!
//! Stores publish a [`TokenEvent`] on every change so live connections can
//! follow revocations.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::broadcast;

use super::StoreError;

#[derive(Clone, PartialEq, Eq)]
pub struct WalletCredentials {
    pub name: String,
    pub passphrase: String,
}

impl fmt::Debug for WalletCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WalletCredentials")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenDescription {
    pub token: String,
    pub description: String,
    pub creation_date: DateTime<Utc>,
    pub expiration_date: Option<DateTime<Utc>>,
    pub wallet: WalletCredentials,
}

const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Change notification carrying the affected token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenEvent {
    Saved(String),
    Deleted(String),
}

#[async_trait]
pub trait TokenStore: Send + Sync {
    async fn token_exists(&self, token: &str) -> Result<bool, StoreError>;

    async fn list_tokens(&self) -> Result<Vec<TokenDescription>, StoreError>;

    async fn describe_token(&self, token: &str) -> Result<TokenDescription, StoreError>;

    async fn save_token(&self, token: TokenDescription) -> Result<(), StoreError>;

    async fn delete_token(&self, token: &str) -> Result<(), StoreError>;

    fn subscribe(&self) -> broadcast::Receiver<TokenEvent>;
}

pub struct InMemoryTokenStore {
    tokens: RwLock<BTreeMap<String, TokenDescription>>,
    events: broadcast::Sender<TokenEvent>,
}

impl InMemoryTokenStore {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            tokens: RwLock::new(BTreeMap::new()),
            events,
        }
    }

    fn publish(&self, event: TokenEvent) {
        let _ = self.events.send(event);
    }
}

impl Default for InMemoryTokenStore {
    fn default() -> Self {
        Self::new()
    }
}

fn poisoned() -> StoreError {
    StoreError::Internal("token store lock poisoned".to_string())
}

fn unknown(token: &str) -> StoreError {
    StoreError::Internal(format!("the token {token:?} does not exist"))
}

#[async_trait]
impl TokenStore for InMemoryTokenStore {
    async fn token_exists(&self, token: &str) -> Result<bool, StoreError> {
        Ok(self.tokens.read().map_err(|_| poisoned())?.contains_key(token))
    }

    async fn list_tokens(&self) -> Result<Vec<TokenDescription>, StoreError> {
        Ok(self
            .tokens
            .read()
            .map_err(|_| poisoned())?
            .values()
            .cloned()
            .collect())
    }

    async fn describe_token(&self, token: &str) -> Result<TokenDescription, StoreError> {
        self.tokens
            .read()
            .map_err(|_| poisoned())?
            .get(token)
            .cloned()
            .ok_or_else(|| unknown(token))
    }

    async fn save_token(&self, token: TokenDescription) -> Result<(), StoreError> {
        let key = token.token.clone();
        self.tokens
            .write()
            .map_err(|_| poisoned())?
            .insert(key.clone(), token);
        self.publish(TokenEvent::Saved(key));
        Ok(())
    }

    async fn delete_token(&self, token: &str) -> Result<(), StoreError> {
        self.tokens
            .write()
            .map_err(|_| poisoned())?
            .remove(token)
            .ok_or_else(|| unknown(token))?;
        self.publish(TokenEvent::Deleted(token.to_string()));
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<TokenEvent> {
        self.events.subscribe()
    }
}
