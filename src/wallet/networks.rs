// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::collections::BTreeMap;
use std::sync::RwLock;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::StoreError;

/// A network the service can dispatch transactions to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Network {
    pub name: String,
    pub hosts: Vec<String>,
}

#[async_trait]
pub trait NetworkStore: Send + Sync {
    async fn network_exists(&self, name: &str) -> Result<bool, StoreError>;

    async fn get_network(&self, name: &str) -> Result<Network, StoreError>;

    async fn save_network(&self, network: &Network) -> Result<(), StoreError>;

    async fn list_networks(&self) -> Result<Vec<String>, StoreError>;
}

#[derive(Default)]
pub struct InMemoryNetworkStore {
    networks: RwLock<BTreeMap<String, Network>>,
}

impl InMemoryNetworkStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned() -> StoreError {
    StoreError::Internal("network store lock poisoned".to_string())
}

#[async_trait]
impl NetworkStore for InMemoryNetworkStore {
    async fn network_exists(&self, name: &str) -> Result<bool, StoreError> {
        Ok(self.networks.read().map_err(|_| poisoned())?.contains_key(name))
    }

    async fn get_network(&self, name: &str) -> Result<Network, StoreError> {
        self.networks
            .read()
            .map_err(|_| poisoned())?
            .get(name)
            .cloned()
            .ok_or_else(|| StoreError::Internal(format!("the network {name:?} does not exist")))
    }

    async fn save_network(&self, network: &Network) -> Result<(), StoreError> {
        self.networks
            .write()
            .map_err(|_| poisoned())?
            .insert(network.name.clone(), network.clone());
        Ok(())
    }

    async fn list_networks(&self) -> Result<Vec<String>, StoreError> {
        Ok(self
            .networks
            .read()
            .map_err(|_| poisoned())?
            .keys()
            .cloned()
            .collect())
    }
}
