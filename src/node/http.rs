// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! [`Node`] backed by the node's REST API.
//!
//! | Operation | Request |
//! |-----------|---------|
//! | last block | `GET /blockchain/height` |
//! | spam statistics | `GET /statistics/spam/{public_key}` |
//! | check transaction | `POST /transaction/check` |
//! | send transaction | `POST /transaction` |

use std::time::Duration;

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::debug;

use super::{LastBlock, Node, NodeError, SendingMode, SpamStatistics};
use crate::transaction::Transaction;

#[derive(Debug, Serialize)]
struct CheckTransactionRequest<'a> {
    tx: &'a Transaction,
}

#[derive(Debug, Serialize)]
struct SubmitTransactionRequest<'a> {
    tx: &'a Transaction,
    #[serde(rename = "type")]
    mode: SendingMode,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TransactionResponse {
    success: bool,
    #[serde(default)]
    code: u32,
    #[serde(default)]
    data: String,
    #[serde(default)]
    tx_hash: String,
}

impl TransactionResponse {
    fn into_result(self) -> Result<String, NodeError> {
        if self.success {
            Ok(self.tx_hash)
        } else {
            Err(NodeError::TransactionRejected {
                code: self.code,
                message: self.data,
            })
        }
    }
}

#[derive(Debug, Clone)]
pub struct HttpNode {
    host: String,
    client: reqwest::Client,
}

impl HttpNode {
    pub fn new(host: impl Into<String>, timeout: Duration) -> Result<Self, NodeError> {
        let host = host.into().trim_end_matches('/').to_string();
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| NodeError::Unreachable {
                host: host.clone(),
                reason: e.to_string(),
            })?;
        Ok(Self { host, client })
    }

    fn unreachable(&self, e: reqwest::Error) -> NodeError {
        NodeError::Unreachable {
            host: self.host.clone(),
            reason: e.to_string(),
        }
    }

    fn invalid(&self, reason: impl ToString) -> NodeError {
        NodeError::InvalidResponse {
            host: self.host.clone(),
            reason: reason.to_string(),
        }
    }

    async fn read<T: DeserializeOwned>(&self, response: reqwest::Response) -> Result<T, NodeError> {
        let status = response.status();
        if !status.is_success() && status != reqwest::StatusCode::BAD_REQUEST {
            return Err(self.invalid(format!("HTTP status {status}")));
        }
        response.json::<T>().await.map_err(|e| self.invalid(e))
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, NodeError> {
        debug!(node = %self.host, path, "Querying node");
        let response = self
            .client
            .get(format!("{}{path}", self.host))
            .send()
            .await
            .map_err(|e| self.unreachable(e))?;
        self.read(response).await
    }

    async fn post<B: Serialize + Sync, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, NodeError> {
        debug!(node = %self.host, path, "Posting to node");
        let response = self
            .client
            .post(format!("{}{path}", self.host))
            .json(body)
            .send()
            .await
            .map_err(|e| self.unreachable(e))?;
        self.read(response).await
    }
}

#[async_trait]
impl Node for HttpNode {
    fn host(&self) -> &str {
        &self.host
    }

    async fn last_block(&self) -> Result<LastBlock, NodeError> {
        self.get("/blockchain/height").await
    }

    async fn spam_statistics(&self, public_key: &str) -> Result<SpamStatistics, NodeError> {
        if public_key.is_empty() || !public_key.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(self.invalid("the public key is not hex-encoded"));
        }
        self.get(&format!("/statistics/spam/{public_key}")).await
    }

    async fn check_transaction(&self, tx: &Transaction) -> Result<(), NodeError> {
        let response: TransactionResponse = self
            .post("/transaction/check", &CheckTransactionRequest { tx })
            .await?;
        response.into_result().map(|_| ())
    }

    async fn send_transaction(
        &self,
        tx: &Transaction,
        mode: SendingMode,
    ) -> Result<String, NodeError> {
        let response: TransactionResponse = self
            .post("/transaction", &SubmitTransactionRequest { tx, mode })
            .await?;
        let hash = response.into_result()?;
        if hash.is_empty() {
            Ok(tx.hash())
        } else {
            Ok(hash)
        }
    }
}
