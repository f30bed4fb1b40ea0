// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Wire types exchanged with network nodes.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Information about the last block the node has seen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LastBlock {
    pub chain_id: String,
    pub block_height: u64,
}

/// Per-epoch usage and limit for one spam category.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpamStatistic {
    pub count_for_epoch: u64,
    pub max_for_epoch: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub banned_until: Option<String>,
}

/// Votes are limited per proposal.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteSpamStatistics {
    /// Proposal ID to votes already cast this epoch.
    #[serde(default)]
    pub proposals: HashMap<String, u64>,
    pub max_for_epoch: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub banned_until: Option<String>,
}

/// Proof-of-work state for one recent block.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PowBlockState {
    pub block_height: u64,
    pub block_hash: String,
    pub transactions_seen: u64,
    /// Difficulty the next transaction must meet, when the node knows it.
    #[serde(default)]
    pub expected_difficulty: Option<u32>,
    pub hash_function: String,
    pub difficulty: u32,
    pub tx_per_block: u64,
    #[serde(default)]
    pub increasing_difficulty: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PowStatistics {
    #[serde(default)]
    pub block_states: Vec<PowBlockState>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub banned_until: Option<String>,
    /// How many blocks back a proof may reference.
    #[serde(default)]
    pub past_blocks: u64,
}

/// Quota snapshot for a public key, fetched fresh for every request.
///
/// A category left out by the node is not limited.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpamStatistics {
    pub chain_id: String,
    pub last_block_height: u64,
    /// Highest TTL, in blocks, the network accepts.
    pub max_ttl: u64,
    #[serde(default)]
    pub proposals: Option<SpamStatistic>,
    #[serde(default)]
    pub delegations: Option<SpamStatistic>,
    #[serde(default)]
    pub transfers: Option<SpamStatistic>,
    #[serde(default)]
    pub node_announcements: Option<SpamStatistic>,
    #[serde(default)]
    pub votes: Option<VoteSpamStatistics>,
    #[serde(default)]
    pub pow: PowStatistics,
}

/// How the node should wait on a submitted transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum SendingMode {
    /// Return once the transaction passed the mempool checks.
    #[serde(rename = "TYPE_SYNC")]
    Sync,
    /// Return as soon as the node received the transaction.
    #[serde(rename = "TYPE_ASYNC")]
    Async,
    /// Return once the transaction is included in a block.
    #[serde(rename = "TYPE_COMMIT")]
    Commit,
}
