// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Spam Protection
//!
//! The network limits how many transactions of some kinds a key may submit
//! per epoch and requires a proof-of-work on every transaction. Both are
//! enforced here, before anything is sent, from statistics fetched fresh
//! from a node for every request:
//!
//! - [`SpamGuard::check_submission`] refuses commands whose category quota
//!   is exhausted or whose submitter is banned;
//! - [`SpamGuard::generate_proof_of_work`] searches a nonce meeting the
//!   difficulty of the most recent block;
//! - [`clamp_ttl`] caps the requested TTL to what the network accepts.

use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::node::{SpamStatistic, SpamStatistics, VoteSpamStatistics};
use crate::transaction::{Command, CommandCategory, ProofOfWork};

pub mod pow;

#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum SpamError {
    #[error("the party has already submitted the maximum number of {category} for this epoch ({max})")]
    QuotaExceeded { category: &'static str, max: u64 },

    #[error("the party has already voted the maximum number of times on proposal {proposal_id} for this epoch ({max})")]
    VoteQuotaExceeded { proposal_id: String, max: u64 },

    #[error("the party is banned from submitting {category} until {until}")]
    Banned { category: &'static str, until: String },

    #[error("the node did not provide any proof-of-work statistics")]
    MissingProofOfWorkStatistics,

    #[error("no proof-of-work block state is within the last {past_blocks} blocks (last block {last_block_height})")]
    NoRecentProofOfWorkBlock {
        past_blocks: u64,
        last_block_height: u64,
    },

    #[error("the maximum number of transactions for block {block_height} has been reached")]
    TransactionsPerBlockLimitReached { block_height: u64 },

    #[error("the proof-of-work hash function {0:?} is not supported")]
    UnsupportedHashFunction(String),

    #[error("the proof-of-work difficulty {0} is out of range")]
    DifficultyOutOfRange(u32),

    #[error("no proof-of-work nonce satisfies the difficulty")]
    ProofOfWorkExhausted,

    #[error("the proof-of-work search has been interrupted")]
    ProofOfWorkInterrupted,
}

/// Proof-of-work computed against a given block.
///
/// The transaction must reference the same block height.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProofOfWorkSolution {
    pub block_height: u64,
    pub proof: ProofOfWork,
}

pub trait SpamGuard: Send + Sync {
    fn check_submission(&self, command: &Command, stats: &SpamStatistics) -> Result<(), SpamError>;

    /// CPU-bound: callers on the async runtime should run it on a blocking
    /// thread. Gives up with [`SpamError::ProofOfWorkInterrupted`] once
    /// `cancellation` fires.
    fn generate_proof_of_work(
        &self,
        public_key: &str,
        stats: &SpamStatistics,
        cancellation: &CancellationToken,
    ) -> Result<ProofOfWorkSolution, SpamError>;
}

/// Enforces the quotas and proof-of-work parameters a node reports.
#[derive(Debug, Clone, Copy, Default)]
pub struct SpamPolicy;

impl SpamPolicy {
    pub fn new() -> Self {
        Self
    }
}

fn check_quota(category: CommandCategory, stat: Option<&SpamStatistic>) -> Result<(), SpamError> {
    let Some(stat) = stat else {
        return Ok(());
    };
    if let Some(until) = &stat.banned_until {
        return Err(SpamError::Banned {
            category: category.as_str(),
            until: until.clone(),
        });
    }
    if stat.count_for_epoch >= stat.max_for_epoch {
        return Err(SpamError::QuotaExceeded {
            category: category.as_str(),
            max: stat.max_for_epoch,
        });
    }
    Ok(())
}

fn check_vote(proposal_id: &str, votes: Option<&VoteSpamStatistics>) -> Result<(), SpamError> {
    let Some(votes) = votes else {
        return Ok(());
    };
    if let Some(until) = &votes.banned_until {
        return Err(SpamError::Banned {
            category: CommandCategory::Vote.as_str(),
            until: until.clone(),
        });
    }
    let cast = votes.proposals.get(proposal_id).copied().unwrap_or_default();
    if cast >= votes.max_for_epoch {
        return Err(SpamError::VoteQuotaExceeded {
            proposal_id: proposal_id.to_string(),
            max: votes.max_for_epoch,
        });
    }
    Ok(())
}

impl SpamGuard for SpamPolicy {
    fn check_submission(&self, command: &Command, stats: &SpamStatistics) -> Result<(), SpamError> {
        match (command.category(), command) {
            (CommandCategory::Vote, Command::VoteSubmission(vote)) => {
                check_vote(&vote.proposal_id, stats.votes.as_ref())
            }
            (CommandCategory::Proposal, _) => {
                check_quota(CommandCategory::Proposal, stats.proposals.as_ref())
            }
            (CommandCategory::Delegation, _) => {
                check_quota(CommandCategory::Delegation, stats.delegations.as_ref())
            }
            (CommandCategory::Transfer, _) => {
                check_quota(CommandCategory::Transfer, stats.transfers.as_ref())
            }
            (CommandCategory::NodeAnnouncement, _) => check_quota(
                CommandCategory::NodeAnnouncement,
                stats.node_announcements.as_ref(),
            ),
            (CommandCategory::Vote, _) | (CommandCategory::Other, _) => Ok(()),
        }
    }

    fn generate_proof_of_work(
        &self,
        public_key: &str,
        stats: &SpamStatistics,
        cancellation: &CancellationToken,
    ) -> Result<ProofOfWorkSolution, SpamError> {
        if let Some(until) = &stats.pow.banned_until {
            return Err(SpamError::Banned {
                category: "transactions",
                until: until.clone(),
            });
        }

        if stats.pow.block_states.is_empty() {
            return Err(SpamError::MissingProofOfWorkStatistics);
        }
        // Proofs against blocks older than the window are refused by the
        // network. A zero window means the node did not report one.
        let past_blocks = stats.pow.past_blocks;
        let state = stats
            .pow
            .block_states
            .iter()
            .filter(|s| {
                past_blocks == 0
                    || stats.last_block_height.saturating_sub(s.block_height) < past_blocks
            })
            .max_by_key(|s| s.block_height)
            .ok_or(SpamError::NoRecentProofOfWorkBlock {
                past_blocks,
                last_block_height: stats.last_block_height,
            })?;

        let difficulty = match state.expected_difficulty {
            Some(difficulty) => difficulty,
            None if state.tx_per_block > 0 && state.transactions_seen >= state.tx_per_block => {
                if !state.increasing_difficulty {
                    return Err(SpamError::TransactionsPerBlockLimitReached {
                        block_height: state.block_height,
                    });
                }
                let extra = state.transactions_seen / state.tx_per_block;
                state
                    .difficulty
                    .saturating_add(u32::try_from(extra).unwrap_or(u32::MAX))
            }
            None => state.difficulty,
        };

        let tid = pow::new_transaction_id();
        let nonce = pow::solve(
            &state.block_hash,
            &tid,
            difficulty,
            &state.hash_function,
            cancellation,
        )?;
        debug!(
            public_key = %public_key,
            block_height = state.block_height,
            difficulty,
            "Computed proof of work"
        );

        Ok(ProofOfWorkSolution {
            block_height: state.block_height,
            proof: ProofOfWork { tid, nonce },
        })
    }
}

/// Effective TTL of a transaction.
///
/// Without a requested TTL the network maximum applies. A requested TTL is
/// never rejected, only capped.
pub fn clamp_ttl(requested: Option<u64>, stats: &SpamStatistics) -> u64 {
    match requested {
        Some(ttl) => ttl.min(stats.max_ttl),
        None => stats.max_ttl,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{PowBlockState, PowStatistics};
    use serde_json::json;
    use std::collections::HashMap;

    fn command(value: serde_json::Value) -> Command {
        Command::from_value(&value).unwrap()
    }

    fn stats_with_pow(difficulty: u32) -> SpamStatistics {
        SpamStatistics {
            chain_id: "chain".to_string(),
            last_block_height: 100,
            max_ttl: 10,
            pow: PowStatistics {
                block_states: vec![
                    PowBlockState {
                        block_height: 99,
                        block_hash: "HASH99".to_string(),
                        hash_function: pow::SHA256.to_string(),
                        difficulty,
                        tx_per_block: 10,
                        ..PowBlockState::default()
                    },
                    PowBlockState {
                        block_height: 100,
                        block_hash: "HASH100".to_string(),
                        hash_function: pow::SHA256.to_string(),
                        difficulty,
                        tx_per_block: 10,
                        ..PowBlockState::default()
                    },
                ],
                ..PowStatistics::default()
            },
            ..SpamStatistics::default()
        }
    }

    #[test]
    fn quota_is_enforced_per_category() {
        let policy = SpamPolicy::new();
        let mut stats = SpamStatistics {
            transfers: Some(SpamStatistic {
                count_for_epoch: 5,
                max_for_epoch: 5,
                banned_until: None,
            }),
            ..SpamStatistics::default()
        };
        let transfer = command(json!({"transfer": {"amount": "1"}}));
        let proposal = command(json!({"proposalSubmission": {}}));

        assert_eq!(
            policy.check_submission(&transfer, &stats).unwrap_err(),
            SpamError::QuotaExceeded {
                category: "transfers",
                max: 5
            }
        );
        // Proposals are not limited by these statistics.
        assert!(policy.check_submission(&proposal, &stats).is_ok());

        stats.transfers = Some(SpamStatistic {
            count_for_epoch: 4,
            max_for_epoch: 5,
            banned_until: None,
        });
        assert!(policy.check_submission(&transfer, &stats).is_ok());
    }

    #[test]
    fn banned_parties_are_refused() {
        let policy = SpamPolicy::new();
        let stats = SpamStatistics {
            delegations: Some(SpamStatistic {
                count_for_epoch: 0,
                max_for_epoch: 5,
                banned_until: Some("2026-10-20T00:00:00Z".to_string()),
            }),
            ..SpamStatistics::default()
        };
        let err = policy
            .check_submission(&command(json!({"delegateSubmission": {}})), &stats)
            .unwrap_err();
        assert!(matches!(err, SpamError::Banned { category: "delegations", .. }));
    }

    #[test]
    fn votes_are_limited_per_proposal() {
        let policy = SpamPolicy::new();
        let stats = SpamStatistics {
            votes: Some(VoteSpamStatistics {
                proposals: HashMap::from([("p1".to_string(), 3)]),
                max_for_epoch: 3,
                banned_until: None,
            }),
            ..SpamStatistics::default()
        };

        let on_p1 = command(json!({"voteSubmission": {"proposalId": "p1", "value": "VALUE_YES"}}));
        let on_p2 = command(json!({"voteSubmission": {"proposalId": "p2", "value": "VALUE_NO"}}));

        assert!(matches!(
            policy.check_submission(&on_p1, &stats).unwrap_err(),
            SpamError::VoteQuotaExceeded { .. }
        ));
        assert!(policy.check_submission(&on_p2, &stats).is_ok());
    }

    #[test]
    fn proof_of_work_targets_the_latest_block() {
        let policy = SpamPolicy::new();
        let stats = stats_with_pow(6);

        let solution = policy
            .generate_proof_of_work("pk", &stats, &CancellationToken::new())
            .unwrap();

        assert_eq!(solution.block_height, 100);
        assert!(pow::verify(
            "HASH100",
            &solution.proof.tid,
            solution.proof.nonce,
            6,
            pow::SHA256
        )
        .unwrap());
    }

    #[test]
    fn proof_of_work_requires_block_states() {
        let err = SpamPolicy::new()
            .generate_proof_of_work("pk", &SpamStatistics::default(), &CancellationToken::new())
            .unwrap_err();
        assert_eq!(err, SpamError::MissingProofOfWorkStatistics);
    }

    #[test]
    fn full_blocks_raise_difficulty_or_refuse() {
        let mut stats = stats_with_pow(2);
        for state in &mut stats.pow.block_states {
            state.transactions_seen = 20;
        }
        assert_eq!(
            SpamPolicy::new()
                .generate_proof_of_work("pk", &stats, &CancellationToken::new())
                .unwrap_err(),
            SpamError::TransactionsPerBlockLimitReached { block_height: 100 }
        );

        for state in &mut stats.pow.block_states {
            state.increasing_difficulty = true;
        }
        let solution = SpamPolicy::new()
            .generate_proof_of_work("pk", &stats, &CancellationToken::new())
            .unwrap();
        // Two full blocks worth of transactions add two bits.
        assert!(pow::verify(
            "HASH100",
            &solution.proof.tid,
            solution.proof.nonce,
            4,
            pow::SHA256
        )
        .unwrap());
    }

    #[test]
    fn blocks_outside_the_window_are_skipped() {
        let mut stats = stats_with_pow(4);
        stats.last_block_height = 101;
        stats.pow.past_blocks = 2;
        stats.pow.block_states[1].block_height = 99;
        stats.pow.block_states[1].block_hash = "STALE".to_string();
        stats.pow.block_states[0].block_height = 100;
        stats.pow.block_states[0].block_hash = "HASH100".to_string();

        let solution = SpamPolicy::new()
            .generate_proof_of_work("pk", &stats, &CancellationToken::new())
            .unwrap();
        assert_eq!(solution.block_height, 100);

        stats.last_block_height = 110;
        assert_eq!(
            SpamPolicy::new()
                .generate_proof_of_work("pk", &stats, &CancellationToken::new())
                .unwrap_err(),
            SpamError::NoRecentProofOfWorkBlock {
                past_blocks: 2,
                last_block_height: 110
            }
        );
    }

    #[test]
    fn difficulty_beyond_the_cap_is_refused() {
        let stats = stats_with_pow(64);
        assert_eq!(
            SpamPolicy::new()
                .generate_proof_of_work("pk", &stats, &CancellationToken::new())
                .unwrap_err(),
            SpamError::DifficultyOutOfRange(64)
        );
    }

    #[test]
    fn ttl_is_capped_silently() {
        let stats = SpamStatistics {
            max_ttl: 10,
            ..SpamStatistics::default()
        };
        assert_eq!(clamp_ttl(Some(20), &stats), 10);
        assert_eq!(clamp_ttl(Some(5), &stats), 5);
        assert_eq!(clamp_ttl(None, &stats), 10);
    }
}
