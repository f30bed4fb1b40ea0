// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Proof-of-work search and verification.
//!
//! A proof is a nonce such that `SHA-256(prefix || block_hash || tid || nonce)`
//! starts with at least `difficulty` zero bits. The transaction ID (`tid`) is
//! random, so the same key can prove work for several transactions against
//! the same block.
//!
//! The search runs on a blocking thread and polls its cancellation token
//! every [`CANCELLATION_CHECK_INTERVAL`] nonces.

use rand::RngCore;
use sha2::{Digest, Sha256};
use tokio_util::sync::CancellationToken;

use super::SpamError;

/// Hash function identifier the network advertises for SHA-256 proofs.
pub const SHA256: &str = "sha256";

const DOMAIN_PREFIX: &[u8] = b"RELATIONAL_SPAM_POW";
/// Highest difficulty accepted from a node. Each extra bit doubles the
/// expected search time.
pub const MAX_DIFFICULTY: u32 = 32;

pub const CANCELLATION_CHECK_INTERVAL: u64 = 4096;

fn digest(block_hash: &str, tid: &str, nonce: u64) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(DOMAIN_PREFIX);
    hasher.update(block_hash.as_bytes());
    hasher.update(tid.as_bytes());
    hasher.update(nonce.to_be_bytes());
    hasher.finalize().into()
}

pub(crate) fn leading_zero_bits(bytes: &[u8]) -> u32 {
    let mut count = 0;
    for byte in bytes {
        if *byte == 0 {
            count += 8;
        } else {
            count += byte.leading_zeros();
            break;
        }
    }
    count
}

fn ensure_supported(hash_function: &str, difficulty: u32) -> Result<(), SpamError> {
    // Nodes that leave the hash function out default to SHA-256.
    if !hash_function.is_empty() && hash_function != SHA256 {
        return Err(SpamError::UnsupportedHashFunction(hash_function.to_string()));
    }
    if difficulty > MAX_DIFFICULTY {
        return Err(SpamError::DifficultyOutOfRange(difficulty));
    }
    Ok(())
}

/// Random 32-byte transaction ID, hex-encoded.
pub fn new_transaction_id() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode_upper(bytes)
}

/// Searches for the first nonce meeting `difficulty`, until `cancellation`
/// fires.
pub fn solve(
    block_hash: &str,
    tid: &str,
    difficulty: u32,
    hash_function: &str,
    cancellation: &CancellationToken,
) -> Result<u64, SpamError> {
    ensure_supported(hash_function, difficulty)?;
    for nonce in 0..=u64::MAX {
        if nonce % CANCELLATION_CHECK_INTERVAL == 0 && cancellation.is_cancelled() {
            return Err(SpamError::ProofOfWorkInterrupted);
        }
        if leading_zero_bits(&digest(block_hash, tid, nonce)) >= difficulty {
            return Ok(nonce);
        }
    }
    Err(SpamError::ProofOfWorkExhausted)
}

pub fn verify(
    block_hash: &str,
    tid: &str,
    nonce: u64,
    difficulty: u32,
    hash_function: &str,
) -> Result<bool, SpamError> {
    ensure_supported(hash_function, difficulty)?;
    Ok(leading_zero_bits(&digest(block_hash, tid, nonce)) >= difficulty)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solve_now(block_hash: &str, tid: &str, difficulty: u32) -> u64 {
        solve(block_hash, tid, difficulty, SHA256, &CancellationToken::new()).unwrap()
    }

    #[test]
    fn counts_leading_zero_bits() {
        assert_eq!(leading_zero_bits(&[0xff]), 0);
        assert_eq!(leading_zero_bits(&[0x00, 0x80]), 8);
        assert_eq!(leading_zero_bits(&[0x00, 0x01]), 15);
        assert_eq!(leading_zero_bits(&[0x0f, 0x00]), 4);
        assert_eq!(leading_zero_bits(&[0x00, 0x00]), 16);
    }

    #[test]
    fn solved_nonces_verify_at_the_stated_difficulty() {
        let tid = new_transaction_id();
        for difficulty in [0, 4, 8, 12] {
            let nonce = solve_now("ABCDEF", &tid, difficulty);
            assert!(verify("ABCDEF", &tid, nonce, difficulty, SHA256).unwrap());
        }
    }

    #[test]
    fn proofs_are_bound_to_the_block() {
        let tid = new_transaction_id();
        let nonce = solve_now("BLOCK-1", &tid, 12);
        // A nonce meeting 12 bits for another block is possible but rare
        // enough to be checked over several blocks.
        let matches = (0..8)
            .filter(|i| verify(&format!("OTHER-{i}"), &tid, nonce, 12, SHA256).unwrap())
            .count();
        assert!(matches < 8);
    }

    #[test]
    fn unsupported_hash_functions_are_rejected() {
        let cancellation = CancellationToken::new();
        assert_eq!(
            solve("AB", "tid", 1, "sha3_24_rounds", &cancellation).unwrap_err(),
            SpamError::UnsupportedHashFunction("sha3_24_rounds".to_string())
        );
        assert_eq!(
            verify("AB", "tid", 0, 300, SHA256).unwrap_err(),
            SpamError::DifficultyOutOfRange(300)
        );
        assert_eq!(
            solve("AB", "tid", MAX_DIFFICULTY + 1, SHA256, &cancellation).unwrap_err(),
            SpamError::DifficultyOutOfRange(MAX_DIFFICULTY + 1)
        );
    }

    #[test]
    fn cancelled_search_stops() {
        let cancellation = CancellationToken::new();
        cancellation.cancel();
        // Unreachable in practice at this difficulty without cancellation.
        assert_eq!(
            solve("AB", "tid", MAX_DIFFICULTY, SHA256, &cancellation).unwrap_err(),
            SpamError::ProofOfWorkInterrupted
        );
    }

    #[test]
    fn search_in_progress_observes_cancellation() {
        let cancellation = CancellationToken::new();
        let search = {
            let cancellation = cancellation.clone();
            std::thread::spawn(move || solve("AB", "tid", MAX_DIFFICULTY, SHA256, &cancellation))
        };
        std::thread::sleep(std::time::Duration::from_millis(50));
        cancellation.cancel();
        assert_eq!(search.join().unwrap(), Err(SpamError::ProofOfWorkInterrupted));
    }

    #[test]
    fn transaction_ids_are_unique() {
        assert_ne!(new_transaction_id(), new_transaction_id());
        assert_eq!(new_transaction_id().len(), 64);
    }
}
