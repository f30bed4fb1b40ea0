// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Transaction assembly and local signing.
//!
//! A transaction wraps the JSON-encoded [`InputData`] (nonce, block height,
//! TTL and command), a signature over `chain_id || 0x00 || input_data` made
//! with the submitting key, and the proof-of-work the network requires.
//! Private keys never leave the wallet: signing happens in process memory.

use base64ct::{Base64, Encoding};
use rand::Rng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use utoipa::ToSchema;

use crate::wallet::{keys, Wallet, WalletError};

pub mod command;

pub use command::{Command, CommandCategory, VoteSubmission};

/// Version of the transaction envelope.
pub const TRANSACTION_VERSION: u32 = 3;

#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum TransactionError {
    #[error("the transaction is not valid: {0}")]
    InvalidCommand(String),

    #[error("could not sign the transaction: {0}")]
    Wallet(#[from] WalletError),

    #[error("could not encode the transaction: {0}")]
    Encoding(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InputData {
    pub nonce: u64,
    pub block_height: u64,
    pub ttl: u64,
    pub command: Command,
}

impl InputData {
    /// Builds input data with a random nonce.
    pub fn new(block_height: u64, ttl: u64, command: Command) -> Self {
        Self {
            nonce: rand::thread_rng().gen(),
            block_height,
            ttl,
            command,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProofOfWork {
    pub tid: String,
    pub nonce: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Signature {
    pub value: String,
    pub algo: String,
    pub version: u32,
}

/// A signed transaction, ready to be checked or sent by a node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub version: u32,
    /// Public key of the signer.
    pub from: String,
    /// Base64 of the JSON-encoded input data.
    pub input_data: String,
    pub signature: Signature,
    pub pow: ProofOfWork,
}

fn signing_payload(chain_id: &str, input_data: &[u8]) -> Vec<u8> {
    let mut payload = Vec::with_capacity(chain_id.len() + 1 + input_data.len());
    payload.extend_from_slice(chain_id.as_bytes());
    payload.push(0);
    payload.extend_from_slice(input_data);
    payload
}

/// Signs `input` with `public_key` for the network identified by `chain_id`.
pub fn sign_transaction(
    wallet: &Wallet,
    public_key: &str,
    chain_id: &str,
    input: &InputData,
    pow: ProofOfWork,
) -> Result<Transaction, TransactionError> {
    let encoded =
        serde_json::to_vec(input).map_err(|e| TransactionError::Encoding(e.to_string()))?;
    let signature = wallet.sign(public_key, &signing_payload(chain_id, &encoded))?;

    Ok(Transaction {
        version: TRANSACTION_VERSION,
        from: public_key.to_string(),
        input_data: Base64::encode_string(&encoded),
        signature: Signature {
            value: signature,
            algo: keys::SIGNATURE_ALGORITHM.to_string(),
            version: keys::SIGNATURE_VERSION,
        },
        pow,
    })
}

impl Transaction {
    pub fn decode_input_data(&self) -> Result<InputData, TransactionError> {
        let bytes = Base64::decode_vec(&self.input_data)
            .map_err(|e| TransactionError::Encoding(e.to_string()))?;
        serde_json::from_slice(&bytes).map_err(|e| TransactionError::Encoding(e.to_string()))
    }

    /// Checks the signature against the signer's public key.
    pub fn verify(&self, chain_id: &str) -> bool {
        let Ok(bytes) = Base64::decode_vec(&self.input_data) else {
            return false;
        };
        keys::verify_signature(
            &self.from,
            &signing_payload(chain_id, &bytes),
            &self.signature.value,
        )
    }

    /// Local identifier of the transaction, used until the node returns
    /// its own hash.
    pub fn hash(&self) -> String {
        hex::encode(Sha256::digest(self.signature.value.as_bytes())).to_uppercase()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn transfer() -> Command {
        Command::from_value(&json!({"transfer": {"amount": "10"}})).unwrap()
    }

    fn pow() -> ProofOfWork {
        ProofOfWork {
            tid: "tid".to_string(),
            nonce: 42,
        }
    }

    #[test]
    fn signed_transactions_verify_for_their_chain_only() {
        let mut wallet = Wallet::new("w").unwrap();
        let pk = wallet.generate_key_pair(vec![]).public_key().to_string();
        let input = InputData::new(100, 30, transfer());

        let tx = sign_transaction(&wallet, &pk, "chain-1", &input, pow()).unwrap();

        assert_eq!(tx.from, pk);
        assert_eq!(tx.version, TRANSACTION_VERSION);
        assert_eq!(tx.signature.algo, "secp256k1/sha256");
        assert!(tx.verify("chain-1"));
        assert!(!tx.verify("chain-2"));
        assert_eq!(tx.decode_input_data().unwrap(), input);
    }

    #[test]
    fn tainted_keys_cannot_sign() {
        let mut wallet = Wallet::new("w").unwrap();
        let pk = wallet.generate_key_pair(vec![]).public_key().to_string();
        wallet.taint_key(&pk).unwrap();

        let err = sign_transaction(
            &wallet,
            &pk,
            "chain-1",
            &InputData::new(1, 1, transfer()),
            pow(),
        )
        .unwrap_err();
        assert_eq!(err, TransactionError::Wallet(WalletError::PublicKeyIsTainted(pk)));
    }

    #[test]
    fn input_data_uses_camel_case() {
        let input = InputData {
            nonce: 1,
            block_height: 2,
            ttl: 3,
            command: transfer(),
        };
        let json = serde_json::to_value(&input).unwrap();
        assert_eq!(json["blockHeight"], 2);
        assert_eq!(json["command"]["transfer"]["amount"], "10");
    }
}
