// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! secp256k1 key pairs held by a wallet.
//!
//! Private keys never leave this module: callers get the hex public key and
//! signatures over arbitrary messages. ECDSA signing hashes the message with
//! SHA-256 before signing.

use std::fmt;

use k256::ecdsa::{
    signature::{Signer, Verifier},
    Signature, SigningKey, VerifyingKey,
};
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Name of the signature algorithm attached to signed transactions.
pub const SIGNATURE_ALGORITHM: &str = "secp256k1/sha256";
pub const SIGNATURE_VERSION: u32 = 1;

/// Metadata key holding the display name of a key.
pub const NAME_METADATA_KEY: &str = "name";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Metadata {
    pub key: String,
    pub value: String,
}

impl Metadata {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

#[derive(Clone)]
pub struct KeyPair {
    index: u32,
    signing_key: SigningKey,
    public_key: String,
    tainted: bool,
    metadata: Vec<Metadata>,
}

impl KeyPair {
    /// Generates a fresh key pair. A `name` entry is added to the metadata
    /// when the caller did not provide one.
    pub fn generate(index: u32, mut metadata: Vec<Metadata>) -> Self {
        if !metadata.iter().any(|m| m.key == NAME_METADATA_KEY) {
            metadata.push(Metadata::new(NAME_METADATA_KEY, format!("Key {index}")));
        }
        let signing_key = SigningKey::random(&mut OsRng);
        let public_key = encode_public_key(signing_key.verifying_key());
        Self {
            index,
            signing_key,
            public_key,
            tainted: false,
            metadata,
        }
    }

    pub fn index(&self) -> u32 {
        self.index
    }

    pub fn public_key(&self) -> &str {
        &self.public_key
    }

    pub fn name(&self) -> &str {
        self.metadata
            .iter()
            .find(|m| m.key == NAME_METADATA_KEY)
            .map(|m| m.value.as_str())
            .unwrap_or_default()
    }

    pub fn metadata(&self) -> &[Metadata] {
        &self.metadata
    }

    pub fn is_tainted(&self) -> bool {
        self.tainted
    }

    pub(crate) fn set_tainted(&mut self, tainted: bool) {
        self.tainted = tainted;
    }

    pub(crate) fn set_metadata(&mut self, metadata: Vec<Metadata>) {
        self.metadata = metadata;
    }

    /// Signs `message`, returning the hex-encoded fixed-size signature.
    pub fn sign(&self, message: &[u8]) -> String {
        let signature: Signature = self.signing_key.sign(message);
        hex::encode(signature.to_bytes())
    }
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair")
            .field("index", &self.index)
            .field("public_key", &self.public_key)
            .field("tainted", &self.tainted)
            .field("metadata", &self.metadata)
            .finish_non_exhaustive()
    }
}

fn encode_public_key(key: &VerifyingKey) -> String {
    hex::encode(key.to_encoded_point(true).as_bytes())
}

/// Checks a hex signature produced by [`KeyPair::sign`].
pub fn verify_signature(public_key: &str, message: &[u8], signature: &str) -> bool {
    let Ok(key_bytes) = hex::decode(public_key) else {
        return false;
    };
    let Ok(verifying_key) = VerifyingKey::from_sec1_bytes(&key_bytes) else {
        return false;
    };
    let Ok(sig_bytes) = hex::decode(signature) else {
        return false;
    };
    let Ok(signature) = Signature::from_slice(&sig_bytes) else {
        return false;
    };
    verifying_key.verify(message, &signature).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_keys_are_named_and_untainted() {
        let kp = KeyPair::generate(1, vec![]);
        assert_eq!(kp.name(), "Key 1");
        assert!(!kp.is_tainted());
        // Compressed SEC1 point.
        assert_eq!(kp.public_key().len(), 66);

        let named = KeyPair::generate(2, vec![Metadata::new("name", "trading")]);
        assert_eq!(named.name(), "trading");
        assert_eq!(named.metadata().len(), 1);
    }

    #[test]
    fn signatures_verify_against_the_public_key() {
        let kp = KeyPair::generate(1, vec![]);
        let other = KeyPair::generate(2, vec![]);
        let signature = kp.sign(b"hello");

        assert!(verify_signature(kp.public_key(), b"hello", &signature));
        assert!(!verify_signature(kp.public_key(), b"hullo", &signature));
        assert!(!verify_signature(other.public_key(), b"hello", &signature));
        assert!(!verify_signature("zz", b"hello", &signature));
    }

    #[test]
    fn debug_output_hides_the_private_key() {
        let kp = KeyPair::generate(1, vec![]);
        let debug = format!("{kp:?}");
        assert!(debug.contains(kp.public_key()));
        assert!(!debug.contains("signing_key"));
    }
}
