// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Session-scoped view of a wallet.
//!
//! A [`ConnectedWallet`] is what a third-party connection sees of a wallet:
//! the keys the hostname's permission policy lets it use. The view is only
//! as fresh as its last [`ConnectedWallet::refresh_from_wallet`] call and
//! never consults the wallet store by itself.

use serde::Serialize;
use utoipa::ToSchema;

use super::ConnectionError;
use crate::wallet::{KeyPair, Wallet};

/// A key a connection is allowed to use.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RestrictedKey {
    pub public_key: String,
    pub name: String,
}

impl From<&KeyPair> for RestrictedKey {
    fn from(kp: &KeyPair) -> Self {
        Self {
            public_key: kp.public_key().to_string(),
            name: kp.name().to_string(),
        }
    }
}

fn untainted_keys(wallet: &Wallet) -> Vec<RestrictedKey> {
    wallet
        .list_key_pairs()
        .iter()
        .filter(|kp| !kp.is_tainted())
        .map(RestrictedKey::from)
        .collect()
}

/// Resolves the keys `hostname` may use on `wallet`.
///
/// `None` means the policy does not grant access to the public keys at all.
/// Allow-listed keys that have been tainted since the grant are left out.
pub fn resolve_restricted_keys(
    wallet: &Wallet,
    hostname: &str,
) -> Result<Option<Vec<RestrictedKey>>, ConnectionError> {
    let permissions = wallet.permissions(hostname);
    if !permissions.public_keys.enabled() {
        return Ok(None);
    }
    if !permissions.public_keys.has_allowed_keys() {
        return Ok(Some(untainted_keys(wallet)));
    }

    let mut keys = Vec::with_capacity(permissions.public_keys.allowed_keys.len());
    for public_key in &permissions.public_keys.allowed_keys {
        let kp = wallet
            .describe_key_pair(public_key)
            .map_err(|_| ConnectionError::InconsistentPermissions {
                wallet: wallet.name().to_string(),
                public_key: public_key.clone(),
            })?;
        if !kp.is_tainted() {
            keys.push(RestrictedKey::from(kp));
        }
    }
    Ok(Some(keys))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectedWallet {
    name: String,
    /// Empty for long-living connections.
    hostname: String,
    restricted_keys: Option<Vec<RestrictedKey>>,
    no_restrictions: bool,
}

impl ConnectedWallet {
    pub fn new(hostname: impl Into<String>, wallet: &Wallet) -> Result<Self, ConnectionError> {
        let hostname = hostname.into();
        let restricted_keys = resolve_restricted_keys(wallet, &hostname)?;
        Ok(Self {
            name: wallet.name().to_string(),
            hostname,
            restricted_keys,
            no_restrictions: false,
        })
    }

    /// View used by API-token connections: every untainted key, no review.
    pub fn new_long_living(wallet: &Wallet) -> Self {
        Self {
            name: wallet.name().to_string(),
            hostname: String::new(),
            restricted_keys: Some(untainted_keys(wallet)),
            no_restrictions: true,
        }
    }

    /// Recomputes the usable keys from the current state of `wallet`.
    ///
    /// Must be called after anything that may have touched the wallet's keys
    /// or permissions. The view is left untouched on error.
    pub fn refresh_from_wallet(&mut self, wallet: &Wallet) -> Result<(), ConnectionError> {
        let restricted_keys = if self.no_restrictions {
            Some(untainted_keys(wallet))
        } else {
            resolve_restricted_keys(wallet, &self.hostname)?
        };
        self.name = wallet.name().to_string();
        self.restricted_keys = restricted_keys;
        Ok(())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    pub fn restricted_keys(&self) -> &[RestrictedKey] {
        self.restricted_keys.as_deref().unwrap_or_default()
    }

    pub fn can_use_key(&self, public_key: &str) -> bool {
        self.restricted_keys()
            .iter()
            .any(|k| k.public_key == public_key)
    }

    pub fn can_list_keys(&self) -> bool {
        self.restricted_keys.is_some()
    }

    pub fn require_interaction(&self) -> bool {
        !self.no_restrictions
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wallet::{AccessMode, Permissions, PublicKeysPermission};

    const HOST: &str = "app.example.com";

    fn wallet_with_keys(count: usize) -> Wallet {
        let mut wallet = Wallet::new("w1").unwrap();
        for _ in 0..count {
            wallet.generate_key_pair(vec![]);
        }
        wallet
    }

    fn public_keys(wallet: &Wallet) -> Vec<String> {
        wallet
            .list_key_pairs()
            .iter()
            .map(|kp| kp.public_key().to_string())
            .collect()
    }

    fn allow(wallet: &mut Wallet, keys: Vec<String>) {
        wallet
            .update_permissions(
                HOST,
                Permissions {
                    public_keys: PublicKeysPermission {
                        access: AccessMode::Read,
                        allowed_keys: keys,
                    },
                },
            )
            .unwrap();
    }

    #[test]
    fn disabled_policy_cannot_list_keys() {
        let wallet = wallet_with_keys(2);

        assert_eq!(resolve_restricted_keys(&wallet, HOST).unwrap(), None);
        let cw = ConnectedWallet::new(HOST, &wallet).unwrap();
        assert!(!cw.can_list_keys());
        assert!(cw.restricted_keys().is_empty());
        assert!(cw.require_interaction());
    }

    #[test]
    fn unrestricted_policy_follows_untainted_keys() {
        let mut wallet = wallet_with_keys(3);
        wallet
            .update_permissions(HOST, Permissions::read_all_keys())
            .unwrap();
        let keys = public_keys(&wallet);
        wallet.taint_key(&keys[1]).unwrap();

        let mut cw = ConnectedWallet::new(HOST, &wallet).unwrap();
        assert!(cw.can_list_keys());
        assert!(cw.can_use_key(&keys[0]));
        assert!(!cw.can_use_key(&keys[1]));
        assert!(cw.can_use_key(&keys[2]));

        let added = wallet.generate_key_pair(vec![]);
        assert!(!cw.can_use_key(added.public_key()));
        cw.refresh_from_wallet(&wallet).unwrap();
        assert!(cw.can_use_key(added.public_key()));
        assert_eq!(cw.restricted_keys().len(), 3);
    }

    #[test]
    fn allow_list_restricts_and_drops_tainted_keys() {
        let mut wallet = wallet_with_keys(3);
        let keys = public_keys(&wallet);
        allow(&mut wallet, vec![keys[0].clone(), keys[2].clone()]);

        let mut cw = ConnectedWallet::new(HOST, &wallet).unwrap();
        assert!(cw.can_use_key(&keys[0]));
        assert!(!cw.can_use_key(&keys[1]));
        assert!(cw.can_use_key(&keys[2]));

        wallet.taint_key(&keys[2]).unwrap();
        cw.refresh_from_wallet(&wallet).unwrap();
        assert!(!cw.can_use_key(&keys[2]));
        assert_eq!(cw.restricted_keys().len(), 1);
        assert_eq!(cw.restricted_keys()[0].name, "Key 1");
    }

    #[test]
    fn allow_list_referencing_missing_key_is_inconsistent() {
        let mut wallet = wallet_with_keys(1);
        wallet
            .update_permissions(HOST, Permissions::read_all_keys())
            .unwrap();
        let mut cw = ConnectedWallet::new(HOST, &wallet).unwrap();
        let before = cw.clone();

        wallet.set_permissions_unchecked(
            HOST,
            Permissions {
                public_keys: PublicKeysPermission {
                    access: AccessMode::Read,
                    allowed_keys: vec!["deadbeef".to_string()],
                },
            },
        );

        let err = resolve_restricted_keys(&wallet, HOST).unwrap_err();
        assert!(matches!(
            err,
            ConnectionError::InconsistentPermissions { public_key, .. } if public_key == "deadbeef"
        ));
        assert!(cw.refresh_from_wallet(&wallet).is_err());
        assert_eq!(cw, before);
    }

    #[test]
    fn long_living_view_needs_no_interaction() {
        let mut wallet = wallet_with_keys(2);
        let keys = public_keys(&wallet);
        wallet.taint_key(&keys[0]).unwrap();

        let cw = ConnectedWallet::new_long_living(&wallet);
        assert!(!cw.require_interaction());
        assert!(cw.can_list_keys());
        assert!(cw.hostname().is_empty());
        assert!(!cw.can_use_key(&keys[0]));
        assert!(cw.can_use_key(&keys[1]));
    }

    #[test]
    fn refresh_follows_renames() {
        let mut wallet = wallet_with_keys(1);
        wallet
            .update_permissions(HOST, Permissions::read_all_keys())
            .unwrap();
        let mut cw = ConnectedWallet::new(HOST, &wallet).unwrap();

        wallet.set_name("renamed").unwrap();
        cw.refresh_from_wallet(&wallet).unwrap();
        assert_eq!(cw.name(), "renamed");
        assert_eq!(cw.hostname(), HOST);
    }
}
