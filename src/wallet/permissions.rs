// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Per-hostname permission policy stored on a wallet.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Access granted to a hostname on a wallet resource.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum AccessMode {
    #[default]
    None,
    Read,
}

impl AccessMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccessMode::None => "none",
            AccessMode::Read => "read",
        }
    }
}

impl fmt::Display for AccessMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AccessMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(AccessMode::None),
            "read" => Ok(AccessMode::Read),
            other => Err(format!("access mode {other:?} is not supported")),
        }
    }
}

/// Policy on the wallet's public keys.
///
/// An empty `allowed_keys` with read access means every untainted key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PublicKeysPermission {
    pub access: AccessMode,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub allowed_keys: Vec<String>,
}

impl PublicKeysPermission {
    pub fn enabled(&self) -> bool {
        self.access != AccessMode::None
    }

    pub fn has_allowed_keys(&self) -> bool {
        !self.allowed_keys.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Permissions {
    pub public_keys: PublicKeysPermission,
}

/// Resource name used in permission summaries.
pub const PUBLIC_KEYS_RESOURCE: &str = "public_keys";

impl Permissions {
    /// Read access to every untainted key.
    pub fn read_all_keys() -> Self {
        Self {
            public_keys: PublicKeysPermission {
                access: AccessMode::Read,
                allowed_keys: Vec::new(),
            },
        }
    }

    pub fn can_list_keys(&self) -> bool {
        self.public_keys.enabled()
    }

    /// Resource name to access mode, as shown in permission reviews.
    pub fn summary(&self) -> BTreeMap<String, String> {
        BTreeMap::from([(
            PUBLIC_KEYS_RESOURCE.to_string(),
            self.public_keys.access.to_string(),
        )])
    }
}
