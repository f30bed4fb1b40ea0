// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration
//!
//! This module defines environment variable names and default values used
//! throughout the service. Configuration is loaded from the environment at
//! startup by [`ServiceConfig::from_env`].
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `HOST` | Server bind address | `0.0.0.0` |
//! | `PORT` | Server bind port | `1789` |
//! | `NETWORK_NAME` | Name of the network the service dispatches to | `mainnet` |
//! | `NODE_HOSTS` | Comma-separated node base URLs | Required |
//! | `NODE_MAX_RETRIES` | Selection passes over the node list | `5` |
//! | `NODE_RETRY_DELAY_MS` | Delay between selection passes | `1000` |
//! | `NODE_TIMEOUT_SECS` | Per-call HTTP timeout to a node | `10` |
//! | `SESSION_TTL_SECS` | Lifetime of a session connection | `3600` |
//! | `REQUEST_MAX_ATTEMPTS` | Attempts to acquire a busy public key | `10` |
//! | `REQUEST_RETRY_DELAY_MS` | Delay between those attempts | `2000` |
//! | `AUTOMATIC_CONSENT` | Approve every review without a front-end | `false` |
//! | `FRONT_END_TOKEN` | Bearer token of the front-end polling `/api/v2/interactions` | Required without automatic consent |
//! | `SEED_WALLET_NAME` | Wallet created at startup | Optional |
//! | `SEED_WALLET_PASSPHRASE` | Passphrase of the seeded wallet | Optional |
//! | `SEED_API_TOKEN` | Long-living token bound to the seeded wallet | Optional |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info,tower_http=debug` |

use std::env;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

pub const HOST_ENV: &str = "HOST";
pub const PORT_ENV: &str = "PORT";
pub const NETWORK_NAME_ENV: &str = "NETWORK_NAME";

/// Environment variable holding the node base URLs.
///
/// Hosts are tried in the listed order, starting from a rotating cursor.
pub const NODE_HOSTS_ENV: &str = "NODE_HOSTS";
pub const NODE_MAX_RETRIES_ENV: &str = "NODE_MAX_RETRIES";
pub const NODE_RETRY_DELAY_MS_ENV: &str = "NODE_RETRY_DELAY_MS";
pub const NODE_TIMEOUT_SECS_ENV: &str = "NODE_TIMEOUT_SECS";
pub const SESSION_TTL_SECS_ENV: &str = "SESSION_TTL_SECS";
pub const REQUEST_MAX_ATTEMPTS_ENV: &str = "REQUEST_MAX_ATTEMPTS";
pub const REQUEST_RETRY_DELAY_MS_ENV: &str = "REQUEST_RETRY_DELAY_MS";

/// When set to `true`, every review is approved without asking anyone.
///
/// Only meant for headless deployments where the operator is the sole
/// client of the service.
pub const AUTOMATIC_CONSENT_ENV: &str = "AUTOMATIC_CONSENT";

/// Secret the front-end presents to read and answer interactions.
pub const FRONT_END_TOKEN_ENV: &str = "FRONT_END_TOKEN";

pub const SEED_WALLET_NAME_ENV: &str = "SEED_WALLET_NAME";
pub const SEED_WALLET_PASSPHRASE_ENV: &str = "SEED_WALLET_PASSPHRASE";
pub const SEED_API_TOKEN_ENV: &str = "SEED_API_TOKEN";
pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 1789;
pub const DEFAULT_NETWORK_NAME: &str = "mainnet";
pub const DEFAULT_NODE_MAX_RETRIES: u32 = 5;
pub const DEFAULT_NODE_RETRY_DELAY: Duration = Duration::from_millis(1000);
pub const DEFAULT_NODE_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_SESSION_TTL: Duration = Duration::from_secs(3600);
pub const DEFAULT_REQUEST_MAX_ATTEMPTS: u32 = 10;
pub const DEFAULT_REQUEST_RETRY_DELAY: Duration = Duration::from_millis(2000);
pub const DEFAULT_LOG_FILTER: &str = "info,tower_http=debug";

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} is required")]
    Missing(&'static str),

    #[error("{name} has an invalid value {value:?}: {reason}")]
    Invalid {
        name: &'static str,
        value: String,
        reason: String,
    },
}

/// Credentials of a wallet created at startup.
#[derive(Debug, Clone)]
pub struct SeedWallet {
    pub name: String,
    pub passphrase: String,
    pub api_token: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub bind_addr: SocketAddr,
    pub network_name: String,
    pub node_hosts: Vec<String>,
    pub node_max_retries: u32,
    pub node_retry_delay: Duration,
    pub node_timeout: Duration,
    pub session_ttl: Duration,
    pub request_max_attempts: u32,
    pub request_retry_delay: Duration,
    pub automatic_consent: bool,
    /// Set whenever automatic consent is off.
    pub front_end_token: Option<String>,
    pub seed_wallet: Option<SeedWallet>,
}

impl ServiceConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Builds the configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let host = lookup(HOST_ENV).unwrap_or_else(|| DEFAULT_HOST.to_string());
        let port: u16 = parse_or(&lookup, PORT_ENV, DEFAULT_PORT)?;
        let bind_addr = format!("{host}:{port}")
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError::Invalid {
                name: HOST_ENV,
                value: host.clone(),
                reason: e.to_string(),
            })?;

        let node_hosts = parse_node_hosts(lookup(NODE_HOSTS_ENV))?;

        let seed_wallet = match (
            lookup(SEED_WALLET_NAME_ENV),
            lookup(SEED_WALLET_PASSPHRASE_ENV),
        ) {
            (Some(name), Some(passphrase)) => Some(SeedWallet {
                name,
                passphrase,
                api_token: lookup(SEED_API_TOKEN_ENV),
            }),
            (Some(_), None) => return Err(ConfigError::Missing(SEED_WALLET_PASSPHRASE_ENV)),
            _ => None,
        };

        let automatic_consent = parse_or(&lookup, AUTOMATIC_CONSENT_ENV, false)?;
        let front_end_token = lookup(FRONT_END_TOKEN_ENV)
            .map(|token| token.trim().to_string())
            .filter(|token| !token.is_empty());
        if !automatic_consent && front_end_token.is_none() {
            return Err(ConfigError::Missing(FRONT_END_TOKEN_ENV));
        }

        Ok(Self {
            bind_addr,
            network_name: lookup(NETWORK_NAME_ENV)
                .unwrap_or_else(|| DEFAULT_NETWORK_NAME.to_string()),
            node_hosts,
            node_max_retries: parse_or(&lookup, NODE_MAX_RETRIES_ENV, DEFAULT_NODE_MAX_RETRIES)?,
            node_retry_delay: Duration::from_millis(parse_or(
                &lookup,
                NODE_RETRY_DELAY_MS_ENV,
                DEFAULT_NODE_RETRY_DELAY.as_millis() as u64,
            )?),
            node_timeout: Duration::from_secs(parse_or(
                &lookup,
                NODE_TIMEOUT_SECS_ENV,
                DEFAULT_NODE_TIMEOUT.as_secs(),
            )?),
            session_ttl: Duration::from_secs(parse_or(
                &lookup,
                SESSION_TTL_SECS_ENV,
                DEFAULT_SESSION_TTL.as_secs(),
            )?),
            request_max_attempts: parse_or(
                &lookup,
                REQUEST_MAX_ATTEMPTS_ENV,
                DEFAULT_REQUEST_MAX_ATTEMPTS,
            )?,
            request_retry_delay: Duration::from_millis(parse_or(
                &lookup,
                REQUEST_RETRY_DELAY_MS_ENV,
                DEFAULT_REQUEST_RETRY_DELAY.as_millis() as u64,
            )?),
            automatic_consent,
            front_end_token,
            seed_wallet,
        })
    }
}

fn parse_or<F, T>(lookup: &F, name: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(name) {
        None => Ok(default),
        Some(value) if value.trim().is_empty() => Ok(default),
        Some(value) => value.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            name,
            value,
            reason: e.to_string(),
        }),
    }
}

fn parse_node_hosts(raw: Option<String>) -> Result<Vec<String>, ConfigError> {
    let raw = raw.ok_or(ConfigError::Missing(NODE_HOSTS_ENV))?;
    let mut hosts = Vec::new();
    for host in raw.split(',').map(str::trim).filter(|h| !h.is_empty()) {
        url::Url::parse(host).map_err(|e| ConfigError::Invalid {
            name: NODE_HOSTS_ENV,
            value: host.to_string(),
            reason: e.to_string(),
        })?;
        hosts.push(host.trim_end_matches('/').to_string());
    }
    if hosts.is_empty() {
        return Err(ConfigError::Missing(NODE_HOSTS_ENV));
    }
    Ok(hosts)
}
