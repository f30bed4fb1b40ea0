// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Session Registry
//!
//! Maps connection tokens to [`ConnectedWallet`]s.
//!
//! Two kinds of connections live here:
//!
//! | Kind | Created by | Hostname | Expiry |
//! |------|------------|----------|--------|
//! | Session | `client.connect_wallet` | bound | `SESSION_TTL_SECS` after the last unlock, or when the wallet is locked |
//! | Long-living | API token | none | token expiration date, if any |
//!
//! An expired or closed session is not dropped: presenting its token runs
//! the wallet-unlocking workflow and reopens every session on that wallet.
//! An expired long-living token fails authentication. Long-living
//! connections follow the token store: deleting a token revokes its
//! connection, and `client.disconnect_wallet` leaves them alone.
//!
//! The internal lock is never held across an `.await`.

use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use serde::Serialize;
use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use utoipa::ToSchema;

use super::{ConnectedWallet, ConnectionError, SystemClock, TimeService, Token};
use crate::context::RequestContext;
use crate::error::ApiError;
use crate::interaction::{ErrorType, InteractionSession, Interactor, Workflow};
use crate::wallet::{TokenEvent, TokenStore, Wallet, WalletEvent, WalletStore};

/// A live session, as listed to the administrator.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, ToSchema)]
pub struct ConnectionSummary {
    pub hostname: String,
    pub wallet: String,
}

#[derive(Debug, Clone)]
enum Policy {
    Session {
        renewed_at: DateTime<Utc>,
        closed: bool,
    },
    LongLiving {
        expires_at: Option<DateTime<Utc>>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Standing {
    Active,
    /// Session past its TTL or whose wallet got locked.
    NeedsUnlock,
    /// Long-living token past its expiration date.
    Expired,
}

impl Policy {
    fn standing(&self, now: DateTime<Utc>, session_ttl: TimeDelta) -> Standing {
        match self {
            Policy::Session { renewed_at, closed } => {
                if *closed || now.signed_duration_since(*renewed_at) >= session_ttl {
                    Standing::NeedsUnlock
                } else {
                    Standing::Active
                }
            }
            Policy::LongLiving { expires_at } => match expires_at {
                Some(expires_at) if *expires_at <= now => Standing::Expired,
                _ => Standing::Active,
            },
        }
    }
}

struct Connection {
    connected_wallet: ConnectedWallet,
    policy: Policy,
}

type Fingerprint = (String, String);

#[derive(Default)]
struct Registry {
    connections: HashMap<Token, Connection>,
    /// (hostname, wallet) to session token.
    fingerprints: HashMap<Fingerprint, Token>,
}

impl Registry {
    fn remove(&mut self, token: &Token) -> Option<Connection> {
        let connection = self.connections.remove(token)?;
        let fingerprint = (
            connection.connected_wallet.hostname().to_string(),
            connection.connected_wallet.name().to_string(),
        );
        if self.fingerprints.get(&fingerprint) == Some(token) {
            self.fingerprints.remove(&fingerprint);
        }
        Some(connection)
    }

    fn tokens_on_wallet(&self, wallet_name: &str) -> Vec<Token> {
        self.connections
            .iter()
            .filter(|(_, c)| c.connected_wallet.name() == wallet_name)
            .map(|(t, _)| t.clone())
            .collect()
    }

    /// Refreshes every connection on `wallet_name` from `wallet`.
    ///
    /// Connections that fail to refresh keep their previous view; the first
    /// failure is returned.
    fn refresh(&mut self, wallet_name: &str, wallet: &Wallet) -> Result<(), ConnectionError> {
        let mut first_error = None;
        for token in self.tokens_on_wallet(wallet_name) {
            let Some(connection) = self.connections.get_mut(&token) else {
                continue;
            };
            let hostname = connection.connected_wallet.hostname().to_string();
            if let Err(e) = connection.connected_wallet.refresh_from_wallet(wallet) {
                warn!(
                    wallet = %wallet_name,
                    hostname = %hostname,
                    token = %token.short(),
                    error = %e,
                    "Could not refresh connection"
                );
                first_error.get_or_insert(e);
                continue;
            }
            if wallet_name != wallet.name() {
                let previous = (hostname.clone(), wallet_name.to_string());
                if self.fingerprints.get(&previous) == Some(&token) {
                    self.fingerprints.remove(&previous);
                    self.fingerprints
                        .insert((hostname, wallet.name().to_string()), token);
                }
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}

pub struct SessionRegistry {
    inner: RwLock<Registry>,
    wallet_store: Arc<dyn WalletStore>,
    token_store: Arc<dyn TokenStore>,
    interactor: Arc<dyn Interactor>,
    time: Arc<dyn TimeService>,
    session_ttl: TimeDelta,
}

impl SessionRegistry {
    pub fn new(
        wallet_store: Arc<dyn WalletStore>,
        token_store: Arc<dyn TokenStore>,
        interactor: Arc<dyn Interactor>,
        session_ttl: Duration,
    ) -> Self {
        Self {
            inner: RwLock::new(Registry::default()),
            wallet_store,
            token_store,
            interactor,
            time: Arc::new(SystemClock),
            session_ttl: TimeDelta::from_std(session_ttl).unwrap_or(TimeDelta::MAX),
        }
    }

    pub fn with_time_service(mut self, time: Arc<dyn TimeService>) -> Self {
        self.time = time;
        self
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Registry>, ConnectionError> {
        self.inner
            .read()
            .map_err(|_| ConnectionError::Internal("session registry lock poisoned".to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Registry>, ConnectionError> {
        self.inner
            .write()
            .map_err(|_| ConnectionError::Internal("session registry lock poisoned".to_string()))
    }

    /// Opens a session between `hostname` and `wallet`.
    ///
    /// A previous session for the same hostname and wallet is replaced.
    pub fn connect(&self, hostname: &str, wallet: &Wallet) -> Result<Token, ConnectionError> {
        let connected_wallet = ConnectedWallet::new(hostname, wallet)?;
        let token = Token::generate();
        let fingerprint = (hostname.to_string(), wallet.name().to_string());

        let mut registry = self.write()?;
        if let Some(previous) = registry.fingerprints.get(&fingerprint).cloned() {
            registry.remove(&previous);
            debug!(hostname, wallet = %wallet.name(), token = %previous.short(), "Replaced previous session");
        }
        registry.connections.insert(
            token.clone(),
            Connection {
                connected_wallet,
                policy: Policy::Session {
                    renewed_at: self.time.now(),
                    closed: false,
                },
            },
        );
        registry.fingerprints.insert(fingerprint, token.clone());

        info!(hostname, wallet = %wallet.name(), token = %token.short(), "Wallet connected");
        Ok(token)
    }

    /// Syncs the long-living connections with the token store.
    ///
    /// Connections whose token was deleted or has expired are dropped, and
    /// every other stored token is (re)connected to its wallet. A token whose
    /// wallet cannot be unlocked is skipped. Returns how many are active.
    pub async fn load_long_living_tokens(&self) -> Result<usize, ConnectionError> {
        let now = self.time.now();
        let mut active = Vec::new();
        for description in self.token_store.list_tokens().await? {
            let token = Token::from(description.token.as_str());
            if description.expiration_date.is_some_and(|at| at <= now) {
                debug!(token = %token.short(), "Skipping expired API token");
                continue;
            }
            let credentials = &description.wallet;
            let unlocked = self
                .wallet_store
                .unlock_wallet(&credentials.name, &credentials.passphrase)
                .await;
            let wallet = match unlocked {
                Ok(()) => self.wallet_store.get_wallet(&credentials.name).await,
                Err(e) => Err(e),
            };
            match wallet {
                Ok(wallet) => active.push((token, wallet, description.expiration_date)),
                Err(e) => warn!(
                    wallet = %credentials.name,
                    token = %token.short(),
                    error = %e,
                    "Could not load API token"
                ),
            }
        }

        let mut registry = self.write()?;
        let stale: Vec<Token> = registry
            .connections
            .iter()
            .filter(|(token, c)| {
                matches!(c.policy, Policy::LongLiving { .. })
                    && !active.iter().any(|(active, _, _)| active == *token)
            })
            .map(|(token, _)| token.clone())
            .collect();
        for token in stale {
            registry.remove(&token);
            info!(token = %token.short(), "API token revoked");
        }

        let loaded = active.len();
        for (token, wallet, expires_at) in active {
            debug!(wallet = %wallet.name(), token = %token.short(), "Loaded API token");
            registry.connections.insert(
                token,
                Connection {
                    connected_wallet: ConnectedWallet::new_long_living(&wallet),
                    policy: Policy::LongLiving { expires_at },
                },
            );
        }
        Ok(loaded)
    }

    /// Pure lookup of the connection behind `token`.
    ///
    /// Unknown, expired and closed connections are all reported as
    /// [`ConnectionError::NoSuchConnection`].
    pub fn get_connected_wallet(&self, token: &Token) -> Result<ConnectedWallet, ConnectionError> {
        let registry = self.read()?;
        let connection = registry
            .connections
            .get(token)
            .ok_or(ConnectionError::NoSuchConnection)?;
        match connection.policy.standing(self.time.now(), self.session_ttl) {
            Standing::Active => Ok(connection.connected_wallet.clone()),
            Standing::NeedsUnlock | Standing::Expired => Err(ConnectionError::NoSuchConnection),
        }
    }

    /// Resolves the connection `hostname` presents `token` for.
    ///
    /// Reopens the session through the wallet-unlocking workflow when it has
    /// expired or its wallet has been locked.
    pub async fn authenticate(
        &self,
        ctx: &RequestContext,
        hostname: &str,
        token: &Token,
    ) -> Result<ConnectedWallet, ApiError> {
        let (connected_wallet, standing) = {
            let registry = self.read()?;
            let connection = registry
                .connections
                .get(token)
                .ok_or(ConnectionError::NoSuchConnection)?;
            (
                connection.connected_wallet.clone(),
                connection.policy.standing(self.time.now(), self.session_ttl),
            )
        };

        // Session tokens only work from the hostname they were issued to.
        if connected_wallet.require_interaction() && connected_wallet.hostname() != hostname {
            warn!(hostname, token = %token.short(), "Token presented from another hostname");
            return Err(ConnectionError::NoSuchConnection.into());
        }

        match standing {
            Standing::Active => Ok(connected_wallet),
            Standing::Expired => Err(ConnectionError::TokenExpired.into()),
            Standing::NeedsUnlock => {
                self.reopen(ctx, hostname, token, connected_wallet.name())
                    .await?;
                Ok(self.get_connected_wallet(token)?)
            }
        }
    }

    async fn reopen(
        &self,
        ctx: &RequestContext,
        hostname: &str,
        token: &Token,
        wallet_name: &str,
    ) -> Result<(), ApiError> {
        let wallet = self.unlock_wallet(ctx, hostname, wallet_name).await?;

        let now = self.time.now();
        let mut registry = self.write()?;
        if !registry.connections.contains_key(token) {
            return Err(ConnectionError::NoSuchConnection.into());
        }
        registry.refresh(wallet_name, &wallet)?;
        for connection in registry.connections.values_mut() {
            if connection.connected_wallet.name() != wallet.name() {
                continue;
            }
            if let Policy::Session { renewed_at, closed } = &mut connection.policy {
                *renewed_at = now;
                *closed = false;
            }
        }
        info!(hostname, wallet = %wallet.name(), "Sessions reopened");
        Ok(())
    }

    /// Wallet-unlocking workflow.
    async fn unlock_wallet(
        &self,
        ctx: &RequestContext,
        hostname: &str,
        wallet_name: &str,
    ) -> Result<Wallet, ApiError> {
        let session =
            InteractionSession::begin(Arc::clone(&self.interactor), ctx, Workflow::WalletUnlocking)
                .await
                .map_err(|e| {
                    ApiError::request_not_permitted(format!(
                        "could not start the interaction session: {e}"
                    ))
                })?;

        let reason = format!(
            "The application \"{hostname}\" requires the wallet \"{wallet_name}\" to be unlocked."
        );
        session
            .unlock_wallet(ctx, self.wallet_store.as_ref(), 1, wallet_name, &reason)
            .await?;

        let wallet = self.wallet_store.get_wallet(wallet_name).await.map_err(|e| {
            session.fail(
                ErrorType::InternalError,
                ApiError::internal(format!("could not retrieve the wallet: {e}")),
            )
        })?;
        session.notify_success(2, "The wallet has been successfully unlocked.");
        Ok(wallet)
    }

    /// Ends the session behind `token`. Connections opened with an API
    /// token only end when the token is deleted.
    pub fn disconnect(&self, token: &Token) -> Result<(), ConnectionError> {
        let mut registry = self.write()?;
        let connection = registry
            .connections
            .get(token)
            .ok_or(ConnectionError::NoSuchConnection)?;
        if matches!(connection.policy, Policy::LongLiving { .. }) {
            debug!(token = %token.short(), "Ignoring disconnection of an API token");
            return Ok(());
        }
        let connection = registry
            .remove(token)
            .ok_or(ConnectionError::NoSuchConnection)?;
        info!(
            hostname = %connection.connected_wallet.hostname(),
            wallet = %connection.connected_wallet.name(),
            token = %token.short(),
            "Wallet disconnected"
        );
        Ok(())
    }

    /// Ends the session between `hostname` and `wallet_name`, if any.
    pub fn disconnect_wallet(&self, hostname: &str, wallet_name: &str) -> Result<(), ConnectionError> {
        let mut registry = self.write()?;
        let fingerprint = (hostname.to_string(), wallet_name.to_string());
        if let Some(token) = registry.fingerprints.get(&fingerprint).cloned() {
            registry.remove(&token);
            info!(hostname, wallet = %wallet_name, "Wallet disconnected");
        }
        Ok(())
    }

    /// Live sessions, sorted. API-token connections are not listed.
    pub fn list_connections(&self) -> Result<Vec<ConnectionSummary>, ConnectionError> {
        let registry = self.read()?;
        let mut summaries: Vec<ConnectionSummary> = registry
            .connections
            .values()
            .filter(|c| matches!(c.policy, Policy::Session { .. }))
            .map(|c| ConnectionSummary {
                hostname: c.connected_wallet.hostname().to_string(),
                wallet: c.connected_wallet.name().to_string(),
            })
            .collect();
        summaries.sort();
        Ok(summaries)
    }

    /// Recomputes every connection on `wallet` after it changed.
    pub fn refresh_wallet(&self, wallet: &Wallet) -> Result<(), ConnectionError> {
        self.write()?.refresh(wallet.name(), wallet)
    }

    pub fn handle_wallet_event(&self, event: WalletEvent) -> Result<(), ConnectionError> {
        let mut registry = self.write()?;
        match event {
            WalletEvent::Updated(wallet) => {
                // Failures are logged by the refresh itself.
                let _ = registry.refresh(wallet.name(), &wallet);
            }
            WalletEvent::Renamed {
                previous_name,
                wallet,
            } => {
                let _ = registry.refresh(&previous_name, &wallet);
                debug!(previous_name = %previous_name, wallet = %wallet.name(), "Connections follow renamed wallet");
            }
            WalletEvent::Locked(name) => {
                for token in registry.tokens_on_wallet(&name) {
                    if let Some(Connection {
                        policy: Policy::Session { closed, .. },
                        ..
                    }) = registry.connections.get_mut(&token)
                    {
                        *closed = true;
                    }
                }
                info!(wallet = %name, "Sessions closed, wallet locked");
            }
            WalletEvent::Removed(name) => {
                for token in registry.tokens_on_wallet(&name) {
                    registry.remove(&token);
                }
                info!(wallet = %name, "Connections dropped, wallet removed");
            }
        }
        Ok(())
    }

    /// Applies wallet and token events until `shutdown` fires.
    pub async fn watch_store_events(&self, shutdown: CancellationToken) {
        let mut wallet_events = self.wallet_store.subscribe();
        let mut token_events = self.token_store.subscribe();
        info!("Watching store events");

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("Store event watcher shutting down");
                    return;
                }
                event = wallet_events.recv() => match event {
                    Ok(event) => {
                        if let Err(e) = self.handle_wallet_event(event) {
                            warn!(error = %e, "Could not apply wallet event");
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Wallet event watcher lagged behind");
                    }
                    Err(RecvError::Closed) => return,
                },
                event = token_events.recv() => {
                    if !self.handle_token_event(event).await {
                        return;
                    }
                }
            }
        }
    }

    /// Re-syncs API tokens after a token store change. Returns false once
    /// the store is gone.
    async fn handle_token_event(&self, event: Result<TokenEvent, RecvError>) -> bool {
        match event {
            Ok(event) => debug!(?event, "Token store changed"),
            // Every change triggers a full re-sync, so nothing is lost.
            Err(RecvError::Lagged(skipped)) => {
                debug!(skipped, "Token event watcher lagged behind");
            }
            Err(RecvError::Closed) => return false,
        }
        if let Err(e) = self.load_long_living_tokens().await {
            warn!(error = %e, "Could not refresh the API tokens");
        }
        true
    }
}
