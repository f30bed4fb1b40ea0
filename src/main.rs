// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::sync::Arc;

use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use relational_wallet_connect::{
    api::router,
    config::{ServiceConfig, DEFAULT_LOG_FILTER, LOG_FORMAT_ENV},
    connections::SessionRegistry,
    interaction::{AutomaticConsentResponder, ChannelInteractor, FrontEndQueue},
    node::{HttpNode, Node, RoundRobinSelector},
    pipeline::{RequestController, TransactionAuthorizationPipeline},
    spam::SpamPolicy,
    state::AppState,
    wallet::{
        InMemoryNetworkStore, InMemoryTokenStore, InMemoryWalletStore, Network, NetworkStore,
        TokenDescription, TokenStore, WalletCredentials,
    },
};

fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let json = std::env::var(LOG_FORMAT_ENV).is_ok_and(|format| format == "json");

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().pretty())
            .init();
    }
}

#[tokio::main]
async fn main() {
    init_tracing();

    let config = match ServiceConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "Invalid configuration");
            std::process::exit(1);
        }
    };

    let shutdown = CancellationToken::new();

    // Wallets and tokens
    let wallet_store = Arc::new(InMemoryWalletStore::new());
    let token_store = Arc::new(InMemoryTokenStore::new());
    let mut credentials = None;
    if let Some(seed) = &config.seed_wallet {
        wallet_store
            .create_wallet(&seed.name, &seed.passphrase)
            .expect("Failed to create the seed wallet");
        let wallet = WalletCredentials {
            name: seed.name.clone(),
            passphrase: seed.passphrase.clone(),
        };
        if let Some(token) = &seed.api_token {
            token_store
                .save_token(TokenDescription {
                    token: token.clone(),
                    description: "seeded at startup".to_string(),
                    creation_date: Utc::now(),
                    expiration_date: None,
                    wallet: wallet.clone(),
                })
                .await
                .expect("Failed to save the seed API token");
        }
        info!(wallet = %seed.name, "Seed wallet created");
        credentials = Some(wallet);
    }

    // Nodes
    let network_store = InMemoryNetworkStore::new();
    network_store
        .save_network(&Network {
            name: config.network_name.clone(),
            hosts: config.node_hosts.clone(),
        })
        .await
        .expect("Failed to save the network");
    let network = network_store
        .get_network(&config.network_name)
        .await
        .expect("Failed to load the network");
    let nodes: Vec<Arc<dyn Node>> = network
        .hosts
        .iter()
        .map(|host| {
            HttpNode::new(host.as_str(), config.node_timeout)
                .map(|node| Arc::new(node) as Arc<dyn Node>)
                .expect("Failed to build the node client")
        })
        .collect();
    let node_selector = Arc::new(RoundRobinSelector::new(
        nodes,
        config.node_max_retries,
        config.node_retry_delay,
    ));
    info!(network = %network.name, hosts = ?node_selector.hosts(), "Nodes configured");

    // Interactions
    let (interactor, interactions) = ChannelInteractor::channel();
    let interactor = Arc::new(interactor);
    let front_end = match &config.front_end_token {
        Some(token) if !config.automatic_consent => {
            let queue = Arc::new(FrontEndQueue::new());
            tokio::spawn(Arc::clone(&queue).run(interactions, shutdown.clone()));
            Some((queue, token.clone()))
        }
        _ => {
            tokio::spawn(
                AutomaticConsentResponder::new(credentials).run(interactions, shutdown.clone()),
            );
            None
        }
    };

    // Connections
    let registry = Arc::new(SessionRegistry::new(
        wallet_store.clone(),
        token_store,
        interactor.clone(),
        config.session_ttl,
    ));
    match registry.load_long_living_tokens().await {
        Ok(count) => info!(count, "Long-living tokens loaded"),
        Err(e) => warn!(error = %e, "Could not load the long-living tokens"),
    }
    {
        let registry = Arc::clone(&registry);
        let shutdown = shutdown.clone();
        tokio::spawn(async move { registry.watch_store_events(shutdown).await });
    }

    let pipeline = TransactionAuthorizationPipeline::new(
        wallet_store,
        interactor,
        node_selector,
        Arc::new(SpamPolicy::new()),
        RequestController::new(config.request_max_attempts, config.request_retry_delay),
        registry,
    );
    let mut state =
        AppState::new(Arc::new(pipeline), config.network_name.clone(), shutdown.clone());
    if let Some((queue, token)) = front_end {
        info!("Reviews are answered by the front-end at /api/v2/interactions");
        state = state.with_front_end(queue, token);
    }
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .expect("Failed to bind the server address");
    info!(
        "Relational Wallet Connect listening on http://{} (docs at /docs)",
        config.bind_addr
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!(error = %e, "Could not listen for the shutdown signal");
            }
            info!("Shutting down");
            shutdown.cancel();
        })
        .await
        .expect("Server failed");
}
