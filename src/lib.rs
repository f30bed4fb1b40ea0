// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Relational Wallet Connect - Connected-Wallet Authorization Service
//!
//! Lets third-party applications use the keys of a local wallet. Every
//! sensitive request goes through the same pipeline: permission
//! projection, human review, spam protection, proof-of-work, signing and
//! dispatch to a healthy node.
//!
//! ## Modules
//!
//! - `api` - JSON-RPC endpoint, front-end interactions and health checks (Axum)
//! - `connections` - per-hostname key projection and the session registry
//! - `interaction` - review protocol with the front-end
//! - `node` - node client and failover selection
//! - `pipeline` - the transaction authorization pipeline
//! - `spam` - quota checks and proof-of-work
//! - `wallet` - wallet model and stores

pub mod api;
pub mod config;
pub mod connections;
pub mod context;
pub mod error;
pub mod interaction;
pub mod node;
pub mod pipeline;
pub mod spam;
pub mod state;
pub mod transaction;
pub mod wallet;
