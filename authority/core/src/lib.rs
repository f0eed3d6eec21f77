// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Sentinel Core
//!
//! Trust and authorization core of the Sentinel authority: identity
//! certificates, per-operator access-control lists and the request
//! authorization that ties them together.
//!
//! # Architecture
//!
//! - **domain:** identities, permissions, certificate records, repository contracts
//! - **application:** certifier, access control and authorization services
//! - **infrastructure:** stores, CA key material, event bus
//! - **presentation:** axum middleware and administrative REST surface

pub mod application;
pub mod domain;
pub mod infrastructure;
pub mod presentation;
