// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Infrastructure Layer
//!
//! Adapters behind the domain contracts: key/value stores, typed
//! repositories, CA key material and the event bus.

pub mod db;
pub mod event_bus;
pub mod pki;
pub mod repositories;

pub use event_bus::EventBus;
