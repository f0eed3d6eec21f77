// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Domain Layer
//!
//! Identity model, permissions, certificate records, errors and the
//! persistence contracts of the authority. Nothing here performs I/O.

pub mod access_control;
pub mod authority_config;
pub mod certificate;
pub mod clock;
pub mod errors;
pub mod events;
pub mod identity;
pub mod repository;
