// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Command implementations for the Sentinel CLI

pub mod config;
pub mod gc;

pub use self::config::ConfigCommand;
pub use self::gc::GcCommand;
