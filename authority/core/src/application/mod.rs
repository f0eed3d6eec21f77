// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

pub mod access_control;
pub mod authorization;
pub mod certifier;
pub mod entity_resolver;
pub mod garbage_collector;
pub mod repository_factory;

// Re-export services for convenience
pub use access_control::{AccessControlService, StandardAccessControlService};
pub use authorization::{
    AuthorizationDecision, AuthorizationError, AuthorizationRequest, AuthorizationService,
    StandardAuthorizationService,
};
pub use certifier::{CertifierService, IssuedCertificate, SignCsrRequest, StandardCertifierService};
pub use garbage_collector::{CertificateGarbageCollector, GarbageCollectorConfig};
