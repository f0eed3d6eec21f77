// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! End-to-end authorization scenarios over the in-memory store.

mod common;

use axum::http::Method;
use chrono::Duration;

use common::Authority;
use sentinel_core::application::{
    AccessControlService, AuthorizationError, AuthorizationRequest, AuthorizationService,
    CertifierService,
};
use sentinel_core::domain::access_control::{AccessControlEntity, Permission};
use sentinel_core::domain::errors::AuthorityError;
use sentinel_core::domain::identity::Identity;

fn request(serial: &str, method: Method, path: &str) -> AuthorizationRequest {
    AuthorizationRequest {
        serial: Some(serial.to_string()),
        method,
        path: path.to_string(),
    }
}

fn bob() -> Identity {
    Identity::new_operator("bob").unwrap()
}

fn grant(target: Identity, permissions: Permission) -> AccessControlEntity {
    AccessControlEntity::new(target, permissions)
}

#[tokio::test]
async fn test_exact_grant_then_wildcard_widening() {
    let authority = Authority::in_memory();
    authority
        .access_control
        .set_operator(&bob(), vec![grant(Identity::new_network("N1").unwrap(), Permission::READ)])
        .await
        .unwrap();
    let serial = authority.issue(bob()).await;

    let decision = authority
        .authorization
        .authorize(&request(&serial, Method::GET, "/v1/networks/N1"))
        .await
        .unwrap();
    assert_eq!(decision.operator, bob());
    assert_eq!(decision.targets, vec![Identity::new_network("N1").unwrap()]);

    let err = authority
        .authorization
        .authorize(&request(&serial, Method::PUT, "/v1/networks/N1"))
        .await
        .unwrap_err();
    assert!(matches!(err, AuthorizationError::Forbidden(_)));

    authority
        .access_control
        .update_operator(&bob(), vec![grant(Identity::new_network_wildcard(), Permission::WRITE)])
        .await
        .unwrap();

    authority
        .authorization
        .authorize(&request(&serial, Method::PUT, "/v1/networks/N2"))
        .await
        .unwrap();
    // The exact READ grant survived the merge.
    authority
        .authorization
        .authorize(&request(&serial, Method::GET, "/v1/networks/N1"))
        .await
        .unwrap();
    // Wildcard WRITE does not imply READ on other networks.
    assert!(matches!(
        authority
            .authorization
            .authorize(&request(&serial, Method::GET, "/v1/networks/N2"))
            .await,
        Err(AuthorizationError::Forbidden(_))
    ));
}

#[tokio::test]
async fn test_unresolvable_paths_need_every_category_wildcard() {
    let authority = Authority::in_memory();
    let alice = Identity::new_operator("alice").unwrap();
    authority
        .access_control
        .set_operator(
            &bob(),
            vec![
                grant(Identity::new_network_wildcard(), Permission::READ_WRITE),
                grant(Identity::new_operator_wildcard(), Permission::READ_WRITE),
            ],
        )
        .await
        .unwrap();
    authority
        .access_control
        .set_operator(
            &alice,
            vec![
                grant(Identity::new_network_wildcard(), Permission::READ),
                grant(Identity::new_operator_wildcard(), Permission::READ),
                grant(Identity::new_gateway_wildcard(), Permission::READ),
            ],
        )
        .await
        .unwrap();
    let bob_serial = authority.issue(bob()).await;
    let alice_serial = authority.issue(alice).await;

    let err = authority
        .authorization
        .authorize(&request(&bob_serial, Method::GET, "/v1/certificates"))
        .await
        .unwrap_err();
    match err {
        AuthorizationError::Forbidden(message) => assert!(message.contains("Id_Wildcard_Gateway")),
        other => panic!("unexpected error: {other:?}"),
    }

    let decision = authority
        .authorization
        .authorize(&request(&alice_serial, Method::GET, "/v1/certificates"))
        .await
        .unwrap();
    assert_eq!(decision.targets, Identity::supervisor_wildcards());

    assert!(matches!(
        authority
            .authorization
            .authorize(&request(&alice_serial, Method::POST, "/v1/certificates/gc"))
            .await,
        Err(AuthorizationError::Forbidden(_))
    ));
}

#[tokio::test]
async fn test_revocation_leaves_acl_untouched() {
    let authority = Authority::in_memory();
    let entries = vec![grant(Identity::new_network("N1").unwrap(), Permission::READ)];
    authority
        .access_control
        .set_operator(&bob(), entries.clone())
        .await
        .unwrap();
    let serial = authority.issue(bob()).await;

    authority.certifier.revoke_certificate(&serial).await.unwrap();
    assert!(matches!(
        authority.certifier.get_identity(&serial).await,
        Err(AuthorityError::NotFound(_))
    ));
    assert_eq!(
        authority.access_control.get_operator_acl(&bob()).await.unwrap(),
        entries
    );
    assert!(matches!(
        authority
            .authorization
            .authorize(&request(&serial, Method::GET, "/v1/networks/N1"))
            .await,
        Err(AuthorizationError::Unauthenticated(_))
    ));
}

#[tokio::test]
async fn test_deleted_operator_has_no_permissions() {
    let authority = Authority::in_memory();
    authority
        .access_control
        .set_operator(&bob(), vec![grant(Identity::new_network_wildcard(), Permission::READ_WRITE)])
        .await
        .unwrap();
    authority.access_control.delete_operator(&bob()).await.unwrap();

    let err = authority
        .access_control
        .check_read_permission(&bob(), &[Identity::new_network("N1").unwrap()])
        .await
        .unwrap_err();
    match err {
        AuthorityError::PermissionDenied { denied, .. } => {
            assert_eq!(denied.len(), 1);
            assert_eq!(denied[0].granted, Permission::NONE);
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_validity_window_is_inclusive() {
    let authority = Authority::in_memory();
    let serial = authority.issue(bob()).await;
    let record = authority.certifier.get_identity(&serial).await.unwrap();

    authority.clock.set(record.not_before);
    assert!(authority.certifier.verify_date_range(&record).is_ok());
    authority.clock.set(record.not_after);
    assert!(authority.certifier.verify_date_range(&record).is_ok());

    authority.clock.set(record.not_after + Duration::seconds(1));
    assert!(matches!(
        authority.certifier.verify_date_range(&record),
        Err(AuthorityError::Expired { .. })
    ));
    authority.clock.set(record.not_before - Duration::seconds(1));
    assert!(matches!(
        authority.certifier.verify_date_range(&record),
        Err(AuthorityError::NotYetValid { .. })
    ));
}

#[tokio::test]
async fn test_garbage_collection_respects_not_after() {
    let authority = Authority::in_memory();
    let expiring = authority.issue(bob()).await;
    authority.clock.advance(Duration::hours(12));
    let current = authority.issue(bob()).await;

    // First certificate expired exactly now: kept.
    authority.clock.advance(Duration::hours(12));
    assert_eq!(
        authority
            .certifier
            .collect_garbage(std::time::Duration::ZERO)
            .await
            .unwrap(),
        0
    );

    authority.clock.advance(Duration::seconds(1));
    assert_eq!(
        authority
            .certifier
            .collect_garbage(std::time::Duration::ZERO)
            .await
            .unwrap(),
        1
    );
    assert!(authority.certifier.get_identity(&expiring).await.is_err());
    assert_eq!(
        authority.certifier.find_certificates(&bob()).await.unwrap(),
        vec![authority.certifier.get_identity(&current).await.unwrap().serial_number]
    );
}

#[test]
fn test_identity_hashes_are_canonical() {
    let a = Identity::new_gateway("hw1", "n1", "gw1").unwrap();
    let b = Identity::new_gateway("hw1", "n1", "gw1").unwrap();
    assert_eq!(a.hash_string(), b.hash_string());

    let distinct = [
        Identity::new_network("x").unwrap(),
        Identity::new_operator("x").unwrap(),
        Identity::new_gateway("x", "", "").unwrap(),
        Identity::new_gateway("x", "y", "").unwrap(),
        Identity::new_gateway("x", "", "y").unwrap(),
        Identity::new_network_wildcard(),
        Identity::new_operator_wildcard(),
        Identity::new_gateway_wildcard(),
    ];
    let hashes: std::collections::HashSet<String> =
        distinct.iter().map(Identity::hash_string).collect();
    assert_eq!(hashes.len(), distinct.len());
}
