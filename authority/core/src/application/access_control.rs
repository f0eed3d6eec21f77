// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Access Control Service
//!
//! Policy store answering "does operator X hold permission P on entity Y".
//!
//! Effective permission is the OR of the exact grant on the entity and the
//! grant on its category wildcard (see [`AccessControlList::permissions_for`]).
//! There is no deny entry: adding a grant can only widen access.
//!
//! `update_operator` requires an existing ACL; new operators are created with
//! `set_operator`. Concurrent writes to the same operator race, last write
//! wins.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::domain::access_control::{
    ensure_operator, AccessControlEntity, AccessControlList, Permission,
};
use crate::domain::clock::Clock;
use crate::domain::errors::{AuthorityError, DeniedEntity};
use crate::domain::events::AuthorityEvent;
use crate::domain::identity::Identity;
use crate::domain::repository::AccessControlRepository;
use crate::infrastructure::event_bus::EventBus;

#[async_trait]
pub trait AccessControlService: Send + Sync {
    /// Replaces the operator's ACL with exactly `entries`, creating it if absent.
    async fn set_operator(
        &self,
        operator: &Identity,
        entries: Vec<AccessControlEntity>,
    ) -> Result<(), AuthorityError>;

    /// Merges `entries` into an existing ACL. Fails `NotFound` when the
    /// operator has none.
    async fn update_operator(
        &self,
        operator: &Identity,
        entries: Vec<AccessControlEntity>,
    ) -> Result<(), AuthorityError>;

    /// Idempotent.
    async fn delete_operator(&self, operator: &Identity) -> Result<(), AuthorityError>;

    /// Empty for an operator without a stored ACL.
    async fn get_operator_acl(
        &self,
        operator: &Identity,
    ) -> Result<Vec<AccessControlEntity>, AuthorityError>;

    /// ACLs in request order; operators without one are skipped.
    async fn get_operators_acls(
        &self,
        operators: &[Identity],
    ) -> Result<Vec<(Identity, Vec<AccessControlEntity>)>, AuthorityError>;

    async fn get_permissions(
        &self,
        operator: &Identity,
        entity: &Identity,
    ) -> Result<Permission, AuthorityError>;

    async fn check_read_permission(
        &self,
        operator: &Identity,
        entities: &[Identity],
    ) -> Result<(), AuthorityError> {
        let pairs: Vec<_> = entities.iter().map(|e| (e.clone(), Permission::READ)).collect();
        self.check_permissions(operator, &pairs).await
    }

    async fn check_write_permission(
        &self,
        operator: &Identity,
        entities: &[Identity],
    ) -> Result<(), AuthorityError> {
        let pairs: Vec<_> = entities.iter().map(|e| (e.clone(), Permission::WRITE)).collect();
        self.check_permissions(operator, &pairs).await
    }

    /// All-or-nothing over `checks`. A failure names every failing pair.
    async fn check_permissions(
        &self,
        operator: &Identity,
        checks: &[(Identity, Permission)],
    ) -> Result<(), AuthorityError>;

    async fn list_operators(&self) -> Result<Vec<Identity>, AuthorityError>;
}

pub struct StandardAccessControlService {
    repository: Arc<dyn AccessControlRepository>,
    clock: Arc<dyn Clock>,
    event_bus: EventBus,
}

impl StandardAccessControlService {
    pub fn new(
        repository: Arc<dyn AccessControlRepository>,
        clock: Arc<dyn Clock>,
        event_bus: EventBus,
    ) -> Self {
        Self {
            repository,
            clock,
            event_bus,
        }
    }

    async fn load(&self, operator: &Identity) -> Result<Option<AccessControlList>, AuthorityError> {
        ensure_operator(operator)?;
        Ok(self.repository.find_by_operator(operator).await?)
    }

    async fn store(&self, acl: &AccessControlList, replaced: bool) -> Result<(), AuthorityError> {
        self.repository.save(acl).await?;
        info!(
            operator = %acl.operator,
            entries = acl.entities.len(),
            replaced,
            "Stored operator ACL"
        );
        self.event_bus.publish(AuthorityEvent::AccessControlChanged {
            operator: acl.operator.clone(),
            entry_count: acl.entities.len(),
            replaced,
            changed_at: self.clock.now(),
        });
        Ok(())
    }
}

#[async_trait]
impl AccessControlService for StandardAccessControlService {
    async fn set_operator(
        &self,
        operator: &Identity,
        entries: Vec<AccessControlEntity>,
    ) -> Result<(), AuthorityError> {
        let acl = AccessControlList::with_entries(operator.clone(), entries)?;
        self.store(&acl, true).await
    }

    async fn update_operator(
        &self,
        operator: &Identity,
        entries: Vec<AccessControlEntity>,
    ) -> Result<(), AuthorityError> {
        let mut acl = self.load(operator).await?.ok_or_else(|| {
            AuthorityError::NotFound(format!("no ACL for operator {}", operator))
        })?;
        acl.merge(entries)?;
        self.store(&acl, false).await
    }

    async fn delete_operator(&self, operator: &Identity) -> Result<(), AuthorityError> {
        ensure_operator(operator)?;
        self.repository.delete(operator).await?;
        info!(operator = %operator, "Deleted operator ACL");
        self.event_bus.publish(AuthorityEvent::AccessControlDeleted {
            operator: operator.clone(),
            deleted_at: self.clock.now(),
        });
        Ok(())
    }

    async fn get_operator_acl(
        &self,
        operator: &Identity,
    ) -> Result<Vec<AccessControlEntity>, AuthorityError> {
        Ok(self
            .load(operator)
            .await?
            .map(|acl| acl.entries())
            .unwrap_or_default())
    }

    async fn get_operators_acls(
        &self,
        operators: &[Identity],
    ) -> Result<Vec<(Identity, Vec<AccessControlEntity>)>, AuthorityError> {
        for operator in operators {
            ensure_operator(operator)?;
        }
        Ok(self
            .repository
            .find_by_operators(operators)
            .await?
            .into_iter()
            .map(|acl| {
                let entries = acl.entries();
                (acl.operator, entries)
            })
            .collect())
    }

    async fn get_permissions(
        &self,
        operator: &Identity,
        entity: &Identity,
    ) -> Result<Permission, AuthorityError> {
        entity.validate()?;
        Ok(self
            .load(operator)
            .await?
            .map(|acl| acl.permissions_for(entity))
            .unwrap_or(Permission::NONE))
    }

    async fn check_permissions(
        &self,
        operator: &Identity,
        checks: &[(Identity, Permission)],
    ) -> Result<(), AuthorityError> {
        for (entity, _) in checks {
            entity.validate()?;
        }
        // One read: every pair is checked against the same ACL snapshot.
        let acl = self.load(operator).await?;

        let denied: Vec<DeniedEntity> = checks
            .iter()
            .filter_map(|(entity, required)| {
                let granted = acl
                    .as_ref()
                    .map(|acl| acl.permissions_for(entity))
                    .unwrap_or(Permission::NONE);
                (!granted.contains(*required)).then(|| DeniedEntity {
                    entity: entity.clone(),
                    required: *required,
                    granted,
                })
            })
            .collect();

        if denied.is_empty() {
            debug!(operator = %operator, checks = checks.len(), "Permission check passed");
            return Ok(());
        }
        warn!(
            operator = %operator,
            denied = denied.len(),
            first = %denied[0],
            "Permission check failed"
        );
        Err(AuthorityError::PermissionDenied {
            operator: operator.clone(),
            denied,
        })
    }

    async fn list_operators(&self) -> Result<Vec<Identity>, AuthorityError> {
        Ok(self.repository.list_operators().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::clock::SystemClock;
    use crate::infrastructure::repositories::{
        InMemoryKeyValueStore, StoredAccessControlRepository,
    };

    fn service() -> StandardAccessControlService {
        let store = Arc::new(InMemoryKeyValueStore::new());
        StandardAccessControlService::new(
            Arc::new(StoredAccessControlRepository::new(store)),
            Arc::new(SystemClock),
            EventBus::with_default_capacity(),
        )
    }

    fn bob() -> Identity {
        Identity::new_operator("bob").unwrap()
    }

    fn network(id: &str) -> Identity {
        Identity::new_network(id).unwrap()
    }

    #[tokio::test]
    async fn test_set_operator_round_trip() {
        let svc = service();
        let entries = vec![
            AccessControlEntity::new(network("n1"), Permission::READ),
            AccessControlEntity::new(Identity::new_gateway_wildcard(), Permission::READ_WRITE),
        ];
        svc.set_operator(&bob(), entries.clone()).await.unwrap();

        let mut stored = svc.get_operator_acl(&bob()).await.unwrap();
        stored.sort_by_key(|e| e.target.hash_string());
        let mut expected = entries;
        expected.sort_by_key(|e| e.target.hash_string());
        assert_eq!(stored, expected);

        // Full replace.
        svc.set_operator(&bob(), vec![]).await.unwrap();
        assert!(svc.get_operator_acl(&bob()).await.unwrap().is_empty());
        assert_eq!(svc.list_operators().await.unwrap(), vec![bob()]);
    }

    #[tokio::test]
    async fn test_update_operator_merges() {
        let svc = service();
        assert!(matches!(
            svc.update_operator(&bob(), vec![]).await,
            Err(AuthorityError::NotFound(_))
        ));

        svc.set_operator(
            &bob(),
            vec![
                AccessControlEntity::new(network("n1"), Permission::READ),
                AccessControlEntity::new(network("n2"), Permission::READ),
            ],
        )
        .await
        .unwrap();
        svc.update_operator(
            &bob(),
            vec![AccessControlEntity::new(network("n2"), Permission::WRITE)],
        )
        .await
        .unwrap();

        assert_eq!(svc.get_permissions(&bob(), &network("n1")).await.unwrap(), Permission::READ);
        assert_eq!(svc.get_permissions(&bob(), &network("n2")).await.unwrap(), Permission::WRITE);
    }

    #[tokio::test]
    async fn test_permission_aggregation_is_a_union() {
        let svc = service();
        svc.set_operator(
            &bob(),
            vec![
                AccessControlEntity::new(network("n1"), Permission::READ),
                AccessControlEntity::new(Identity::new_network_wildcard(), Permission::WRITE),
            ],
        )
        .await
        .unwrap();

        assert_eq!(
            svc.get_permissions(&bob(), &network("n1")).await.unwrap(),
            Permission::READ_WRITE
        );
        assert_eq!(svc.get_permissions(&bob(), &network("n9")).await.unwrap(), Permission::WRITE);
        assert_eq!(
            svc.get_permissions(&bob(), &Identity::new_operator("eve").unwrap())
                .await
                .unwrap(),
            Permission::NONE
        );
    }

    #[tokio::test]
    async fn test_check_permissions_names_every_failure() {
        let svc = service();
        svc.set_operator(&bob(), vec![AccessControlEntity::new(network("n1"), Permission::READ)])
            .await
            .unwrap();

        svc.check_read_permission(&bob(), &[network("n1")]).await.unwrap();
        let err = svc
            .check_permissions(
                &bob(),
                &[
                    (network("n1"), Permission::READ),
                    (network("n1"), Permission::WRITE),
                    (network("n2"), Permission::READ),
                ],
            )
            .await
            .unwrap_err();
        match err {
            AuthorityError::PermissionDenied { operator, denied } => {
                assert_eq!(operator, bob());
                assert_eq!(denied.len(), 2);
                assert_eq!(denied[0].entity, network("n1"));
                assert_eq!(denied[0].required, Permission::WRITE);
                assert_eq!(denied[0].granted, Permission::READ);
                assert_eq!(denied[1].entity, network("n2"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_delete_operator_revokes_everything() {
        let svc = service();
        svc.set_operator(
            &bob(),
            vec![AccessControlEntity::new(Identity::new_network_wildcard(), Permission::READ)],
        )
        .await
        .unwrap();
        svc.delete_operator(&bob()).await.unwrap();
        svc.delete_operator(&bob()).await.unwrap();

        assert!(matches!(
            svc.check_read_permission(&bob(), &[network("n1")]).await,
            Err(AuthorityError::PermissionDenied { .. })
        ));
        assert!(svc.list_operators().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_non_operator_owner_rejected() {
        let svc = service();
        assert!(matches!(
            svc.set_operator(&network("n1"), vec![]).await,
            Err(AuthorityError::InvalidArgument(_))
        ));
        assert!(matches!(
            svc.get_operator_acl(&Identity::new_operator_wildcard()).await,
            Err(AuthorityError::InvalidArgument(_))
        ));
    }

    #[tokio::test]
    async fn test_get_operators_acls_skips_missing() {
        let svc = service();
        let alice = Identity::new_operator("alice").unwrap();
        let carol = Identity::new_operator("carol").unwrap();
        svc.set_operator(&alice, vec![AccessControlEntity::new(network("n1"), Permission::READ)])
            .await
            .unwrap();
        svc.set_operator(&bob(), vec![]).await.unwrap();

        let acls = svc
            .get_operators_acls(&[bob(), carol, alice.clone()])
            .await
            .unwrap();
        assert_eq!(acls.len(), 2);
        assert_eq!(acls[0].0, bob());
        assert!(acls[0].1.is_empty());
        assert_eq!(acls[1].0, alice);
        assert_eq!(acls[1].1.len(), 1);
    }

    #[tokio::test]
    async fn test_changes_are_published() {
        let bus = EventBus::new(8);
        let mut rx = bus.subscribe();
        let svc = StandardAccessControlService::new(
            Arc::new(StoredAccessControlRepository::new(Arc::new(
                InMemoryKeyValueStore::new(),
            ))),
            Arc::new(SystemClock),
            bus,
        );
        svc.set_operator(&bob(), vec![]).await.unwrap();
        svc.delete_operator(&bob()).await.unwrap();

        assert_eq!(rx.try_recv().unwrap().kind(), "access_control_changed");
        assert_eq!(rx.try_recv().unwrap().kind(), "access_control_deleted");
    }
}
