use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use thiserror::Error;

use stockledger_core::LedgerError;

use crate::{OperationKind, Permission, Role};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthzError {
    #[error("role '{role}' may not {operation}: missing permission '{permission}'")]
    Forbidden {
        role: String,
        operation: OperationKind,
        permission: String,
    },
}

impl From<AuthzError> for LedgerError {
    fn from(value: AuthzError) -> Self {
        LedgerError::Forbidden(value.to_string())
    }
}

/// External role check consulted before every mutating ledger operation.
pub trait AuthorizationGate: Send + Sync {
    fn check(&self, role: &Role, operation: OperationKind) -> Result<(), AuthzError>;
}

impl<G> AuthorizationGate for Arc<G>
where
    G: AuthorizationGate + ?Sized,
{
    fn check(&self, role: &Role, operation: OperationKind) -> Result<(), AuthzError> {
        (**self).check(role, operation)
    }
}

/// Gate that permits everything. Intended for tests and embedding.
#[derive(Debug, Default, Clone, Copy)]
pub struct AllowAll;

impl AuthorizationGate for AllowAll {
    fn check(&self, _role: &Role, _operation: OperationKind) -> Result<(), AuthzError> {
        Ok(())
    }
}

/// Pure permission check against a granted set.
///
/// - No IO
/// - No panics
pub fn authorize<'a>(
    granted: impl IntoIterator<Item = &'a Permission>,
    required: &Permission,
) -> bool {
    granted
        .into_iter()
        .any(|p| p.is_wildcard() || p == required)
}

/// Static role → permission mapping.
///
/// Unknown roles are granted nothing.
#[derive(Debug, Clone, Default)]
pub struct RolePolicy {
    grants: HashMap<Role, BTreeSet<Permission>>,
}

impl RolePolicy {
    pub fn new() -> Self {
        Self::default()
    }

    /// `admin` → `*`; `manager` → every mutating operation; `warehouse` →
    /// inbound, outbound and reconciliation; `viewer` → nothing.
    pub fn standard() -> Self {
        Self::new()
            .grant(Role::new("admin"), [Permission::WILDCARD])
            .grant(
                Role::new("manager"),
                OperationKind::ALL.map(OperationKind::required_permission),
            )
            .grant(
                Role::new("warehouse"),
                [
                    Permission::INBOUND_CREATE,
                    Permission::OUTBOUND_CREATE,
                    Permission::RECONCILIATION_CREATE,
                ],
            )
            .grant(Role::new("viewer"), std::iter::empty())
    }

    pub fn grant(mut self, role: Role, permissions: impl IntoIterator<Item = Permission>) -> Self {
        self.grants.entry(role).or_default().extend(permissions);
        self
    }

    pub fn permissions(&self, role: &Role) -> Vec<Permission> {
        self.grants
            .get(role)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn roles(&self) -> impl Iterator<Item = &Role> {
        self.grants.keys()
    }
}

impl AuthorizationGate for RolePolicy {
    fn check(&self, role: &Role, operation: OperationKind) -> Result<(), AuthzError> {
        let required = operation.required_permission();
        let granted = self.grants.get(role).into_iter().flatten();

        if authorize(granted, &required) {
            Ok(())
        } else {
            tracing::debug!(%role, %operation, %required, "authorization denied");
            Err(AuthzError::Forbidden {
                role: role.to_string(),
                operation,
                permission: required.to_string(),
            })
        }
    }
}
