use std::borrow::Cow;

use serde::{Deserialize, Serialize};

/// Permission identifier.
///
/// Permissions are modeled as opaque strings (e.g. "stock.inbound.create").
/// A special wildcard permission `"*"` grants everything.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Permission(Cow<'static, str>);

impl Permission {
    pub const WILDCARD: Permission = Permission::from_static("*");
    pub const INBOUND_CREATE: Permission = Permission::from_static("stock.inbound.create");
    pub const OUTBOUND_CREATE: Permission = Permission::from_static("stock.outbound.create");
    pub const RECONCILIATION_CREATE: Permission =
        Permission::from_static("stock.reconciliation.create");
    pub const ENTRY_REVERSE: Permission = Permission::from_static("stock.entry.reverse");

    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    pub const fn from_static(name: &'static str) -> Self {
        Self(Cow::Borrowed(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_wildcard(&self) -> bool {
        self.as_str() == "*"
    }
}

impl core::fmt::Display for Permission {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Mutating ledger operations the gate is consulted for.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    CreateInbound,
    CreateOutbound,
    CreateReconciliation,
    ReverseEntry,
}

impl OperationKind {
    pub const ALL: [OperationKind; 4] = [
        OperationKind::CreateInbound,
        OperationKind::CreateOutbound,
        OperationKind::CreateReconciliation,
        OperationKind::ReverseEntry,
    ];

    pub fn required_permission(self) -> Permission {
        match self {
            OperationKind::CreateInbound => Permission::INBOUND_CREATE,
            OperationKind::CreateOutbound => Permission::OUTBOUND_CREATE,
            OperationKind::CreateReconciliation => Permission::RECONCILIATION_CREATE,
            OperationKind::ReverseEntry => Permission::ENTRY_REVERSE,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            OperationKind::CreateInbound => "create_inbound",
            OperationKind::CreateOutbound => "create_outbound",
            OperationKind::CreateReconciliation => "create_reconciliation",
            OperationKind::ReverseEntry => "reverse_entry",
        }
    }
}

impl core::fmt::Display for OperationKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}
