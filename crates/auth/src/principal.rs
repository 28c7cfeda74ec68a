use core::str::FromStr;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::Role;

/// Identity of an authenticated principal (human user, service account, etc).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PrincipalId(Uuid);

impl PrincipalId {
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for PrincipalId {
    fn default() -> Self {
        Self::new()
    }
}

impl core::fmt::Display for PrincipalId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

impl FromStr for PrincipalId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::from_str(s)?))
    }
}

/// The caller of a ledger operation: who they are and which role they act in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller {
    pub principal_id: PrincipalId,
    pub role: Role,
}

impl Caller {
    pub fn new(principal_id: PrincipalId, role: Role) -> Self {
        Self { principal_id, role }
    }
}
