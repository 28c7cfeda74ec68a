use std::borrow::Cow;

use serde::{Deserialize, Serialize};

/// Name of the role a caller acts in, e.g. `warehouse` or `viewer`.
///
/// The gate never interprets the name itself. A [`crate::RolePolicy`] maps it
/// to the ledger operations it may perform, and a name the policy does not
/// know grants nothing.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Role(Cow<'static, str>);

impl Role {
    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for Role {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}
