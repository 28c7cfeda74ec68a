//! `stockledger-auth`: authorization gate consulted before every mutating
//! ledger operation.
//!
//! This crate is intentionally decoupled from transport and storage: callers
//! arrive already authenticated, carrying a role.

pub mod authorize;
pub mod permissions;
pub mod principal;
pub mod roles;

pub use authorize::{authorize, AllowAll, AuthorizationGate, AuthzError, RolePolicy};
pub use permissions::{OperationKind, Permission};
pub use principal::{Caller, PrincipalId};
pub use roles::Role;
