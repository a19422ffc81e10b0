//! Authorization primitives
//!
//! - `PermissionSet`: immutable per-user capabilities (brokers, publish
//!   topics, subscribe filters), or allow-all
//! - `ResourceCatalog`: resources known to the deployment, and the policy for
//!   the ones that aren't
//! - `Denial`: typed refusal handed back to the session host

mod catalog;
mod credential;
mod denial;
mod permissions;

pub use catalog::{AuthorizationTable, ResourceCatalog};
pub use credential::Credential;
pub use denial::{Denial, OK_CODE};
pub use permissions::{PermissionSet, PermissionSetBuilder, ResourceKind};
