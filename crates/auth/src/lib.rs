//! Authorization decision engine.
//!
//! Given a principal, an action, a business module and a scope, answer
//! allow/deny with the tag of the rule that decided. Both the request path
//! (server) and the presentation layer (client capabilities) call the same
//! `Authorizer`, so the two cannot drift apart.
//!
//! This crate is intentionally decoupled from HTTP and storage.

pub mod authorize;
pub mod cache;
pub mod capabilities;
pub mod directory;
pub mod model;
pub mod permissions;
pub mod policy;
pub mod principal;
pub mod roles;
pub mod seed;
pub mod store;

pub use authorize::{AuthzError, Authorizer, DecisionExplanation, parse_request};
pub use cache::{CacheKey, CacheStats, DecisionCache};
pub use capabilities::{Affordance, CapabilityMatrix, ModuleCapabilities};
pub use directory::{DirectoryEntry, DirectoryError, InMemoryDirectory, PrincipalDirectory};
pub use model::{Action, Resource, Role, Scope};
pub use permissions::{Permission, PermissionDefinition};
pub use policy::{Decision, Reason, Rule};
pub use principal::{EffectiveRoles, Principal, PrincipalStatus, SingleRole};
pub use roles::RoleDefinition;
pub use store::{PermissionSnapshot, RolePermissionStore, SnapshotPermissionStore, StoreError};
