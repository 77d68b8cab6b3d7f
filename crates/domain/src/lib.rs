//! Domain entities and invariants for the Docwell access-control and
//! lifecycle engine.

#![forbid(unsafe_code)]

mod capability;
mod document;
mod role;
mod visibility;
mod workflow;

pub use capability::{AuditAction, Capability, CapabilityCategory, CapabilitySet};
pub use document::{Document, DocumentInput, DocumentRecord, DocumentStatus};
pub use role::{AccessLevel, ResolvedIdentity, ResolvedRole, Role, RoleAssignment, RoleInput};
pub use visibility::{
    StatusGate, ViewerContext, VisibilityClause, VisibilityFilter, can_view, status_floor,
    status_visible,
};
pub use workflow::{
    AccessPath, TransitionEffects, TransitionRejection, TransitionRule, TransitionTable,
};
