use std::fmt::{Display, Formatter};

use chrono::{DateTime, Utc};
use docwell_core::{AppError, AppResult, NonEmptyString, RoleId, UserId};
use serde::{Deserialize, Serialize};

use crate::capability::{Capability, CapabilitySet};

/// Integer authority rank attached to a role, 0 through 100.
///
/// Level and capability are independent axes: a high level does not imply
/// any particular capability, and holding a capability does not raise the
/// level. Checks that consider both do so explicitly.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct AccessLevel(u8);

impl AccessLevel {
    /// No authority; the unauthenticated-equivalent floor.
    pub const NONE: Self = Self(0);
    /// Reader tier: may see near-final content.
    pub const READER: Self = Self(10);
    /// Editor tier: may see and work on in-progress content.
    pub const EDITOR: Self = Self(50);
    /// Manager tier: may approve and oversee content outside own scope.
    pub const MANAGER: Self = Self(70);
    /// Administrator tier: highest configurable rank.
    pub const ADMINISTRATOR: Self = Self(100);

    /// Creates a validated access level.
    pub fn new(value: u8) -> AppResult<Self> {
        if value > 100 {
            return Err(AppError::Validation(format!(
                "access level must be between 0 and 100, got {value}"
            )));
        }

        Ok(Self(value))
    }

    /// Returns the raw rank value.
    #[must_use]
    pub fn value(&self) -> u8 {
        self.0
    }
}

impl Display for AccessLevel {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

/// Named bundle of capabilities plus an authority level, assignable to users.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    id: RoleId,
    name: NonEmptyString,
    label: NonEmptyString,
    level: AccessLevel,
    is_system: bool,
    capabilities: CapabilitySet,
}

/// Input payload used to construct a validated role.
#[derive(Debug, Clone)]
pub struct RoleInput {
    /// Stable role identifier.
    pub id: RoleId,
    /// Unique role name.
    pub name: String,
    /// Human-readable role label.
    pub label: String,
    /// Authority rank granted by the role.
    pub level: AccessLevel,
    /// Marks system roles that administrative flows must not delete.
    pub is_system: bool,
    /// Capabilities granted by the role.
    pub capabilities: Vec<Capability>,
}

impl Role {
    /// Creates a validated role.
    pub fn new(input: RoleInput) -> AppResult<Self> {
        let RoleInput {
            id,
            name,
            label,
            level,
            is_system,
            capabilities,
        } = input;

        Ok(Self {
            id,
            name: NonEmptyString::new(name)?,
            label: NonEmptyString::new(label)?,
            level,
            is_system,
            capabilities: CapabilitySet::from_iter(capabilities),
        })
    }

    /// Returns the stable role identifier.
    #[must_use]
    pub fn id(&self) -> RoleId {
        self.id
    }

    /// Returns the unique role name.
    #[must_use]
    pub fn name(&self) -> &NonEmptyString {
        &self.name
    }

    /// Returns the human-readable label.
    #[must_use]
    pub fn label(&self) -> &NonEmptyString {
        &self.label
    }

    /// Returns the authority level granted by the role.
    #[must_use]
    pub fn level(&self) -> AccessLevel {
        self.level
    }

    /// Returns whether the role is system-managed.
    #[must_use]
    pub fn is_system(&self) -> bool {
        self.is_system
    }

    /// Returns the capabilities granted by the role.
    #[must_use]
    pub fn capabilities(&self) -> &CapabilitySet {
        &self.capabilities
    }
}

/// One user-to-role link as loaded for identity resolution.
///
/// Carries a snapshot of the role's level and grants so resolution never
/// re-walks role storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleAssignment {
    /// Assigned role identifier.
    pub role_id: RoleId,
    /// Assigned role name.
    pub role_name: String,
    /// Authority level of the assigned role.
    pub level: AccessLevel,
    /// Capabilities granted by the assigned role.
    pub capabilities: Vec<Capability>,
    /// Only active assignments count toward authorization.
    pub is_active: bool,
    /// Assignment timestamp; breaks ties when one "current" role is shown.
    pub assigned_at: DateTime<Utc>,
}

/// One role as carried on a resolved identity, for display purposes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedRole {
    /// Stable role identifier.
    pub id: RoleId,
    /// Role name.
    pub name: String,
    /// Role authority level.
    pub level: AccessLevel,
}

/// Immutable per-request aggregation of a user's active role assignments.
///
/// Authorization uses the maximum level and the capability union across all
/// active assignments. The most recent assignment only ever picks the
/// display role; downstream code must not re-walk the raw assignment list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedIdentity {
    user_id: UserId,
    max_level: AccessLevel,
    capabilities: CapabilitySet,
    roles: Vec<ResolvedRole>,
    current_role: Option<ResolvedRole>,
}

impl ResolvedIdentity {
    /// Aggregates active role assignments into one resolved identity.
    ///
    /// A user with zero active assignments resolves to level 0 and an empty
    /// capability set; that is the minimal-privilege identity, not an error.
    #[must_use]
    pub fn resolve(user_id: UserId, assignments: &[RoleAssignment]) -> Self {
        let mut max_level = AccessLevel::NONE;
        let mut capabilities = CapabilitySet::new();
        let mut roles = Vec::new();
        let mut current: Option<&RoleAssignment> = None;

        for assignment in assignments.iter().filter(|assignment| assignment.is_active) {
            max_level = max_level.max(assignment.level);
            capabilities.extend(assignment.capabilities.iter().copied());
            roles.push(ResolvedRole {
                id: assignment.role_id,
                name: assignment.role_name.clone(),
                level: assignment.level,
            });

            if current.is_none_or(|existing| assignment.assigned_at > existing.assigned_at) {
                current = Some(assignment);
            }
        }

        let current_role = current.map(|assignment| ResolvedRole {
            id: assignment.role_id,
            name: assignment.role_name.clone(),
            level: assignment.level,
        });

        Self {
            user_id,
            max_level,
            capabilities,
            roles,
            current_role,
        }
    }

    /// Creates a resolved identity directly from aggregated parts.
    #[must_use]
    pub fn from_parts(user_id: UserId, max_level: AccessLevel, capabilities: CapabilitySet) -> Self {
        Self {
            user_id,
            max_level,
            capabilities,
            roles: Vec::new(),
            current_role: None,
        }
    }

    /// Returns the user this identity was resolved for.
    #[must_use]
    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    /// Returns the maximum level across all active assignments.
    #[must_use]
    pub fn level(&self) -> AccessLevel {
        self.max_level
    }

    /// Returns the capability union across all active assignments.
    #[must_use]
    pub fn capabilities(&self) -> &CapabilitySet {
        &self.capabilities
    }

    /// Returns whether the capability is granted, admin override included.
    #[must_use]
    pub fn has_capability(&self, capability: Capability) -> bool {
        self.capabilities.grants(capability)
    }

    /// Returns all active roles on the identity.
    #[must_use]
    pub fn roles(&self) -> &[ResolvedRole] {
        &self.roles
    }

    /// Returns the most recently assigned active role, for display only.
    #[must_use]
    pub fn current_role(&self) -> Option<&ResolvedRole> {
        self.current_role.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use docwell_core::{RoleId, UserId};

    use super::{AccessLevel, ResolvedIdentity, RoleAssignment};
    use crate::capability::Capability;

    fn assignment(
        name: &str,
        level: u8,
        capabilities: Vec<Capability>,
        is_active: bool,
        day: u32,
    ) -> RoleAssignment {
        RoleAssignment {
            role_id: RoleId::new(),
            role_name: name.to_owned(),
            level: AccessLevel::new(level).unwrap_or(AccessLevel::NONE),
            capabilities,
            is_active,
            assigned_at: Utc
                .with_ymd_and_hms(2024, 3, day, 12, 0, 0)
                .single()
                .unwrap_or_default(),
        }
    }

    #[test]
    fn level_above_hundred_is_rejected() {
        assert!(AccessLevel::new(101).is_err());
        assert!(AccessLevel::new(100).is_ok());
    }

    #[test]
    fn resolution_takes_max_level_not_most_recent() {
        // The higher-level role was assigned first; max must still win.
        let assignments = vec![
            assignment("manager", 70, Vec::new(), true, 1),
            assignment("viewer", 0, Vec::new(), true, 20),
        ];

        let identity = ResolvedIdentity::resolve(UserId::new(), &assignments);
        assert_eq!(identity.level(), AccessLevel::MANAGER);
        assert_eq!(
            identity.current_role().map(|role| role.name.as_str()),
            Some("viewer")
        );
    }

    #[test]
    fn resolution_unions_capabilities_across_roles() {
        let assignments = vec![
            assignment("editor", 50, vec![Capability::DocumentUpdate], true, 1),
            assignment("approver", 10, vec![Capability::DocumentApprove], true, 2),
        ];

        let identity = ResolvedIdentity::resolve(UserId::new(), &assignments);
        assert!(identity.has_capability(Capability::DocumentUpdate));
        assert!(identity.has_capability(Capability::DocumentApprove));
    }

    #[test]
    fn inactive_assignments_are_ignored() {
        let assignments = vec![
            assignment("admin", 100, vec![Capability::AdminAccess], false, 1),
            assignment("viewer", 0, Vec::new(), true, 2),
        ];

        let identity = ResolvedIdentity::resolve(UserId::new(), &assignments);
        assert_eq!(identity.level(), AccessLevel::NONE);
        assert!(!identity.has_capability(Capability::AdminAccess));
    }

    #[test]
    fn zero_assignments_resolve_to_minimal_privilege() {
        let identity = ResolvedIdentity::resolve(UserId::new(), &[]);
        assert_eq!(identity.level(), AccessLevel::NONE);
        assert!(identity.capabilities().is_empty());
        assert!(identity.current_role().is_none());
    }

    #[test]
    fn admin_override_flows_through_identity() {
        let assignments = vec![assignment(
            "admin",
            100,
            vec![Capability::AdminAccess],
            true,
            1,
        )];

        let identity = ResolvedIdentity::resolve(UserId::new(), &assignments);
        assert!(identity.has_capability(Capability::DocumentPublish));
    }
}
