// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Role requirements and the predicate that evaluates them.
//!
//! Role names are opaque identifiers: comparison is exact and case-sensitive.

use std::collections::BTreeSet;
use std::fmt;

/// Realm role granted to administrators.
pub const ROLE_ADMIN: &str = "admin";

/// Realm role granted to every registered user.
pub const ROLE_USER: &str = "user";

/// Declarative role policy attached to a protected operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoleRequirement {
    /// Any caller, including an anonymous one when no token is presented
    Unrestricted,
    /// At least one of the listed roles
    AnyOf(BTreeSet<String>),
    /// Every listed role
    AllOf(BTreeSet<String>),
}

impl RoleRequirement {
    pub fn any_of<I, S>(roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        RoleRequirement::AnyOf(roles.into_iter().map(Into::into).collect())
    }

    pub fn all_of<I, S>(roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        RoleRequirement::AllOf(roles.into_iter().map(Into::into).collect())
    }

    /// Whether an anonymous caller can pass.
    pub fn is_unrestricted(&self) -> bool {
        matches!(self, RoleRequirement::Unrestricted)
    }
}

impl fmt::Display for RoleRequirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let join = |roles: &BTreeSet<String>| {
            roles.iter().map(String::as_str).collect::<Vec<_>>().join(",")
        };
        match self {
            RoleRequirement::Unrestricted => write!(f, "unrestricted"),
            RoleRequirement::AnyOf(roles) => write!(f, "any_of({})", join(roles)),
            RoleRequirement::AllOf(roles) => write!(f, "all_of({})", join(roles)),
        }
    }
}

/// Decide whether `roles` satisfies `requirement`.
///
/// `AnyOf` with an empty set is never satisfied; `AllOf` with an empty set
/// always is.
pub fn satisfies(roles: &BTreeSet<String>, requirement: &RoleRequirement) -> bool {
    match requirement {
        RoleRequirement::Unrestricted => true,
        RoleRequirement::AnyOf(required) => !roles.is_disjoint(required),
        RoleRequirement::AllOf(required) => required.is_subset(roles),
    }
}
