// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Verified claims and the request-scoped principal derived from them.
//!
//! Keycloak nests roles under loosely typed structures:
//!
//! ```json
//! {
//!   "realm_access": { "roles": ["user"] },
//!   "resource_access": { "auth-service": { "roles": ["admin"] } }
//! }
//! ```
//!
//! [`flatten_roles`] is the only place that knows this shape.

use std::collections::BTreeSet;

use serde::Serialize;
use serde_json::{Map, Value};
use utoipa::ToSchema;

use super::error::VerificationError;

/// Which client-scoped role namespaces contribute to the role set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum RoleScope {
    /// Roles from every entry under `resource_access`
    #[default]
    AllClients,
    /// Roles only from the listed client ids
    Clients(BTreeSet<String>),
}

impl RoleScope {
    fn includes(&self, client_id: &str) -> bool {
        match self {
            RoleScope::AllClients => true,
            RoleScope::Clients(clients) => clients.contains(client_id),
        }
    }
}

/// Claims of a token whose signature and validity window have been checked.
///
/// Only [`crate::auth::TokenVerifier`] constructs this type from token input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct Claims {
    /// `sub`
    pub user_id: String,
    /// `preferred_username`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// `iat`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub issued_at: Option<i64>,
    /// `exp`
    pub expires_at: i64,
    /// `nbf`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub not_before: Option<i64>,
    pub issuer: String,
    pub audience: Vec<String>,
    /// `azp`, the client the token was issued to
    #[serde(skip_serializing_if = "Option::is_none")]
    pub authorized_party: Option<String>,
    /// `sid`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    /// Realm and client roles, flattened
    #[schema(value_type = Vec<String>)]
    pub roles: BTreeSet<String>,
}

impl Claims {
    /// Build claims from a decoded payload.
    ///
    /// Fails only when a mandatory claim has the wrong type; presence has
    /// already been enforced by validation.
    pub fn from_document(
        doc: &Map<String, Value>,
        scope: &RoleScope,
    ) -> Result<Self, VerificationError> {
        let user_id = string_claim(doc, "sub").ok_or(VerificationError::Malformed)?;
        let expires_at = int_claim(doc, "exp").ok_or(VerificationError::Malformed)?;
        let issuer = string_claim(doc, "iss").ok_or(VerificationError::IssuerMismatch)?;

        Ok(Self {
            user_id,
            username: string_claim(doc, "preferred_username"),
            email: string_claim(doc, "email"),
            issued_at: int_claim(doc, "iat"),
            expires_at,
            not_before: int_claim(doc, "nbf"),
            issuer,
            audience: audience_claim(doc),
            authorized_party: string_claim(doc, "azp"),
            session_id: string_claim(doc, "sid"),
            roles: flatten_roles(doc, scope),
        })
    }
}

fn string_claim(doc: &Map<String, Value>, name: &str) -> Option<String> {
    doc.get(name).and_then(Value::as_str).map(str::to_string)
}

fn int_claim(doc: &Map<String, Value>, name: &str) -> Option<i64> {
    let value = doc.get(name)?;
    value
        .as_i64()
        .or_else(|| value.as_f64().map(|f| f as i64))
}

fn audience_claim(doc: &Map<String, Value>) -> Vec<String> {
    match doc.get("aud") {
        Some(Value::String(aud)) => vec![aud.clone()],
        Some(Value::Array(items)) => string_items(items).collect(),
        _ => Vec::new(),
    }
}

fn string_items(items: &[Value]) -> impl Iterator<Item = String> + '_ {
    items.iter().filter_map(Value::as_str).map(str::to_string)
}

fn roles_array(container: Option<&Value>) -> impl Iterator<Item = String> + '_ {
    container
        .and_then(|c| c.get("roles"))
        .and_then(Value::as_array)
        .map(|items| items.as_slice())
        .unwrap_or_default()
        .iter()
        .filter_map(Value::as_str)
        .map(str::to_string)
}

/// Flatten every role namespace in a Keycloak claim document into one set.
///
/// Sources: `realm_access.roles`, `resource_access.<client>.roles` for clients
/// in `scope`, and a top-level `roles` array. Anything not shaped like a list
/// of strings is ignored.
pub fn flatten_roles(doc: &Map<String, Value>, scope: &RoleScope) -> BTreeSet<String> {
    let mut roles: BTreeSet<String> = roles_array(doc.get("realm_access")).collect();

    if let Some(Value::Object(clients)) = doc.get("resource_access") {
        for (client_id, access) in clients {
            if scope.includes(client_id) {
                roles.extend(roles_array(Some(access)));
            }
        }
    }

    if let Some(Value::Array(items)) = doc.get("roles") {
        roles.extend(string_items(items));
    }

    roles
}

/// Normalized identity attached to an authorized request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct Principal {
    pub user_id: String,
    /// Falls back to the user id when `preferred_username` is absent
    pub username: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[schema(value_type = Vec<String>)]
    pub roles: BTreeSet<String>,
}

impl Principal {
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.contains(role)
    }
}

impl From<Claims> for Principal {
    fn from(claims: Claims) -> Self {
        Self {
            username: claims.username.unwrap_or_else(|| claims.user_id.clone()),
            user_id: claims.user_id,
            email: claims.email,
            roles: claims.roles,
        }
    }
}
