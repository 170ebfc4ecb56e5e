//! Session member identity and roles

use serde::{Deserialize, Serialize};
use std::fmt;

/// Unique identifier for a client connection in the session
///
/// Ordered so that the group state can break timestamp ties
/// deterministically.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClientId(String);

impl ClientId {
    /// Creates a new ClientId
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the ID as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ClientId {
    fn from(s: &str) -> Self {
        ClientId::new(s)
    }
}

impl From<String> for ClientId {
    fn from(s: String) -> Self {
        ClientId::new(s)
    }
}

/// A session role, e.g. "organizer" or "presenter"
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoleId(String);

impl RoleId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for RoleId {
    fn from(s: &str) -> Self {
        RoleId::new(s)
    }
}

/// Roster snapshot for one client, supplied by the host's roster
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientRoleInfo {
    pub client_id: ClientId,
    pub user_id: Option<String>,
    pub roles: Vec<RoleId>,
}

impl ClientRoleInfo {
    pub fn new(client_id: impl Into<ClientId>, roles: Vec<RoleId>) -> Self {
        Self {
            client_id: client_id.into(),
            user_id: None,
            roles,
        }
    }

    pub fn with_user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    /// Whether this client may issue commands gated by `eligible`
    ///
    /// An empty eligible set means "no restriction".
    pub fn is_eligible(&self, eligible: &[RoleId]) -> bool {
        roles_intersect(&self.roles, eligible)
    }
}

/// Role gate shared by local and remote authorization checks
pub fn roles_intersect(roles: &[RoleId], eligible: &[RoleId]) -> bool {
    eligible.is_empty() || roles.iter().any(|role| eligible.contains(role))
}
