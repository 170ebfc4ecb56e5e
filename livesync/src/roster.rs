//! Session roster contract
//!
//! The roster is owned by the host's collaboration substrate. The
//! coordinator only reads snapshots from it: the local client's identity
//! and roles, and the roles of whoever sent a transport command.

use std::collections::HashMap;

use livesync_state::{ClientId, ClientRoleInfo, RoleId};
use parking_lot::RwLock;

use crate::subscription::{HandlerRegistry, Subscription};

/// Membership change reported by a [`Roster`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RosterChange {
    Joined(ClientRoleInfo),
    Left(ClientId),
    RolesChanged(ClientRoleInfo),
}

impl RosterChange {
    pub fn client_id(&self) -> &ClientId {
        match self {
            RosterChange::Joined(info) | RosterChange::RolesChanged(info) => &info.client_id,
            RosterChange::Left(client_id) => client_id,
        }
    }
}

pub type RosterHandler = Box<dyn Fn(&RosterChange) + Send + Sync>;

/// Read-only view of the session's members
pub trait Roster: Send + Sync {
    fn local_client_id(&self) -> ClientId;

    fn local_roles(&self) -> Vec<RoleId>;

    /// Snapshot of a member, `None` if the client is unknown
    fn client_info(&self, client_id: &ClientId) -> Option<ClientRoleInfo>;

    fn on_roster_changed(&self, handler: RosterHandler) -> Subscription;
}

/// In-process roster
///
/// Hosts without a real roster (and tests) mutate it directly; every
/// mutation notifies registered handlers.
pub struct StaticRoster {
    local: ClientId,
    members: RwLock<HashMap<ClientId, ClientRoleInfo>>,
    handlers: HandlerRegistry<RosterChange>,
}

impl StaticRoster {
    /// Create a roster whose local member holds `roles`
    pub fn new(local: impl Into<ClientId>, roles: Vec<RoleId>) -> Self {
        let local = local.into();
        let mut members = HashMap::new();
        members.insert(local.clone(), ClientRoleInfo::new(local.clone(), roles));
        Self {
            local,
            members: RwLock::new(members),
            handlers: HandlerRegistry::new(),
        }
    }

    /// Add or replace a member
    pub fn upsert(&self, info: ClientRoleInfo) {
        let previous = self.members.write().insert(info.client_id.clone(), info.clone());
        let change = match previous {
            Some(_) => RosterChange::RolesChanged(info),
            None => RosterChange::Joined(info),
        };
        self.handlers.notify(&change);
    }

    pub fn remove(&self, client_id: &ClientId) {
        if self.members.write().remove(client_id).is_some() {
            self.handlers.notify(&RosterChange::Left(client_id.clone()));
        }
    }

    /// Replace the roles of an existing member
    ///
    /// Unknown members are added.
    pub fn set_roles(&self, client_id: &ClientId, roles: Vec<RoleId>) {
        let info = {
            let members = self.members.read();
            match members.get(client_id) {
                Some(existing) => ClientRoleInfo {
                    roles,
                    ..existing.clone()
                },
                None => ClientRoleInfo::new(client_id.clone(), roles),
            }
        };
        self.upsert(info);
    }

    pub fn members(&self) -> Vec<ClientRoleInfo> {
        self.members.read().values().cloned().collect()
    }
}

impl Roster for StaticRoster {
    fn local_client_id(&self) -> ClientId {
        self.local.clone()
    }

    fn local_roles(&self) -> Vec<RoleId> {
        self.members
            .read()
            .get(&self.local)
            .map(|info| info.roles.clone())
            .unwrap_or_default()
    }

    fn client_info(&self, client_id: &ClientId) -> Option<ClientRoleInfo> {
        self.members.read().get(client_id).cloned()
    }

    fn on_roster_changed(&self, handler: RosterHandler) -> Subscription {
        self.handlers.register(handler)
    }
}

impl std::fmt::Debug for StaticRoster {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StaticRoster")
            .field("local", &self.local)
            .field("members", &self.members.read().len())
            .finish()
    }
}
