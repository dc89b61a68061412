use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Actor id recorded for writes made by background jobs rather than an operator.
pub const SYSTEM_ACTOR: Uuid = Uuid::nil();

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Customer,
    Admin,
}

/// A verified caller, as resolved by the identity collaborator at the boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
    pub user_id: Uuid,
    pub role: Role,
}

impl Actor {
    pub fn new(user_id: Uuid, role: Role) -> Self {
        Self { user_id, role }
    }

    /// Mint the admin capability, or `None` for customers.
    pub fn admin_capability(&self) -> Option<AdminCapability> {
        match self.role {
            Role::Admin => Some(AdminCapability {
                actor_id: self.user_id,
            }),
            Role::Customer => None,
        }
    }
}

/// Proof that the caller passed the admin check.
///
/// Every mutating workflow operation takes one explicitly. The field is
/// private so the only way to obtain it is `Actor::admin_capability`, which
/// the API boundary calls after verifying the caller's token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdminCapability {
    actor_id: Uuid,
}

impl AdminCapability {
    pub fn actor_id(&self) -> Uuid {
        self.actor_id
    }
}
