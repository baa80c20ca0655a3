//! # Publishing Authority
//!
//! Permission gating for staging operations. The engine asks a
//! `PublishAuthority` before every gated action and never decides access
//! itself.
//!
//! ## Rules
//! - Service role bypasses every policy
//! - Anonymous actors are rejected by `ActionPolicy`
//! - Grants are per action, per type name or `*`

mod errors;

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub use errors::{AuthorityError, AuthorityResult};

/// Who is performing an operation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    /// The user's ID (None if anonymous)
    pub user_id: Option<Uuid>,

    /// Whether this is the service role (bypasses policies)
    pub is_service_role: bool,
}

impl Actor {
    pub fn user(user_id: Uuid) -> Self {
        Self {
            user_id: Some(user_id),
            is_service_role: false,
        }
    }

    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn service_role() -> Self {
        Self {
            user_id: None,
            is_service_role: true,
        }
    }

    pub fn is_anonymous(&self) -> bool {
        self.user_id.is_none() && !self.is_service_role
    }
}

/// Gated staging actions
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PublishAction {
    Edit,
    Publish,
    Unpublish,
    Archive,
    Revert,
    Rollback,
    ManageChangeSet,
}

impl PublishAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            PublishAction::Edit => "edit",
            PublishAction::Publish => "publish",
            PublishAction::Unpublish => "unpublish",
            PublishAction::Archive => "archive",
            PublishAction::Revert => "revert",
            PublishAction::Rollback => "rollback",
            PublishAction::ManageChangeSet => "manage_changeset",
        }
    }
}

impl fmt::Display for PublishAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Authorization collaborator
pub trait PublishAuthority: Send + Sync {
    /// Ok if `actor` may perform `action` on records of `type_name`.
    fn check(&self, actor: &Actor, action: PublishAction, type_name: &str) -> AuthorityResult<()>;
}

/// Permits everything
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

impl PublishAuthority for AllowAll {
    fn check(&self, _actor: &Actor, _action: PublishAction, _type_name: &str) -> AuthorityResult<()> {
        Ok(())
    }
}

/// Wildcard type for grants
pub const ANY_TYPE: &str = "*";

/// Per-user grants of actions on types
#[derive(Debug, Clone, Default)]
pub struct ActionPolicy {
    grants: BTreeMap<Uuid, BTreeSet<(PublishAction, String)>>,
}

impl ActionPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Grants `action` on `type_name` (or `*`) to `user_id`.
    pub fn grant(mut self, user_id: Uuid, action: PublishAction, type_name: &str) -> Self {
        self.grants
            .entry(user_id)
            .or_default()
            .insert((action, type_name.to_string()));
        self
    }

    /// Grants every action on every type.
    pub fn grant_all(self, user_id: Uuid) -> Self {
        [
            PublishAction::Edit,
            PublishAction::Publish,
            PublishAction::Unpublish,
            PublishAction::Archive,
            PublishAction::Revert,
            PublishAction::Rollback,
            PublishAction::ManageChangeSet,
        ]
        .into_iter()
        .fold(self, |policy, action| policy.grant(user_id, action, ANY_TYPE))
    }

    fn allows(&self, user_id: &Uuid, action: PublishAction, type_name: &str) -> bool {
        self.grants.get(user_id).map_or(false, |grants| {
            grants.contains(&(action, type_name.to_string()))
                || grants.contains(&(action, ANY_TYPE.to_string()))
        })
    }
}

impl PublishAuthority for ActionPolicy {
    fn check(&self, actor: &Actor, action: PublishAction, type_name: &str) -> AuthorityResult<()> {
        if actor.is_service_role {
            return Ok(());
        }
        let user_id = actor.user_id.ok_or(AuthorityError::AuthenticationRequired)?;
        if self.allows(&user_id, action, type_name) {
            Ok(())
        } else {
            Err(AuthorityError::PermissionDenied {
                action,
                type_name: type_name.to_string(),
            })
        }
    }
}
