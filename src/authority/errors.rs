//! # Authority Errors

use thiserror::Error;

use super::PublishAction;

pub type AuthorityResult<T> = Result<T, AuthorityError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthorityError {
    /// Anonymous actor attempted a gated action
    #[error("Authentication required")]
    AuthenticationRequired,

    /// Actor lacks the grant for this action on this type
    #[error("Permission denied: cannot {action} '{type_name}'")]
    PermissionDenied {
        action: PublishAction,
        type_name: String,
    },
}

impl AuthorityError {
    pub fn code(&self) -> &'static str {
        match self {
            AuthorityError::AuthenticationRequired => "STAGE_AUTHENTICATION_REQUIRED",
            AuthorityError::PermissionDenied { .. } => "STAGE_PERMISSION_DENIED",
        }
    }
}
