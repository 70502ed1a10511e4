//! Admin authorization for approval operations.
//!
//! Every Reconciler operation takes an [`AdminGrant`]. Grants can only be
//! produced by an [`Authorizer`], so no call path reaches the store without
//! passing a check first.

mod token;

pub use token::{AdminTokenEntry, TokenAuthorizer};

use async_trait::async_trait;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("Admin credentials are required")]
    MissingCredentials,

    #[error("Admin privileges are required")]
    NotAdmin,
}

/// Proof that the caller passed an admin check
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdminGrant {
    principal: String,
}

impl AdminGrant {
    pub(crate) fn new(principal: impl Into<String>) -> Self {
        Self {
            principal: principal.into(),
        }
    }

    /// Name of the admin the grant was issued to
    pub fn principal(&self) -> &str {
        &self.principal
    }
}

/// Credentials presented by a caller
#[derive(Debug, Clone, Default)]
pub struct Credentials {
    pub bearer_token: Option<String>,
}

impl Credentials {
    pub fn bearer(token: impl Into<String>) -> Self {
        Self {
            bearer_token: Some(token.into()),
        }
    }

    /// Parse an `authorization` header value of the form `Bearer <token>`
    pub fn from_authorization_header(value: &str) -> Self {
        let token = value
            .trim()
            .strip_prefix("Bearer ")
            .or_else(|| value.trim().strip_prefix("bearer "))
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string);

        Self {
            bearer_token: token,
        }
    }
}

#[async_trait]
pub trait Authorizer: Send + Sync {
    async fn authorize(&self, credentials: &Credentials) -> Result<AdminGrant, AuthError>;
}
