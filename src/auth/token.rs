use super::{AdminGrant, AuthError, Authorizer, Credentials};
use crate::utils::compute_hash;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// An admin allowed to run approval operations.
/// Only the SHA-256 hex digest of the token is stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminTokenEntry {
    pub principal: String,
    pub token_sha256: String,
}

impl AdminTokenEntry {
    /// Build an entry from a plaintext token
    pub fn from_token(principal: impl Into<String>, token: &str) -> Self {
        Self {
            principal: principal.into(),
            token_sha256: compute_hash(token),
        }
    }
}

/// Authorizer comparing bearer tokens against configured digests
#[derive(Debug, Clone, Default)]
pub struct TokenAuthorizer {
    admins: Vec<AdminTokenEntry>,
}

impl TokenAuthorizer {
    pub fn new(admins: Vec<AdminTokenEntry>) -> Self {
        Self { admins }
    }

    pub fn admin_count(&self) -> usize {
        self.admins.len()
    }
}

#[async_trait]
impl Authorizer for TokenAuthorizer {
    async fn authorize(&self, credentials: &Credentials) -> Result<AdminGrant, AuthError> {
        let token = credentials
            .bearer_token
            .as_deref()
            .ok_or(AuthError::MissingCredentials)?;

        let digest = compute_hash(token);
        match self
            .admins
            .iter()
            .find(|admin| admin.token_sha256.eq_ignore_ascii_case(&digest))
        {
            Some(admin) => Ok(AdminGrant::new(admin.principal.clone())),
            None => {
                warn!("Rejected admin token");
                Err(AuthError::NotAdmin)
            }
        }
    }
}
