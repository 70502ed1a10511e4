#![allow(dead_code)]

use approval_daemon::{
    AdminGrant, AdminTokenEntry, Authorizer, Credentials, IdentityLister, KeyedStore, Reconciler,
    ReconcilerOptions, SourceEntity, StorePath, TokenAuthorizer,
};
use std::sync::Arc;
use tempfile::TempDir;

pub const ADMIN_TOKEN: &str = "test-admin-token";

/// Create a temporary directory for testing
pub fn create_test_dir() -> TempDir {
    tempfile::tempdir().expect("Failed to create temp dir")
}

/// Obtain a grant the same way call sites do
pub async fn admin_grant() -> AdminGrant {
    TokenAuthorizer::new(vec![AdminTokenEntry::from_token("test-admin", ADMIN_TOKEN)])
        .authorize(&Credentials::bearer(ADMIN_TOKEN))
        .await
        .expect("Should authorize test admin")
}

pub fn reconciler(
    store: impl KeyedStore + 'static,
    identities: impl IdentityLister + 'static,
) -> Reconciler {
    Reconciler::new(Arc::new(store), Arc::new(identities), ReconcilerOptions::default())
        .expect("Should create reconciler")
}

pub fn path(s: &str) -> StorePath {
    StorePath::parse(s).expect("Valid test path")
}

pub fn accounts(n: usize) -> Vec<SourceEntity> {
    (1..=n)
        .map(|i| SourceEntity::new(format!("u{}", i), format!("u{}@x.com", i), 1000 * i as i64))
        .collect()
}
