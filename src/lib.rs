pub mod approval;
pub mod auth;
pub mod config;
pub mod identity;
pub mod reconciliation;
pub mod server;
pub mod store;
pub mod utils;

// Re-export commonly used types
pub use approval::{ApprovalStatus, SourceEntity, TargetRecord};
pub use auth::{AdminGrant, AdminTokenEntry, AuthError, Authorizer, Credentials, TokenAuthorizer};
pub use config::{read_config, write_config, ConfigError, DaemonConfig};
pub use identity::{
    AuthExportLister, IdentityError, IdentityLister, IdentityPage, MemoryIdentityLister,
};
pub use reconciliation::{
    BackfillPlan, ReconcileError, Reconciler, ReconcilerOptions, ReconciliationResult,
};
pub use server::{ApprovalDaemonService, AttributionDefaults};
pub use store::{
    JsonFileStore, KeyedStore, MemoryStore, StoreError, StorePath, WriteBatch, WriteMode,
};
pub use utils::{CancelHandle, CancelSignal};
