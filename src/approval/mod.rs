mod record;
mod status;

pub use record::{approval_fields, SourceEntity, TargetRecord};
pub use status::ApprovalStatus;

/// Stored field names of a [`TargetRecord`]
pub mod fields {
    pub const EMAIL: &str = "email";
    pub const STATUS: &str = "status";
    pub const IS_APPROVED: &str = "isApproved";
    pub const CREATED_AT: &str = "createdAt";
    pub const APPROVED_AT: &str = "approvedAt";
    pub const APPROVED_BY: &str = "approvedBy";
    pub const NOTE: &str = "note";
}

/// Collection that holds approval records unless configured otherwise
pub const DEFAULT_COLLECTION: &str = "users";

/// Note stored on records created by a backfill
pub const DEFAULT_BACKFILL_NOTE: &str = "auto-approved via backfill";
