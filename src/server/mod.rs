use crate::auth::{AdminGrant, AuthError, Authorizer, Credentials};
use crate::config::DaemonConfig;
use crate::reconciliation::{
    BackfillPlan as InternalBackfillPlan, ReconcileError, Reconciler,
    ReconciliationResult as InternalResult,
};
use crate::utils::CancelSignal;
use std::sync::Arc;
use tonic::{Request, Response, Status};
use tracing::warn;

// Import generated protobuf types
pub mod proto {
    tonic::include_proto!("approval");
}

// Include the file descriptor set for gRPC reflection
pub const FILE_DESCRIPTOR_SET: &[u8] = tonic::include_file_descriptor_set!("approval_descriptor");

use proto::approval_daemon_server::ApprovalDaemon;
use proto::*;

/// Attributions used when a request leaves `attributed_by` empty
#[derive(Debug, Clone)]
pub struct AttributionDefaults {
    pub bulk_approve: String,
    pub backfill: String,
}

impl From<&DaemonConfig> for AttributionDefaults {
    fn from(config: &DaemonConfig) -> Self {
        Self {
            bulk_approve: config.bulk_approve_attribution.clone(),
            backfill: config.backfill_attribution.clone(),
        }
    }
}

pub struct ApprovalDaemonService {
    reconciler: Arc<Reconciler>,
    authorizer: Arc<dyn Authorizer>,
    defaults: AttributionDefaults,
    cancel: CancelSignal,
}

impl ApprovalDaemonService {
    pub fn new(
        reconciler: Arc<Reconciler>,
        authorizer: Arc<dyn Authorizer>,
        defaults: AttributionDefaults,
        cancel: CancelSignal,
    ) -> Self {
        Self {
            reconciler,
            authorizer,
            defaults,
            cancel,
        }
    }

    /// Check the request's bearer token
    async fn authorize(&self, credentials: Credentials) -> Result<AdminGrant, Status> {
        self.authorizer
            .authorize(&credentials)
            .await
            .map_err(auth_status)
    }
}

#[tonic::async_trait]
impl ApprovalDaemon for ApprovalDaemonService {
    async fn bulk_approve(
        &self,
        request: Request<BulkApproveRequest>,
    ) -> Result<Response<ReconciliationResult>, Status> {
        let grant = self.authorize(request_credentials(&request)).await?;
        let req = request.into_inner();
        let attributed_by = non_empty_or(req.attributed_by, &self.defaults.bulk_approve);

        match self.reconciler.bulk_approve(&grant, &attributed_by).await {
            Ok(result) => Ok(Response::new(result_to_proto(result))),
            Err(e) => Err(reconcile_status(e)),
        }
    }

    async fn approve_user(
        &self,
        request: Request<ApproveUserRequest>,
    ) -> Result<Response<ApproveUserResponse>, Status> {
        let grant = self.authorize(request_credentials(&request)).await?;
        let req = request.into_inner();
        let attributed_by = non_empty_or(req.attributed_by, grant.principal());

        match self.reconciler.approve_one(&grant, &req.uid, &attributed_by).await {
            Ok(()) => Ok(Response::new(ApproveUserResponse {
                uid: req.uid,
                approved_by: attributed_by,
            })),
            Err(e) => Err(reconcile_status(e)),
        }
    }

    async fn backfill_from_source(
        &self,
        request: Request<BackfillRequest>,
    ) -> Result<Response<ReconciliationResult>, Status> {
        let grant = self.authorize(request_credentials(&request)).await?;
        let req = request.into_inner();
        let attributed_by = non_empty_or(req.attributed_by, &self.defaults.backfill);

        match self
            .reconciler
            .backfill_from_source(&grant, &attributed_by, &self.cancel)
            .await
        {
            Ok(result) => Ok(Response::new(result_to_proto(result))),
            Err(e) => Err(reconcile_status(e)),
        }
    }

    async fn get_backfill_plan(
        &self,
        request: Request<GetBackfillPlanRequest>,
    ) -> Result<Response<BackfillPlan>, Status> {
        let grant = self.authorize(request_credentials(&request)).await?;

        match self.reconciler.plan_backfill(&grant, &self.cancel).await {
            Ok(plan) => Ok(Response::new(plan_to_proto(plan))),
            Err(e) => Err(reconcile_status(e)),
        }
    }
}

fn request_credentials<T>(request: &Request<T>) -> Credentials {
    request
        .metadata()
        .get("authorization")
        .and_then(|value| value.to_str().ok())
        .map(Credentials::from_authorization_header)
        .unwrap_or_default()
}

fn non_empty_or(value: String, fallback: &str) -> String {
    if value.trim().is_empty() {
        fallback.to_string()
    } else {
        value
    }
}

fn auth_status(err: AuthError) -> Status {
    warn!(error = %err, "Rejected unauthorized request");
    Status::permission_denied(err.to_string())
}

fn reconcile_status(err: ReconcileError) -> Status {
    match &err {
        ReconcileError::InvalidArgument(_) => Status::invalid_argument(err.to_string()),
        ReconcileError::PermissionDenied(_) => Status::permission_denied(err.to_string()),
        ReconcileError::BackendUnavailable(_) => Status::unavailable(err.to_string()),
        ReconcileError::Cancelled => Status::cancelled(err.to_string()),
        ReconcileError::EncodeError(_) => Status::internal(err.to_string()),
    }
}

// Helper functions for converting internal types to proto types

fn result_to_proto(result: InternalResult) -> ReconciliationResult {
    ReconciliationResult {
        processed_count: result.processed_count as i64,
        updated_count: result.updated_count as i64,
        skipped_count: result.skipped_count as i64,
    }
}

fn plan_to_proto(plan: InternalBackfillPlan) -> BackfillPlan {
    BackfillPlan {
        to_create: plan
            .to_create
            .into_iter()
            .map(|entity| PlannedRecord {
                uid: entity.id,
                email: entity.email.unwrap_or_default(),
                created_at: entity.created_at_ms.unwrap_or_default(),
            })
            .collect(),
        existing: plan.existing,
        invalid: plan.invalid,
        duplicates: plan.duplicates,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::approval::SourceEntity;
    use crate::auth::{AdminTokenEntry, TokenAuthorizer};
    use crate::identity::MemoryIdentityLister;
    use crate::reconciliation::ReconcilerOptions;
    use crate::store::{MemoryStore, StorePath};
    use serde_json::json;
    use tonic::Code;

    const TOKEN: &str = "admin-secret";

    fn service(store: &MemoryStore, entities: Vec<SourceEntity>) -> ApprovalDaemonService {
        let reconciler = Reconciler::new(
            Arc::new(store.clone()),
            Arc::new(MemoryIdentityLister::new(entities)),
            ReconcilerOptions::default(),
        )
        .unwrap();
        let authorizer = TokenAuthorizer::new(vec![AdminTokenEntry::from_token("alice", TOKEN)]);

        ApprovalDaemonService::new(
            Arc::new(reconciler),
            Arc::new(authorizer),
            AttributionDefaults::from(&DaemonConfig::default()),
            CancelSignal::never(),
        )
    }

    fn authed<T>(message: T, token: &str) -> Request<T> {
        let mut request = Request::new(message);
        request
            .metadata_mut()
            .insert("authorization", format!("Bearer {}", token).parse().unwrap());
        request
    }

    #[tokio::test]
    async fn test_missing_token_is_permission_denied() {
        let store = MemoryStore::new();
        let status = service(&store, vec![])
            .bulk_approve(Request::new(BulkApproveRequest::default()))
            .await
            .unwrap_err();
        assert_eq!(status.code(), Code::PermissionDenied);
    }

    #[tokio::test]
    async fn test_wrong_token_is_permission_denied() {
        let store = MemoryStore::with_data(json!({"users": {"u1": {"status": "pending"}}}));
        let status = service(&store, vec![])
            .bulk_approve(authed(BulkApproveRequest::default(), "nope"))
            .await
            .unwrap_err();
        assert_eq!(status.code(), Code::PermissionDenied);
        assert_eq!(store.batch_write_count(), 0);
    }

    #[tokio::test]
    async fn test_bulk_approve_uses_default_attribution() {
        let store = MemoryStore::with_data(json!({"users": {"u1": {"status": "pending"}}}));
        let response = service(&store, vec![])
            .bulk_approve(authed(BulkApproveRequest::default(), TOKEN))
            .await
            .unwrap()
            .into_inner();

        assert_eq!(response.processed_count, 1);
        assert_eq!(response.updated_count, 1);
        let approved_by = store
            .get(&StorePath::parse("users/u1/approvedBy").unwrap())
            .await;
        assert_eq!(approved_by, Some(json!("auto-approve")));
    }

    #[tokio::test]
    async fn test_approve_user_attributes_to_principal() {
        let store = MemoryStore::new();
        let response = service(&store, vec![])
            .approve_user(authed(
                ApproveUserRequest {
                    uid: "u1".to_string(),
                    attributed_by: String::new(),
                },
                TOKEN,
            ))
            .await
            .unwrap()
            .into_inner();

        assert_eq!(response.approved_by, "alice");
    }

    #[tokio::test]
    async fn test_approve_user_empty_uid_is_invalid_argument() {
        let store = MemoryStore::new();
        let status = service(&store, vec![])
            .approve_user(authed(ApproveUserRequest::default(), TOKEN))
            .await
            .unwrap_err();
        assert_eq!(status.code(), Code::InvalidArgument);
    }

    #[tokio::test]
    async fn test_backfill_outage_is_unavailable() {
        let store = MemoryStore::new();
        store.set_unavailable(true);
        let status = service(&store, vec![SourceEntity::new("u1", "a@x.com", 1000)])
            .backfill_from_source(authed(BackfillRequest::default(), TOKEN))
            .await
            .unwrap_err();
        assert_eq!(status.code(), Code::Unavailable);
    }

    #[tokio::test]
    async fn test_backfill_plan_and_run() {
        let store = MemoryStore::new();
        let service = service(
            &store,
            vec![
                SourceEntity::new("u1", "a@x.com", 1000),
                SourceEntity::new("u2", "b@x.com", 2000),
                SourceEntity::new("u1", "a@x.com", 1000),
            ],
        );

        let plan = service
            .get_backfill_plan(authed(GetBackfillPlanRequest {}, TOKEN))
            .await
            .unwrap()
            .into_inner();
        assert_eq!(plan.to_create.len(), 2);
        assert_eq!(plan.duplicates, vec!["u1".to_string()]);
        assert_eq!(plan.to_create[1].created_at, 2000);
        assert_eq!(store.batch_write_count(), 0);

        let result = service
            .backfill_from_source(authed(BackfillRequest::default(), TOKEN))
            .await
            .unwrap()
            .into_inner();
        assert_eq!(result.updated_count, 2);
        let approved_by = store
            .get(&StorePath::parse("users/u2/approvedBy").unwrap())
            .await;
        assert_eq!(approved_by, Some(json!("migration")));
    }
}
