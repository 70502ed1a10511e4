use super::{require_attribution, ReconcileError, ReconciliationResult, Reconciler};
use crate::approval::{approval_fields, TargetRecord};
use crate::auth::AdminGrant;
use crate::store::WriteBatch;
use crate::utils::{now_millis, CancelSignal};
use tracing::{info, warn};
use uuid::Uuid;

impl Reconciler {
    /// Approve every record already in the store with one batched write.
    pub async fn bulk_approve(
        &self,
        grant: &AdminGrant,
        attributed_by: &str,
    ) -> Result<ReconciliationResult, ReconcileError> {
        require_attribution(attributed_by)?;
        let run_id = Uuid::new_v4();

        let records = self.store.get_all(&self.collection).await?;
        if records.is_empty() {
            info!(%run_id, principal = %grant.principal(), "No records to approve");
            return Ok(ReconciliationResult::default());
        }

        let now = now_millis();
        let mut batch = WriteBatch::new();
        let mut skipped = 0;

        for id in records.keys() {
            let path = match self.record_path(id) {
                Ok(path) => path,
                Err(_) => {
                    warn!(%run_id, uid = %id, "Skipping record with an unusable key");
                    skipped += 1;
                    continue;
                }
            };
            for (field, value) in approval_fields(attributed_by, now) {
                batch.set(path.child(field)?, value);
            }
        }

        let updated = records.len() - skipped;
        if !batch.is_empty() {
            self.store.batch_write(batch).await?;
        }

        info!(
            %run_id,
            principal = %grant.principal(),
            approved_by = %attributed_by,
            count = updated,
            "Bulk approval completed"
        );

        Ok(ReconciliationResult {
            processed_count: records.len(),
            updated_count: updated,
            skipped_count: skipped,
        })
    }

    /// Approve a single record. Only the approval fields are written;
    /// the rest of the record is untouched.
    pub async fn approve_one(
        &self,
        grant: &AdminGrant,
        id: &str,
        attributed_by: &str,
    ) -> Result<(), ReconcileError> {
        let path = self.record_path(id)?;
        require_attribution(attributed_by)?;

        let mut batch = WriteBatch::new();
        for (field, value) in approval_fields(attributed_by, now_millis()) {
            batch.set(path.child(field)?, value);
        }
        self.store.batch_write(batch).await?;

        info!(
            principal = %grant.principal(),
            uid = %id,
            approved_by = %attributed_by,
            "User approved"
        );
        Ok(())
    }

    /// Create approved records for every listed account that has none.
    ///
    /// Existing records are never rewritten, including ones created after
    /// the existence check: records are written create-only and entries that
    /// find a record already in place count as skipped. Cancellation is
    /// honoured up to the write; once the batch is sent it runs to completion.
    pub async fn backfill_from_source(
        &self,
        grant: &AdminGrant,
        attributed_by: &str,
        cancel: &CancelSignal,
    ) -> Result<ReconciliationResult, ReconcileError> {
        require_attribution(attributed_by)?;
        let run_id = Uuid::new_v4();
        info!(%run_id, principal = %grant.principal(), "Starting backfill");

        let plan = self.plan_backfill(grant, cancel).await?;

        let now = now_millis();
        let mut batch = WriteBatch::new();
        for entity in &plan.to_create {
            let record = TargetRecord::backfilled(entity, attributed_by, &self.backfill_note, now);
            batch.create(self.record_path(&entity.id)?, record.to_value()?);
        }

        if cancel.is_cancelled() {
            warn!(%run_id, pending = batch.len(), "Backfill cancelled before writing");
            return Err(ReconcileError::Cancelled);
        }

        let planned = batch.len();
        let created = if plan.has_work() {
            self.store.batch_write(batch).await?
        } else {
            0
        };
        if created < planned {
            warn!(
                %run_id,
                raced = planned - created,
                "Records appeared after the existence check and were left untouched"
            );
        }

        let result = ReconciliationResult {
            processed_count: plan.processed,
            updated_count: created,
            skipped_count: plan.skipped() + (planned - created),
        };

        info!(
            %run_id,
            processed = result.processed_count,
            created = result.updated_count,
            skipped = result.skipped_count,
            "Backfill completed"
        );
        Ok(result)
    }
}
