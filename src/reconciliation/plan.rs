use super::{ReconcileError, Reconciler};
use crate::approval::SourceEntity;
use crate::auth::AdminGrant;
use crate::utils::{is_valid_key, CancelSignal};
use serde::Serialize;
use std::collections::HashSet;
use tracing::{info, warn};

/// Diff between the identity provider and the record store
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BackfillPlan {
    /// Number of accounts the provider listed
    pub processed: usize,

    /// Accounts with no record, in listing order
    pub to_create: Vec<SourceEntity>,

    /// Accounts that already have a record
    pub existing: Vec<String>,

    /// Ids that cannot be used as store keys
    pub invalid: Vec<String>,

    /// Ids listed more than once (every occurrence after the first)
    pub duplicates: Vec<String>,
}

impl BackfillPlan {
    pub fn skipped(&self) -> usize {
        self.processed - self.to_create.len()
    }

    pub fn has_work(&self) -> bool {
        !self.to_create.is_empty()
    }
}

impl Reconciler {
    /// Build the backfill diff without writing anything.
    ///
    /// The existence snapshot is not locked against later writes: a record
    /// created after it is reported as missing here, and the create-only
    /// write in `backfill_from_source` leaves it alone.
    pub async fn plan_backfill(
        &self,
        grant: &AdminGrant,
        cancel: &CancelSignal,
    ) -> Result<BackfillPlan, ReconcileError> {
        let entities = self.identities.list_all(cancel).await?;
        info!(
            principal = %grant.principal(),
            count = entities.len(),
            "Listed identity provider accounts"
        );

        let mut plan = BackfillPlan {
            processed: entities.len(),
            ..Default::default()
        };
        let mut seen = HashSet::new();
        let mut candidates = Vec::new();

        for entity in entities {
            if !is_valid_key(&entity.id) {
                warn!(uid = %entity.id, "Skipping account with an id that is not a valid store key");
                plan.invalid.push(entity.id);
                continue;
            }
            if !seen.insert(entity.id.clone()) {
                warn!(uid = %entity.id, "Skipping duplicate account in listing");
                plan.duplicates.push(entity.id);
                continue;
            }

            candidates.push(entity);
        }

        let paths = candidates
            .iter()
            .map(|entity| self.record_path(&entity.id))
            .collect::<Result<Vec<_>, _>>()?;
        let found = self.store.exists_all(&paths).await?;

        for (entity, exists) in candidates.into_iter().zip(found) {
            if exists {
                plan.existing.push(entity.id);
            } else {
                plan.to_create.push(entity);
            }
        }

        Ok(plan)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::MemoryIdentityLister;
    use crate::reconciliation::ReconcilerOptions;
    use crate::store::MemoryStore;
    use serde_json::json;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_plan_sorts_accounts() {
        let store = MemoryStore::with_data(json!({"users": {"u2": {"status": "pending"}}}));
        let lister = MemoryIdentityLister::new(vec![
            SourceEntity::new("u1", "a@x.com", 1000),
            SourceEntity::new("u2", "b@x.com", 2000),
            SourceEntity::new("bad.id", "c@x.com", 3000),
            SourceEntity::new("u1", "a@x.com", 1000),
        ]);
        let reconciler = Reconciler::new(
            Arc::new(store.clone()),
            Arc::new(lister),
            ReconcilerOptions::default(),
        )
        .unwrap();

        let plan = reconciler
            .plan_backfill(&AdminGrant::new("test"), &CancelSignal::never())
            .await
            .unwrap();

        assert_eq!(plan.processed, 4);
        assert_eq!(plan.to_create.len(), 1);
        assert_eq!(plan.to_create[0].id, "u1");
        assert_eq!(plan.existing, vec!["u2".to_string()]);
        assert_eq!(plan.invalid, vec!["bad.id".to_string()]);
        assert_eq!(plan.duplicates, vec!["u1".to_string()]);
        assert_eq!(plan.skipped(), 3);
        assert_eq!(store.batch_write_count(), 0);
    }
}
