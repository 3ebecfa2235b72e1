//! Bulk mutation coordinator.
//!
//! Applies one status change to many orders. Each order goes through the same
//! read-plan-conditional-write path as a single update, so every order is
//! atomic on its own: one failure never blocks or rolls back another. Writes
//! for distinct ids run in parallel on a bounded worker set; no lock is held
//! across the batch.

use std::collections::HashSet;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use shopdesk_core::{AggregateRoot, OrderId};
use shopdesk_orders::{CancellationActor, Order, StatusChange};

use crate::error::EngineError;
use crate::lifecycle::{OrderLifecycle, run_detached};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BulkStatusRequest {
    pub order_ids: Vec<OrderId>,
    pub change: StatusChange,
    pub actor: CancellationActor,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BulkFailure {
    pub order_id: OrderId,
    pub error: EngineError,
}

/// Per-id results, each list in first-seen request order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BulkOutcome {
    /// Distinct ids processed.
    pub requested: usize,
    pub succeeded: Vec<Order>,
    pub failed: Vec<BulkFailure>,
}

impl BulkOutcome {
    pub fn succeeded_ids(&self) -> Vec<OrderId> {
        self.succeeded.iter().map(|o| *o.id()).collect()
    }

    /// e.g. "updated 8 of 10"
    pub fn summary(&self) -> String {
        format!("updated {} of {}", self.succeeded.len(), self.requested)
    }
}

pub struct BulkMutationCoordinator {
    lifecycle: Arc<OrderLifecycle>,
    concurrency: usize,
}

impl BulkMutationCoordinator {
    pub fn new(lifecycle: Arc<OrderLifecycle>, concurrency: usize) -> Self {
        Self {
            lifecycle,
            concurrency: concurrency.max(1),
        }
    }

    /// Apply `request.change` to every distinct id.
    ///
    /// Only an empty id set fails the whole call; everything else is reported
    /// per id. The batch runs on a detached task and finishes even if the
    /// caller stops waiting.
    pub async fn apply_bulk(&self, request: BulkStatusRequest) -> Result<BulkOutcome, EngineError> {
        if request.order_ids.is_empty() {
            return Err(EngineError::validation("orderIds must not be empty"));
        }

        let ids = dedupe(request.order_ids);
        let lifecycle = self.lifecycle.clone();
        let concurrency = self.concurrency;
        let status = request.change.status;

        let outcome = run_detached(
            "bulk_status",
            drive(lifecycle, ids, request.change, request.actor, concurrency),
        )
        .await?;

        tracing::info!(
            status = %status,
            actor = %request.actor,
            requested = outcome.requested,
            succeeded = outcome.succeeded.len(),
            failed = outcome.failed.len(),
            "bulk status update"
        );
        Ok(outcome)
    }
}

/// Remove repeated ids, keeping the first occurrence of each.
fn dedupe(ids: Vec<OrderId>) -> Vec<OrderId> {
    let mut seen = HashSet::with_capacity(ids.len());
    ids.into_iter().filter(|id| seen.insert(*id)).collect()
}

async fn drive(
    lifecycle: Arc<OrderLifecycle>,
    ids: Vec<OrderId>,
    change: StatusChange,
    actor: CancellationActor,
    concurrency: usize,
) -> Result<BulkOutcome, EngineError> {
    let permits = Arc::new(Semaphore::new(concurrency));
    let change = Arc::new(change);
    let mut tasks = JoinSet::new();

    for (index, id) in ids.iter().copied().enumerate() {
        let permits = permits.clone();
        let lifecycle = lifecycle.clone();
        let change = change.clone();

        tasks.spawn(async move {
            let result = async {
                let _permit = permits
                    .acquire_owned()
                    .await
                    .map_err(|_| EngineError::InternalConsistency("bulk worker pool closed".to_string()))?;
                lifecycle.transition(id, &change, actor).await
            }
            .await;
            (index, result)
        });
    }

    let mut slots: Vec<Option<Result<Order, EngineError>>> = (0..ids.len()).map(|_| None).collect();
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((index, result)) => slots[index] = Some(result),
            Err(join_err) => tracing::error!(error = %join_err, "bulk worker task failed"),
        }
    }

    let mut outcome = BulkOutcome {
        requested: ids.len(),
        ..BulkOutcome::default()
    };
    for (id, slot) in ids.into_iter().zip(slots) {
        let result = slot
            .unwrap_or_else(|| Err(EngineError::InternalConsistency("bulk worker task failed".to_string())));
        match result {
            Ok(order) => outcome.succeeded.push(order),
            Err(error) => outcome.failed.push(BulkFailure { order_id: id, error }),
        }
    }

    Ok(outcome)
}
