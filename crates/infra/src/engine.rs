//! Wiring of the lifecycle services over one order store.

use std::sync::Arc;

use crate::audit::CancellationAuditRecorder;
use crate::bulk::BulkMutationCoordinator;
use crate::config::EngineConfig;
use crate::lifecycle::OrderLifecycle;
use crate::payment::PaymentReconciliation;
use crate::query::QueryProjector;
use crate::retry::StoreGuard;
use crate::store::OrderStore;

/// The order lifecycle engine: every service shares one store and one
/// [`EngineConfig`].
pub struct OrderEngine {
    config: EngineConfig,
    lifecycle: Arc<OrderLifecycle>,
    bulk: Arc<BulkMutationCoordinator>,
    payment: Arc<PaymentReconciliation>,
    audit: Arc<CancellationAuditRecorder>,
    projector: Arc<QueryProjector>,
}

impl OrderEngine {
    pub fn new(store: Arc<dyn OrderStore>, config: EngineConfig) -> Self {
        let guard = StoreGuard::new(config.store_timeout, config.store_retry.clone());
        let lifecycle = Arc::new(OrderLifecycle::new(
            store.clone(),
            guard.clone(),
            config.write_conflict_retries,
        ));

        Self {
            bulk: Arc::new(BulkMutationCoordinator::new(lifecycle.clone(), config.bulk_concurrency)),
            payment: Arc::new(PaymentReconciliation::new(lifecycle.clone())),
            audit: Arc::new(CancellationAuditRecorder::new(lifecycle.clone())),
            projector: Arc::new(QueryProjector::new(store, guard, config.default_window_days)),
            lifecycle,
            config,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn lifecycle(&self) -> &Arc<OrderLifecycle> {
        &self.lifecycle
    }

    pub fn bulk(&self) -> &Arc<BulkMutationCoordinator> {
        &self.bulk
    }

    pub fn payment(&self) -> &Arc<PaymentReconciliation> {
        &self.payment
    }

    pub fn audit(&self) -> &Arc<CancellationAuditRecorder> {
        &self.audit
    }

    pub fn projector(&self) -> &Arc<QueryProjector> {
        &self.projector
    }
}
