//! Infrastructure layer: order storage, the lifecycle engine services, config.

pub mod audit;
pub mod bulk;
pub mod config;
pub mod engine;
pub mod error;
pub mod lifecycle;
pub mod payment;
pub mod query;
pub mod retry;
pub mod store;

pub use audit::CancellationAuditRecorder;
pub use bulk::{BulkFailure, BulkMutationCoordinator, BulkOutcome, BulkStatusRequest};
pub use config::EngineConfig;
pub use engine::OrderEngine;
pub use error::EngineError;
pub use lifecycle::OrderLifecycle;
pub use payment::PaymentReconciliation;
pub use query::{OrderFilter, OrderQuery, OrderSort, QueryProjector, SortDirection, SortField};
pub use retry::{BackoffStrategy, RetryPolicy, StoreGuard};
pub use store::{InMemoryOrderStore, OrderStore, PostgresOrderStore, StoreError, WritePrecondition};

#[cfg(test)]
pub(crate) mod test_support;
