use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::OrderError;
use crate::order::Order;

/// Who cancelled an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CancellationActor {
    User,
    Admin,
    System,
}

impl CancellationActor {
    pub fn as_str(self) -> &'static str {
        match self {
            CancellationActor::User => "User",
            CancellationActor::Admin => "Admin",
            CancellationActor::System => "System",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "User" => Some(CancellationActor::User),
            "Admin" => Some(CancellationActor::Admin),
            "System" => Some(CancellationActor::System),
            _ => None,
        }
    }
}

impl core::fmt::Display for CancellationActor {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable who/when/why of an order's cancellation.
///
/// The three fields only ever exist together; an order either has a full
/// record or none.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancellationRecord {
    pub cancelled_by: CancellationActor,
    pub cancelled_at: DateTime<Utc>,
    pub reason: Option<String>,
}

impl CancellationRecord {
    /// Build the record for an order's first entry into `Cancelled`.
    ///
    /// Fails with `CancellationAlreadyRecorded` if the order already carries
    /// one; an existing record is never overwritten.
    pub fn first_for(
        order: &Order,
        actor: CancellationActor,
        reason: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<Self, OrderError> {
        if let Some(existing) = order.cancellation() {
            return Err(OrderError::CancellationAlreadyRecorded {
                recorded_at: existing.cancelled_at,
            });
        }

        Ok(Self {
            cancelled_by: actor,
            cancelled_at: now,
            reason: reason
                .map(|r| r.trim().to_string())
                .filter(|r| !r.is_empty()),
        })
    }
}
