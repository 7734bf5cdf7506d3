use std::fmt;

use chrono::NaiveDate;
use ulid::Ulid;

use crate::model::{BookingId, ResourceId, Stay, UnknownStatus, UserId};
use crate::repository::RepositoryError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entity {
    Resource,
    Booking,
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Entity::Resource => "accommodation",
            Entity::Booking => "booking",
        })
    }
}

/// Everything a booking operation can fail with. All variants except
/// `Repository` are domain rejections: final, never retried.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: Entity, id: Ulid },

    #[error(
        "accommodation {resource_id} is fully booked for {stay}: {overlapping} overlapping bookings, availability {availability}"
    )]
    CapacityExceeded {
        resource_id: ResourceId,
        stay: Stay,
        overlapping: u32,
        availability: u32,
    },

    #[error("invalid stay {check_in} to {check_out}: {reason}")]
    InvalidDateRange {
        check_in: NaiveDate,
        check_out: NaiveDate,
        reason: &'static str,
    },

    #[error("forbidden: {0}")]
    Forbidden(&'static str),

    #[error("invalid status transition: {0}")]
    InvalidTransition(String),

    #[error("booking {id} is already {state}")]
    AlreadyTerminal { id: BookingId, state: &'static str },

    #[error("user {0} has a pending payment; settle it before booking again")]
    PendingPaymentConflict(UserId),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl From<UnknownStatus> for EngineError {
    fn from(e: UnknownStatus) -> Self {
        EngineError::InvalidTransition(e.to_string())
    }
}

impl EngineError {
    pub(crate) fn booking_not_found(id: BookingId) -> Self {
        EngineError::NotFound { entity: Entity::Booking, id }
    }

    pub(crate) fn resource_not_found(id: ResourceId) -> Self {
        EngineError::NotFound { entity: Entity::Resource, id }
    }

    /// Stable label for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            EngineError::NotFound { .. } => "not_found",
            EngineError::CapacityExceeded { .. } => "capacity_exceeded",
            EngineError::InvalidDateRange { .. } => "invalid_date_range",
            EngineError::Forbidden(_) => "forbidden",
            EngineError::InvalidTransition(_) => "invalid_transition",
            EngineError::AlreadyTerminal { .. } => "already_terminal",
            EngineError::PendingPaymentConflict(_) => "pending_payment_conflict",
            EngineError::Repository(_) => "repository",
        }
    }

    pub fn is_domain(&self) -> bool {
        !matches!(self, EngineError::Repository(_))
    }
}
