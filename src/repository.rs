//! Persistence seams consumed by the booking core. The in-memory
//! implementation lives in `engine::store`; anything with the same contract
//! (a SQL-backed adapter, a remote service) can be plugged in instead.

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::model::*;

#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("journal error: {0}")]
    Journal(#[from] std::io::Error),
    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

pub type RepoResult<T> = Result<T, RepositoryError>;

#[async_trait]
pub trait ResourceRepository: Send + Sync {
    async fn find_by_id(&self, id: ResourceId) -> RepoResult<Option<Resource>>;
}

#[async_trait]
pub trait BookingRepository: Send + Sync {
    async fn find_by_id(&self, id: BookingId) -> RepoResult<Option<Booking>>;

    /// Insert or replace by id.
    async fn save(&self, booking: &Booking) -> RepoResult<()>;

    /// Hard delete. The lifecycle engine never calls this; it exists for
    /// administrative cleanup.
    async fn delete(&self, id: BookingId) -> RepoResult<()>;

    /// Bookings on `resource_id` overlapping `stay`, not soft-deleted, whose
    /// status is not in `excluded`, and whose id is not `exclude_id`.
    async fn count_overlapping(
        &self,
        resource_id: ResourceId,
        stay: Stay,
        excluded: &[BookingStatus],
        exclude_id: Option<BookingId>,
    ) -> RepoResult<u32>;

    async fn find_by_user_and_status(
        &self,
        user_id: UserId,
        status: BookingStatus,
        page: PageRequest,
    ) -> RepoResult<Page<Booking>>;

    async fn find_by_user(&self, user_id: UserId, page: PageRequest) -> RepoResult<Page<Booking>>;

    /// Non-deleted bookings whose status is not in `excluded` and whose
    /// check-out is on or before `cutoff`.
    async fn find_expired_candidates(
        &self,
        excluded: &[BookingStatus],
        cutoff: NaiveDate,
    ) -> RepoResult<Vec<Booking>>;
}

#[async_trait]
pub trait PaymentRepository: Send + Sync {
    async fn count_pending_for_user(&self, user_id: UserId) -> RepoResult<u64>;
}
