use std::future::Future;
use std::time::Instant;

use chrono::NaiveDate;
use tracing::warn;

use crate::cache::{booking_detail_key, BookingKey};
use crate::model::*;
use crate::repository::RepoResult;

use super::{observe, BookingEngine, EngineError};

impl BookingEngine {
    /// Fetch a booking on behalf of `user`. Non-admins only see their own.
    pub async fn get_by_id_for_user(&self, user: &User, id: BookingId) -> Result<BookingView, EngineError> {
        let started = Instant::now();
        let result = match self.load_view(id).await {
            Ok(view) if view.user_id != user.id && !user.is_admin() => {
                Err(EngineError::Forbidden("booking belongs to another user"))
            }
            other => other,
        };
        observe("get_for_user", started, &result);
        result
    }

    pub async fn get_by_id_for_admin(&self, id: BookingId) -> Result<BookingView, EngineError> {
        let started = Instant::now();
        let result = self.load_view(id).await;
        observe("get_for_admin", started, &result);
        result
    }

    /// True iff the booking exists and belongs to `user`. Always reads the
    /// repository, never the cache.
    pub async fn can_user_modify(&self, user: &User, id: BookingId) -> Result<bool, EngineError> {
        Ok(self
            .bookings
            .find_by_id(id)
            .await?
            .is_some_and(|b| b.user_id == user.id))
    }

    pub async fn list_by_user_and_status(
        &self,
        user_id: UserId,
        status: BookingStatus,
        page: PageRequest,
    ) -> Result<Vec<BookingView>, EngineError> {
        let started = Instant::now();
        let key = BookingKey::new(page).user(user_id).status(status).build();
        let result = self
            .read_through_list(&key, || self.bookings.find_by_user_and_status(user_id, status, page))
            .await;
        observe("list_by_user_and_status", started, &result);
        result
    }

    pub async fn list_by_user(&self, user: &User, page: PageRequest) -> Result<Vec<BookingView>, EngineError> {
        let started = Instant::now();
        let key = BookingKey::new(page).user(user.id).build();
        let result = self
            .read_through_list(&key, || self.bookings.find_by_user(user.id, page))
            .await;
        observe("list_by_user", started, &result);
        result
    }

    /// Active bookings whose check-out is on or before `cutoff`.
    pub(crate) async fn expired_candidates(&self, cutoff: NaiveDate) -> Result<Vec<Booking>, EngineError> {
        self.bookings
            .find_expired_candidates(&BookingStatus::RELEASED, cutoff)
            .await
            .map_err(EngineError::from)
    }

    async fn load_view(&self, id: BookingId) -> Result<BookingView, EngineError> {
        let key = booking_detail_key(id);
        if let Some(view) = self.cache.get::<BookingView>(&key).await {
            return Ok(view);
        }
        let booking = self.find_booking(id).await?;
        let view = BookingView::from(&booking);
        if let Err(e) = self.cache.set(&key, &view).await {
            warn!(%key, error = %e, "failed to cache booking");
        }
        Ok(view)
    }

    /// Serve a non-empty cached list, otherwise fetch, cache, and return.
    async fn read_through_list<F, Fut>(&self, key: &str, fetch: F) -> Result<Vec<BookingView>, EngineError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = RepoResult<Page<Booking>>>,
    {
        let cached: Vec<BookingView> = self.cache.get_list(key).await;
        if !cached.is_empty() {
            return Ok(cached);
        }
        let page = fetch().await?;
        let views: Vec<BookingView> = page.items.iter().map(BookingView::from).collect();
        if let Err(e) = self.cache.set(key, &views).await {
            warn!(key, error = %e, "failed to cache booking list");
        }
        Ok(views)
    }
}
