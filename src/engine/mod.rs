mod availability;
mod conflict;
mod error;
mod mutations;
mod queries;
mod store;
#[cfg(test)]
mod tests;

pub use availability::{count_overlapping, occupies, peak_occupancy};
pub use error::{EngineError, Entity};
pub use store::{run_compactor, MemoryStore};

use std::sync::Arc;
use std::time::Instant;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::cache::Cache;
use crate::clock::{Clock, SystemClock};
use crate::effects::{Effect, EffectDispatcher};
use crate::model::*;
use crate::observability::{OPERATIONS_TOTAL, OPERATION_DURATION_SECONDS};
use crate::repository::{BookingRepository, PaymentRepository, ResourceRepository};

/// One mutex per resource. Every read-count-write on a resource's bookings
/// runs under its lock, so two admissions can't both take the last unit.
#[derive(Default)]
pub(crate) struct AdmissionLocks {
    locks: DashMap<ResourceId, Arc<Mutex<()>>>,
}

impl AdmissionLocks {
    pub(crate) async fn acquire(&self, resource_id: ResourceId) -> OwnedMutexGuard<()> {
        // Clone the Arc out before awaiting so no DashMap shard guard is held
        // across the await.
        let lock = self.locks.entry(resource_id).or_default().value().clone();
        lock.lock_owned().await
    }
}

/// The booking admission and lifecycle engine.
pub struct BookingEngine {
    resources: Arc<dyn ResourceRepository>,
    bookings: Arc<dyn BookingRepository>,
    payments: Arc<dyn PaymentRepository>,
    cache: Cache,
    effects: EffectDispatcher,
    clock: Arc<dyn Clock>,
    locks: AdmissionLocks,
}

impl BookingEngine {
    pub fn new(
        resources: Arc<dyn ResourceRepository>,
        bookings: Arc<dyn BookingRepository>,
        payments: Arc<dyn PaymentRepository>,
        cache: Cache,
        effects: EffectDispatcher,
    ) -> Self {
        Self {
            resources,
            bookings,
            payments,
            cache,
            effects,
            clock: Arc::new(SystemClock),
            locks: AdmissionLocks::default(),
        }
    }

    /// Engine over a single store that serves all three repositories.
    pub fn with_store(store: Arc<MemoryStore>, cache: Cache, effects: EffectDispatcher) -> Self {
        Self::new(store.clone(), store.clone(), store, cache, effects)
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    pub fn effects(&self) -> &EffectDispatcher {
        &self.effects
    }

    /// Enqueue a full booking-cache invalidation.
    pub(crate) fn invalidate_bookings(&self) {
        self.effects.submit(Effect::InvalidateBookings);
    }

    pub(crate) fn notify(&self, message: String) {
        self.effects.submit(Effect::Notify(message));
    }

    /// Resource that exists and has not been deleted.
    async fn live_resource(&self, id: ResourceId) -> Result<Resource, EngineError> {
        match self.resources.find_by_id(id).await? {
            Some(r) if !r.deleted => Ok(r),
            _ => Err(EngineError::resource_not_found(id)),
        }
    }

    async fn find_booking(&self, id: BookingId) -> Result<Booking, EngineError> {
        self.bookings
            .find_by_id(id)
            .await?
            .ok_or_else(|| EngineError::booking_not_found(id))
    }

    /// Fail unless another booking unit fits on `resource` during `stay`.
    async fn ensure_capacity(
        &self,
        resource: &Resource,
        stay: &Stay,
        exclude: Option<BookingId>,
    ) -> Result<(), EngineError> {
        let overlapping = self
            .bookings
            .count_overlapping(resource.id, *stay, &BookingStatus::RELEASED, exclude)
            .await?;
        conflict::check_capacity(resource, stay, overlapping)
    }
}

/// Record outcome and latency of one engine operation.
fn observe<T>(op: &'static str, started: Instant, result: &Result<T, EngineError>) {
    let outcome = match result {
        Ok(_) => "ok",
        Err(e) => e.kind(),
    };
    metrics::counter!(OPERATIONS_TOTAL, "op" => op, "outcome" => outcome).increment(1);
    metrics::histogram!(OPERATION_DURATION_SECONDS, "op" => op).record(started.elapsed().as_secs_f64());
    if let Err(e) = result {
        if e.is_domain() {
            tracing::debug!(op, error = %e, "booking operation rejected");
        } else {
            tracing::error!(op, error = %e, "booking operation failed");
        }
    }
}
