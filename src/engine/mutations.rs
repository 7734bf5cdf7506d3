use std::time::Instant;

use chrono::NaiveDate;
use tracing::info;
use ulid::Ulid;

use crate::messages;
use crate::model::*;

use super::conflict::validate_stay;
use super::{observe, BookingEngine, EngineError};

impl BookingEngine {
    /// Admit a new PENDING booking for `user` on `resource_id`.
    pub async fn create(
        &self,
        user: &User,
        check_in: NaiveDate,
        check_out: NaiveDate,
        resource_id: ResourceId,
    ) -> Result<BookingView, EngineError> {
        let started = Instant::now();
        let result = self.create_inner(user, check_in, check_out, resource_id).await;
        observe("create", started, &result);
        result
    }

    async fn create_inner(
        &self,
        user: &User,
        check_in: NaiveDate,
        check_out: NaiveDate,
        resource_id: ResourceId,
    ) -> Result<BookingView, EngineError> {
        if self.payments.count_pending_for_user(user.id).await? > 0 {
            return Err(EngineError::PendingPaymentConflict(user.id));
        }
        let resource = self.live_resource(resource_id).await?;
        let stay = validate_stay(check_in, check_out)?;

        let booking = {
            let _guard = self.locks.acquire(resource_id).await;
            self.ensure_capacity(&resource, &stay, None).await?;
            let booking = Booking::pending(Ulid::new(), resource_id, user.id, stay, self.clock.now());
            self.bookings.save(&booking).await?;
            booking
        };

        info!(booking_id = %booking.id, %resource_id, user_id = %user.id, %stay, "booking created");
        self.invalidate_bookings();
        self.notify(messages::booking_created(&booking));
        Ok(BookingView::from(&booking))
    }

    /// Reschedule a booking the caller owns. Users never change status.
    pub async fn update_as_user(
        &self,
        user: &User,
        id: BookingId,
        update: UpdateBooking,
    ) -> Result<BookingView, EngineError> {
        let started = Instant::now();
        let result = self.update_as_user_inner(user, id, update).await;
        observe("update_as_user", started, &result);
        result
    }

    async fn update_as_user_inner(
        &self,
        user: &User,
        id: BookingId,
        update: UpdateBooking,
    ) -> Result<BookingView, EngineError> {
        let existing = self.find_booking(id).await?;
        if existing.user_id != user.id {
            return Err(EngineError::Forbidden("booking belongs to another user"));
        }
        if update.status.is_some() {
            return Err(EngineError::Forbidden("only administrators can change booking status"));
        }

        let guard = self.locks.acquire(existing.resource_id).await;
        let current = self.find_booking(id).await?;
        ensure_modifiable(&current)?;
        let next = self.rescheduled(&current, &update, true).await?;
        self.bookings.save(&next).await?;
        drop(guard);

        info!(booking_id = %id, user_id = %user.id, stay = %next.stay, "booking updated by owner");
        self.invalidate_bookings();
        Ok(BookingView::from(&next))
    }

    /// Administrative update: dates and/or status (CONFIRMED or CANCELED).
    pub async fn update_as_admin(
        &self,
        id: BookingId,
        update: UpdateBooking,
    ) -> Result<BookingView, EngineError> {
        let started = Instant::now();
        let result = self.update_as_admin_inner(id, update).await;
        observe("update_as_admin", started, &result);
        result
    }

    async fn update_as_admin_inner(
        &self,
        id: BookingId,
        update: UpdateBooking,
    ) -> Result<BookingView, EngineError> {
        let requested: Option<BookingStatus> = update
            .status
            .as_deref()
            .map(str::parse::<BookingStatus>)
            .transpose()?;

        let existing = self.find_booking(id).await?;
        let guard = self.locks.acquire(existing.resource_id).await;
        let current = self.find_booking(id).await?;
        ensure_modifiable(&current)?;

        if let Some(next) = requested {
            check_admin_transition(current.status, next)?;
        }
        let releasing = requested == Some(BookingStatus::Canceled);
        let rescheduled = self.rescheduled(&current, &update, !releasing).await?;
        let now = self.clock.now();
        let next = match requested {
            Some(BookingStatus::Canceled) => rescheduled.canceled(now),
            Some(status) => rescheduled.with_status(status, now),
            None => rescheduled,
        };
        self.bookings.save(&next).await?;
        drop(guard);

        info!(booking_id = %id, from = %current.status, to = %next.status, stay = %next.stay, "booking updated by admin");
        self.invalidate_bookings();
        if next.status != current.status {
            match next.status {
                BookingStatus::Confirmed => self.notify(messages::booking_confirmed(&next)),
                BookingStatus::Canceled => self.notify(messages::booking_canceled(&next)),
                BookingStatus::Pending | BookingStatus::Expired => {}
            }
        }
        Ok(BookingView::from(&next))
    }

    /// Cancel and soft-delete. Allowed for the owner and for administrators.
    pub async fn cancel(&self, user: &User, id: BookingId) -> Result<BookingView, EngineError> {
        let started = Instant::now();
        let result = self.cancel_inner(user, id).await;
        observe("cancel", started, &result);
        result
    }

    async fn cancel_inner(&self, user: &User, id: BookingId) -> Result<BookingView, EngineError> {
        let existing = self.find_booking(id).await?;
        if existing.user_id != user.id && !user.is_admin() {
            return Err(EngineError::Forbidden("booking belongs to another user"));
        }

        let guard = self.locks.acquire(existing.resource_id).await;
        let current = self.find_booking(id).await?;
        if current.deleted || current.status == BookingStatus::Canceled {
            return Err(EngineError::AlreadyTerminal { id, state: "canceled" });
        }
        if current.status == BookingStatus::Expired {
            return Err(EngineError::AlreadyTerminal { id, state: "expired" });
        }
        let next = current.canceled(self.clock.now());
        self.bookings.save(&next).await?;
        drop(guard);

        info!(booking_id = %id, user_id = %user.id, "booking canceled");
        self.invalidate_bookings();
        self.notify(messages::booking_canceled(&next));
        Ok(BookingView::from(&next))
    }

    /// Move one overdue booking to EXPIRED. Returns `None` if, by the time the
    /// resource lock is held, the booking is gone or no longer eligible.
    /// Notification and cache invalidation are left to the caller, which
    /// batches them.
    pub(crate) async fn expire(&self, id: BookingId, cutoff: NaiveDate) -> Result<Option<Booking>, EngineError> {
        let Some(existing) = self.bookings.find_by_id(id).await? else {
            return Ok(None);
        };
        let _guard = self.locks.acquire(existing.resource_id).await;
        let Some(current) = self.bookings.find_by_id(id).await? else {
            return Ok(None);
        };
        if !current.is_active() || !current.stay.ends_on_or_before(cutoff) {
            return Ok(None);
        }
        let next = current.with_status(BookingStatus::Expired, self.clock.now());
        self.bookings.save(&next).await?;
        Ok(Some(next))
    }

    /// Apply the requested dates to `current` and re-validate them. With
    /// `check_capacity`, the new stay must also fit alongside every other
    /// active booking on the resource.
    async fn rescheduled(
        &self,
        current: &Booking,
        update: &UpdateBooking,
        check_capacity: bool,
    ) -> Result<Booking, EngineError> {
        let check_in = update.check_in.unwrap_or(current.stay.check_in);
        let check_out = update.check_out.unwrap_or(current.stay.check_out);
        let stay = validate_stay(check_in, check_out)?;
        if check_capacity {
            let resource = self.live_resource(current.resource_id).await?;
            self.ensure_capacity(&resource, &stay, Some(current.id)).await?;
        }
        if stay == current.stay {
            return Ok(current.clone());
        }
        Ok(current.with_stay(stay, self.clock.now()))
    }
}

/// Terminal and soft-deleted bookings accept no further changes.
fn ensure_modifiable(booking: &Booking) -> Result<(), EngineError> {
    if booking.status.is_terminal() || booking.deleted {
        return Err(EngineError::InvalidTransition(format!(
            "booking {} is {} and can no longer be modified",
            booking.id, booking.status
        )));
    }
    Ok(())
}

/// Admins may confirm or cancel a live booking. PENDING is only ever the
/// initial state, even for a booking already in it, and EXPIRED belongs to
/// the sweeper.
fn check_admin_transition(from: BookingStatus, to: BookingStatus) -> Result<(), EngineError> {
    match to {
        BookingStatus::Confirmed | BookingStatus::Canceled => Ok(()),
        BookingStatus::Pending | BookingStatus::Expired => Err(EngineError::InvalidTransition(format!(
            "cannot move booking from {from} to {to}"
        ))),
    }
}
