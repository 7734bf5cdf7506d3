use crate::model::*;

// ── Overlap counting ──────────────────────────────────────────────

/// Whether `booking` takes a unit of capacity on `resource_id` during `stay`.
///
/// Soft-deleted bookings, bookings in an `excluded` status, and the booking
/// identified by `exclude_id` (the one being rescheduled) never count.
pub fn occupies(
    booking: &Booking,
    resource_id: ResourceId,
    stay: &Stay,
    excluded: &[BookingStatus],
    exclude_id: Option<BookingId>,
) -> bool {
    booking.resource_id == resource_id
        && !booking.deleted
        && !excluded.contains(&booking.status)
        && exclude_id != Some(booking.id)
        && booking.stay.overlaps(stay)
}

/// Number of bookings that occupy `resource_id` during `stay`.
pub fn count_overlapping<'a>(
    bookings: impl IntoIterator<Item = &'a Booking>,
    resource_id: ResourceId,
    stay: &Stay,
    excluded: &[BookingStatus],
    exclude_id: Option<BookingId>,
) -> u32 {
    bookings
        .into_iter()
        .filter(|b| occupies(b, resource_id, stay, excluded, exclude_id))
        .count() as u32
}

/// Peak number of simultaneously active bookings among `stays`, by sweep line.
/// A checkout and a check-in on the same day do not stack.
pub fn peak_occupancy(stays: &[Stay]) -> u32 {
    let mut events: Vec<(chrono::NaiveDate, i32)> = Vec::with_capacity(stays.len() * 2);
    for s in stays {
        events.push((s.check_in, 1));
        events.push((s.check_out, -1));
    }
    // Departures sort before arrivals on the same day.
    events.sort_by(|a, b| a.0.cmp(&b.0).then(a.1.cmp(&b.1)));

    let mut current: i32 = 0;
    let mut peak: i32 = 0;
    for (_, delta) in events {
        current += delta;
        peak = peak.max(current);
    }
    peak as u32
}
