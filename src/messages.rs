//! Human-readable notification text for lifecycle events.

use chrono::NaiveDate;

use crate::model::Booking;

pub fn booking_created(b: &Booking) -> String {
    format!(
        "Booking {} created: accommodation {} reserved from {} ({} night{}), status {}.",
        b.id,
        b.resource_id,
        b.stay,
        b.stay.nights(),
        plural(b.stay.nights()),
        b.status,
    )
}

pub fn booking_confirmed(b: &Booking) -> String {
    format!(
        "Booking {} confirmed: accommodation {} from {}.",
        b.id, b.resource_id, b.stay
    )
}

pub fn booking_canceled(b: &Booking) -> String {
    format!(
        "Booking {} canceled: accommodation {} released for {}.",
        b.id, b.resource_id, b.stay
    )
}

pub fn booking_expired(b: &Booking) -> String {
    format!(
        "Booking {} expired (checked out {}): accommodation {} released.",
        b.id, b.stay.check_out, b.resource_id
    )
}

pub fn no_expirations(cutoff: NaiveDate) -> String {
    format!("Expiration sweep: no bookings with check-out on or before {cutoff} to expire.")
}

fn plural(n: i64) -> &'static str {
    if n == 1 { "" } else { "s" }
}
