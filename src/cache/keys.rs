use crate::model::{BookingId, BookingStatus, PageRequest, UserId};

pub const BOOKINGS_PREFIX: &str = "bookings";

/// Matches every booking list and detail key.
pub const ALL_BOOKINGS_PATTERN: &str = "bookings*";

/// Builds the cache key of a booking list query.
///
/// Segment order is fixed (`user`, then `status`, then paging) so the same
/// logical query always maps to the same key.
#[derive(Debug, Clone, Copy)]
pub struct BookingKey {
    user: Option<UserId>,
    status: Option<BookingStatus>,
    page: PageRequest,
}

impl BookingKey {
    pub fn new(page: PageRequest) -> Self {
        Self {
            user: None,
            status: None,
            page,
        }
    }

    pub fn user(mut self, user_id: UserId) -> Self {
        self.user = Some(user_id);
        self
    }

    pub fn status(mut self, status: BookingStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn build(&self) -> String {
        let mut key = String::from(BOOKINGS_PREFIX);
        if let Some(user) = self.user {
            key.push_str(&format!("::user::{user}"));
        }
        if let Some(status) = self.status {
            key.push_str(&format!("::status::{status}"));
        }
        key.push_str(&format!(
            "::page::{}::size::{}::sort::{}",
            self.page.number, self.page.size, self.page.sort
        ));
        key
    }
}

pub fn booking_detail_key(id: BookingId) -> String {
    format!("{BOOKINGS_PREFIX}::id::{id}")
}
