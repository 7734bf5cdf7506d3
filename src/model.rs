use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

use crate::limits::MAX_PAGE_SIZE;

pub type ResourceId = Ulid;
pub type BookingId = Ulid;
pub type UserId = Ulid;
pub type PaymentId = Ulid;

/// Half-open stay `[check_in, check_out)`: checking out on the day someone else
/// checks in is not an overlap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Stay {
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
}

impl Stay {
    /// Returns `None` unless `check_out` is strictly after `check_in`.
    pub fn try_new(check_in: NaiveDate, check_out: NaiveDate) -> Option<Self> {
        (check_out > check_in).then_some(Self { check_in, check_out })
    }

    pub fn nights(&self) -> i64 {
        (self.check_out - self.check_in).num_days()
    }

    pub fn overlaps(&self, other: &Stay) -> bool {
        self.check_in < other.check_out && other.check_in < self.check_out
    }

    pub fn ends_on_or_before(&self, day: NaiveDate) -> bool {
        self.check_out <= day
    }
}

impl fmt::Display for Stay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} to {}", self.check_in, self.check_out)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    Canceled,
    Expired,
}

impl BookingStatus {
    /// Statuses that no longer hold capacity on a resource.
    pub const RELEASED: [BookingStatus; 2] = [BookingStatus::Canceled, BookingStatus::Expired];

    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "PENDING",
            BookingStatus::Confirmed => "CONFIRMED",
            BookingStatus::Canceled => "CANCELED",
            BookingStatus::Expired => "EXPIRED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, BookingStatus::Canceled | BookingStatus::Expired)
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown booking status: {0:?}")]
pub struct UnknownStatus(pub String);

impl FromStr for BookingStatus {
    type Err = UnknownStatus;

    /// Case-insensitive; surrounding whitespace is ignored.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "PENDING" => Ok(BookingStatus::Pending),
            "CONFIRMED" => Ok(BookingStatus::Confirmed),
            "CANCELED" | "CANCELLED" => Ok(BookingStatus::Canceled),
            "EXPIRED" => Ok(BookingStatus::Expired),
            _ => Err(UnknownStatus(s.to_string())),
        }
    }
}

/// Bookable accommodation. Read-only from the booking core's point of view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resource {
    pub id: ResourceId,
    pub name: Option<String>,
    /// Max concurrent active bookings on any night. Zero admits nothing.
    pub availability: u32,
    pub deleted: bool,
}

impl Resource {
    pub fn new(id: ResourceId, name: Option<String>, availability: u32) -> Self {
        Self {
            id,
            name,
            availability,
            deleted: false,
        }
    }
}

/// A reservation. Values are never mutated in place: the `with_*` helpers
/// build the next version, which the caller then writes explicitly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Booking {
    pub id: BookingId,
    pub resource_id: ResourceId,
    pub user_id: UserId,
    pub stay: Stay,
    pub status: BookingStatus,
    pub deleted: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Booking {
    pub fn pending(
        id: BookingId,
        resource_id: ResourceId,
        user_id: UserId,
        stay: Stay,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            resource_id,
            user_id,
            stay,
            status: BookingStatus::Pending,
            deleted: false,
            created_at: now,
            updated_at: now,
        }
    }

    /// Holds capacity on its resource.
    pub fn is_active(&self) -> bool {
        !self.deleted && !self.status.is_terminal()
    }

    pub fn with_status(&self, status: BookingStatus, now: DateTime<Utc>) -> Self {
        Self {
            status,
            updated_at: now,
            ..self.clone()
        }
    }

    pub fn with_stay(&self, stay: Stay, now: DateTime<Utc>) -> Self {
        Self {
            stay,
            updated_at: now,
            ..self.clone()
        }
    }

    pub fn canceled(&self, now: DateTime<Utc>) -> Self {
        Self {
            status: BookingStatus::Canceled,
            deleted: true,
            updated_at: now,
            ..self.clone()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    Pending,
    Paid,
    Failed,
    Refunded,
}

/// Payment session attached to a booking. Owned by the payment collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payment {
    pub id: PaymentId,
    pub booking_id: BookingId,
    pub user_id: UserId,
    pub status: PaymentStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Admin,
}

/// The authenticated caller, as handed over by the presentation layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct User {
    pub id: UserId,
    pub role: Role,
}

impl User {
    pub fn user(id: UserId) -> Self {
        Self { id, role: Role::User }
    }

    pub fn admin(id: UserId) -> Self {
        Self { id, role: Role::Admin }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

// ── Paging ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SortField {
    CheckIn,
    CheckOut,
    CreatedAt,
}

impl SortField {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortField::CheckIn => "checkInDate",
            SortField::CheckOut => "checkOutDate",
            SortField::CreatedAt => "createdAt",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SortDirection {
    Asc,
    Desc,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SortSpec {
    pub field: SortField,
    pub direction: SortDirection,
}

impl Default for SortSpec {
    fn default() -> Self {
        Self {
            field: SortField::CheckIn,
            direction: SortDirection::Asc,
        }
    }
}

impl fmt::Display for SortSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let dir = match self.direction {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        };
        write!(f, "{}: {dir}", self.field.as_str())
    }
}

impl SortSpec {
    pub fn compare(&self, a: &Booking, b: &Booking) -> std::cmp::Ordering {
        let ord = match self.field {
            SortField::CheckIn => a.stay.check_in.cmp(&b.stay.check_in),
            SortField::CheckOut => a.stay.check_out.cmp(&b.stay.check_out),
            SortField::CreatedAt => a.created_at.cmp(&b.created_at),
        }
        // ULIDs are time-ordered, which keeps equal keys stable across calls.
        .then_with(|| a.id.cmp(&b.id));
        match self.direction {
            SortDirection::Asc => ord,
            SortDirection::Desc => ord.reverse(),
        }
    }
}

/// Zero-based page request. `size` is clamped to `1..=MAX_PAGE_SIZE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PageRequest {
    pub number: u32,
    pub size: u32,
    pub sort: SortSpec,
}

impl PageRequest {
    pub fn new(number: u32, size: u32) -> Self {
        Self {
            number,
            size: size.clamp(1, MAX_PAGE_SIZE),
            sort: SortSpec::default(),
        }
    }

    pub fn sorted(mut self, sort: SortSpec) -> Self {
        self.sort = sort;
        self
    }

    pub fn offset(&self) -> usize {
        self.number as usize * self.size as usize
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub number: u32,
    pub size: u32,
    pub total: u64,
}

impl<T> Page<T> {
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            number: self.number,
            size: self.size,
            total: self.total,
        }
    }
}

// ── Engine-facing request/response types ─────────────────────────

/// Partial update. Absent dates keep their current value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateBooking {
    pub check_in: Option<NaiveDate>,
    pub check_out: Option<NaiveDate>,
    /// Raw status from the request payload; parsed by the engine.
    pub status: Option<String>,
}

/// Read model handed back to callers and stored in the cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingView {
    pub id: BookingId,
    pub resource_id: ResourceId,
    pub user_id: UserId,
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
    pub status: BookingStatus,
    pub nights: i64,
}

impl From<&Booking> for BookingView {
    fn from(b: &Booking) -> Self {
        Self {
            id: b.id,
            resource_id: b.resource_id,
            user_id: b.user_id,
            check_in: b.stay.check_in,
            check_out: b.stay.check_out,
            status: b.status,
            nights: b.stay.nights(),
        }
    }
}

/// Journal record format: flat, one record per store write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StoreRecord {
    ResourceUpserted(Resource),
    BookingSaved(Booking),
    BookingDeleted { id: BookingId },
    PaymentSaved(Payment),
}
