use chrono::NaiveDate;

use crate::limits::MAX_STAY_NIGHTS;
use crate::model::*;

use super::EngineError;

pub(crate) fn validate_stay(check_in: NaiveDate, check_out: NaiveDate) -> Result<Stay, EngineError> {
    let stay = Stay::try_new(check_in, check_out).ok_or(EngineError::InvalidDateRange {
        check_in,
        check_out,
        reason: "check-out must be after check-in",
    })?;
    if stay.nights() > MAX_STAY_NIGHTS {
        return Err(EngineError::InvalidDateRange {
            check_in,
            check_out,
            reason: "stay too long",
        });
    }
    Ok(stay)
}

/// Reject once the overlapping active bookings already fill the resource.
pub(crate) fn check_capacity(resource: &Resource, stay: &Stay, overlapping: u32) -> Result<(), EngineError> {
    if overlapping >= resource.availability {
        return Err(EngineError::CapacityExceeded {
            resource_id: resource.id,
            stay: *stay,
            overlapping,
            availability: resource.availability,
        });
    }
    Ok(())
}
