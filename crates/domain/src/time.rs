//! Time and timestamp helpers.

use chrono::{DateTime, FixedOffset, Local, SubsecRound, Utc};

/// UTC timestamp used for update bookkeeping (`last_update`, module intervals).
pub type Timestamp = DateTime<Utc>;

/// Wall-clock time as reported by a device, carrying the device's UTC offset.
pub type DeviceTime = DateTime<FixedOffset>;

/// Return the current UTC time.
#[must_use]
pub fn now() -> Timestamp {
    Utc::now()
}

/// Return the local wall-clock time truncated to whole seconds.
///
/// Used as the device clock when no time source is available.
#[must_use]
pub fn local_now() -> DeviceTime {
    Local::now().fixed_offset().trunc_subsecs(0)
}
