use std::time::Duration;

/// Longest court booking, in whole hours.
pub const MAX_COURT_DURATION_HOURS: u32 = 4;

/// Hard ceiling on any window, court or ambulance. Guards the minute
/// arithmetic, not a booking policy.
pub const MAX_WINDOW_HOURS: u32 = 168;

/// Records stored for one resource type on one calendar date, terminal
/// statuses included.
pub const MAX_RESERVATIONS_PER_DAY: usize = 64;

/// Widest calendar or listing query, in days, both endpoints inclusive.
pub const MAX_QUERY_WINDOW_DAYS: i64 = 92;

/// Longest accepted requester id, display name, or patient name.
pub const MAX_NAME_LEN: usize = 120;

/// Longest accepted free-text field (purpose, destination, cancel reason).
pub const MAX_TEXT_LEN: usize = 280;

/// Longest accepted staff decision comment.
pub const MAX_COMMENT_LEN: usize = 500;

/// Longest accepted tracking code from the service-id generator.
pub const MAX_SERVICE_ID_LEN: usize = 40;

/// How long a caller waits on a schedule lock before giving up with `Busy`.
pub const LOCK_WAIT: Duration = Duration::from_secs(2);
