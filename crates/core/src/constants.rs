/// Maximum age of a signed webhook before it is rejected as stale.
pub const WEBHOOK_FRESHNESS_WINDOW_SECS: i64 = 5 * 60;

/// History window requested from production environments.
pub const PRODUCTION_MAX_HISTORY_DAYS: i64 = 730;

/// History window requested from sandbox and development environments.
pub const FAST_ITERATION_MAX_HISTORY_DAYS: i64 = 90;

/// Provider error codes that mean the access token can no longer be used.
pub const RELINK_ERROR_CODES: &[&str] = &[
    "INVALID_ACCESS_TOKEN",
    "ITEM_LOGIN_REQUIRED",
    "ITEM_NOT_FOUND",
    "ACCESS_NOT_GRANTED",
];

/// Provider error type reported when a client exceeds its rate limit.
pub const RATE_LIMIT_ERROR_TYPE: &str = "RATE_LIMIT_EXCEEDED";
