/// Classification for retry policy.
///
/// The engine performs no retries itself. The job layer uses this to decide
/// what to do with a failed sync invocation.
///
/// | Class | Retry? | User action? |
/// |-------|--------|--------------|
/// | `WithBackoff` | Yes, with exponential backoff | No |
/// | `Relink` | No | Re-link the item |
/// | `Never` | No | No (provider or engine bug) |
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RetryClass {
    /// Transient failure: network, timeout, rate limit, provider outage or a
    /// concurrent sync holding the item lease.
    WithBackoff,

    /// The access token is revoked or needs user re-authentication.
    /// Retrying is pointless until the user re-links the item.
    Relink,

    /// Terminal for this invocation - protocol violation, invalid request or
    /// misconfiguration.
    Never,
}
