/// Classification for retry policy.
///
/// Used by callers of the price engine to decide whether a failed ticker is
/// worth asking for again, and how soon.
///
/// # Behavior Summary
///
/// | Class | Retry? | When |
/// |-------|--------|------|
/// | `Never` | No | The request itself is wrong (unknown symbol, bad data, bad range) |
/// | `WithBackoff` | Yes | After the provider quota window has passed |
/// | `Transient` | Yes | Immediately or on the next scheduled run |
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RetryClass {
    /// Never retry - unknown symbol, invalid series, or a range that predates
    /// all available history. Retrying returns the same answer.
    Never,

    /// Retry after backing off.
    ///
    /// Used when the provider explicitly signalled a quota or frequency limit.
    /// Retrying before the window resets only burns another request.
    WithBackoff,

    /// Retry is expected to succeed.
    ///
    /// Used for timeouts, connection failures and empty responses that the
    /// provider sometimes returns under load.
    Transient,
}

impl RetryClass {
    /// Whether an error in this class may succeed on a later attempt.
    pub fn is_retryable(self) -> bool {
        !matches!(self, RetryClass::Never)
    }
}
