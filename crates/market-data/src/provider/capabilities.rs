//! Provider rate limiting description.

/// Rate limits a provider advertises.
///
/// The engine compares these against its own worker count and warns when it
/// is configured to push harder than the provider accepts.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RateLimit {
    /// Requests allowed per minute. Zero means the provider states no limit.
    pub requests_per_minute: u32,

    /// Maximum concurrent requests to this provider.
    pub max_concurrency: usize,
}

impl Default for RateLimit {
    fn default() -> Self {
        Self {
            requests_per_minute: 0,
            max_concurrency: 5,
        }
    }
}
