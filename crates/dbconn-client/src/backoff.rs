//! Retry delay calculation.

use std::time::Duration;

use crate::options::MAX_BACKOFF;

/// Delay before the retry that follows failed attempt `attempt`.
///
/// Attempt `1` (or `0`) waits `base`; each later attempt doubles the delay,
/// capped at [`MAX_BACKOFF`]. Arithmetic saturates instead of overflowing.
#[must_use]
pub fn backoff(attempt: u32, base: Duration) -> Duration {
    if attempt <= 1 {
        return base;
    }
    let factor = 1u32.checked_shl(attempt - 1).unwrap_or(u32::MAX);
    base.saturating_mul(factor).min(MAX_BACKOFF)
}
