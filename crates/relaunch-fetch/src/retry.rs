use std::time::Duration;

/// Delay before retry attempt `retry_count` (0-indexed): `base * 2^retry_count`.
///
/// Saturates instead of overflowing for pathological retry counts.
pub fn retry_delay(retry_count: u32, base: Duration) -> Duration {
    let multiplier = 2_u32.saturating_pow(retry_count);
    base.saturating_mul(multiplier)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn doubles_per_retry() {
        let base = Duration::from_millis(500);
        assert_eq!(retry_delay(0, base), Duration::from_millis(500));
        assert_eq!(retry_delay(1, base), Duration::from_millis(1000));
        assert_eq!(retry_delay(2, base), Duration::from_millis(2000));
    }

    #[test]
    fn zero_base_stays_zero() {
        assert_eq!(retry_delay(5, Duration::ZERO), Duration::ZERO);
    }

    #[test]
    fn saturates_on_large_counts() {
        let delay = retry_delay(40, Duration::from_secs(u64::MAX / 2));
        assert!(delay > Duration::ZERO);
    }
}
