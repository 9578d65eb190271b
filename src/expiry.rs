//! Expiration codec.
//!
//! Turns a caller's relative TTL into an absolute [`Marker`] that every
//! backend can persist, and decides whether a marker has passed.
//!
//! A marker is a count of nanoseconds since the unix epoch. It fits an
//! SQLite `INTEGER` and an 8-byte header in redb without losing any of the
//! input duration's resolution. On disk `0` stands for "no expiry".

use chrono::Utc;
use std::time::Duration;

/// Absolute expiration instant, in nanoseconds since the unix epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Marker(i64);

impl Marker {
    /// Samples the wall clock.
    pub fn now() -> Self {
        // timestamp_nanos_opt only fails past the year 2262
        Self(Utc::now().timestamp_nanos_opt().unwrap_or(i64::MAX))
    }

    /// Builds a marker from raw epoch nanoseconds.
    pub const fn from_nanos(nanos: i64) -> Self {
        Self(nanos)
    }

    /// Raw epoch nanoseconds.
    pub const fn as_nanos(self) -> i64 {
        self.0
    }

    /// Time left until this marker passes, zero once it has.
    pub fn remaining(self, now: Marker) -> Duration {
        if self.0 <= now.0 {
            Duration::ZERO
        } else {
            Duration::from_nanos(self.0.abs_diff(now.0))
        }
    }

    /// Decodes the on-disk representation, where `0` means no expiry.
    pub const fn from_stored(raw: i64) -> Option<Marker> {
        if raw == 0 { None } else { Some(Self(raw)) }
    }

    /// Encodes for storage, mapping `None` to the `0` sentinel.
    pub const fn to_stored(marker: Option<Marker>) -> i64 {
        match marker {
            Some(Marker(raw)) => raw,
            None => 0,
        }
    }
}

/// Converts a TTL into an absolute marker using the current time.
///
/// A zero TTL means the entry never expires.
pub fn encode(ttl: Duration) -> Option<Marker> {
    encode_at(ttl, Marker::now())
}

/// Same as [`encode`] with an explicit `now`.
pub fn encode_at(ttl: Duration, now: Marker) -> Option<Marker> {
    if ttl.is_zero() {
        return None;
    }
    let nanos = i64::try_from(ttl.as_nanos()).unwrap_or(i64::MAX);
    // Never produce the storage sentinel, even for pre-epoch clocks.
    Some(Marker(now.0.saturating_add(nanos).max(1)))
}

/// Returns true if an entry with `marker` is logically deleted at `now`.
///
/// The boundary is inclusive: a marker equal to `now` has expired.
pub fn is_expired(marker: Option<Marker>, now: Marker) -> bool {
    marker.is_some_and(|m| m <= now)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_zero_ttl_never_expires() {
        assert_eq!(encode(Duration::ZERO), None);
        assert!(!is_expired(None, Marker::from_nanos(i64::MAX)));
    }

    #[test]
    fn test_encode_adds_ttl() {
        let now = Marker::from_nanos(1_000);
        let marker = encode_at(Duration::from_nanos(500), now).unwrap();
        assert_eq!(marker.as_nanos(), 1_500);
    }

    #[test]
    fn test_boundary_is_inclusive() {
        let marker = Some(Marker::from_nanos(1_000));
        assert!(!is_expired(marker, Marker::from_nanos(999)));
        assert!(is_expired(marker, Marker::from_nanos(1_000)));
        assert!(is_expired(marker, Marker::from_nanos(1_001)));
    }

    #[test]
    fn test_huge_ttl_saturates() {
        let now = Marker::from_nanos(1_000);
        let marker = encode_at(Duration::MAX, now).unwrap();
        assert_eq!(marker.as_nanos(), i64::MAX);
        assert!(!is_expired(Some(marker), Marker::now()));
    }

    #[test]
    fn test_encode_never_yields_sentinel() {
        let marker = encode_at(Duration::from_nanos(1), Marker::from_nanos(-1)).unwrap();
        assert_ne!(Marker::to_stored(Some(marker)), 0);
    }

    #[test]
    fn test_stored_sentinel() {
        assert_eq!(Marker::from_stored(0), None);
        assert_eq!(Marker::to_stored(None), 0);
        assert_eq!(
            Marker::from_stored(42),
            Some(Marker::from_nanos(42))
        );
    }

    #[test]
    fn test_remaining() {
        let marker = Marker::from_nanos(3_000);
        assert_eq!(
            marker.remaining(Marker::from_nanos(1_000)),
            Duration::from_nanos(2_000)
        );
        assert_eq!(marker.remaining(Marker::from_nanos(5_000)), Duration::ZERO);
    }

    #[test]
    fn test_now_is_sampled_at_encode_time() {
        let before = Marker::now();
        let marker = encode(Duration::from_secs(1)).unwrap();
        let after = Marker::now();
        assert!(marker.as_nanos() >= before.as_nanos() + 1_000_000_000);
        assert!(marker.as_nanos() <= after.as_nanos() + 1_000_000_000);
    }

    proptest! {
        #[test]
        fn prop_live_until_marker(
            now in 0i64..(i64::MAX / 2),
            ttl in 1u64..(u64::MAX / 4),
        ) {
            let start = Marker::from_nanos(now);
            let marker = encode_at(Duration::from_nanos(ttl), start);
            prop_assert!(marker.is_some());
            prop_assert!(!is_expired(marker, start));
            let end = Marker::from_nanos(Marker::to_stored(marker));
            prop_assert!(is_expired(marker, end));
        }

        #[test]
        fn prop_stored_roundtrip(raw in any::<i64>()) {
            prop_assert_eq!(Marker::to_stored(Marker::from_stored(raw)), raw);
        }
    }
}
