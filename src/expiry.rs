use time::{Duration, OffsetDateTime};

use crate::{
    codec::Metadata,
    error::{Error, Result},
};

/// Longest accepted idle timeout or max lifetime.
pub(crate) const MAX_DURATION: Duration = Duration::days(100 * 365);

/// The validated combination of max lifetime and idle timeout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ExpiryPolicy {
    MaxLifetime(Duration),
    IdleTimeout(Duration),
    Both { max_lifetime: Duration, idle_timeout: Duration },
}

impl ExpiryPolicy {
    /// Zero or negative durations count as unset. At least one must remain, and none may exceed
    /// [`MAX_DURATION`].
    pub(crate) fn new(max_lifetime: Option<Duration>, idle_timeout: Option<Duration>) -> Result<Self> {
        let max_lifetime = max_lifetime.filter(|d| d.is_positive());
        let idle_timeout = idle_timeout.filter(|d| d.is_positive());

        if [max_lifetime, idle_timeout].into_iter().flatten().any(|d| d > MAX_DURATION) {
            return Err(Error::Config(format!(
                "idle timeout and max lifetime must not exceed {MAX_DURATION}"
            )));
        }

        match (max_lifetime, idle_timeout) {
            (Some(max_lifetime), Some(idle_timeout)) => Ok(Self::Both {
                max_lifetime,
                idle_timeout,
            }),
            (Some(max_lifetime), None) => Ok(Self::MaxLifetime(max_lifetime)),
            (None, Some(idle_timeout)) => Ok(Self::IdleTimeout(idle_timeout)),
            (None, None) => Err(Error::Config(
                "at least one of idle timeout or max lifetime must be set".into(),
            )),
        }
    }

    pub(crate) fn idle_timeout(&self) -> Option<Duration> {
        match *self {
            Self::IdleTimeout(idle_timeout) | Self::Both { idle_timeout, .. } => Some(idle_timeout),
            Self::MaxLifetime(_) => None,
        }
    }

    pub(crate) fn max_lifetime(&self) -> Option<Duration> {
        match *self {
            Self::MaxLifetime(max_lifetime) | Self::Both { max_lifetime, .. } => Some(max_lifetime),
            Self::IdleTimeout(_) => None,
        }
    }

    /// The earliest of the lifetime and idle deadlines.
    pub(crate) fn expires_at(&self, metadata: &Metadata) -> OffsetDateTime {
        match *self {
            Self::MaxLifetime(max_lifetime) => metadata.created_at.saturating_add(max_lifetime),
            Self::IdleTimeout(idle_timeout) => metadata.last_active().saturating_add(idle_timeout),
            Self::Both {
                max_lifetime,
                idle_timeout,
            } => metadata
                .created_at
                .saturating_add(max_lifetime)
                .min(metadata.last_active().saturating_add(idle_timeout)),
        }
    }

    /// Whether the max lifetime alone has run out at `now`.
    pub(crate) fn lifetime_exceeded(&self, metadata: &Metadata, now: OffsetDateTime) -> bool {
        self.max_lifetime()
            .is_some_and(|d| metadata.created_at.saturating_add(d) <= now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn md(updated_after: Option<Duration>) -> Metadata {
        let created_at = OffsetDateTime::UNIX_EPOCH;
        Metadata {
            created_at,
            updated_at: updated_after.map(|d| created_at + d),
        }
    }

    #[test]
    fn requires_one_duration() {
        assert!(matches!(ExpiryPolicy::new(None, None), Err(Error::Config(_))));
        assert!(matches!(
            ExpiryPolicy::new(Some(Duration::ZERO), Some(Duration::ZERO)),
            Err(Error::Config(_))
        ));
        assert_eq!(
            ExpiryPolicy::new(Some(Duration::ZERO), Some(Duration::minutes(1))).expect("valid"),
            ExpiryPolicy::IdleTimeout(Duration::minutes(1))
        );
    }

    #[test]
    fn rejects_unrepresentable_durations() {
        assert!(matches!(
            ExpiryPolicy::new(None, Some(Duration::MAX)),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            ExpiryPolicy::new(Some(MAX_DURATION + Duration::SECOND), Some(Duration::minutes(10))),
            Err(Error::Config(_))
        ));
        assert_eq!(
            ExpiryPolicy::new(Some(MAX_DURATION), None).expect("valid"),
            ExpiryPolicy::MaxLifetime(MAX_DURATION)
        );
    }

    #[test]
    fn deadlines_saturate_near_the_end_of_time() {
        let policy = ExpiryPolicy::new(Some(MAX_DURATION), Some(MAX_DURATION)).expect("valid");
        let late = OffsetDateTime::new_utc(time::Date::MAX, time::Time::MIDNIGHT);
        let metadata = Metadata {
            created_at: late,
            updated_at: None,
        };

        assert!(policy.expires_at(&metadata) >= late);
        assert!(!policy.lifetime_exceeded(&metadata, late));
    }

    #[test]
    fn max_lifetime_only() {
        let policy = ExpiryPolicy::new(Some(Duration::hours(1)), None).expect("valid");

        assert_eq!(
            policy.expires_at(&md(Some(Duration::minutes(50)))),
            OffsetDateTime::UNIX_EPOCH + Duration::hours(1)
        );
    }

    #[test]
    fn idle_only_uses_last_update() {
        let policy = ExpiryPolicy::new(None, Some(Duration::minutes(10))).expect("valid");

        assert_eq!(
            policy.expires_at(&md(None)),
            OffsetDateTime::UNIX_EPOCH + Duration::minutes(10)
        );
        assert_eq!(
            policy.expires_at(&md(Some(Duration::minutes(30)))),
            OffsetDateTime::UNIX_EPOCH + Duration::minutes(40)
        );
    }

    #[test]
    fn earliest_deadline_wins() {
        // Exercise: max lifetime 1h, idle 10m.
        // Expectation: idle governs early on, the lifetime cap governs once updates run late.
        let policy =
            ExpiryPolicy::new(Some(Duration::hours(1)), Some(Duration::minutes(10))).expect("valid");

        assert_eq!(
            policy.expires_at(&md(Some(Duration::minutes(5)))),
            OffsetDateTime::UNIX_EPOCH + Duration::minutes(15)
        );
        assert_eq!(
            policy.expires_at(&md(Some(Duration::minutes(55)))),
            OffsetDateTime::UNIX_EPOCH + Duration::hours(1)
        );
    }

    #[test]
    fn lifetime_exceeded_ignores_idle() {
        let policy =
            ExpiryPolicy::new(Some(Duration::hours(1)), Some(Duration::minutes(10))).expect("valid");
        let metadata = md(Some(Duration::minutes(59)));

        assert!(!policy.lifetime_exceeded(&metadata, OffsetDateTime::UNIX_EPOCH + Duration::minutes(59)));
        assert!(policy.lifetime_exceeded(&metadata, OffsetDateTime::UNIX_EPOCH + Duration::hours(1)));

        let idle_only = ExpiryPolicy::new(None, Some(Duration::minutes(10))).expect("valid");
        assert!(!idle_only.lifetime_exceeded(&metadata, OffsetDateTime::UNIX_EPOCH + Duration::days(1)));
    }
}
