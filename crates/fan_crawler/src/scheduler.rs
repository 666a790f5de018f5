use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use fan_core::Checkpoint;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StaleReason {
    NeverCrawled,
    EmptyStore,
    Expired { age: Duration },
}

impl fmt::Display for StaleReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StaleReason::NeverCrawled => write!(f, "never crawled"),
            StaleReason::EmptyStore => write!(f, "no stored articles"),
            StaleReason::Expired { age } => write!(f, "last crawl {}h ago", age.as_secs() / 3600),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    Fresh { last_crawl: DateTime<Utc> },
    Stale(StaleReason),
}

/// Decides whether a source is due for a crawl.
#[derive(Debug, Clone, Copy)]
pub struct Scheduler {
    stale_after: Duration,
}

impl Scheduler {
    pub fn new(stale_after: Duration) -> Self {
        Self { stale_after }
    }

    pub fn freshness(
        &self,
        checkpoint: Option<&Checkpoint>,
        store_is_empty: bool,
        now: DateTime<Utc>,
    ) -> Freshness {
        let Some(checkpoint) = checkpoint else {
            return Freshness::Stale(StaleReason::NeverCrawled);
        };
        if store_is_empty {
            return Freshness::Stale(StaleReason::EmptyStore);
        }

        // A checkpoint in the future (clock skew) counts as fresh.
        match now.signed_duration_since(checkpoint.date).to_std() {
            Ok(age) if age > self.stale_after => Freshness::Stale(StaleReason::Expired { age }),
            _ => Freshness::Fresh {
                last_crawl: checkpoint.date,
            },
        }
    }

    pub fn should_crawl(
        &self,
        checkpoint: Option<&Checkpoint>,
        store_is_empty: bool,
        now: DateTime<Utc>,
    ) -> bool {
        matches!(
            self.freshness(checkpoint, store_is_empty, now),
            Freshness::Stale(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const DAY: u64 = 24 * 60 * 60;

    fn checkpoint(date: DateTime<Utc>) -> Checkpoint {
        Checkpoint {
            name: "rookie".to_string(),
            date,
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_threshold_boundaries() {
        let scheduler = Scheduler::new(Duration::from_secs(30 * DAY));
        let threshold = chrono::Duration::days(30);
        let one_second = chrono::Duration::seconds(1);

        let just_fresh = checkpoint(now() - threshold + one_second);
        assert!(!scheduler.should_crawl(Some(&just_fresh), false, now()));

        let exactly = checkpoint(now() - threshold);
        assert!(!scheduler.should_crawl(Some(&exactly), false, now()));

        let just_stale = checkpoint(now() - threshold - one_second);
        assert!(scheduler.should_crawl(Some(&just_stale), false, now()));
        assert!(matches!(
            scheduler.freshness(Some(&just_stale), false, now()),
            Freshness::Stale(StaleReason::Expired { .. })
        ));
    }

    #[test]
    fn test_missing_checkpoint_is_stale() {
        let scheduler = Scheduler::new(Duration::from_secs(5 * DAY));
        assert_eq!(
            scheduler.freshness(None, false, now()),
            Freshness::Stale(StaleReason::NeverCrawled)
        );
        assert!(scheduler.should_crawl(None, true, now()));
    }

    #[test]
    fn test_empty_store_overrides_recent_checkpoint() {
        let scheduler = Scheduler::new(Duration::from_secs(30 * DAY));
        let recent = checkpoint(now() - chrono::Duration::hours(1));
        assert_eq!(
            scheduler.freshness(Some(&recent), true, now()),
            Freshness::Stale(StaleReason::EmptyStore)
        );
        assert_eq!(
            scheduler.freshness(Some(&recent), false, now()),
            Freshness::Fresh {
                last_crawl: recent.date
            }
        );
    }

    #[test]
    fn test_future_checkpoint_is_fresh() {
        let scheduler = Scheduler::new(Duration::from_secs(DAY));
        let future = checkpoint(now() + chrono::Duration::hours(2));
        assert!(!scheduler.should_crawl(Some(&future), false, now()));
    }
}
