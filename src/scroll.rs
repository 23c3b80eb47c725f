use anyhow::Result;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info};

/// Bounded retry policy for the results-feed scroll loop.
///
/// Google Maps lazy-loads listings; the only "no more results" signal is the
/// feed's scrollHeight repeatedly failing to grow, so a stall budget stands in
/// for a real termination condition.
pub struct ScrollPolicy {
    pub target_count: usize,
    pub max_stalls: u32,
    pub settle: Duration,
}

impl ScrollPolicy {
    pub fn for_target(target_count: usize) -> Self {
        Self {
            target_count,
            max_stalls: 50,
            settle: Duration::from_secs(1),
        }
    }
}

/// Boundary into the live page. Each method is one synchronous evaluate call
/// carrying plain serializable values; no DOM handles cross this trait.
pub trait FeedDriver {
    fn feed_present(&self) -> Result<bool>;
    fn item_count(&self) -> Result<usize>;
    fn scroll_extent(&self) -> Result<i64>;
    fn scroll_to_end(&self) -> Result<()>;
}

struct ScrollState {
    last_extent: i64,
    stalls: u32,
}

/// Scroll the results feed until `target_count` items are loaded or the feed
/// stops growing. A stall is a normal termination, not an error; only driver
/// failures (the evaluate boundary itself breaking) propagate.
pub async fn scroll_until<D: FeedDriver>(driver: &D, policy: &ScrollPolicy) -> Result<()> {
    if !driver.feed_present()? {
        debug!("No results feed on page, nothing to scroll");
        return Ok(());
    }

    let mut state = ScrollState {
        last_extent: 0,
        stalls: 0,
    };

    loop {
        let count = driver.item_count()?;
        if count >= policy.target_count {
            info!("Feed holds {} items, target {} reached", count, policy.target_count);
            return Ok(());
        }

        driver.scroll_to_end()?;
        sleep(policy.settle).await;

        let extent = driver.scroll_extent()?;
        if extent == state.last_extent {
            state.stalls += 1;
            if state.stalls >= policy.max_stalls {
                info!(
                    "Feed stopped growing after {} items ({} stalled iterations)",
                    count, state.stalls
                );
                return Ok(());
            }
        } else {
            state.stalls = 0;
            state.last_extent = extent;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    /// In-memory feed: each scroll loads `per_scroll` more items up to `max_items`,
    /// after which the extent freezes.
    struct FakeFeed {
        present: bool,
        initial: usize,
        per_scroll: usize,
        max_items: usize,
        scrolls: Cell<usize>,
    }

    impl FakeFeed {
        fn loaded(&self) -> usize {
            (self.initial + self.scrolls.get() * self.per_scroll).min(self.max_items)
        }
    }

    impl FeedDriver for FakeFeed {
        fn feed_present(&self) -> Result<bool> {
            Ok(self.present)
        }
        fn item_count(&self) -> Result<usize> {
            Ok(self.loaded())
        }
        fn scroll_extent(&self) -> Result<i64> {
            Ok(self.loaded() as i64 * 100)
        }
        fn scroll_to_end(&self) -> Result<()> {
            self.scrolls.set(self.scrolls.get() + 1);
            Ok(())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn stops_once_target_is_loaded() {
        let feed = FakeFeed {
            present: true,
            initial: 0,
            per_scroll: 5,
            max_items: 100,
            scrolls: Cell::new(0),
        };
        scroll_until(&feed, &ScrollPolicy::for_target(20)).await.unwrap();
        assert_eq!(feed.scrolls.get(), 4);
        assert!(feed.loaded() >= 20);
    }

    #[tokio::test(start_paused = true)]
    async fn no_scrolling_when_target_already_met() {
        let feed = FakeFeed {
            present: true,
            initial: 25,
            per_scroll: 5,
            max_items: 100,
            scrolls: Cell::new(0),
        };
        scroll_until(&feed, &ScrollPolicy::for_target(20)).await.unwrap();
        assert_eq!(feed.scrolls.get(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn terminates_after_stall_budget() {
        // Feed tops out at 10 items; target is never reachable.
        let feed = FakeFeed {
            present: true,
            initial: 0,
            per_scroll: 5,
            max_items: 10,
            scrolls: Cell::new(0),
        };
        scroll_until(&feed, &ScrollPolicy::for_target(100)).await.unwrap();
        // Two growth iterations, then 50 consecutive no-growth iterations.
        assert_eq!(feed.scrolls.get(), 52);
    }

    #[tokio::test(start_paused = true)]
    async fn absent_feed_is_a_no_op() {
        let feed = FakeFeed {
            present: false,
            initial: 0,
            per_scroll: 5,
            max_items: 100,
            scrolls: Cell::new(0),
        };
        scroll_until(&feed, &ScrollPolicy::for_target(20)).await.unwrap();
        assert_eq!(feed.scrolls.get(), 0);
    }
}
