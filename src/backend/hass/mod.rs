pub mod cache;
pub mod client;
pub mod search;

use std::sync::Arc;

use tokio::time::{Duration, MissedTickBehavior, interval};

use self::cache::EntityCache;

/// Fixed-interval poll loop driving cache refreshes for the process
/// lifetime. The bootstrap refresh has already run synchronously during
/// startup, so the cache is warm before the server accepts requests.
pub async fn poll_loop(cache: Arc<EntityCache>, poll_interval_secs: u32) {
    let mut tick = interval(Duration::from_secs(u64::from(poll_interval_secs)));
    tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
    // The first tick completes immediately; skip it, bootstrap covered it.
    tick.tick().await;

    loop {
        tick.tick().await;
        cache.refresh().await;
    }
}
