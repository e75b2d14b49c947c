use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use moka::future::Cache;
use sea_orm::DatabaseConnection;

use crate::config::{CacheConfig, PaginationConfig};
use crate::models::poll::PollDetailView;

#[derive(Clone)]
pub struct AppState {
    pub database: DatabaseConnection,
    pub cache: Arc<ApiCache>,
    pub pagination: PaginationConfig,
    pub start_time: Instant,
}

impl AppState {
    pub fn new(
        database: DatabaseConnection,
        cache: Arc<ApiCache>,
        pagination: PaginationConfig,
    ) -> Self {
        assert!(
            pagination.default_limit <= pagination.max_limit,
            "Pagination bounds must be ordered"
        );
        Self {
            database,
            cache,
            pagination,
            start_time: Instant::now(),
        }
    }
}

/// Read-through cache of assembled poll trees. Any write below a poll must
/// invalidate its entry.
///
/// Readers capture [`ApiCache::poll_epoch`] before loading from the database
/// and hand it back to [`ApiCache::store_poll_detail`]; a tree loaded before an
/// invalidation is never left behind in the cache.
pub struct ApiCache {
    pub poll_details: Cache<i32, Arc<PollDetailView>>,
    pub poll_capacity: u64,
    epoch: AtomicU64,
}

impl ApiCache {
    pub fn new(config: &CacheConfig) -> Self {
        assert!(
            config.polls_max_capacity >= 10,
            "Poll cache capacity threshold"
        );

        let poll_details = Cache::builder()
            .max_capacity(config.polls_max_capacity)
            .time_to_live(Duration::from_secs(config.polls_ttl_seconds))
            .time_to_idle(Duration::from_secs(config.polls_ttl_seconds / 2 + 1))
            .build();

        Self {
            poll_details,
            poll_capacity: config.polls_max_capacity,
            epoch: AtomicU64::new(0),
        }
    }

    pub fn poll_epoch(&self) -> u64 {
        self.epoch.load(Ordering::Acquire)
    }

    pub async fn store_poll_detail(
        &self,
        poll_id: i32,
        detail: Arc<PollDetailView>,
        read_epoch: u64,
    ) {
        if self.poll_epoch() != read_epoch {
            return;
        }
        self.poll_details.insert(poll_id, detail).await;
        // An invalidation may have landed between the check and the insert.
        if self.poll_epoch() != read_epoch {
            self.poll_details.invalidate(&poll_id).await;
        }
    }

    pub async fn invalidate_poll(&self, poll_id: i32) {
        self.epoch.fetch_add(1, Ordering::AcqRel);
        self.poll_details.invalidate(&poll_id).await;
    }
}
