//! Server-state cache.
//!
//! Query results are cached per [`QueryKey`]; mutations invalidate whole
//! families. A per-family generation counter makes sure a fetch that was
//! in flight across an invalidation does not repopulate the cache with
//! data the mutation just made stale.

use desk_core::Result;
use moka::future::Cache;
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use telemetry::metrics;
use tracing::debug;

/// Cache families, matching the resource they hold.
pub mod families {
    pub const APPROVAL_TASKS: &str = "approval-tasks";
    pub const APPROVAL_OVERVIEW: &str = "approval-overview";
    pub const APPROVAL_STAGE_SUMMARY: &str = "approval-stage-summary";
    pub const APPROVAL_HISTORY: &str = "approval-history";
    pub const CONTRACTS: &str = "contracts";
    pub const DASHBOARD: &str = "dashboard";
    pub const USERS: &str = "users";
    pub const PROFILE: &str = "profile";
    pub const NOTIFICATIONS: &str = "notifications";
    pub const UNREAD_COUNT: &str = "unread-count";
    pub const ANNOUNCEMENTS: &str = "announcements";
    pub const SETTINGS: &str = "settings";
}

/// Generation slot bumped by [`QueryCache::clear`].
const ALL_FAMILIES: &str = "*";

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueryKey {
    pub family: &'static str,
    pub params: String,
}

impl QueryKey {
    pub fn new(family: &'static str, params: impl Into<String>) -> Self {
        Self {
            family,
            params: params.into(),
        }
    }

    /// Key with no parameters.
    pub fn family(family: &'static str) -> Self {
        Self::new(family, "")
    }

    fn cache_key(&self) -> String {
        format!("{}:{}", self.family, self.params)
    }
}

#[derive(Clone)]
pub struct QueryCache {
    entries: Cache<String, Arc<serde_json::Value>>,
    generations: Arc<Mutex<HashMap<&'static str, u64>>>,
}

impl QueryCache {
    pub fn new(max_capacity: u64, time_to_live: Duration) -> Self {
        Self {
            entries: Cache::builder()
                .max_capacity(max_capacity)
                .time_to_live(time_to_live)
                .build(),
            generations: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Family generation plus the clear count; both only grow.
    fn generation(&self, family: &'static str) -> u64 {
        let generations = self.generations.lock();
        let of = |name: &str| generations.get(name).copied().unwrap_or(0);
        of(family) + of(ALL_FAMILIES)
    }

    /// Serve from cache, or fetch and store.
    pub async fn get_or_fetch<T, F>(&self, key: QueryKey, fetch: F) -> Result<T>
    where
        T: Serialize + DeserializeOwned,
        F: Future<Output = Result<T>>,
    {
        if let Some(hit) = self.entries.get(&key.cache_key()).await {
            match serde_json::from_value::<T>(hit.as_ref().clone()) {
                Ok(value) => {
                    metrics().cache_hits.inc();
                    debug!(family = key.family, "Query cache hit");
                    return Ok(value);
                }
                Err(e) => debug!(error = %e, family = key.family, "Cached value has another shape, refetching"),
            }
        }
        metrics().cache_misses.inc();
        self.fetch_and_store(key, fetch).await
    }

    /// Always fetch; store the result unless the family was invalidated
    /// while the fetch ran.
    pub async fn fetch_and_store<T, F>(&self, key: QueryKey, fetch: F) -> Result<T>
    where
        T: Serialize + DeserializeOwned,
        F: Future<Output = Result<T>>,
    {
        let generation = self.generation(key.family);
        let value = fetch.await?;
        self.store_if_current(&key, generation, serde_json::to_value(&value)?)
            .await;
        Ok(value)
    }

    /// Insert `value` only while the family is still at `generation`.
    ///
    /// The generation is checked again after the insert, since an
    /// invalidation can land between the first check and the write.
    async fn store_if_current(
        &self,
        key: &QueryKey,
        generation: u64,
        value: serde_json::Value,
    ) -> bool {
        if self.generation(key.family) == generation {
            let cache_key = key.cache_key();
            self.entries.insert(cache_key.clone(), Arc::new(value)).await;
            if self.generation(key.family) == generation {
                return true;
            }
            self.entries.invalidate(&cache_key).await;
        }
        metrics().stale_responses_dropped.inc();
        debug!(family = key.family, "Family invalidated during fetch, not caching");
        false
    }

    /// Drop every entry of `family`.
    pub async fn invalidate_family(&self, family: &'static str) {
        *self.generations.lock().entry(family).or_insert(0) += 1;
        let prefix = format!("{}:", family);
        let doomed: Vec<Arc<String>> = self
            .entries
            .iter()
            .filter(|(key, _)| key.starts_with(&prefix))
            .map(|(key, _)| key)
            .collect();
        for key in doomed {
            self.entries.invalidate(key.as_ref()).await;
        }
        debug!(family, "Query family invalidated");
    }

    /// Drop one entry; bumps the family generation too.
    pub async fn invalidate(&self, key: &QueryKey) {
        *self.generations.lock().entry(key.family).or_insert(0) += 1;
        self.entries.invalidate(&key.cache_key()).await;
    }

    pub async fn invalidate_families(&self, families: &[&'static str]) {
        for family in families {
            self.invalidate_family(family).await;
        }
    }

    pub fn contains(&self, key: &QueryKey) -> bool {
        self.entries.contains_key(&key.cache_key())
    }

    /// Drop everything (logout).
    pub fn clear(&self) {
        *self.generations.lock().entry(ALL_FAMILIES).or_insert(0) += 1;
        self.entries.invalidate_all();
    }
}

/// Ticket for one fetch into a [`LatestSlot`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct SlotTicket(u64);

struct SlotState<T> {
    issued: u64,
    applied: u64,
    value: Option<T>,
}

/// Holds displayed state and discards responses older than the one
/// already shown.
pub struct LatestSlot<T> {
    state: Mutex<SlotState<T>>,
}

impl<T: Clone> Default for LatestSlot<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone> LatestSlot<T> {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(SlotState {
                issued: 0,
                applied: 0,
                value: None,
            }),
        }
    }

    pub fn issue(&self) -> SlotTicket {
        let mut state = self.state.lock();
        state.issued += 1;
        SlotTicket(state.issued)
    }

    /// Apply `value` unless a newer ticket was already applied.
    pub fn accept(&self, ticket: SlotTicket, value: T) -> bool {
        let mut state = self.state.lock();
        if ticket.0 < state.applied {
            metrics().stale_responses_dropped.inc();
            debug!(ticket = ticket.0, applied = state.applied, "Discarding superseded response");
            return false;
        }
        state.applied = ticket.0;
        state.value = Some(value);
        true
    }

    pub fn get(&self) -> Option<T> {
        self.state.lock().value.clone()
    }

    pub fn clear(&self) {
        self.state.lock().value = None;
    }
}
