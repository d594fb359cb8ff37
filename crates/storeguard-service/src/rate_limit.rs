//! Per-identifier rate limiting with windowed counters and escalating blocks.
//!
//! Transport-agnostic core. The HTTP crate extracts the client identifier
//! and calls `check()`; the sweeper calls `sweep()` on its own schedule.
//!
//! State for an (action, identifier) pair lives in a `DashMap` entry and is
//! only ever mutated while that entry's shard lock is held, so a
//! read-modify-write never interleaves with another check, a reset or a
//! sweep of the same key.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

use crate::error::{ServiceError, ServiceResult};
use crate::metrics::Metrics;
use crate::policy::{ActionKind, Policy, PolicyTable};

/// Limiting state for one (action, identifier) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitEntry {
    /// Attempts observed in the current window.
    pub count: u32,
    /// When the current counting window ends.
    pub window_reset_at: Instant,
    pub blocked: bool,
    /// When the block lifts. Only meaningful while `blocked`.
    pub block_expires_at: Instant,
}

impl RateLimitEntry {
    fn fresh(now: Instant, policy: &Policy) -> Self {
        Self {
            count: 1,
            window_reset_at: deadline(now, policy.window),
            blocked: false,
            block_expires_at: now,
        }
    }

    fn is_blocked_at(&self, now: Instant) -> bool {
        self.blocked && now < self.block_expires_at
    }

    /// Eviction rule used by the sweeper.
    fn is_stale_at(&self, now: Instant) -> bool {
        if self.blocked {
            now > self.block_expires_at
        } else {
            now > self.window_reset_at
        }
    }
}

/// `now + span`, clamped to the furthest instant the platform can represent.
fn deadline(now: Instant, span: Duration) -> Instant {
    now.checked_add(span)
        .or_else(|| now.checked_add(Duration::from_secs(crate::policy::MAX_POLICY_SECS)))
        .unwrap_or(now)
}

/// Outcome of an admission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitDecision {
    pub allowed: bool,
    /// Attempts left in the current window (0 when denied).
    pub remaining: u32,
    /// End of the window when allowed, end of the block when denied.
    pub reset_at: Instant,
    pub blocked: bool,
}

impl RateLimitDecision {
    fn allow(remaining: u32, reset_at: Instant) -> Self {
        Self {
            allowed: true,
            remaining,
            reset_at,
            blocked: false,
        }
    }

    fn deny(block_expires_at: Instant) -> Self {
        Self {
            allowed: false,
            remaining: 0,
            reset_at: block_expires_at,
            blocked: true,
        }
    }

    /// Time until `reset_at`, zero if already passed.
    pub fn retry_after(&self, now: Instant) -> Duration {
        self.reset_at.saturating_duration_since(now)
    }

    /// Whole minutes until `reset_at`, rounded up.
    pub fn retry_after_minutes(&self, now: Instant) -> u64 {
        self.retry_after(now).as_millis().div_ceil(60_000) as u64
    }

    /// Converts a denial into the matching service error.
    pub fn into_result(self) -> ServiceResult<Self> {
        if self.allowed {
            Ok(self)
        } else {
            Err(ServiceError::RateLimitExceeded {
                reset_at: self.reset_at,
                blocked: self.blocked,
            })
        }
    }
}

type Key = (ActionKind, String);

/// In-memory rate-limit store shared by every request handler.
#[derive(Clone)]
pub struct RateLimitStore {
    inner: Arc<StoreInner>,
}

struct StoreInner {
    policies: PolicyTable,
    entries: DashMap<Key, RateLimitEntry>,
    metrics: Arc<Metrics>,
}

impl RateLimitStore {
    pub fn new(policies: PolicyTable, metrics: Arc<Metrics>) -> Self {
        Self {
            inner: Arc::new(StoreInner {
                policies,
                entries: DashMap::new(),
                metrics,
            }),
        }
    }

    pub fn policies(&self) -> &PolicyTable {
        &self.inner.policies
    }

    /// `check_and_consume` at the current instant.
    pub fn check(&self, identifier: &str, kind: ActionKind) -> ServiceResult<RateLimitDecision> {
        self.check_and_consume(identifier, kind, Instant::now())
    }

    /// Counts one attempt for `identifier` and decides whether it is admitted.
    pub fn check_and_consume(
        &self,
        identifier: &str,
        kind: ActionKind,
        now: Instant,
    ) -> ServiceResult<RateLimitDecision> {
        let policy = self.inner.policies.lookup(kind)?;
        self.inner.metrics.record_check(kind);

        let mut entry = match self.inner.entries.entry((kind, identifier.to_string())) {
            Entry::Vacant(vacant) => {
                let fresh = RateLimitEntry::fresh(now, &policy);
                vacant.insert(fresh);
                return Ok(RateLimitDecision::allow(
                    policy.max_attempts.saturating_sub(1),
                    fresh.window_reset_at,
                ));
            }
            Entry::Occupied(occupied) => occupied.into_ref(),
        };
        let state = entry.value_mut();

        if state.blocked {
            if now < state.block_expires_at {
                self.inner.metrics.record_denied(kind);
                tracing::warn!(identifier, action = %kind, "Request denied, block still active");
                return Ok(RateLimitDecision::deny(state.block_expires_at));
            }
            // Block lifted: restart from an empty window.
            state.blocked = false;
            state.count = 0;
            state.window_reset_at = deadline(now, policy.window);
        }

        if now > state.window_reset_at {
            state.count = 1;
            state.window_reset_at = deadline(now, policy.window);
        } else {
            state.count = state.count.saturating_add(1);
        }

        if state.count > policy.max_attempts {
            state.blocked = true;
            state.block_expires_at = deadline(now, policy.block_duration);
            self.inner.metrics.record_denied(kind);
            self.inner.metrics.record_block(kind);
            tracing::warn!(
                identifier,
                action = %kind,
                attempts = state.count,
                block_secs = policy.block_duration.as_secs(),
                "Rate limit exceeded, identifier blocked"
            );
            return Ok(RateLimitDecision::deny(state.block_expires_at));
        }

        Ok(RateLimitDecision::allow(
            policy.max_attempts.saturating_sub(state.count),
            state.window_reset_at,
        ))
    }

    /// Deletes the entry for the pair, lifting any block.
    pub fn reset(&self, identifier: &str, kind: ActionKind) -> bool {
        let removed = self
            .inner
            .entries
            .remove(&(kind, identifier.to_string()))
            .is_some();
        if removed {
            tracing::info!(identifier, action = %kind, "Rate limit entry reset");
        }
        removed
    }

    /// Read-only peek: is the pair blocked at `now`?
    pub fn is_blocked(&self, identifier: &str, kind: ActionKind, now: Instant) -> bool {
        self.inner
            .entries
            .get(&(kind, identifier.to_string()))
            .is_some_and(|entry| entry.is_blocked_at(now))
    }

    /// Returns a copy of the entry for the pair, if tracked.
    pub fn entry(&self, identifier: &str, kind: ActionKind) -> Option<RateLimitEntry> {
        self.inner
            .entries
            .get(&(kind, identifier.to_string()))
            .map(|entry| *entry.value())
    }

    /// Number of tracked entries per action kind. Kinds with none are omitted.
    pub fn stats_by_action_kind(&self) -> BTreeMap<ActionKind, usize> {
        let mut stats = BTreeMap::new();
        for item in &self.inner.entries {
            *stats.entry(item.key().0).or_insert(0) += 1;
        }
        stats
    }

    /// Evicts entries whose window (or block) has elapsed. Returns count removed.
    pub fn sweep(&self, now: Instant) -> usize {
        let mut removed = 0;
        self.inner.entries.retain(|_, entry| {
            let stale = entry.is_stale_at(now);
            removed += usize::from(stale);
            !stale
        });
        self.inner.metrics.record_swept(removed);
        removed
    }

    pub fn len(&self) -> usize {
        self.inner.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.entries.is_empty()
    }
}
