//! Debounced, cancellation-safe snapshot recomputation.
//!
//! A UI changing filters quickly issues many recompute requests. Each
//! request bumps a generation counter; only the holder of the current
//! generation may write the cached snapshot.
//!
//! ```text
//! schedule_recompute ──► [generation += 1, abort previous task]
//!                              │
//!                              ▼
//!                     sleep(debounce)        (cancellable)
//!                              │
//!                              ▼
//!                  spawn_blocking(compute)   (polls generation between stages)
//!                              │
//!                              ▼
//!              commit if generation still current
//! ```
//!
//! Bumping the generation, replacing the task handle and committing a result
//! all happen under one lock, so a superseded computation can never
//! overwrite a fresher one.

use crate::analytics::{AnalyticsEngine, AnalyticsSnapshot};
use crate::config::SchedulerConfig;
use crate::error::{Error, Result};
use crate::types::{AttackRecord, DateRange, HealthEvent};
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Input for one recomputation, shareable with the worker thread.
#[derive(Debug, Clone)]
pub struct RecomputeRequest {
    pub attacks: Arc<Vec<AttackRecord>>,
    pub events: Arc<Vec<HealthEvent>>,
    pub range: DateRange,
}

impl RecomputeRequest {
    pub fn new(attacks: Vec<AttackRecord>, events: Vec<HealthEvent>, range: DateRange) -> Self {
        Self {
            attacks: Arc::new(attacks),
            events: Arc::new(events),
            range,
        }
    }
}

/// A committed snapshot and the request generation that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct CachedSnapshot {
    pub generation: u64,
    pub snapshot: AnalyticsSnapshot,
    pub computed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SchedulerStats {
    pub requested: u64,
    pub completed: u64,
    pub cancelled: u64,
}

type Cache = Option<Arc<CachedSnapshot>>;

/// A spawned recompute and whether its outcome has been counted.
struct Pending {
    task: JoinHandle<()>,
    settled: Arc<AtomicBool>,
}

struct Inner {
    engine: AnalyticsEngine,
    debounce: Duration,
    generation: AtomicU64,
    /// In-flight task; also serializes generation bumps and commits
    slot: Mutex<Option<Pending>>,
    cache: watch::Sender<Cache>,
    requested: AtomicU64,
    completed: AtomicU64,
    cancelled: AtomicU64,
}

impl Inner {
    fn lock_slot(&self) -> MutexGuard<'_, Option<Pending>> {
        self.slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn is_current(&self, generation: u64) -> bool {
        self.generation.load(Ordering::SeqCst) == generation
    }

    /// Count a cancellation unless this task's outcome was already counted.
    fn settle_cancelled(&self, settled: &AtomicBool) {
        if !settled.swap(true, Ordering::SeqCst) {
            self.cancelled.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Issue a new generation and abort whatever was in flight.
    ///
    /// A task that already committed keeps its `completed` count.
    fn supersede(&self, slot: &mut Option<Pending>) -> u64 {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.requested.fetch_add(1, Ordering::Relaxed);
        if let Some(pending) = slot.take() {
            pending.task.abort();
            if !pending.settled.swap(true, Ordering::SeqCst) {
                self.cancelled.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(generation, "Superseded pending recompute");
            }
        }
        generation
    }

    async fn run(
        self: Arc<Self>,
        generation: u64,
        request: RecomputeRequest,
        debounce: Option<Duration>,
        settled: Arc<AtomicBool>,
    ) -> Option<Arc<CachedSnapshot>> {
        if let Some(delay) = debounce {
            tokio::time::sleep(delay).await;
        }
        if !self.is_current(generation) {
            self.settle_cancelled(&settled);
            return None;
        }

        let worker = Arc::clone(&self);
        let computed = tokio::task::spawn_blocking(move || {
            let cancel = || !worker.is_current(generation);
            worker.engine.compute_records_cancellable(
                &request.attacks,
                &request.events,
                &request.range,
                &cancel,
            )
        })
        .await;

        match computed {
            Ok(Ok(snapshot)) => self.commit(generation, snapshot, &settled),
            Ok(Err(Error::Cancelled)) => {
                self.settle_cancelled(&settled);
                tracing::debug!(generation, "Recompute cancelled mid-computation");
                None
            }
            Ok(Err(e)) => {
                settled.store(true, Ordering::SeqCst);
                tracing::warn!(generation, error = %e, "Recompute failed");
                None
            }
            Err(e) => {
                settled.store(true, Ordering::SeqCst);
                tracing::warn!(generation, error = %e, "Recompute worker did not finish");
                None
            }
        }
    }

    fn commit(
        &self,
        generation: u64,
        snapshot: AnalyticsSnapshot,
        settled: &AtomicBool,
    ) -> Option<Arc<CachedSnapshot>> {
        let _slot = self.lock_slot();
        if !self.is_current(generation) {
            self.settle_cancelled(settled);
            tracing::debug!(generation, "Discarding stale snapshot");
            return None;
        }
        let cached = Arc::new(CachedSnapshot {
            generation,
            snapshot,
            computed_at: Utc::now(),
        });
        self.cache.send_replace(Some(Arc::clone(&cached)));
        self.completed.fetch_add(1, Ordering::Relaxed);
        settled.store(true, Ordering::SeqCst);
        tracing::info!(
            generation,
            attacks = cached.snapshot.totals.attacks,
            "Snapshot cache updated"
        );
        Some(cached)
    }
}

/// Owns the single cached snapshot and at most one in-flight recompute.
pub struct RecomputeScheduler {
    inner: Arc<Inner>,
    runtime: Handle,
}

impl RecomputeScheduler {
    /// Create a scheduler on the current tokio runtime.
    ///
    /// Fails with [`Error::Runtime`] outside a runtime context.
    pub fn new(engine: AnalyticsEngine, debounce: Duration) -> Result<Self> {
        let runtime = Handle::try_current()
            .map_err(|e| Error::Runtime(format!("no tokio runtime for recompute scheduler: {e}")))?;
        let (cache, _) = watch::channel(None);
        Ok(Self {
            inner: Arc::new(Inner {
                engine,
                debounce,
                generation: AtomicU64::new(0),
                slot: Mutex::new(None),
                cache,
                requested: AtomicU64::new(0),
                completed: AtomicU64::new(0),
                cancelled: AtomicU64::new(0),
            }),
            runtime,
        })
    }

    pub fn from_config(engine: AnalyticsEngine, config: &SchedulerConfig) -> Result<Self> {
        Self::new(engine, config.debounce())
    }

    /// Queue a debounced recompute, superseding any pending one.
    ///
    /// Returns the request's generation.
    pub fn schedule_recompute(&self, request: RecomputeRequest) -> u64 {
        let mut slot = self.inner.lock_slot();
        let generation = self.inner.supersede(&mut slot);
        let inner = Arc::clone(&self.inner);
        let debounce = self.inner.debounce;
        let settled = Arc::new(AtomicBool::new(false));
        let task_settled = Arc::clone(&settled);
        let task = self.runtime.spawn(async move {
            inner
                .run(generation, request, Some(debounce), task_settled)
                .await;
        });
        *slot = Some(Pending { task, settled });
        generation
    }

    /// Recompute without the debounce delay.
    ///
    /// Still supersedes pending work; returns `None` if a newer request
    /// arrives before this one commits.
    pub async fn recompute_now(&self, request: RecomputeRequest) -> Option<Arc<CachedSnapshot>> {
        let generation = {
            let mut slot = self.inner.lock_slot();
            self.inner.supersede(&mut slot)
        };
        Arc::clone(&self.inner)
            .run(generation, request, None, Arc::new(AtomicBool::new(false)))
            .await
    }

    /// Watch the cache for updates.
    pub fn subscribe(&self) -> watch::Receiver<Cache> {
        self.inner.cache.subscribe()
    }

    /// The most recently committed snapshot.
    pub fn latest(&self) -> Option<Arc<CachedSnapshot>> {
        self.inner.cache.borrow().clone()
    }

    pub fn current_generation(&self) -> u64 {
        self.inner.generation.load(Ordering::SeqCst)
    }

    pub fn stats(&self) -> SchedulerStats {
        SchedulerStats {
            requested: self.inner.requested.load(Ordering::Relaxed),
            completed: self.inner.completed.load(Ordering::Relaxed),
            cancelled: self.inner.cancelled.load(Ordering::Relaxed),
        }
    }
}

impl Drop for RecomputeScheduler {
    fn drop(&mut self) {
        if let Some(pending) = self.inner.lock_slot().take() {
            pending.task.abort();
        }
    }
}
