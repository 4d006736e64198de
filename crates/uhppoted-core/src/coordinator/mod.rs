// ── Coordinators ──
//
// Each coordinator owns a keyed snapshot and refreshes it on its own
// timer. A tick fans requests out over a bounded number of concurrent
// workers, collects every result locally, and only merges them into the
// snapshot once the whole tick has finished inside its time budget.

pub mod doors;
pub mod events;
pub mod info;

use std::future::Future;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures_util::StreamExt;
use serde::Serialize;
use strum::{Display, EnumIter, EnumString};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::CoreError;

/// Which coordinator a status or log line refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter, Serialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum CoordinatorKind {
    Doors,
    Events,
    Info,
}

// ── CoordinatorStatus ────────────────────────────────────────────────

/// Health of a coordinator's snapshot, observable by consumers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CoordinatorStatus {
    pub last_success: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    /// The last tick failed; the snapshot holds data from an earlier tick.
    pub stale: bool,
}

pub(crate) struct StatusCell {
    kind: CoordinatorKind,
    tx: watch::Sender<CoordinatorStatus>,
}

impl StatusCell {
    pub(crate) fn new(kind: CoordinatorKind) -> Self {
        let (tx, _) = watch::channel(CoordinatorStatus::default());
        Self { kind, tx }
    }

    pub(crate) fn subscribe(&self) -> watch::Receiver<CoordinatorStatus> {
        self.tx.subscribe()
    }

    pub(crate) fn current(&self) -> CoordinatorStatus {
        self.tx.borrow().clone()
    }

    /// Record the outcome of a tick.
    pub(crate) fn record(&self, result: &Result<(), CoreError>) {
        match result {
            Ok(()) => self.tx.send_modify(|s| {
                s.last_success = Some(Utc::now());
                s.last_error = None;
                s.stale = false;
            }),
            Err(e) => {
                warn!(coordinator = %self.kind, error = %e, "update failed, keeping previous snapshot");
                self.tx.send_modify(|s| {
                    s.last_error = Some(e.to_string());
                    s.stale = true;
                });
            }
        }
    }
}

// ── Tick helpers ─────────────────────────────────────────────────────

/// Run `work` inside the tick budget. An overrunning tick is dropped, along
/// with every in-flight worker, and reported as [`CoreError::TickTimeout`].
pub(crate) async fn within_budget<T>(
    kind: CoordinatorKind,
    budget: Duration,
    work: impl Future<Output = T>,
) -> Result<T, CoreError> {
    tokio::time::timeout(budget, work)
        .await
        .map_err(|_| CoreError::TickTimeout {
            coordinator: kind.to_string(),
            timeout_ms: millis(budget),
        })
}

/// Apply `f` to every item with at most `limit` futures in flight.
pub(crate) async fn fan_out<I, F, Fut>(items: I, limit: usize, f: F) -> Vec<Fut::Output>
where
    I: IntoIterator,
    F: FnMut(I::Item) -> Fut,
    Fut: Future,
{
    futures_util::stream::iter(items)
        .map(f)
        .buffer_unordered(limit.max(1))
        .collect()
        .await
}

/// Bound a single controller call by the per-call timeout.
pub(crate) async fn call<T, E>(
    controller: u32,
    timeout: Duration,
    request: impl Future<Output = Result<T, E>>,
) -> Result<T, CoreError>
where
    CoreError: From<E>,
{
    match tokio::time::timeout(timeout, request).await {
        Ok(result) => result.map_err(CoreError::from),
        Err(_) => Err(CoreError::Timeout {
            controller,
            timeout_ms: millis(timeout),
        }),
    }
}

pub(crate) fn millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

// ── Background poll loop ─────────────────────────────────────────────

/// Run `tick` every `period` until cancelled. The first tick fires
/// immediately. Failures are already recorded by the coordinator; the loop
/// just carries on with the next interval.
pub(crate) async fn poll_task<F, Fut>(
    kind: CoordinatorKind,
    period: Duration,
    cancel: CancellationToken,
    mut tick: F,
) where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<(), CoreError>>,
{
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            _ = interval.tick() => {
                debug!(coordinator = %kind, "tick");
                let _ = tick().await;
            }
        }
    }

    debug!(coordinator = %kind, "poll task exiting");
}
