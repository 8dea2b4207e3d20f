//! The fixed-period reconciliation loop.
//!
//! # Overrun handling
//!
//! A cycle that runs longer than the period does not queue up a burst of
//! catch-up cycles. Missed deadlines are skipped and the next cycle starts
//! on the following period boundary, the same as
//! [`MissedTickBehavior::Skip`].
//!
//! # Where cycles run
//!
//! Each cycle is submitted to the [`WorkerPool`] as one job, so it holds a
//! worker permit for its whole run. If the pool has been closed the loop
//! stops; there is nowhere left to run.
//!
//! # Stopping
//!
//! Stop requests are only observed while the loop is waiting for the next
//! deadline. A cycle in progress always runs to the end, so no user is
//! ever left with half an update.

use std::sync::Arc;
use std::time::Duration;

use rolebridge_dispatch::{DispatchError, WorkerPool};
use rolebridge_identity::IdentityStore;
use serde::Deserialize;
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};

use crate::{CycleReport, PermissionSource, Reconciler, RoleDirectory};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// When the reconciliation loop runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SyncSchedule {
    /// Delay before the first cycle, so the host can finish starting up.
    pub warmup_secs: u64,
    /// Time between cycle starts.
    pub period_secs: u64,
}

impl Default for SyncSchedule {
    fn default() -> Self {
        Self {
            warmup_secs: 5,
            period_secs: 30,
        }
    }
}

impl SyncSchedule {
    /// Shortest allowed period.
    pub const MIN_PERIOD_SECS: u64 = 1;

    /// Clamp out-of-range values so the schedule is safe to use.
    ///
    /// A zero period would spin; it is raised to [`Self::MIN_PERIOD_SECS`].
    pub fn validated(mut self) -> Self {
        if self.period_secs < Self::MIN_PERIOD_SECS {
            tracing::warn!(
                period_secs = self.period_secs,
                min = Self::MIN_PERIOD_SECS,
                "sync period below minimum, clamping"
            );
            self.period_secs = Self::MIN_PERIOD_SECS;
        }
        self
    }

    pub fn warmup(&self) -> Duration {
        Duration::from_secs(self.warmup_secs)
    }

    pub fn period(&self) -> Duration {
        Duration::from_secs(self.period_secs)
    }
}

// ---------------------------------------------------------------------------
// Scheduler
// ---------------------------------------------------------------------------

/// Spawns the periodic reconciliation task.
pub struct RoleSyncScheduler;

impl RoleSyncScheduler {
    /// Starts the loop on the current runtime.
    ///
    /// Each cycle walks a snapshot of `identity` taken at cycle start, so
    /// links added mid-cycle are picked up next time.
    pub fn spawn<P, D>(
        reconciler: Arc<Reconciler<P, D>>,
        identity: Arc<IdentityStore>,
        workers: WorkerPool,
        schedule: SyncSchedule,
    ) -> SyncHandle
    where
        P: PermissionSource,
        D: RoleDirectory,
    {
        let schedule = schedule.validated();
        let (stop_tx, stop_rx) = oneshot::channel();
        let (report_tx, report_rx) = watch::channel(None);

        tracing::info!(
            warmup_secs = schedule.warmup_secs,
            period_secs = schedule.period_secs,
            governed = reconciler.governed().len(),
            "role sync scheduled"
        );

        let task = tokio::spawn(run_loop(
            reconciler, identity, workers, schedule, stop_rx, report_tx,
        ));

        SyncHandle {
            stop: Some(stop_tx),
            task,
            reports: report_rx,
        }
    }
}

async fn run_loop<P, D>(
    reconciler: Arc<Reconciler<P, D>>,
    identity: Arc<IdentityStore>,
    workers: WorkerPool,
    schedule: SyncSchedule,
    mut stop: oneshot::Receiver<()>,
    reports: watch::Sender<Option<CycleReport>>,
) where
    P: PermissionSource,
    D: RoleDirectory,
{
    let period = schedule.period();
    let mut ticker = time::interval_at(Instant::now() + schedule.warmup(), period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut cycle = 0u64;

    loop {
        let deadline = tokio::select! {
            biased;
            // Fires on an explicit stop or when the handle is dropped.
            _ = &mut stop => break,
            deadline = ticker.tick() => deadline,
        };

        cycle += 1;
        let late_by = Instant::now().saturating_duration_since(deadline);
        if late_by > period / 10 {
            tracing::warn!(
                cycle,
                late_ms = late_by.as_millis() as u64,
                "role sync cycle started late, skipping missed deadlines"
            );
        }

        let links = identity.snapshot();
        let job = Arc::clone(&reconciler);
        match workers.run_async(async move { job.run_cycle(&links).await }).await {
            Ok(Ok(mut report)) => {
                report.cycle = cycle;
                reports.send_replace(Some(report));
            }
            Ok(Err(DispatchError::PoolClosed)) => {
                tracing::warn!(cycle, "worker pool closed, role sync stopping");
                break;
            }
            Ok(Err(e)) => tracing::error!(cycle, error = %e, "role sync cycle not run"),
            Err(e) => tracing::error!(cycle, error = %e, "role sync cycle panicked"),
        }
    }

    tracing::info!(cycles = cycle, "role sync stopped");
}

/// Handle to a running reconciliation loop.
///
/// Dropping the handle stops the loop at the next cycle boundary, same as
/// [`stop`](Self::stop) without waiting.
#[derive(Debug)]
pub struct SyncHandle {
    stop: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
    reports: watch::Receiver<Option<CycleReport>>,
}

impl SyncHandle {
    /// The most recent cycle's report, or `None` before the first cycle.
    pub fn last_report(&self) -> Option<CycleReport> {
        self.reports.borrow().clone()
    }

    /// A receiver that sees every new report as it's published.
    pub fn subscribe(&self) -> watch::Receiver<Option<CycleReport>> {
        self.reports.clone()
    }

    /// `true` once the loop has exited.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Requests a stop and waits for the loop to exit. A cycle already in
    /// progress finishes first.
    pub async fn stop(mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        if let Err(e) = (&mut self.task).await {
            tracing::error!(error = %e, "role sync task panicked");
        }
    }
}
