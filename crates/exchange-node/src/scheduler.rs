//! Background market loops: drift, tribunal, midnight snapshot.
//!
//! Each loop is its own tokio task. A shared watch flag stops them: it is
//! checked between ticks, and every sleep races against it, so a tick that
//! has started always finishes.

use crate::engine::Market;
use exchange_core::schedule::{until_next_utc_midnight, ScheduleTimings};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Running scheduler tasks.
pub struct SchedulerHandle {
    stop: watch::Sender<bool>,
    tasks: Vec<JoinHandle<()>>,
}

impl SchedulerHandle {
    /// Start all three loops.
    pub fn start(market: Arc<Market>, timings: ScheduleTimings) -> Self {
        let mut handle = Self::idle();
        handle.spawn_drift(Arc::clone(&market), timings);
        handle.spawn_tribunal(Arc::clone(&market), timings);
        handle.spawn_midnight(market);
        handle
    }

    fn idle() -> Self {
        let (stop, _) = watch::channel(false);
        Self {
            stop,
            tasks: Vec::new(),
        }
    }

    fn spawn_drift(&mut self, market: Arc<Market>, timings: ScheduleTimings) {
        let stop = self.stop.subscribe();
        self.tasks
            .push(tokio::spawn(run_drift_loop(market, timings, stop)));
    }

    fn spawn_tribunal(&mut self, market: Arc<Market>, timings: ScheduleTimings) {
        let stop = self.stop.subscribe();
        self.tasks
            .push(tokio::spawn(run_tribunal_loop(market, timings, stop)));
    }

    fn spawn_midnight(&mut self, market: Arc<Market>) {
        let stop = self.stop.subscribe();
        self.tasks.push(tokio::spawn(run_midnight_loop(market, stop)));
    }

    /// Signal every loop to stop and wait for them to exit.
    pub async fn shutdown(self) {
        self.stop.send_replace(true);
        for task in self.tasks {
            if let Err(e) = task.await {
                tracing::error!("Scheduler task ended abnormally: {}", e);
            }
        }
        tracing::info!("Schedulers stopped");
    }
}

/// Sleep for `delay` unless asked to stop first. Returns false on stop.
async fn pause(delay: Duration, stop: &mut watch::Receiver<bool>) -> bool {
    tokio::select! {
        _ = tokio::time::sleep(delay) => !*stop.borrow(),
        _ = stop.changed() => false,
    }
}

async fn run_drift_loop(
    market: Arc<Market>,
    timings: ScheduleTimings,
    mut stop: watch::Receiver<bool>,
) {
    tracing::info!("Drift scheduler started");
    while !*stop.borrow() {
        match market.drift_tick() {
            Ok(report) => tracing::debug!(
                "Drift tick: {} updated, {} failed, halted={}",
                report.updated,
                report.failed,
                report.halted
            ),
            Err(e) => tracing::error!("Drift tick failed: {}", e),
        }

        let delay = timings.drift_delay(market.dice());
        if !pause(delay, &mut stop).await {
            break;
        }
    }
}

async fn run_tribunal_loop(
    market: Arc<Market>,
    timings: ScheduleTimings,
    mut stop: watch::Receiver<bool>,
) {
    tracing::info!("Tribunal scheduler started");
    while !*stop.borrow() {
        if let Err(e) = market.tribunal_tick() {
            tracing::error!("Tribunal tick failed: {}", e);
        }

        let delay = timings.tribunal_delay(market.dice());
        tracing::debug!("Next tribunal in {:?}", delay);
        if !pause(delay, &mut stop).await {
            break;
        }
    }
}

async fn run_midnight_loop(market: Arc<Market>, mut stop: watch::Receiver<bool>) {
    tracing::info!("Midnight snapshot scheduler started");
    while !*stop.borrow() {
        let delay = until_next_utc_midnight(market.now());
        if !pause(delay, &mut stop).await {
            break;
        }
        if let Err(e) = market.midnight_snapshot() {
            tracing::error!("Midnight snapshot failed: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::testkit::Harness;
    use chrono::TimeZone;
    use exchange_core::{EventKind, ScriptedDice};

    fn fixed_timings() -> ScheduleTimings {
        ScheduleTimings {
            drift_min: Duration::from_secs(60),
            drift_max: Duration::from_secs(60),
            tribunal_base: Duration::from_secs(600),
            tribunal_jitter: Duration::ZERO,
            tribunal_floor: Duration::from_secs(60),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn drift_loop_ticks_until_shutdown() {
        // 0.5 draws: magnitude 0.4%, coin lands up.
        let h = Harness::new(ScriptedDice::constant(0.5));
        let a = h.player("Citizen-0001");

        let mut handle = SchedulerHandle::idle();
        handle.spawn_drift(Arc::clone(&h.market), fixed_timings());

        // Ticks at 0s, 60s and 120s.
        tokio::time::sleep(Duration::from_secs(130)).await;
        assert_eq!(h.index_of(&a.citizen_id), 101.2);

        handle.shutdown().await;
        tokio::time::sleep(Duration::from_secs(600)).await;
        assert_eq!(h.index_of(&a.citizen_id), 101.2);
    }

    #[tokio::test(start_paused = true)]
    async fn tribunal_loop_runs_first_tick_immediately() {
        // 0.8 picks an Observation Halt every time.
        let h = Harness::new(ScriptedDice::constant(0.8));

        let mut handle = SchedulerHandle::idle();
        handle.spawn_tribunal(Arc::clone(&h.market), fixed_timings());

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(h.events_of(EventKind::ObservationHalt).len(), 1);

        tokio::time::sleep(Duration::from_secs(600)).await;
        assert_eq!(h.events_of(EventKind::ObservationHalt).len(), 2);

        handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn midnight_loop_waits_for_midnight() {
        let h = Harness::new(ScriptedDice::constant(0.5));
        h.clock
            .set(chrono::Utc.with_ymd_and_hms(2026, 3, 14, 23, 59, 0).unwrap());

        let mut handle = SchedulerHandle::idle();
        handle.spawn_midnight(Arc::clone(&h.market));

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert!(h.events_of(EventKind::MidnightSnapshot).is_empty());

        tokio::time::sleep(Duration::from_secs(31)).await;
        assert_eq!(h.events_of(EventKind::MidnightSnapshot).len(), 1);

        handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn start_and_shutdown_all_loops() {
        let h = Harness::new(ScriptedDice::constant(0.5));
        h.player("Citizen-0001");

        let handle = SchedulerHandle::start(Arc::clone(&h.market), fixed_timings());
        tokio::time::sleep(Duration::from_secs(5)).await;
        handle.shutdown().await;

        // 0.5 draws a Sector Crash on the opening tribunal tick.
        assert_eq!(h.events_of(EventKind::SectorCrash).len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn tribunal_loop_survives_a_failed_tick() {
        // 0.5 draws a Sector Crash, which reads the halt gate first.
        let h = Harness::new(ScriptedDice::constant(0.5));
        h.player("Citizen-0001");
        h.store.fail_system_reads(1);

        let mut handle = SchedulerHandle::idle();
        handle.spawn_tribunal(Arc::clone(&h.market), fixed_timings());

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(h.events_of(EventKind::SectorCrash).is_empty());

        tokio::time::sleep(Duration::from_secs(600)).await;
        assert_eq!(h.events_of(EventKind::SectorCrash).len(), 1);

        handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn drift_loop_survives_a_failed_tick() {
        let h = Harness::new(ScriptedDice::constant(0.5));
        let a = h.player("Citizen-0001");
        h.store.fail_system_reads(1);

        let mut handle = SchedulerHandle::idle();
        handle.spawn_drift(Arc::clone(&h.market), fixed_timings());

        // The opening tick fails; the ones at 60s and 120s land.
        tokio::time::sleep(Duration::from_secs(130)).await;
        assert_eq!(h.index_of(&a.citizen_id), 100.8);

        handle.shutdown().await;
    }
}
