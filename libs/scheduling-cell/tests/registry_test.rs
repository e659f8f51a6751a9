use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use scheduling_cell::services::registry::{
    duration_until_next, JobCadence, JobReport, JobScheduler, ScheduledJob,
};

fn utc(s: &str) -> DateTime<Utc> {
    s.parse().unwrap()
}

// ==============================================================================
// TICK TIMING
// ==============================================================================

#[test]
fn next_tick_is_later_this_hour() {
    let now = utc("2026-08-06T10:03:00Z");
    assert_eq!(duration_until_next(now, 5), Duration::from_secs(120));
}

#[test]
fn next_tick_wraps_to_the_next_hour() {
    let now = utc("2026-08-06T10:30:00Z");
    assert_eq!(duration_until_next(now, 5), Duration::from_secs(35 * 60));
}

#[test]
fn exact_match_waits_a_full_hour() {
    // A tick never fires twice for the same wall-clock minute.
    let now = utc("2026-08-06T10:05:00Z");
    assert_eq!(duration_until_next(now, 5), Duration::from_secs(3600));
}

#[test]
fn out_of_range_minute_is_clamped() {
    let now = utc("2026-08-06T10:00:00Z");
    assert_eq!(duration_until_next(now, 99), Duration::from_secs(59 * 60));
}

// ==============================================================================
// SCHEDULER LIFECYCLE
// ==============================================================================

struct RecordingJob {
    startup: bool,
    run_duration: Duration,
    started: Arc<AtomicUsize>,
    finished: Arc<AtomicUsize>,
}

#[async_trait]
impl ScheduledJob for RecordingJob {
    fn name(&self) -> &'static str {
        "recording"
    }

    fn cadence(&self) -> JobCadence {
        // Far enough out that only the startup run can fire inside a test.
        JobCadence::HourlyAt { minute: 0 }
    }

    fn run_on_startup(&self) -> bool {
        self.startup
    }

    async fn run(&self, _now: DateTime<Utc>) -> JobReport {
        self.started.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.run_duration).await;
        self.finished.fetch_add(1, Ordering::SeqCst);
        JobReport {
            summary: "ok".to_string(),
        }
    }
}

#[tokio::test]
async fn test_startup_run_fires_once_eagerly() {
    let started = Arc::new(AtomicUsize::new(0));
    let finished = Arc::new(AtomicUsize::new(0));

    let mut scheduler = JobScheduler::new();
    scheduler.register(Arc::new(RecordingJob {
        startup: true,
        run_duration: Duration::from_millis(10),
        started: Arc::clone(&started),
        finished: Arc::clone(&finished),
    }));

    scheduler.start().await;
    tokio::time::sleep(Duration::from_millis(100)).await;
    scheduler.shutdown().await;

    assert_eq!(started.load(Ordering::SeqCst), 1);
    assert_eq!(finished.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_jobs_without_startup_run_stay_idle() {
    let started = Arc::new(AtomicUsize::new(0));
    let finished = Arc::new(AtomicUsize::new(0));

    let mut scheduler = JobScheduler::new();
    scheduler.register(Arc::new(RecordingJob {
        startup: false,
        run_duration: Duration::from_millis(1),
        started: Arc::clone(&started),
        finished: Arc::clone(&finished),
    }));

    scheduler.start().await;
    tokio::time::sleep(Duration::from_millis(50)).await;
    scheduler.shutdown().await;

    assert_eq!(started.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_shutdown_waits_for_the_in_flight_tick() {
    let started = Arc::new(AtomicUsize::new(0));
    let finished = Arc::new(AtomicUsize::new(0));

    let mut scheduler = JobScheduler::new();
    scheduler.register(Arc::new(RecordingJob {
        startup: true,
        run_duration: Duration::from_millis(200),
        started: Arc::clone(&started),
        finished: Arc::clone(&finished),
    }));

    scheduler.start().await;
    // Give the startup tick time to begin, then shut down mid-run.
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(started.load(Ordering::SeqCst), 1);
    assert_eq!(finished.load(Ordering::SeqCst), 0);

    scheduler.shutdown().await;

    assert_eq!(finished.load(Ordering::SeqCst), 1);
}
