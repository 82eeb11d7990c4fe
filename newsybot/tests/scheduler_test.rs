use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use newsybot::scheduler::CycleRunner;
use newsybot::{readiness, CycleScheduler};
use tokio::sync::Notify;
use tokio::time::Instant;

const PERIOD: Duration = Duration::from_secs(10);

/// Records when each cycle started; optionally misbehaves.
struct Recorder {
    starts: Mutex<Vec<Instant>>,
    runs: AtomicUsize,
    work: Duration,
    fail_every_run: bool,
    panic_on_first: bool,
}

impl Recorder {
    fn new() -> Self {
        Self {
            starts: Mutex::new(Vec::new()),
            runs: AtomicUsize::new(0),
            work: Duration::ZERO,
            fail_every_run: false,
            panic_on_first: false,
        }
    }

    fn runs(&self) -> usize {
        self.runs.load(Ordering::SeqCst)
    }

    fn offsets(&self, origin: Instant) -> Vec<u64> {
        self.starts
            .lock()
            .unwrap()
            .iter()
            .map(|s| (*s - origin).as_secs())
            .collect()
    }
}

#[async_trait::async_trait]
impl CycleRunner for Recorder {
    async fn run_cycle(&self) -> anyhow::Result<()> {
        self.starts.lock().unwrap().push(Instant::now());
        let n = self.runs.fetch_add(1, Ordering::SeqCst);
        if !self.work.is_zero() {
            tokio::time::sleep(self.work).await;
        }
        if self.panic_on_first && n == 0 {
            panic!("boom");
        }
        if self.fail_every_run {
            anyhow::bail!("provider unreachable");
        }
        Ok(())
    }
}

#[tokio::test(start_paused = true)]
async fn nothing_runs_before_readiness() {
    let recorder = Arc::new(Recorder::new());
    let shutdown = Arc::new(Notify::new());
    let (signal, gate) = readiness();
    let scheduler = CycleScheduler::new(recorder.clone(), PERIOD, shutdown.clone());
    let task = tokio::spawn(async move { scheduler.run(gate).await });

    tokio::time::sleep(PERIOD * 5).await;
    assert_eq!(recorder.runs(), 0);

    let ready_at = Instant::now();
    signal.mark_ready();
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(recorder.runs(), 1);
    assert_eq!(recorder.offsets(ready_at), vec![0]);

    shutdown.notify_waiters();
    task.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn ticks_follow_the_fixed_period() {
    let recorder = Arc::new(Recorder::new());
    let shutdown = Arc::new(Notify::new());
    let (signal, gate) = readiness();
    signal.mark_ready();
    let origin = Instant::now();
    let scheduler = CycleScheduler::new(recorder.clone(), PERIOD, shutdown.clone());
    let task = tokio::spawn(async move { scheduler.run(gate).await });

    tokio::time::sleep(Duration::from_secs(35)).await;
    shutdown.notify_waiters();
    task.await.unwrap();

    assert_eq!(recorder.offsets(origin), vec![0, 10, 20, 30]);
}

#[tokio::test(start_paused = true)]
async fn overrunning_cycle_skips_overlapping_ticks() {
    let recorder = Arc::new(Recorder {
        work: Duration::from_secs(25),
        ..Recorder::new()
    });
    let shutdown = Arc::new(Notify::new());
    let (signal, gate) = readiness();
    signal.mark_ready();
    let origin = Instant::now();
    let scheduler = CycleScheduler::new(recorder.clone(), PERIOD, shutdown.clone());
    let task = tokio::spawn(async move { scheduler.run(gate).await });

    // Cycles start at 0 and 30; the ticks at 10 and 20 fell inside the first run
    tokio::time::sleep(Duration::from_secs(45)).await;
    shutdown.notify_waiters();
    task.await.unwrap();

    assert_eq!(recorder.offsets(origin), vec![0, 30]);
}

#[tokio::test(start_paused = true)]
async fn failing_and_panicking_cycles_do_not_stop_the_schedule() {
    let recorder = Arc::new(Recorder {
        fail_every_run: true,
        panic_on_first: true,
        ..Recorder::new()
    });
    let shutdown = Arc::new(Notify::new());
    let (signal, gate) = readiness();
    signal.mark_ready();
    let scheduler = CycleScheduler::new(recorder.clone(), PERIOD, shutdown.clone());
    let task = tokio::spawn(async move { scheduler.run(gate).await });

    tokio::time::sleep(Duration::from_secs(25)).await;
    shutdown.notify_waiters();
    task.await.expect("scheduler task survives");

    assert_eq!(recorder.runs(), 3);
}

#[tokio::test(start_paused = true)]
async fn dropped_readiness_source_ends_the_scheduler() {
    let recorder = Arc::new(Recorder::new());
    let (signal, gate) = readiness();
    let scheduler = CycleScheduler::new(recorder.clone(), PERIOD, Arc::new(Notify::new()));
    let task = tokio::spawn(async move { scheduler.run(gate).await });

    drop(signal);
    tokio::time::timeout(Duration::from_secs(1), task)
        .await
        .expect("scheduler returns")
        .unwrap();
    assert_eq!(recorder.runs(), 0);
}

#[tokio::test(start_paused = true)]
async fn shutdown_waits_for_the_cycle_in_flight() {
    let recorder = Arc::new(Recorder {
        work: Duration::from_secs(5),
        ..Recorder::new()
    });
    let shutdown = Arc::new(Notify::new());
    let (signal, gate) = readiness();
    signal.mark_ready();
    let scheduler = CycleScheduler::new(recorder.clone(), PERIOD, shutdown.clone());
    let task = tokio::spawn(async move { scheduler.run(gate).await });

    tokio::time::sleep(Duration::from_secs(1)).await;
    let asked_at = Instant::now();
    shutdown.notify_waiters();
    task.await.unwrap();

    assert!(Instant::now() - asked_at >= Duration::from_secs(4));
    assert_eq!(recorder.runs(), 1);
}

#[tokio::test(start_paused = true)]
async fn failed_readiness_is_returned_and_nothing_runs() {
    let recorder = Arc::new(Recorder::new());
    let scheduler = CycleScheduler::new(recorder.clone(), PERIOD, Arc::new(Notify::new()));

    let res = tokio::time::timeout(
        Duration::from_secs(60),
        scheduler.run_when_ready(async {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Err::<(), _>("401 Unauthorized")
        }),
    )
    .await
    .expect("scheduler returns once readiness fails");

    assert_eq!(res, Err("401 Unauthorized"));
    assert_eq!(recorder.runs(), 0);
}

#[tokio::test(start_paused = true)]
async fn successful_readiness_starts_the_schedule() {
    let recorder = Arc::new(Recorder::new());
    let shutdown = Arc::new(Notify::new());
    let scheduler = CycleScheduler::new(recorder.clone(), PERIOD, shutdown.clone());
    let task = tokio::spawn(async move {
        scheduler
            .run_when_ready(async {
                tokio::time::sleep(Duration::from_secs(3)).await;
                Ok::<(), String>(())
            })
            .await
    });

    tokio::time::sleep(Duration::from_secs(15)).await;
    shutdown.notify_waiters();

    assert_eq!(task.await.unwrap(), Ok(()));
    assert_eq!(recorder.runs(), 2);
}

#[tokio::test(start_paused = true)]
async fn shutdown_while_waiting_for_readiness_is_clean() {
    let recorder = Arc::new(Recorder::new());
    let shutdown = Arc::new(Notify::new());
    let scheduler = CycleScheduler::new(recorder.clone(), PERIOD, shutdown.clone());
    let task = tokio::spawn(async move {
        scheduler
            .run_when_ready(std::future::pending::<Result<(), String>>())
            .await
    });

    tokio::time::sleep(Duration::from_secs(5)).await;
    shutdown.notify_waiters();

    assert_eq!(task.await.unwrap(), Ok(()));
    assert_eq!(recorder.runs(), 0);
}
