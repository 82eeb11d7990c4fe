use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Notify};
use tokio::time::Instant;
use tracing::{error, info, warn};

use crate::cycle::NewsCycle;

/// Something the scheduler can run once per tick.
#[async_trait::async_trait]
pub trait CycleRunner: Send + Sync + 'static {
    async fn run_cycle(&self) -> anyhow::Result<()>;
}

#[async_trait::async_trait]
impl CycleRunner for NewsCycle {
    async fn run_cycle(&self) -> anyhow::Result<()> {
        self.run_once().await?;
        Ok(())
    }
}

/// Raised once the chat session is established.
#[derive(Debug, Clone)]
pub struct ReadySignal(Arc<watch::Sender<bool>>);

/// Waited on by the scheduler before its first tick.
#[derive(Debug, Clone)]
pub struct ReadyGate(watch::Receiver<bool>);

pub fn readiness() -> (ReadySignal, ReadyGate) {
    let (tx, rx) = watch::channel(false);
    (ReadySignal(Arc::new(tx)), ReadyGate(rx))
}

impl ReadySignal {
    pub fn mark_ready(&self) {
        self.0.send_replace(true);
    }
}

impl ReadyGate {
    /// Resolves `true` once ready, or `false` if every signal was dropped first.
    pub async fn wait(&mut self) -> bool {
        loop {
            if *self.0.borrow() {
                return true;
            }
            if self.0.changed().await.is_err() {
                return *self.0.borrow();
            }
        }
    }
}

/// Drives a cycle at a fixed period.
///
/// Ticks fall on `ready_at + k * period`; the first cycle runs as soon as readiness is observed.
/// Cycles never overlap: a tick that comes due while a cycle is still running is skipped,
/// and the next cycle starts on the following multiple of the period.
pub struct CycleScheduler {
    runner: Arc<dyn CycleRunner>,
    period: Duration,
    shutdown: Arc<Notify>,
}

impl CycleScheduler {
    pub fn new(runner: Arc<dyn CycleRunner>, period: Duration, shutdown: Arc<Notify>) -> Self {
        Self {
            runner,
            period,
            shutdown,
        }
    }

    /// Run the schedule once `became_ready` resolves `Ok`.
    ///
    /// If it fails instead, no cycle runs and its error is returned so the caller can exit
    /// with a failure. Shutdown while still waiting drops `became_ready` and returns `Ok`.
    pub async fn run_when_ready<F, E>(&self, became_ready: F) -> Result<(), E>
    where
        F: Future<Output = Result<(), E>>,
    {
        let (signal, gate) = readiness();
        let outcome = async move {
            let res = became_ready.await;
            if res.is_ok() {
                signal.mark_ready();
            }
            drop(signal);
            res
        };
        tokio::pin!(outcome);
        let schedule = self.run(gate);
        tokio::pin!(schedule);

        tokio::select! {
            res = &mut outcome => {
                schedule.await;
                res
            }
            _ = &mut schedule => Ok(()),
        }
    }

    /// Run until `shutdown` is notified. A failing or panicking cycle is logged and the
    /// schedule continues. A cycle in flight when shutdown arrives is allowed to finish.
    pub async fn run(&self, mut ready: ReadyGate) {
        let shutdown = self.shutdown.notified();
        tokio::pin!(shutdown);

        info!("scheduler: waiting for chat platform readiness");
        tokio::select! {
            is_ready = ready.wait() => {
                if !is_ready {
                    warn!("scheduler: readiness source dropped before becoming ready, exiting");
                    return;
                }
            }
            _ = &mut shutdown => {
                info!("scheduler: shutdown requested before first cycle");
                return;
            }
        }

        info!(period = ?self.period, "scheduler: ready, starting cycles");
        let mut next_tick = Instant::now();
        let mut cycle_no: u64 = 0;

        loop {
            tokio::select! {
                _ = tokio::time::sleep_until(next_tick) => {}
                _ = &mut shutdown => {
                    info!("scheduler: shutdown requested, exiting loop");
                    break;
                }
            }

            cycle_no += 1;
            let runner = self.runner.clone();
            let mut handle = tokio::spawn(async move { runner.run_cycle().await });

            let mut stopping = false;
            let joined = tokio::select! {
                res = &mut handle => res,
                _ = &mut shutdown => {
                    info!(cycle = cycle_no, "scheduler: shutdown requested, letting current cycle finish");
                    stopping = true;
                    handle.await
                }
            };

            match joined {
                Ok(Ok(())) => info!(cycle = cycle_no, "scheduler: cycle completed"),
                Ok(Err(e)) => error!(cycle = cycle_no, "scheduler: cycle failed: {:#}", e),
                Err(join_err) => error!(cycle = cycle_no, %join_err, "scheduler: cycle task panicked"),
            }

            if stopping {
                break;
            }

            next_tick += self.period;
            let now = Instant::now();
            let mut skipped = 0u64;
            while next_tick < now {
                next_tick += self.period;
                skipped += 1;
            }
            if skipped > 0 {
                warn!(cycle = cycle_no, skipped, "scheduler: cycle overran its period, skipped ticks");
            }
        }

        info!("scheduler: stopped");
    }
}
