use crate::context::RunContext;
use crate::runner::{RequestRunner, Transport};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, timeout_at, Instant};
#[allow(unused)]
use tracing::{debug, error, info, trace, warn, Instrument};

struct Worker {
    id: usize,
    handle: JoinHandle<()>,
    stop: watch::Sender<bool>,
}

impl Worker {
    fn signal_stop(&self) {
        // NOTE: A send error means the worker already exited.
        let _ = self.stop.send(true);
    }
}

/// Set of running virtual users.
///
/// [`VirtualUserPool::reconcile`] grows or shrinks the set to the scheduler's target. Retired
/// workers finish their in-flight request before exiting; they are never aborted mid-request
/// during a run.
pub(crate) struct VirtualUserPool<T> {
    runner: Arc<RequestRunner<T>>,
    workers: Vec<Worker>,
    draining: Vec<Worker>,
    next_id: usize,
}

impl<T> VirtualUserPool<T>
where
    T: Transport + Sync + 'static,
{
    pub fn new(runner: Arc<RequestRunner<T>>) -> Self {
        Self {
            runner,
            workers: vec![],
            draining: vec![],
            next_id: 0,
        }
    }

    fn ctx(&self) -> &Arc<RunContext> {
        self.runner.context()
    }

    pub fn reconcile(&mut self, target: usize) {
        self.reap();

        if self.workers.len() > target {
            let retired: Vec<Worker> = self.workers.drain(target..).collect();
            debug!("Retiring {} virtual users.", retired.len());
            for worker in retired {
                worker.signal_stop();
                self.draining.push(worker);
            }
        } else if self.workers.len() < target {
            debug!("Spawning {} virtual users.", target - self.workers.len());
            while self.workers.len() < target {
                let worker = self.spawn_worker();
                self.workers.push(worker);
            }
        }

        self.ctx().set_live_vus(self.workers.len());
    }

    /// Workers currently assigned to the schedule, excluding those draining.
    pub fn live(&self) -> usize {
        self.workers.len()
    }

    #[cfg(test)]
    pub fn draining(&self) -> usize {
        self.draining.len()
    }

    /// Signals every worker and waits up to `graceful_stop` for in-flight iterations. Workers
    /// still running after that are aborted.
    pub async fn shutdown(mut self, graceful_stop: Duration) {
        for worker in &self.workers {
            worker.signal_stop();
        }
        let mut workers = std::mem::take(&mut self.draining);
        workers.append(&mut self.workers);
        self.ctx().set_live_vus(0);

        let deadline = Instant::now() + graceful_stop;
        let mut aborted = 0;
        for mut worker in workers {
            match timeout_at(deadline, &mut worker.handle).await {
                Ok(Ok(())) => {}
                Ok(Err(err)) => error!("Virtual user {} ended abnormally: {err}", worker.id),
                Err(_) => {
                    worker.handle.abort();
                    aborted += 1;
                }
            }
        }

        if aborted > 0 {
            warn!(
                "{aborted} virtual users did not finish within {}; aborted.",
                humantime::format_duration(graceful_stop)
            );
        }
    }

    fn reap(&mut self) {
        self.draining.retain(|w| !w.handle.is_finished());
    }

    fn spawn_worker(&mut self) -> Worker {
        let id = self.next_id;
        self.next_id += 1;

        let (stop, stop_rx) = watch::channel(false);
        let runner = self.runner.clone();
        let handle = tokio::spawn(
            async move { worker_loop(id, runner, stop_rx).await }.in_current_span(),
        );

        Worker { id, handle, stop }
    }
}

async fn worker_loop<T>(id: usize, runner: Arc<RequestRunner<T>>, mut stop: watch::Receiver<bool>)
where
    T: Transport + Sync,
{
    trace!("Virtual user {id} started.");
    let ctx = runner.context().clone();
    let mut rng = ctx.rng_for(id);

    loop {
        if *stop.borrow() {
            break;
        }

        runner.iterate(&mut rng).await;
        ctx.record_iteration();

        let next_wake = runner.next_wake(Instant::now());
        if next_wake <= Instant::now() {
            tokio::task::yield_now().await;
            continue;
        }

        tokio::select! {
            _ = sleep_until(next_wake) => {}
            res = stop.changed() => {
                if res.is_err() {
                    break;
                }
            }
        }
    }
    trace!("Virtual user {id} stopped.");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checks::CheckEvaluator;
    use crate::runner::tests::MockTransport;
    use stampede_core::RunConfig;

    fn pool(sleep: Duration, delay: Duration) -> VirtualUserPool<MockTransport> {
        let mut config = RunConfig::new("pool");
        config.sleep = sleep;
        let ctx = Arc::new(RunContext::new(config, CheckEvaluator::new()));
        VirtualUserPool::new(Arc::new(RequestRunner::new(ctx, MockTransport::ok(delay))))
    }

    #[tokio::test]
    async fn converges_on_monotonic_targets() {
        let mut pool = pool(Duration::from_millis(10), Duration::from_millis(1));
        for target in [1, 2, 5, 10, 25, 50] {
            pool.reconcile(target);
            assert_eq!(pool.live(), target);
            assert_eq!(pool.ctx().live_vus(), target);
        }
        for target in [40, 20, 3, 0] {
            pool.reconcile(target);
            assert_eq!(pool.live(), target);
        }
        assert_eq!(pool.ctx().peak_vus(), 50);
        pool.shutdown(Duration::from_secs(1)).await;
    }

    #[tokio::test]
    async fn converges_on_oscillating_targets() {
        let mut pool = pool(Duration::from_millis(5), Duration::from_millis(2));
        for target in [10, 2, 15, 0, 7, 7, 1, 20, 4] {
            pool.reconcile(target);
            assert_eq!(pool.live(), target);
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        pool.shutdown(Duration::from_secs(1)).await;
    }

    #[tokio::test]
    #[ntest::timeout(5_000)]
    async fn retired_workers_drain_gracefully() {
        // Workers are mid-request (100ms) when retired; they finish that request and exit.
        let mut pool = pool(Duration::ZERO, Duration::from_millis(100));
        pool.reconcile(4);
        tokio::time::sleep(Duration::from_millis(20)).await;

        pool.reconcile(1);
        assert_eq!(pool.live(), 1);
        assert_eq!(pool.draining(), 3);

        tokio::time::sleep(Duration::from_millis(200)).await;
        pool.reconcile(1);
        assert_eq!(pool.draining(), 0);

        let ctx = pool.ctx().clone();
        pool.shutdown(Duration::from_secs(1)).await;
        // Every started request was completed and recorded.
        assert_eq!(ctx.aggregator.samples().len() as u64, ctx.iterations());
    }

    #[tokio::test]
    async fn stop_interrupts_sleep() {
        let mut pool = pool(Duration::from_secs(60), Duration::ZERO);
        pool.reconcile(3);
        tokio::time::sleep(Duration::from_millis(50)).await;

        let ctx = pool.ctx().clone();
        let start = Instant::now();
        pool.shutdown(Duration::from_secs(5)).await;
        assert!(start.elapsed() < Duration::from_secs(1));
        assert_eq!(ctx.iterations(), 3);
        assert_eq!(ctx.live_vus(), 0);
    }

    #[tokio::test]
    async fn shutdown_aborts_after_graceful_stop() {
        let mut pool = pool(Duration::ZERO, Duration::from_secs(30));
        pool.reconcile(2);
        tokio::time::sleep(Duration::from_millis(20)).await;

        let start = Instant::now();
        pool.shutdown(Duration::from_millis(100)).await;
        assert!(start.elapsed() < Duration::from_secs(5));
    }
}
