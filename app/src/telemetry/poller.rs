use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use super::{SampleSource, Snapshot};
use crate::core::background::BackgroundTask;
use crate::core::time::DateTime;

type SnapshotSender<V> = Arc<watch::Sender<Arc<Snapshot<V>>>>;

/// Samples one domain on a fixed interval and publishes the latest snapshot.
pub struct Poller<S: SampleSource> {
    source: Arc<S>,
    interval: Duration,
    recovery_interval: Duration,
    snapshot: SnapshotSender<S::Value>,
    task: Mutex<Option<BackgroundTask>>,
}

impl<S: SampleSource> Poller<S> {
    pub fn new(source: S, interval: Duration, recovery_interval: Duration) -> Self {
        let (tx, _) = watch::channel(Arc::new(Snapshot::default()));

        Self {
            source: Arc::new(source),
            interval,
            recovery_interval,
            snapshot: Arc::new(tx),
            task: Mutex::new(None),
        }
    }

    fn task(&self) -> std::sync::MutexGuard<'_, Option<BackgroundTask>> {
        self.task.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Starts the sampling loop. A second call while running is a no-op.
    pub fn start(&self) {
        let mut task = self.task();
        if task.is_some() {
            return;
        }

        let (source, snapshot) = (self.source.clone(), self.snapshot.clone());
        let (interval, recovery_interval) = (self.interval, self.recovery_interval);
        *task = Some(BackgroundTask::spawn(move |cancel| run(source, interval, recovery_interval, snapshot, cancel)));

        tracing::info!(domain = self.source.domain(), interval = ?self.interval, "Poller started");
    }

    /// Stops the loop and waits until it has exited. Idempotent.
    pub async fn stop(&self) {
        let Some(task) = self.task().take() else {
            return;
        };

        task.stop().await;
        tracing::info!(domain = self.source.domain(), "Poller stopped");
    }

    pub fn is_running(&self) -> bool {
        self.task().as_ref().is_some_and(|task| !task.is_finished())
    }

    pub fn get_reading(&self, id: &str) -> Option<S::Value> {
        self.snapshot.borrow().values.get(id).cloned()
    }

    pub fn get_all_readings(&self) -> HashMap<String, S::Value> {
        self.snapshot.borrow().values.clone()
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Push feed, notified once per published snapshot.
    pub fn subscribe(&self) -> watch::Receiver<Arc<Snapshot<S::Value>>> {
        self.snapshot.subscribe()
    }
}

async fn run<S: SampleSource>(
    source: Arc<S>,
    interval: Duration,
    recovery_interval: Duration,
    snapshot: SnapshotSender<S::Value>,
    cancel: CancellationToken,
) {
    loop {
        //sampled in its own task so a panicking adapter only costs one cycle
        let sampler = source.clone();
        let mut sampling = tokio::spawn(async move { sampler.sample().await });

        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                sampling.abort();
                //a read in flight must not outlive stop()
                let _ = sampling.await;
                break;
            }
            outcome = &mut sampling => outcome,
        };

        let pause = match outcome {
            Ok(Ok(samples)) => {
                let next = snapshot.borrow().merge(samples, DateTime::now());
                snapshot.send_replace(Arc::new(next));
                interval
            }
            Ok(Err(e)) => {
                tracing::error!(
                    domain = source.domain(),
                    "Error in poll cycle, retrying in {:?}: {:?}",
                    recovery_interval,
                    e
                );
                recovery_interval
            }
            Err(e) => {
                tracing::error!(
                    domain = source.domain(),
                    "Poll cycle aborted, retrying in {:?}: {}",
                    recovery_interval,
                    e
                );
                recovery_interval
            }
        };

        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(pause) => {}
        }
    }

    tracing::debug!(domain = source.domain(), "Poll loop exited");
}
