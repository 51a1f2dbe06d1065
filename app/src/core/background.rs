use std::future::Future;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Spawned task paired with the token that asks it to stop.
pub struct BackgroundTask {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl BackgroundTask {
    pub fn spawn<F, Fut>(task: F) -> Self
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(task(cancel.clone()));

        Self { cancel, handle }
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Cancels the task and waits until it has exited.
    pub async fn stop(self) {
        self.cancel.cancel();

        if let Err(e) = self.handle.await {
            if !e.is_cancelled() {
                tracing::error!("Background task ended abnormally: {:?}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    use super::*;

    #[tokio::test(start_paused = true)]
    async fn stop_returns_after_task_exited() {
        let exited = Arc::new(AtomicBool::new(false));
        let flag = exited.clone();

        let task = BackgroundTask::spawn(|cancel| async move {
            cancel.cancelled().await;
            tokio::time::sleep(Duration::from_secs(1)).await;
            flag.store(true, Ordering::SeqCst);
        });
        task.stop().await;

        assert!(exited.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn finished_task_is_reported() {
        let task = BackgroundTask::spawn(|_| async {});
        tokio::task::yield_now().await;

        while !task.is_finished() {
            tokio::task::yield_now().await;
        }
        task.stop().await;
    }
}
