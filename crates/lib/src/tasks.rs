//! Supervised background jobs for fire-and-forget dispatch.
//!
//! The webhook handler answers before forwarding finishes, so each job logs its own result.
//! Jobs are tracked so shutdown can wait for in-flight forwarding.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tokio_util::task::TaskTracker;

/// Spawns detached jobs, logs how each one ended, and drains them on shutdown.
#[derive(Clone, Default)]
pub struct TaskSupervisor {
    tracker: TaskTracker,
}

impl TaskSupervisor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `job` in the background. Errors are logged at error level under `name`.
    pub fn spawn<F, T, E>(&self, name: &'static str, job: F)
    where
        F: Future<Output = Result<T, E>> + Send + 'static,
        T: Send + 'static,
        E: Display + Send + 'static,
    {
        self.tracker.spawn(async move {
            match job.await {
                Ok(_) => log::debug!("{}: finished", name),
                Err(e) => log::error!("{} failed: {}", name, e),
            }
        });
    }

    /// Number of jobs still running.
    pub fn in_flight(&self) -> usize {
        self.tracker.len()
    }

    /// Close the tracker and wait for running jobs, up to `timeout`.
    /// Returns false when the timeout elapsed first.
    pub async fn drain(&self, timeout: Duration) -> bool {
        self.tracker.close();
        let pending = self.tracker.len();
        if pending > 0 {
            log::info!("waiting for {} background job(s)", pending);
        }
        tokio::time::timeout(timeout, self.tracker.wait()).await.is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn drain_waits_for_jobs_including_failures() {
        let supervisor = TaskSupervisor::new();
        let done = Arc::new(AtomicUsize::new(0));
        for i in 0..3 {
            let done = done.clone();
            supervisor.spawn("test job", async move {
                tokio::time::sleep(Duration::from_millis(20)).await;
                done.fetch_add(1, Ordering::SeqCst);
                if i == 1 {
                    Err("injected")
                } else {
                    Ok(())
                }
            });
        }
        assert!(supervisor.drain(Duration::from_secs(5)).await);
        assert_eq!(done.load(Ordering::SeqCst), 3);
        assert_eq!(supervisor.in_flight(), 0);
    }

    #[tokio::test]
    async fn drain_times_out_on_stuck_job() {
        let supervisor = TaskSupervisor::new();
        supervisor.spawn("stuck", async {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok::<(), String>(())
        });
        assert!(!supervisor.drain(Duration::from_millis(20)).await);
    }
}
