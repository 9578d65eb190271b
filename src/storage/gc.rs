//! Background expiry sweeper.
//!
//! A tokio task owned by a single store. Every tick it samples the clock
//! once and hands that instant to a blocking sweep function. Failures are
//! logged and the next tick simply tries again; the sweeper never reports
//! errors to store callers.

use crate::error::{Error, Result};
use crate::expiry::Marker;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Handle to a running sweep task.
///
/// Dropping the handle closes the shutdown channel, which also ends the task.
pub(crate) struct Sweeper {
    shutdown: watch::Sender<bool>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl Sweeper {
    /// Starts sweeping every `interval` on the current tokio runtime.
    ///
    /// The first sweep happens one full interval after start.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoRuntime`] outside a tokio runtime and
    /// [`Error::Config`] for a zero interval.
    pub(crate) fn spawn<F>(name: &str, interval: Duration, sweep: F) -> Result<Self>
    where
        F: Fn(Marker) -> Result<usize> + Send + Sync + 'static,
    {
        if interval.is_zero() {
            return Err(Error::config("gc interval must be greater than zero"));
        }
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| Error::NoRuntime)?;

        let (shutdown, shutdown_rx) = watch::channel(false);
        let task = runtime.spawn(run(
            Arc::from(name),
            interval,
            Arc::new(sweep),
            shutdown_rx,
        ));

        tracing::debug!(name, interval_ms = interval.as_millis() as u64, "Started expiry sweeper");

        Ok(Self {
            shutdown,
            task: Mutex::new(Some(task)),
        })
    }

    /// Signals the task to stop and waits for it, including any sweep in flight.
    pub(crate) async fn stop(&self) {
        let _ = self.shutdown.send(true);
        let task = self.task.lock().take();
        if let Some(task) = task
            && let Err(e) = task.await
        {
            tracing::warn!(error = %e, "Expiry sweeper ended abnormally");
        }
    }

    /// True once the task is gone.
    #[cfg(test)]
    pub(crate) fn is_stopped(&self) -> bool {
        self.task.lock().as_ref().is_none_or(JoinHandle::is_finished)
    }
}

async fn run<F>(
    name: Arc<str>,
    interval: Duration,
    sweep: Arc<F>,
    mut shutdown: watch::Receiver<bool>,
) where
    F: Fn(Marker) -> Result<usize> + Send + Sync + 'static,
{
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick completes immediately; wait a full interval instead.
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let now = Marker::now();
                let sweep = Arc::clone(&sweep);
                match tokio::task::spawn_blocking(move || sweep(now)).await {
                    Ok(Ok(0)) => tracing::trace!(name = %name, "Expiry sweep found nothing"),
                    Ok(Ok(deleted)) => {
                        tracing::debug!(name = %name, deleted, "Expiry sweep removed entries");
                    },
                    Ok(Err(e)) => {
                        tracing::warn!(name = %name, error = %e, "Expiry sweep failed, retrying next tick");
                    },
                    Err(e) => {
                        tracing::warn!(name = %name, error = %e, "Expiry sweep task failed, retrying next tick");
                    },
                }
            }
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
        }
    }

    tracing::debug!(name = %name, "Stopped expiry sweeper");
}
