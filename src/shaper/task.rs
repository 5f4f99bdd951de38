/*!
 * Shaper Task - Advance Timer Actor
 *
 * Background task that owns the advance timer and serializes every
 * mutation of the engine: timer firings, schedule installs and link-rate
 * changes all run on this one task, in the order they arrive.
 *
 * # Graceful-with-Fallback Shutdown Pattern
 *
 * 1. **Preferred Path:** `shutdown().await` sends a shutdown command and
 *    waits for the loop to exit.
 * 2. **Fallback Path:** `Drop` aborts the task with a warning when
 *    `shutdown()` was never called.
 *
 * The timer sleeps until the next deadline read from the shaper's clock and
 * only fires once that clock has reached it, so a hand-driven clock can be
 * stepped in tests and the actor told to catch up with `poll_now()`.
 *
 * # Example Usage
 *
 * ```no_run
 * # use std::sync::Arc;
 * # use time_aware_shaper::{Shaper, ShaperTask, ShaperConfig, EntryConfig};
 * # async fn example() -> Result<(), Box<dyn std::error::Error>> {
 * let shaper = Arc::new(Shaper::builder().with_link_speed(1_000).build()?);
 * let task = ShaperTask::spawn(shaper.clone());
 *
 * task.change(ShaperConfig::new(vec![EntryConfig::new(0xff, 1_000_000)], 0)).await?;
 *
 * task.shutdown().await;
 * # Ok(())
 * # }
 * ```
 */

use super::Shaper;
use crate::core::errors::{ConfigError, ShaperError};
use crate::core::limits::MAX_CATCHUP_FIRINGS;
use crate::core::time::KTIME_MAX;
use crate::schedule::ShaperConfig;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tracing::{info, warn};

/// Control messages for the shaper task
#[derive(Debug)]
pub enum ShaperCommand {
    /// Install a schedule and report the outcome
    Change(Box<ShaperConfig>, oneshot::Sender<Result<(), ConfigError>>),
    /// Link speed changed (Mbit/s, `None` if unknown)
    LinkChanged(Option<u32>),
    /// Run every firing already due and report how many ran
    PollNow(oneshot::Sender<usize>),
    /// Stop the timer and flush the queues
    Reset,
    /// Shutdown the shaper task
    Shutdown,
}

/// Handle to the shaper background task
///
/// **Shutdown Pattern: Graceful-with-Fallback**
/// - Preferred: Call `shutdown().await` for graceful termination
/// - Fallback: Drop will abort the task if shutdown wasn't called
pub struct ShaperTask {
    command_tx: mpsc::UnboundedSender<ShaperCommand>,
    handle: Option<tokio::task::JoinHandle<()>>,
    /// Tracks whether graceful shutdown was initiated (lock-free)
    shutdown_initiated: Arc<AtomicBool>,
}

impl ShaperTask {
    /// Spawn the actor for `shaper`
    pub fn spawn(shaper: Arc<Shaper>) -> Self {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let shutdown_initiated = Arc::new(AtomicBool::new(false));

        let handle = tokio::spawn(async move {
            run_shaper_loop(shaper, command_rx).await;
        });

        info!("Shaper task spawned");

        Self {
            command_tx,
            handle: Some(handle),
            shutdown_initiated,
        }
    }

    /// Install a schedule through the actor
    pub async fn change(&self, config: ShaperConfig) -> Result<(), ShaperError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.command_tx
            .send(ShaperCommand::Change(Box::new(config), reply_tx))
            .map_err(|_| ShaperError::TaskStopped)?;
        reply_rx.await.map_err(|_| ShaperError::TaskStopped)?.map_err(ShaperError::from)
    }

    /// Report a link speed change
    pub fn link_changed(&self, speed_mbps: Option<u32>) {
        let _ = self.command_tx.send(ShaperCommand::LinkChanged(speed_mbps));
    }

    /// Fire everything that is due now; returns the number of firings
    pub async fn poll_now(&self) -> Result<usize, ShaperError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.command_tx
            .send(ShaperCommand::PollNow(reply_tx))
            .map_err(|_| ShaperError::TaskStopped)?;
        reply_rx.await.map_err(|_| ShaperError::TaskStopped)
    }

    pub fn reset(&self) {
        let _ = self.command_tx.send(ShaperCommand::Reset);
    }

    /// Shutdown the shaper task gracefully
    ///
    /// Consumes self to prevent use-after-shutdown and double-shutdown.
    pub async fn shutdown(mut self) {
        self.shutdown_initiated.store(true, Ordering::SeqCst);

        let _ = self.command_tx.send(ShaperCommand::Shutdown);

        if let Some(handle) = self.handle.take() {
            if let Err(e) = handle.await {
                warn!("Shaper task shutdown error: {}", e);
            } else {
                info!("Shaper task shutdown complete");
            }
        }
    }
}

/// Fire every due deadline, bounded so a stalled clock cannot spin us
fn catch_up(shaper: &Shaper) -> usize {
    let fired = shaper.fire_due(MAX_CATCHUP_FIRINGS);
    if fired == MAX_CATCHUP_FIRINGS {
        warn!(
            fired,
            "advance timer fell behind, yielding before further catch-up"
        );
    }
    fired
}

/// Time left until `expires` in the shaper's clock domain
fn until(shaper: &Shaper, expires: i64) -> Duration {
    let delta = expires.saturating_sub(shaper.now()).max(0);
    Duration::from_nanos(delta as u64)
}

async fn run_shaper_loop(shaper: Arc<Shaper>, mut command_rx: mpsc::UnboundedReceiver<ShaperCommand>) {
    info!("Shaper loop started");

    loop {
        let expires = shaper.timer().expires();
        let armed = expires != KTIME_MAX;
        let delay = if armed { until(&shaper, expires) } else { Duration::ZERO };

        tokio::select! {
            _ = tokio::time::sleep(delay), if armed => {
                catch_up(&shaper);
            }

            _ = shaper.timer().rearmed().notified() => {}

            cmd = command_rx.recv() => {
                let Some(cmd) = cmd else {
                    info!("Shaper task handle dropped, stopping");
                    break;
                };
                match cmd {
                    ShaperCommand::Change(config, reply) => {
                        let result = shaper.change(*config);
                        if let Err(ref e) = result {
                            warn!(error = %e, "schedule rejected");
                        }
                        let _ = reply.send(result);
                    }

                    ShaperCommand::LinkChanged(speed) => {
                        shaper.set_link_speed(speed);
                    }

                    ShaperCommand::PollNow(reply) => {
                        let _ = reply.send(catch_up(&shaper));
                    }

                    ShaperCommand::Reset => {
                        shaper.reset();
                    }

                    ShaperCommand::Shutdown => {
                        info!("Shaper task shutting down");
                        break;
                    }
                }
            }
        }
    }
}

impl Drop for ShaperTask {
    fn drop(&mut self) {
        if self.shutdown_initiated.load(Ordering::SeqCst) {
            return;
        }

        if let Some(handle) = self.handle.take() {
            warn!(
                "ShaperTask dropped without calling shutdown() - aborting task immediately. \
                 Use `task.shutdown().await` for graceful cleanup."
            );
            handle.abort();
        }
    }
}
