//! Liveness supervision: heartbeat and watchdog.
//!
//! Two independent interval tasks per session. The heartbeat proves the page
//! still answers a trivial evaluation and refreshes the activity timestamp;
//! the watchdog forces a reload once the session has been idle past the
//! threshold, bounded by the per-session restart budget. When the budget is
//! spent the watchdog disarms itself and the session runs unsupervised for
//! the rest of its window. That degraded tail is deliberate.
//!
//! Both tasks are owned by the [`Supervisor`] handle and aborted on drop, so
//! session teardown cannot leak a timer regardless of how the run ends.

use std::sync::Arc;
use std::time::Duration;

use chromiumoxide::Page;
use chromiumoxide::cdp::browser_protocol::page::ReloadParams;
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval_at};
use tracing::{debug, warn};

use crate::config::RunConfig;
use crate::session::SessionStats;

/// What the watchdog does on one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WatchdogAction {
    Wait,
    Reload { disarm: bool },
}

/// Pure per-tick decision: reload on sustained idle, disarm when this reload
/// spends the budget.
fn plan_tick(
    idle: Duration,
    threshold: Duration,
    next_restart: u32,
    ceiling: u32,
) -> WatchdogAction {
    if idle <= threshold {
        WatchdogAction::Wait
    } else {
        WatchdogAction::Reload {
            disarm: next_restart >= ceiling,
        }
    }
}

/// Running supervisor for one session.
#[derive(Debug)]
pub struct Supervisor {
    heartbeat: JoinHandle<()>,
    watchdog: JoinHandle<()>,
}

impl Supervisor {
    pub fn start(page: Page, stats: Arc<SessionStats>, config: &RunConfig, account: &str) -> Self {
        let heartbeat = tokio::spawn(heartbeat_loop(
            page.clone(),
            stats.clone(),
            config.heartbeat_interval,
            account.to_string(),
        ));
        let watchdog = tokio::spawn(watchdog_loop(
            page,
            stats,
            config.watchdog_interval,
            config.idle_timeout,
            config.max_restarts,
            account.to_string(),
        ));
        Self { heartbeat, watchdog }
    }

    /// Cancels both timers. Also happens on drop.
    pub fn shutdown(&self) {
        self.heartbeat.abort();
        self.watchdog.abort();
    }
}

impl Drop for Supervisor {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Probes the page with a trivial read; success counts as activity.
/// Failures are logged and left for the watchdog to judge.
async fn heartbeat_loop(page: Page, stats: Arc<SessionStats>, period: Duration, account: String) {
    let mut ticker = interval_at(tokio::time::Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        ticker.tick().await;
        match page.evaluate("document.title").await {
            Ok(_) => {
                stats.touch();
                debug!(target: "patrol::heartbeat", account = %account, "page responsive");
            }
            Err(err) => {
                warn!(target: "patrol::heartbeat", account = %account, error = %err, "probe failed");
            }
        }
    }
}

/// Forces a reload after sustained inactivity; at most one reload per tick.
/// Returns (disarming itself) once the restart budget is spent.
async fn watchdog_loop(
    page: Page,
    stats: Arc<SessionStats>,
    period: Duration,
    idle_timeout: Duration,
    max_restarts: u32,
    account: String,
) {
    let mut ticker = interval_at(tokio::time::Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        ticker.tick().await;
        let idle = stats.idle();
        match plan_tick(idle, idle_timeout, stats.restarts() + 1, max_restarts) {
            WatchdogAction::Wait => {}
            WatchdogAction::Reload { disarm } => {
                let restarts = stats.note_restart();
                warn!(
                    target: "patrol::watchdog",
                    account = %account,
                    idle_secs = idle.as_secs(),
                    restarts,
                    max_restarts,
                    "idle past threshold, reloading"
                );
                match page.execute(ReloadParams::default()).await {
                    Ok(_) => {
                        if let Err(err) = page.wait_for_navigation().await {
                            warn!(target: "patrol::watchdog", account = %account, error = %err, "reload did not settle");
                        }
                    }
                    Err(err) => {
                        warn!(target: "patrol::watchdog", account = %account, error = %err, "reload failed");
                    }
                }
                // Activity advances whether or not the reload succeeded, so
                // the next tick measures idle from this recovery attempt.
                stats.touch();
                if disarm {
                    warn!(
                        target: "patrol::watchdog",
                        account = %account,
                        "restart budget spent, watchdog disarmed"
                    );
                    return;
                }
            }
        }
    }
}
