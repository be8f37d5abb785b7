//! Timing and environment knobs for a bounded run and for the outer cadence.
//!
//! Production defaults: a 60 minute session window
//! supervised at 30/60 second cadences, launched daily at 04:15 IST with a
//! 25 hour rest and a 65 minute safety ceiling.

use std::path::PathBuf;
use std::time::Duration;

use chrono_tz::Tz;

use crate::classify::SiteProfile;

/// Default shared queue endpoint.
pub const DEFAULT_QUEUE_URL: &str =
    "https://craxlinks-bb690-default-rtdb.firebaseio.com/links.json";

const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Configuration for one bounded multi-account run.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub site: SiteProfile,
    pub queue_url: String,

    /// Wall-clock window one account's session is allowed to run.
    pub run_window: Duration,
    /// Heartbeat probe period.
    pub heartbeat_interval: Duration,
    /// Watchdog evaluation period.
    pub watchdog_interval: Duration,
    /// Idle duration past which the watchdog forces a reload.
    pub idle_timeout: Duration,
    /// Reload budget per session; the watchdog disarms once it is spent.
    pub max_restarts: u32,

    /// Pause after a navigation before any injection, letting the
    /// destination page run its own initial scripts.
    pub settle_delay: Duration,
    /// Additional pause before injecting a behavior script.
    pub inject_delay: Duration,
    /// Ceiling on the initial navigation.
    pub nav_timeout: Duration,
    /// Period of the session status log line.
    pub status_interval: Duration,

    pub headless: bool,
    /// Explicit browser binary; falls back to the `CHROME_PATH` /
    /// `PATROL_CHROME` environment variables, then chromiumoxide's detection.
    pub chrome_executable: Option<PathBuf>,
    pub user_agent: String,
    pub viewport_width: u32,
    pub viewport_height: u32,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            site: SiteProfile::default(),
            queue_url: DEFAULT_QUEUE_URL.to_string(),
            run_window: Duration::from_secs(60 * 60),
            heartbeat_interval: Duration::from_secs(60),
            watchdog_interval: Duration::from_secs(30),
            idle_timeout: Duration::from_secs(5 * 60),
            max_restarts: 5,
            settle_delay: Duration::from_millis(500),
            inject_delay: Duration::from_millis(1000),
            nav_timeout: Duration::from_secs(60),
            status_interval: Duration::from_secs(60),
            headless: true,
            chrome_executable: None,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            viewport_width: 1366,
            viewport_height: 768,
        }
    }
}

/// Configuration for the outer cadence loop.
#[derive(Debug, Clone)]
pub struct CadenceConfig {
    /// Launch hour in `timezone` (0-23).
    pub launch_hour: u32,
    /// Launch minute in `timezone` (0-59).
    pub launch_minute: u32,
    pub timezone: Tz,
    /// Sleep between the end of one subordinate run and the next launch.
    pub rest_interval: Duration,
    /// Hard ceiling on one subordinate run; must exceed the run window.
    pub safety_timeout: Duration,
    /// Append-only diagnostic log of cadence events; `None` disables it.
    pub event_log: Option<PathBuf>,
}

impl Default for CadenceConfig {
    fn default() -> Self {
        Self {
            launch_hour: 4,
            launch_minute: 15,
            timezone: chrono_tz::Asia::Kolkata,
            rest_interval: Duration::from_secs(25 * 60 * 60),
            safety_timeout: Duration::from_secs(65 * 60),
            event_log: Some(std::env::temp_dir().join("patrol-cadence.log")),
        }
    }
}

impl CadenceConfig {
    /// Rejects out-of-range launch times before the loop starts.
    pub fn validate(&self) -> crate::error::Result<()> {
        if self.launch_hour > 23 {
            return Err(crate::error::PatrolError::Config(format!(
                "launch hour {} out of range 0-23",
                self.launch_hour
            )));
        }
        if self.launch_minute > 59 {
            return Err(crate::error::PatrolError::Config(format!(
                "launch minute {} out of range 0-59",
                self.launch_minute
            )));
        }
        Ok(())
    }
}
