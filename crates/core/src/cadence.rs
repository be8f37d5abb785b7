//! The outer cadence: launch, run bounded, rest, repeat forever.
//!
//! The cadence loop runs in its own process and talks to the session layer
//! only through process spawn/exit and inherited stdio. That isolation is the
//! point: a hang or crash inside the session layer cannot stop the safety
//! timer out here.
//!
//! The configured HH:MM launch time in the target zone is honored once, for
//! the very first cycle; every later cycle starts a fixed rest interval after
//! the previous one ended.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, Days, TimeZone, Utc};
use chrono_tz::Tz;
use tokio::process::{Child, Command};
use tracing::{error, info, warn};

use crate::config::CadenceConfig;
use crate::error::{PatrolError, Result};

/// How one subordinate run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// The subordinate exited on its own; `None` means killed by a signal.
    Exited(Option<i32>),
    /// The safety ceiling fired and the subordinate was force-terminated.
    TimedOut,
}

/// The next instant matching `hour:minute` in `tz` that is strictly in the
/// future of `now`: today's occurrence, or tomorrow's if already passed.
pub fn next_launch_after(now: DateTime<Utc>, tz: Tz, hour: u32, minute: u32) -> Result<DateTime<Utc>> {
    let local_now = now.with_timezone(&tz);
    let today_target = local_now
        .date_naive()
        .and_hms_opt(hour, minute, 0)
        .ok_or_else(|| {
            PatrolError::Config(format!("invalid launch time {hour:02}:{minute:02}"))
        })?;

    let resolve = |naive| {
        tz.from_local_datetime(&naive).earliest().ok_or_else(|| {
            PatrolError::Config(format!(
                "launch time {hour:02}:{minute:02} does not exist in {tz}"
            ))
        })
    };

    let mut candidate = resolve(today_target)?;
    if candidate <= local_now {
        let tomorrow = today_target
            .checked_add_days(Days::new(1))
            .ok_or_else(|| PatrolError::Config("launch date out of range".to_string()))?;
        candidate = resolve(tomorrow)?;
    }
    Ok(candidate.with_timezone(&Utc))
}

/// Append-only diagnostic log of cadence events. Never read back; write
/// failures are logged and otherwise ignored.
#[derive(Debug, Clone)]
pub struct EventLog {
    path: Option<PathBuf>,
    tz: Tz,
}

impl EventLog {
    pub fn new(path: Option<PathBuf>, tz: Tz) -> Self {
        Self { path, tz }
    }

    pub fn record(&self, message: &str) {
        let Some(path) = &self.path else { return };
        let stamp = Utc::now().with_timezone(&self.tz).format("%Y-%m-%d %H:%M:%S %Z");
        let line = format!("[{stamp}] {message}\n");
        let written = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .and_then(|mut file| file.write_all(line.as_bytes()));
        if let Err(err) = written {
            warn!(path = %path.display(), error = %err, "cadence event log write failed");
        }
    }
}

/// The forever loop. Only a failure of the scheduling logic itself (clock
/// computation, process spawn) returns, and the process then exits non-zero;
/// subordinate failures and safety kills are normal cycles.
pub async fn run_forever(config: &CadenceConfig, forwarded_args: &[String]) -> Result<()> {
    config.validate()?;
    let log = EventLog::new(config.event_log.clone(), config.timezone);

    let target = next_launch_after(
        Utc::now(),
        config.timezone,
        config.launch_hour,
        config.launch_minute,
    )?;
    let wait = (target - Utc::now()).to_std().unwrap_or_default();
    let local_target = target.with_timezone(&config.timezone);
    info!(
        launch = %local_target,
        wait_mins = wait.as_secs() / 60,
        "first launch scheduled"
    );
    log.record(&format!("first launch scheduled for {local_target}"));
    tokio::time::sleep(wait).await;

    let mut cycle: u64 = 1;
    loop {
        info!(cycle, "cycle starting");
        log.record(&format!("cycle #{cycle}: starting"));

        match run_subordinate(forwarded_args, config.safety_timeout).await {
            Ok(CycleOutcome::Exited(code)) => {
                info!(cycle, ?code, "subordinate finished");
                log.record(&format!("cycle #{cycle}: subordinate exited, code {code:?}"));
            }
            Ok(CycleOutcome::TimedOut) => {
                warn!(cycle, "subordinate force-terminated by safety timeout");
                log.record(&format!(
                    "cycle #{cycle}: force-terminated after safety timeout"
                ));
            }
            Err(err) => {
                error!(cycle, error = %err, "cadence loop failed");
                log.record(&format!("cycle #{cycle}: fatal: {err}"));
                return Err(err);
            }
        }

        let rest = config.rest_interval;
        let next = Utc::now()
            + chrono::Duration::from_std(rest).unwrap_or_else(|_| chrono::Duration::zero());
        info!(
            cycle,
            rest_hours = rest.as_secs() / 3600,
            next_run = %next.with_timezone(&config.timezone),
            "resting"
        );
        log.record(&format!(
            "cycle #{cycle}: resting until {}",
            next.with_timezone(&config.timezone)
        ));
        tokio::time::sleep(rest).await;
        cycle += 1;
    }
}

/// Spawns one bounded run of this same binary and supervises it.
async fn run_subordinate(forwarded_args: &[String], safety: Duration) -> Result<CycleOutcome> {
    let exe = std::env::current_exe()?;
    let child = Command::new(&exe).arg("run").args(forwarded_args).spawn()?;
    supervise(child, safety).await
}

/// Races the child against the safety ceiling; a child that overruns is
/// killed and reported as [`CycleOutcome::TimedOut`].
async fn supervise(mut child: Child, safety: Duration) -> Result<CycleOutcome> {
    tokio::select! {
        status = child.wait() => {
            let status = status?;
            Ok(CycleOutcome::Exited(status.code()))
        }
        _ = tokio::time::sleep(safety) => {
            warn!("safety timeout reached, terminating subordinate");
            if let Err(err) = child.kill().await {
                warn!(error = %err, "subordinate kill failed");
            }
            let _ = child.wait().await;
            Ok(CycleOutcome::TimedOut)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono_tz::Asia::Kolkata;

    #[test]
    fn launch_later_today_stays_today() {
        // 01:30 IST on Aug 7; 04:15 IST is still ahead.
        let now = Utc.with_ymd_and_hms(2026, 8, 6, 20, 0, 0).unwrap();
        let next = next_launch_after(now, Kolkata, 4, 15).unwrap();
        assert_eq!(next, Utc.with_ymd_and_hms(2026, 8, 6, 22, 45, 0).unwrap());
    }

    #[test]
    fn launch_already_passed_moves_to_tomorrow() {
        // 17:30 IST on Aug 7; 04:15 IST is long gone.
        let now = Utc.with_ymd_and_hms(2026, 8, 7, 12, 0, 0).unwrap();
        let next = next_launch_after(now, Kolkata, 4, 15).unwrap();
        assert_eq!(next, Utc.with_ymd_and_hms(2026, 8, 7, 22, 45, 0).unwrap());
    }

    #[test]
    fn launch_at_the_exact_instant_is_never_today() {
        let now = Utc.with_ymd_and_hms(2026, 8, 6, 22, 45, 0).unwrap();
        let next = next_launch_after(now, Kolkata, 4, 15).unwrap();
        assert!(next > now);
        assert_eq!(next, Utc.with_ymd_and_hms(2026, 8, 7, 22, 45, 0).unwrap());
    }

    #[test]
    fn tomorrow_crosses_month_boundaries() {
        // 04:30 IST on Feb 1, just past the launch minute.
        let now = Utc.with_ymd_and_hms(2026, 1, 31, 23, 0, 0).unwrap();
        let next = next_launch_after(now, Kolkata, 4, 15).unwrap();
        assert_eq!(next, Utc.with_ymd_and_hms(2026, 2, 1, 22, 45, 0).unwrap());
    }

    #[test]
    fn invalid_launch_time_is_rejected() {
        let now = Utc.with_ymd_and_hms(2026, 8, 7, 12, 0, 0).unwrap();
        assert!(next_launch_after(now, Kolkata, 24, 0).is_err());
        assert!(next_launch_after(now, Kolkata, 4, 60).is_err());
    }

    #[test]
    fn event_log_appends_stamped_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cadence.log");
        let log = EventLog::new(Some(path.clone()), Kolkata);
        log.record("cycle #1: starting");
        log.record("cycle #1: subordinate exited, code Some(0)");

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with('['));
        assert!(lines[0].ends_with("cycle #1: starting"));
        assert!(lines[1].contains("code Some(0)"));
    }

    #[test]
    fn event_log_without_path_is_a_no_op() {
        let log = EventLog::new(None, Kolkata);
        log.record("nothing to see");
    }

    #[tokio::test]
    async fn supervise_reports_clean_exit() {
        let child = Command::new("true").spawn().unwrap();
        let outcome = supervise(child, Duration::from_secs(5)).await.unwrap();
        assert_eq!(outcome, CycleOutcome::Exited(Some(0)));
    }

    #[tokio::test]
    async fn overrunning_child_is_killed() {
        let child = Command::new("sleep").arg("30").spawn().unwrap();
        let outcome = supervise(child, Duration::from_millis(50)).await.unwrap();
        assert_eq!(outcome, CycleOutcome::TimedOut);
    }
}
