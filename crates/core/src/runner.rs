//! Session lifecycle: one browser, one account at a time.
//!
//! `run_all` launches a single hardened browser and runs each configured
//! account strictly sequentially; `run_account` owns one session end to end:
//! configure the page, wire up listeners, supervisor and navigator, perform
//! the initial navigation, then idle in a status loop until the wall-clock
//! window expires. Teardown is RAII: every spawned task aborts when its
//! handle drops, whatever the exit path.
//!
//! A failure inside one session aborts that account only; the next account
//! still runs. Browser launch failure aborts the whole run.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::emulation::{
    SetDeviceMetricsOverrideParams, SetUserAgentOverrideParams,
};
use chromiumoxide::cdp::browser_protocol::network::EventLoadingFailed;
use chromiumoxide::cdp::browser_protocol::page::{
    AddScriptToEvaluateOnNewDocumentParams, CloseParams,
};
use chromiumoxide::cdp::js_protocol::runtime::{
    ConsoleApiCalledType, EventConsoleApiCalled, EventExceptionThrown, RemoteObject,
};
use chromiumoxide::Page;
use futures::StreamExt;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use crate::account::Account;
use crate::bridge::Bridge;
use crate::classify::SiteProfile;
use crate::config::RunConfig;
use crate::error::{PatrolError, Result};
use crate::navigator::Navigator;
use crate::scripts::ScriptSet;
use crate::session::SessionStats;
use crate::supervisor::Supervisor;

/// Production launch flag set, minus sandboxing which chromiumoxide's
/// builder handles itself.
const HARDENING_ARGS: &[&str] = &[
    "--disable-setuid-sandbox",
    "--disable-blink-features=AutomationControlled",
    "--disable-web-security",
    "--disable-features=IsolateOrigins,site-per-process",
    "--disable-dev-shm-usage",
    "--disable-gpu",
    "--no-zygote",
];

/// Runs before any page script on every navigation and hides the usual
/// automation tells.
const CONCEAL_AUTOMATION_JS: &str = r#"(() => {
    Object.defineProperty(navigator, 'webdriver', { get: () => undefined });
    window.chrome = { runtime: {}, loadTimes: function() {}, csi: function() {}, app: {} };
    Object.defineProperty(navigator, 'plugins', { get: () => [1, 2, 3, 4, 5] });
    Object.defineProperty(navigator, 'languages', { get: () => ['en-US', 'en'] });
    const originalQuery = window.navigator.permissions.query;
    window.navigator.permissions.query = (parameters) =>
        parameters.name === 'notifications'
            ? Promise.resolve({ state: Notification.permission })
            : originalQuery(parameters);
})()"#;

/// Runs every configured account once, sequentially, inside one browser.
pub async fn run_all(accounts: &[Account], config: &RunConfig) -> Result<()> {
    if accounts.is_empty() {
        return Err(PatrolError::Config("no accounts to run".to_string()));
    }
    info!(accounts = accounts.len(), "starting bounded run");

    let (mut browser, drain) = launch_browser(config).await?;

    for account in accounts {
        if let Err(err) = run_account(&browser, account, config).await {
            error!(account = %account.name, error = %err, "session aborted");
        }
    }

    if let Err(err) = browser.close().await {
        warn!(error = %err, "browser close failed");
    }
    let _ = browser.wait().await;
    drain.abort();
    info!("all accounts completed");
    Ok(())
}

/// Owns one session for one account: open, drive, always close.
pub async fn run_account(browser: &Browser, account: &Account, config: &RunConfig) -> Result<u32> {
    info!(account = %account.name, "session starting");
    let page = browser.new_page("about:blank").await?;
    let stats = SessionStats::new();

    let result = drive_session(&page, account, config, &stats).await;

    if let Err(err) = page.execute(CloseParams::default()).await {
        debug!(account = %account.name, error = %err, "page close failed");
    }
    info!(
        account = %account.name,
        cycles = stats.cycles(),
        restarts = stats.restarts(),
        "session ended"
    );
    result.map(|()| stats.cycles())
}

/// Everything between page creation and teardown. The supervisor, navigator,
/// listener and bridge handles all live on this stack frame, so returning
/// (by completion or by error) cancels the lot.
async fn drive_session(
    page: &Page,
    account: &Account,
    config: &RunConfig,
    stats: &Arc<SessionStats>,
) -> Result<()> {
    configure_page(page, account, config).await?;

    let _bridge = Bridge::install(page).await?;
    let _listeners = spawn_listeners(page, stats.clone(), &account.name).await?;
    let scripts = ScriptSet::render(&config.site, &config.queue_url);
    let _navigator = Navigator::start(page, stats.clone(), scripts, config, &account.name).await?;
    let _supervisor = Supervisor::start(page.clone(), stats.clone(), config, &account.name);

    let start_url = start_address(account, &config.site);
    initial_navigation(page, &start_url, config.nav_timeout).await?;

    status_loop(config, stats, &account.name).await;
    Ok(())
}

/// The account's starting address, defaulting to the site root.
fn start_address(account: &Account, site: &SiteProfile) -> String {
    account
        .start_url
        .clone()
        .unwrap_or_else(|| site.root().to_string())
}

async fn launch_browser(config: &RunConfig) -> Result<(Browser, JoinHandle<()>)> {
    let mut builder = BrowserConfig::builder()
        .no_sandbox()
        .window_size(config.viewport_width, config.viewport_height);
    for arg in HARDENING_ARGS {
        builder = builder.arg(*arg);
    }
    if !config.headless {
        builder = builder.with_head();
    }
    let executable = config
        .chrome_executable
        .clone()
        .or_else(|| std::env::var_os("CHROME_PATH").map(PathBuf::from))
        .or_else(|| std::env::var_os("PATROL_CHROME").map(PathBuf::from));
    if let Some(path) = executable {
        builder = builder.chrome_executable(path);
    }

    let browser_config = builder.build().map_err(PatrolError::BrowserLaunch)?;
    let (browser, mut handler) = Browser::launch(browser_config)
        .await
        .map_err(|e| PatrolError::BrowserLaunch(e.to_string()))?;
    let drain = tokio::spawn(async move { while handler.next().await.is_some() {} });
    info!(headless = config.headless, "browser launched");
    Ok((browser, drain))
}

/// Identity headers, viewport, automation concealment, cookies.
async fn configure_page(page: &Page, account: &Account, config: &RunConfig) -> Result<()> {
    page.execute(
        SetUserAgentOverrideParams::builder()
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(PatrolError::Config)?,
    )
    .await?;

    page.execute(
        SetDeviceMetricsOverrideParams::builder()
            .width(i64::from(config.viewport_width))
            .height(i64::from(config.viewport_height))
            .device_scale_factor(1.0)
            .mobile(false)
            .build()
            .map_err(PatrolError::Config)?,
    )
    .await?;

    page.execute(
        AddScriptToEvaluateOnNewDocumentParams::builder()
            .source(CONCEAL_AUTOMATION_JS)
            .build()
            .map_err(PatrolError::Config)?,
    )
    .await?;

    for cookie in &account.cookies {
        page.execute(cookie.to_params()?).await?;
    }
    if !account.cookies.is_empty() {
        info!(account = %account.name, count = account.cookies.len(), "cookies set");
    }
    Ok(())
}

/// Console, exception and request-failure listeners. Each one relays to the
/// log and counts as session activity; none of them can fail the session.
struct Listeners {
    handles: Vec<JoinHandle<()>>,
}

impl Listeners {
    fn shutdown(&self) {
        for handle in &self.handles {
            handle.abort();
        }
    }
}

impl Drop for Listeners {
    fn drop(&mut self) {
        self.shutdown();
    }
}

async fn spawn_listeners(
    page: &Page,
    stats: Arc<SessionStats>,
    account: &str,
) -> Result<Listeners> {
    // Best-effort domain enables; the events below are silent without them.
    let _ = page
        .execute(chromiumoxide::cdp::js_protocol::runtime::EnableParams::default())
        .await;
    let _ = page
        .execute(chromiumoxide::cdp::browser_protocol::network::EnableParams::default())
        .await;

    let mut handles = Vec::with_capacity(3);

    let mut console = page.event_listener::<EventConsoleApiCalled>().await?;
    {
        let stats = stats.clone();
        let account = account.to_string();
        handles.push(tokio::spawn(async move {
            while let Some(event) = console.next().await {
                let text = console_text(&event.args);
                if matches!(event.r#type, ConsoleApiCalledType::Error) {
                    warn!(target: "patrol::page", account = %account, %text, "console error");
                } else {
                    info!(target: "patrol::page", account = %account, %text, "console");
                }
                stats.touch();
            }
        }));
    }

    let mut exceptions = page.event_listener::<EventExceptionThrown>().await?;
    {
        let stats = stats.clone();
        let account = account.to_string();
        handles.push(tokio::spawn(async move {
            while let Some(event) = exceptions.next().await {
                warn!(
                    target: "patrol::page",
                    account = %account,
                    text = %event.exception_details.text,
                    "page exception"
                );
                stats.touch();
            }
        }));
    }

    let mut failures = page.event_listener::<EventLoadingFailed>().await?;
    {
        let account = account.to_string();
        handles.push(tokio::spawn(async move {
            while let Some(event) = failures.next().await {
                debug!(
                    target: "patrol::page",
                    account = %account,
                    error = %event.error_text,
                    "request failed"
                );
                stats.touch();
            }
        }));
    }

    Ok(Listeners { handles })
}

/// Readable rendition of console call arguments.
fn console_text(args: &[RemoteObject]) -> String {
    args.iter()
        .map(|arg| {
            if let Some(value) = &arg.value {
                match value {
                    serde_json::Value::String(s) => s.clone(),
                    other => other.to_string(),
                }
            } else if let Some(description) = &arg.description {
                description.clone()
            } else {
                "<object>".to_string()
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

async fn initial_navigation(page: &Page, url: &str, timeout: Duration) -> Result<()> {
    info!(%url, "initial navigation");
    match tokio::time::timeout(timeout, page.goto(url)).await {
        Ok(Ok(_)) => Ok(()),
        Ok(Err(source)) => Err(PatrolError::Navigation {
            url: url.to_string(),
            source,
        }),
        Err(_) => Err(PatrolError::Timeout {
            ms: timeout.as_millis() as u64,
            condition: format!("navigation to {url}"),
        }),
    }
}

/// Logs a status line every interval until the run window is spent.
async fn status_loop(config: &RunConfig, stats: &SessionStats, account: &str) {
    loop {
        info!(
            account = %account,
            elapsed_mins = stats.elapsed().as_secs() / 60,
            remaining_mins = config.run_window.saturating_sub(stats.elapsed()).as_secs() / 60,
            cycles = stats.cycles(),
            restarts = stats.restarts(),
            last_injected = stats.last_injected().as_deref().unwrap_or("none"),
            "status"
        );
        match config.run_window.checked_sub(stats.elapsed()) {
            Some(remaining) if !remaining.is_zero() => {
                sleep(remaining.min(config.status_interval)).await;
            }
            _ => break,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn start_address_defaults_to_site_root() {
        let site = SiteProfile::new("https://site");
        let account = Account {
            name: "a".into(),
            start_url: None,
            cookies: Vec::new(),
        };
        assert_eq!(start_address(&account, &site), "https://site");

        let account = Account {
            name: "a".into(),
            start_url: Some("https://site/forums/news/".into()),
            cookies: Vec::new(),
        };
        assert_eq!(start_address(&account, &site), "https://site/forums/news/");
    }

    #[test]
    fn console_text_renders_mixed_arguments() {
        let args: Vec<RemoteObject> = serde_json::from_value(serde_json::json!([
            {"type": "string", "value": "[fetch-next] reading queue"},
            {"type": "number", "value": 3},
            {"type": "object", "description": "DOMException"},
        ]))
        .unwrap();
        assert_eq!(
            console_text(&args),
            "[fetch-next] reading queue 3 DOMException"
        );
    }

    #[test]
    fn hardening_args_conceal_automation() {
        assert!(HARDENING_ARGS
            .iter()
            .any(|a| a.contains("AutomationControlled")));
        assert!(CONCEAL_AUTOMATION_JS.contains("webdriver"));
    }
}
