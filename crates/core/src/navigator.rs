//! The navigation state machine.
//!
//! Every completed top-level navigation re-enters the same sequence: record
//! activity, wait for the page to settle, re-arm the keep-alive probe,
//! classify the new address, and inject the matching behavior script. The
//! injected script is responsible for causing the next navigation; if it
//! never does, the watchdog takes over. Sub-frame navigations are filtered
//! out so they cannot interleave with top-level transitions.
//!
//! Injection failures are logged and swallowed; a session only ends when
//! its window expires or its initial navigation fails.

use std::sync::Arc;

use chromiumoxide::Page;
use chromiumoxide::cdp::browser_protocol::page::EventFrameNavigated;
use futures::StreamExt;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::classify::PageKind;
use crate::config::RunConfig;
use crate::error::Result;
use crate::scripts::ScriptSet;
use crate::session::SessionStats;

/// What a completed navigation leads to, decided purely from the page kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InjectionPlan {
    /// Thread page: record the reaction, then return home.
    ReactAndReturn,
    /// Queue-driven page: consume the next queue address.
    FetchNext,
    /// Thread-creation form: leave the page alone.
    Nothing,
}

/// Maps a page kind to the script that runs there.
pub fn plan(kind: PageKind) -> InjectionPlan {
    match kind {
        PageKind::Action => InjectionPlan::ReactAndReturn,
        PageKind::General => InjectionPlan::FetchNext,
        PageKind::Excluded => InjectionPlan::Nothing,
    }
}

/// Running navigation reactor for one session. Aborts its task on drop.
#[derive(Debug)]
pub struct Navigator {
    task: JoinHandle<()>,
}

impl Navigator {
    /// Subscribes to top-frame navigation events and starts reacting.
    pub async fn start(
        page: &Page,
        stats: Arc<SessionStats>,
        scripts: ScriptSet,
        config: &RunConfig,
        account: &str,
    ) -> Result<Self> {
        let mut events = page.event_listener::<EventFrameNavigated>().await?;
        let page = page.clone();
        let site = config.site.clone();
        let settle_delay = config.settle_delay;
        let inject_delay = config.inject_delay;
        let account = account.to_string();

        let task = tokio::spawn(async move {
            while let Some(event) = events.next().await {
                if event.frame.parent_id.is_some() {
                    debug!(target: "patrol::nav", account = %account, "ignoring sub-frame navigation");
                    continue;
                }
                let url = event.frame.url.clone();
                info!(target: "patrol::nav", account = %account, %url, "navigated");
                stats.touch();

                sleep(settle_delay).await;

                // Keep-alive is re-armed on every page, whatever kind it is.
                if let Err(err) = page.evaluate(scripts.keep_alive.clone()).await {
                    warn!(target: "patrol::nav", account = %account, error = %err, "keep-alive injection failed");
                }

                match plan(site.classify(&url)) {
                    InjectionPlan::ReactAndReturn => {
                        sleep(inject_delay).await;
                        match page.evaluate(scripts.react_and_return.clone()).await {
                            Ok(_) => {
                                let cycles = stats.note_cycle();
                                stats.note_injection(&url);
                                info!(
                                    target: "patrol::nav",
                                    account = %account,
                                    cycles,
                                    "thread page, injected react-and-return"
                                );
                            }
                            Err(err) => {
                                warn!(target: "patrol::nav", account = %account, error = %err, "react-and-return injection failed");
                            }
                        }
                    }
                    InjectionPlan::FetchNext => {
                        sleep(inject_delay).await;
                        match page.evaluate(scripts.fetch_next.clone()).await {
                            Ok(_) => {
                                stats.note_injection(&url);
                                info!(target: "patrol::nav", account = %account, "general page, injected fetch-next");
                            }
                            Err(err) => {
                                warn!(target: "patrol::nav", account = %account, error = %err, "fetch-next injection failed");
                            }
                        }
                    }
                    InjectionPlan::Nothing => {
                        info!(target: "patrol::nav", account = %account, "compose page, injecting nothing");
                    }
                }
            }
        });

        Ok(Self { task })
    }

    pub fn shutdown(&self) {
        self.task.abort();
    }
}

impl Drop for Navigator {
    fn drop(&mut self) {
        self.task.abort();
    }
}
