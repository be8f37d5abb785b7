//! Host-side HTTP bridge for page-context scripts.
//!
//! Injected scripts run inside the page's origin and may find direct network
//! access blocked by cross-origin policy. The bridge gives them one narrow
//! escape hatch: `window.bridgeFetch(url, init?)` returns a promise that
//! resolves to the response body text or rejects with the failure message.
//!
//! Mechanically: a CDP binding carries a JSON request out of the page, a host
//! task performs the real HTTP call, and the result is delivered back by
//! evaluating a completion call in the page. The request carries the HTTP
//! method and body so queue write-backs keep working when direct `fetch`
//! is unavailable.

use chromiumoxide::Page;
use chromiumoxide::cdp::browser_protocol::page::AddScriptToEvaluateOnNewDocumentParams;
use chromiumoxide::cdp::js_protocol::runtime::{AddBindingParams, EventBindingCalled};
use futures::StreamExt;
use serde::Deserialize;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::error::{PatrolError, Result};

/// Name of the CDP binding the page-side stub calls.
pub const BRIDGE_BINDING: &str = "__patrolBridgeSend";

/// One request carried over the binding.
#[derive(Debug, Deserialize)]
struct BridgeRequest {
    id: u64,
    url: String,
    #[serde(default)]
    method: Option<String>,
    #[serde(default)]
    body: Option<String>,
}

/// Page-side stub: registers `bridgeFetch` and the delivery callback.
fn bootstrap_script() -> String {
    format!(
        r#"(() => {{
    if (window.__patrolBridgeReady) return;
    window.__patrolBridgeReady = true;
    const pending = new Map();
    let seq = 0;
    window.bridgeFetch = (url, init) => new Promise((resolve, reject) => {{
        if (typeof window.{binding} !== 'function') {{
            reject(new Error('bridge unavailable'));
            return;
        }}
        const id = ++seq;
        pending.set(id, {{ resolve, reject }});
        window.{binding}(JSON.stringify({{
            id,
            url,
            method: (init && init.method) || 'GET',
            body: (init && init.body) || null
        }}));
    }});
    window.__patrolBridgeDeliver = (id, ok, body) => {{
        const entry = pending.get(id);
        if (!entry) return;
        pending.delete(id);
        if (ok) entry.resolve(body); else entry.reject(new Error(body));
    }};
}})()"#,
        binding = BRIDGE_BINDING,
    )
}

/// Running bridge relay for one page. Aborts its task on drop.
#[derive(Debug)]
pub struct Bridge {
    relay: JoinHandle<()>,
}

impl Bridge {
    /// Registers the binding and stub on `page` and starts the relay task.
    pub async fn install(page: &Page) -> Result<Self> {
        // Best-effort: binding events only flow while the Runtime domain is on.
        let _ = page
            .execute(chromiumoxide::cdp::js_protocol::runtime::EnableParams::default())
            .await;

        let binding = AddBindingParams::builder()
            .name(BRIDGE_BINDING)
            .build()
            .map_err(PatrolError::Injection)?;
        page.execute(binding).await?;

        let stub = bootstrap_script();
        let on_new_document = AddScriptToEvaluateOnNewDocumentParams::builder()
            .source(stub.clone())
            .build()
            .map_err(PatrolError::Injection)?;
        page.execute(on_new_document).await?;
        // The page may already be past its document-start scripts.
        page.evaluate(stub).await?;

        let mut events = page.event_listener::<EventBindingCalled>().await?;
        let relay_page = page.clone();
        let relay = tokio::spawn(async move {
            let http = reqwest::Client::new();
            while let Some(event) = events.next().await {
                if event.name != BRIDGE_BINDING {
                    continue;
                }
                let request: BridgeRequest = match serde_json::from_str(&event.payload) {
                    Ok(request) => request,
                    Err(err) => {
                        warn!(error = %err, "malformed bridge payload");
                        continue;
                    }
                };
                let page = relay_page.clone();
                let http = http.clone();
                tokio::spawn(async move {
                    let id = request.id;
                    let outcome = perform(&http, request).await;
                    deliver(&page, id, outcome).await;
                });
            }
        });

        Ok(Self { relay })
    }

    pub fn shutdown(&self) {
        self.relay.abort();
    }
}

impl Drop for Bridge {
    fn drop(&mut self) {
        self.relay.abort();
    }
}

/// Performs the real HTTP call; the error channel is a plain message string.
async fn perform(http: &reqwest::Client, request: BridgeRequest) -> std::result::Result<String, String> {
    let method = request.method.as_deref().unwrap_or("GET");
    let builder = match method {
        "GET" => http.get(&request.url),
        "PUT" => {
            let mut builder = http
                .put(&request.url)
                .header(reqwest::header::CONTENT_TYPE, "application/json");
            if let Some(body) = request.body {
                builder = builder.body(body);
            }
            builder
        }
        other => return Err(format!("unsupported method {other}")),
    };

    let response = builder.send().await.map_err(|e| e.to_string())?;
    let status = response.status();
    if !status.is_success() {
        return Err(format!("HTTP {status}"));
    }
    response.text().await.map_err(|e| e.to_string())
}

/// Resolves or rejects the pending promise inside the page.
async fn deliver(page: &Page, id: u64, outcome: std::result::Result<String, String>) {
    let (ok, body) = match &outcome {
        Ok(body) => (true, body.as_str()),
        Err(message) => (false, message.as_str()),
    };
    let encoded = match serde_json::to_string(body) {
        Ok(encoded) => encoded,
        Err(_) => return,
    };
    let call = format!("window.__patrolBridgeDeliver({id}, {ok}, {encoded})");
    match page.evaluate(call).await {
        Ok(_) => debug!(id, ok, "bridge response delivered"),
        Err(err) => warn!(id, error = %err, "bridge delivery failed"),
    }
}
