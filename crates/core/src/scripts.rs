//! Page-context behavior scripts.
//!
//! The state machine never manipulates the DOM itself; it injects one of
//! three scripts rendered here and waits for the navigation that script
//! eventually causes. Each script carries an idempotency latch on `window`:
//! set before any work starts, cleared only by the error path after a release
//! delay, never reset by re-injection. Injecting a script while an instance
//! is active is a no-op.
//!
//! Network access from the page falls back to the host [`bridge`] when direct
//! `fetch` is blocked by cross-origin policy.
//!
//! [`bridge`]: crate::bridge

use crate::classify::SiteProfile;

/// DOM selector of the reaction control on a thread page.
pub const REACTION_SELECTOR: &str = r#"a.reaction[data-reaction-id="1"]"#;

/// Attempts to find the reaction control before giving up.
pub const REACT_MAX_RETRIES: u32 = 20;
/// Pause between attempts, milliseconds.
pub const REACT_RETRY_DELAY_MS: u64 = 500;
/// Pause before the return navigation, milliseconds.
pub const REACT_REDIRECT_DELAY_MS: u64 = 1000;

/// Pause before the fetched address is navigated to, milliseconds.
pub const FETCH_REDIRECT_DELAY_MS: u64 = 3000;
/// Latch release delay after a fetch-next failure, milliseconds.
pub const FETCH_RETRY_RELEASE_MS: u64 = 5000;

/// Keep-alive probe period, milliseconds.
pub const KEEP_ALIVE_CHECK_MS: u64 = 60_000;
/// In-page idle ceiling before the probe complains, milliseconds.
pub const KEEP_ALIVE_MAX_IDLE_MS: u64 = 300_000;

/// Renders a Rust string as a quoted JavaScript string literal.
fn js_str(value: &str) -> String {
    serde_json::to_string(value).expect("strings always serialize")
}

/// The three scripts a session injects, rendered once per run.
#[derive(Debug, Clone)]
pub struct ScriptSet {
    pub keep_alive: String,
    pub fetch_next: String,
    pub react_and_return: String,
}

impl ScriptSet {
    pub fn render(site: &SiteProfile, queue_url: &str) -> Self {
        Self {
            keep_alive: keep_alive_script(),
            fetch_next: fetch_next_script(site, queue_url),
            react_and_return: react_and_return_script(site),
        }
    }
}

/// Keep-alive probe: tracks in-page activity and periodically reads
/// `document.title` so a wedged renderer shows up in the console log.
pub fn keep_alive_script() -> String {
    format!(
        r#"(() => {{
    'use strict';
    if (window.__keepAliveActive) return;
    window.__keepAliveActive = true;

    const CHECK_INTERVAL = {check_ms};
    const MAX_IDLE = {max_idle_ms};
    let lastActivity = Date.now();

    ['click', 'keydown', 'scroll', 'mousemove'].forEach(event => {{
        document.addEventListener(event, () => {{ lastActivity = Date.now(); }}, {{ passive: true }});
    }});

    setInterval(() => {{
        const idle = Date.now() - lastActivity;
        console.log('[keep-alive] idle ' + Math.floor(idle / 60000) + 'min');
        if (idle > MAX_IDLE) {{
            try {{
                console.log('[keep-alive] probing title:', document.title);
                lastActivity = Date.now();
            }} catch (e) {{
                console.error('[keep-alive] page unresponsive:', e);
            }}
        }}
    }}, CHECK_INTERVAL);
}})()"#,
        check_ms = KEEP_ALIVE_CHECK_MS,
        max_idle_ms = KEEP_ALIVE_MAX_IDLE_MS,
    )
}

/// Fetch-Next: consume the first queue address and navigate to it.
///
/// One attempt per injection; the latch is released after a delay only on
/// the error path so a later navigation can retry. An empty queue stops the
/// cycle without navigating; recovery is the watchdog's job.
pub fn fetch_next_script(site: &SiteProfile, queue_url: &str) -> String {
    format!(
        r#"(() => {{
    'use strict';
    if (window.__fetchNextActive) {{
        console.log('[fetch-next] already active, skipping');
        return;
    }}
    window.__fetchNextActive = true;

    const QUEUE_URL = {queue_url};
    const THREAD_PREFIX = {thread_prefix};
    const SECTION_PREFIX = {section_prefix};
    const COMPOSE_MARKER = {compose_marker};
    const here = window.location.href;

    if (here.startsWith(THREAD_PREFIX)) {{
        console.log('[fetch-next] on a thread page, not running here');
        window.__fetchNextActive = false;
        return;
    }}
    if (here.includes(SECTION_PREFIX) && here.includes(COMPOSE_MARKER)) {{
        console.log('[fetch-next] on the compose page, not running here');
        window.__fetchNextActive = false;
        return;
    }}

    async function fetchWithFallback(url, options) {{
        try {{
            return await fetch(url, options || {{}});
        }} catch (e) {{
            console.log('[fetch-next] direct fetch failed, trying bridge');
        }}
        if (typeof window.bridgeFetch === 'function') {{
            const text = await window.bridgeFetch(url, options || {{}});
            return {{
                ok: true,
                text: async () => text,
                json: async () => JSON.parse(text)
            }};
        }}
        throw new Error('no fetch method available');
    }}

    async function consumeFirst() {{
        try {{
            console.log('[fetch-next] reading queue');
            const response = await fetchWithFallback(QUEUE_URL);
            const blob = await response.json();
            if (!blob || blob.trim() === '') {{
                console.log('[fetch-next] queue is empty');
                return;
            }}

            const links = blob.trim().split(/\s+/);
            const first = links[0];
            if (!first.startsWith('http')) {{
                console.log('[fetch-next] malformed address:', first);
                return;
            }}

            links.shift();
            await fetchWithFallback(QUEUE_URL, {{
                method: 'PUT',
                headers: {{ 'Content-Type': 'application/json' }},
                body: JSON.stringify(links.join(' '))
            }});
            console.log('[fetch-next] removed first address,', links.length, 'remaining');

            setTimeout(() => {{
                console.log('[fetch-next] navigating to', first);
                window.location.href = first;
            }}, {redirect_ms});
        }} catch (err) {{
            console.error('[fetch-next] error:', err);
            setTimeout(() => {{ window.__fetchNextActive = false; }}, {release_ms});
        }}
    }}

    setTimeout(consumeFirst, 1000);
}})()"#,
        queue_url = js_str(queue_url),
        thread_prefix = js_str(&site.thread_prefix()),
        section_prefix = js_str(&site.section_prefix()),
        compose_marker = js_str(site.compose_marker()),
        redirect_ms = FETCH_REDIRECT_DELAY_MS,
        release_ms = FETCH_RETRY_RELEASE_MS,
    )
}

/// React-and-Return: trigger the reaction control on a thread page, then
/// navigate back to the site root whether or not it was found.
pub fn react_and_return_script(site: &SiteProfile) -> String {
    format!(
        r#"(() => {{
    'use strict';
    const THREAD_PREFIX = {thread_prefix};
    if (!window.location.href.startsWith(THREAD_PREFIX)) {{
        console.log('[react-return] not a thread page, skipping');
        return;
    }}
    if (window.__reactReturnActive) {{
        console.log('[react-return] already active, skipping');
        return;
    }}
    window.__reactReturnActive = true;

    const SELECTOR = {selector};
    const MAX_RETRIES = {max_retries};
    const RETRY_DELAY = {retry_ms};
    const REDIRECT_DELAY = {redirect_ms};
    let attempts = 0;

    function goHome() {{
        setTimeout(() => {{
            console.log('[react-return] returning to', {root});
            window.location.href = {root};
        }}, 1000);
    }}

    function tryReact() {{
        const control = document.querySelector(SELECTOR);
        if (!control) {{
            attempts++;
            if (attempts < MAX_RETRIES) {{
                setTimeout(tryReact, RETRY_DELAY);
            }} else {{
                console.log('[react-return] control not found after ' + MAX_RETRIES + ' attempts');
                goHome();
            }}
            return;
        }}

        if (control.classList.contains('is-active') || control.classList.contains('active')) {{
            console.log('[react-return] already activated, leaving it');
        }} else {{
            try {{
                control.click();
                console.log('[react-return] reaction recorded');
            }} catch (e) {{
                console.error('[react-return] click failed:', e);
            }}
        }}
        setTimeout(goHome, REDIRECT_DELAY);
    }}

    setTimeout(tryReact, 1500);
}})()"#,
        thread_prefix = js_str(&site.thread_prefix()),
        selector = js_str(REACTION_SELECTOR),
        max_retries = REACT_MAX_RETRIES,
        retry_ms = REACT_RETRY_DELAY_MS,
        redirect_ms = REACT_REDIRECT_DELAY_MS,
        root = js_str(site.root()),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn site() -> SiteProfile {
        SiteProfile::new("https://site")
    }

    #[test]
    fn js_str_escapes_quotes_and_backslashes() {
        assert_eq!(js_str(r#"a"b\c"#), r#""a\"b\\c""#);
    }

    #[test]
    fn every_script_is_latch_guarded() {
        let set = ScriptSet::render(&site(), "https://queue/links.json");
        assert!(set.keep_alive.contains("window.__keepAliveActive"));
        assert!(set.fetch_next.contains("window.__fetchNextActive"));
        assert!(set.react_and_return.contains("window.__reactReturnActive"));
    }

    #[test]
    fn fetch_next_embeds_queue_url_and_site_guards() {
        let script = fetch_next_script(&site(), "https://queue/links.json");
        assert!(script.contains(r#""https://queue/links.json""#));
        assert!(script.contains(r#""https://site/threads/""#));
        assert!(script.contains(r#""https://site/forums/""#));
        assert!(script.contains(r#""post-thread""#));
        // The error path releases the latch; the success path never does.
        assert!(script.contains("window.__fetchNextActive = false"));
    }

    #[test]
    fn react_and_return_embeds_bounded_retry_schedule() {
        let script = react_and_return_script(&site());
        assert!(script.contains("const MAX_RETRIES = 20"));
        assert!(script.contains("const RETRY_DELAY = 500"));
        assert!(script.contains("const REDIRECT_DELAY = 1000"));
        assert!(script.contains(r#"data-reaction-id=\"1\""#));
        // Worst case stays bounded: retries * delay + redirect slack.
        let worst_ms = u64::from(REACT_MAX_RETRIES) * REACT_RETRY_DELAY_MS
            + REACT_REDIRECT_DELAY_MS
            + 1000;
        assert!(worst_ms <= 12_000);
    }

    #[test]
    fn react_and_return_always_navigates_home() {
        let script = react_and_return_script(&site());
        // Both the found and not-found paths route through goHome.
        assert_eq!(script.matches("goHome()").count(), 2);
        assert!(script.contains(r#"window.location.href = "https://site""#));
    }
}
