//! Page instrumentation: an embedded listener payload that normalizes raw
//! interaction events into a page-local queue, and the host-side operations
//! that arm it and atomically drain it.
//!
//! The payload is idempotent per document (a marker guards installation), so
//! re-arming after a navigation never double-counts events. Every handler
//! body is individually guarded: one failing handler can neither break the
//! others nor crash the page.

use serde::Deserialize;

use crate::browser::{BrowserManager, SessionError};

/// Listener payload evaluated in the page. Pushes normalized event objects
/// onto a queue on the top window (falling back to the local window when the
/// top is cross-origin), and instruments same-origin subframes reachable at
/// install time. Returns a JSON install report.
pub const LISTENER_SCRIPT: &str = r##"
(() => {
    var queue;
    try {
        if (!window.top.__autobrowserEvents) window.top.__autobrowserEvents = [];
        queue = window.top.__autobrowserEvents;
    } catch (e) {
        if (!window.__autobrowserEvents) window.__autobrowserEvents = [];
        queue = window.__autobrowserEvents;
    }

    function push(ev) {
        try { queue.push(ev); } catch (e) {}
    }

    function cssPath(el) {
        if (!el || !el.tagName) return "";
        if (el.id) return "#" + el.id;
        var path = [];
        while (el && el.nodeType === 1 && el.tagName.toLowerCase() !== "html") {
            var seg = el.tagName.toLowerCase();
            if (el.className && typeof el.className === "string" && el.className.trim()) {
                seg += "." + el.className.trim().split(/\s+/).join(".");
            }
            var sib = el, nth = 1;
            while ((sib = sib.previousElementSibling)) {
                if (sib.tagName === el.tagName) nth++;
            }
            if (nth > 1) seg += ":nth-of-type(" + nth + ")";
            path.unshift(seg);
            el = el.parentElement;
        }
        return path.join(" > ");
    }

    function guarded(fn) {
        return function (e) {
            try { fn(e); } catch (err) {}
        };
    }

    function installInto(doc, win) {
        if (!doc || doc.__autobrowserInstalled) return false;
        doc.__autobrowserInstalled = true;

        // Click, unless the pointer pair that just ended classified as a drag.
        var suppressClick = false;
        doc.addEventListener("click", guarded(function (e) {
            if (suppressClick) { suppressClick = false; return; }
            push({ action: "click", selector: cssPath(e.target), ts: Date.now() });
        }), true);

        // Typing: per-selector debounce, queue only the settled value and
        // only when it differs from the last queued value for that selector.
        var debounceTimers = {};
        var lastValues = {};
        function queueInput(target) {
            var sel = cssPath(target);
            var val = target.value !== undefined ? target.value : (target.innerText || "");
            if (debounceTimers[sel]) clearTimeout(debounceTimers[sel]);
            debounceTimers[sel] = setTimeout(function () {
                debounceTimers[sel] = null;
                if (lastValues[sel] !== val) {
                    lastValues[sel] = val;
                    push({ action: "type", selector: sel, value: val, ts: Date.now() });
                }
            }, 550);
        }
        doc.addEventListener("input", guarded(function (e) { queueInput(e.target); }), true);
        doc.addEventListener("change", guarded(function (e) { queueInput(e.target); }), true);

        // Scroll: one event per quiescent gesture, final absolute offsets.
        var scrollTimer = null;
        win.addEventListener("scroll", guarded(function () {
            if (scrollTimer) clearTimeout(scrollTimer);
            scrollTimer = setTimeout(function () {
                scrollTimer = null;
                push({ action: "scroll", x: win.scrollX || 0, y: win.scrollY || 0, ts: Date.now() });
            }, 150);
        }), true);

        // Drag: a pointer-down/up pair is a drag when displacement reaches
        // 8px, and then suppresses the click the browser fires afterwards.
        var drag = { active: false, sx: 0, sy: 0, sel: "" };
        var downEvent = win.PointerEvent ? "pointerdown" : "mousedown";
        var upEvent = win.PointerEvent ? "pointerup" : "mouseup";
        doc.addEventListener(downEvent, guarded(function (e) {
            drag.active = true;
            drag.sx = e.clientX;
            drag.sy = e.clientY;
            drag.sel = cssPath(e.target);
        }), true);
        doc.addEventListener(upEvent, guarded(function (e) {
            if (!drag.active) return;
            drag.active = false;
            var dx = e.clientX - drag.sx;
            var dy = e.clientY - drag.sy;
            if (Math.sqrt(dx * dx + dy * dy) >= 8) {
                suppressClick = true;
                push({
                    action: "drag",
                    from: { selector: drag.sel, x: drag.sx, y: drag.sy },
                    to: { selector: cssPath(e.target), x: e.clientX, y: e.clientY },
                    ts: Date.now()
                });
            }
        }), true);

        // Same-document navigation and initial document-ready. Full-document
        // navigations are recorded host-side by whoever issues them.
        win.addEventListener("hashchange", guarded(function () {
            push({ action: "navigate", url: win.location.href, ts: Date.now() });
        }));
        win.addEventListener("popstate", guarded(function () {
            push({ action: "navigate", url: win.location.href, ts: Date.now() });
        }));
        doc.addEventListener("DOMContentLoaded", guarded(function () {
            push({ action: "navigate", url: win.location.href, ts: Date.now() });
        }));

        return true;
    }

    var installed = false;
    try { installed = installInto(document, window); } catch (e) {}

    var frames = 0;
    try {
        var iframes = document.querySelectorAll("iframe");
        for (var i = 0; i < iframes.length; i++) {
            try {
                // Cross-origin frames throw on contentDocument access and are
                // skipped silently.
                if (installInto(iframes[i].contentDocument, iframes[i].contentWindow)) frames++;
            } catch (e) {}
        }
    } catch (e) {}

    return JSON.stringify({ installed: installed, frames: frames });
})()
"##;

/// Atomic take-all-and-clear of the page-side queue. The single `splice`
/// makes the read-and-reset one step: no event can be observed twice or slip
/// between retrieval and reset.
pub const DRAIN_SCRIPT: &str = r##"
(() => {
    var queue = null;
    try { queue = window.top.__autobrowserEvents; } catch (e) {}
    if (!queue) queue = window.__autobrowserEvents;
    if (!queue) return "[]";
    try {
        return JSON.stringify(queue.splice(0, queue.length));
    } catch (e) {
        return "[]";
    }
})()
"##;

/// Outcome of one install attempt.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct InstallReport {
    /// False when this document's listeners were already armed.
    #[serde(rename = "installed")]
    pub newly_installed: bool,
    /// Same-origin subframes instrumented on this pass.
    pub frames: u32,
}

/// Arm the instrumentation in the current document (and reachable
/// same-origin subframes). Safe to call repeatedly; a page that forbids
/// script evaluation surfaces as an `Err` the caller may treat as non-fatal.
pub async fn install(browser: &BrowserManager) -> Result<InstallReport, SessionError> {
    let value = browser.evaluate(LISTENER_SCRIPT).await?;
    let raw = value
        .as_str()
        .ok_or_else(|| SessionError::Protocol("install report was not a string".into()))?;
    let report: InstallReport = serde_json::from_str(raw)
        .map_err(|e| SessionError::Protocol(format!("bad install report: {}", e)))?;
    tracing::debug!(
        "Instrumentation armed (new: {}, frames: {})",
        report.newly_installed,
        report.frames
    );
    Ok(report)
}

/// Arm the current document and register the payload to run in every future
/// document, so instrumentation survives full-document navigations.
pub async fn install_persistent(browser: &BrowserManager) -> Result<InstallReport, SessionError> {
    browser.register_on_new_document(LISTENER_SCRIPT).await?;
    install(browser).await
}

/// Atomically drain the page-side event queue. `Ok(vec![])` means a quiet
/// tick; `Err` means the drain call itself was rejected (session torn down,
/// page mid-navigation), which callers treat as an empty batch.
pub async fn drain(browser: &BrowserManager) -> Result<Vec<serde_json::Value>, SessionError> {
    let value = browser.evaluate(DRAIN_SCRIPT).await?;
    let raw = value
        .as_str()
        .ok_or_else(|| SessionError::Protocol("drain result was not a string".into()))?;
    serde_json::from_str(raw).map_err(|e| SessionError::Protocol(format!("bad drain batch: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_is_idempotent_per_document() {
        assert!(LISTENER_SCRIPT.contains("__autobrowserInstalled"));
    }

    #[test]
    fn payload_builds_structural_paths() {
        assert!(LISTENER_SCRIPT.contains("nth-of-type"));
        assert!(LISTENER_SCRIPT.contains("previousElementSibling"));
    }

    #[test]
    fn payload_classifies_drags_at_threshold() {
        assert!(LISTENER_SCRIPT.contains(">= 8"));
        assert!(LISTENER_SCRIPT.contains("suppressClick = true"));
    }

    #[test]
    fn payload_debounces_typing_and_scrolling() {
        assert!(LISTENER_SCRIPT.contains("550"));
        assert!(LISTENER_SCRIPT.contains("150"));
    }

    #[test]
    fn drain_is_a_single_splice() {
        assert!(DRAIN_SCRIPT.contains("splice(0, queue.length)"));
    }
}
