use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::input::{
    DispatchMouseEventParams, DispatchMouseEventType, MouseButton,
};
use chromiumoxide::cdp::browser_protocol::page::{
    AddScriptToEvaluateOnNewDocumentParams, CaptureScreenshotFormat,
};
use chromiumoxide::{Element, Page};
use futures_util::StreamExt;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Mutex;
use tokio::time::timeout;

/// Errors at the automation boundary. Callers need to tell a resolution miss
/// (skip the step) apart from a dispatch failure (try the fallback, then
/// count the step as failed).
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("no browser session attached")]
    NoSession,

    #[error("no element for locator '{0}'")]
    NotFound(String),

    #[error("dispatch failed on '{locator}': {message}")]
    Dispatch { locator: String, message: String },

    #[error("browser protocol error: {0}")]
    Protocol(String),
}

impl SessionError {
    fn protocol(e: impl std::fmt::Display) -> Self {
        SessionError::Protocol(e.to_string())
    }

    fn dispatch(locator: &str, e: impl std::fmt::Display) -> Self {
        SessionError::Dispatch {
            locator: locator.to_string(),
            message: e.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
        }
    }
}

/// Pause between the phases of a native drag so the page can observe the
/// gesture as distinct pointer states.
const DRAG_STEP_PAUSE: Duration = Duration::from_millis(60);

/// Manages the browser lifecycle and exposes the operations the recording
/// bridge and playback engine need: script evaluation, locator resolution,
/// element dispatch, navigation, and viewport capture.
pub struct BrowserManager {
    browser: Arc<Mutex<Option<Browser>>>,
    page: Arc<Mutex<Option<Page>>>,
    /// Serializes launches so two control calls cannot race two Chromes up.
    launch_lock: Mutex<()>,
}

impl BrowserManager {
    pub fn new() -> Self {
        Self {
            browser: Arc::new(Mutex::new(None)),
            page: Arc::new(Mutex::new(None)),
            launch_lock: Mutex::new(()),
        }
    }

    /// Launch a browser and navigate it to `url`, replacing any session that
    /// is already attached.
    pub async fn launch(
        &self,
        url: &str,
        headless: bool,
        viewport: Option<Viewport>,
    ) -> Result<(), SessionError> {
        let _launch_guard = self.launch_lock.lock().await;

        // Close any existing browser first
        self.close().await.ok();

        let viewport = viewport.unwrap_or_default();

        let mut config = BrowserConfig::builder().window_size(viewport.width, viewport.height);

        if !headless {
            config = config.with_head();
        }

        // Disable automation detection flags and extras that open stray
        // windows.
        config = config
            .arg("--disable-blink-features=AutomationControlled")
            .arg("--disable-infobars")
            .arg("--no-first-run")
            .arg("--no-default-browser-check")
            .arg("--disable-default-apps")
            .arg("--disable-extensions");

        let config = config.build().map_err(SessionError::Protocol)?;

        // Bound the launch so an unresponsive Chrome cannot hang the caller.
        let (browser, mut handler) = timeout(Duration::from_secs(30), Browser::launch(config))
            .await
            .map_err(|_| {
                SessionError::Protocol(
                    "browser launch timeout (30s) - Chrome may not be installed or is unresponsive"
                        .to_string(),
                )
            })?
            .map_err(SessionError::protocol)?;

        // Drain browser events in the background.
        tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                tracing::trace!("Browser event: {:?}", event);
            }
        });

        tokio::time::sleep(Duration::from_millis(50)).await;

        // The fresh browser opens a default blank page; close it after our
        // target page exists so only one window stays visible.
        let default_pages = browser.pages().await.map_err(SessionError::protocol)?;

        let page = browser
            .new_page(url)
            .await
            .map_err(SessionError::protocol)?;

        for default_page in default_pages {
            if let Err(e) = default_page.close().await {
                tracing::warn!("Failed to close default page: {}", e);
            }
        }

        let emulation = chromiumoxide::cdp::browser_protocol::emulation::SetDeviceMetricsOverrideParams::builder()
            .width(viewport.width as i64)
            .height(viewport.height as i64)
            .device_scale_factor(1.0)
            .mobile(false)
            .build()
            .map_err(SessionError::Protocol)?;

        page.execute(emulation)
            .await
            .map_err(SessionError::protocol)?;

        *self.browser.lock().await = Some(browser);
        *self.page.lock().await = Some(page);

        tracing::info!("Browser launched and navigated to {}", url);
        Ok(())
    }

    pub async fn has_session(&self) -> bool {
        self.page.lock().await.is_some()
    }

    async fn page(&self) -> Result<Page, SessionError> {
        self.page
            .lock()
            .await
            .clone()
            .ok_or(SessionError::NoSession)
    }

    pub async fn current_url(&self) -> Result<String, SessionError> {
        let page = self.page().await?;
        page.url()
            .await
            .map_err(SessionError::protocol)?
            .ok_or_else(|| SessionError::Protocol("page reported no URL".to_string()))
    }

    pub async fn navigate(&self, url: &str) -> Result<(), SessionError> {
        let page = self.page().await?;
        page.goto(url).await.map_err(SessionError::protocol)?;
        Ok(())
    }

    /// Evaluate a script expression in the page and return its value.
    pub async fn evaluate(&self, script: &str) -> Result<serde_json::Value, SessionError> {
        let page = self.page().await?;
        let result = page.evaluate(script).await.map_err(SessionError::protocol)?;
        result.into_value().map_err(SessionError::protocol)
    }

    /// Register a script to run in every new document, so instrumentation
    /// survives full-document navigations.
    pub async fn register_on_new_document(&self, script: &str) -> Result<(), SessionError> {
        let page = self.page().await?;
        let params = AddScriptToEvaluateOnNewDocumentParams::builder()
            .source(script)
            .build()
            .map_err(SessionError::Protocol)?;
        page.execute(params).await.map_err(SessionError::protocol)?;
        Ok(())
    }

    /// Resolve a locator to a live element: the locator as written first,
    /// then, for structural paths, one retry on the final path segment to
    /// tolerate ancestry drift. `#id` locators have no relaxed form.
    pub async fn resolve(&self, locator: &str) -> Result<Element, SessionError> {
        let page = self.page().await?;

        if let Ok(element) = page.find_element(locator).await {
            return Ok(element);
        }

        if let Some(tail) = relaxed_locator(locator) {
            if let Ok(element) = page.find_element(tail).await {
                tracing::debug!("Locator '{}' resolved via tail '{}'", locator, tail);
                return Ok(element);
            }
        }

        Err(SessionError::NotFound(locator.to_string()))
    }

    /// Click the element at `locator`. A failed native click is retried once
    /// as a script-level click dispatched to the same resolved element.
    pub async fn click(&self, locator: &str) -> Result<(), SessionError> {
        let element = self.resolve(locator).await?;

        match element.click().await {
            Ok(_) => Ok(()),
            Err(native_err) => {
                tracing::debug!(
                    "Native click on '{}' failed ({}), retrying synthetically",
                    locator,
                    native_err
                );
                element
                    .call_js_fn("function() { this.click(); }", false)
                    .await
                    .map(|_| ())
                    .map_err(|e| SessionError::dispatch(locator, e))
            }
        }
    }

    /// Clear the element's current content, then type `value` into it.
    pub async fn clear_and_type(&self, locator: &str, value: &str) -> Result<(), SessionError> {
        let element = self.resolve(locator).await?;

        element
            .click()
            .await
            .map_err(|e| SessionError::dispatch(locator, e))?;

        element
            .call_js_fn(
                r#"function() {
                    if ('value' in this) { this.value = ''; }
                    else { this.textContent = ''; }
                    this.dispatchEvent(new Event('input', { bubbles: true }));
                }"#,
                false,
            )
            .await
            .map_err(|e| SessionError::dispatch(locator, e))?;

        element
            .type_str(value)
            .await
            .map_err(|e| SessionError::dispatch(locator, e))?;

        Ok(())
    }

    /// Set absolute viewport scroll offsets.
    pub async fn set_scroll(&self, x: i64, y: i64) -> Result<(), SessionError> {
        self.evaluate(&format!("window.scrollTo({}, {})", x, y))
            .await?;
        Ok(())
    }

    /// Current absolute viewport scroll offsets.
    pub async fn scroll_offsets(&self) -> Result<(i64, i64), SessionError> {
        let value = self
            .evaluate("(() => JSON.stringify({x: window.scrollX || 0, y: window.scrollY || 0}))()")
            .await?;
        let raw = value
            .as_str()
            .ok_or_else(|| SessionError::Protocol("scroll offsets were not a string".into()))?;
        let offsets: serde_json::Value =
            serde_json::from_str(raw).map_err(SessionError::protocol)?;
        Ok((
            offsets.get("x").and_then(|v| v.as_i64()).unwrap_or(0),
            offsets.get("y").and_then(|v| v.as_i64()).unwrap_or(0),
        ))
    }

    /// Native drag between two resolved elements, as a CDP mouse
    /// press/move/release sequence between their clickable points.
    pub async fn drag(&self, from_locator: &str, to_locator: &str) -> Result<(), SessionError> {
        let from = self.resolve(from_locator).await?;
        let to = self.resolve(to_locator).await?;

        let start = from
            .clickable_point()
            .await
            .map_err(|e| SessionError::dispatch(from_locator, e))?;
        let end = to
            .clickable_point()
            .await
            .map_err(|e| SessionError::dispatch(to_locator, e))?;

        let page = self.page().await?;
        let mid = ((start.x + end.x) / 2.0, (start.y + end.y) / 2.0);

        self.mouse_event(&page, DispatchMouseEventType::MouseMoved, start.x, start.y)
            .await
            .map_err(|e| SessionError::dispatch(from_locator, e))?;
        self.mouse_event(&page, DispatchMouseEventType::MousePressed, start.x, start.y)
            .await
            .map_err(|e| SessionError::dispatch(from_locator, e))?;
        tokio::time::sleep(DRAG_STEP_PAUSE).await;
        self.mouse_event(&page, DispatchMouseEventType::MouseMoved, mid.0, mid.1)
            .await
            .map_err(|e| SessionError::dispatch(from_locator, e))?;
        self.mouse_event(&page, DispatchMouseEventType::MouseMoved, end.x, end.y)
            .await
            .map_err(|e| SessionError::dispatch(to_locator, e))?;
        tokio::time::sleep(DRAG_STEP_PAUSE).await;
        self.mouse_event(&page, DispatchMouseEventType::MouseReleased, end.x, end.y)
            .await
            .map_err(|e| SessionError::dispatch(to_locator, e))?;

        Ok(())
    }

    async fn mouse_event(
        &self,
        page: &Page,
        event_type: DispatchMouseEventType,
        x: f64,
        y: f64,
    ) -> Result<(), String> {
        let click_count = match event_type {
            DispatchMouseEventType::MousePressed | DispatchMouseEventType::MouseReleased => 1,
            _ => 0,
        };
        let params = DispatchMouseEventParams::builder()
            .r#type(event_type)
            .x(x)
            .y(y)
            .button(MouseButton::Left)
            .click_count(click_count)
            .build()
            .map_err(|e| e.to_string())?;
        page.execute(params).await.map_err(|e| e.to_string())?;
        Ok(())
    }

    /// Coordinate-based synthetic drag: a pointer-down/move/up sequence
    /// dispatched at the recorded coordinates. Used when either drag
    /// endpoint's locator no longer resolves.
    pub async fn drag_by_coords(
        &self,
        from: (i64, i64),
        to: (i64, i64),
    ) -> Result<(), SessionError> {
        let script = format!(
            r#"(() => {{
                function fire(type, x, y) {{
                    var el = document.elementFromPoint(x, y) || document.body;
                    var Ctor = window.PointerEvent || MouseEvent;
                    el.dispatchEvent(new Ctor(type, {{
                        bubbles: true, cancelable: true,
                        clientX: x, clientY: y, pointerId: 1
                    }}));
                }}
                fire('pointerdown', {fx}, {fy});
                fire('pointermove', {mx}, {my});
                fire('pointermove', {tx}, {ty});
                fire('pointerup', {tx}, {ty});
                return true;
            }})()"#,
            fx = from.0,
            fy = from.1,
            mx = (from.0 + to.0) / 2,
            my = (from.1 + to.1) / 2,
            tx = to.0,
            ty = to.1,
        );
        self.evaluate(&script).await?;
        Ok(())
    }

    /// Capture the current viewport as PNG bytes.
    pub async fn screenshot_png(&self) -> Result<Vec<u8>, SessionError> {
        let page = self.page().await?;
        page.screenshot(
            chromiumoxide::page::ScreenshotParams::builder()
                .format(CaptureScreenshotFormat::Png)
                .build(),
        )
        .await
        .map_err(SessionError::protocol)
    }

    /// Capture the current viewport to a file.
    pub async fn screenshot_to_file(&self, path: impl AsRef<Path>) -> Result<(), SessionError> {
        let bytes = self.screenshot_png().await?;
        tokio::fs::write(path.as_ref(), bytes)
            .await
            .map_err(SessionError::protocol)?;
        Ok(())
    }

    /// Close the browser session.
    pub async fn close(&self) -> Result<(), SessionError> {
        let mut page_guard = self.page.lock().await;
        let mut browser_guard = self.browser.lock().await;

        if let Some(page) = page_guard.take() {
            let _ = page.close().await;
        }

        if let Some(mut browser) = browser_guard.take() {
            let _ = browser.close().await;
        }

        tracing::info!("Browser closed");
        Ok(())
    }
}

impl Default for BrowserManager {
    fn default() -> Self {
        Self::new()
    }
}

/// Final segment of a structural path locator, or `None` when the locator
/// has no weaker form (an `#id`, or a single-segment path already).
fn relaxed_locator(locator: &str) -> Option<&str> {
    if locator.starts_with('#') {
        return None;
    }
    locator
        .rsplit(" > ")
        .next()
        .filter(|tail| *tail != locator)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relaxed_locator_takes_final_path_segment() {
        assert_eq!(
            relaxed_locator("body > div.page > form > input.q:nth-of-type(2)"),
            Some("input.q:nth-of-type(2)")
        );
    }

    #[test]
    fn identifier_locators_have_no_relaxed_form() {
        assert_eq!(relaxed_locator("#search"), None);
    }

    #[test]
    fn single_segment_paths_have_no_relaxed_form() {
        assert_eq!(relaxed_locator("button.submit"), None);
    }
}
