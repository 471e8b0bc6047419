//! Chrome DevTools driver built on `chromiumoxide`.
//!
//! Node handles are tokens stamped onto elements as `data-uiresolve-handle`. A token that no
//! longer resolves to an attached element means the node was re-rendered, which surfaces as
//! [`DriverErrorKind::StaleHandle`].

use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::cdp::browser_protocol::input::{
    DispatchKeyEventParams, DispatchKeyEventType, DispatchMouseEventParams,
    DispatchMouseEventType, MouseButton,
};
use chromiumoxide::{Browser, BrowserConfig, Page};
use futures::StreamExt;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uiresolve_core_types::NodeHandle;

use crate::config::DriverConfig;
use crate::driver::{ClickMode, Driver, Key};
use crate::error::{DriverError, DriverErrorKind};

const HANDLE_ATTR: &str = "data-uiresolve-handle";

/// Shared helpers injected ahead of every evaluated snippet.
const PRELUDE: &str = r#"
const __attr = 'data-uiresolve-handle';
const __stamp = (el) => {
  let token = el.getAttribute(__attr);
  if (!token) {
    window.__uiresolveSeq = (window.__uiresolveSeq || 0) + 1;
    token = 'h' + window.__uiresolveSeq;
    el.setAttribute(__attr, token);
  }
  return token;
};
const __get = (token) => {
  const el = document.querySelector('[' + __attr + '="' + token + '"]');
  return el && el.isConnected ? el : null;
};
const __visible = (el) => {
  const style = window.getComputedStyle(el);
  if (style.display === 'none' || style.visibility === 'hidden' || style.opacity === '0') return false;
  const rect = el.getBoundingClientRect();
  return rect.width > 0 && rect.height > 0;
};
"#;

#[derive(Debug, Deserialize)]
struct Reply {
    #[serde(default)]
    stale: bool,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    kind: Option<String>,
    #[serde(default)]
    value: serde_json::Value,
}

/// [`Driver`] over a single Chrome page.
pub struct CdpDriver {
    browser: Browser,
    page: Page,
    handler_task: JoinHandle<()>,
}

impl CdpDriver {
    /// Launches a browser per `config` and opens a blank page.
    pub async fn launch(config: &DriverConfig) -> Result<Self, DriverError> {
        let mut builder = BrowserConfig::builder()
            .window_size(config.window_width, config.window_height);
        if !config.headless {
            builder = builder.with_head();
        }
        if !config.sandbox {
            builder = builder.no_sandbox();
        }
        if let Some(executable) = config.resolve_executable() {
            info!(executable = %executable.display(), "launching chrome");
            builder = builder.chrome_executable(executable);
        }
        let browser_config = builder.build().map_err(|err| {
            DriverError::new(DriverErrorKind::Internal)
                .with_hint(format!("browser config: {}", err))
        })?;

        let timeout = Duration::from_millis(config.launch_timeout_ms);
        let (browser, mut handler) = tokio::time::timeout(timeout, Browser::launch(browser_config))
            .await
            .map_err(|_| DriverError::new(DriverErrorKind::Timeout).with_hint("browser launch"))?
            .map_err(DriverError::io)?;

        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(err) = event {
                    debug!(error = %err, "cdp handler error");
                }
            }
        });

        let page = tokio::time::timeout(timeout, browser.new_page("about:blank"))
            .await
            .map_err(|_| DriverError::new(DriverErrorKind::Timeout).with_hint("new page"))?
            .map_err(DriverError::io)?;

        Ok(Self {
            browser,
            page,
            handler_task,
        })
    }

    pub async fn goto(&self, url: &str) -> Result<(), DriverError> {
        self.page.goto(url).await.map_err(DriverError::io)?;
        Ok(())
    }

    /// Closes the browser and stops the event loop.
    pub async fn close(mut self) -> Result<(), DriverError> {
        if let Err(err) = self.browser.close().await {
            warn!(error = %err, "browser close failed");
        }
        self.handler_task.abort();
        Ok(())
    }

    async fn eval<T: DeserializeOwned>(&self, body: String) -> Result<T, DriverError> {
        let script = format!("(() => {{ {}\n{} }})()", PRELUDE, body);
        let reply: Reply = self
            .page
            .evaluate(script)
            .await
            .map_err(DriverError::io)?
            .into_value()
            .map_err(|err| DriverError::new(DriverErrorKind::Internal).with_hint(err.to_string()))?;
        if reply.stale {
            return Err(DriverError::new(DriverErrorKind::StaleHandle)
                .with_hint(reply.error.unwrap_or_else(|| "node detached".to_string())));
        }
        if let Some(error) = reply.error {
            let kind = match reply.kind.as_deref() {
                Some("selector") => DriverErrorKind::InvalidSelector,
                Some("intercepted") => DriverErrorKind::Intercepted,
                Some("not_interactable") => DriverErrorKind::NotInteractable,
                _ => DriverErrorKind::Internal,
            };
            return Err(DriverError::new(kind).with_hint(error));
        }
        serde_json::from_value(reply.value)
            .map_err(|err| DriverError::new(DriverErrorKind::Internal).with_hint(err.to_string()))
    }

    /// Evaluates `body` with `el` bound to the node, failing stale when it is gone.
    async fn eval_on<T: DeserializeOwned>(
        &self,
        node: &NodeHandle,
        body: &str,
    ) -> Result<T, DriverError> {
        let script = format!(
            "const el = __get({token}); if (!el) return {{ stale: true, error: 'handle ' + {token} }};\n{body}",
            token = js_str(node.as_str()),
            body = body,
        );
        self.eval(script).await
    }

    async fn dispatch_key(&self, key: Key) -> Result<(), DriverError> {
        for (event_type, down) in [
            (DispatchKeyEventType::KeyDown, true),
            (DispatchKeyEventType::KeyUp, false),
        ] {
            let mut params = DispatchKeyEventParams::builder()
                .r#type(event_type)
                .key(key.dom_key());
            if down {
                if let Some(text) = key_text(key) {
                    params = params.text(text);
                }
            }
            let params = params.build().map_err(|err| {
                DriverError::new(DriverErrorKind::Internal).with_hint(err.to_string())
            })?;
            self.page.execute(params).await.map_err(DriverError::io)?;
        }
        Ok(())
    }
}

fn key_text(key: Key) -> Option<&'static str> {
    match key {
        Key::Enter => Some("\r"),
        Key::Space => Some(" "),
        _ => None,
    }
}

fn js_str(raw: &str) -> String {
    serde_json::Value::String(raw.to_string()).to_string()
}

fn handles(tokens: Vec<String>) -> Vec<NodeHandle> {
    tokens.into_iter().map(NodeHandle::new).collect()
}

const QUERY_BODY: &str = r#"
let found;
try { found = Array.from(root.querySelectorAll(selector)); }
catch (e) { return { error: String(e), kind: 'selector' }; }
return { value: found.map(__stamp) };
"#;

#[async_trait]
impl Driver for CdpDriver {
    async fn query(&self, selector: &str) -> Result<Vec<NodeHandle>, DriverError> {
        let body = format!(
            "const root = document; const selector = {};\n{}",
            js_str(selector),
            QUERY_BODY
        );
        Ok(handles(self.eval(body).await?))
    }

    async fn query_within(
        &self,
        root: &NodeHandle,
        selector: &str,
    ) -> Result<Vec<NodeHandle>, DriverError> {
        let body = format!(
            "const root = el; const selector = {};\n{}",
            js_str(selector),
            QUERY_BODY
        );
        Ok(handles(self.eval_on(root, &body).await?))
    }

    async fn contains(
        &self,
        ancestor: &NodeHandle,
        node: &NodeHandle,
    ) -> Result<bool, DriverError> {
        let body = format!(
            "const other = __get({}); if (!other) return {{ stale: true }};\nreturn {{ value: el.contains(other) }};",
            js_str(node.as_str())
        );
        self.eval_on(ancestor, &body).await
    }

    async fn next_sibling(&self, node: &NodeHandle) -> Result<Option<NodeHandle>, DriverError> {
        let token: Option<String> = self
            .eval_on(
                node,
                "const next = el.nextElementSibling; return { value: next ? __stamp(next) : null };",
            )
            .await?;
        Ok(token.map(NodeHandle::new))
    }

    async fn is_visible(&self, node: &NodeHandle) -> Result<bool, DriverError> {
        self.eval_on(node, "return { value: __visible(el) };").await
    }

    async fn is_enabled(&self, node: &NodeHandle) -> Result<bool, DriverError> {
        self.eval_on(
            node,
            "return { value: !el.closest('[disabled],[aria-disabled=\"true\"]') };",
        )
        .await
    }

    async fn click(&self, node: &NodeHandle, mode: ClickMode) -> Result<(), DriverError> {
        match mode {
            ClickMode::Synthetic => {
                self.eval_on::<serde_json::Value>(
                    node,
                    r#"
for (const type of ['pointerdown', 'mousedown', 'pointerup', 'mouseup']) {
  el.dispatchEvent(new MouseEvent(type, { bubbles: true, cancelable: true, view: window }));
}
el.click();
return { value: null };
"#,
                )
                .await?;
                Ok(())
            }
            ClickMode::Native => {
                let point: (f64, f64) = self
                    .eval_on(
                        node,
                        r#"
if (!__visible(el)) return { error: 'element not visible', kind: 'not_interactable' };
const rect = el.getBoundingClientRect();
const x = rect.left + rect.width / 2;
const y = rect.top + rect.height / 2;
const hit = document.elementFromPoint(x, y);
if (hit && hit !== el && !el.contains(hit)) {
  const desc = hit.tagName.toLowerCase() + (hit.className ? '.' + String(hit.className).split(/\s+/).join('.') : '');
  return { error: desc + ' would receive the click', kind: 'intercepted' };
}
return { value: [x, y] };
"#,
                    )
                    .await?;
                for event_type in [
                    DispatchMouseEventType::MousePressed,
                    DispatchMouseEventType::MouseReleased,
                ] {
                    let params = DispatchMouseEventParams::builder()
                        .r#type(event_type)
                        .x(point.0)
                        .y(point.1)
                        .button(MouseButton::Left)
                        .click_count(1)
                        .build()
                        .map_err(|err| {
                            DriverError::new(DriverErrorKind::Internal).with_hint(err.to_string())
                        })?;
                    self.page.execute(params).await.map_err(DriverError::io)?;
                }
                Ok(())
            }
        }
    }

    async fn type_text(&self, node: &NodeHandle, text: &str) -> Result<(), DriverError> {
        let body = format!(
            r#"
if (!__visible(el) || el.disabled) return {{ error: 'element cannot take input', kind: 'not_interactable' }};
el.focus();
const text = {};
if ('value' in el) {{
  el.value = el.value + text;
  el.dispatchEvent(new Event('input', {{ bubbles: true }}));
  el.dispatchEvent(new Event('change', {{ bubbles: true }}));
}} else {{
  el.textContent = (el.textContent || '') + text;
}}
return {{ value: null }};
"#,
            js_str(text)
        );
        self.eval_on::<serde_json::Value>(node, &body).await?;
        Ok(())
    }

    async fn select_option(&self, node: &NodeHandle, value: &str) -> Result<(), DriverError> {
        let body = format!(
            r#"
if (el.tagName !== 'SELECT') return {{ error: 'not a <select>', kind: 'not_interactable' }};
const wanted = {};
const option = Array.from(el.options).find(o => o.value === wanted || o.textContent.trim() === wanted);
if (!option) return {{ error: 'option ' + wanted + ' not found', kind: 'not_interactable' }};
el.value = option.value;
el.dispatchEvent(new Event('input', {{ bubbles: true }}));
el.dispatchEvent(new Event('change', {{ bubbles: true }}));
return {{ value: null }};
"#,
            js_str(value)
        );
        self.eval_on::<serde_json::Value>(node, &body).await?;
        Ok(())
    }

    async fn press_key(&self, node: &NodeHandle, key: Key) -> Result<(), DriverError> {
        self.eval_on::<serde_json::Value>(node, "el.focus(); return { value: null };")
            .await?;
        self.dispatch_key(key).await
    }

    async fn scroll_into_view(&self, node: &NodeHandle) -> Result<(), DriverError> {
        self.eval_on::<serde_json::Value>(
            node,
            "el.scrollIntoView({ block: 'center', inline: 'center' }); return { value: null };",
        )
        .await?;
        Ok(())
    }

    async fn attribute(
        &self,
        node: &NodeHandle,
        name: &str,
    ) -> Result<Option<String>, DriverError> {
        if name == HANDLE_ATTR {
            return Ok(Some(node.as_str().to_string()));
        }
        let body = format!("return {{ value: el.getAttribute({}) }};", js_str(name));
        self.eval_on(node, &body).await
    }

    async fn text(&self, node: &NodeHandle) -> Result<Option<String>, DriverError> {
        self.eval_on(
            node,
            "return { value: el.innerText !== undefined ? el.innerText : el.textContent };",
        )
        .await
    }

    async fn count(&self, selector: &str) -> Result<usize, DriverError> {
        let body = format!(
            r#"
try {{ return {{ value: document.querySelectorAll({}).length }}; }}
catch (e) {{ return {{ error: String(e), kind: 'selector' }}; }}
"#,
            js_str(selector)
        );
        self.eval(body).await
    }
}
