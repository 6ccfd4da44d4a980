//! WebDriver-backed browser sessions via fantoccini.

use crate::browser::driver::{BrowserLauncher, PageDriver, ProxyAddress, ScriptArg};
use crate::browser::navigator::ScreenshotMode;
use crate::core::config::{Config, DriverKind};
use crate::core::error::{AppError, Result};
use crate::core::models::DriverParameters;
use crate::persistence::cookies::CookieRecord;
use crate::service::driver_service::DriverService;
use async_trait::async_trait;
use fantoccini::cookies::Cookie;
use fantoccini::elements::Element;
use fantoccini::wd::TimeoutConfiguration;
use fantoccini::{Client, ClientBuilder, Locator};
use parking_lot::Mutex;
use serde_json::{json, Map, Value};
use std::path::PathBuf;
use std::time::Duration;

pub const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/100.0.4896.127 Safari/537.36";

const DEFAULT_HEADLESS: bool = true;
const DEFAULT_SCALE_FACTOR: f64 = 2.0;
const PAGE_LOAD_TIMEOUT: Duration = Duration::from_secs(30);
const IMPLICIT_WAIT: Duration = Duration::from_secs(10);

/// Launch parameters with the launcher's defaults filled in.
pub fn resolve_parameters(params: DriverParameters) -> (bool, f64) {
    (
        params.headless.unwrap_or(DEFAULT_HEADLESS),
        params.scale_factor.unwrap_or(DEFAULT_SCALE_FACTOR),
    )
}

pub fn screenshot_mode(kind: DriverKind, params: DriverParameters) -> ScreenshotMode {
    match kind {
        DriverKind::Chrome => ScreenshotMode::CropScaled(resolve_parameters(params).1),
        DriverKind::Firefox => ScreenshotMode::Native,
    }
}

/// Builds the W3C capabilities for a new session.
pub fn build_capabilities(
    kind: DriverKind,
    params: DriverParameters,
    proxy: Option<&ProxyAddress>,
) -> Map<String, Value> {
    let (headless, scale) = resolve_parameters(params);
    let mut caps = Map::new();

    match kind {
        DriverKind::Firefox => {
            let mut args = Vec::new();
            if headless {
                args.push("-headless");
            }
            caps.insert("browserName".to_string(), json!("firefox"));
            caps.insert("acceptInsecureCerts".to_string(), json!(true));
            caps.insert(
                "moz:firefoxOptions".to_string(),
                json!({
                    "args": args,
                    "prefs": {
                        "layout.css.devPixelsPerPx": scale.to_string(),
                        // avoid self-identification
                        "dom.webdriver.enabled": false,
                        "useAutomationExtension": false,
                    },
                }),
            );
            if let Some(proxy) = proxy {
                caps.insert(
                    "proxy".to_string(),
                    json!({
                        "proxyType": "manual",
                        "httpProxy": proxy.authority(),
                        "sslProxy": proxy.authority(),
                    }),
                );
            }
        }
        DriverKind::Chrome => {
            let mut args = vec![
                format!("--user-agent={}", USER_AGENT),
                "--log-level=3".to_string(),
                "--start-maximized".to_string(),
                // element screenshots ignore the scale factor, see ScreenshotMode::CropScaled
                format!("--high-dpi-support={}", scale),
                format!("--force-device-scale-factor={}", scale),
                "--disable-blink-features".to_string(),
                "--disable-blink-features=AutomationControlled".to_string(),
            ];
            if headless {
                args.push("--headless".to_string());
                args.push("--disable-gpu".to_string());
            }
            // Chrome ignores the W3C proxy capability
            if let Some(proxy) = proxy {
                args.push(format!("--proxy-server=http://{}", proxy.authority()));
                caps.insert("acceptInsecureCerts".to_string(), json!(true));
            }
            caps.insert("browserName".to_string(), json!("chrome"));
            caps.insert("goog:chromeOptions".to_string(), json!({ "args": args }));
        }
    }

    caps
}

/// Launches a local WebDriver server per session and connects to it.
pub struct WebDriverLauncher {
    driver_path: PathBuf,
    kind: DriverKind,
    port: u16,
}

impl WebDriverLauncher {
    pub fn from_config(config: &Config) -> Self {
        Self {
            driver_path: config.driver_path.clone(),
            kind: config.driver_kind,
            port: config.webdriver_port,
        }
    }
}

#[async_trait]
impl BrowserLauncher for WebDriverLauncher {
    type Driver = WebDriverSession;

    async fn launch(
        &self,
        params: DriverParameters,
        proxy: Option<ProxyAddress>,
    ) -> Result<WebDriverSession> {
        let mut service = DriverService::start(&self.driver_path, self.kind, self.port).await?;

        let caps = build_capabilities(self.kind, params, proxy.as_ref());
        tracing::debug!(target: "webdriver", "Connecting to WebDriver at {}...", service.url());

        let mut builder = ClientBuilder::native();
        builder.capabilities(caps);
        let client = match builder.connect(&service.url()).await {
            Ok(client) => client,
            Err(e) => {
                tracing::error!(target: "webdriver", "Failed to open a session: {}", e);
                if let Ok(logs) = service.logs(20) {
                    tracing::debug!(target: "webdriver", "Recent WebDriver output:\n{}", logs);
                }
                service.stop();
                return Err(e.into());
            }
        };

        let session = WebDriverSession {
            client,
            service: Mutex::new(Some(service)),
        };
        if let Err(e) = session.configure(self.kind).await {
            let _ = session.close().await;
            return Err(e);
        }

        tracing::info!(target: "webdriver", "WebDriver session started.");
        Ok(session)
    }
}

pub struct WebDriverSession {
    client: Client,
    service: Mutex<Option<DriverService>>,
}

impl WebDriverSession {
    async fn configure(&self, kind: DriverKind) -> Result<()> {
        if kind == DriverKind::Firefox {
            self.client.set_window_rect(0, 0, 1280, 1080).await?;
        }
        self.client
            .update_timeouts(TimeoutConfiguration::new(
                None,
                Some(PAGE_LOAD_TIMEOUT),
                Some(IMPLICIT_WAIT),
            ))
            .await?;
        Ok(())
    }
}

fn script_arg(arg: ScriptArg<Element>) -> Result<Value> {
    match arg {
        ScriptArg::Element(element) => Ok(serde_json::to_value(element)?),
        ScriptArg::Text(text) => Ok(Value::String(text)),
    }
}

fn to_record(cookie: &Cookie<'_>) -> CookieRecord {
    CookieRecord {
        name: cookie.name().to_string(),
        value: cookie.value().to_string(),
        domain: cookie.domain().map(str::to_string),
        path: cookie.path().map(str::to_string),
        secure: cookie.secure().unwrap_or(false),
        http_only: cookie.http_only().unwrap_or(false),
        expiry: cookie.expires_datetime().map(|t| t.unix_timestamp()),
    }
}

fn from_record(record: CookieRecord) -> Cookie<'static> {
    let mut cookie = Cookie::new(record.name, record.value);
    if let Some(domain) = record.domain {
        cookie.set_domain(domain);
    }
    if let Some(path) = record.path {
        cookie.set_path(path);
    }
    cookie.set_secure(record.secure);
    cookie.set_http_only(record.http_only);
    cookie
}

#[async_trait]
impl PageDriver for WebDriverSession {
    type Element = Element;

    async fn goto(&self, url: &str) -> Result<()> {
        Ok(self.client.goto(url).await?)
    }

    async fn current_url(&self) -> Result<String> {
        Ok(self.client.current_url().await?.to_string())
    }

    async fn source(&self) -> Result<String> {
        Ok(self.client.source().await?)
    }

    async fn screenshot(&self) -> Result<Vec<u8>> {
        Ok(self.client.screenshot().await?)
    }

    async fn find(&self, locator: Locator<'_>) -> Result<Element> {
        Ok(self.client.find(locator).await?)
    }

    async fn find_all(&self, locator: Locator<'_>) -> Result<Vec<Element>> {
        Ok(self.client.find_all(locator).await?)
    }

    async fn find_in(&self, parent: &Element, locator: Locator<'_>) -> Result<Element> {
        Ok(parent.find(locator).await?)
    }

    async fn find_all_in(&self, parent: &Element, locator: Locator<'_>) -> Result<Vec<Element>> {
        Ok(parent.find_all(locator).await?)
    }

    async fn text(&self, element: &Element) -> Result<String> {
        Ok(element.text().await?)
    }

    async fn attr(&self, element: &Element, name: &str) -> Result<Option<String>> {
        Ok(element.attr(name).await?)
    }

    async fn click(&self, element: &Element) -> Result<()> {
        Ok(element.click().await?)
    }

    async fn send_keys(&self, element: &Element, text: &str) -> Result<()> {
        Ok(element.send_keys(text).await?)
    }

    async fn select_by_label(&self, element: &Element, label: &str) -> Result<()> {
        Ok(element.select_by_label(label).await?)
    }

    async fn element_screenshot(&self, element: &Element) -> Result<Vec<u8>> {
        Ok(element.screenshot().await?)
    }

    async fn execute(&self, script: &str, args: Vec<ScriptArg<Element>>) -> Result<Value> {
        let args = args.into_iter().map(script_arg).collect::<Result<Vec<_>>>()?;
        Ok(self.client.execute(script, args).await?)
    }

    async fn cookies(&self) -> Result<Vec<CookieRecord>> {
        let cookies = self.client.get_all_cookies().await?;
        Ok(cookies.iter().map(to_record).collect())
    }

    async fn add_cookie(&self, cookie: CookieRecord) -> Result<()> {
        Ok(self.client.add_cookie(from_record(cookie)).await?)
    }

    async fn close(&self) -> Result<()> {
        let closed = self.client.clone().close().await;
        if let Some(mut service) = self.service.lock().take() {
            service.stop();
        }
        closed.map_err(|e| AppError::WebDriverCmd(e.to_string()))
    }
}
