//! The browser capability the monitor relies on.
//!
//! Production code talks to a WebDriver server through fantoccini
//! (see [`crate::browser::webdriver`]); tests drive a scripted page model.
//! Lookups follow WebDriver semantics: a missing element is an
//! [`AppError::ElementNotFound`](crate::core::error::AppError::ElementNotFound) error,
//! and it is up to [`PageNavigator`](crate::browser::navigator::PageNavigator)
//! to turn that into an absent value where absence is legitimate.

use crate::core::error::Result;
use crate::core::models::DriverParameters;
use crate::persistence::cookies::CookieRecord;
use async_trait::async_trait;
use fantoccini::Locator;

/// Argument passed to an injected script.
#[derive(Debug, Clone)]
pub enum ScriptArg<E> {
    Element(E),
    Text(String),
}

#[async_trait]
pub trait PageDriver: Send + Sync {
    type Element: Clone + Send + Sync;

    async fn goto(&self, url: &str) -> Result<()>;
    async fn current_url(&self) -> Result<String>;
    async fn source(&self) -> Result<String>;
    /// Full viewport screenshot as PNG.
    async fn screenshot(&self) -> Result<Vec<u8>>;

    async fn find(&self, locator: Locator<'_>) -> Result<Self::Element>;
    async fn find_all(&self, locator: Locator<'_>) -> Result<Vec<Self::Element>>;
    async fn find_in(&self, parent: &Self::Element, locator: Locator<'_>) -> Result<Self::Element>;
    async fn find_all_in(
        &self,
        parent: &Self::Element,
        locator: Locator<'_>,
    ) -> Result<Vec<Self::Element>>;

    async fn text(&self, element: &Self::Element) -> Result<String>;
    async fn attr(&self, element: &Self::Element, name: &str) -> Result<Option<String>>;
    async fn click(&self, element: &Self::Element) -> Result<()>;
    async fn send_keys(&self, element: &Self::Element, text: &str) -> Result<()>;
    /// Picks the `<option>` whose visible text equals `label`.
    async fn select_by_label(&self, element: &Self::Element, label: &str) -> Result<()>;
    /// Element screenshot as produced by the browser itself.
    async fn element_screenshot(&self, element: &Self::Element) -> Result<Vec<u8>>;

    async fn execute(
        &self,
        script: &str,
        args: Vec<ScriptArg<Self::Element>>,
    ) -> Result<serde_json::Value>;

    async fn cookies(&self) -> Result<Vec<CookieRecord>>;
    async fn add_cookie(&self, cookie: CookieRecord) -> Result<()>;

    /// Ends the session and releases whatever backs it.
    async fn close(&self) -> Result<()>;
}

/// Local address of the intercepting proxy the browser should route through.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyAddress {
    pub host: String,
    pub port: u16,
}

impl ProxyAddress {
    pub fn localhost(port: u16) -> Self {
        Self {
            host: "localhost".to_string(),
            port,
        }
    }

    pub fn authority(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Starts browser sessions.
#[async_trait]
pub trait BrowserLauncher: Send + Sync {
    type Driver: PageDriver;

    async fn launch(
        &self,
        params: DriverParameters,
        proxy: Option<ProxyAddress>,
    ) -> Result<Self::Driver>;
}
