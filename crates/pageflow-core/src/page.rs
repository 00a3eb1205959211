//! Browser capability boundary.
//!
//! The engine never talks to a concrete automation driver. A driver implements
//! [`Browser`] to open sessions and [`Page`] for the actions node strategies perform.

use crate::{PageError, ProxySettings};
use async_trait::async_trait;
use std::collections::HashMap;

/// Options for one browser session, fixed for the duration of a run
#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub headless: bool,
    pub args: Vec<String>,
    pub proxy: Option<ProxySettings>,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            headless: true,
            args: vec!["--no-sandbox".to_string(), "--disable-setuid-sandbox".to_string()],
            proxy: None,
        }
    }
}

impl SessionOptions {
    pub fn with_proxy(mut self, proxy: Option<ProxySettings>) -> Self {
        self.proxy = proxy;
        self
    }

    pub fn with_headless(mut self, headless: bool) -> Self {
        self.headless = headless;
        self
    }

    /// Extra HTTP headers the session must send, derived from the proxy settings
    pub fn extra_headers(&self) -> HashMap<String, String> {
        let mut headers = HashMap::new();
        if let Some(ua) = self.proxy.as_ref().and_then(|p| p.user_agent.as_ref()) {
            headers.insert("User-Agent".to_string(), ua.clone());
        }
        headers
    }
}

/// Launches browser sessions
#[async_trait]
pub trait Browser: Send + Sync {
    /// Open a new session with a single page. The caller owns the page and must close it.
    async fn open(&self, options: &SessionOptions) -> Result<Box<dyn Page>, PageError>;
}

/// Page handle handed to node strategies
#[async_trait]
pub trait Page: Send {
    async fn goto(&mut self, url: &str) -> Result<(), PageError>;

    async fn click(&mut self, selector: &str) -> Result<(), PageError>;

    async fn fill(&mut self, selector: &str, value: &str) -> Result<(), PageError>;

    async fn select_option(&mut self, selector: &str, value: &str) -> Result<(), PageError>;

    async fn set_checked(&mut self, selector: &str, checked: bool) -> Result<(), PageError>;

    /// Wait until the element is visible
    async fn wait_for_visible(&mut self, selector: &str) -> Result<(), PageError>;

    async fn text_content(&mut self, selector: &str) -> Result<Option<String>, PageError>;

    /// All elements matching `selector`, in document order
    async fn query_all(&mut self, selector: &str) -> Result<Vec<Box<dyn Element>>, PageError>;

    async fn set_extra_http_headers(&mut self, headers: HashMap<String, String>) -> Result<(), PageError>;

    /// Release the session. Called exactly once per run, whatever the outcome.
    async fn close(&mut self) -> Result<(), PageError>;
}

/// One element returned by [`Page::query_all`], scoped for nested lookups
#[async_trait]
pub trait Element: Send + Sync {
    async fn text_content(&self, selector: &str) -> Result<Option<String>, PageError>;

    async fn attribute(&self, selector: &str, name: &str) -> Result<Option<String>, PageError>;
}
