//! Browser driver that performs no I/O and logs every action instead

use async_trait::async_trait;
use pageflow_core::{Browser, Element, Page, PageError, SessionOptions};
use std::collections::HashMap;

pub struct DryRunBrowser;

#[async_trait]
impl Browser for DryRunBrowser {
    async fn open(&self, options: &SessionOptions) -> Result<Box<dyn Page>, PageError> {
        tracing::info!(
            headless = options.headless,
            proxy = ?options.proxy.as_ref().map(|p| p.server.as_str()),
            "[dry-run] opening browser session"
        );
        Ok(Box::new(DryRunPage { actions: 0 }))
    }
}

struct DryRunPage {
    actions: usize,
}

impl DryRunPage {
    fn action(&mut self, what: std::fmt::Arguments<'_>) {
        self.actions += 1;
        tracing::info!("[dry-run] {}", what);
    }
}

#[async_trait]
impl Page for DryRunPage {
    async fn goto(&mut self, url: &str) -> Result<(), PageError> {
        self.action(format_args!("goto {url}"));
        Ok(())
    }

    async fn click(&mut self, selector: &str) -> Result<(), PageError> {
        self.action(format_args!("click {selector}"));
        Ok(())
    }

    async fn fill(&mut self, selector: &str, value: &str) -> Result<(), PageError> {
        self.action(format_args!("fill {selector} with {value:?}"));
        Ok(())
    }

    async fn select_option(&mut self, selector: &str, value: &str) -> Result<(), PageError> {
        self.action(format_args!("select {value:?} in {selector}"));
        Ok(())
    }

    async fn set_checked(&mut self, selector: &str, checked: bool) -> Result<(), PageError> {
        self.action(format_args!("set {selector} checked={checked}"));
        Ok(())
    }

    async fn wait_for_visible(&mut self, selector: &str) -> Result<(), PageError> {
        self.action(format_args!("assume {selector} is visible"));
        Ok(())
    }

    async fn text_content(&mut self, selector: &str) -> Result<Option<String>, PageError> {
        self.action(format_args!("read text of {selector}"));
        Ok(None)
    }

    async fn query_all(&mut self, selector: &str) -> Result<Vec<Box<dyn Element>>, PageError> {
        self.action(format_args!("query {selector}"));
        Ok(Vec::new())
    }

    async fn set_extra_http_headers(&mut self, headers: HashMap<String, String>) -> Result<(), PageError> {
        let mut names: Vec<&str> = headers.keys().map(String::as_str).collect();
        names.sort_unstable();
        self.action(format_args!("send extra headers {}", names.join(", ")));
        Ok(())
    }

    async fn close(&mut self) -> Result<(), PageError> {
        tracing::info!("[dry-run] closing session after {} actions", self.actions);
        Ok(())
    }
}
