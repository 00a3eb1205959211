#![allow(dead_code)]

use async_trait::async_trait;
use pageflow_core::{
    Browser, Element, ExecutionContext, NodeError, NodeParams, NodeStrategy, Page, PageError,
    Params, SessionOptions,
};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

/// One repeated element with nested lookups keyed by selector
#[derive(Debug, Clone, Default)]
pub struct MockItem {
    texts: HashMap<String, String>,
    attributes: HashMap<(String, String), String>,
}

impl MockItem {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(mut self, selector: &str, text: &str) -> Self {
        self.texts.insert(selector.to_string(), text.to_string());
        self
    }

    pub fn attr(mut self, selector: &str, name: &str, value: &str) -> Self {
        self.attributes
            .insert((selector.to_string(), name.to_string()), value.to_string());
        self
    }
}

#[async_trait]
impl Element for MockItem {
    async fn text_content(&self, selector: &str) -> Result<Option<String>, PageError> {
        Ok(self.texts.get(selector).cloned())
    }

    async fn attribute(&self, selector: &str, name: &str) -> Result<Option<String>, PageError> {
        Ok(self
            .attributes
            .get(&(selector.to_string(), name.to_string()))
            .cloned())
    }
}

/// Scripted page that records the actions performed on it
#[derive(Debug, Clone, Default)]
pub struct MockPage {
    pub log: Arc<Mutex<Vec<String>>>,
    texts: HashMap<String, String>,
    items: Vec<MockItem>,
    hidden: HashSet<String>,
}

impl MockPage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_text(mut self, selector: &str, text: &str) -> Self {
        self.texts.insert(selector.to_string(), text.to_string());
        self
    }

    pub fn with_items(mut self, items: Vec<MockItem>) -> Self {
        self.items = items;
        self
    }

    pub fn with_hidden(mut self, selector: &str) -> Self {
        self.hidden.insert(selector.to_string());
        self
    }

    pub fn log(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }

    fn record(&self, entry: String) {
        self.log.lock().unwrap().push(entry);
    }
}

#[async_trait]
impl Page for MockPage {
    async fn goto(&mut self, url: &str) -> Result<(), PageError> {
        self.record(format!("goto:{url}"));
        Ok(())
    }

    async fn click(&mut self, selector: &str) -> Result<(), PageError> {
        self.record(format!("click:{selector}"));
        Ok(())
    }

    async fn fill(&mut self, selector: &str, value: &str) -> Result<(), PageError> {
        self.record(format!("fill:{selector}={value}"));
        Ok(())
    }

    async fn select_option(&mut self, selector: &str, value: &str) -> Result<(), PageError> {
        self.record(format!("select:{selector}={value}"));
        Ok(())
    }

    async fn set_checked(&mut self, selector: &str, checked: bool) -> Result<(), PageError> {
        self.record(format!("check:{selector}={checked}"));
        Ok(())
    }

    async fn wait_for_visible(&mut self, selector: &str) -> Result<(), PageError> {
        self.record(format!("visible:{selector}"));
        if self.hidden.contains(selector) {
            return Err(PageError::Timeout(selector.to_string()));
        }
        Ok(())
    }

    async fn text_content(&mut self, selector: &str) -> Result<Option<String>, PageError> {
        Ok(self.texts.get(selector).cloned())
    }

    async fn query_all(&mut self, selector: &str) -> Result<Vec<Box<dyn Element>>, PageError> {
        self.record(format!("query:{selector}"));
        Ok(self
            .items
            .iter()
            .cloned()
            .map(|item| Box::new(item) as Box<dyn Element>)
            .collect())
    }

    async fn set_extra_http_headers(&mut self, _headers: HashMap<String, String>) -> Result<(), PageError> {
        Ok(())
    }

    async fn close(&mut self) -> Result<(), PageError> {
        self.record("close".to_string());
        Ok(())
    }
}

/// Hands out clones of a scripted page; all clones share one log
pub struct MockBrowser {
    pub page: MockPage,
}

#[async_trait]
impl Browser for MockBrowser {
    async fn open(&self, _options: &SessionOptions) -> Result<Box<dyn Page>, PageError> {
        Ok(Box::new(self.page.clone()))
    }
}

pub fn params(value: serde_json::Value) -> Params {
    value.as_object().cloned().unwrap_or_default()
}

/// Execute `strategy` once against `page` with a fresh context
pub async fn run(
    strategy: &dyn NodeStrategy,
    page: &mut MockPage,
    raw: serde_json::Value,
) -> Result<ExecutionContext, NodeError> {
    let mut context = ExecutionContext::new();
    run_in(strategy, page, raw, &mut context).await?;
    Ok(context)
}

pub async fn run_in(
    strategy: &dyn NodeStrategy,
    page: &mut MockPage,
    raw: serde_json::Value,
    context: &mut ExecutionContext,
) -> Result<(), NodeError> {
    let raw = params(raw);
    let params = NodeParams::new(strategy.node_type(), &raw);
    strategy.execute(page, &params, context).await
}
