// Shared fixtures for runtime integration tests
#![allow(dead_code)]

use async_trait::async_trait;
use pageflow_core::{
    Browser, Element, ExecutionContext, NodeError, NodeParams, NodeSpec, NodeStrategy, NodeType,
    Page, PageError, SessionOptions, WorkflowDefinition,
};
use pageflow_runtime::StrategyRegistry;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};
    let _ = fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_test_writer()
        .try_init();
}

/// Browser that records every page action
#[derive(Default)]
pub struct MockBrowser {
    pub log: Arc<Mutex<Vec<String>>>,
    pub opened: AtomicUsize,
    pub closed: Arc<AtomicUsize>,
    pub active: Arc<AtomicUsize>,
    pub max_active: Arc<AtomicUsize>,
    pub sessions: Mutex<Vec<SessionOptions>>,
    pub fail_open: bool,
}

impl MockBrowser {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            fail_open: true,
            ..Self::default()
        })
    }

    pub fn log(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }

    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    pub fn closed(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn max_active(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Browser for MockBrowser {
    async fn open(&self, options: &SessionOptions) -> Result<Box<dyn Page>, PageError> {
        if self.fail_open {
            return Err(PageError::Launch("no browser installed".into()));
        }
        self.opened.fetch_add(1, Ordering::SeqCst);
        self.sessions.lock().unwrap().push(options.clone());
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(now, Ordering::SeqCst);

        Ok(Box::new(MockPage {
            log: self.log.clone(),
            closed: self.closed.clone(),
            active: self.active.clone(),
        }))
    }
}

pub struct MockPage {
    log: Arc<Mutex<Vec<String>>>,
    closed: Arc<AtomicUsize>,
    active: Arc<AtomicUsize>,
}

impl MockPage {
    fn record(&self, entry: String) {
        self.log.lock().unwrap().push(entry);
    }
}

#[async_trait]
impl Page for MockPage {
    async fn goto(&mut self, url: &str) -> Result<(), PageError> {
        self.record(format!("goto:{url}"));
        if url.starts_with("fail:") {
            return Err(PageError::Navigation {
                url: url.to_string(),
                reason: "connection refused".into(),
            });
        }
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
        Ok(())
    }

    async fn text_content(&mut self, selector: &str) -> Result<Option<String>, PageError> {
        self.record(format!("text:{selector}"));
        Ok(Some(format!("text of {selector}")))
    }

    async fn query_all(&mut self, _selector: &str) -> Result<Vec<Box<dyn Element>>, PageError> {
        Ok(Vec::new())
    }

    async fn set_extra_http_headers(&mut self, headers: HashMap<String, String>) -> Result<(), PageError> {
        let mut pairs: Vec<String> = headers.iter().map(|(k, v)| format!("{k}={v}")).collect();
        pairs.sort();
        self.record(format!("headers:{}", pairs.join(",")));
        Ok(())
    }

    async fn close(&mut self) -> Result<(), PageError> {
        self.active.fetch_sub(1, Ordering::SeqCst);
        self.closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Minimal stand-in for the real strategies
pub struct TestStrategy(pub NodeType);

#[async_trait]
impl NodeStrategy for TestStrategy {
    fn node_type(&self) -> NodeType {
        self.0
    }

    async fn execute(
        &self,
        page: &mut dyn Page,
        params: &NodeParams<'_>,
        context: &mut ExecutionContext,
    ) -> Result<(), NodeError> {
        match self.0 {
            NodeType::Goto => page.goto(params.require_str("url")?).await?,
            NodeType::Click => page.click(params.require_str("selector")?).await?,
            NodeType::ExtractText => {
                let selector = params.require_str("selector")?;
                let text = page.text_content(selector).await?.unwrap_or_default();
                context.insert(params.str_or("variableName", "extracted_text")?, text);
            }
            NodeType::Wait => {
                let ms = params.u64_or("timeout", 0)?;
                tokio::time::sleep(Duration::from_millis(ms)).await;
            }
            NodeType::Fill if params.bool_or("panic", false)? => {
                panic!("strategy blew up");
            }
            _ => {}
        }
        Ok(())
    }
}

pub fn registry() -> Arc<StrategyRegistry> {
    let mut registry = StrategyRegistry::new();
    for t in NodeType::ALL {
        registry.register(Arc::new(TestStrategy(t)));
    }
    Arc::new(registry)
}

/// Build a definition from `(id, type)` nodes and `(from, port, to)` edges
pub fn graph(nodes: Vec<NodeSpec>, edges: &[(&str, &str, &str)]) -> WorkflowDefinition {
    let mut def = WorkflowDefinition::new();
    for n in nodes {
        def.add_node(n);
    }
    for (from, port, to) in edges {
        def.connect(*from, *port, *to);
    }
    def
}

pub fn node(id: &str, node_type: &str) -> NodeSpec {
    NodeSpec::new(id, node_type)
}

/// start → goto(url) → stop
pub fn visit(url: &str) -> WorkflowDefinition {
    graph(
        vec![
            node("start", "start"),
            node("open", "goto").with_param("url", url),
            node("stop", "stop"),
        ],
        &[("start", "out", "open"), ("open", "out", "stop")],
    )
}

/// start → wait(ms) → stop
pub fn slow(ms: u64) -> WorkflowDefinition {
    graph(
        vec![
            node("start", "start"),
            node("pause", "wait").with_param("timeout", ms),
            node("stop", "stop"),
        ],
        &[("start", "out", "pause"), ("pause", "out", "stop")],
    )
}
