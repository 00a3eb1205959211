use async_trait::async_trait;
use pageflow_core::{
    ExecutionContext, NodeError, NodeParams, NodeStrategy, NodeType, Page, ParamDefinition,
    StrategyMetadata,
};

fn selector_param(what: &str) -> ParamDefinition {
    ParamDefinition::required("selector", format!("CSS selector of the {what}"))
}

/// Navigate the page to a URL
pub struct GotoStrategy;

#[async_trait]
impl NodeStrategy for GotoStrategy {
    fn node_type(&self) -> NodeType {
        NodeType::Goto
    }

    async fn execute(
        &self,
        page: &mut dyn Page,
        params: &NodeParams<'_>,
        _context: &mut ExecutionContext,
    ) -> Result<(), NodeError> {
        let url = params.require_str("url")?;
        tracing::info!("Navigating to {}", url);
        page.goto(url).await?;
        Ok(())
    }

    fn metadata(&self) -> StrategyMetadata {
        StrategyMetadata {
            description: "Navigate to a URL".to_string(),
            category: "browser".to_string(),
            params: vec![ParamDefinition::required("url", "Address to open")],
        }
    }
}

pub struct ClickStrategy;

#[async_trait]
impl NodeStrategy for ClickStrategy {
    fn node_type(&self) -> NodeType {
        NodeType::Click
    }

    async fn execute(
        &self,
        page: &mut dyn Page,
        params: &NodeParams<'_>,
        _context: &mut ExecutionContext,
    ) -> Result<(), NodeError> {
        let selector = params.require_str("selector")?;
        tracing::info!("Clicking {}", selector);
        page.click(selector).await?;
        Ok(())
    }

    fn metadata(&self) -> StrategyMetadata {
        StrategyMetadata {
            description: "Click an element".to_string(),
            category: "browser".to_string(),
            params: vec![selector_param("element to click")],
        }
    }
}

/// Type a value into an input. A missing value clears the field.
pub struct FillStrategy;

#[async_trait]
impl NodeStrategy for FillStrategy {
    fn node_type(&self) -> NodeType {
        NodeType::Fill
    }

    async fn execute(
        &self,
        page: &mut dyn Page,
        params: &NodeParams<'_>,
        _context: &mut ExecutionContext,
    ) -> Result<(), NodeError> {
        let selector = params.require_str("selector")?;
        let value = match params.get("value") {
            None => String::new(),
            Some(_) => params.require_text("value")?,
        };
        tracing::info!("Filling {} with {:?}", selector, value);
        page.fill(selector, &value).await?;
        Ok(())
    }

    fn metadata(&self) -> StrategyMetadata {
        StrategyMetadata {
            description: "Type text into an input".to_string(),
            category: "browser".to_string(),
            params: vec![
                selector_param("input"),
                ParamDefinition::optional("value", "Text to enter", Some("")),
            ],
        }
    }
}

pub struct SelectOptionStrategy;

#[async_trait]
impl NodeStrategy for SelectOptionStrategy {
    fn node_type(&self) -> NodeType {
        NodeType::SelectOption
    }

    async fn execute(
        &self,
        page: &mut dyn Page,
        params: &NodeParams<'_>,
        _context: &mut ExecutionContext,
    ) -> Result<(), NodeError> {
        let selector = params.require_str("selector")?;
        // an empty value is a legitimate option
        let value = params.require_text("value")?;
        tracing::info!("Selecting {:?} in {}", value, selector);
        page.select_option(selector, &value).await?;
        Ok(())
    }

    fn metadata(&self) -> StrategyMetadata {
        StrategyMetadata {
            description: "Choose an option in a select element".to_string(),
            category: "browser".to_string(),
            params: vec![
                selector_param("select element"),
                ParamDefinition::required("value", "Option value to select"),
            ],
        }
    }
}

pub struct SetCheckboxStateStrategy;

#[async_trait]
impl NodeStrategy for SetCheckboxStateStrategy {
    fn node_type(&self) -> NodeType {
        NodeType::SetCheckboxState
    }

    async fn execute(
        &self,
        page: &mut dyn Page,
        params: &NodeParams<'_>,
        _context: &mut ExecutionContext,
    ) -> Result<(), NodeError> {
        let selector = params.require_str("selector")?;
        let checked = params.bool_or("checked", true)?;
        tracing::info!("{} {}", if checked { "Checking" } else { "Unchecking" }, selector);
        page.set_checked(selector, checked).await?;
        Ok(())
    }

    fn metadata(&self) -> StrategyMetadata {
        StrategyMetadata {
            description: "Check or uncheck a checkbox".to_string(),
            category: "browser".to_string(),
            params: vec![
                selector_param("checkbox"),
                ParamDefinition::optional("checked", "Desired state", Some("true")),
            ],
        }
    }
}

/// Fails unless the element becomes visible
pub struct AssertVisibleStrategy;

#[async_trait]
impl NodeStrategy for AssertVisibleStrategy {
    fn node_type(&self) -> NodeType {
        NodeType::AssertVisible
    }

    async fn execute(
        &self,
        page: &mut dyn Page,
        params: &NodeParams<'_>,
        _context: &mut ExecutionContext,
    ) -> Result<(), NodeError> {
        let selector = params.require_str("selector")?;
        page.wait_for_visible(selector).await?;
        tracing::info!("Element {} is visible", selector);
        Ok(())
    }

    fn metadata(&self) -> StrategyMetadata {
        StrategyMetadata {
            description: "Wait until an element is visible".to_string(),
            category: "browser".to_string(),
            params: vec![selector_param("element")],
        }
    }
}
