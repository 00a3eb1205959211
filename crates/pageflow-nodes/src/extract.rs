use async_trait::async_trait;
use pageflow_core::{
    Element, ExecutionContext, NodeError, NodeParams, NodeStrategy, NodeType, Page,
    ParamDefinition, PageError, Record, StrategyMetadata,
};
use std::fmt;
use std::str::FromStr;

const TEXT_PREFIX: &str = "EXTRACT_TEXT:";
const ATTR_PREFIX: &str = "EXTRACT_ATTR:";

/// Store an element's text content in the context
pub struct ExtractTextStrategy;

#[async_trait]
impl NodeStrategy for ExtractTextStrategy {
    fn node_type(&self) -> NodeType {
        NodeType::ExtractText
    }

    async fn execute(
        &self,
        page: &mut dyn Page,
        params: &NodeParams<'_>,
        context: &mut ExecutionContext,
    ) -> Result<(), NodeError> {
        let selector = params.require_str("selector")?;
        let variable = params.str_or("variableName", "extracted_text")?;

        let text = page.text_content(selector).await?.unwrap_or_default();
        tracing::info!("Extracted {} chars from {} into '{}'", text.len(), selector, variable);
        context.insert(variable, text);
        Ok(())
    }

    fn metadata(&self) -> StrategyMetadata {
        StrategyMetadata {
            description: "Read the text of an element into a variable".to_string(),
            category: "extract".to_string(),
            params: vec![
                ParamDefinition::required("selector", "CSS selector of the element"),
                ParamDefinition::optional("variableName", "Context key", Some("extracted_text")),
            ],
        }
    }
}

/// One per-item extraction rule of `extractMultiple`.
///
/// Written as `EXTRACT_TEXT:<selector>><field>` or
/// `EXTRACT_ATTR:<selector>@<attribute>><field>`. The last `>` separates the field,
/// so selectors may use the child combinator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtractCommand {
    Text {
        selector: String,
        field: String,
    },
    Attribute {
        selector: String,
        attribute: String,
        field: String,
    },
}

impl ExtractCommand {
    pub fn field(&self) -> &str {
        match self {
            ExtractCommand::Text { field, .. } | ExtractCommand::Attribute { field, .. } => field,
        }
    }

    async fn apply(&self, item: &dyn Element) -> Result<Option<String>, PageError> {
        match self {
            ExtractCommand::Text { selector, .. } => item.text_content(selector).await,
            ExtractCommand::Attribute {
                selector,
                attribute,
                ..
            } => item.attribute(selector, attribute).await,
        }
    }
}

impl FromStr for ExtractCommand {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Some(rest) = s.strip_prefix(TEXT_PREFIX) {
            let (selector, field) = split_field(rest)?;
            return Ok(ExtractCommand::Text {
                selector: selector.to_string(),
                field: field.to_string(),
            });
        }
        if let Some(rest) = s.strip_prefix(ATTR_PREFIX) {
            let (target, field) = split_field(rest)?;
            let (selector, attribute) = target
                .rsplit_once('@')
                .map(|(sel, attr)| (sel.trim(), attr.trim()))
                .filter(|(sel, attr)| !sel.is_empty() && !attr.is_empty())
                .ok_or_else(|| format!("expected <selector>@<attribute> in {s:?}"))?;
            return Ok(ExtractCommand::Attribute {
                selector: selector.to_string(),
                attribute: attribute.to_string(),
                field: field.to_string(),
            });
        }
        Err(format!("unknown extract command {s:?}"))
    }
}

fn split_field(rest: &str) -> Result<(&str, &str), String> {
    rest.rsplit_once('>')
        .map(|(target, field)| (target.trim(), field.trim()))
        .filter(|(target, field)| !target.is_empty() && !field.is_empty())
        .ok_or_else(|| format!("expected <target>><field> in {rest:?}"))
}

impl fmt::Display for ExtractCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExtractCommand::Text { selector, field } => write!(f, "{TEXT_PREFIX}{selector}>{field}"),
            ExtractCommand::Attribute {
                selector,
                attribute,
                field,
            } => write!(f, "{ATTR_PREFIX}{selector}@{attribute}>{field}"),
        }
    }
}

/// Build one record per repeated item
pub struct ExtractMultipleStrategy;

impl ExtractMultipleStrategy {
    fn parse_commands(params: &NodeParams<'_>) -> Result<Vec<ExtractCommand>, NodeError> {
        let mut commands = Vec::new();
        for raw in params.str_list("extractCommands")? {
            match raw.parse::<ExtractCommand>() {
                Ok(command) => commands.push(command),
                Err(e) => tracing::warn!("Skipping extract command: {}", e),
            }
        }
        Ok(commands)
    }
}

#[async_trait]
impl NodeStrategy for ExtractMultipleStrategy {
    fn node_type(&self) -> NodeType {
        NodeType::ExtractMultiple
    }

    async fn execute(
        &self,
        page: &mut dyn Page,
        params: &NodeParams<'_>,
        context: &mut ExecutionContext,
    ) -> Result<(), NodeError> {
        let container = params.require_str("containerSelector")?;
        let item_selector = params.require_str("itemSelector")?;
        let variable = params.str_or("variableName", "extracted_data")?;
        let commands = Self::parse_commands(params)?;

        let items = page.query_all(&format!("{container} {item_selector}")).await?;

        let mut records = Vec::with_capacity(items.len());
        for item in &items {
            let mut record = Record::new();
            for command in &commands {
                let value = command.apply(item.as_ref()).await?;
                record.insert(command.field().to_string(), value);
            }
            records.push(record);
        }

        tracing::info!("Extracted {} items into '{}'", records.len(), variable);
        context.insert(variable, records);
        Ok(())
    }

    fn metadata(&self) -> StrategyMetadata {
        StrategyMetadata {
            description: "Extract one record per repeated element".to_string(),
            category: "extract".to_string(),
            params: vec![
                ParamDefinition::required("containerSelector", "Selector of the list container"),
                ParamDefinition::required("itemSelector", "Selector of each item inside the container"),
                ParamDefinition::optional(
                    "extractCommands",
                    "EXTRACT_TEXT:<sel>><field> or EXTRACT_ATTR:<sel>@<attr>><field> entries",
                    Some("[]"),
                ),
                ParamDefinition::optional("variableName", "Context key", Some("extracted_data")),
            ],
        }
    }
}
