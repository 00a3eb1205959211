use crate::{ExecutionContext, NodeError, NodeType, Page, Params};
use async_trait::async_trait;

/// Behavior bound to one node type
#[async_trait]
pub trait NodeStrategy: Send + Sync {
    /// Tag this strategy is registered under
    fn node_type(&self) -> NodeType;

    /// Perform the node's side effect, reading and writing the shared context
    async fn execute(
        &self,
        page: &mut dyn Page,
        params: &NodeParams<'_>,
        context: &mut ExecutionContext,
    ) -> Result<(), NodeError>;

    /// Optional: describe the parameter contract for authoring tools
    fn metadata(&self) -> StrategyMetadata {
        StrategyMetadata::default()
    }
}

/// Typed view over a node's raw parameters
#[derive(Debug, Clone, Copy)]
pub struct NodeParams<'a> {
    node_type: NodeType,
    params: &'a Params,
}

impl<'a> NodeParams<'a> {
    pub fn new(node_type: NodeType, params: &'a Params) -> Self {
        Self { node_type, params }
    }

    pub fn node_type(&self) -> NodeType {
        self.node_type
    }

    pub fn get(&self, key: &str) -> Option<&'a serde_json::Value> {
        self.params.get(key).filter(|v| !v.is_null())
    }

    /// Get a required string parameter or fail naming the key.
    ///
    /// Empty strings count as missing.
    pub fn require_str(&self, key: &str) -> Result<&'a str, NodeError> {
        match self.get(key) {
            None => Err(self.missing(key)),
            Some(serde_json::Value::String(s)) if s.is_empty() => Err(self.missing(key)),
            Some(serde_json::Value::String(s)) => Ok(s),
            Some(_) => Err(self.invalid(key, "string")),
        }
    }

    /// Like [`require_str`](Self::require_str) but renders numbers and booleans as text
    pub fn require_text(&self, key: &str) -> Result<String, NodeError> {
        match self.get(key) {
            None => Err(self.missing(key)),
            Some(serde_json::Value::String(s)) => Ok(s.clone()),
            Some(serde_json::Value::Number(n)) => Ok(n.to_string()),
            Some(serde_json::Value::Bool(b)) => Ok(b.to_string()),
            Some(_) => Err(self.invalid(key, "string")),
        }
    }

    pub fn str_or(&self, key: &str, default: &'a str) -> Result<&'a str, NodeError> {
        match self.get(key) {
            None => Ok(default),
            Some(serde_json::Value::String(s)) => Ok(s),
            Some(_) => Err(self.invalid(key, "string")),
        }
    }

    pub fn opt_str(&self, key: &str) -> Result<Option<&'a str>, NodeError> {
        match self.get(key) {
            None => Ok(None),
            Some(serde_json::Value::String(s)) => Ok(Some(s)),
            Some(_) => Err(self.invalid(key, "string")),
        }
    }

    pub fn bool_or(&self, key: &str, default: bool) -> Result<bool, NodeError> {
        match self.get(key) {
            None => Ok(default),
            Some(serde_json::Value::Bool(b)) => Ok(*b),
            Some(serde_json::Value::String(s)) if s == "true" => Ok(true),
            Some(serde_json::Value::String(s)) if s == "false" => Ok(false),
            Some(_) => Err(self.invalid(key, "boolean")),
        }
    }

    /// Non-negative integer, accepting numeric strings from the editor
    pub fn u64_or(&self, key: &str, default: u64) -> Result<u64, NodeError> {
        match self.get(key) {
            None => Ok(default),
            Some(serde_json::Value::Number(n)) => n
                .as_u64()
                .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64))
                .ok_or_else(|| self.invalid(key, "non-negative number")),
            Some(serde_json::Value::String(s)) => s
                .trim()
                .parse()
                .map_err(|_| self.invalid(key, "non-negative number")),
            Some(_) => Err(self.invalid(key, "non-negative number")),
        }
    }

    /// List of strings; absent means empty
    pub fn str_list(&self, key: &str) -> Result<Vec<&'a str>, NodeError> {
        match self.get(key) {
            None => Ok(Vec::new()),
            Some(serde_json::Value::Array(items)) => items
                .iter()
                .map(|v| v.as_str().ok_or_else(|| self.invalid(key, "list of strings")))
                .collect(),
            Some(_) => Err(self.invalid(key, "list of strings")),
        }
    }

    fn missing(&self, key: &str) -> NodeError {
        NodeError::MissingParam {
            node_type: self.node_type.to_string(),
            key: key.to_string(),
        }
    }

    fn invalid(&self, key: &str, expected: &str) -> NodeError {
        NodeError::InvalidParam {
            node_type: self.node_type.to_string(),
            key: key.to_string(),
            expected: expected.to_string(),
        }
    }
}

/// Metadata about a node type
#[derive(Debug, Clone)]
pub struct StrategyMetadata {
    pub description: String,
    pub category: String,
    pub params: Vec<ParamDefinition>,
}

impl Default for StrategyMetadata {
    fn default() -> Self {
        Self {
            description: String::new(),
            category: "general".to_string(),
            params: Vec::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ParamDefinition {
    pub name: String,
    pub description: String,
    pub required: bool,
    pub default: Option<String>,
}

impl ParamDefinition {
    pub fn required(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            required: true,
            default: None,
        }
    }

    pub fn optional(
        name: impl Into<String>,
        description: impl Into<String>,
        default: Option<&str>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            required: false,
            default: default.map(str::to_string),
        }
    }
}
