use pageflow_core::{NodeError, NodeStrategy, NodeType, StrategyMetadata};
use std::collections::HashMap;
use std::sync::Arc;

/// Registry of available node strategies.
///
/// Built once at startup, then shared read-only behind an `Arc`.
pub struct StrategyRegistry {
    strategies: HashMap<NodeType, Arc<dyn NodeStrategy>>,
}

impl StrategyRegistry {
    pub fn new() -> Self {
        Self {
            strategies: HashMap::new(),
        }
    }

    /// Register a strategy, replacing any previous one for the same type
    pub fn register(&mut self, strategy: Arc<dyn NodeStrategy>) {
        let node_type = strategy.node_type();
        tracing::debug!("Registering node strategy: {}", node_type);
        self.strategies.insert(node_type, strategy);
    }

    /// Look up the strategy for a type tag
    pub fn get(&self, tag: &str) -> Result<Arc<dyn NodeStrategy>, NodeError> {
        let node_type: NodeType = tag.parse()?;
        self.strategies
            .get(&node_type)
            .cloned()
            .ok_or_else(|| NodeError::UnknownNodeType(tag.to_string()))
    }

    pub fn contains(&self, tag: &str) -> bool {
        self.get(tag).is_ok()
    }

    /// Registered types in declaration order
    pub fn list_node_types(&self) -> Vec<NodeType> {
        NodeType::ALL
            .iter()
            .copied()
            .filter(|t| self.strategies.contains_key(t))
            .collect()
    }

    pub fn metadata(&self, node_type: NodeType) -> Option<StrategyMetadata> {
        self.strategies.get(&node_type).map(|s| s.metadata())
    }

    pub fn len(&self) -> usize {
        self.strategies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }
}

impl Default for StrategyRegistry {
    fn default() -> Self {
        Self::new()
    }
}
