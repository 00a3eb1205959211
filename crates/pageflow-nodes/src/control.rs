use async_trait::async_trait;
use pageflow_core::{ExecutionContext, NodeError, NodeParams, NodeStrategy, NodeType, Page, StrategyMetadata};

pub struct StartStrategy;

#[async_trait]
impl NodeStrategy for StartStrategy {
    fn node_type(&self) -> NodeType {
        NodeType::Start
    }

    async fn execute(
        &self,
        _page: &mut dyn Page,
        _params: &NodeParams<'_>,
        _context: &mut ExecutionContext,
    ) -> Result<(), NodeError> {
        tracing::debug!("Entering workflow");
        Ok(())
    }

    fn metadata(&self) -> StrategyMetadata {
        StrategyMetadata {
            description: "Entry point of the workflow".to_string(),
            category: "control".to_string(),
            params: Vec::new(),
        }
    }
}

/// Ends traversal; the runtime stops after executing it
pub struct StopStrategy;

#[async_trait]
impl NodeStrategy for StopStrategy {
    fn node_type(&self) -> NodeType {
        NodeType::Stop
    }

    async fn execute(
        &self,
        _page: &mut dyn Page,
        _params: &NodeParams<'_>,
        _context: &mut ExecutionContext,
    ) -> Result<(), NodeError> {
        tracing::debug!("Reached end of workflow");
        Ok(())
    }

    fn metadata(&self) -> StrategyMetadata {
        StrategyMetadata {
            description: "Terminates the workflow successfully".to_string(),
            category: "control".to_string(),
            params: Vec::new(),
        }
    }
}

/// Branching node without a side effect of its own.
///
/// Condition evaluation is not implemented; traversal takes the node's preferred
/// port (`then` for conditions, `next` for loops) and falls back to `out`.
pub struct PassThroughStrategy {
    node_type: NodeType,
}

impl PassThroughStrategy {
    pub fn new(node_type: NodeType) -> Self {
        Self { node_type }
    }
}

#[async_trait]
impl NodeStrategy for PassThroughStrategy {
    fn node_type(&self) -> NodeType {
        self.node_type
    }

    async fn execute(
        &self,
        _page: &mut dyn Page,
        _params: &NodeParams<'_>,
        _context: &mut ExecutionContext,
    ) -> Result<(), NodeError> {
        tracing::debug!("'{}' node passes through", self.node_type);
        Ok(())
    }

    fn metadata(&self) -> StrategyMetadata {
        let ports = self
            .node_type
            .branch_ports()
            .map(|ports| ports.join(", then "))
            .unwrap_or_else(|| "out".to_string());
        StrategyMetadata {
            description: format!("Control-flow marker; follows {ports}"),
            category: "control".to_string(),
            params: Vec::new(),
        }
    }
}
