use async_trait::async_trait;
use pageflow_core::{
    ExecutionContext, NodeError, NodeParams, NodeStrategy, NodeType, Page, ParamDefinition,
    StrategyMetadata,
};
use tokio::time::{sleep, Duration};

const DEFAULT_TIMEOUT_MS: u64 = 1000;

/// Pause the run for `timeout` milliseconds
pub struct WaitStrategy;

#[async_trait]
impl NodeStrategy for WaitStrategy {
    fn node_type(&self) -> NodeType {
        NodeType::Wait
    }

    async fn execute(
        &self,
        _page: &mut dyn Page,
        params: &NodeParams<'_>,
        _context: &mut ExecutionContext,
    ) -> Result<(), NodeError> {
        let timeout_ms = params.u64_or("timeout", DEFAULT_TIMEOUT_MS)?;
        tracing::info!("Waiting {}ms", timeout_ms);
        sleep(Duration::from_millis(timeout_ms)).await;
        Ok(())
    }

    fn metadata(&self) -> StrategyMetadata {
        StrategyMetadata {
            description: "Sleep for a number of milliseconds".to_string(),
            category: "time".to_string(),
            params: vec![ParamDefinition::optional(
                "timeout",
                "Milliseconds to wait",
                Some("1000"),
            )],
        }
    }
}
