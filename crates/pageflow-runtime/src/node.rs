use pageflow_core::{
    ExecutionContext, NodeError, NodeParams, NodeSpec, NodeStrategy, NodeType, Page, Params,
    DEFAULT_PORT,
};
use std::collections::HashMap;
use std::time::Instant;

/// Generic port lookup order, after the caller's preferred port
const PORT_FALLBACK: [&str; 3] = ["out", "out_right", "out_bottom"];

/// One vertex of a built workflow graph
#[derive(Debug, Clone)]
pub struct Node {
    id: String,
    type_tag: String,
    node_type: Option<NodeType>,
    params: Params,
    display_name: String,
    position: (f64, f64),
    outputs: HashMap<String, String>,
    executed: bool,
    last_execution_duration_ms: Option<u64>,
}

impl Node {
    pub fn from_spec(spec: &NodeSpec) -> Self {
        Self {
            id: spec.id.clone(),
            type_tag: spec.node_type.clone(),
            node_type: spec.node_type.parse().ok(),
            params: spec.params.clone(),
            display_name: spec.display_name.clone().unwrap_or_else(|| spec.id.clone()),
            position: (spec.x, spec.y),
            outputs: HashMap::new(),
            executed: false,
            last_execution_duration_ms: None,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Type tag as written in the definition
    pub fn type_tag(&self) -> &str {
        &self.type_tag
    }

    /// Parsed type, `None` when the tag is not a known node type
    pub fn node_type(&self) -> Option<NodeType> {
        self.node_type
    }

    pub fn is(&self, node_type: NodeType) -> bool {
        self.node_type == Some(node_type)
    }

    pub fn params(&self) -> &Params {
        &self.params
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn position(&self) -> (f64, f64) {
        self.position
    }

    pub fn outputs(&self) -> &HashMap<String, String> {
        &self.outputs
    }

    pub fn executed(&self) -> bool {
        self.executed
    }

    pub fn last_execution_duration_ms(&self) -> Option<u64> {
        self.last_execution_duration_ms
    }

    /// Bind an output port to a target node. A port holds one target; rebinding replaces it.
    pub fn add_connection(&mut self, from_port: impl Into<String>, to_node_id: impl Into<String>) {
        self.outputs.insert(from_port.into(), to_node_id.into());
    }

    /// Resolve the next node id, trying the type's branch ports first, then
    /// `from_port`, `out`, `out_right` and `out_bottom`.
    pub fn next_node_id(&self, from_port: &str) -> Option<&str> {
        if let Some(ports) = self.node_type.and_then(|t| t.branch_ports()) {
            return ports
                .iter()
                .find_map(|port| self.outputs.get(*port))
                .map(String::as_str);
        }

        std::iter::once(from_port)
            .chain(PORT_FALLBACK)
            .find_map(|port| self.outputs.get(port))
            .map(String::as_str)
    }

    /// Shorthand for [`next_node_id`](Self::next_node_id) on the default port
    pub fn next(&self) -> Option<&str> {
        self.next_node_id(DEFAULT_PORT)
    }

    /// Run the node through its strategy, recording execution metadata
    pub async fn execute(
        &mut self,
        strategy: &dyn NodeStrategy,
        page: &mut dyn Page,
        context: &mut ExecutionContext,
    ) -> Result<(), NodeError> {
        tracing::info!("Executing node {} ({})", self.display_name, self.type_tag);

        let start = Instant::now();
        let params = NodeParams::new(strategy.node_type(), &self.params);
        let result = strategy.execute(page, &params, context).await;
        let duration_ms = start.elapsed().as_millis() as u64;
        self.last_execution_duration_ms = Some(duration_ms);

        match &result {
            Ok(()) => {
                self.executed = true;
                tracing::info!("Node {} completed in {}ms", self.display_name, duration_ms);
            }
            Err(e) => {
                tracing::error!("Node {} failed after {}ms: {}", self.display_name, duration_ms, e);
            }
        }
        result
    }

    /// Clear per-run fields
    pub fn reset(&mut self) {
        self.executed = false;
        self.last_execution_duration_ms = None;
    }
}
