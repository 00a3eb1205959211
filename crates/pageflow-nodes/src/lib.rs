//! Built-in node strategies
//!
//! One strategy per node type: browser actions, extraction, HTTP calls,
//! timing and the control-flow markers.

mod browser;
mod control;
mod extract;
mod http;
mod time;

pub use browser::{
    AssertVisibleStrategy, ClickStrategy, FillStrategy, GotoStrategy, SelectOptionStrategy,
    SetCheckboxStateStrategy,
};
pub use control::{PassThroughStrategy, StartStrategy, StopStrategy};
pub use extract::{ExtractCommand, ExtractMultipleStrategy, ExtractTextStrategy};
pub use http::HttpRequestStrategy;
pub use time::WaitStrategy;

use pageflow_core::NodeType;
use pageflow_runtime::StrategyRegistry;
use std::sync::Arc;

/// Register every built-in strategy
pub fn register_all(registry: &mut StrategyRegistry) {
    registry.register(Arc::new(StartStrategy));
    registry.register(Arc::new(StopStrategy));
    registry.register(Arc::new(GotoStrategy));
    registry.register(Arc::new(ClickStrategy));
    registry.register(Arc::new(FillStrategy));
    registry.register(Arc::new(SelectOptionStrategy));
    registry.register(Arc::new(SetCheckboxStateStrategy));
    registry.register(Arc::new(AssertVisibleStrategy));
    registry.register(Arc::new(WaitStrategy));
    registry.register(Arc::new(ExtractTextStrategy));
    registry.register(Arc::new(ExtractMultipleStrategy));
    registry.register(Arc::new(HttpRequestStrategy::new()));
    registry.register(Arc::new(PassThroughStrategy::new(NodeType::If)));
    registry.register(Arc::new(PassThroughStrategy::new(NodeType::AdvancedCondition)));
    registry.register(Arc::new(PassThroughStrategy::new(NodeType::ForEach)));
}

/// Registry holding every built-in strategy
pub fn default_registry() -> StrategyRegistry {
    let mut registry = StrategyRegistry::new();
    register_all(&mut registry);
    registry
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_node_type_has_a_strategy() {
        let registry = default_registry();
        assert_eq!(registry.len(), NodeType::ALL.len());
        for t in NodeType::ALL {
            assert!(registry.contains(t.as_str()), "missing strategy for {t}");
        }
    }
}
