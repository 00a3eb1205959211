//! Core abstractions for the pageflow engine
//!
//! This crate provides the fundamental types and traits that all other
//! components depend on: workflow definitions, node types, the shared
//! execution context, the lifecycle state machine and the browser boundary.

mod definition;
mod error;
pub mod events;
mod node_type;
mod page;
mod state;
mod strategy;
mod value;

pub use definition::{Connection, NodeSpec, Params, ProxySettings, WorkflowDefinition, DEFAULT_PORT};
pub use error::{FlowError, NodeError, PageError, WorkflowError};
pub use events::{EventBus, ExecutionEvent, ExecutionId};
pub use node_type::NodeType;
pub use page::{Browser, Element, Page, SessionOptions};
pub use state::WorkflowState;
pub use strategy::{NodeParams, NodeStrategy, ParamDefinition, StrategyMetadata};
pub use value::{ContextValue, ExecutionContext, Record};

/// Result type for flow operations
pub type Result<T> = std::result::Result<T, FlowError>;
