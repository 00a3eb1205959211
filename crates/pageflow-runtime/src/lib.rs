//! Workflow execution runtime
//!
//! This crate builds workflow graphs from definitions, walks them node by node
//! through the strategy registry, and schedules many workflows under a shared
//! concurrency limit.

mod analysis;
mod config;
mod node;
mod registry;
mod scheduler;
mod workflow;

pub use analysis::{DanglingEdge, GraphReport};
pub use config::{SchedulerConfig, EVENT_BUFFER_ENV, MAX_CONCURRENT_ENV};
pub use node::Node;
pub use registry::StrategyRegistry;
pub use scheduler::{BatchHandle, BatchProgress, SchedulerError, SchedulerStatus, WorkflowScheduler};
pub use workflow::{Workflow, WorkflowStatus};
