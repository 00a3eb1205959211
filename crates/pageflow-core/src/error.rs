use thiserror::Error;

#[derive(Error, Debug)]
pub enum FlowError {
    #[error("Node error: {0}")]
    Node(#[from] NodeError),

    #[error("Workflow error: {0}")]
    Workflow(#[from] WorkflowError),

    #[error("Page error: {0}")]
    Page(#[from] PageError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Node panicked: {0}")]
    Panicked(String),
}

/// Failures raised while executing a single node.
#[derive(Error, Debug, Clone)]
pub enum NodeError {
    #[error("Unknown node type: {0}")]
    UnknownNodeType(String),

    #[error("Node '{node_type}' requires parameter '{key}'")]
    MissingParam { node_type: String, key: String },

    #[error("Invalid parameter '{key}' for node '{node_type}': expected {expected}")]
    InvalidParam {
        node_type: String,
        key: String,
        expected: String,
    },

    #[error("Execution failed: {0}")]
    ExecutionFailed(String),

    #[error(transparent)]
    Page(#[from] PageError),
}

#[derive(Error, Debug, Clone)]
pub enum WorkflowError {
    #[error("Invalid workflow definition: {0}")]
    InvalidDefinition(String),

    #[error("Next node not found: {0}")]
    NextNodeNotFound(String),
}

/// Errors reported by a browser driver.
#[derive(Error, Debug, Clone)]
pub enum PageError {
    #[error("Failed to launch browser session: {0}")]
    Launch(String),

    #[error("Navigation to {url} failed: {reason}")]
    Navigation { url: String, reason: String },

    #[error("Element not found: {0}")]
    ElementNotFound(String),

    #[error("Timed out waiting for {0}")]
    Timeout(String),

    #[error("Driver error: {0}")]
    Driver(String),
}
