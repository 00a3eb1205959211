use serde::{Deserialize, Serialize};

/// Port used when a connection or lookup does not name one
pub const DEFAULT_PORT: &str = "out";

/// Node parameters as authored in the definition
pub type Params = serde_json::Map<String, serde_json::Value>;

/// Declarative workflow graph, as produced by the editor
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorkflowDefinition {
    #[serde(default)]
    pub nodes: Vec<NodeSpec>,
    #[serde(default)]
    pub connections: Vec<Connection>,
}

impl WorkflowDefinition {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn add_node(&mut self, node: NodeSpec) -> String {
        let id = node.id.clone();
        self.nodes.push(node);
        id
    }

    pub fn connect(
        &mut self,
        from_node: impl Into<String>,
        from_port: impl Into<String>,
        to_node: impl Into<String>,
    ) {
        self.connections.push(Connection {
            from_node: from_node.into(),
            from_port: from_port.into(),
            to_node: to_node.into(),
            to_port: None,
        });
    }

    pub fn find_node(&self, id: &str) -> Option<&NodeSpec> {
        self.nodes.iter().find(|n| n.id == id)
    }

    /// start → goto → wait → stop, the workflow written by `pageflow init`
    pub fn sample() -> Self {
        let mut def = Self::new();
        let start = def.add_node(
            NodeSpec::new("start_1", "start")
                .with_display_name("Start")
                .with_position(100.0, 100.0),
        );
        let goto = def.add_node(
            NodeSpec::new("goto_1", "goto")
                .with_display_name("Open example.com")
                .with_param("url", "https://example.com")
                .with_position(300.0, 100.0),
        );
        let wait = def.add_node(
            NodeSpec::new("wait_1", "wait")
                .with_display_name("Wait 2 seconds")
                .with_param("timeout", 2000)
                .with_position(500.0, 100.0),
        );
        let stop = def.add_node(
            NodeSpec::new("stop_1", "stop")
                .with_display_name("Finish")
                .with_position(700.0, 100.0),
        );
        def.connect(&start, DEFAULT_PORT, &goto);
        def.connect(&goto, DEFAULT_PORT, &wait);
        def.connect(&wait, DEFAULT_PORT, &stop);
        def
    }
}

/// Node specification in a workflow definition
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeSpec {
    pub id: String,
    #[serde(rename = "type")]
    pub node_type: String,
    #[serde(default)]
    pub params: Params,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default)]
    pub x: f64,
    #[serde(default)]
    pub y: f64,
}

impl NodeSpec {
    pub fn new(id: impl Into<String>, node_type: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            node_type: node_type.into(),
            params: Params::new(),
            display_name: None,
            x: 0.0,
            y: 0.0,
        }
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    pub fn with_position(mut self, x: f64, y: f64) -> Self {
        self.x = x;
        self.y = y;
        self
    }
}

fn default_port() -> String {
    DEFAULT_PORT.to_string()
}

/// Directed edge from an output port to another node
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Connection {
    pub from_node: String,
    #[serde(default = "default_port")]
    pub from_port: String,
    pub to_node: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to_port: Option<String>,
}

/// Proxy and identity applied to the browser session of a whole run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProxySettings {
    pub server: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
}

impl ProxySettings {
    pub fn new(server: impl Into<String>) -> Self {
        Self {
            server: server.into(),
            username: None,
            password: None,
            user_agent: None,
        }
    }

    pub fn with_credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }
}
