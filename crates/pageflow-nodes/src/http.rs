use async_trait::async_trait;
use pageflow_core::{
    ContextValue, ExecutionContext, NodeError, NodeParams, NodeStrategy, NodeType, Page,
    ParamDefinition, StrategyMetadata,
};
use reqwest::Method;

const VARIABLE_SOURCE_PREFIX: &str = "GET_VARIABLE:";

/// HTTP call outside the browser session, storing the decoded response
pub struct HttpRequestStrategy {
    client: reqwest::Client,
}

impl HttpRequestStrategy {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    /// Payload named by `dataSource`, if any
    fn payload(
        params: &NodeParams<'_>,
        context: &ExecutionContext,
    ) -> Result<Option<serde_json::Value>, NodeError> {
        let Some(source) = params.opt_str("dataSource")? else {
            return Ok(None);
        };
        let Some(name) = source.strip_prefix(VARIABLE_SOURCE_PREFIX) else {
            tracing::warn!("Ignoring dataSource {:?}: expected {}<name>", source, VARIABLE_SOURCE_PREFIX);
            return Ok(None);
        };
        match context.get(name) {
            Some(value) => Ok(Some(value.to_json())),
            None => {
                tracing::warn!("dataSource variable '{}' is not set, sending no body", name);
                Ok(None)
            }
        }
    }
}

impl Default for HttpRequestStrategy {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl NodeStrategy for HttpRequestStrategy {
    fn node_type(&self) -> NodeType {
        NodeType::HttpRequest
    }

    async fn execute(
        &self,
        _page: &mut dyn Page,
        params: &NodeParams<'_>,
        context: &mut ExecutionContext,
    ) -> Result<(), NodeError> {
        let url = params.require_str("url")?;
        let method_name = params.str_or("method", "GET")?.to_uppercase();
        let method = Method::from_bytes(method_name.as_bytes()).map_err(|_| NodeError::InvalidParam {
            node_type: NodeType::HttpRequest.to_string(),
            key: "method".to_string(),
            expected: "HTTP method".to_string(),
        })?;
        let variable = params.str_or("variableName", "http_response")?;

        tracing::info!("{} {}", method, url);

        let mut request = self.client.request(method.clone(), url);
        if method != Method::GET {
            if let Some(body) = Self::payload(params, context)? {
                request = request.json(&body);
            }
        }
        if let Some(serde_json::Value::Object(headers)) = params.get("headers") {
            for (key, value) in headers {
                if let Some(value) = value.as_str() {
                    request = request.header(key.as_str(), value);
                }
            }
        }

        let response = request
            .send()
            .await
            .map_err(|e| NodeError::ExecutionFailed(format!("HTTP request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(NodeError::ExecutionFailed(format!(
                "{} {} returned {}",
                method, url, status
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| NodeError::ExecutionFailed(format!("Failed to read response: {}", e)))?;

        let value = match serde_json::from_str::<serde_json::Value>(&body) {
            Ok(json) => ContextValue::Json(json),
            Err(_) => ContextValue::Text(body),
        };

        tracing::info!("Response status: {} -> '{}'", status.as_u16(), variable);
        context.insert(variable, value);
        Ok(())
    }

    fn metadata(&self) -> StrategyMetadata {
        StrategyMetadata {
            description: "Make an HTTP request and store the response".to_string(),
            category: "http".to_string(),
            params: vec![
                ParamDefinition::required("url", "Request URL"),
                ParamDefinition::optional("method", "HTTP method", Some("GET")),
                ParamDefinition::optional(
                    "dataSource",
                    "GET_VARIABLE:<name> to send a context value as JSON body",
                    None,
                ),
                ParamDefinition::optional("headers", "Extra request headers", None),
                ParamDefinition::optional("variableName", "Context key", Some("http_response")),
            ],
        }
    }
}
