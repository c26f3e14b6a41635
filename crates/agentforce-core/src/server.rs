//! HTTP wrapper that exposes agents as JSON endpoints
//!
//! Each route owns a factory that builds a fresh [`AgentForceAgent`] per
//! request, so requests never share chat history.
//!
//! Request body: `{"prompt": "...", "output": "json"}` (`output` optional,
//! defaults to text). Response body:
//! `{"success": true, "agent": "...", "format": "json", "output": "..."}`.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{MethodFilter, MethodRouter, get, on};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tracing::{error, info, warn};

use crate::agent::{AgentForceAgent, OutputFormat};

pub use axum::http::Method;

/// Builds the agent that serves one request
pub type AgentFactory = Arc<dyn Fn() -> AgentForceAgent + Send + Sync>;

#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("failed to bind HTTP listener on {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },
    #[error("HTTP server error: {0}")]
    Serve(#[from] std::io::Error),
}

#[derive(Debug, Clone, Deserialize)]
pub struct AgentRequest {
    pub prompt: String,
    #[serde(default)]
    pub output: OutputFormat,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentResponse {
    pub success: bool,
    pub agent: String,
    pub format: OutputFormat,
    pub output: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub agent: String,
    pub error: String,
}

struct AgentRoute {
    method: Method,
    path: String,
    factory: AgentFactory,
}

pub struct AgentServer {
    name: String,
    routes: Vec<AgentRoute>,
}

impl AgentServer {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            routes: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Serve agents from `factory` at `method path`
    ///
    /// Adding the same method and path again replaces the earlier route.
    pub fn add_route_agent<F>(mut self, method: Method, path: impl Into<String>, factory: F) -> Self
    where
        F: Fn() -> AgentForceAgent + Send + Sync + 'static,
    {
        let path = path.into();
        self.routes.retain(|r| !(r.method == method && r.path == path));
        self.routes.push(AgentRoute {
            method,
            path,
            factory: Arc::new(factory),
        });
        self
    }

    /// Build the axum router: agent routes, `GET /health`, permissive CORS
    pub fn router(&self) -> Router {
        let mut by_path: HashMap<&str, MethodRouter> = HashMap::new();

        for route in &self.routes {
            let filter = match MethodFilter::try_from(route.method.clone()) {
                Ok(filter) => filter,
                Err(_) => {
                    warn!(method = %route.method, path = %route.path, "Unsupported method, skipping route");
                    continue;
                }
            };

            let factory = route.factory.clone();
            let handler = move |Json(request): Json<AgentRequest>| handle_agent(factory.clone(), request);

            let entry = by_path.remove(route.path.as_str()).unwrap_or_default();
            by_path.insert(route.path.as_str(), entry.merge(on(filter, handler)));
        }

        let mut router = Router::new().route("/health", get(health));
        for (path, method_router) in by_path {
            router = router.route(path, method_router);
        }
        router.layer(CorsLayer::permissive())
    }

    /// Bind `addr` and serve until Ctrl-C
    pub async fn serve(self, addr: SocketAddr) -> Result<(), ServerError> {
        let app = self.router();
        info!(%addr, server = %self.name, routes = self.routes.len(), "Binding agent server");

        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| ServerError::Bind { addr, source })?;
        info!(%addr, "Agent server ready to accept connections");

        axum::serve(listener, app.into_make_service())
            .with_graceful_shutdown(async {
                if tokio::signal::ctrl_c().await.is_ok() {
                    info!("Shutting down agent server");
                }
            })
            .await
            .map_err(ServerError::Serve)
    }
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn handle_agent(factory: AgentFactory, request: AgentRequest) -> Response {
    let agent = factory();
    let name = agent.name().to_string();

    if request.prompt.trim().is_empty() {
        warn!(agent = %name, "Rejecting request with empty prompt");
        return error_response(StatusCode::BAD_REQUEST, name, "prompt cannot be empty".to_string());
    }

    info!(agent = %name, format = request.output.as_str(), "Agent request");
    let mut agent = agent.prompt(request.prompt);
    match agent.output(request.output).await {
        Ok(output) => Json(AgentResponse {
            success: true,
            agent: name,
            format: request.output,
            output,
        })
        .into_response(),
        Err(e) => {
            error!(agent = %name, error = %e, "Agent run failed");
            error_response(StatusCode::BAD_GATEWAY, name, e.to_string())
        }
    }
}

fn error_response(status: StatusCode, agent: String, error: String) -> Response {
    (
        status,
        Json(ErrorResponse {
            success: false,
            agent,
            error,
        }),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::AgentConfig;
    use crate::error::{Error, Result};
    use crate::provider::{ChatProvider, CompletionResult, LlmMessage, ModelSettings};
    use crate::tools::ToolDefinition;
    use async_trait::async_trait;
    use serde_json::{Value, json};

    struct FixedProvider(std::result::Result<&'static str, &'static str>);

    #[async_trait]
    impl ChatProvider for FixedProvider {
        fn name(&self) -> &str {
            "fixed"
        }

        fn model(&self) -> &str {
            "fixed"
        }

        async fn chat(
            &self,
            _messages: &[LlmMessage],
            _tools: &[ToolDefinition],
            _settings: &ModelSettings,
        ) -> Result<CompletionResult> {
            match self.0 {
                Ok(text) => Ok(CompletionResult::text(text)),
                Err(message) => Err(Error::Provider(message.to_string())),
            }
        }
    }

    async fn spawn(server: AgentServer) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let app = server.router();
        tokio::spawn(async move {
            axum::serve(listener, app.into_make_service()).await.unwrap();
        });
        format!("http://{}", addr)
    }

    fn server(reply: std::result::Result<&'static str, &'static str>) -> AgentServer {
        AgentServer::new("test").add_route_agent(Method::POST, "/agent", move || {
            AgentForceAgent::new(AgentConfig::new("helper")).with_provider(Arc::new(FixedProvider(reply)))
        })
    }

    #[tokio::test]
    async fn test_health() {
        let base = spawn(server(Ok("hi"))).await;
        let body: Value = reqwest::get(format!("{}/health", base)).await.unwrap().json().await.unwrap();
        assert_eq!(body, json!({"status": "ok"}));
    }

    #[tokio::test]
    async fn test_agent_route_formats_output() {
        let base = spawn(server(Ok("```json\n{\"a\": 1}\n```"))).await;
        let response = reqwest::Client::new()
            .post(format!("{}/agent", base))
            .json(&json!({"prompt": "give me json", "output": "json"}))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 200);

        let body: AgentResponse = response.json().await.unwrap();
        assert!(body.success);
        assert_eq!(body.agent, "helper");
        assert_eq!(body.format, OutputFormat::Json);
        let parsed: Value = serde_json::from_str(&body.output).unwrap();
        assert_eq!(parsed, json!({"a": 1}));
    }

    #[tokio::test]
    async fn test_empty_prompt_is_bad_request() {
        let base = spawn(server(Ok("hi"))).await;
        let response = reqwest::Client::new()
            .post(format!("{}/agent", base))
            .json(&json!({"prompt": "  "}))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 400);
        let body: ErrorResponse = response.json().await.unwrap();
        assert!(!body.success);
    }

    #[tokio::test]
    async fn test_agent_failure_is_bad_gateway() {
        let base = spawn(server(Err("model offline"))).await;
        let response = reqwest::Client::new()
            .post(format!("{}/agent", base))
            .json(&json!({"prompt": "hello"}))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 502);
        let body: ErrorResponse = response.json().await.unwrap();
        assert!(body.error.contains("model offline"));
    }

    #[test]
    fn test_duplicate_route_replaced() {
        let server = server(Ok("a")).add_route_agent(Method::POST, "/agent", || {
            AgentForceAgent::new(AgentConfig::new("other"))
        });
        assert_eq!(server.routes.len(), 1);
        let _ = server.router();
    }
}
