//! Tool registry for MCP tools.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde_json::{json, Value};

use crate::content::{ContentExtractor, DEFAULT_MAX_LENGTH};
use crate::mcp::handlers::{ReadDocumentationHandler, RecommendHandler, SearchDocumentationHandler};
use crate::mcp::schema;
use crate::models::{DEFAULT_RECOMMENDATIONS, DEFAULT_SEARCH_RESULTS};
use crate::sources::{DocumentationSource, SourceError};
use crate::utils::{ValidationError, AWS_DOCS_HOST, DEFAULT_TIMEOUT};

/// An MCP tool that can be called by the client
#[derive(Clone)]
pub struct Tool {
    /// Tool name (e.g., "search_documentation")
    pub name: String,

    /// Human-readable description
    pub description: String,

    /// JSON Schema for input parameters
    pub input_schema: Value,

    /// Handler function to execute the tool
    pub handler: Arc<dyn ToolHandler>,
}

impl Tool {
    /// The definition advertised by `tools/list`
    pub fn definition(&self) -> Value {
        json!({
            "name": self.name,
            "description": self.description,
            "inputSchema": self.input_schema,
        })
    }
}

impl std::fmt::Debug for Tool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tool")
            .field("name", &self.name)
            .field("description", &self.description)
            .field("input_schema", &self.input_schema)
            .finish()
    }
}

/// Handler for executing a tool
#[async_trait::async_trait]
pub trait ToolHandler: Send + Sync + std::fmt::Debug {
    /// Execute the tool with arguments already checked against its schema
    async fn execute(&self, args: Value) -> Result<ToolCallResult, ToolError>;
}

/// Content block of a tool result
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ToolContent {
    Text { text: String },
}

/// Result of a tool call, as carried in the `tools/call` response
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolCallResult {
    pub content: Vec<ToolContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub structured_content: Option<Value>,
    pub is_error: bool,
}

impl ToolCallResult {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            content: vec![ToolContent::Text { text: text.into() }],
            structured_content: None,
            is_error: false,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            is_error: true,
            ..Self::text(message)
        }
    }

    #[must_use]
    pub fn with_structured(mut self, value: Value) -> Self {
        self.structured_content = Some(value);
        self
    }

    /// Text of the first content block
    pub fn first_text(&self) -> Option<&str> {
        self.content.first().map(|ToolContent::Text { text }| text.as_str())
    }
}

/// Failures raised while running a tool
///
/// Every variant except [`ToolError::Internal`] is reported to the client as
/// a tool result with `isError: true`.
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("Invalid arguments: {0}")]
    Validation(String),

    #[error(transparent)]
    InvalidUrl(#[from] ValidationError),

    #[error("Upstream request failed: {0}")]
    Upstream(#[from] SourceError),

    #[error("Upstream request timed out after {}s", .0.as_secs())]
    Timeout(Duration),

    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Settings shared by the documentation tool handlers
#[derive(Debug, Clone)]
pub struct ToolSettings {
    /// Bound on every upstream call
    pub timeout: Duration,

    /// Hosts `read_documentation` may fetch from
    pub allowed_hosts: Vec<String>,
}

impl Default for ToolSettings {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            allowed_hosts: vec![AWS_DOCS_HOST.to_string()],
        }
    }
}

/// Registry for all MCP tools
#[derive(Debug, Clone, Default)]
pub struct ToolRegistry {
    tools: Vec<Tool>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the three documentation tools
    pub fn documentation(
        source: Arc<dyn DocumentationSource>,
        extractor: Arc<dyn ContentExtractor>,
        settings: ToolSettings,
    ) -> Self {
        let settings = Arc::new(settings);
        let mut registry = Self::new();

        registry.register(Tool {
            name: "search_documentation".to_string(),
            description: "Search AWS documentation using the official AWS Documentation Search API. \
                Returns ranked pages with their URL, title and a context excerpt."
                .to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "query": {
                        "type": "string",
                        "description": "Search terms, e.g. 'S3 bucket versioning'"
                    },
                    "max_results": {
                        "type": "integer",
                        "description": "Maximum number of results to return",
                        "default": DEFAULT_SEARCH_RESULTS,
                        "minimum": 1,
                        "maximum": 50
                    },
                    "start_index": {
                        "type": "integer",
                        "description": "Number of results to skip, for paging",
                        "default": 0,
                        "minimum": 0
                    }
                },
                "required": ["query"]
            }),
            handler: Arc::new(SearchDocumentationHandler {
                source: source.clone(),
                settings: settings.clone(),
            }),
        });

        registry.register(Tool {
            name: "read_documentation".to_string(),
            description: format!(
                "Fetch an AWS documentation page and convert it to Markdown. \
                 Only URLs on {} are accepted. Long pages are returned in chunks: \
                 when the output says the content was truncated, call again with the \
                 start_index it names.",
                settings.allowed_hosts.join(", ")
            ),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "url": {
                        "type": "string",
                        "description": "URL of the documentation page"
                    },
                    "max_length": {
                        "type": "integer",
                        "description": "Maximum number of characters to return",
                        "default": DEFAULT_MAX_LENGTH,
                        "minimum": 1,
                        "maximum": 999_999
                    },
                    "start_index": {
                        "type": "integer",
                        "description": "Character offset to start reading from",
                        "default": 0,
                        "minimum": 0
                    }
                },
                "required": ["url"]
            }),
            handler: Arc::new(ReadDocumentationHandler {
                source: source.clone(),
                extractor,
                settings: settings.clone(),
            }),
        });

        registry.register(Tool {
            name: "recommend".to_string(),
            description: "Get content recommendations for an AWS documentation page or a piece \
                of text: highly rated pages, common next steps, new pages and similar pages."
                .to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "content_or_url": {
                        "type": "string",
                        "description": "A documentation URL or a content excerpt"
                    },
                    "max_results": {
                        "type": "integer",
                        "description": "Maximum number of recommendations to return",
                        "default": DEFAULT_RECOMMENDATIONS,
                        "minimum": 1,
                        "maximum": 50
                    }
                },
                "required": ["content_or_url"]
            }),
            handler: Arc::new(RecommendHandler { source, settings }),
        });

        registry
    }

    /// Register a tool, replacing any tool with the same name
    pub fn register(&mut self, tool: Tool) {
        match self.tools.iter_mut().find(|t| t.name == tool.name) {
            Some(existing) => *existing = tool,
            None => self.tools.push(tool),
        }
    }

    /// Get all tools, in registration order
    pub fn all(&self) -> &[Tool] {
        &self.tools
    }

    /// Definitions for `tools/list`
    pub fn definitions(&self) -> Vec<Value> {
        self.tools.iter().map(Tool::definition).collect()
    }

    /// Get a tool by name
    pub fn get(&self, name: &str) -> Option<&Tool> {
        self.tools.iter().find(|t| t.name == name)
    }

    /// Validate arguments and run a tool by name
    pub async fn invoke(&self, name: &str, args: Value) -> Result<ToolCallResult, ToolError> {
        let tool = self
            .get(name)
            .ok_or_else(|| ToolError::UnknownTool(name.to_string()))?;

        schema::validate(&tool.input_schema, &args).map_err(ToolError::Validation)?;
        tool.handler.execute(args).await
    }
}
