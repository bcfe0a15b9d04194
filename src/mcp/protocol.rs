//! JSON-RPC 2.0 envelope types.
//!
//! Incoming messages are decoded from a [`serde_json::Value`] by hand rather
//! than through `Deserialize`, so that a malformed envelope still yields an
//! `InvalidRequest` error carrying whatever `id` could be recovered.
//!
//! # Message Types
//!
//! - **Request**: has an `id`, expects exactly one response
//! - **Notification**: no `id`, never answered
//! - **Response**: carries exactly one of `result` or `error`

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The only accepted value of the `jsonrpc` member.
pub const JSONRPC_VERSION: &str = "2.0";

/// Protocol version answered when the client asks for one we do not know.
pub const DEFAULT_PROTOCOL_VERSION: &str = "2024-11-05";

/// Protocol versions echoed back verbatim during `initialize`.
pub const SUPPORTED_PROTOCOL_VERSIONS: &[&str] = &["2024-11-05", "2025-03-26", "2025-06-18"];

/// A JSON-RPC 2.0 request ID, echoed verbatim in the reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequestId {
    /// Numeric request ID.
    Number(serde_json::Number),
    /// String request ID.
    String(String),
    /// Explicit `null`, also used when no ID could be recovered.
    Null,
}

impl RequestId {
    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => Some(Self::Number(n.clone())),
            Value::String(s) => Some(Self::String(s.clone())),
            Value::Null => Some(Self::Null),
            _ => None,
        }
    }
}

impl From<i64> for RequestId {
    fn from(n: i64) -> Self {
        Self::Number(n.into())
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::String(s) => write!(f, "{s}"),
            Self::Null => f.write_str("null"),
        }
    }
}

/// A decoded JSON-RPC message: a request, or a notification when `id` is absent.
#[derive(Debug, Clone, PartialEq)]
pub struct JsonRpcRequest {
    /// `None` for notifications.
    pub id: Option<RequestId>,

    /// The method to invoke.
    pub method: String,

    /// Parameters, either an object or an array.
    pub params: Option<Value>,
}

impl JsonRpcRequest {
    pub fn new(id: impl Into<RequestId>, method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            id: Some(id.into()),
            method: method.into(),
            params,
        }
    }

    pub fn is_notification(&self) -> bool {
        self.id.is_none()
    }

    /// Decode and validate one envelope.
    ///
    /// # Errors
    ///
    /// Returns an `InvalidRequest` response when the value is not a valid
    /// JSON-RPC 2.0 request or notification.
    pub fn from_value(value: Value) -> Result<Self, JsonRpcResponse> {
        let Value::Object(mut object) = value else {
            return Err(JsonRpcResponse::failure(
                RequestId::Null,
                JsonRpcError::invalid_request("request must be a JSON object"),
            ));
        };

        let id = match object.remove("id") {
            None => None,
            Some(raw) => match RequestId::from_value(&raw) {
                Some(id) => Some(id),
                None => {
                    return Err(JsonRpcResponse::failure(
                        RequestId::Null,
                        JsonRpcError::invalid_request("id must be a string, number or null"),
                    ))
                }
            },
        };
        let reply_id = id.clone().unwrap_or(RequestId::Null);

        if object.get("jsonrpc").and_then(Value::as_str) != Some(JSONRPC_VERSION) {
            return Err(JsonRpcResponse::failure(
                reply_id,
                JsonRpcError::invalid_request("jsonrpc field must be \"2.0\""),
            ));
        }

        let method = match object.remove("method") {
            Some(Value::String(method)) if !method.is_empty() => method,
            _ => {
                return Err(JsonRpcResponse::failure(
                    reply_id,
                    JsonRpcError::invalid_request("method must be a non-empty string"),
                ))
            }
        };

        let params = match object.remove("params") {
            None => None,
            Some(params @ (Value::Object(_) | Value::Array(_))) => Some(params),
            Some(_) => {
                return Err(JsonRpcResponse::failure(
                    reply_id,
                    JsonRpcError::invalid_request("params must be an object or an array"),
                ))
            }
        };

        Ok(Self { id, method, params })
    }
}

/// Standard JSON-RPC 2.0 error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    /// Invalid JSON was received by the server.
    ParseError,
    /// The JSON sent is not a valid Request object.
    InvalidRequest,
    /// The method does not exist or is not available.
    MethodNotFound,
    /// Invalid method parameters.
    InvalidParams,
    /// Internal JSON-RPC error.
    InternalError,
}

impl ErrorCode {
    #[must_use]
    pub const fn code(self) -> i32 {
        match self {
            Self::ParseError => -32700,
            Self::InvalidRequest => -32600,
            Self::MethodNotFound => -32601,
            Self::InvalidParams => -32602,
            Self::InternalError => -32603,
        }
    }
}

/// The `error` member of a failed response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcError {
    pub code: i32,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl JsonRpcError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code: code.code(),
            message: message.into(),
            data: None,
        }
    }

    #[must_use]
    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    pub fn parse_error(detail: impl std::fmt::Display) -> Self {
        Self::new(ErrorCode::ParseError, "Parse error").with_data(Value::String(detail.to_string()))
    }

    pub fn invalid_request(detail: &str) -> Self {
        Self::new(ErrorCode::InvalidRequest, format!("Invalid Request: {detail}"))
    }

    pub fn method_not_found(method: &str) -> Self {
        Self::new(ErrorCode::MethodNotFound, format!("Method not found: {method}"))
    }

    pub fn invalid_params(detail: impl std::fmt::Display) -> Self {
        Self::new(ErrorCode::InvalidParams, format!("Invalid params: {detail}"))
    }

    pub fn internal(detail: impl std::fmt::Display) -> Self {
        Self::new(ErrorCode::InternalError, "Internal error")
            .with_data(Value::String(detail.to_string()))
    }
}

/// Either side of a response; serialises as a `result` or an `error` member.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Result(Value),
    Error(JsonRpcError),
}

/// A JSON-RPC 2.0 response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    pub id: RequestId,
    #[serde(flatten)]
    pub outcome: Outcome,
}

impl JsonRpcResponse {
    #[must_use]
    pub fn success(id: RequestId, result: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            outcome: Outcome::Result(result),
        }
    }

    #[must_use]
    pub fn failure(id: RequestId, error: JsonRpcError) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            outcome: Outcome::Error(error),
        }
    }

    pub fn result(&self) -> Option<&Value> {
        match &self.outcome {
            Outcome::Result(value) => Some(value),
            Outcome::Error(_) => None,
        }
    }

    pub fn error(&self) -> Option<&JsonRpcError> {
        match &self.outcome {
            Outcome::Result(_) => None,
            Outcome::Error(error) => Some(error),
        }
    }

    /// Serialise as a single line of JSON.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|e| {
            format!(
                r#"{{"jsonrpc":"2.0","id":null,"error":{{"code":-32603,"message":"Internal error","data":{}}}}}"#,
                Value::String(e.to_string())
            )
        })
    }
}
