//! Wire envelopes: request, notification, response.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use thiserror::Error;

pub const PROTOCOL_VERSION: &str = "1.0";

pub const PARSE_ERROR: i64 = -32700;
pub const INVALID_REQUEST: i64 = -32600;
pub const METHOD_NOT_FOUND: i64 = -32601;
pub const INVALID_PARAMS: i64 = -32602;
pub const INTERNAL_ERROR: i64 = -32603;

/// Error object carried by a failed response.
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
#[error("{message} (code {code})")]
pub struct RpcError {
    pub code: i64,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl RpcError {
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }

    pub fn parse_error(detail: impl Into<String>) -> Self {
        Self::new(PARSE_ERROR, "Parse error").with_data(Value::String(detail.into()))
    }

    pub fn invalid_request(detail: impl Into<String>) -> Self {
        Self::new(INVALID_REQUEST, "Invalid request").with_data(Value::String(detail.into()))
    }

    pub fn method_not_found(method: &str) -> Self {
        Self::new(METHOD_NOT_FOUND, format!("Method not found: {method}"))
    }

    pub fn invalid_params(detail: impl Into<String>) -> Self {
        Self::new(INVALID_PARAMS, format!("Invalid params: {}", detail.into()))
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(INTERNAL_ERROR, message)
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }
}

/// A call that expects exactly one response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Request {
    pub protocol_version: String,
    pub method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
    pub id: Value,
}

impl Request {
    pub fn new(id: impl Into<Value>, method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            protocol_version: PROTOCOL_VERSION.to_string(),
            method: method.into(),
            params,
            id: id.into(),
        }
    }

    pub fn to_text(&self) -> String {
        encode(self)
    }
}

/// A one-way message; never answered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub protocol_version: String,
    pub method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl Notification {
    pub fn new(method: impl Into<String>, params: Value) -> Self {
        Self {
            protocol_version: PROTOCOL_VERSION.to_string(),
            method: method.into(),
            params: Some(params),
        }
    }

    pub fn to_text(&self) -> String {
        encode(self)
    }
}

/// The answer to a request: exactly one of `result` or `error`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Response {
    pub protocol_version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
    pub id: Value,
}

impl Response {
    pub fn success(id: Value, result: Value) -> Self {
        Self {
            protocol_version: PROTOCOL_VERSION.to_string(),
            result: Some(result),
            error: None,
            id,
        }
    }

    pub fn failure(id: Value, error: RpcError) -> Self {
        Self {
            protocol_version: PROTOCOL_VERSION.to_string(),
            result: None,
            error: Some(error),
            id,
        }
    }

    pub fn to_text(&self) -> String {
        encode(self)
    }

    /// Decode a response frame. A `"result": null` stays a present result.
    pub fn decode(text: &str) -> Result<Self, serde_json::Error> {
        use serde::de::Error as _;

        let mut obj: Map<String, Value> = serde_json::from_str(text)?;
        let result = obj.remove("result");
        let error = match obj.remove("error") {
            Some(value) => Some(serde_json::from_value::<RpcError>(value)?),
            None => None,
        };
        if result.is_some() == error.is_some() {
            return Err(serde_json::Error::custom("response must carry exactly one of result or error"));
        }
        let protocol_version = match obj.remove("protocolVersion") {
            Some(Value::String(v)) => v,
            _ => return Err(serde_json::Error::custom("missing protocolVersion")),
        };
        Ok(Self {
            protocol_version,
            result,
            error,
            id: obj.remove("id").unwrap_or(Value::Null),
        })
    }

    pub fn into_result(self) -> Result<Value, RpcError> {
        match (self.result, self.error) {
            (_, Some(error)) => Err(error),
            (Some(result), None) => Ok(result),
            (None, None) => Ok(Value::Null),
        }
    }
}

fn encode<T: Serialize>(message: &T) -> String {
    serde_json::to_string(message).unwrap_or_else(|err| {
        json!({
            "protocolVersion": PROTOCOL_VERSION,
            "error": { "code": INTERNAL_ERROR, "message": format!("encode failed: {err}") },
            "id": Value::Null,
        })
        .to_string()
    })
}

/// Classification of one inbound frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    Request(Request),
    Notification(Notification),
    /// Response-shaped; a server never answers these.
    Response,
    /// Has an id but is not a usable request; answered with -32600.
    Invalid { id: Value, reason: String },
    /// No id and not a usable notification; dropped silently.
    MalformedNotification,
}

/// Parse a text frame. Only undecodable JSON is an error.
pub fn parse_inbound(text: &str) -> Result<Inbound, RpcError> {
    let value: Value = serde_json::from_str(text).map_err(|err| RpcError::parse_error(err.to_string()))?;
    let Value::Object(mut obj) = value else {
        return Ok(Inbound::Invalid {
            id: Value::Null,
            reason: "envelope must be a JSON object".to_string(),
        });
    };

    let id = match obj.remove("id") {
        None | Some(Value::Null) => None,
        Some(id @ (Value::String(_) | Value::Number(_))) => Some(id),
        Some(_) => {
            return Ok(Inbound::Invalid {
                id: Value::Null,
                reason: "id must be a string or number".to_string(),
            })
        }
    };
    let protocol_version = match obj.remove("protocolVersion") {
        Some(Value::String(version)) => version,
        _ => PROTOCOL_VERSION.to_string(),
    };
    let params = obj.remove("params");

    match (id, obj.remove("method")) {
        (Some(id), Some(Value::String(method))) => Ok(Inbound::Request(Request {
            protocol_version,
            method,
            params,
            id,
        })),
        (None, Some(Value::String(method))) => Ok(Inbound::Notification(Notification {
            protocol_version,
            method,
            params,
        })),
        (_, None) if obj.contains_key("result") || obj.contains_key("error") => Ok(Inbound::Response),
        (Some(id), _) => Ok(Inbound::Invalid {
            id,
            reason: "method must be a string".to_string(),
        }),
        (None, _) => Ok(Inbound::MalformedNotification),
    }
}
