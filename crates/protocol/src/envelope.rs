use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;

use crate::constants::JSONRPC_VERSION;

/// Error object carried by a JSON-RPC response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcError {
    pub code: i64,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl RpcError {
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }
}

/// Errors produced while interpreting an envelope.
#[derive(Debug, thiserror::Error)]
pub enum EnvelopeError {
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("envelope is neither a request, a response nor a notification")]
    Malformed,
}

/// A single line on the engine transport.
///
/// `params` and `result` stay as raw JSON until a typed handler claims them,
/// so unknown notifications cost nothing to skip.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    pub jsonrpc: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Box<RawValue>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Box<RawValue>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
}

/// An envelope sorted by role.
#[derive(Debug)]
pub enum Incoming {
    /// Answer to one of our requests.
    Response {
        id: u64,
        outcome: Result<Box<RawValue>, RpcError>,
    },
    /// Fire-and-forget message from the peer.
    Notification {
        method: String,
        params: Option<Box<RawValue>>,
    },
    /// Peer-initiated request that expects an answer.
    Request {
        id: serde_json::Value,
        method: String,
        params: Option<Box<RawValue>>,
    },
}

impl Envelope {
    fn empty() -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.into(),
            id: None,
            method: None,
            params: None,
            result: None,
            error: None,
        }
    }

    /// Builds a request envelope.
    pub fn request<T: Serialize>(
        id: u64,
        method: impl Into<String>,
        params: &T,
    ) -> Result<Self, serde_json::Error> {
        Ok(Self {
            id: Some(id.into()),
            method: Some(method.into()),
            params: Some(to_raw(params)?),
            ..Self::empty()
        })
    }

    /// Builds a notification envelope.
    pub fn notification<T: Serialize>(
        method: impl Into<String>,
        params: &T,
    ) -> Result<Self, serde_json::Error> {
        Ok(Self {
            method: Some(method.into()),
            params: Some(to_raw(params)?),
            ..Self::empty()
        })
    }

    /// Builds a successful response envelope.
    pub fn response<T: Serialize>(
        id: serde_json::Value,
        result: &T,
    ) -> Result<Self, serde_json::Error> {
        Ok(Self {
            id: Some(id),
            result: Some(to_raw(result)?),
            ..Self::empty()
        })
    }

    /// Builds an error response envelope.
    pub fn error_response(id: serde_json::Value, error: RpcError) -> Self {
        Self {
            id: Some(id),
            error: Some(error),
            ..Self::empty()
        }
    }

    /// Parses one transport line.
    pub fn from_line(line: &str) -> Result<Self, EnvelopeError> {
        Ok(serde_json::from_str(line)?)
    }

    /// Serializes to a single transport line (no trailing newline).
    pub fn to_line(&self) -> Result<String, EnvelopeError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Sorts the envelope into request, response or notification.
    pub fn classify(self) -> Result<Incoming, EnvelopeError> {
        match (self.id, self.method) {
            (Some(id), Some(method)) => Ok(Incoming::Request {
                id,
                method,
                params: self.params,
            }),
            (None, Some(method)) => Ok(Incoming::Notification {
                method,
                params: self.params,
            }),
            (Some(id), None) => {
                let id = id.as_u64().ok_or(EnvelopeError::Malformed)?;
                let outcome = match (self.error, self.result) {
                    (Some(err), _) => Err(err),
                    (None, Some(result)) => Ok(result),
                    // `"result": null` deserializes to None; treat it as null.
                    (None, None) => Ok(to_raw(&serde_json::Value::Null)?),
                };
                Ok(Incoming::Response { id, outcome })
            }
            (None, None) => Err(EnvelopeError::Malformed),
        }
    }
}

/// Deserializes optional raw params, treating a missing payload as `null`.
pub fn parse_params<T: for<'de> Deserialize<'de>>(
    params: Option<&RawValue>,
) -> Result<T, serde_json::Error> {
    match params {
        Some(raw) => serde_json::from_str(raw.get()),
        None => serde_json::from_value(serde_json::Value::Null),
    }
}

fn to_raw<T: Serialize>(value: &T) -> Result<Box<RawValue>, serde_json::Error> {
    RawValue::from_string(serde_json::to_string(value)?)
}
