//! Request/response builders and classification of decoded frames.

use super::frame::{decode, encode, ServiceName, Status};
use crate::config::ProtocolConfig;
use crate::{Result, SoaError};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::warn;

/// A decoded inbound frame, classified by its service field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    /// `rgstr`: add or overwrite a directory entry.
    Register {
        name: ServiceName,
        host: String,
        port: u16,
        description: String,
    },
    /// `unrgs`: drop a directory entry.
    Unregister { name: ServiceName },
    /// Anything else: a domain call routed by `service`.
    Call {
        service: ServiceName,
        method: String,
        params: String,
    },
}

impl Request {
    /// The service field a response to this request should carry.
    pub fn response_context(&self) -> &str {
        match self {
            Request::Call { service, .. } => service.trimmed(),
            _ => ProtocolConfig::SERVER_CONTEXT,
        }
    }
}

/// Outcome of a call as seen by a client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum CallResponse {
    Success { result: String },
    Error { message: String },
}

impl CallResponse {
    pub fn success(result: impl Into<String>) -> Self {
        CallResponse::Success {
            result: result.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        CallResponse::Error {
            message: message.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, CallResponse::Success { .. })
    }

    /// The result on success, the message on error.
    pub fn text(&self) -> &str {
        match self {
            CallResponse::Success { result } => result,
            CallResponse::Error { message } => message,
        }
    }

    pub fn into_result(self) -> std::result::Result<String, String> {
        match self {
            CallResponse::Success { result } => Ok(result),
            CallResponse::Error { message } => Err(message),
        }
    }

    /// Frame this outcome as a response under `service`.
    pub fn to_frame(&self, service: &str) -> Result<String> {
        match self {
            CallResponse::Success { result } => create_response(service, true, result, ""),
            CallResponse::Error { message } => create_response(service, false, "", message),
        }
    }

    /// Like [`to_frame`](Self::to_frame), but an outcome too large to frame
    /// is replaced by a short `NK` explaining why.
    pub fn to_frame_lossy(&self, service: &str) -> String {
        self.to_frame(service).unwrap_or_else(|e| {
            warn!("Response for {} could not be framed: {}", service, e);
            create_response(service, false, "", &e.to_string()).unwrap_or_default()
        })
    }
}

impl fmt::Display for CallResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CallResponse::Success { result } => write!(f, "success: {}", result),
            CallResponse::Error { message } => write!(f, "error: {}", message),
        }
    }
}

/// Build a domain call frame: `DATA = method` or `method + " " + params`.
pub fn create_call_request(service: &str, method: &str, params: &str) -> Result<String> {
    if params.is_empty() {
        encode(service, method, None)
    } else {
        encode(service, &format!("{} {}", method, params), None)
    }
}

/// Build a response frame: `OK` + result on success, `NK` + error message otherwise.
pub fn create_response(service: &str, success: bool, result: &str, error_msg: &str) -> Result<String> {
    let data = if success { result } else { error_msg };
    encode(service, data, Some(Status::from_success(success)))
}

/// Build a registration control frame.
pub fn create_registration(name: &str, host: &str, port: u16, description: &str) -> Result<String> {
    encode(
        ProtocolConfig::REGISTER_SELECTOR,
        &format!("{}:{}:{}:{}", host, port, name, description),
        None,
    )
}

/// Build an unregistration control frame.
pub fn create_unregistration(name: &str) -> Result<String> {
    encode(
        ProtocolConfig::UNREGISTER_SELECTOR,
        &format!("{}{}", ProtocolConfig::UNREGISTER_PREFIX, name),
        None,
    )
}

/// Decode and classify an inbound frame.
pub fn parse_request(frame: &str) -> Result<Request> {
    let frame = decode(frame)?;

    match frame.service.trimmed() {
        ProtocolConfig::REGISTER_SELECTOR => parse_registration(&frame.data),
        ProtocolConfig::UNREGISTER_SELECTOR => {
            let name = frame
                .data
                .strip_prefix(ProtocolConfig::UNREGISTER_PREFIX)
                .ok_or_else(|| {
                    SoaError::invalid_control(format!(
                        "unregistration must start with {:?}",
                        ProtocolConfig::UNREGISTER_PREFIX
                    ))
                })?;
            if name.is_empty() {
                return Err(SoaError::invalid_control("missing service name"));
            }
            Ok(Request::Unregister {
                name: ServiceName::new(name),
            })
        }
        _ => {
            let (method, params) = frame
                .data
                .split_once(' ')
                .unwrap_or((frame.data.as_str(), ""));
            Ok(Request::Call {
                service: frame.service.clone(),
                method: method.to_string(),
                params: params.to_string(),
            })
        }
    }
}

/// `host:port:name[:description]`, description may itself contain colons.
fn parse_registration(data: &str) -> Result<Request> {
    let parts: Vec<&str> = data.splitn(4, ':').collect();
    if parts.len() < 3 {
        return Err(SoaError::invalid_control(format!(
            "registration {:?} is not host:port:name[:description]",
            data
        )));
    }

    let (host, port, name) = (parts[0], parts[1], parts[2]);
    if host.is_empty() || name.is_empty() {
        return Err(SoaError::invalid_control(
            "missing required fields: host, port, name",
        ));
    }
    let port = port
        .parse::<u16>()
        .map_err(|e| SoaError::invalid_control(format!("invalid port {:?}: {}", port, e)))?;
    if port == 0 {
        return Err(SoaError::invalid_control(
            "missing required fields: host, port, name",
        ));
    }

    Ok(Request::Register {
        name: ServiceName::new(name),
        host: host.to_string(),
        port,
        description: parts.get(3).copied().unwrap_or("").to_string(),
    })
}

/// Interpret a response frame. Never fails: an undecodable frame becomes an
/// error response describing why.
pub fn parse_response(frame: &str) -> CallResponse {
    match decode(frame) {
        Ok(frame) if frame.status == Some(Status::Ok) => CallResponse::success(frame.data),
        Ok(frame) => CallResponse::error(frame.data),
        Err(e) => CallResponse::error(format!("Error parsing response: {}", e)),
    }
}
