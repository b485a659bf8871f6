//! VTube Studio public API messages

use crate::error::AvatarError;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio_tungstenite::tungstenite::Message;

pub const API_NAME: &str = "VTubeStudioPublicAPI";
pub const API_VERSION: &str = "1.0";

/// Error id the controller reports for an unknown parameter
pub const PARAMETER_NOT_FOUND_ERROR_ID: i64 = 453;

/// Outgoing request envelope
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Request {
    pub api_name: &'static str,
    pub api_version: &'static str,
    #[serde(rename = "requestID")]
    pub request_id: String,
    pub message_type: &'static str,
    pub data: Value,
}

impl Request {
    fn new(message_type: &'static str, data: Value) -> Self {
        Self {
            api_name: API_NAME,
            api_version: API_VERSION,
            request_id: uuid::Uuid::new_v4().to_string(),
            message_type,
            data,
        }
    }

    pub fn authentication_token(plugin_name: &str, plugin_developer: &str) -> Self {
        Self::new(
            "AuthenticationTokenRequest",
            json!({
                "pluginName": plugin_name,
                "pluginDeveloper": plugin_developer,
            }),
        )
    }

    pub fn authentication(plugin_name: &str, plugin_developer: &str, token: &str) -> Self {
        Self::new(
            "AuthenticationRequest",
            json!({
                "pluginName": plugin_name,
                "pluginDeveloper": plugin_developer,
                "authenticationToken": token,
            }),
        )
    }

    pub fn inject_parameter(parameter: &str, value: f32) -> Self {
        Self::new(
            "InjectParameterDataRequest",
            json!({
                "mode": "set",
                "parameterValues": [{"id": parameter, "value": value, "weight": 1.0}],
            }),
        )
    }

    /// Custom parameter in [0, 1] with default 0
    pub fn create_parameter(parameter: &str, explanation: &str) -> Self {
        Self::new(
            "ParameterCreationRequest",
            json!({
                "parameterName": parameter,
                "explanation": explanation,
                "min": 0,
                "max": 1,
                "defaultValue": 0,
            }),
        )
    }

    pub fn to_message(&self) -> Result<Message, AvatarError> {
        Ok(Message::Text(serde_json::to_string(self)?))
    }
}

/// Incoming response envelope
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Response {
    #[serde(default)]
    pub message_type: String,
    #[serde(rename = "requestID", default)]
    pub request_id: Option<String>,
    #[serde(default)]
    pub data: Value,
}

impl Response {
    pub fn parse(text: &str) -> Result<Self, AvatarError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn is_error(&self) -> bool {
        self.message_type == "APIError"
    }

    pub fn error_id(&self) -> Option<i64> {
        self.data.get("errorID").and_then(|v| v.as_i64())
    }

    pub fn error_message(&self) -> Option<&str> {
        self.data.get("message").and_then(|v| v.as_str())
    }

    pub fn authentication_token(&self) -> Option<&str> {
        self.data
            .get("authenticationToken")
            .and_then(|v| v.as_str())
            .filter(|t| !t.is_empty())
    }

    pub fn authenticated(&self) -> bool {
        self.data.get("authenticated").and_then(|v| v.as_bool()).unwrap_or(false)
    }

    pub fn reason(&self) -> Option<&str> {
        self.data.get("reason").and_then(|v| v.as_str())
    }

    /// The controller does not know the parameter we tried to set
    pub fn is_parameter_not_found(&self) -> bool {
        if !self.is_error() {
            return false;
        }
        if self.error_id() == Some(PARAMETER_NOT_FOUND_ERROR_ID) {
            return true;
        }
        self.error_message()
            .map(|m| {
                let lower = m.to_lowercase();
                m.contains("ParameterNotFound") || (lower.contains("parameter") && lower.contains("not found"))
            })
            .unwrap_or(false)
    }

    /// Human-readable summary of an error response
    pub fn describe_error(&self) -> String {
        match (self.error_id(), self.error_message()) {
            (Some(id), Some(msg)) => format!("{} (error {})", msg, id),
            (None, Some(msg)) => msg.to_string(),
            (Some(id), None) => format!("error {}", id),
            (None, None) => self.message_type.clone(),
        }
    }
}
