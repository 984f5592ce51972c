//! JSON wire envelope for the aria socket protocol.
//!
//! Every inbound line is one JSON object `{"action": <string>, "data": {..}}`;
//! every outbound line is one JSON object carrying at least `status` and
//! `action`. Parsing and response building live here so the server crate only
//! deals in typed payloads.

use serde::Deserialize;
use serde_json::{json, Map, Value};

pub mod action {
    //! Inbound action names.
    pub const GET_NONCE: &str = "get_nonce";
    pub const SIGNUP: &str = "signup_request";
    pub const LOGIN: &str = "login_request";
    pub const GET_SALT: &str = "get_salt";
    pub const DELETE_ACCOUNT: &str = "delete_account_request";
    pub const UPDATE_PREMIUM: &str = "update_premium_status";
    pub const GET_USER_STATUS: &str = "get_user_status";
    pub const ADD_CREDIT: &str = "add_credit_request";
    pub const CHANGE_PASSWORD: &str = "change_password_request";
    pub const EDIT_USERNAME: &str = "edit_username_request";
}

#[derive(Debug, thiserror::Error)]
pub enum ProtoError {
    #[error("{0}")]
    Json(#[from] serde_json::Error),
    #[error("missing field \"action\"")]
    MissingAction,
    #[error("missing field \"data\"")]
    MissingData,
}

/// A parsed request envelope. `data` stays untyped until the router knows
/// which payload struct the action expects.
#[derive(Debug, Clone)]
pub struct Request {
    pub action: String,
    pub data: Value,
}

impl Request {
    /// Parse one wire line into an envelope.
    pub fn parse(line: &str) -> Result<Request, ProtoError> {
        let value: Value = serde_json::from_str(line)?;
        let action = value
            .get("action")
            .and_then(Value::as_str)
            .ok_or(ProtoError::MissingAction)?
            .to_string();
        let data = value.get("data").cloned().ok_or(ProtoError::MissingData)?;
        if !data.is_object() {
            return Err(ProtoError::MissingData);
        }
        Ok(Request { action, data })
    }

    /// Deserialize `data` into the payload type the action expects.
    pub fn payload<T: serde::de::DeserializeOwned>(&self) -> Result<T, ProtoError> {
        Ok(serde_json::from_value(self.data.clone())?)
    }
}

/// Response action name for a request action: a trailing `_request` is
/// stripped before `_response` is appended, so `login_request` becomes
/// `login_response` while `get_nonce` becomes `get_nonce_response`.
pub fn response_action(request_action: &str) -> String {
    let base = request_action
        .strip_suffix("_request")
        .unwrap_or(request_action);
    format!("{base}_response")
}

/// Builder for outbound envelopes.
#[derive(Debug, Clone)]
pub struct Response {
    fields: Map<String, Value>,
}

impl Response {
    pub fn success(request_action: &str) -> Response {
        Self::with_status(request_action, "success")
    }

    pub fn error(request_action: &str, message: &str) -> Response {
        Self::with_status(request_action, "error").field("message", message)
    }

    /// The generic top-level failure envelope: unparsable JSON, missing
    /// envelope fields, or a payload that does not deserialize. The
    /// connection stays open; only this request is answered with an error.
    pub fn server_error(cause: &dyn std::fmt::Display) -> Response {
        Response {
            fields: Map::new(),
        }
        .field("status", "error")
        .field("message", format!("Server error: {cause}"))
        .field("action", "error")
    }

    /// Error envelope with a literal action name, bypassing the
    /// `_response` mapping. Used for actions the router does not know.
    pub fn literal_error(action: &str, message: &str) -> Response {
        Response {
            fields: Map::new(),
        }
        .field("status", "error")
        .field("message", message)
        .field("action", action)
    }

    fn with_status(request_action: &str, status: &str) -> Response {
        Response {
            fields: Map::new(),
        }
        .field("status", status)
        .field("action", response_action(request_action))
    }

    pub fn message(self, message: &str) -> Response {
        self.field("message", message)
    }

    /// Attach an arbitrary top-level field (`nonce`, `salt`, `data`, ...).
    pub fn field(mut self, key: &str, value: impl Into<Value>) -> Response {
        self.fields.insert(key.to_string(), value.into());
        self
    }

    /// Serialize to a single wire line (no trailing newline).
    pub fn to_line(&self) -> String {
        // A map of JSON values cannot fail to serialize.
        serde_json::to_string(&Value::Object(self.fields.clone()))
            .unwrap_or_else(|_| json!({"status": "error", "action": "error"}).to_string())
    }
}

// ---------------------------------------------------------------------------
// Typed per-action payloads
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct EmailData {
    pub email: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignupData {
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub password_salt: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginData {
    pub email: String,
    pub password_hash: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteAccountData {
    pub email: String,
    pub password_hash: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePremiumData {
    pub email: String,
    pub subscription_type: String,
}

#[derive(Debug, Deserialize)]
pub struct AddCreditData {
    pub email: String,
    pub amount: f64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordData {
    pub email: String,
    pub password_hash: String,
    pub new_password_hash: String,
    pub new_password_salt: String,
}

#[derive(Debug, Deserialize)]
pub struct EditUsernameData {
    pub email: String,
    pub username: String,
}
