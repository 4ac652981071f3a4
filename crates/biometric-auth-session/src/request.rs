//! Immutable inputs describing who asked for authentication and what the
//! prompt should look like.

use crate::codes::Authenticators;
use serde::{Deserialize, Serialize};

/// Identity of the application that requested authentication.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallerIdentity {
    pub uid: i32,
    pub pid: i32,
    /// User the calling process runs as.
    pub user_id: i32,
    pub package_name: String,
}

/// Content and policy of the prompt, forwarded to the surface as-is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptInfo {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtitle: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub negative_button_text: Option<String>,
    pub authenticators_allowed: Authenticators,
}

impl PromptInfo {
    pub fn new(title: impl Into<String>, authenticators_allowed: Authenticators) -> Self {
        Self {
            title: title.into(),
            subtitle: None,
            description: None,
            negative_button_text: None,
            authenticators_allowed,
        }
    }

    /// Whether the caller permits falling back to PIN/pattern/password.
    pub fn is_credential_allowed(&self) -> bool {
        self.authenticators_allowed.allows_device_credential()
    }
}

/// Everything the session carries on behalf of the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRequest {
    /// Non-zero when the result unlocks a crypto operation.
    pub operation_id: i64,
    /// User being authenticated.
    pub user_id: i32,
    pub caller: CallerIdentity,
    pub prompt: PromptInfo,
}

impl SessionRequest {
    pub fn is_crypto(&self) -> bool {
        self.operation_id != 0
    }
}
