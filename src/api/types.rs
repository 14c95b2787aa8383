use std::fmt;
use std::str::FromStr;

use axum::extract::rejection::JsonRejection;
use axum::Json;
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::debug;

use crate::error::ApiError;
use crate::prompts::PromptKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Reduce,
    Elaborate,
}

impl Action {
    pub fn as_str(self) -> &'static str {
        match self {
            Action::Reduce => "reduce",
            Action::Elaborate => "elaborate",
        }
    }

    pub fn prompt_kind(self) -> PromptKind {
        match self {
            Action::Reduce => PromptKind::Reduce,
            Action::Elaborate => PromptKind::Elaborate,
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Action {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "reduce" => Ok(Action::Reduce),
            "elaborate" => Ok(Action::Elaborate),
            _ => Err(ApiError::validation(
                "Invalid action. Use 'reduce' or 'elaborate'.",
            )),
        }
    }
}

/// Top-level fields of a JSON object body.
#[derive(Debug)]
pub struct BodyFields(Map<String, Value>);

impl BodyFields {
    pub fn from_payload(payload: Result<Json<Value>, JsonRejection>) -> Result<Self, ApiError> {
        let Json(value) = payload.map_err(|rejection| match rejection {
            JsonRejection::MissingJsonContentType(_) | JsonRejection::JsonSyntaxError(_) => {
                debug!(target = "api", reason = %rejection, "body is not JSON");
                ApiError::validation("Request must be JSON")
            }
            other => ApiError::Rejected {
                status: other.status(),
                message: other.body_text(),
            },
        })?;

        match value {
            Value::Object(map) => Ok(Self(map)),
            _ => Err(ApiError::validation("Request must be a JSON object")),
        }
    }

    /// Returns the listed fields that are absent, in the order given.
    pub fn missing<'a>(&self, required: &[&'a str]) -> Vec<&'a str> {
        required
            .iter()
            .copied()
            .filter(|field| !self.0.contains_key(*field))
            .collect()
    }

    pub fn string(&self, field: &str) -> Result<String, ApiError> {
        match self.0.get(field) {
            Some(Value::String(s)) => Ok(s.clone()),
            Some(_) => Err(ApiError::validation(format!(
                "Field '{field}' must be a string"
            ))),
            None => Err(ApiError::validation(format!("Missing '{field}' field"))),
        }
    }
}

/// Body of `/generate_post` and `/regenerate_post`.
#[derive(Debug)]
pub struct ContextRequest {
    pub context: String,
}

impl ContextRequest {
    pub fn from_fields(fields: &BodyFields) -> Result<Self, ApiError> {
        Ok(Self {
            context: fields.string("context")?,
        })
    }
}

/// Body of `/modify_post`.
#[derive(Debug)]
pub struct ModifyRequest {
    pub context: String,
    pub current_post: String,
    pub action: Action,
}

impl ModifyRequest {
    pub const REQUIRED: [&'static str; 3] = ["context", "current_post", "action"];

    pub fn from_fields(fields: &BodyFields) -> Result<Self, ApiError> {
        let missing = fields.missing(&Self::REQUIRED);
        if !missing.is_empty() {
            return Err(ApiError::validation(format!(
                "Missing fields: {}",
                missing.join(", ")
            )));
        }

        let context = fields.string("context")?;
        let current_post = fields.string("current_post")?;
        let action = fields.string("action")?.parse()?;

        Ok(Self {
            context,
            current_post,
            action,
        })
    }
}

#[derive(Debug, Serialize)]
pub struct PostResponse {
    pub post: String,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub status: &'static str,
    pub ollama_available: bool,
    pub model: String,
    pub endpoints: Vec<&'static str>,
}
