use axum::{
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    extract::multipart::{MultipartError, MultipartRejection},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Serialize;

use crate::{media::MediaError, JsonResponse};

/// Every failure a handler can produce. Rendered as the error envelope by
/// [`IntoResponse`]; unexpected variants collapse to a generic 500.
#[derive(Debug, thiserror::Error)]
pub enum RequestError {
    #[error("{0}")]
    BadRequest(String),
    #[error("{message}")]
    Invalid {
        message: String,
        errors: Vec<FieldError>,
    },
    #[error("{0}")]
    NotAuthorized(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    ServerError(String),
    #[error("database error: {0}")]
    DatabaseError(#[from] sqlx::Error),
    #[error("media host error: {0}")]
    MediaError(#[from] MediaError),
    #[error("{0:#}")]
    Unexpected(#[from] anyhow::Error),
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: &str, message: impl Into<String>) -> Self {
        Self {
            field: field.to_owned(),
            message: message.into(),
        }
    }
}

/// Body of every failed response.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorEnvelope {
    pub status_code: u16,
    pub data: Option<()>,
    pub message: String,
    pub success: bool,
    pub errors: Vec<FieldError>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
}

/// Diagnostic detail attached to error responses, picked up by
/// [`crate::boundary::translate_errors`].
#[derive(Debug, Clone)]
pub struct ErrorTrace {
    pub envelope: ErrorEnvelope,
    pub detail: String,
    pub internal: bool,
}

const INTERNAL_MESSAGE: &str = "Something went wrong";

impl RequestError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }

    pub fn not_authorized(message: impl Into<String>) -> Self {
        Self::NotAuthorized(message.into())
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Forbidden(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    pub fn server_error(message: impl Into<String>) -> Self {
        Self::ServerError(message.into())
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            RequestError::BadRequest(_) | RequestError::Invalid { .. } => StatusCode::BAD_REQUEST,
            RequestError::NotAuthorized(_) => StatusCode::UNAUTHORIZED,
            RequestError::Forbidden(_) => StatusCode::FORBIDDEN,
            RequestError::NotFound(_) => StatusCode::NOT_FOUND,
            RequestError::ServerError(_)
            | RequestError::DatabaseError(_)
            | RequestError::MediaError(_)
            | RequestError::Unexpected(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message safe to show a client. Internals never leak through here.
    pub fn public_message(&self) -> String {
        match self {
            RequestError::DatabaseError(_)
            | RequestError::MediaError(_)
            | RequestError::Unexpected(_) => INTERNAL_MESSAGE.to_owned(),
            other => other.to_string(),
        }
    }

    pub fn envelope(&self) -> ErrorEnvelope {
        let errors = match self {
            RequestError::Invalid { errors, .. } => errors.clone(),
            _ => vec![],
        };
        ErrorEnvelope {
            status_code: self.status_code().as_u16(),
            data: None,
            message: self.public_message(),
            success: false,
            errors,
            stack: None,
        }
    }

    pub fn to_json_response(&self) -> JsonResponse<ErrorEnvelope> {
        (self.status_code(), Json(self.envelope()))
    }
}

impl IntoResponse for RequestError {
    fn into_response(self) -> axum::response::Response {
        let trace = ErrorTrace {
            envelope: self.envelope(),
            detail: format!("{self:?}"),
            internal: self.status_code().is_server_error(),
        };
        let mut response = self.to_json_response().into_response();
        response.extensions_mut().insert(trace);
        response
    }
}

/// SQLite reports unique violations only through the message text.
pub fn is_unique_violation(error: &RequestError) -> bool {
    match error {
        RequestError::DatabaseError(sqlx::Error::Database(e)) => {
            e.message().contains("UNIQUE constraint failed")
        }
        _ => false,
    }
}

impl From<JsonRejection> for RequestError {
    fn from(value: JsonRejection) -> Self {
        Self::BadRequest(value.body_text())
    }
}

impl From<QueryRejection> for RequestError {
    fn from(value: QueryRejection) -> Self {
        Self::BadRequest(value.body_text())
    }
}

impl From<PathRejection> for RequestError {
    fn from(value: PathRejection) -> Self {
        Self::BadRequest(value.body_text())
    }
}

impl From<MultipartRejection> for RequestError {
    fn from(value: MultipartRejection) -> Self {
        Self::BadRequest(value.body_text())
    }
}

impl From<MultipartError> for RequestError {
    fn from(value: MultipartError) -> Self {
        Self::BadRequest(format!("Malformed multipart body: {value}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_errors_keep_their_message() {
        let envelope = RequestError::forbidden("You are not the owner").envelope();
        assert_eq!(envelope.status_code, 403);
        assert_eq!(envelope.message, "You are not the owner");
        assert!(!envelope.success);
        assert!(envelope.errors.is_empty());
    }

    #[test]
    fn internal_errors_are_masked() {
        let error = RequestError::from(anyhow::anyhow!("connection refused on 10.0.0.4"));
        let envelope = error.envelope();
        assert_eq!(envelope.status_code, 500);
        assert_eq!(envelope.message, INTERNAL_MESSAGE);
        assert!(envelope.stack.is_none());
    }

    #[test]
    fn validation_errors_carry_field_list() {
        let error = RequestError::Invalid {
            message: "All fields are required".into(),
            errors: vec![FieldError::new("email", "email is required")],
        };
        let body = serde_json::to_value(error.envelope()).unwrap();
        assert_eq!(body["statusCode"], 400);
        assert_eq!(body["data"], serde_json::Value::Null);
        assert_eq!(body["errors"][0]["field"], "email");
        assert!(body.get("stack").is_none());
    }
}
