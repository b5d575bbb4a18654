use axum::{http::StatusCode, Json};
use serde::Serialize;

use crate::JsonResponse;

/// Body of every successful response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResponse<T> {
    pub status_code: u16,
    pub data: T,
    pub message: String,
    pub success: bool,
}

impl<T> ApiResponse<T> {
    pub fn new(status: StatusCode, data: T, message: impl Into<String>) -> Self {
        ApiResponse {
            status_code: status.as_u16(),
            data,
            message: message.into(),
            success: status.is_success(),
        }
    }

    pub fn ok(data: T, message: impl Into<String>) -> JsonResponse<Self> {
        Self::with_status(StatusCode::OK, data, message)
    }

    pub fn created(data: T, message: impl Into<String>) -> JsonResponse<Self> {
        Self::with_status(StatusCode::CREATED, data, message)
    }

    pub fn with_status(
        status: StatusCode,
        data: T,
        message: impl Into<String>,
    ) -> JsonResponse<Self> {
        (status, Json(Self::new(status, data, message)))
    }
}

/// `data` for responses that carry no payload, rendered as `{}`.
#[derive(Debug, Default, Serialize)]
pub struct Empty {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn created_envelope() {
        let (status, Json(body)) = ApiResponse::created("OK", "Made it");
        assert_eq!(status, StatusCode::CREATED);
        let value = serde_json::to_value(body).unwrap();
        assert_eq!(value["statusCode"], 201);
        assert_eq!(value["success"], true);
        assert_eq!(value["data"], "OK");
        assert_eq!(value["message"], "Made it");
    }

    #[test]
    fn empty_data_is_an_object() {
        let (_, Json(body)) = ApiResponse::ok(Empty::default(), "Deleted");
        let value = serde_json::to_value(body).unwrap();
        assert_eq!(value["data"], serde_json::json!({}));
    }
}
