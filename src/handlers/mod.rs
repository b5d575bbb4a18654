use axum::{extract::DefaultBodyLimit, routing::get, Router};

use crate::{
    data_formats::ApiResponse,
    errors::{FieldError, RequestError},
    JsonResponse,
};

mod comments;
mod likes;
mod playlists;
mod subscriptions;
mod tweets;
mod users;
mod videos;

pub type ApiResult<T> = Result<JsonResponse<ApiResponse<T>>, RequestError>;

pub fn api_routes(max_upload_bytes: usize) -> Router {
    Router::new()
        .route("/healthcheck", get(healthcheck))
        .nest(
            "/users",
            users::routes().layer(DefaultBodyLimit::max(max_upload_bytes)),
        )
        .nest(
            "/videos",
            videos::routes().layer(DefaultBodyLimit::max(max_upload_bytes)),
        )
        .nest("/comments", comments::routes())
        .nest("/tweets", tweets::routes())
        .nest("/likes", likes::routes())
        .nest("/subscriptions", subscriptions::routes())
        .nest("/playlists", playlists::routes())
}

// ----------------- Helper Handlers -----------------
pub async fn healthcheck() -> ApiResult<&'static str> {
    Ok(ApiResponse::ok("OK", "Health check passed"))
}

// ----------------- Helper Functions -----------------

/// Parses a path or query id. Anything but a positive integer is rejected
/// before it can reach the database.
pub(crate) fn parse_id(raw: &str, what: &str) -> Result<i64, RequestError> {
    match raw.trim().parse::<i64>() {
        Ok(id) if id > 0 => Ok(id),
        _ => Err(RequestError::bad_request(format!("Invalid {what} ID"))),
    }
}

/// Trims a client string; blank counts as absent.
pub(crate) fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_owned())
        .filter(|value| !value.is_empty())
}

pub(crate) fn required(value: Option<String>, message: &str) -> Result<String, RequestError> {
    non_blank(value).ok_or_else(|| RequestError::bad_request(message))
}

/// A validation error listing each `(field, present)` pair that is absent.
pub(crate) fn missing_fields(message: &str, fields: &[(&str, bool)]) -> RequestError {
    let errors = fields
        .iter()
        .filter(|(_, present)| !present)
        .map(|(field, _)| FieldError::new(field, format!("{field} is required")))
        .collect();
    RequestError::Invalid {
        message: message.to_owned(),
        errors,
    }
}

pub(crate) fn ensure_owner(owner_id: i64, user_id: i64, message: &str) -> Result<(), RequestError> {
    if owner_id != user_id {
        return Err(RequestError::forbidden(message));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_must_be_positive_integers() {
        assert_eq!(parse_id("42", "video").unwrap(), 42);
        assert_eq!(parse_id(" 7 ", "video").unwrap(), 7);
        for bad in ["", "0", "-3", "abc", "65f1c0ffee", "1.5"] {
            match parse_id(bad, "video") {
                Err(RequestError::BadRequest(message)) => assert_eq!(message, "Invalid video ID"),
                other => panic!("expected rejection for {bad:?}, got {other:?}"),
            }
        }
    }

    #[test]
    fn blank_strings_are_absent() {
        assert_eq!(non_blank(Some("  hi ".into())), Some("hi".into()));
        assert_eq!(non_blank(Some("   ".into())), None);
        assert_eq!(non_blank(None), None);
    }

    #[test]
    fn missing_fields_are_listed() {
        let error = missing_fields(
            "All fields are required",
            &[("email", true), ("password", false), ("avatar", false)],
        );
        match error {
            RequestError::Invalid { message, errors } => {
                assert_eq!(message, "All fields are required");
                let fields: Vec<_> = errors.iter().map(|e| e.field.as_str()).collect();
                assert_eq!(fields, ["password", "avatar"]);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn only_owner_passes() {
        assert!(ensure_owner(1, 1, "nope").is_ok());
        assert!(matches!(
            ensure_owner(1, 2, "nope"),
            Err(RequestError::Forbidden(_))
        ));
    }
}
