//! JSON response envelopes.
//!
//! Every body is a single JSON document followed by a newline, served as
//! `application/json`. `<`, `>`, `&`, U+2028 and U+2029 are written as
//! `\u` escapes so bodies can be embedded in HTML safely.

use crate::error::ClassifiedError;
use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use contacts_core::Contact;
use log::error;
use serde::{Deserialize, Serialize};

const JSON_CONTENT_TYPE: &str = "application/json";
const INTERNAL_ERROR_BODY: &str = "{\"status_code\":500,\"message\":\"Internal Server Error\"}\n";

/// Error envelope: `{"status_code": u16, "message": string}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub status_code: u16,
    pub message: String,
}

impl From<&ClassifiedError> for ErrorResponse {
    fn from(value: &ClassifiedError) -> Self {
        Self {
            status_code: value.status().as_u16(),
            message: value.message().to_string(),
        }
    }
}

/// Single-contact envelope: `{"contact": {...}}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactResponse {
    pub contact: Contact,
}

/// Serializes `body` with `status`.
///
/// Serialization failure degrades to the fixed 500 envelope.
pub fn json_response<T: Serialize>(status: StatusCode, body: &T) -> Response {
    match encode_json(body) {
        Ok(bytes) => with_json_content_type(status, bytes),
        Err(err) => {
            error!("event=response_encode module=server status=error error={err}");
            with_json_content_type(
                StatusCode::INTERNAL_SERVER_ERROR,
                INTERNAL_ERROR_BODY.as_bytes().to_vec(),
            )
        }
    }
}

/// Renders a classified error as its envelope.
pub fn error_response(err: &ClassifiedError) -> Response {
    json_response(err.status(), &ErrorResponse::from(err))
}

fn with_json_content_type(status: StatusCode, bytes: Vec<u8>) -> Response {
    (
        status,
        [(CONTENT_TYPE, HeaderValue::from_static(JSON_CONTENT_TYPE))],
        bytes,
    )
        .into_response()
}

fn encode_json<T: Serialize>(body: &T) -> serde_json::Result<Vec<u8>> {
    let raw = serde_json::to_string(body)?;
    let mut escaped = String::with_capacity(raw.len() + 1);
    // These characters only ever occur inside JSON strings, so escaping them
    // in place keeps the document valid.
    for ch in raw.chars() {
        match ch {
            '<' => escaped.push_str("\\u003c"),
            '>' => escaped.push_str("\\u003e"),
            '&' => escaped.push_str("\\u0026"),
            '\u{2028}' => escaped.push_str("\\u2028"),
            '\u{2029}' => escaped.push_str("\\u2029"),
            other => escaped.push(other),
        }
    }
    escaped.push('\n');
    Ok(escaped.into_bytes())
}

#[cfg(test)]
mod tests {
    use super::{encode_json, ContactResponse, ErrorResponse, INTERNAL_ERROR_BODY};
    use crate::error::ClassifiedError;
    use contacts_core::Contact;

    #[test]
    fn error_envelope_bytes_are_stable() {
        let body = ErrorResponse::from(&ClassifiedError::not_found());
        let bytes = encode_json(&body).unwrap();
        assert_eq!(
            String::from_utf8(bytes).unwrap(),
            "{\"status_code\":404,\"message\":\"Not Found\"}\n"
        );

        let internal = encode_json(&ErrorResponse::from(&ClassifiedError::internal())).unwrap();
        assert_eq!(internal, INTERNAL_ERROR_BODY.as_bytes());
    }

    #[test]
    fn contact_envelope_bytes_are_stable() {
        let body = ContactResponse {
            contact: Contact {
                id: 1,
                email: "alice@example.xyz".to_string(),
                name: "Alice Zulu".to_string(),
            },
        };

        let bytes = encode_json(&body).unwrap();
        assert_eq!(
            String::from_utf8(bytes).unwrap(),
            "{\"contact\":{\"id\":1,\"email\":\"alice@example.xyz\",\"name\":\"Alice Zulu\"}}\n"
        );
    }

    #[test]
    fn html_significant_characters_are_escaped() {
        let body = ErrorResponse {
            status_code: 400,
            message: "<b>Tom & Jerry</b>\u{2028}".to_string(),
        };

        let text = String::from_utf8(encode_json(&body).unwrap()).unwrap();
        assert_eq!(
            text,
            "{\"status_code\":400,\"message\":\"\\u003cb\\u003eTom \\u0026 Jerry\\u003c/b\\u003e\\u2028\"}\n"
        );
        let decoded: ErrorResponse = serde_json::from_str(&text).unwrap();
        assert_eq!(decoded, body);
    }
}
