//! Contact HTTP handlers.
//!
//! # Invariants
//! - Malformed input is rejected with 400 before any transaction opens.
//! - Storage work runs on the blocking pool; a panic there is resumed on
//!   the handler task so the dispatcher intercepts it.

use crate::dispatch::AppState;
use crate::error::{ApiError, ClassifiedError};
use crate::response::{json_response, ContactResponse};
use axum::body::Bytes;
use axum::extract::rejection::{BytesRejection, PathRejection};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::Response;
use contacts_core::NewContact;
use percent_encoding::percent_decode_str;
use serde::de::DeserializeOwned;

/// `POST /contacts`
pub async fn add_contact(
    State(state): State<AppState>,
    body: Result<Bytes, BytesRejection>,
) -> Result<Response, ApiError> {
    let contact = body
        .ok()
        .and_then(|bytes| decode_first::<NewContact>(&bytes))
        .ok_or_else(|| ClassifiedError::bad_request("Error decoding JSON"))?;

    let contacts = state.contacts.clone();
    let created = run_blocking(move || contacts.add_contact(contact)).await??;

    Ok(json_response(
        StatusCode::CREATED,
        &ContactResponse { contact: created },
    ))
}

/// `GET /contacts/:email`
pub async fn get_contact_by_email(
    State(state): State<AppState>,
    email: Result<Path<String>, PathRejection>,
) -> Result<Response, ApiError> {
    let invalid_email = || ClassifiedError::bad_request("Invalid email.");
    let Path(raw) = email.map_err(|_| invalid_email())?;
    let email = query_unescape(&raw).ok_or_else(invalid_email)?;

    let email = email.trim().to_string();
    if email.is_empty() {
        return Err(ClassifiedError::bad_request("Expected a single email.").into());
    }

    let contacts = state.contacts.clone();
    match run_blocking(move || contacts.get_contact_by_email(&email)).await?? {
        Some(contact) => Ok(json_response(StatusCode::OK, &ContactResponse { contact })),
        None => Err(ClassifiedError::not_found().into()),
    }
}

/// Decodes the first JSON value in `bytes`; anything after it is ignored.
fn decode_first<T: DeserializeOwned>(bytes: &[u8]) -> Option<T> {
    serde_json::Deserializer::from_slice(bytes)
        .into_iter::<T>()
        .next()?
        .ok()
}

async fn run_blocking<T, F>(job: F) -> Result<T, ApiError>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    match tokio::task::spawn_blocking(job).await {
        Ok(value) => Ok(value),
        Err(err) if err.is_panic() => std::panic::resume_unwind(err.into_panic()),
        Err(err) => Err(ApiError::internal(err)),
    }
}

/// Decodes a query-escaped value: `+` is a space and every `%` must start a
/// two-digit hex escape. Returns `None` for malformed escapes or non-UTF-8
/// results.
fn query_unescape(value: &str) -> Option<String> {
    let bytes = value.as_bytes();
    let mut index = 0;
    while index < bytes.len() {
        if bytes[index] == b'%' {
            let escape = bytes.get(index + 1..index + 3)?;
            if !escape.iter().all(u8::is_ascii_hexdigit) {
                return None;
            }
            index += 3;
        } else {
            index += 1;
        }
    }

    let spaced = value.replace('+', " ");
    percent_decode_str(&spaced)
        .decode_utf8()
        .ok()
        .map(|decoded| decoded.into_owned())
}
