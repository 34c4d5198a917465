//! Request dispatch: routing, failure interception and request logging.
//!
//! # Responsibility
//! - Route requests to contact handlers.
//! - Turn every handler outcome into a JSON response: returned values,
//!   returned `ApiError`s, and panics escaping the handler.
//! - Answer unmatched paths (404) and methods (405) with the same envelope.
//!
//! # Invariants
//! - Every request receives a response; no failure terminates the process.
//! - Only `ClassifiedError` payloads control a failure's status and message;
//!   everything else becomes a generic 500 whose detail is only logged.

use crate::error::{classify, ApiError, ClassifiedError};
use crate::handlers;
use crate::response::error_response;
use axum::extract::Request;
use axum::http::header::ALLOW;
use axum::http::HeaderValue;
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::Router;
use contacts_core::logging::{panic_payload_summary, sanitize_message};
use contacts_core::{ContactService, Database};
use log::{error, info, warn};
use std::any::Any;
use std::future::{ready, Ready};
use std::sync::Arc;
use std::time::Instant;
use tower_http::catch_panic::CatchPanicLayer;
use uuid::Uuid;

const REQUEST_ID_HEADER: &str = "x-request-id";
const MAX_DIAGNOSTIC_CHARS: usize = 512;

/// State shared by all handlers.
#[derive(Debug, Clone)]
pub struct AppState {
    pub contacts: ContactService,
}

impl AppState {
    pub fn new(db: Arc<Database>) -> Self {
        Self {
            contacts: ContactService::new(db),
        }
    }
}

/// Builds the contacts API router.
pub fn router(state: AppState) -> Router {
    let routes = Router::new()
        .route(
            "/contacts",
            post(handlers::add_contact).fallback(method_not_allowed("POST")),
        )
        .route(
            "/contacts/:email",
            get(handlers::get_contact_by_email).fallback(method_not_allowed("GET,HEAD")),
        )
        .with_state(state);

    dispatcher(routes)
}

/// Wraps `routes` with the dispatcher's failure handling.
///
/// Adds the JSON 404 fallback, panic interception and request logging.
/// Routes should use [`method_not_allowed`] for their method fallback.
pub fn dispatcher(routes: Router) -> Router {
    routes
        .fallback(not_found)
        .layer(CatchPanicLayer::custom(intercept_panic))
        .layer(middleware::from_fn(log_request))
}

/// Fallback for paths no route matches.
pub async fn not_found() -> Response {
    error_response(&ClassifiedError::not_found())
}

/// Method fallback for a route; `allow` is the route's `Allow` header value.
pub fn method_not_allowed(
    allow: &'static str,
) -> impl Fn() -> Ready<Response> + Clone + Send + Sync + 'static {
    move || {
        let mut response = error_response(&ClassifiedError::method_not_allowed());
        response
            .headers_mut()
            .insert(ALLOW, HeaderValue::from_static(allow));
        ready(response)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if let ApiError::Internal(diagnostic) = &self {
            error!(
                "event=request_failed module=server status=error error={}",
                sanitize_message(diagnostic, MAX_DIAGNOSTIC_CHARS)
            );
        }
        error_response(&classify(self))
    }
}

impl IntoResponse for ClassifiedError {
    fn into_response(self) -> Response {
        error_response(&self)
    }
}

fn intercept_panic(payload: Box<dyn Any + Send + 'static>) -> Response {
    let payload = match payload.downcast::<ClassifiedError>() {
        Ok(classified) => return error_response(&classified),
        Err(payload) => payload,
    };
    let failure = match payload.downcast::<ApiError>() {
        Ok(failure) => *failure,
        Err(payload) => ApiError::Internal(panic_payload_summary(payload.as_ref())),
    };

    if let ApiError::Internal(diagnostic) = &failure {
        error!("event=handler_panic module=server status=error payload={diagnostic}");
    }
    error_response(&classify(failure))
}

async fn log_request(request: Request, next: Next) -> Response {
    let request_id = Uuid::new_v4().to_string();
    let method = request.method().clone();
    let route = redact_path(request.uri().path());
    let started_at = Instant::now();

    let mut response = next.run(request).await;

    let status = response.status();
    let duration_ms = started_at.elapsed().as_millis();
    if status.is_server_error() {
        warn!(
            "event=http_request module=server status=error method={method} route={route} status_code={} duration_ms={duration_ms} request_id={request_id}",
            status.as_u16()
        );
    } else {
        info!(
            "event=http_request module=server status=ok method={method} route={route} status_code={} duration_ms={duration_ms} request_id={request_id}",
            status.as_u16()
        );
    }

    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }
    response
}

/// Keeps the first path segment and masks the rest, so emails in paths are
/// never logged.
fn redact_path(path: &str) -> String {
    let trimmed = path.trim_start_matches('/');
    match trimmed.split_once('/') {
        Some((head, _)) => format!("/{head}/*"),
        None => format!("/{trimmed}"),
    }
}
