//! Shared test environment: a scratch database, the API router, and a small
//! client that drives the router in-process.

#![allow(dead_code)]

use axum::body::{to_bytes, Body, Bytes};
use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderMap, Method, Request, StatusCode};
use axum::Router;
use contacts_core::{open_db, Contact, ContactService, Database};
use contacts_server::{router, AppState, ContactResponse, ErrorResponse};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;

const QUERY_ESCAPE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// Everything a test needs; dropping it removes the scratch database.
pub struct TestEnv {
    _dir: TempDir,
    pub db: Arc<Database>,
    pub router: Router,
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl TestResponse {
    pub fn text(&self) -> &str {
        std::str::from_utf8(&self.body).expect("response body should be UTF-8")
    }

    pub fn json<T: DeserializeOwned>(&self) -> T {
        serde_json::from_slice(&self.body).expect("response body should be JSON")
    }

    pub fn content_type(&self) -> Option<&str> {
        self.headers
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
    }
}

impl TestEnv {
    /// Opens a migrated scratch database and builds the router over it.
    pub fn setup() -> Self {
        let dir = tempfile::tempdir().expect("temp dir should be created");
        let db = Arc::new(open_db(dir.path().join("contacts.db")).expect("database should open"));
        let router = router(AppState::new(Arc::clone(&db)));
        Self {
            _dir: dir,
            db,
            router,
        }
    }

    pub async fn send(&self, method: Method, path: &str, body: Option<&str>) -> TestResponse {
        let mut builder = Request::builder().method(method).uri(path);
        let body = match body {
            Some(text) => {
                builder = builder.header(CONTENT_TYPE, "application/json");
                Body::from(text.to_string())
            }
            None => Body::empty(),
        };
        let request = builder.body(body).expect("request should build");

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("router is infallible");
        let status = response.status();
        let headers = response.headers().clone();
        let body = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("response body should be readable");

        TestResponse {
            status,
            headers,
            body,
        }
    }

    /// `POST /contacts`, decoding the contact or the error envelope.
    pub async fn add_contact(&self, email: &str, name: &str) -> Result<Contact, ErrorResponse> {
        let payload = serde_json::json!({ "email": email, "name": name }).to_string();
        let response = self
            .send(Method::POST, "/contacts", Some(payload.as_str()))
            .await;
        decode_contact(response)
    }

    /// `GET /contacts/{email}` with the email query-escaped.
    pub async fn get_contact_by_email(&self, email: &str) -> Result<Contact, ErrorResponse> {
        let path = format!("/contacts/{}", utf8_percent_encode(email, QUERY_ESCAPE));
        let response = self.send(Method::GET, &path, None).await;
        decode_contact(response)
    }

    /// Creates a contact through the API, failing the test if it is rejected.
    pub async fn setup_contact(&self, email: &str, name: &str) -> Contact {
        self.add_contact(email, name)
            .await
            .expect("contact should be created via API")
    }

    /// Reads a contact straight from the database, bypassing HTTP.
    pub fn read_contact_with_email(&self, email: &str) -> Option<Contact> {
        ContactService::new(Arc::clone(&self.db))
            .get_contact_by_email(email)
            .expect("database read should succeed")
    }
}

fn decode_contact(response: TestResponse) -> Result<Contact, ErrorResponse> {
    if response.status.as_u16() >= 400 {
        if response.content_type() == Some("application/json") {
            if let Ok(err) = serde_json::from_slice::<ErrorResponse>(&response.body) {
                return Err(err);
            }
        }
        return Err(ErrorResponse {
            status_code: response.status.as_u16(),
            message: response
                .status
                .canonical_reason()
                .unwrap_or_default()
                .to_string(),
        });
    }

    Ok(response.json::<ContactResponse>().contact)
}
