//! HTTP surface of the contacts service.
//!
//! Handlers run storage work through `contacts_core`'s scoped transactions;
//! the dispatcher turns every outcome, failures included, into a JSON
//! response.

pub mod dispatch;
pub mod error;
mod handlers;
pub mod response;

pub use dispatch::{dispatcher, method_not_allowed, not_found, router, AppState};
pub use error::{classify, ApiError, ClassifiedError};
pub use response::{error_response, json_response, ContactResponse, ErrorResponse};

use log::info;
use std::future::Future;
use tokio::net::TcpListener;

/// Serves the contacts API on `listener` until `shutdown` resolves.
///
/// In-flight requests are drained before returning.
pub async fn serve<F>(listener: TcpListener, state: AppState, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let addr = listener.local_addr()?;
    info!("event=server_start module=server status=ok addr={addr}");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await?;

    info!("event=server_stop module=server status=ok addr={addr}");
    Ok(())
}
