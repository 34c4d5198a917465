//! Process entry point for the contacts API.
//!
//! # Responsibility
//! - Read configuration from flags and environment.
//! - Own the database handle lifecycle: open before serving, close after the
//!   server drains.

use clap::Parser;
use contacts_core::{
    core_version, default_log_level, init_logging, init_stderr_logging, open_db_with_options,
    DatabaseOptions,
};
use contacts_server::{serve, AppState};
use log::{error, info, warn};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;

#[derive(Parser, Debug)]
#[command(name = "contacts", version, about = "Contact-management HTTP API")]
struct Args {
    /// Path to the SQLite database file (created and migrated if missing)
    #[arg(long = "db", env = "CONTACTS_DB_URL")]
    database: PathBuf,

    /// Host to bind to
    #[arg(long, env = "CONTACTS_HOST", default_value = "127.0.0.1")]
    host: String,

    /// Port to listen on
    #[arg(short, long, env = "CONTACTS_PORT", default_value_t = 8080)]
    port: u16,

    /// trace|debug|info|warn|error; defaults to debug in debug builds, info otherwise
    #[arg(long, env = "CONTACTS_LOG_LEVEL")]
    log_level: Option<String>,

    /// Absolute directory for rolling log files; logs go to stderr when unset
    #[arg(long, env = "CONTACTS_LOG_DIR")]
    log_dir: Option<String>,

    /// How long a transaction waits on a locked database, in milliseconds
    #[arg(long, env = "CONTACTS_BUSY_TIMEOUT_MS", default_value_t = 5000)]
    busy_timeout_ms: u64,
}

impl Args {
    fn level(&self) -> &str {
        self.log_level
            .as_deref()
            .unwrap_or(default_log_level())
    }

    fn database_options(&self) -> DatabaseOptions {
        DatabaseOptions {
            busy_timeout: Duration::from_millis(self.busy_timeout_ms),
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("event=app_exit module=cli status=error error={err}");
            eprintln!("contacts: {err}");
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> Result<(), String> {
    match args.log_dir.as_deref() {
        Some(dir) => init_logging(args.level(), dir)?,
        None => init_stderr_logging(args.level())?,
    }
    info!(
        "event=cli_start module=cli status=ok version={}",
        core_version()
    );

    let db = open_db_with_options(&args.database, args.database_options()).map_err(|err| {
        format!(
            "unable to open database `{}`: {err}",
            args.database.display()
        )
    })?;
    let db = Arc::new(db);

    let listener = TcpListener::bind((args.host.as_str(), args.port))
        .await
        .map_err(|err| format!("unable to bind {}:{}: {err}", args.host, args.port))?;

    let served = serve(listener, AppState::new(Arc::clone(&db)), shutdown_signal()).await;
    let closed = db.close();

    served.map_err(|err| format!("server error: {err}"))?;
    closed.map_err(|err| format!("unable to close database: {err}"))
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!("event=shutdown_signal module=cli status=error error={err}");
        // Without a signal handler there is nothing to wait for; keep serving.
        std::future::pending::<()>().await;
    }
    info!("event=shutdown_signal module=cli status=ok");
}
