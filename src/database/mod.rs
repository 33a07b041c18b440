//! Firebase Realtime Database module.
//!
//! This module resolves a database URL into a [`Reference`] that can be navigated with
//! [`Reference::child`] and [`Reference::parent`], and reads the data stored at that
//! location with a single REST `GET`.
//!
//! # Reading data
//!
//! The same read is available in three shapes:
//!
//! * [`Reference::once`] returns a future.
//! * [`Reference::once_blocking`] blocks the calling thread until the response is parsed.
//! * [`Reference::once_with`] returns immediately and hands the result to a callback.
//!
//! # Examples
//!
//! ```rust,no_run
//! # use firebase_sync::database::{OnceOptions, Reference};
//! # async fn run() -> Result<(), firebase_sync::database::DatabaseError> {
//! let users = Reference::new("https://my-app.firebaseio.com/users")?;
//! let alice = users.child("alice")?;
//!
//! let value = alice.once(None).await?;
//! let keys = users.once(Some(OnceOptions::new().shallow(true))).await?;
//! # let _ = (value, keys);
//! # Ok(())
//! # }
//! ```

pub mod models;
pub mod reference;
pub mod transport;


pub use self::models::{OnceOptions, TransportResponse};
pub use self::reference::{extract_root, Reference};
pub use self::transport::{HttpTransport, Transport};

use std::sync::LazyLock;
use thiserror::Error;
use tokio::runtime::{Builder, Runtime};

/// Broad category of a [`DatabaseError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The URL is not a Firebase Realtime Database URL.
    InvalidUrl,
    /// The response body was not valid JSON, or did not match the requested type.
    Parse,
    /// The server answered with a status outside `200..400`.
    Http,
    /// The request could not be sent or the response could not be read.
    Transport,
}

/// Errors that can occur during Realtime Database operations.
#[derive(Error, Debug)]
pub enum DatabaseError {
    /// The URL does not point at a `https://<name>.firebaseio.com` database.
    #[error("Invalid firebase url: {0}")]
    InvalidUrl(String),
    /// Wrapper for `serde_json::Error`.
    #[error("Parse error: {0}")]
    Parse(#[from] serde_json::Error),
    /// The server answered with a non-success status. `body` is the raw response text.
    #[error("HTTP error {status}: {}", http_detail(.message, .body))]
    Http {
        status: u16,
        body: String,
        message: Option<String>,
    },
    /// Wrapper for `reqwest::Error`.
    #[error("HTTP Request failed: {0}")]
    Request(#[from] reqwest::Error),
    /// Wrapper for `reqwest_middleware::Error`.
    #[error("Middleware error: {0}")]
    Middleware(#[from] reqwest_middleware::Error),
    /// The blocking runtime could not be used.
    #[error("Runtime error: {0}")]
    Runtime(String),
}

impl DatabaseError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            DatabaseError::InvalidUrl(_) => ErrorKind::InvalidUrl,
            DatabaseError::Parse(_) => ErrorKind::Parse,
            DatabaseError::Http { .. } => ErrorKind::Http,
            DatabaseError::Request(_) | DatabaseError::Middleware(_) | DatabaseError::Runtime(_) => {
                ErrorKind::Transport
            }
        }
    }
}

fn http_detail<'a>(message: &'a Option<String>, body: &'a str) -> &'a str {
    message.as_deref().unwrap_or(body)
}

// Shared by every blocking and out-of-runtime callback read, so the HTTP client's
// connection pool always lives on the same runtime.
static BLOCKING_RUNTIME: LazyLock<Result<Runtime, String>> = LazyLock::new(|| {
    Builder::new_multi_thread()
        .worker_threads(1)
        .thread_name("firebase-sync-blocking")
        .enable_all()
        .build()
        .map_err(|e| e.to_string())
});

pub(crate) fn blocking_runtime() -> Result<&'static Runtime, DatabaseError> {
    BLOCKING_RUNTIME
        .as_ref()
        .map_err(|e| DatabaseError::Runtime(format!("failed to build runtime: {}", e)))
}
