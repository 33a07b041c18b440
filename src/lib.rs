//! Read-only Firebase Realtime Database client over the REST API.
//!
//! A [`Reference`] points at a location in the database tree. It can be navigated with
//! [`Reference::child`] and [`Reference::parent`] and read once, either blocking, as a future,
//! or with a completion callback.
//!
//! ```rust,no_run
//! use firebase_sync::Reference;
//!
//! # fn run() -> Result<(), firebase_sync::DatabaseError> {
//! let scores = Reference::new("https://my-app.firebaseio.com/scores")?;
//! let value = scores.child("alice")?.once_blocking(None)?;
//! println!("{}", value);
//! # Ok(())
//! # }
//! ```

pub mod core;
pub mod database;

pub use database::{DatabaseError, ErrorKind, HttpTransport, OnceOptions, Reference, Transport};
