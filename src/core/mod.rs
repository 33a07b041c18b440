pub mod middleware;

use serde::Deserialize;

/// Error envelope returned by the Realtime Database REST API, e.g.
/// `{ "error": "Permission denied" }`.
#[derive(Debug, Deserialize)]
pub struct FirebaseErrorResponse {
    pub error: String,
}

/// Extracts the `error` message from a response body, if the body is a Firebase error envelope.
pub fn parse_error_message(body: &str) -> Option<String> {
    serde_json::from_str::<FirebaseErrorResponse>(body)
        .ok()
        .map(|resp| resp.error)
}
