use super::models::{OnceOptions, TransportResponse};
use super::transport::{HttpTransport, Transport};
use super::{blocking_runtime, DatabaseError};
use crate::core::parse_error_message;
use regex::Regex;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, LazyLock};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use url::Url;

static ROOT_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(https://[a-z0-9-]+\.firebaseio\.com)(?:/|$)").expect("valid root pattern")
});

/// Returns the `https://<name>.firebaseio.com` prefix of `url`, or `None` if `url` is not a
/// Realtime Database URL.
pub fn extract_root(url: &str) -> Option<&str> {
    ROOT_PATTERN
        .captures(url)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

/// A location in a Realtime Database.
///
/// References are immutable. [`child`](Self::child) and [`parent`](Self::parent) return new
/// references that share only the transport.
#[derive(Clone)]
pub struct Reference {
    url: String,
    root_end: usize,
    transport: Arc<dyn Transport>,
}

impl Reference {
    /// Creates a reference that reads over HTTPS with a default [`HttpTransport`].
    ///
    /// # Errors
    ///
    /// Returns [`DatabaseError::InvalidUrl`] if `url` is not a `https://<name>.firebaseio.com` URL.
    pub fn new(url: &str) -> Result<Self, DatabaseError> {
        Self::with_transport(url, Arc::new(HttpTransport::new()))
    }

    /// Creates a reference that reads through `transport`.
    ///
    /// Empty path segments are collapsed, so `https://x.firebaseio.com//a/` names `/a`.
    /// Segments are taken literally: `%2e` is a three-character key, not an escaped `.`.
    pub fn with_transport(url: &str, transport: Arc<dyn Transport>) -> Result<Self, DatabaseError> {
        let url = url.trim_end_matches('/');

        if url.contains(['?', '#']) {
            return Err(DatabaseError::InvalidUrl(url.to_string()));
        }

        let root = extract_root(url).ok_or_else(|| DatabaseError::InvalidUrl(url.to_string()))?;

        let mut normalized = root.to_string();
        for segment in url[root.len()..].split('/').filter(|segment| !segment.is_empty()) {
            if segment == "." || segment == ".." {
                return Err(DatabaseError::InvalidUrl(url.to_string()));
            }
            normalized.push('/');
            normalized.push_str(segment);
        }

        Ok(Self {
            root_end: root.len(),
            url: normalized,
            transport,
        })
    }

    /// Gets a reference for the location at the specified relative path.
    ///
    /// Both `/` and `.` separate segments, so `"a/b"` and `"a.b"` name the same location.
    /// Empty segments are ignored.
    pub fn child(&self, path: &str) -> Result<Reference, DatabaseError> {
        let path = path
            .split(['/', '.'])
            .filter(|segment| !segment.is_empty())
            .collect::<Vec<_>>()
            .join("/");

        if path.is_empty() {
            return Ok(self.clone());
        }

        Self::with_transport(&format!("{}/{}", self.url, path), self.transport.clone())
    }

    /// Gets the reference one level up, or `None` at the root of the database.
    pub fn parent(&self) -> Option<Reference> {
        let last_slash = self.path().rfind('/')?;

        Some(Self {
            url: self.url[..self.root_end + last_slash].to_string(),
            root_end: self.root_end,
            transport: self.transport.clone(),
        })
    }

    /// Gets the reference for the root of the database.
    pub fn root_reference(&self) -> Reference {
        Self {
            url: self.root().to_string(),
            root_end: self.root_end,
            transport: self.transport.clone(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// The scheme and host, e.g. `https://my-app.firebaseio.com`.
    pub fn root(&self) -> &str {
        &self.url[..self.root_end]
    }

    /// The path below the root, e.g. `/users/alice`. Empty at the root.
    pub fn path(&self) -> &str {
        &self.url[self.root_end..]
    }

    /// The last path segment, or `None` at the root.
    pub fn key(&self) -> Option<&str> {
        self.path().rsplit('/').next().filter(|key| !key.is_empty())
    }

    pub fn is_root(&self) -> bool {
        self.path().is_empty()
    }

    /// Builds the REST URL for this location, `<url>.json?<options>`.
    pub fn request_url(&self, options: Option<&OnceOptions>) -> Result<Url, DatabaseError> {
        let mut url = Url::parse(self.root())
            .map_err(|e| DatabaseError::InvalidUrl(format!("{}: {}", self.url, e)))?;

        let mut segments: Vec<&str> = self.path().split('/').filter(|s| !s.is_empty()).collect();
        let last = format!("{}.json", segments.pop().unwrap_or_default());

        url.path_segments_mut()
            .map_err(|_| DatabaseError::InvalidUrl(self.url.clone()))?
            .clear()
            .extend(segments)
            .push(&last);

        if let Some(options) = options.filter(|options| !options.is_empty()) {
            url.query_pairs_mut().extend_pairs(options.iter());
        }

        Ok(url)
    }

    /// Reads the data at this location once.
    ///
    /// Locations without data read as `Value::Null`.
    ///
    /// # Errors
    ///
    /// * [`DatabaseError::Http`] if the status is outside `200..400`; it carries the raw body.
    /// * [`DatabaseError::Parse`] if the body is not JSON.
    /// * [`DatabaseError::Request`] / [`DatabaseError::Middleware`] if the request fails.
    pub async fn once(&self, options: Option<OnceOptions>) -> Result<Value, DatabaseError> {
        let url = self.request_url(options.as_ref())?;
        debug!(%url, "reading once");

        let response = self.transport.get(url).await?;
        parse_response(response)
    }

    /// Reads the data at this location once and deserializes it into `T`.
    ///
    /// Returns `Ok(None)` if there is no data at this location.
    pub async fn once_as<T: DeserializeOwned>(
        &self,
        options: Option<OnceOptions>,
    ) -> Result<Option<T>, DatabaseError> {
        match self.once(options).await? {
            Value::Null => Ok(None),
            value => Ok(Some(serde_json::from_value(value)?)),
        }
    }

    /// Reads the data at this location once, blocking the current thread until it arrives.
    ///
    /// # Errors
    ///
    /// Same as [`once`](Self::once). Returns [`DatabaseError::Runtime`] when called from inside
    /// an async runtime; use [`once`](Self::once) there.
    pub fn once_blocking(&self, options: Option<OnceOptions>) -> Result<Value, DatabaseError> {
        if Handle::try_current().is_ok() {
            return Err(DatabaseError::Runtime(
                "once_blocking cannot be called from within an async runtime".to_string(),
            ));
        }

        blocking_runtime()?.block_on(self.once(options))
    }

    /// Reads the data at this location once in the background and passes the result to `callback`.
    ///
    /// The read is spawned on the current tokio runtime, or on a shared background runtime when
    /// there is none. The returned handle completes after `callback` has run.
    pub fn once_with<F>(
        &self,
        options: Option<OnceOptions>,
        callback: F,
    ) -> Result<JoinHandle<()>, DatabaseError>
    where
        F: FnOnce(Result<Value, DatabaseError>) + Send + 'static,
    {
        let reference = self.clone();
        let task = async move {
            let result = reference.once(options).await;
            callback(result);
        };

        let handle = match Handle::try_current() {
            Ok(handle) => handle.spawn(task),
            Err(_) => blocking_runtime()?.spawn(task),
        };

        Ok(handle)
    }
}

fn parse_response(response: TransportResponse) -> Result<Value, DatabaseError> {
    if !response.is_success() {
        let message = parse_error_message(&response.body);
        warn!(status = response.status, message = ?message, "read failed");
        return Err(DatabaseError::Http {
            status: response.status,
            body: response.body,
            message,
        });
    }

    serde_json::from_str(&response.body).map_err(|e| {
        warn!(error = %e, "response is not valid JSON");
        DatabaseError::Parse(e)
    })
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.url)
    }
}

impl fmt::Debug for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reference").field("url", &self.url).finish()
    }
}

impl PartialEq for Reference {
    fn eq(&self, other: &Self) -> bool {
        self.url == other.url
    }
}

impl Eq for Reference {}

impl FromStr for Reference {
    type Err = DatabaseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DB: &str = "https://my-app.firebaseio.com";

    #[test]
    fn test_extract_root() {
        assert_eq!(extract_root("https://my-app.firebaseio.com"), Some(DB));
        assert_eq!(extract_root("https://my-app.firebaseio.com/users/alice"), Some(DB));
        assert_eq!(extract_root("https://example.com"), None);
        assert_eq!(extract_root("http://my-app.firebaseio.com"), None);
        assert_eq!(extract_root("https://My-App.firebaseio.com"), None);
        assert_eq!(extract_root("https://my-app.firebaseio.com.evil.org"), None);
        assert_eq!(extract_root("see https://my-app.firebaseio.com"), None);
    }

    #[test]
    fn test_to_string_round_trips() {
        for url in [DB, "https://my-app.firebaseio.com/users", "https://a-1.firebaseio.com/x/y/z"] {
            assert_eq!(Reference::new(url).unwrap().to_string(), url);
        }
    }

    #[test]
    fn test_trailing_slash_is_stripped() {
        let reference = Reference::new("https://my-app.firebaseio.com/users/").unwrap();
        assert_eq!(reference.to_string(), "https://my-app.firebaseio.com/users");

        let root = Reference::new("https://my-app.firebaseio.com/").unwrap();
        assert_eq!(root.to_string(), DB);
        assert!(root.is_root());
    }

    #[test]
    fn test_invalid_url() {
        for url in [
            "https://example.com",
            "",
            "my-app.firebaseio.com",
            "https://my-app.firebaseio.com/users?print=pretty",
            "https://my-app.firebaseio.com/users#top",
        ] {
            let err = Reference::new(url).unwrap_err();
            assert!(matches!(err, DatabaseError::InvalidUrl(_)), "{}", url);
        }
    }

    #[test]
    fn test_from_str() {
        let reference: Reference = "https://my-app.firebaseio.com/users".parse().unwrap();
        assert_eq!(reference.path(), "/users");
        assert!("https://example.com".parse::<Reference>().is_err());
    }

    #[test]
    fn test_root_and_path() {
        let reference = Reference::new("https://my-app.firebaseio.com/users/alice").unwrap();
        assert_eq!(reference.root(), DB);
        assert_eq!(reference.path(), "/users/alice");
        assert_eq!(reference.key(), Some("alice"));
        assert!(!reference.is_root());

        let root = reference.root_reference();
        assert_eq!(root.to_string(), DB);
        assert_eq!(root.path(), "");
        assert_eq!(root.key(), None);
    }

    #[test]
    fn test_child_separators_are_equivalent() {
        let root = Reference::new(DB).unwrap();
        let slashes = root.child("a/b").unwrap();
        let dots = root.child("a.b").unwrap();
        assert_eq!(slashes.to_string(), "https://my-app.firebaseio.com/a/b");
        assert_eq!(slashes, dots);
        assert_eq!(root.child("a").unwrap().child("b").unwrap(), slashes);
    }

    #[test]
    fn test_child_ignores_empty_segments() {
        let users = Reference::new("https://my-app.firebaseio.com/users").unwrap();
        assert_eq!(
            users.child("/alice//profile/").unwrap().to_string(),
            "https://my-app.firebaseio.com/users/alice/profile"
        );
        assert_eq!(users.child("").unwrap(), users);
    }

    #[test]
    fn test_child_rejects_invalid_segments() {
        let users = Reference::new("https://my-app.firebaseio.com/users").unwrap();
        assert!(matches!(users.child("alice?x=1"), Err(DatabaseError::InvalidUrl(_))));
    }

    #[test]
    fn test_child_then_parent() {
        let users = Reference::new("https://my-app.firebaseio.com/users").unwrap();
        assert_eq!(users.child("alice").unwrap().parent().unwrap(), users);

        let root = Reference::new(DB).unwrap();
        assert_eq!(root.child("users").unwrap().parent().unwrap(), root);
    }

    #[test]
    fn test_empty_segments_are_collapsed() {
        let reference = Reference::new("https://my-app.firebaseio.com/a//b/").unwrap();
        assert_eq!(reference.to_string(), "https://my-app.firebaseio.com/a/b");

        let parent = reference.parent().unwrap();
        assert_eq!(parent, Reference::new("https://my-app.firebaseio.com/a").unwrap());
        assert_eq!(parent.key(), Some("a"));
        assert_eq!(
            parent.request_url(None).unwrap().as_str(),
            "https://my-app.firebaseio.com/a.json"
        );

        let top = Reference::new("https://my-app.firebaseio.com//a").unwrap();
        let root = top.parent().unwrap();
        assert!(root.is_root());
        assert_eq!(root, top.root_reference());
        assert!(root.parent().is_none());
    }

    #[test]
    fn test_dot_segments_are_rejected() {
        for url in [
            "https://my-app.firebaseio.com/a/../b",
            "https://my-app.firebaseio.com/./a",
        ] {
            assert!(matches!(Reference::new(url), Err(DatabaseError::InvalidUrl(_))), "{}", url);
        }
    }

    #[test]
    fn test_parent_of_root_is_none() {
        let root = Reference::new(DB).unwrap();
        assert!(root.parent().is_none());
    }

    #[test]
    fn test_parent_walks_to_root() {
        let mut reference = Reference::new("https://my-app.firebaseio.com/a/b/c").unwrap();
        let mut seen = vec![reference.to_string()];
        while let Some(parent) = reference.parent() {
            seen.push(parent.to_string());
            reference = parent;
        }
        assert_eq!(
            seen,
            vec![
                "https://my-app.firebaseio.com/a/b/c",
                "https://my-app.firebaseio.com/a/b",
                "https://my-app.firebaseio.com/a",
                "https://my-app.firebaseio.com",
            ]
        );
    }

    #[test]
    fn test_request_url() {
        let alice = Reference::new("https://my-app.firebaseio.com/users/alice").unwrap();
        assert_eq!(
            alice.request_url(None).unwrap().as_str(),
            "https://my-app.firebaseio.com/users/alice.json"
        );
        assert_eq!(
            alice.request_url(Some(&OnceOptions::new())).unwrap().as_str(),
            "https://my-app.firebaseio.com/users/alice.json"
        );

        let root = Reference::new(DB).unwrap();
        assert_eq!(
            root.request_url(None).unwrap().as_str(),
            "https://my-app.firebaseio.com/.json"
        );
    }

    #[test]
    fn test_request_url_encodes_query() {
        let users = Reference::new("https://my-app.firebaseio.com/users").unwrap();
        let options = OnceOptions::new()
            .param("orderBy", "\"$key\"")
            .param("equalTo", "Ada Lovelace & co")
            .shallow(true)
            .format_export();

        assert_eq!(
            users.request_url(Some(&options)).unwrap().as_str(),
            "https://my-app.firebaseio.com/users.json?orderBy=%22%24key%22&equalTo=Ada+Lovelace+%26+co&shallow=true&format=export"
        );
    }

    #[test]
    fn test_request_url_keeps_escaped_segments_literal() {
        let users = Reference::new("https://my-app.firebaseio.com/users").unwrap();
        let admin = users.child("%2e%2e").unwrap().child("admin").unwrap();
        assert_eq!(admin.to_string(), "https://my-app.firebaseio.com/users/%2e%2e/admin");
        assert_eq!(
            admin.request_url(None).unwrap().as_str(),
            "https://my-app.firebaseio.com/users/%252e%252e/admin.json"
        );

        let constructed = Reference::new("https://my-app.firebaseio.com/users/%2E%2E/admin").unwrap();
        assert!(constructed
            .request_url(None)
            .unwrap()
            .path()
            .starts_with("/users/"));
    }

    #[test]
    fn test_request_url_encodes_path() {
        let reference = Reference::new("https://my-app.firebaseio.com/users").unwrap();
        let child = reference.child("Ada Lovelace").unwrap();
        assert_eq!(
            child.request_url(None).unwrap().as_str(),
            "https://my-app.firebaseio.com/users/Ada%20Lovelace.json"
        );
    }
}
