use super::models::TransportResponse;
use super::DatabaseError;
use crate::core::middleware::TracingMiddleware;
use reqwest::Client;
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use url::Url;

/// Issues the `GET` behind a `once` read.
///
/// Implementations only move bytes: status handling and JSON parsing happen in
/// [`Reference`](super::Reference).
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    async fn get(&self, url: Url) -> Result<TransportResponse, DatabaseError>;
}

/// [`Transport`] backed by `reqwest`.
#[derive(Clone)]
pub struct HttpTransport {
    client: ClientWithMiddleware,
    emulator: Option<Url>,
}

impl HttpTransport {
    /// Creates a transport with a default `reqwest::Client` and request logging.
    pub fn new() -> Self {
        let client = ClientBuilder::new(Client::new())
            .with(TracingMiddleware::new())
            .build();

        Self {
            client,
            emulator: None,
        }
    }

    /// Creates a transport around a caller-built client, e.g. one with extra middleware.
    pub fn new_with_client(client: ClientWithMiddleware) -> Self {
        Self {
            client,
            emulator: None,
        }
    }

    /// Creates a transport that sends every request to a local Realtime Database emulator.
    ///
    /// `https://<ns>.firebaseio.com/<path>.json` is sent as `<origin>/<path>.json?ns=<ns>`.
    ///
    /// # Arguments
    ///
    /// * `origin` - The emulator origin (e.g. "http://127.0.0.1:9000"). It must not carry a
    ///   path, query or fragment.
    pub fn emulator(origin: &str) -> Result<Self, DatabaseError> {
        let parsed = Url::parse(origin).map_err(|e| DatabaseError::InvalidUrl(format!("{}: {}", origin, e)))?;

        if parsed.cannot_be_a_base()
            || parsed.path() != "/"
            || parsed.query().is_some()
            || parsed.fragment().is_some()
        {
            return Err(DatabaseError::InvalidUrl(format!(
                "{}: emulator origin must not have a path",
                origin
            )));
        }

        Ok(Self {
            emulator: Some(parsed),
            ..Self::new()
        })
    }

    fn target(&self, url: Url) -> Result<Url, DatabaseError> {
        let Some(origin) = &self.emulator else {
            return Ok(url);
        };

        let namespace = url
            .host_str()
            .and_then(|host| host.split('.').next())
            .ok_or_else(|| DatabaseError::InvalidUrl(url.to_string()))?
            .to_string();

        let mut target = origin
            .join(url.path())
            .map_err(|e| DatabaseError::InvalidUrl(format!("{}: {}", url, e)))?;
        target.set_query(url.query());
        target.query_pairs_mut().append_pair("ns", &namespace);

        Ok(target)
    }
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl Transport for HttpTransport {
    async fn get(&self, url: Url) -> Result<TransportResponse, DatabaseError> {
        let url = self.target(url)?;

        let response = self.client.get(url).send().await?;
        let status = response.status().as_u16();
        let body = response.text().await?;

        Ok(TransportResponse { status, body })
    }
}
