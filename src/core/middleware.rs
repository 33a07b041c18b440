use http::Extensions;
use reqwest::{Request, Response};
use reqwest_middleware::{Middleware, Next};
use tracing::{debug, warn};

/// Logs every outgoing request and the status it came back with.
#[derive(Debug, Clone, Default)]
pub struct TracingMiddleware;

impl TracingMiddleware {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait::async_trait]
impl Middleware for TracingMiddleware {
    async fn handle(
        &self,
        req: Request,
        extensions: &mut Extensions,
        next: Next<'_>,
    ) -> reqwest_middleware::Result<Response> {
        let method = req.method().clone();
        let url = req.url().clone();
        debug!(%method, %url, "sending request");

        let result = next.run(req, extensions).await;

        match &result {
            Ok(response) => debug!(%method, %url, status = response.status().as_u16(), "received response"),
            Err(e) => warn!(%method, %url, error = %e, "request failed"),
        }

        result
    }
}
