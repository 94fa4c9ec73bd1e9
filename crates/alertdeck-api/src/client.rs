// Alert REST client
//
// Wraps `reqwest::Client` with the bearer credential, URL construction,
// and status/body handling for the two alert endpoints: the paginated
// listing (query) and the acknowledgment command.

use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use tracing::debug;
use url::Url;

use crate::error::Error;
use crate::model::{Alert, AlertPage, AlertQuery};
use crate::transport::TransportConfig;

/// HTTP client for the alert query and command endpoints.
///
/// The bearer token is attached as a default header at construction time;
/// one client instance serves one authenticated session.
pub struct AlertsClient {
    http: reqwest::Client,
    base_url: Url,
}

impl AlertsClient {
    /// Create a new client carrying the given bearer token.
    pub fn new(
        base_url: Url,
        token: &SecretString,
        transport: &TransportConfig,
    ) -> Result<Self, Error> {
        let mut headers = HeaderMap::new();
        let mut bearer = HeaderValue::from_str(&format!("Bearer {}", token.expose_secret()))
            .map_err(|_| Error::Authentication {
                message: "token contains characters not valid in a header".into(),
            })?;
        bearer.set_sensitive(true);
        headers.insert(AUTHORIZATION, bearer);

        let http = transport.build_client(headers)?;
        Ok(Self { http, base_url })
    }

    /// Create a client with a pre-built `reqwest::Client`.
    ///
    /// Used by tests and by embedders that manage their own client.
    pub fn with_client(http: reqwest::Client, base_url: Url) -> Self {
        Self { http, base_url }
    }

    /// The server base URL.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    // ── Endpoints ────────────────────────────────────────────────────

    /// `GET /alerts` with pagination and optional filters.
    ///
    /// Unset filters are omitted from the query string (see [`AlertQuery`]).
    pub async fn list_alerts(&self, query: &AlertQuery) -> Result<AlertPage, Error> {
        let url = self.api_url("alerts")?;
        debug!(%url, page = query.page, size = query.size, "GET /alerts");

        let resp = self
            .http
            .get(url)
            .query(query)
            .send()
            .await
            .map_err(Error::Transport)?;

        Self::parse_response(resp).await
    }

    /// `PUT /alerts/{id}/acknowledge`.
    ///
    /// Returns the server's updated alert representation on success.
    pub async fn acknowledge(&self, id: &str) -> Result<Alert, Error> {
        let url = self.api_url(&format!("alerts/{id}/acknowledge"))?;
        debug!(%url, id, "PUT acknowledge");

        let resp = self
            .http
            .put(url)
            .send()
            .await
            .map_err(Error::Transport)?;

        Self::parse_response(resp).await
    }

    // ── Helpers ──────────────────────────────────────────────────────

    fn api_url(&self, path: &str) -> Result<Url, Error> {
        self.base_url.join(path).map_err(Error::InvalidUrl)
    }

    /// Map the response status, then deserialize the JSON body.
    async fn parse_response<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T, Error> {
        let status = resp.status();

        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(Error::SessionExpired);
        }

        let body = resp.text().await.map_err(Error::Transport)?;

        if !status.is_success() {
            return Err(Error::Api {
                message: if body.is_empty() {
                    status.to_string()
                } else {
                    body
                },
                status: status.as_u16(),
            });
        }

        serde_json::from_str(&body).map_err(|e| Error::Deserialization {
            message: e.to_string(),
            body,
        })
    }
}
