//! Fleet backend HTTP client implementation

use std::time::Duration;

use bytes::Bytes;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, instrument, warn};
use url::Url;

use crate::error::{ClientError, Result};
use crate::session::Session;

/// Default request timeout
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
/// Default connection timeout
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Append `path` to `base`, keeping any path prefix already on the base URL.
///
/// `Url::join` with an absolute path would replace `/api` in
/// `https://host/api`, which the backend mounts its routes under.
pub(crate) fn endpoint_url(base: &Url, path: &str) -> Result<Url> {
    let joined = format!(
        "{}/{}",
        base.as_str().trim_end_matches('/'),
        path.trim_start_matches('/')
    );
    Url::parse(&joined).map_err(Into::into)
}

/// Encode a catalog identifier for use as a single path segment
pub(crate) fn encode_path_segment(id: &str) -> String {
    url::form_urlencoded::byte_serialize(id.as_bytes())
        .collect::<String>()
        .replace('+', "%20")
}

/// Fleet backend REST client
///
/// Every request carries `Authorization: Bearer <token>` from the owned
/// [`Session`]. A `401` answer invalidates the session and the request is
/// replayed once with a fresh token.
#[derive(Debug)]
pub struct ApiClient {
    client: Client,
    base_url: Url,
    session: Session,
}

impl ApiClient {
    /// Create a new client for `base_url` that logs in with `access_token`
    pub fn new(base_url: &str, access_token: &str) -> Result<Self> {
        Self::with_config(
            base_url,
            access_token,
            DEFAULT_TIMEOUT,
            DEFAULT_CONNECT_TIMEOUT,
        )
    }

    /// Create a new client with custom timeouts
    pub fn with_config(
        base_url: &str,
        access_token: &str,
        timeout: Duration,
        connect_timeout: Duration,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(connect_timeout)
            .build()?;

        let base_url = Url::parse(base_url)?;
        let session = Session::new(client.clone(), &base_url, access_token)?;

        Ok(Self {
            client,
            base_url,
            session,
        })
    }

    /// Get the base URL
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Get the authentication session
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Resolve a backend path against the base URL
    pub fn url(&self, path: &str) -> Result<Url> {
        endpoint_url(&self.base_url, path)
    }

    // =========================================================================
    // Raw requests
    // =========================================================================

    /// Authenticated GET, returning the raw response
    #[instrument(skip(self))]
    pub async fn get(&self, path: &str) -> Result<Response> {
        let url = self.url(path)?;
        debug!("GET {}", url);
        self.send_authorized(|client| client.get(url.clone())).await
    }

    /// Authenticated POST with a JSON body, returning the raw response
    #[instrument(skip(self, body))]
    pub async fn post<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<Response> {
        let url = self.url(path)?;
        debug!("POST {}", url);
        self.send_authorized(|client| client.post(url.clone()).json(body))
            .await
    }

    /// Authenticated POST with a form-encoded body
    #[instrument(skip(self, form))]
    pub async fn post_form<B: Serialize + ?Sized>(&self, path: &str, form: &B) -> Result<Response> {
        let url = self.url(path)?;
        debug!("POST (form) {}", url);
        self.send_authorized(|client| client.post(url.clone()).form(form))
            .await
    }

    /// Authenticated POST with a multipart body holding one file part
    #[instrument(skip(self, data))]
    pub async fn post_multipart(
        &self,
        path: &str,
        field: &str,
        file_name: &str,
        data: Bytes,
    ) -> Result<Response> {
        let url = self.url(path)?;
        debug!("POST (multipart, {} bytes) {}", data.len(), url);
        self.send_authorized(|client| {
            let part = reqwest::multipart::Part::stream(data.clone())
                .file_name(file_name.to_string());
            let form = reqwest::multipart::Form::new().part(field.to_string(), part);
            client.post(url.clone()).multipart(form)
        })
        .await
    }

    // =========================================================================
    // Typed requests
    // =========================================================================

    /// GET and decode a JSON body
    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let response = self.get(path).await?;
        self.handle_json(response).await
    }

    /// POST a JSON body and decode the JSON answer
    pub async fn post_json<B, T>(&self, path: &str, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let response = self.post(path, body).await?;
        self.handle_json(response).await
    }

    /// GET a binary body
    #[instrument(skip(self))]
    pub async fn get_bytes(&self, path: &str) -> Result<Bytes> {
        let response = self.get(path).await?;
        let status = response.status();
        if status.is_success() {
            Ok(response.bytes().await?)
        } else {
            Err(self.extract_error(response).await)
        }
    }

    /// Decode a response, mapping non-2xx statuses to typed errors.
    ///
    /// A `null` body counts as not found: lookups on the backend answer 200
    /// with `null` for some missing records.
    pub async fn handle_json<T: DeserializeOwned>(&self, response: Response) -> Result<T> {
        let status = response.status();
        let url = response.url().clone();

        if !status.is_success() {
            return Err(self.extract_error(response).await);
        }

        let body = response.bytes().await?;
        let value: serde_json::Value =
            serde_json::from_slice(&body).map_err(|e| ClientError::Decode(e.to_string()))?;
        if value.is_null() {
            return Err(ClientError::NotFound(url.path().to_string()));
        }
        serde_json::from_value(value).map_err(|e| ClientError::Decode(e.to_string()))
    }

    // =========================================================================
    // Helper Methods
    // =========================================================================

    async fn send_authorized<F>(&self, build: F) -> Result<Response>
    where
        F: Fn(&Client) -> RequestBuilder,
    {
        let token = self.session.ensure_token().await?;
        let response = build(&self.client).bearer_auth(&token).send().await?;

        if response.status() != StatusCode::UNAUTHORIZED {
            return Ok(response);
        }

        warn!("Backend rejected bearer token, logging in again");
        self.session.invalidate();
        let token = self.session.ensure_token().await?;
        Ok(build(&self.client).bearer_auth(&token).send().await?)
    }

    async fn extract_error(&self, response: Response) -> ClientError {
        let status = response.status();
        let path = response.url().path().to_string();

        let message = match response.text().await {
            Ok(text) if !text.is_empty() => text,
            _ => format!("HTTP {}", status),
        };

        match status {
            StatusCode::NOT_FOUND => ClientError::NotFound(path),
            _ => ClientError::server_error(status.as_u16(), message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_creation() {
        let client = ApiClient::new("http://localhost:3000", "token");
        assert!(client.is_ok());
    }

    #[test]
    fn test_invalid_url() {
        let client = ApiClient::new("not a url", "token");
        assert!(client.is_err());
    }

    #[test]
    fn test_endpoint_url_keeps_prefix() {
        let base = Url::parse("https://backend.example.com/api/").unwrap();
        let url = endpoint_url(&base, "/device/class").unwrap();
        assert_eq!(url.as_str(), "https://backend.example.com/api/device/class");
    }

    #[test]
    fn test_endpoint_url_without_prefix() {
        let base = Url::parse("http://localhost:3000").unwrap();
        let url = endpoint_url(&base, "/device/firmware").unwrap();
        assert_eq!(url.as_str(), "http://localhost:3000/device/firmware");
    }

    #[test]
    fn test_encode_path_segment() {
        assert_eq!(encode_path_segment("grow-v1"), "grow-v1");
        assert_eq!(encode_path_segment("a/b c"), "a%2Fb%20c");
    }
}
