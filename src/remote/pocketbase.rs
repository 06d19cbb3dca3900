use super::realtime::{spawn_realtime, RealtimeTarget};
use super::{ChangeCallback, FeedClient, FeedPage, PageQuery, RemoteError, Subscription};
use crate::config::Config;
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use url::Url;

const MAX_RETRIES: u32 = 2;
const MAX_RESPONSE_SIZE: usize = 5 * 1024 * 1024; // 5MB
const MAX_ERROR_BODY_SIZE: usize = 64 * 1024;
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);
const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(500);

/// Error body returned by PocketBase on non-2xx responses.
#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    message: String,
}

/// [`FeedClient`] backed by a PocketBase collection.
///
/// Queries hit `/api/collections/{collection}/records`; change notifications
/// come from the `/api/realtime` event stream.
pub struct PocketBaseClient {
    http: reqwest::Client,
    base_url: Url,
    collection: String,
    auth_token: Option<SecretString>,
    request_timeout: Duration,
    retry_delay: Duration,
}

impl std::fmt::Debug for PocketBaseClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PocketBaseClient")
            .field("base_url", &self.base_url.as_str())
            .field("collection", &self.collection)
            .field("auth_token", &self.auth_token.as_ref().map(|_| "[REDACTED]"))
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

impl PocketBaseClient {
    /// Create a client for `collection` on the server at `base_url`.
    ///
    /// # Errors
    ///
    /// - [`RemoteError::InvalidBaseUrl`] if `base_url` does not parse
    /// - [`RemoteError::InsecureBaseUrl`] for plain HTTP to anything but localhost
    /// - [`RemoteError::InvalidCollection`] if the name is not a plain identifier
    pub fn new(base_url: &str, collection: &str) -> Result<Self, RemoteError> {
        let base_url = check_base_url(base_url)?;
        check_collection(collection)?;

        let http = reqwest::Client::builder()
            .pool_max_idle_per_host(4)
            .pool_idle_timeout(Duration::from_secs(30))
            .tcp_keepalive(Duration::from_secs(60))
            .build()?;

        Ok(Self {
            http,
            base_url,
            collection: collection.to_string(),
            auth_token: None,
            request_timeout: DEFAULT_TIMEOUT,
            retry_delay: DEFAULT_RETRY_DELAY,
        })
    }

    /// Build a client from the loaded configuration.
    pub fn from_config(config: &Config) -> Result<Self, RemoteError> {
        Ok(Self::new(&config.base_url, &config.collection)?
            .with_auth_token(
                config
                    .auth_token
                    .as_ref()
                    .map(|t| SecretString::from(t.expose_secret())),
            )
            .with_request_timeout(Duration::from_secs(config.request_timeout_secs)))
    }

    pub fn with_auth_token(mut self, token: Option<SecretString>) -> Self {
        self.auth_token = token;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Base delay for 429/5xx backoff (doubles per attempt).
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url.as_str().trim_end_matches('/'), path)
    }

    fn records_url(&self) -> String {
        self.endpoint(&format!("/api/collections/{}/records", self.collection))
    }

    fn auth_headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        if let Some(token) = &self.auth_token {
            match HeaderValue::from_str(token.expose_secret()) {
                Ok(mut value) => {
                    value.set_sensitive(true);
                    headers.insert(AUTHORIZATION, value);
                }
                Err(_) => tracing::warn!("Auth token contains invalid header characters, ignoring"),
            }
        }
        headers
    }

    async fn send_query(&self, query: &PageQuery) -> Result<reqwest::Response, RemoteError> {
        let mut params: Vec<(&str, String)> = vec![
            ("page", query.page.to_string()),
            ("perPage", query.page_size.to_string()),
            ("sort", query.sort.clone()),
        ];
        if let Some(filter) = category_filter(&query.category) {
            params.push(("filter", filter));
        }

        let request = self
            .http
            .get(self.records_url())
            .headers(self.auth_headers())
            .query(&params);

        tokio::time::timeout(self.request_timeout, request.send())
            .await
            .map_err(|_| RemoteError::Timeout(self.request_timeout.as_secs()))?
            .map_err(RemoteError::Network)
    }
}

#[async_trait]
impl FeedClient for PocketBaseClient {
    async fn query(&self, query: &PageQuery) -> Result<FeedPage, RemoteError> {
        let mut retry_count = 0;

        let response = loop {
            let response = self.send_query(query).await?;
            let status = response.status();

            if status == reqwest::StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
                if retry_count >= MAX_RETRIES {
                    return Err(api_error(response).await);
                }
                let delay = self.retry_delay * 2u32.pow(retry_count);
                tracing::warn!(
                    status = %status,
                    page = query.page,
                    retry = retry_count + 1,
                    delay_ms = delay.as_millis() as u64,
                    "Transient server error, retrying after delay"
                );
                tokio::time::sleep(delay).await;
                retry_count += 1;
                continue;
            }

            if !status.is_success() {
                return Err(api_error(response).await);
            }

            break response;
        };

        let bytes = read_limited_bytes(response, MAX_RESPONSE_SIZE).await?;
        let page: FeedPage =
            serde_json::from_slice(&bytes).map_err(|e| RemoteError::Decode(e.to_string()))?;

        tracing::debug!(
            category = %query.category,
            page = page.page,
            total_pages = page.total_pages,
            items = page.items.len(),
            "Fetched page"
        );
        Ok(page)
    }

    fn subscribe(&self, on_change: ChangeCallback) -> Result<Subscription, RemoteError> {
        let cancel = CancellationToken::new();
        let target = RealtimeTarget {
            http: self.http.clone(),
            url: self.endpoint("/api/realtime"),
            topic: format!("{}/*", self.collection),
            collection: self.collection.clone(),
            headers: self.auth_headers(),
        };

        let handle = spawn_realtime(target, on_change, cancel.clone());
        tracing::info!(collection = %self.collection, "Realtime subscription started");

        Ok(Subscription::new(move || {
            cancel.cancel();
            handle.abort();
            tracing::info!("Realtime subscription released");
        }))
    }
}

/// Build the PocketBase filter for a category; empty means no filter.
fn category_filter(category: &str) -> Option<String> {
    if category.is_empty() {
        return None;
    }
    let escaped = category.replace('\\', "\\\\").replace('"', "\\\"");
    Some(format!("category = \"{}\"", escaped))
}

/// HTTPS is required except for localhost, which keeps test servers usable.
fn check_base_url(base: &str) -> Result<Url, RemoteError> {
    let url = Url::parse(base).map_err(|e| RemoteError::InvalidBaseUrl(e.to_string()))?;
    match url.scheme() {
        "https" => Ok(url),
        "http" => {
            let is_localhost = matches!(url.host_str(), Some("localhost" | "127.0.0.1" | "[::1]"));
            if is_localhost {
                tracing::warn!(base_url = %base, "Using non-HTTPS base URL (localhost only)");
                Ok(url)
            } else {
                tracing::error!(base_url = %base, "Rejecting non-HTTPS base URL");
                Err(RemoteError::InsecureBaseUrl)
            }
        }
        other => Err(RemoteError::InvalidBaseUrl(format!(
            "unsupported scheme: {}",
            other
        ))),
    }
}

fn check_collection(name: &str) -> Result<(), RemoteError> {
    let valid = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_');
    if valid {
        Ok(())
    } else {
        Err(RemoteError::InvalidCollection(name.to_string()))
    }
}

/// Turn a non-2xx response into the most specific error available.
async fn api_error(response: reqwest::Response) -> RemoteError {
    let status = response.status().as_u16();
    let Ok(bytes) = read_limited_bytes(response, MAX_ERROR_BODY_SIZE).await else {
        return RemoteError::HttpStatus(status);
    };
    match serde_json::from_slice::<ApiErrorBody>(&bytes) {
        Ok(body) if !body.message.trim().is_empty() => RemoteError::Api {
            status,
            message: body.message.trim().to_string(),
        },
        _ => RemoteError::HttpStatus(status),
    }
}

async fn read_limited_bytes(
    response: reqwest::Response,
    limit: usize,
) -> Result<Vec<u8>, RemoteError> {
    // Fast path: check Content-Length header
    if let Some(len) = response.content_length() {
        if len as usize > limit {
            return Err(RemoteError::ResponseTooLarge(limit));
        }
    }

    let mut bytes = Vec::new();
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(RemoteError::Network)?;
        if bytes.len().saturating_add(chunk.len()) > limit {
            return Err(RemoteError::ResponseTooLarge(limit));
        }
        bytes.extend_from_slice(&chunk);
    }

    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn page_body(ids: &[&str], page: u32, total_pages: u32) -> serde_json::Value {
        let items: Vec<_> = ids
            .iter()
            .map(|id| {
                serde_json::json!({
                    "id": id,
                    "prompt": format!("Prompt {}", id),
                    "publishUrl": format!("https://img.example.com/{}.webp", id),
                    "category": "NAM",
                    "created": "2024-05-01 10:22:31.123Z"
                })
            })
            .collect();
        serde_json::json!({
            "page": page,
            "perPage": 10,
            "totalItems": ids.len(),
            "totalPages": total_pages,
            "items": items
        })
    }

    fn query(category: &str, page: u32) -> PageQuery {
        PageQuery {
            category: category.to_string(),
            page,
            page_size: 10,
            sort: "-created".to_string(),
        }
    }

    fn client(server: &MockServer) -> PocketBaseClient {
        PocketBaseClient::new(&server.uri(), "prompt")
            .unwrap()
            .with_retry_delay(Duration::from_millis(10))
    }

    #[tokio::test]
    async fn test_query_success_sends_expected_params() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/collections/prompt/records"))
            .and(query_param("page", "2"))
            .and(query_param("perPage", "10"))
            .and(query_param("sort", "-created"))
            .and(query_param("filter", "category = \"NAM\""))
            .respond_with(ResponseTemplate::new(200).set_body_json(page_body(&["a", "b"], 2, 3)))
            .expect(1)
            .mount(&server)
            .await;

        let page = client(&server).query(&query("NAM", 2)).await.unwrap();
        assert_eq!(page.items.len(), 2);
        assert_eq!(page.items[0].id, "a");
        assert_eq!(page.page, 2);
        assert!(page.has_more());
    }

    #[tokio::test]
    async fn test_empty_category_sends_no_filter() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/collections/prompt/records"))
            .respond_with(ResponseTemplate::new(200).set_body_json(page_body(&["a"], 1, 1)))
            .mount(&server)
            .await;

        client(&server).query(&query("", 1)).await.unwrap();

        let requests = server.received_requests().await.unwrap();
        assert_eq!(requests.len(), 1);
        assert!(requests[0].url.query_pairs().all(|(k, _)| k != "filter"));
    }

    #[tokio::test]
    async fn test_auth_token_sent_as_header() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(header("Authorization", "secret-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(page_body(&[], 1, 0)))
            .expect(1)
            .mount(&server)
            .await;

        let client = client(&server).with_auth_token(Some(SecretString::from("secret-token")));
        let page = client.query(&query("NAM", 1)).await.unwrap();
        assert!(page.items.is_empty());
        assert!(!page.has_more());
    }

    #[tokio::test]
    async fn test_api_error_message_decoded() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "code": 400,
                "message": "Invalid filter parameters.",
                "data": {}
            })))
            .mount(&server)
            .await;

        let result = client(&server).query(&query("NAM", 1)).await;
        match result {
            Err(RemoteError::Api { status, message }) => {
                assert_eq!(status, 400);
                assert_eq!(message, "Invalid filter parameters.");
            }
            other => panic!("Expected Api error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_404_without_body_is_http_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let result = client(&server).query(&query("NAM", 1)).await;
        assert!(matches!(result, Err(RemoteError::HttpStatus(404))));
    }

    #[tokio::test]
    async fn test_500_retries_then_fails() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .expect(3) // Initial request + 2 retries
            .mount(&server)
            .await;

        let result = client(&server).query(&query("NAM", 1)).await;
        assert!(matches!(result, Err(RemoteError::HttpStatus(500))));
    }

    #[tokio::test]
    async fn test_503_retry_then_success() {
        use wiremock::matchers::any;

        let server = MockServer::start().await;
        Mock::given(any())
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(any())
            .respond_with(ResponseTemplate::new(200).set_body_json(page_body(&["a"], 1, 1)))
            .mount(&server)
            .await;

        let page = client(&server).query(&query("NAM", 1)).await.unwrap();
        assert_eq!(page.items.len(), 1);
    }

    #[tokio::test]
    async fn test_malformed_body_is_decode_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("{not json"))
            .mount(&server)
            .await;

        let result = client(&server).query(&query("NAM", 1)).await;
        assert!(matches!(result, Err(RemoteError::Decode(_))));
    }

    #[tokio::test]
    async fn test_timeout() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(page_body(&["a"], 1, 1))
                    .set_delay(Duration::from_secs(2)),
            )
            .mount(&server)
            .await;

        let client = client(&server).with_request_timeout(Duration::from_millis(100));
        let result = client.query(&query("NAM", 1)).await;
        assert!(matches!(result, Err(RemoteError::Timeout(_))));
    }

    #[test]
    fn test_category_filter_escapes_quotes() {
        assert_eq!(category_filter(""), None);
        assert_eq!(
            category_filter("NỮ").as_deref(),
            Some("category = \"NỮ\"")
        );
        assert_eq!(
            category_filter("a\"b\\c").as_deref(),
            Some("category = \"a\\\"b\\\\c\"")
        );
    }

    #[test]
    fn test_http_base_url_rejected() {
        let result = PocketBaseClient::new("http://evil.com", "prompt");
        assert!(matches!(result, Err(RemoteError::InsecureBaseUrl)));
    }

    #[test]
    fn test_localhost_and_https_base_url_allowed() {
        assert!(PocketBaseClient::new("http://127.0.0.1:8090", "prompt").is_ok());
        assert!(PocketBaseClient::new("http://localhost:8090", "prompt").is_ok());
        assert!(PocketBaseClient::new("https://api.example.com", "prompt").is_ok());
    }

    #[test]
    fn test_invalid_collection_rejected() {
        let result = PocketBaseClient::new("https://api.example.com", "../admins");
        assert!(matches!(result, Err(RemoteError::InvalidCollection(_))));
    }

    #[test]
    fn test_debug_masks_auth_token() {
        let client = PocketBaseClient::new("https://api.example.com", "prompt")
            .unwrap()
            .with_auth_token(Some(SecretString::from("super-secret")));
        let debug_output = format!("{:?}", client);
        assert!(!debug_output.contains("super-secret"));
        assert!(debug_output.contains("[REDACTED]"));
    }
}
