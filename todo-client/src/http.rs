use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use reqwest::header::{HeaderName, HeaderValue};
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use shared::models::ErrorResponse;
use tokio::sync::mpsc;
use tracing::{debug, warn};
use url::Url;
use uuid::Uuid;

use crate::error::ClientError;

/// Header carrying a per-request correlation id.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

const USER_AGENT: &str = concat!("todo-client/", env!("CARGO_PKG_VERSION"));

/// Supplies the bearer token attached to outgoing requests.
pub trait TokenSource: Send + Sync {
    fn bearer_token(&self) -> Option<String>;
}

impl<F> TokenSource for F
where
    F: Fn() -> Option<String> + Send + Sync,
{
    fn bearer_token(&self) -> Option<String> {
        self()
    }
}

/// Raised whenever the server rejects a request with 401.
///
/// `token` is the credential the failing request carried, so the receiver
/// can tell a rejection of the current session from one that belonged to
/// a session it has already replaced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnauthorizedSignal {
    pub token: Option<String>,
    pub request_id: String,
}

#[derive(Debug, Clone, Default)]
pub enum RequestBody {
    #[default]
    Empty,
    Json(Value),
    Form(Vec<(String, String)>),
}

/// A request against the API, relative to the configured base URL.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    method: Method,
    segments: Vec<String>,
    body: RequestBody,
    headers: Vec<(HeaderName, HeaderValue)>,
    anonymous: bool,
}

impl ApiRequest {
    /// `segments` are joined under the base URL and percent-encoded
    /// individually, so ids may contain reserved characters.
    pub fn new<I, S>(method: Method, segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            method,
            segments: segments.into_iter().map(Into::into).collect(),
            body: RequestBody::Empty,
            headers: Vec::new(),
            anonymous: false,
        }
    }

    pub fn get<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(Method::GET, segments)
    }

    pub fn post<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(Method::POST, segments)
    }

    pub fn patch<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(Method::PATCH, segments)
    }

    pub fn delete<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(Method::DELETE, segments)
    }

    /// Attach a JSON body.
    pub fn json(mut self, payload: &impl Serialize) -> Result<Self, ClientError> {
        self.body = RequestBody::Json(serde_json::to_value(payload)?);
        Ok(self)
    }

    /// Attach an `application/x-www-form-urlencoded` body.
    #[must_use]
    pub fn form<'a>(mut self, fields: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        self.body = RequestBody::Form(
            fields
                .into_iter()
                .map(|(key, value)| (key.to_string(), value.to_string()))
                .collect(),
        );
        self
    }

    /// Attach an extra header.
    pub fn header(mut self, name: &str, value: &str) -> Result<Self, ClientError> {
        let invalid = || ClientError::InvalidHeader(name.to_string());
        let name = HeaderName::try_from(name).map_err(|_| invalid())?;
        let value = HeaderValue::try_from(value).map_err(|_| invalid())?;
        self.headers.push((name, value));
        Ok(self)
    }

    /// Send without the bearer token. Used for credential exchanges, whose
    /// 401s reject the credentials rather than the held session.
    #[must_use]
    pub fn anonymous(mut self) -> Self {
        self.anonymous = true;
        self
    }

    #[must_use]
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Path relative to the base URL, unencoded, for logging.
    #[must_use]
    pub fn path(&self) -> String {
        format!("/{}", self.segments.join("/"))
    }
}

/// HTTP client for the todo API.
///
/// Every request carries a fresh `x-request-id` and, when the token source
/// has one, an `Authorization: Bearer` header. A 401 response is reported on
/// the unauthorized channel before the error is returned to the caller.
#[derive(Clone)]
pub struct ApiClient {
    base_url: Url,
    client: Client,
    tokens: Arc<dyn TokenSource>,
    unauthorized: Option<mpsc::UnboundedSender<UnauthorizedSignal>>,
}

impl fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.base_url.as_str())
            .field("reports_unauthorized", &self.unauthorized.is_some())
            .finish_non_exhaustive()
    }
}

impl ApiClient {
    pub fn new(
        base_url: &Url,
        timeout: Duration,
        tokens: Arc<dyn TokenSource>,
    ) -> Result<Self, ClientError> {
        if base_url.cannot_be_a_base() {
            return Err(ClientError::InvalidUrl(base_url.to_string()));
        }
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(ClientError::Network)?;
        Ok(Self {
            base_url: base_url.clone(),
            client,
            tokens,
            unauthorized: None,
        })
    }

    /// Report 401 responses on `sender`.
    #[must_use]
    pub fn with_unauthorized_channel(
        mut self,
        sender: mpsc::UnboundedSender<UnauthorizedSignal>,
    ) -> Self {
        self.unauthorized = Some(sender);
        self
    }

    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn api_url(&self, request: &ApiRequest) -> Result<Url, ClientError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| ClientError::InvalidUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(&request.segments);
        Ok(url)
    }

    fn apply_body(builder: RequestBuilder, body: &RequestBody) -> RequestBuilder {
        match body {
            RequestBody::Empty => builder,
            RequestBody::Json(value) => builder.json(value),
            RequestBody::Form(fields) => builder.form(fields),
        }
    }

    /// Send `request` and return the successful response.
    pub async fn send(&self, request: ApiRequest) -> Result<Response, ClientError> {
        let url = self.api_url(&request)?;
        let request_id = Uuid::new_v4().to_string();
        let token = if request.anonymous {
            None
        } else {
            self.tokens.bearer_token()
        };

        let mut builder = self
            .client
            .request(request.method.clone(), url)
            .header(REQUEST_ID_HEADER, &request_id);
        for (name, value) in &request.headers {
            builder = builder.header(name.clone(), value.clone());
        }
        if let Some(token) = token.as_deref() {
            builder = builder.bearer_auth(token);
        }
        builder = Self::apply_body(builder, &request.body);

        debug!(
            method = %request.method,
            path = %request.path(),
            request_id = %request_id,
            authenticated = token.is_some(),
            "sending API request"
        );

        let response = builder.send().await.map_err(ClientError::Network)?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        if status == StatusCode::UNAUTHORIZED {
            warn!(path = %request.path(), request_id = %request_id, "request rejected as unauthorized");
            if let Some(sender) = &self.unauthorized {
                let signal = UnauthorizedSignal {
                    token,
                    request_id: request_id.clone(),
                };
                if sender.send(signal).is_err() {
                    debug!("unauthorized listener is gone");
                }
            }
        } else {
            debug!(path = %request.path(), request_id = %request_id, %status, "request failed");
        }

        Err(ClientError::Http {
            status,
            detail: error_detail(response).await,
        })
    }

    /// Send `request` and decode a JSON response body.
    pub async fn send_json<T: DeserializeOwned>(
        &self,
        request: ApiRequest,
    ) -> Result<T, ClientError> {
        let response = self.send(request).await?;
        response.json::<T>().await.map_err(ClientError::Decode)
    }

    /// Send `request` and discard the response body.
    pub async fn send_empty(&self, request: ApiRequest) -> Result<(), ClientError> {
        self.send(request).await.map(drop)
    }
}

async fn error_detail(response: Response) -> Option<String> {
    let text = response.text().await.ok()?;
    if text.trim().is_empty() {
        return None;
    }
    match serde_json::from_str::<ErrorResponse>(&text) {
        Ok(body) if body.has_detail() => body.message(),
        _ => Some(text),
    }
}
