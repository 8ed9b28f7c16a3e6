use super::errors::{
    ApiError, REQUEST_FAILED, UPLOAD_FAILED, classify_failure, detail_message, sanitize_message,
};
use crate::{
    APP_USER_AGENT,
    config::{AppConfig, build_url_with_base},
    routes::{self, Navigator},
};
use reqwest::{
    Client, Method, RequestBuilder, Response,
    header::{CONTENT_TYPE, HeaderValue},
    multipart::Form,
};
use serde::{Serialize, de::DeserializeOwned};
use serde_json::{Map, Value};
use std::{fmt, sync::Arc};
use tracing::{Instrument, debug, info_span, warn};
use uuid::Uuid;

/// Where the client reads the bearer token from and what it clears when the
/// backend rejects it.
pub trait SessionGate: Send + Sync {
    fn bearer_token(&self) -> Option<String>;

    /// Drops the session after the backend rejected its token.
    fn invalidate(&self);
}

enum Payload {
    Empty,
    Json(Value),
    Multipart(Form),
}

/// Whether a call runs under the current session.
#[derive(Clone, Copy, PartialEq, Eq)]
enum Scope {
    /// Bearer token attached; a rejected token clears the session.
    Session,
    /// No bearer token; a 401 is an ordinary failure of the call.
    Anonymous,
}

/// HTTP client for the Sentinel REST API.
#[derive(Clone)]
pub struct ApiClient {
    http: Client,
    base_url: String,
    session: Arc<dyn SessionGate>,
    navigator: Arc<dyn Navigator>,
}

impl fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl ApiClient {
    /// # Errors
    /// Returns an error if the underlying HTTP client cannot be built.
    pub fn new(
        config: &AppConfig,
        session: Arc<dyn SessionGate>,
        navigator: Arc<dyn Navigator>,
    ) -> Result<Self, ApiError> {
        let http = Client::builder()
            .user_agent(APP_USER_AGENT)
            .timeout(config.request_timeout)
            .build()
            .map_err(|err| ApiError::Request(err.to_string()))?;

        Ok(Self {
            http,
            base_url: config.api_base_url.clone(),
            session,
            navigator,
        })
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    #[must_use]
    pub fn url(&self, path: &str) -> String {
        build_url_with_base(&self.base_url, path)
    }

    /// # Errors
    /// Returns the normalized failure of the call.
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let response = self
            .dispatch(Method::GET, path, &[], Payload::Empty, REQUEST_FAILED, Scope::Session)
            .await?;
        decode(response).await
    }

    /// # Errors
    /// Returns the normalized failure of the call.
    pub async fn get_with_query<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, ApiError> {
        let response = self
            .dispatch(Method::GET, path, query, Payload::Empty, REQUEST_FAILED, Scope::Session)
            .await?;
        decode(response).await
    }

    /// Fetches a non-JSON body such as a CSV export.
    ///
    /// # Errors
    /// Returns the normalized failure of the call.
    pub async fn get_text(&self, path: &str, query: &[(&str, String)]) -> Result<String, ApiError> {
        let response = self
            .dispatch(Method::GET, path, query, Payload::Empty, REQUEST_FAILED, Scope::Session)
            .await?;
        response
            .text()
            .await
            .map_err(|err| ApiError::Parse(err.to_string()))
    }

    /// # Errors
    /// Returns the normalized failure of the call.
    pub async fn post<B, T>(&self, path: &str, body: &B) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.send_json(Method::POST, path, body, Scope::Session).await
    }

    /// POST outside the session: no bearer token is sent and a 401 does not
    /// touch the session. Used by the pre-login email code endpoints.
    ///
    /// # Errors
    /// Returns the normalized failure of the call.
    pub async fn post_anonymous<B, T>(&self, path: &str, body: &B) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.send_json(Method::POST, path, body, Scope::Anonymous).await
    }

    /// # Errors
    /// Returns the normalized failure of the call.
    pub async fn put<B, T>(&self, path: &str, body: &B) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.send_json(Method::PUT, path, body, Scope::Session).await
    }

    /// # Errors
    /// Returns the normalized failure of the call.
    pub async fn patch<B, T>(&self, path: &str, body: &B) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.send_json(Method::PATCH, path, body, Scope::Session).await
    }

    /// POST without a request body.
    ///
    /// # Errors
    /// Returns the normalized failure of the call.
    pub async fn post_empty<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let response = self
            .dispatch(Method::POST, path, &[], Payload::Empty, REQUEST_FAILED, Scope::Session)
            .await?;
        decode(response).await
    }

    /// # Errors
    /// Returns the normalized failure of the call.
    pub async fn delete<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let response = self
            .dispatch(Method::DELETE, path, &[], Payload::Empty, REQUEST_FAILED, Scope::Session)
            .await?;
        decode(response).await
    }

    /// Posts a multipart form. The boundary content type is set by the form.
    ///
    /// # Errors
    /// Returns the normalized failure of the call, `Upload failed` when the
    /// backend gives no detail.
    pub async fn upload<T: DeserializeOwned>(&self, path: &str, form: Form) -> Result<T, ApiError> {
        let response = self
            .dispatch(
                Method::POST,
                path,
                &[],
                Payload::Multipart(form),
                UPLOAD_FAILED,
                Scope::Session,
            )
            .await?;
        decode(response).await
    }

    async fn send_json<B, T>(
        &self,
        method: Method,
        path: &str,
        body: &B,
        scope: Scope,
    ) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let payload = serde_json::to_value(body)
            .map_err(|err| ApiError::Request(err.to_string()))?;
        let response = self
            .dispatch(method, path, &[], Payload::Json(payload), REQUEST_FAILED, scope)
            .await?;
        decode(response).await
    }

    async fn dispatch(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        payload: Payload,
        fallback: &str,
        scope: Scope,
    ) -> Result<Response, ApiError> {
        let url = self.url(path);
        let request_id = Uuid::new_v4().to_string();

        let span = info_span!(
            "api.request",
            http.method = %method,
            url = %url,
            request_id = %request_id
        );

        let mut builder = self
            .http
            .request(method, &url)
            .header("X-Request-Id", request_id);

        if !query.is_empty() {
            builder = builder.query(query);
        }

        if scope == Scope::Session
            && let Some(token) = self.session.bearer_token()
        {
            builder = builder.bearer_auth(token);
        }

        let builder = attach_payload(builder, payload);

        let response = builder
            .send()
            .instrument(span)
            .await
            .map_err(map_request_error)?;

        let status = response.status();
        debug!(status = status.as_u16(), path, "response received");

        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let body: Value =
            serde_json::from_str(&body).unwrap_or_else(|_| Value::Object(Map::new()));
        let detail = detail_message(&body);
        let err = classify_failure(status.as_u16(), detail.clone(), fallback);

        if err.is_session_invalid() && scope == Scope::Anonymous {
            return Err(ApiError::Business {
                status: status.as_u16(),
                message: sanitize_message(detail.as_deref().unwrap_or(fallback), fallback),
            });
        }

        if err.is_session_invalid() {
            warn!(path, "bearer token rejected, clearing session");
            self.session.invalidate();
            self.navigator.navigate(routes::LOGIN);
        }

        Err(err)
    }
}

fn attach_payload(builder: RequestBuilder, payload: Payload) -> RequestBuilder {
    match payload {
        Payload::Empty => {
            builder.header(CONTENT_TYPE, HeaderValue::from_static("application/json"))
        }
        Payload::Json(body) => builder.json(&body),
        Payload::Multipart(form) => builder.multipart(form),
    }
}

/// Decodes a success body; an empty body decodes as JSON `null`.
async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, ApiError> {
    let bytes = response
        .bytes()
        .await
        .map_err(|err| ApiError::Parse(err.to_string()))?;

    if bytes.iter().all(u8::is_ascii_whitespace) {
        return serde_json::from_value(Value::Null).map_err(|err| ApiError::Parse(err.to_string()));
    }

    serde_json::from_slice(&bytes).map_err(|err| ApiError::Parse(err.to_string()))
}

/// Separates timeouts from other transport failures.
fn map_request_error(err: reqwest::Error) -> ApiError {
    if err.is_timeout() {
        ApiError::Timeout
    } else if err.is_builder() {
        ApiError::Request(err.to_string())
    } else {
        ApiError::Transport(err.to_string())
    }
}
