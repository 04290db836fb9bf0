//! Session client
//! Owns the login token and every authenticated HTTP call to the broker

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, CACHE_CONTROL, CONTENT_TYPE, PRAGMA, USER_AGENT};
use reqwest::{Client, Method, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::api::models::{Envelope, SessionData};
use crate::api::{mask_account, sanitize_api_error, ApiError};

pub const PROD_API_URL: &str = "https://api.tastyworks.com";
pub const CERT_API_URL: &str = "https://api.cert.tastyworks.com";

const CLIENT_USER_AGENT: &str = concat!("tt-trader/", env!("CARGO_PKG_VERSION"));

/// Login credentials
#[derive(Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
    pub remember_me: bool,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            remember_me: true,
        }
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"****")
            .finish()
    }
}

#[derive(Serialize)]
struct LoginBody<'a> {
    login: &'a str,
    password: &'a str,
    #[serde(rename = "remember-me")]
    remember_me: bool,
}

/// Authenticated tastytrade session
pub struct SessionClient {
    client: Client,
    base_url: String,
    account_number: String,
    token: RwLock<Option<String>>,
}

impl SessionClient {
    /// Create a session client with the default request timeouts
    pub fn new(base_url: &str, account_number: &str) -> Result<Self, ApiError> {
        Self::with_timeouts(base_url, account_number, Duration::from_secs(15), Duration::from_secs(10))
    }

    pub fn with_timeouts(
        base_url: &str,
        account_number: &str,
        timeout: Duration,
        connect_timeout: Duration,
    ) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(connect_timeout)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            account_number: account_number.to_string(),
            token: RwLock::new(None),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn account_number(&self) -> &str {
        &self.account_number
    }

    /// Whether a session token is currently held
    pub async fn is_logged_in(&self) -> bool {
        self.token.read().await.is_some()
    }

    /// Create a session and store its token.
    /// Any non-success status is an authentication failure.
    pub async fn login(&self, credentials: &Credentials) -> Result<String, ApiError> {
        info!("🔐 Logging in as {}...", credentials.username);
        let url = format!("{}/sessions", self.base_url);
        let body = LoginBody {
            login: &credentials.username,
            password: &credentials.password,
            remember_me: credentials.remember_me,
        };

        let response = self
            .client
            .post(&url)
            .headers(Self::base_headers())
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            warn!("Login failed: {} - {}", status.as_u16(), message);
            return Err(ApiError::AuthFailed {
                status: status.as_u16(),
                message,
            });
        }

        let envelope: Envelope<SessionData> = response.json().await?;
        let token = envelope.data.session_token;
        if token.is_empty() {
            return Err(ApiError::MissingField("session-token"));
        }

        *self.token.write().await = Some(token.clone());
        info!(
            "✅ Login successful (account {})",
            mask_account(&self.account_number)
        );
        Ok(token)
    }

    /// Check token liveness without side effects
    pub async fn validate(&self) -> bool {
        match self.send_raw(Method::POST, "/sessions/validate", None::<&()>, &[]).await {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                debug!("Session validation failed: {}", e);
                false
            }
        }
    }

    /// Delete the session. Best-effort: failures are logged and the token is always dropped.
    pub async fn logout(&self) {
        let token = self.token.write().await.take();
        let Some(token) = token else {
            return;
        };

        info!("Logging out...");
        let headers = match Self::auth_headers(&token) {
            Ok(headers) => headers,
            Err(e) => {
                warn!("Logout skipped: {}", e);
                return;
            }
        };
        let url = format!("{}/sessions", self.base_url);
        let result = self.client.delete(&url).headers(headers).send().await;

        match result {
            Ok(response) if response.status().is_success() => {
                info!("Session terminated successfully");
            }
            Ok(response) => {
                warn!("Logout failed: {}", response.status().as_u16());
            }
            Err(e) => {
                warn!("Logout failed: {}", e);
            }
        }
    }

    /// Authenticated GET returning the `data` payload
    pub async fn get_data<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, ApiError> {
        let response = self.send_checked(Method::GET, path, None::<&()>, query).await?;
        let envelope: Envelope<T> = response.json().await?;
        Ok(envelope.data)
    }

    /// Authenticated POST returning the `data` payload
    pub async fn post_data<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        let response = self.send_checked(Method::POST, path, Some(body), &[]).await?;
        let envelope: Envelope<T> = response.json().await?;
        Ok(envelope.data)
    }

    /// Authenticated POST that keeps the full error body on rejection
    pub async fn post_untruncated<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<serde_json::Value, ApiError> {
        let response = self.send_raw(Method::POST, path, Some(body), &[]).await?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            if status.as_u16() == 401 {
                return Err(ApiError::Unauthorized { message: text });
            }
            return Err(ApiError::ApiError {
                status: status.as_u16(),
                message: text,
            });
        }
        let envelope: Envelope<serde_json::Value> = response.json().await?;
        Ok(envelope.data)
    }

    async fn send_checked<B: Serialize + ?Sized>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
        query: &[(&str, String)],
    ) -> Result<reqwest::Response, ApiError> {
        let response = self.send_raw(method, path, body, query).await?;
        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(sanitize_api_error(status.as_u16(), error_text));
        }
        Ok(response)
    }

    async fn send_raw<B: Serialize + ?Sized>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
        query: &[(&str, String)],
    ) -> Result<reqwest::Response, ApiError> {
        let token = self.token.read().await.clone().ok_or(ApiError::NotLoggedIn)?;
        let url = format!("{}{}", self.base_url, path);
        debug!("Sending {} to {}", method, url);

        let mut request: RequestBuilder = self
            .client
            .request(method, &url)
            .headers(Self::auth_headers(&token)?);
        if !query.is_empty() {
            request = request.query(query);
        }
        if path.ends_with("/balances") {
            request = request
                .header(CACHE_CONTROL, HeaderValue::from_static("no-cache"))
                .header(PRAGMA, HeaderValue::from_static("no-cache"));
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        Ok(request.send().await?)
    }

    fn base_headers() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(USER_AGENT, HeaderValue::from_static(CLIENT_USER_AGENT));
        headers
    }

    /// The token goes into `Authorization` as-is, without a scheme prefix
    fn auth_headers(token: &str) -> Result<HeaderMap, ApiError> {
        let value = HeaderValue::from_str(token).map_err(|_| ApiError::InvalidToken)?;
        let mut headers = Self::base_headers();
        headers.insert(AUTHORIZATION, value);
        Ok(headers)
    }
}

/// Run `flow` inside a logged-in session. Logout happens on every exit path,
/// including Ctrl-C.
pub async fn with_session<T, E, F, Fut>(
    session: Arc<SessionClient>,
    credentials: &Credentials,
    flow: F,
) -> Result<T, E>
where
    F: FnOnce(Arc<SessionClient>) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: From<ApiError>,
{
    with_session_until(session, credentials, interrupted(), flow).await
}

/// Like [`with_session`], but `cancel` completing stands in for the interrupt.
/// A cancelled flow is dropped, the session is logged out and `ApiError::Cancelled` is returned.
pub async fn with_session_until<T, E, F, Fut, C>(
    session: Arc<SessionClient>,
    credentials: &Credentials,
    cancel: C,
    flow: F,
) -> Result<T, E>
where
    F: FnOnce(Arc<SessionClient>) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: From<ApiError>,
    C: Future<Output = ()>,
{
    tokio::pin!(cancel);

    tokio::select! {
        login = session.login(credentials) => { login?; }
        () = &mut cancel => {
            warn!("⚠️ Interrupted during login");
            session.logout().await;
            return Err(ApiError::Cancelled.into());
        }
    }

    let result = tokio::select! {
        result = flow(Arc::clone(&session)) => result,
        () = &mut cancel => {
            warn!("⚠️ Interrupted, closing session");
            Err(ApiError::Cancelled.into())
        }
    };
    session.logout().await;
    result
}

/// Resolves on Ctrl-C. Never resolves if the handler cannot be installed.
async fn interrupted() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Cannot listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
}
