//! HTTP gateway to the travel API.
//!
//! Attaches the session's bearer token to every call and turns transport
//! and status failures into messages fit to show a user.

use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use super::session::{AuthPayload, SessionError, SessionHolder, SessionUser};
use super::views::{self, TravelStatistics};
use crate::db::{
    CreateTravelRequest, LoginRequest, RegisterRequest, Travel, TravelStatus,
    UpdateTravelRequest, UpdateTravelStatusRequest, UpdateUserStatusRequest, UserSummary,
};

/// Extra attempts for idempotent GETs on connect/timeout failures
const GET_RETRIES: usize = 2;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

const CONNECTION_MESSAGE: &str =
    "Unable to connect to the server. Please check that the API server is running.";

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("{}", CONNECTION_MESSAGE)]
    Connection(#[source] reqwest::Error),

    #[error("{message}")]
    Status { status: u16, message: String },

    #[error("Authentication failed: No token received")]
    MissingToken,

    #[error("Unexpected response from server: {0}")]
    Decode(#[source] reqwest::Error),

    #[error("Failed to create HTTP client: {0}")]
    Setup(#[source] reqwest::Error),

    #[error(transparent)]
    Session(#[from] SessionError),
}

impl GatewayError {
    pub fn status(&self) -> Option<u16> {
        match self {
            GatewayError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Which API a failed call went to; picks the wording of 401/404 messages
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    Login,
    Account,
    Travel,
    Users,
}

impl Endpoint {
    fn resource(&self) -> &'static str {
        match self {
            Endpoint::Login | Endpoint::Account => "Account",
            Endpoint::Travel => "Travel request",
            Endpoint::Users => "User",
        }
    }
}

/// Pull a human readable message out of an error body: the structured
/// `{"error": {"message"}}` envelope, then `message`, `title`, `detail`,
/// then plain text.
pub fn body_message(body: &str) -> Option<String> {
    let body = body.trim();
    if body.is_empty() {
        return None;
    }

    let value: Value = match serde_json::from_str(body) {
        Ok(value) => value,
        Err(_) => return Some(body.to_string()),
    };

    let text = |v: Option<&Value>| {
        v.and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    };

    match &value {
        Value::Object(map) => text(map.get("error").and_then(|e| e.get("message")))
            .or_else(|| text(map.get("error")))
            .or_else(|| text(map.get("message")))
            .or_else(|| text(map.get("title")))
            .or_else(|| text(map.get("detail"))),
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        _ => None,
    }
}

/// Message shown to the user for a failed response
pub fn user_message(endpoint: Endpoint, status: u16, body: &str) -> String {
    match status {
        401 if endpoint == Endpoint::Login => "Invalid credentials".to_string(),
        401 => "Unauthorized. Please log in again.".to_string(),
        403 => "Forbidden. You do not have permission to perform this action.".to_string(),
        404 => format!("{} not found.", endpoint.resource()),
        s if s >= 500 => match body_message(body) {
            Some(message) => format!("Server error: {}", message),
            None => "Server error. Please try again later.".to_string(),
        },
        _ => body_message(body).unwrap_or_else(|| "An error occurred".to_string()),
    }
}

pub struct ApiClient {
    http: Client,
    base_url: String,
    session: Arc<SessionHolder>,
}

impl ApiClient {
    pub fn new(base_url: &str, session: Arc<SessionHolder>) -> Result<Self, GatewayError> {
        Self::with_timeout(base_url, session, REQUEST_TIMEOUT)
    }

    /// Client whose calls give up after `timeout`
    pub fn with_timeout(
        base_url: &str,
        session: Arc<SessionHolder>,
        timeout: Duration,
    ) -> Result<Self, GatewayError> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(GatewayError::Setup)?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            session,
        })
    }

    pub fn session(&self) -> &SessionHolder {
        &self.session
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let builder = self.http.request(method, format!("{}{}", self.base_url, path));
        match self.session.token() {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn send(&self, builder: RequestBuilder) -> Result<Response, GatewayError> {
        builder.send().await.map_err(|e| {
            warn!(error = %e, "Request failed to reach the server");
            GatewayError::Connection(e)
        })
    }

    /// GETs are retried a fixed number of times on transient failures
    async fn send_get(&self, path: &str) -> Result<Response, GatewayError> {
        let mut attempt = 0;
        loop {
            match self.request(Method::GET, path).send().await {
                Ok(response) => return Ok(response),
                Err(e) if (e.is_connect() || e.is_timeout()) && attempt < GET_RETRIES => {
                    attempt += 1;
                    debug!(path, attempt, error = %e, "Retrying GET");
                }
                Err(e) => {
                    warn!(path, error = %e, "Request failed to reach the server");
                    return Err(GatewayError::Connection(e));
                }
            }
        }
    }

    async fn check(&self, response: Response, endpoint: Endpoint) -> Result<Response, GatewayError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let message = user_message(endpoint, status.as_u16(), &body);
        debug!(status = status.as_u16(), message = %message, "API call failed");
        Err(GatewayError::Status {
            status: status.as_u16(),
            message,
        })
    }

    async fn json<T: DeserializeOwned>(
        &self,
        response: Response,
        endpoint: Endpoint,
    ) -> Result<T, GatewayError> {
        self.check(response, endpoint)
            .await?
            .json()
            .await
            .map_err(GatewayError::Decode)
    }

    async fn get<T: DeserializeOwned>(&self, path: &str, endpoint: Endpoint) -> Result<T, GatewayError> {
        let response = self.send_get(path).await?;
        self.json(response, endpoint).await
    }

    async fn send_json<B: Serialize, T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: &B,
        endpoint: Endpoint,
    ) -> Result<T, GatewayError> {
        let response = self.send(self.request(method, path).json(body)).await?;
        self.json(response, endpoint).await
    }

    async fn send_empty<B: Serialize>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
        endpoint: Endpoint,
    ) -> Result<(), GatewayError> {
        let mut builder = self.request(method, path);
        if let Some(body) = body {
            builder = builder.json(body);
        }
        let response = self.send(builder).await?;
        self.check(response, endpoint).await?;
        Ok(())
    }

    fn start_session(&self, payload: AuthPayload) -> Result<SessionUser, GatewayError> {
        if payload.token.is_empty() {
            return Err(GatewayError::MissingToken);
        }
        Ok(self.session.establish(&payload)?)
    }

    // ------------------------------------------------------------------
    // Auth
    // ------------------------------------------------------------------

    pub async fn login(&self, email: &str, password: &str) -> Result<SessionUser, GatewayError> {
        let request = LoginRequest {
            email: email.to_string(),
            password: password.to_string(),
        };
        let payload: AuthPayload = self
            .send_json(Method::POST, "/api/auth/login", &request, Endpoint::Login)
            .await?;
        self.start_session(payload)
    }

    /// Sign up and sign in as the new account
    pub async fn register(&self, request: &RegisterRequest) -> Result<SessionUser, GatewayError> {
        let payload: AuthPayload = self
            .send_json(Method::POST, "/api/auth/register", request, Endpoint::Account)
            .await?;
        self.start_session(payload)
    }

    /// Create an admin account; the caller's own session is left alone
    pub async fn register_admin(&self, request: &RegisterRequest) -> Result<AuthPayload, GatewayError> {
        self.send_json(Method::POST, "/api/auth/register-admin", request, Endpoint::Account)
            .await
    }

    pub fn logout(&self) {
        self.session.logout();
    }

    // ------------------------------------------------------------------
    // Travel requests
    // ------------------------------------------------------------------

    pub async fn list_travels(&self) -> Result<Vec<Travel>, GatewayError> {
        self.get("/api/travel", Endpoint::Travel).await
    }

    pub async fn get_travel(&self, id: i64) -> Result<Travel, GatewayError> {
        self.get(&format!("/api/travel/{}", id), Endpoint::Travel).await
    }

    pub async fn create_travel(&self, request: &CreateTravelRequest) -> Result<Travel, GatewayError> {
        self.send_json(Method::POST, "/api/travel", request, Endpoint::Travel)
            .await
    }

    pub async fn update_travel(
        &self,
        id: i64,
        request: &UpdateTravelRequest,
    ) -> Result<Travel, GatewayError> {
        self.send_json(Method::PUT, &format!("/api/travel/{}", id), request, Endpoint::Travel)
            .await
    }

    pub async fn delete_travel(&self, id: i64) -> Result<(), GatewayError> {
        self.send_empty::<()>(Method::DELETE, &format!("/api/travel/{}", id), None, Endpoint::Travel)
            .await
    }

    pub async fn update_status(
        &self,
        id: i64,
        status: TravelStatus,
        comments: Option<String>,
    ) -> Result<Travel, GatewayError> {
        let request = UpdateTravelStatusRequest { status, comments };
        self.send_json(
            Method::PATCH,
            &format!("/api/travel/{}/status", id),
            &request,
            Endpoint::Travel,
        )
        .await
    }

    pub async fn approve(&self, id: i64, comments: Option<String>) -> Result<Travel, GatewayError> {
        self.update_status(id, TravelStatus::Approved, comments).await
    }

    pub async fn reject(&self, id: i64, comments: Option<String>) -> Result<Travel, GatewayError> {
        self.update_status(id, TravelStatus::Rejected, comments).await
    }

    pub async fn cancel(&self, id: i64, comments: Option<String>) -> Result<Travel, GatewayError> {
        self.update_status(id, TravelStatus::Cancelled, comments).await
    }

    pub async fn statistics(&self) -> Result<TravelStatistics, GatewayError> {
        let travels = self.list_travels().await?;
        Ok(views::statistics(&travels))
    }

    // ------------------------------------------------------------------
    // Users (admin)
    // ------------------------------------------------------------------

    pub async fn list_users(&self) -> Result<Vec<UserSummary>, GatewayError> {
        self.get("/api/user", Endpoint::Users).await
    }

    pub async fn get_user(&self, id: i64) -> Result<UserSummary, GatewayError> {
        self.get(&format!("/api/user/{}", id), Endpoint::Users).await
    }

    pub async fn set_user_status(
        &self,
        id: i64,
        request: &UpdateUserStatusRequest,
    ) -> Result<(), GatewayError> {
        self.send_empty(
            Method::PUT,
            &format!("/api/user/{}/status", id),
            Some(request),
            Endpoint::Users,
        )
        .await
    }

    /// True when the server answers `GET /health`
    pub async fn health(&self) -> Result<bool, GatewayError> {
        let response = self.send_get("/health").await?;
        Ok(response.status() == StatusCode::OK)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::create_router;
    use crate::client::session::MemoryStorage;
    use crate::config::Config;
    use crate::db::{MemoryStore, UserType};
    use crate::AppState;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_login_401_is_invalid_credentials() {
        assert_eq!(user_message(Endpoint::Login, 401, ""), "Invalid credentials");
        assert_eq!(
            user_message(Endpoint::Travel, 401, r#"{"error":{"message":"Invalid token"}}"#),
            "Unauthorized. Please log in again."
        );
    }

    #[test]
    fn test_forbidden_and_not_found_messages() {
        assert_eq!(
            user_message(Endpoint::Users, 403, "{}"),
            "Forbidden. You do not have permission to perform this action."
        );
        assert_eq!(user_message(Endpoint::Travel, 404, ""), "Travel request not found.");
        assert_eq!(user_message(Endpoint::Users, 404, ""), "User not found.");
    }

    #[test]
    fn test_server_error_messages() {
        assert_eq!(
            user_message(Endpoint::Travel, 500, r#"{"error":{"code":"database_error","message":"A database error occurred"}}"#),
            "Server error: A database error occurred"
        );
        assert_eq!(
            user_message(Endpoint::Travel, 503, r#"{"detail":"maintenance"}"#),
            "Server error: maintenance"
        );
        assert_eq!(
            user_message(Endpoint::Travel, 500, ""),
            "Server error. Please try again later."
        );
    }

    #[test]
    fn test_client_error_uses_body_message() {
        assert_eq!(
            user_message(Endpoint::Account, 400, r#"{"error":{"code":"bad_request","message":"Email already exists"}}"#),
            "Email already exists"
        );
        assert_eq!(
            user_message(Endpoint::Travel, 400, r#"{"title":"One or more validation errors occurred."}"#),
            "One or more validation errors occurred."
        );
        assert_eq!(user_message(Endpoint::Travel, 409, "plain text"), "plain text");
        assert_eq!(user_message(Endpoint::Travel, 400, "{}"), "An error occurred");
        assert_eq!(user_message(Endpoint::Travel, 422, ""), "An error occurred");
    }

    #[test]
    fn test_body_message_prefers_envelope() {
        assert_eq!(
            body_message(r#"{"error":{"message":"inner"},"message":"outer"}"#).as_deref(),
            Some("inner")
        );
        assert_eq!(body_message(r#"{"error":"flat"}"#).as_deref(), Some("flat"));
        assert_eq!(body_message(r#""quoted""#).as_deref(), Some("quoted"));
        assert_eq!(body_message("   "), None);
    }

    #[tokio::test]
    async fn test_unreachable_server_is_connection_error() {
        let session = Arc::new(SessionHolder::new(Arc::new(MemoryStorage::new())));
        let client = ApiClient::new("http://127.0.0.1:1", session).unwrap();

        let err = client.list_travels().await.unwrap_err();
        assert!(matches!(err, GatewayError::Connection(_)));
        assert_eq!(err.to_string(), CONNECTION_MESSAGE);
    }

    /// Server that accepts connections and never answers, counting them
    async fn spawn_silent_server() -> (String, Arc<AtomicUsize>) {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let accepted = Arc::new(AtomicUsize::new(0));

        let counter = accepted.clone();
        tokio::spawn(async move {
            let mut open = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                counter.fetch_add(1, Ordering::SeqCst);
                open.push(socket);
            }
        });

        (format!("http://{}", addr), accepted)
    }

    #[tokio::test]
    async fn test_only_gets_are_retried_on_timeout() {
        let (base_url, accepted) = spawn_silent_server().await;
        let session = Arc::new(SessionHolder::new(Arc::new(MemoryStorage::new())));
        let client =
            ApiClient::with_timeout(&base_url, session, Duration::from_millis(200)).unwrap();

        let err = client.list_travels().await.unwrap_err();
        assert!(matches!(err, GatewayError::Connection(_)));
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(accepted.load(Ordering::SeqCst), 1 + GET_RETRIES);

        accepted.store(0, Ordering::SeqCst);
        let request = CreateTravelRequest {
            destination: "Lisbon".to_string(),
            start_date: "2025-09-01".to_string(),
            end_date: "2025-09-05".to_string(),
            purpose: "Conference".to_string(),
            estimated_cost: 100.0,
            status: None,
            comments: None,
        };
        let err = client.create_travel(&request).await.unwrap_err();
        assert!(matches!(err, GatewayError::Connection(_)));
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(accepted.load(Ordering::SeqCst), 1);
    }

    async fn spawn_server() -> (String, Arc<AppState>) {
        let state = Arc::new(AppState::new(
            Config::default(),
            Arc::new(MemoryStore::new()),
        ));
        state
            .auth
            .ensure_admin("admin@example.com", "AdminPass123")
            .await
            .unwrap();

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let router = create_router(state.clone());
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        (format!("http://{}", addr), state)
    }

    fn client(base_url: &str) -> ApiClient {
        let session = Arc::new(SessionHolder::new(Arc::new(MemoryStorage::new())));
        ApiClient::new(base_url, session).unwrap()
    }

    #[tokio::test]
    async fn test_end_to_end_session_flow() {
        let (base_url, _state) = spawn_server().await;
        let traveler = client(&base_url);

        let user = traveler
            .register(&RegisterRequest {
                email: "traveler@example.com".to_string(),
                password: "Password123".to_string(),
                first_name: "Tra".to_string(),
                last_name: "Veler".to_string(),
                user_type: None,
            })
            .await
            .unwrap();
        assert_eq!(user.user_type, UserType::Regular);
        assert!(traveler.session().is_authenticated());

        let created = traveler
            .create_travel(&CreateTravelRequest {
                destination: "Lisbon".to_string(),
                start_date: "2025-09-01".to_string(),
                end_date: "2025-09-05".to_string(),
                purpose: "Conference".to_string(),
                estimated_cost: 1200.0,
                status: Some("Approved".to_string()),
                comments: None,
            })
            .await
            .unwrap();
        assert_eq!(created.status_enum(), TravelStatus::Pending);

        // Regular users can't review their own requests
        let err = traveler.approve(created.id, None).await.unwrap_err();
        assert_eq!(err.status(), Some(403));
        assert_eq!(
            err.to_string(),
            "Forbidden. You do not have permission to perform this action."
        );

        let admin = client(&base_url);
        let admin_user = admin.login("admin@example.com", "AdminPass123").await.unwrap();
        assert!(admin_user.is_admin());

        let reviewed = admin.approve(created.id, Some("ok".to_string())).await.unwrap();
        assert_eq!(reviewed.status_enum(), TravelStatus::Approved);

        let stats = traveler.statistics().await.unwrap();
        assert_eq!(stats.total_requests, 1);
        assert_eq!(stats.approved_requests, 1);

        let err = traveler.get_travel(9999).await.unwrap_err();
        assert_eq!(err.to_string(), "Travel request not found.");

        traveler.logout();
        let err = traveler.list_travels().await.unwrap_err();
        assert_eq!(err.to_string(), "Unauthorized. Please log in again.");
    }

    #[tokio::test]
    async fn test_failed_login_leaves_session_empty() {
        let (base_url, _state) = spawn_server().await;
        let client = client(&base_url);

        let err = client.login("admin@example.com", "WrongPassword1").await.unwrap_err();
        assert_eq!(err.status(), Some(401));
        assert_eq!(err.to_string(), "Invalid credentials");
        assert!(client.session().current_user().is_none());
        assert!(client.session().token().is_none());
    }
}
