//! Client-side session state.
//!
//! The holder keeps the signed-in user as observable state and mirrors it
//! into a key/value storage under two keys, `auth_token` and
//! `currentUser`. Tokens are only decoded, never verified, on this side:
//! the payload drives expiry checks and role display while the server
//! remains the authority.

use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::auth::claims::{self, ClaimMap};
use crate::db::UserType;

pub const TOKEN_KEY: &str = "auth_token";
pub const USER_KEY: &str = "currentUser";

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("session storage I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("session data is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Persisted key/value storage for the session
pub trait SessionStorage: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;

    fn set(&self, key: &str, value: &str) -> Result<(), SessionError>;

    fn remove(&self, key: &str) -> Result<(), SessionError>;
}

/// JSON object on disk, one entry per key
pub struct FileStorage {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_entries(&self) -> BTreeMap<String, String> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(_) => return BTreeMap::new(),
        };
        match serde_json::from_str(&content) {
            Ok(entries) => entries,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Ignoring unreadable session file");
                BTreeMap::new()
            }
        }
    }

    fn write_entries(&self, entries: &BTreeMap<String, String>) -> Result<(), SessionError> {
        if entries.is_empty() {
            if self.path.exists() {
                std::fs::remove_file(&self.path)?;
            }
            return Ok(());
        }

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(&self.path, serde_json::to_string_pretty(entries)?)?;
        Ok(())
    }
}

impl SessionStorage for FileStorage {
    fn get(&self, key: &str) -> Option<String> {
        let _guard = self.lock.lock();
        self.read_entries().remove(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), SessionError> {
        let _guard = self.lock.lock();
        let mut entries = self.read_entries();
        entries.insert(key.to_string(), value.to_string());
        self.write_entries(&entries)
    }

    fn remove(&self, key: &str) -> Result<(), SessionError> {
        let _guard = self.lock.lock();
        let mut entries = self.read_entries();
        if entries.remove(key).is_some() {
            self.write_entries(&entries)?;
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryStorage {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStorage for MemoryStorage {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.read().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<(), SessionError> {
        self.entries.write().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), SessionError> {
        self.entries.write().remove(key);
        Ok(())
    }
}

/// The signed-in user as the client sees it
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SessionUser {
    pub id: i64,
    pub email: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub name: String,
    pub user_type: UserType,
    /// "Admin" or "User", always consistent with `user_type`
    pub role: String,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_active() -> bool {
    true
}

impl SessionUser {
    pub fn is_admin(&self) -> bool {
        self.user_type.is_admin()
    }
}

/// Auth endpoint response as received off the wire. `userType` is kept
/// loosely typed because older servers send names or numeric strings.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthPayload {
    #[serde(default)]
    pub token: String,
    #[serde(default)]
    pub id: i64,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub user_type: Option<Value>,
    #[serde(default)]
    pub is_active: Option<bool>,
}

/// Outcome of a client-side route guard
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardOutcome {
    Allow,
    RedirectToLogin,
    RedirectHome,
}

/// True when the token is unreadable, lacks `exp`, or is inside the skew window
pub fn token_expired(token: &str, now: i64) -> bool {
    match claims::decode_unverified(token) {
        Ok(claims) => match claims::expiry(&claims) {
            Some(exp) => claims::is_expired(exp, now),
            None => {
                debug!("Stored token has no expiry claim");
                true
            }
        },
        Err(_) => true,
    }
}

/// Coerce a loosely typed `userType` value. `None` means "not provided".
fn coerce_user_type(value: &Value) -> Option<UserType> {
    let user_type = match value {
        Value::Null => return None,
        Value::Number(n) => {
            if n.as_f64() == Some(1.0) {
                UserType::Admin
            } else {
                UserType::Regular
            }
        }
        Value::String(s) => match s.to_lowercase().as_str() {
            "admin" => UserType::Admin,
            "user" | "regular" => UserType::Regular,
            other => claims::parse_leading_int(other)
                .map(UserType::from_i64)
                .unwrap_or_default(),
        },
        Value::Bool(true) => UserType::Admin,
        _ => UserType::Regular,
    };
    Some(user_type)
}

fn claim_str<'a>(claims: &'a ClaimMap, keys: &[&str]) -> &'a str {
    keys.iter()
        .find_map(|k| claims.get(*k).and_then(Value::as_str).filter(|s| !s.is_empty()))
        .unwrap_or_default()
}

fn display_name(first: &str, last: &str) -> String {
    format!("{} {}", first, last).trim().to_string()
}

/// Build a session user out of unverified token claims
pub fn user_from_claims(claims: &ClaimMap) -> SessionUser {
    let user_type = claims::resolve_role(claims);
    let id = match claims.get("id").or_else(|| claims.get("sub")) {
        Some(Value::Number(n)) => n.as_i64().unwrap_or_default(),
        Some(Value::String(s)) => s.parse().unwrap_or_default(),
        _ => 0,
    };
    let first_name = claim_str(claims, &["firstName", "given_name"]).to_string();
    let last_name = claim_str(claims, &["lastName", "family_name"]).to_string();
    let name = match claim_str(claims, &["name"]) {
        "" => display_name(&first_name, &last_name),
        name => name.to_string(),
    };

    SessionUser {
        id,
        email: claim_str(claims, &["email"]).to_string(),
        first_name,
        last_name,
        name,
        user_type,
        role: user_type.role_name().to_string(),
        is_active: true,
    }
}

/// Build the session user for a fresh auth response.
///
/// Role priority: the response's `userType`, then the token's role claims,
/// then Regular.
pub fn user_from_auth(payload: &AuthPayload) -> SessionUser {
    let token_user = claims::decode_unverified(&payload.token)
        .ok()
        .map(|claims| user_from_claims(&claims));

    let user_type = payload
        .user_type
        .as_ref()
        .and_then(coerce_user_type)
        .or_else(|| token_user.as_ref().map(|u| u.user_type))
        .unwrap_or_default();

    let id = token_user
        .as_ref()
        .map(|u| u.id)
        .filter(|id| *id != 0)
        .unwrap_or(payload.id);

    SessionUser {
        id,
        email: payload.email.clone(),
        first_name: payload.first_name.clone(),
        last_name: payload.last_name.clone(),
        name: display_name(&payload.first_name, &payload.last_name),
        user_type,
        role: user_type.role_name().to_string(),
        is_active: payload.is_active.unwrap_or(true),
    }
}

/// Holds the current user and keeps storage in sync with it
pub struct SessionHolder {
    storage: Arc<dyn SessionStorage>,
    current: watch::Sender<Option<SessionUser>>,
}

impl SessionHolder {
    /// Start empty, without consulting storage
    pub fn new(storage: Arc<dyn SessionStorage>) -> Self {
        let (current, _) = watch::channel(None);
        Self { storage, current }
    }

    /// Restore a persisted session, discarding it if the token has expired
    /// or the stored user can't be read.
    pub fn restore(storage: Arc<dyn SessionStorage>) -> Self {
        Self::restore_at(storage, chrono::Utc::now().timestamp())
    }

    pub fn restore_at(storage: Arc<dyn SessionStorage>, now: i64) -> Self {
        let holder = Self::new(storage);

        let stored_user = holder.storage.get(USER_KEY);
        let token = holder.storage.get(TOKEN_KEY);

        match (stored_user, token) {
            (Some(user_json), Some(token)) => {
                if token_expired(&token, now) {
                    info!("Clearing stored session: token expired");
                    holder.clear();
                    return holder;
                }

                match serde_json::from_str::<SessionUser>(&user_json) {
                    Ok(user) => {
                        debug!(user_id = user.id, "Restored session from storage");
                        holder.current.send_replace(Some(user));
                    }
                    Err(e) => {
                        warn!(error = %e, "Clearing stored session: unreadable user data");
                        holder.clear();
                    }
                }
            }
            _ => debug!("No stored session to restore"),
        }

        holder
    }

    /// Receive every change of the current user. Dropping the receiver
    /// unsubscribes.
    pub fn subscribe(&self) -> watch::Receiver<Option<SessionUser>> {
        self.current.subscribe()
    }

    pub fn current_user(&self) -> Option<SessionUser> {
        self.current.borrow().clone()
    }

    pub fn token(&self) -> Option<String> {
        self.storage.get(TOKEN_KEY)
    }

    pub fn save_token(&self, token: &str) -> Result<(), SessionError> {
        self.storage.set(TOKEN_KEY, token)
    }

    pub fn set_current_user(&self, user: SessionUser) -> Result<(), SessionError> {
        self.storage.set(USER_KEY, &serde_json::to_string(&user)?)?;
        self.current.send_replace(Some(user));
        Ok(())
    }

    /// Persist a token and user together
    pub fn set_session(&self, token: &str, user: SessionUser) -> Result<(), SessionError> {
        self.save_token(token)?;
        self.set_current_user(user)
    }

    /// Start a session from a login/sign-up response
    pub fn establish(&self, payload: &AuthPayload) -> Result<SessionUser, SessionError> {
        self.save_token(&payload.token)?;
        let user = user_from_auth(payload);
        self.set_current_user(user.clone())?;
        info!(user_id = user.id, role = %user.role, "Session established");
        Ok(user)
    }

    /// Drop the stored token and user and notify subscribers
    pub fn clear(&self) {
        for key in [TOKEN_KEY, USER_KEY] {
            if let Err(e) = self.storage.remove(key) {
                warn!(key, error = %e, "Failed to remove session entry");
            }
        }
        self.current.send_replace(None);
    }

    pub fn logout(&self) {
        self.clear();
        info!("Logged out");
    }

    /// Decode the stored token's claims into a user, if there is a token
    pub fn user_from_token(&self) -> Option<SessionUser> {
        let token = self.token()?;
        claims::decode_unverified(&token)
            .ok()
            .map(|claims| user_from_claims(&claims))
    }

    pub fn is_authenticated(&self) -> bool {
        self.is_authenticated_at(chrono::Utc::now().timestamp())
    }

    /// Recomputed on every call. A present user with an expired token
    /// clears the whole session as a side effect.
    pub fn is_authenticated_at(&self, now: i64) -> bool {
        let has_user = self.current.borrow().is_some();
        let token = self.token();
        let token_valid = token.as_deref().is_some_and(|t| !token_expired(t, now));

        if has_user && token.is_some() && !token_valid {
            warn!("Token expired, clearing session");
            self.clear();
        }

        has_user && token.is_some() && token_valid
    }

    pub fn require_authenticated(&self) -> GuardOutcome {
        if self.is_authenticated() {
            GuardOutcome::Allow
        } else {
            GuardOutcome::RedirectToLogin
        }
    }

    pub fn require_admin(&self) -> GuardOutcome {
        if !self.is_authenticated() {
            return GuardOutcome::RedirectToLogin;
        }
        match self.current_user() {
            Some(user) if user.is_admin() => GuardOutcome::Allow,
            _ => GuardOutcome::RedirectHome,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::TokenIssuer;
    use crate::config::AuthConfig;
    use crate::db::User;
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;
    use base64::Engine;
    use serde_json::json;

    const NOW: i64 = 1_750_000_000;
    const DAY: i64 = 24 * 3600;

    fn issuer() -> TokenIssuer {
        TokenIssuer::new(&AuthConfig {
            jwt_secret: "this_is_a_very_secret_key_for_testing_purposes_only".to_string(),
            issuer: "travel-booking-api".to_string(),
            audience: "travel-booking-client".to_string(),
            token_ttl_hours: 24,
            admin_email: None,
            admin_password: None,
        })
    }

    fn user(user_type: UserType) -> User {
        User {
            id: 7,
            email: "test@example.com".to_string(),
            password_hash: String::new(),
            first_name: "Test".to_string(),
            last_name: "User".to_string(),
            user_type: user_type.as_i64(),
            is_active: 1,
            created_at: "2025-06-01T00:00:00+00:00".to_string(),
            last_login_at: None,
        }
    }

    fn unsigned_token(claims: Value) -> String {
        format!(
            "eyJhbGciOiJIUzI1NiJ9.{}.c2ln",
            URL_SAFE_NO_PAD.encode(claims.to_string())
        )
    }

    fn session_user() -> SessionUser {
        SessionUser {
            id: 7,
            email: "test@example.com".to_string(),
            first_name: "Test".to_string(),
            last_name: "User".to_string(),
            name: "Test User".to_string(),
            user_type: UserType::Regular,
            role: "User".to_string(),
            is_active: true,
        }
    }

    fn seeded_storage(token: &str, user: &SessionUser) -> Arc<MemoryStorage> {
        let storage = Arc::new(MemoryStorage::new());
        storage.set(TOKEN_KEY, token).unwrap();
        storage.set(USER_KEY, &serde_json::to_string(user).unwrap()).unwrap();
        storage
    }

    #[test]
    fn test_restore_valid_session() {
        let token = issuer().issue_at(&user(UserType::Regular), NOW).unwrap();
        let storage = seeded_storage(&token, &session_user());

        let holder = SessionHolder::restore_at(storage, NOW + 60);
        assert_eq!(holder.current_user(), Some(session_user()));
        assert!(holder.is_authenticated_at(NOW + 60));
    }

    #[test]
    fn test_restore_expired_session_clears_storage() {
        let token = issuer().issue_at(&user(UserType::Regular), NOW - 2 * DAY).unwrap();
        let storage = seeded_storage(&token, &session_user());

        let holder = SessionHolder::restore_at(storage.clone(), NOW);
        assert!(holder.current_user().is_none());
        assert!(!holder.is_authenticated_at(NOW));
        assert!(storage.get(TOKEN_KEY).is_none());
        assert!(storage.get(USER_KEY).is_none());
    }

    #[test]
    fn test_restore_unreadable_user_clears_storage() {
        let token = issuer().issue_at(&user(UserType::Regular), NOW).unwrap();
        let storage = Arc::new(MemoryStorage::new());
        storage.set(TOKEN_KEY, &token).unwrap();
        storage.set(USER_KEY, "{not json").unwrap();

        let holder = SessionHolder::restore_at(storage.clone(), NOW);
        assert!(holder.current_user().is_none());
        assert!(storage.get(TOKEN_KEY).is_none());
    }

    #[test]
    fn test_restore_with_only_a_token_keeps_storage() {
        let token = issuer().issue_at(&user(UserType::Regular), NOW).unwrap();
        let storage = Arc::new(MemoryStorage::new());
        storage.set(TOKEN_KEY, &token).unwrap();

        let holder = SessionHolder::restore_at(storage.clone(), NOW);
        assert!(holder.current_user().is_none());
        assert!(!holder.is_authenticated_at(NOW));
        assert!(storage.get(TOKEN_KEY).is_some());
    }

    #[test]
    fn test_authentication_check_expires_session() {
        let token = issuer().issue_at(&user(UserType::Regular), NOW).unwrap();
        let storage = seeded_storage(&token, &session_user());
        let holder = SessionHolder::restore_at(storage.clone(), NOW);
        let mut rx = holder.subscribe();

        let exp = NOW + DAY;
        assert!(holder.is_authenticated_at(exp - 31));
        assert!(!holder.is_authenticated_at(exp - 29));

        assert!(holder.current_user().is_none());
        assert!(storage.get(TOKEN_KEY).is_none());
        assert!(rx.has_changed().unwrap());
        assert!(rx.borrow_and_update().is_none());
    }

    #[test]
    fn test_establish_and_logout_notify_subscribers() {
        let holder = SessionHolder::new(Arc::new(MemoryStorage::new()));
        let mut rx = holder.subscribe();

        let token = issuer().issue(&user(UserType::Admin)).unwrap();
        let payload = AuthPayload {
            token: token.clone(),
            id: 7,
            email: "test@example.com".to_string(),
            first_name: "Test".to_string(),
            last_name: "User".to_string(),
            user_type: Some(json!(1)),
            is_active: Some(true),
        };
        let user = holder.establish(&payload).unwrap();
        assert!(user.is_admin());
        assert_eq!(user.role, "Admin");
        assert_eq!(user.name, "Test User");
        assert_eq!(holder.token().as_deref(), Some(token.as_str()));
        assert!(rx.has_changed().unwrap());
        assert_eq!(rx.borrow_and_update().as_ref().map(|u| u.id), Some(7));
        assert_eq!(holder.require_admin(), GuardOutcome::Allow);

        holder.logout();
        assert!(rx.borrow_and_update().is_none());
        assert!(holder.token().is_none());
        assert_eq!(holder.require_authenticated(), GuardOutcome::RedirectToLogin);
    }

    #[test]
    fn test_admin_guard_redirects_regular_users_home() {
        let holder = SessionHolder::new(Arc::new(MemoryStorage::new()));
        let token = issuer().issue(&user(UserType::Regular)).unwrap();
        holder.set_session(&token, session_user()).unwrap();

        assert_eq!(holder.require_authenticated(), GuardOutcome::Allow);
        assert_eq!(holder.require_admin(), GuardOutcome::RedirectHome);
    }

    #[test]
    fn test_response_user_type_takes_priority() {
        let token = unsigned_token(json!({"sub": "7", "UserType": "Admin", "exp": NOW}));
        let mut payload = AuthPayload {
            token,
            id: 7,
            email: "test@example.com".to_string(),
            first_name: "Test".to_string(),
            last_name: "User".to_string(),
            user_type: Some(json!("Regular")),
            is_active: None,
        };
        assert_eq!(user_from_auth(&payload).user_type, UserType::Regular);

        payload.user_type = Some(json!("1"));
        assert_eq!(user_from_auth(&payload).user_type, UserType::Admin);

        payload.user_type = Some(json!(2));
        assert_eq!(user_from_auth(&payload).user_type, UserType::Regular);
    }

    #[test]
    fn test_missing_response_user_type_falls_back_to_token() {
        let payload = AuthPayload {
            token: unsigned_token(json!({"sub": "7", "role": "Admin", "exp": NOW})),
            id: 0,
            email: "test@example.com".to_string(),
            first_name: "Test".to_string(),
            last_name: "User".to_string(),
            user_type: None,
            is_active: None,
        };
        let user = user_from_auth(&payload);
        assert_eq!(user.user_type, UserType::Admin);
        assert_eq!(user.id, 7);

        let payload = AuthPayload {
            token: "garbage".to_string(),
            user_type: Some(Value::Null),
            ..payload
        };
        assert_eq!(user_from_auth(&payload).user_type, UserType::Regular);
    }

    #[test]
    fn test_user_from_token_reads_claims() {
        let holder = SessionHolder::new(Arc::new(MemoryStorage::new()));
        assert!(holder.user_from_token().is_none());

        let token = issuer().issue(&user(UserType::Admin)).unwrap();
        holder.save_token(&token).unwrap();
        let from_token = holder.user_from_token().unwrap();
        assert_eq!(from_token.id, 7);
        assert_eq!(from_token.email, "test@example.com");
        assert_eq!(from_token.name, "Test User");
        assert_eq!(from_token.user_type, UserType::Admin);
        assert_eq!(from_token.role, "Admin");
    }

    #[test]
    fn test_token_expired_fails_closed() {
        assert!(token_expired("not-a-token", NOW));
        assert!(token_expired(&unsigned_token(json!({"sub": "1"})), NOW));
        assert!(!token_expired(&unsigned_token(json!({"exp": NOW + 60})), NOW));
    }

    #[test]
    fn test_file_storage_persists_between_instances() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");

        let storage = FileStorage::new(&path);
        assert!(storage.get(TOKEN_KEY).is_none());
        storage.set(TOKEN_KEY, "abc").unwrap();
        storage.set(USER_KEY, "{}").unwrap();

        let reopened = FileStorage::new(&path);
        assert_eq!(reopened.get(TOKEN_KEY).as_deref(), Some("abc"));

        reopened.remove(TOKEN_KEY).unwrap();
        reopened.remove(USER_KEY).unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn test_file_storage_restores_session() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("session.json");
        let token = issuer().issue_at(&user(UserType::Regular), NOW).unwrap();

        let holder = SessionHolder::new(Arc::new(FileStorage::new(&path)));
        holder.set_session(&token, session_user()).unwrap();
        drop(holder);

        let restored = SessionHolder::restore_at(Arc::new(FileStorage::new(&path)), NOW + 10);
        assert_eq!(restored.current_user(), Some(session_user()));
    }

    #[test]
    fn test_corrupt_session_file_reads_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        std::fs::write(&path, "not json at all").unwrap();

        let storage = FileStorage::new(&path);
        assert!(storage.get(TOKEN_KEY).is_none());
        storage.set(TOKEN_KEY, "abc").unwrap();
        assert_eq!(storage.get(TOKEN_KEY).as_deref(), Some("abc"));
    }
}
