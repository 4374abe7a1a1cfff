use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::info;

const OFFLINE_UUID: &str = "00000000-0000-0000-0000-000000000000";
const OFFLINE_ACCESS_TOKEN: &str = "offline_access_token";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AccountMode {
    Offline,
    Online,
}

/// Authenticated identity handed to the launch pipeline. Never mutated by it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub mode: AccountMode,
    pub username: String,
    pub uuid: String,
    pub access_token: String,
    pub user_type: String,
}

impl Session {
    pub fn offline(username: &str) -> Self {
        Self {
            mode: AccountMode::Offline,
            username: username.trim().to_string(),
            uuid: OFFLINE_UUID.into(),
            access_token: OFFLINE_ACCESS_TOKEN.into(),
            user_type: "legacy".into(),
        }
    }

    pub fn online(username: &str, uuid: &str, access_token: &str) -> Self {
        Self {
            mode: AccountMode::Online,
            username: username.trim().to_string(),
            uuid: uuid.to_string(),
            access_token: access_token.to_string(),
            user_type: "msa".into(),
        }
    }

    /// Whether the session may reach remote services.
    pub fn is_online(&self) -> bool {
        self.mode == AccountMode::Online
    }

    pub fn sanitized(mut self) -> Self {
        if self.username.trim().is_empty() {
            self.username = "Player".into();
        }
        if self.uuid.trim().is_empty() {
            self.uuid = OFFLINE_UUID.into();
        }
        if self.access_token.trim().is_empty() {
            self.access_token = OFFLINE_ACCESS_TOKEN.into();
        }
        if self.user_type.trim().is_empty() {
            self.user_type = match self.mode {
                AccountMode::Offline => "legacy".into(),
                AccountMode::Online => "msa".into(),
            };
        }
        self
    }
}

/// Asks the user to log in.
#[async_trait]
pub trait AuthProvider: Send + Sync {
    /// `None` means the user declined; that is not an error.
    async fn request_interactive(&self) -> Option<Session>;
}

/// Logs in offline with a configured player name; no name means "declined".
#[derive(Debug, Clone, Default)]
pub struct OfflineAuthProvider {
    username: Option<String>,
}

impl OfflineAuthProvider {
    pub fn new(username: Option<String>) -> Self {
        Self { username }
    }
}

#[async_trait]
impl AuthProvider for OfflineAuthProvider {
    async fn request_interactive(&self) -> Option<Session> {
        let username = self.username.as_deref().map(str::trim).filter(|u| !u.is_empty())?;
        info!("Logging in offline as {}", username);
        Some(Session::offline(username))
    }
}
