use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use gather_db::DomainError;
use gather_types::models::{Role, User};

/// Server-side session bound to an authenticated user. The token handed to
/// the client is opaque; everything about the user lives here.
#[derive(Debug, Clone)]
pub struct Session {
    pub user_id: i64,
    pub username: String,
    pub fullname: String,
    pub email: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

impl Session {
    pub fn for_user(user: &User) -> Self {
        Self {
            user_id: user.id,
            username: user.username.clone(),
            fullname: user.fullname.clone(),
            email: user.email.clone(),
            role: user.role,
            created_at: Utc::now(),
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    pub fn require_admin(&self) -> Result<(), DomainError> {
        if self.is_admin() {
            Ok(())
        } else {
            Err(DomainError::Forbidden)
        }
    }

    pub fn user(&self) -> User {
        User {
            id: self.user_id,
            username: self.username.clone(),
            fullname: self.fullname.clone(),
            email: self.email.clone(),
            role: self.role,
        }
    }
}

/// In-memory session store. Tokens are random UUIDs; sessions expire after
/// the configured TTL and a background sweeper evicts stale entries.
pub struct SessionStore {
    ttl: Duration,
    sessions: RwLock<HashMap<String, Session>>,
}

impl SessionStore {
    pub fn new(ttl_hours: i64) -> Self {
        Self {
            ttl: Duration::hours(ttl_hours),
            sessions: RwLock::new(HashMap::new()),
        }
    }

    pub async fn create_session(&self, session: Session) -> String {
        let token = Uuid::new_v4().to_string();
        let mut sessions = self.sessions.write().await;
        sessions.insert(token.clone(), session);
        token
    }

    pub async fn get(&self, token: &str) -> Option<Session> {
        let sessions = self.sessions.read().await;
        let session = sessions.get(token)?;

        if Utc::now().signed_duration_since(session.created_at) >= self.ttl {
            return None;
        }

        Some(session.clone())
    }

    /// Remove a session (logout). Idempotent: an unknown token is a no-op.
    pub async fn remove(&self, token: &str) {
        let mut sessions = self.sessions.write().await;
        sessions.remove(token);
    }

    /// Evict expired sessions; returns how many were dropped.
    pub async fn cleanup_expired(&self) -> usize {
        let mut sessions = self.sessions.write().await;
        let now = Utc::now();
        let before = sessions.len();
        sessions.retain(|_, session| now.signed_duration_since(session.created_at) < self.ttl);
        before - sessions.len()
    }
}
