//! Logged-in user, persisted between runs with an encrypted token.

use anyhow::{anyhow, Result};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use crate::config::{DEFAULT_EXPIRY_DAYS, REMEMBER_ME_EXPIRY_DAYS};
use crate::models::User;
use crate::services::credentials::CredentialProvider;
use crate::services::crypto::CryptoService;

pub const SESSION_FILE: &str = "session.json";

#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub user: User,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredSession {
    id: String,
    email: String,
    first_name: String,
    last_name: String,
    token: String,
    expires_at: DateTime<Utc>,
}

pub struct SessionStore {
    path: PathBuf,
    current: RwLock<Option<Session>>,
}

impl SessionStore {
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let current = match load(&path) {
            Ok(session) => session,
            Err(err) => {
                tracing::warn!(path = %path.display(), error = %err, "Discarding unreadable session");
                None
            }
        };
        SessionStore {
            path,
            current: RwLock::new(current),
        }
    }

    /// Stores `user`; "remember me" extends the expiry.
    pub fn save(&self, user: User, remember_me: bool) -> Result<Session> {
        let days = if remember_me {
            REMEMBER_ME_EXPIRY_DAYS
        } else {
            DEFAULT_EXPIRY_DAYS
        };
        let session = Session {
            user,
            expires_at: Utc::now() + Duration::days(days),
        };

        let stored = StoredSession {
            id: session.user.id.clone(),
            email: session.user.email.clone(),
            first_name: session.user.first_name.clone(),
            last_name: session.user.last_name.clone(),
            token: CryptoService::encrypt_token(&session.user.token)?,
            expires_at: session.expires_at,
        };
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, serde_json::to_vec_pretty(&stored)?)?;

        let mut current = self.current.write().map_err(|_| anyhow!("Session lock"))?;
        *current = Some(session.clone());
        Ok(session)
    }

    pub fn clear(&self) -> Result<()> {
        if self.path.exists() {
            std::fs::remove_file(&self.path)?;
        }
        let mut current = self.current.write().map_err(|_| anyhow!("Session lock"))?;
        *current = None;
        Ok(())
    }

    /// Active session, `None` once expired.
    pub fn current(&self) -> Option<Session> {
        let current = self.current.read().ok()?;
        current
            .as_ref()
            .filter(|session| !session.is_expired(Utc::now()))
            .cloned()
    }

    pub fn is_authenticated(&self) -> bool {
        self.current().is_some()
    }
}

impl CredentialProvider for SessionStore {
    fn bearer_token(&self) -> Option<String> {
        self.current().map(|session| session.user.token)
    }
}

fn load(path: &Path) -> Result<Option<Session>> {
    if !path.exists() {
        return Ok(None);
    }
    let stored: StoredSession = serde_json::from_slice(&std::fs::read(path)?)?;
    let token = CryptoService::decrypt_token(&stored.token)?;
    Ok(Some(Session {
        user: User {
            id: stored.id,
            email: stored.email,
            first_name: stored.first_name,
            last_name: stored.last_name,
            token,
        },
        expires_at: stored.expires_at,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user() -> User {
        User {
            id: "42".to_string(),
            email: "ada@example.com".to_string(),
            first_name: "Ada".to_string(),
            last_name: "Lovelace".to_string(),
            token: "jwt-token".to_string(),
        }
    }

    #[test]
    fn saved_session_reloads_with_plain_token() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(SESSION_FILE);

        let store = SessionStore::open(&path);
        assert!(!store.is_authenticated());
        store.save(user(), false).unwrap();

        let on_disk = std::fs::read_to_string(&path).unwrap();
        assert!(!on_disk.contains("jwt-token"));

        let reopened = SessionStore::open(&path);
        assert_eq!(reopened.bearer_token().as_deref(), Some("jwt-token"));
        assert_eq!(reopened.current().unwrap().user.email, "ada@example.com");
    }

    #[test]
    fn remember_me_extends_expiry() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::open(dir.path().join(SESSION_FILE));

        let short = store.save(user(), false).unwrap();
        let long = store.save(user(), true).unwrap();
        assert!(long.expires_at - short.expires_at > Duration::days(22));
    }

    #[test]
    fn expired_session_has_no_token() {
        let session = Session {
            user: user(),
            expires_at: Utc::now() - Duration::minutes(1),
        };
        assert!(session.is_expired(Utc::now()));

        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::open(dir.path().join(SESSION_FILE));
        *store.current.write().unwrap() = Some(session);
        assert!(store.bearer_token().is_none());
    }

    #[test]
    fn clear_removes_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(SESSION_FILE);
        let store = SessionStore::open(&path);
        store.save(user(), true).unwrap();

        store.clear().unwrap();
        assert!(!path.exists());
        assert!(!store.is_authenticated());
        store.clear().unwrap();
    }
}
