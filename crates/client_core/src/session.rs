use std::{
    fs,
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
};

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use shared::domain::UserId;
use tokio::sync::{watch, RwLock};
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::ClientError;

const MIN_PASSWORD_LEN: usize = 6;
const GUEST_EMAIL: &str = "guest@ticket-nexus.local";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub user_id: UserId,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    #[serde(default)]
    pub guest: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignUpOutcome {
    Session(Session),
    /// Account created; the backend wants the address confirmed before the
    /// first sign-in.
    PendingConfirmation,
}

#[async_trait]
pub trait AuthService: Send + Sync {
    async fn current_session(&self) -> Result<Option<Session>>;
    async fn sign_in(&self, email: &str, password: &str) -> Result<Session>;
    async fn sign_up(&self, email: &str, password: &str) -> Result<SignUpOutcome>;
    async fn sign_out(&self) -> Result<()>;
}

/// Offline auth: any non-empty credentials are accepted and the account id
/// is derived from the email, so the same organizer sees the same events
/// across restarts.
#[derive(Default)]
pub struct LocalAuth {
    current: RwLock<Option<Session>>,
}

impl LocalAuth {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn user_id_for_email(email: &str) -> UserId {
        let normalized = email.trim().to_ascii_lowercase();
        UserId(Uuid::new_v5(&Uuid::NAMESPACE_OID, normalized.as_bytes()))
    }

    fn session_for(email: &str) -> Session {
        Session {
            user_id: Self::user_id_for_email(email),
            email: email.trim().to_string(),
            access_token: None,
            guest: false,
        }
    }
}

#[async_trait]
impl AuthService for LocalAuth {
    async fn current_session(&self) -> Result<Option<Session>> {
        Ok(self.current.read().await.clone())
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<Session> {
        if email.trim().is_empty() || password.is_empty() {
            return Err(anyhow!("invalid login credentials"));
        }
        let session = Self::session_for(email);
        *self.current.write().await = Some(session.clone());
        Ok(session)
    }

    async fn sign_up(&self, email: &str, password: &str) -> Result<SignUpOutcome> {
        let session = self.sign_in(email, password).await?;
        Ok(SignUpOutcome::Session(session))
    }

    async fn sign_out(&self) -> Result<()> {
        *self.current.write().await = None;
        Ok(())
    }
}

/// Persisted "organizer is signed in" marker. The stored value is the
/// serialized session so a restart can restore it.
pub trait SessionFlag: Send + Sync {
    fn load(&self) -> Result<Option<String>>;
    fn store(&self, value: &str) -> Result<()>;
    fn clear(&self) -> Result<()>;

    fn is_set(&self) -> bool {
        matches!(self.load(), Ok(Some(_)))
    }
}

#[derive(Default)]
pub struct MemorySessionFlag {
    value: Mutex<Option<String>>,
}

impl MemorySessionFlag {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionFlag for MemorySessionFlag {
    fn load(&self) -> Result<Option<String>> {
        let guard = self
            .value
            .lock()
            .map_err(|_| anyhow!("session flag lock poisoned"))?;
        Ok(guard.clone())
    }

    fn store(&self, value: &str) -> Result<()> {
        let mut guard = self
            .value
            .lock()
            .map_err(|_| anyhow!("session flag lock poisoned"))?;
        *guard = Some(value.to_string());
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        let mut guard = self
            .value
            .lock()
            .map_err(|_| anyhow!("session flag lock poisoned"))?;
        *guard = None;
        Ok(())
    }
}

pub struct FileSessionFlag {
    path: PathBuf,
}

impl FileSessionFlag {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SessionFlag for FileSessionFlag {
    fn load(&self) -> Result<Option<String>> {
        match fs::read_to_string(&self.path) {
            Ok(raw) if raw.trim().is_empty() => Ok(None),
            Ok(raw) => Ok(Some(raw)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err)
                .with_context(|| format!("failed to read session flag '{}'", self.path.display())),
        }
    }

    fn store(&self, value: &str) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("failed to create session directory '{}'", parent.display())
            })?;
        }
        fs::write(&self.path, value)
            .with_context(|| format!("failed to write session flag '{}'", self.path.display()))
    }

    fn clear(&self) -> Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err)
                .with_context(|| format!("failed to remove session flag '{}'", self.path.display())),
        }
    }
}

/// Process-wide auth state. Views subscribe once at startup and drop their
/// receiver when they unmount.
pub struct SessionHub {
    tx: watch::Sender<Option<Session>>,
}

impl Default for SessionHub {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionHub {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(None);
        Self { tx }
    }

    pub fn publish(&self, session: Option<Session>) {
        self.tx.send_replace(session);
    }

    pub fn current(&self) -> Option<Session> {
        self.tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<Session>> {
        self.tx.subscribe()
    }
}

/// Ties the auth backend, the persisted flag and the hub together so every
/// sign-in/out updates all three.
pub struct SessionManager {
    auth: Arc<dyn AuthService>,
    flag: Arc<dyn SessionFlag>,
    hub: SessionHub,
}

impl SessionManager {
    pub fn new(auth: Arc<dyn AuthService>, flag: Arc<dyn SessionFlag>) -> Self {
        Self {
            auth,
            flag,
            hub: SessionHub::new(),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<Session>> {
        self.hub.subscribe()
    }

    pub fn current(&self) -> Option<Session> {
        self.hub.current()
    }

    pub fn has_session_flag(&self) -> bool {
        self.flag.is_set()
    }

    pub fn require_session(&self) -> Result<Session, ClientError> {
        self.current().ok_or(ClientError::Unauthorized)
    }

    /// Rebuilds the session from the persisted flag, falling back to
    /// whatever the auth backend still holds.
    pub async fn restore(&self) -> Option<Session> {
        let restored = match self.flag.load() {
            Ok(Some(raw)) => match serde_json::from_str::<Session>(&raw) {
                Ok(session) => Some(session),
                Err(err) => {
                    warn!("session: discarding unreadable session flag: {err}");
                    let _ = self.flag.clear();
                    None
                }
            },
            Ok(None) => None,
            Err(err) => {
                warn!("session: failed to read session flag: {err:#}");
                None
            }
        };

        let restored = match restored {
            Some(session) => Some(session),
            None => match self.auth.current_session().await {
                Ok(session) => session,
                Err(err) => {
                    warn!("session: auth backend lookup failed: {err:#}");
                    None
                }
            },
        };

        self.hub.publish(restored.clone());
        restored
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> Result<Session, ClientError> {
        if email.trim().is_empty() || password.is_empty() {
            return Err(ClientError::validation(
                "Please enter a valid email and password",
            ));
        }
        let session = self
            .auth
            .sign_in(email.trim(), password)
            .await
            .map_err(|err| ClientError::Auth(err.to_string()))?;
        self.activate(session.clone())?;
        info!(user_id = %session.user_id, "session: signed in");
        Ok(session)
    }

    pub fn sign_in_as_guest(&self) -> Result<Session, ClientError> {
        let session = Session {
            user_id: LocalAuth::user_id_for_email(GUEST_EMAIL),
            email: GUEST_EMAIL.to_string(),
            access_token: None,
            guest: true,
        };
        self.activate(session.clone())?;
        info!(user_id = %session.user_id, "session: guest sign-in");
        Ok(session)
    }

    pub async fn sign_up(&self, email: &str, password: &str) -> Result<SignUpOutcome, ClientError> {
        if email.trim().is_empty() {
            return Err(ClientError::validation("Email is required"));
        }
        if password.chars().count() < MIN_PASSWORD_LEN {
            return Err(ClientError::validation(format!(
                "Password must be at least {MIN_PASSWORD_LEN} characters"
            )));
        }
        let outcome = self
            .auth
            .sign_up(email.trim(), password)
            .await
            .map_err(|err| ClientError::Auth(err.to_string()))?;
        if let SignUpOutcome::Session(session) = &outcome {
            self.activate(session.clone())?;
            info!(user_id = %session.user_id, "session: signed up");
        } else {
            info!("session: sign-up awaiting email confirmation");
        }
        Ok(outcome)
    }

    /// Local state is cleared even if the backend call fails.
    pub async fn sign_out(&self) {
        if let Err(err) = self.auth.sign_out().await {
            warn!("session: backend sign-out failed: {err:#}");
        }
        if let Err(err) = self.flag.clear() {
            warn!("session: failed to clear session flag: {err:#}");
        }
        self.hub.publish(None);
        info!("session: signed out");
    }

    fn activate(&self, session: Session) -> Result<(), ClientError> {
        let raw = serde_json::to_string(&session)
            .map_err(|err| ClientError::Auth(format!("failed to encode session: {err}")))?;
        self.flag.store(&raw).map_err(|err| ClientError::StoreWrite {
            what: "session",
            source: err,
        })?;
        self.hub.publish(Some(session));
        Ok(())
    }
}

#[cfg(test)]
#[path = "tests/session_tests.rs"]
mod tests;
