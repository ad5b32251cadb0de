//! Sign-in state and session storage.
//!
//! A session is created on successful login, persisted, and trusted until
//! explicit logout: a stored payload is restored without re-validating it
//! against the backend.

use chrono::{DateTime, Utc};
use moka::future::Cache;
use moka::ops::compute::Op;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use crate::backend_client::SupabaseClient;
use crate::cache_validator;
use crate::errors::AppError;
use crate::kv_store::{session_key, KvStore};
use crate::models::Seller;
use crate::queries::sellers;

/// Stored payload of a signed-in user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    /// Opaque token handed to the caller.
    pub token: String,
    pub user: Seller,
    /// Backend access token, forwarded on every read.
    pub access_token: String,
    pub created_at: DateTime<Utc>,
}

/// Authentication state of one login flow.
#[derive(Debug, Clone, PartialEq)]
pub enum AuthState {
    Unauthenticated { error: Option<String> },
    Authenticating,
    Authenticated(Session),
}

impl Default for AuthState {
    fn default() -> Self {
        AuthState::Unauthenticated { error: None }
    }
}

impl AuthState {
    /// Login submission. Rejected while another attempt is in flight.
    pub fn start_login(self) -> Result<AuthState, AppError> {
        match self {
            AuthState::Authenticating => Err(AppError::BadRequest(
                "Login já em andamento".to_string(),
            )),
            _ => Ok(AuthState::Authenticating),
        }
    }

    pub fn login_succeeded(self, session: Session) -> Result<AuthState, AppError> {
        match self {
            AuthState::Authenticating => Ok(AuthState::Authenticated(session)),
            other => Err(AppError::InternalError(format!(
                "Login completed from state {:?}",
                other
            ))),
        }
    }

    pub fn login_failed(self, message: impl Into<String>) -> AuthState {
        AuthState::Unauthenticated {
            error: Some(message.into()),
        }
    }

    pub fn logout(self) -> AuthState {
        AuthState::default()
    }

    pub fn session(&self) -> Option<&Session> {
        match self {
            AuthState::Authenticated(session) => Some(session),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            AuthState::Unauthenticated { error } => error.as_deref(),
            _ => None,
        }
    }
}

fn email_regex() -> Option<&'static Regex> {
    static EMAIL_REGEX: OnceLock<Option<Regex>> = OnceLock::new();
    EMAIL_REGEX
        .get_or_init(|| {
            Regex::new(
                r"^[a-zA-Z0-9.!#$%&'*+/=?^_`{|}~-]+@[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?(?:\.[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?)+$",
            )
            .ok()
        })
        .as_ref()
}

/// Login form e-mail check, done before calling the backend.
pub fn is_valid_email(email: &str) -> bool {
    let email = email.trim();
    if email.len() < 5 {
        return false;
    }
    email_regex().is_some_and(|re| re.is_match(email))
}

/// Owns sign-in, restore and sign-out of sessions.
#[derive(Clone)]
pub struct SessionManager {
    backend: SupabaseClient,
    store: Arc<dyn KvStore>,
    sessions: Cache<String, Session>,
    login_attempts: Cache<String, AuthState>,
}

impl SessionManager {
    pub fn new(backend: SupabaseClient, store: Arc<dyn KvStore>) -> Self {
        Self {
            backend,
            store,
            sessions: Cache::builder().max_capacity(10_000).build(),
            // Last outcome per e-mail, kept long enough to answer the form
            login_attempts: Cache::builder()
                .time_to_live(Duration::from_secs(300))
                .max_capacity(10_000)
                .build(),
        }
    }

    /// Signs a user in and persists the session.
    pub async fn login(&self, email: &str, password: &str) -> Result<Session, AppError> {
        let email = email.trim().to_lowercase();
        if !is_valid_email(&email) || password.is_empty() {
            return Err(AppError::BadRequest(
                "Informe um e-mail válido e a senha".to_string(),
            ));
        }

        self.begin_attempt(&email).await?;
        tracing::info!("Login started for {}", email);

        // Detached: the attempt settles even if this future is dropped
        let manager = self.clone();
        let password = password.to_string();
        tokio::spawn(async move { manager.finish_attempt(&email, &password).await })
            .await
            .map_err(|e| AppError::InternalError(format!("Login task failed: {}", e)))?
    }

    /// Moves the e-mail's attempt to `Authenticating` in one atomic step.
    async fn begin_attempt(&self, email: &str) -> Result<(), AppError> {
        let mut rejected = None;
        self.login_attempts
            .entry(email.to_string())
            .and_compute_with(|current| {
                let previous = current.map(|entry| entry.into_value()).unwrap_or_default();
                let op = match previous.start_login() {
                    Ok(next) => Op::Put(next),
                    Err(e) => {
                        rejected = Some(e);
                        Op::Nop
                    }
                };
                std::future::ready(op)
            })
            .await;

        match rejected {
            Some(e) => {
                tracing::warn!("Login for {} rejected: attempt already in flight", email);
                Err(e)
            }
            None => Ok(()),
        }
    }

    async fn finish_attempt(&self, email: &str, password: &str) -> Result<Session, AppError> {
        match self.authenticate(email, password).await {
            Ok(session) => {
                let state = AuthState::Authenticating.login_succeeded(session.clone())?;
                self.login_attempts.insert(email.to_string(), state).await;
                tracing::info!(
                    "✓ {} signed in as seller {} ({:?})",
                    email,
                    session.user.codigo_vendedor,
                    session.user.role
                );
                Ok(session)
            }
            Err(e) => {
                let message = match e.root() {
                    AppError::InvalidCredentials(msg) => msg.clone(),
                    AppError::BackendError(_) => "Erro de conexão. Tente novamente.".to_string(),
                    other => other.to_string(),
                };
                self.login_attempts
                    .insert(
                        email.to_string(),
                        AuthState::Authenticating.login_failed(message),
                    )
                    .await;
                tracing::warn!("Login failed for {}: {}", email, e);
                Err(e)
            }
        }
    }

    async fn authenticate(&self, email: &str, password: &str) -> Result<Session, AppError> {
        let grant = self.backend.sign_in_with_password(email, password).await?;
        let user = sellers::profile(&self.backend, &grant.access_token, &grant.user.id).await?;

        let session = Session {
            token: uuid::Uuid::new_v4().simple().to_string(),
            user,
            access_token: grant.access_token,
            created_at: Utc::now(),
        };

        let sealed = cache_validator::seal(&session)?;
        self.store.set(&session_key(&session.token), &sealed).await?;
        self.sessions
            .insert(session.token.clone(), session.clone())
            .await;
        Ok(session)
    }

    /// Outcome of the latest login attempt for an e-mail.
    pub async fn login_state(&self, email: &str) -> AuthState {
        self.login_attempts
            .get(&email.trim().to_lowercase())
            .await
            .unwrap_or_default()
    }

    /// Looks a session up in memory, then in the persistent store.
    pub async fn restore(&self, token: &str) -> Result<Option<Session>, AppError> {
        if let Some(session) = self.sessions.get(token).await {
            return Ok(Some(session));
        }

        let Some(stored) = self.store.get(&session_key(token)).await? else {
            return Ok(None);
        };

        match cache_validator::open::<Session>(&stored) {
            Some(session) if session.token == token => {
                tracing::debug!(
                    "Restored stored session for seller {}",
                    session.user.codigo_vendedor
                );
                self.sessions.insert(token.to_string(), session.clone()).await;
                Ok(Some(session))
            }
            _ => {
                tracing::warn!("Discarding invalid stored session payload");
                self.store.remove(&session_key(token)).await?;
                Ok(None)
            }
        }
    }

    /// State of the session identified by `token`.
    pub async fn state(&self, token: &str) -> Result<AuthState, AppError> {
        Ok(match self.restore(token).await? {
            Some(session) => AuthState::Authenticated(session),
            None => AuthState::default(),
        })
    }

    /// Drops the session from memory and from the persistent store.
    pub async fn logout(&self, token: &str) -> Result<AuthState, AppError> {
        let state = self.state(token).await?;
        self.sessions.invalidate(token).await;
        self.store.remove(&session_key(token)).await?;
        if let Some(session) = state.session() {
            tracing::info!("Seller {} signed out", session.user.codigo_vendedor);
        }
        Ok(state.logout())
    }
}
