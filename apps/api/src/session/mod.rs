//! Session provider: wraps the hosted auth provider.
//!
//! Sessions are never stored here: every request carries the provider-issued
//! access token, which is verified on the way in. Sign-in and sign-out are
//! broadcast as [`AuthEvent`]s so session-scoped state (role resolvers) can be
//! constructed and torn down alongside the session. Sessions that expire
//! without an explicit sign-out are swept and announced as `SignedOut` too.

pub mod client;
pub mod extract;
pub mod handlers;

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::info;
use uuid::Uuid;

const EVENT_CHANNEL_CAPACITY: usize = 64;

/// How often sessions that expired without signing out are swept.
pub const SESSION_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SessionUser {
    pub id: Uuid,
    pub email: Option<String>,
    pub metadata: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Session {
    #[serde(skip_serializing)]
    pub access_token: String,
    pub user: SessionUser,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AuthEvent {
    SignedIn(SessionUser),
    SignedOut(Uuid),
}

#[derive(Debug, Error)]
pub enum AuthClientError {
    #[error("invalid access token: {0}")]
    InvalidToken(String),

    #[error("access token expired")]
    Expired,

    #[error("unsupported identity provider: {0}")]
    UnsupportedProvider(String),

    #[error("auth provider returned {status}: {message}")]
    Provider { status: u16, message: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Operations consumed from the auth provider.
#[async_trait]
pub trait AuthClient: Send + Sync {
    fn verify(&self, access_token: &str) -> Result<Session, AuthClientError>;

    /// URL the browser is sent to for redirect-based sign-in with an external identity provider.
    fn sign_in_url(&self, provider: &str, redirect_to: &str) -> Result<String, AuthClientError>;

    async fn sign_out(&self, access_token: &str) -> Result<(), AuthClientError>;
}

#[derive(Clone)]
pub struct SessionProvider {
    client: Arc<dyn AuthClient>,
    events: broadcast::Sender<AuthEvent>,
    /// Signed-in users and the instant their latest token expires.
    active: Arc<Mutex<HashMap<Uuid, Instant>>>,
}

impl SessionProvider {
    pub fn new(client: Arc<dyn AuthClient>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            client,
            events,
            active: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Verifies the access token. The first verified session for a user emits `SignedIn`.
    pub fn current_session(&self, access_token: &str) -> Result<Session, AuthClientError> {
        let session = self.client.verify(access_token)?;
        let ttl = (session.expires_at - Utc::now()).to_std().unwrap_or_default();
        let deadline = Instant::now() + ttl;

        let newly_active = {
            let mut active = self.active.lock().unwrap_or_else(PoisonError::into_inner);
            match active.get_mut(&session.user.id) {
                Some(current) => {
                    // A refreshed token extends the session.
                    *current = (*current).max(deadline);
                    false
                }
                None => {
                    active.insert(session.user.id, deadline);
                    true
                }
            }
        };
        if newly_active {
            info!(user_id = %session.user.id, "Session became available");
            // No subscribers is fine.
            let _ = self.events.send(AuthEvent::SignedIn(session.user.clone()));
        }
        Ok(session)
    }

    pub fn sign_in_url(&self, provider: &str, redirect_to: &str) -> Result<String, AuthClientError> {
        self.client.sign_in_url(provider, redirect_to)
    }

    pub async fn sign_out(&self, session: &Session) -> Result<(), AuthClientError> {
        self.client.sign_out(&session.access_token).await?;
        self.active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&session.user.id);
        info!(user_id = %session.user.id, "Signed out");
        let _ = self.events.send(AuthEvent::SignedOut(session.user.id));
        Ok(())
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
        self.events.subscribe()
    }

    /// Forgets sessions whose token has expired and emits `SignedOut` for each.
    pub fn expire_sessions(&self) -> Vec<Uuid> {
        let now = Instant::now();
        let mut expired = Vec::new();
        self.active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|user_id, deadline| {
                if *deadline <= now {
                    expired.push(*user_id);
                    false
                } else {
                    true
                }
            });

        for user_id in &expired {
            info!(%user_id, "Session expired");
            let _ = self.events.send(AuthEvent::SignedOut(*user_id));
        }
        expired
    }

    pub fn spawn_expiry_sweep(&self, every: Duration) -> JoinHandle<()> {
        let provider = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                provider.expire_sessions();
            }
        })
    }
}
