//! Session access for collection views
//!
//! Views never reach into ambient state for the signed-in user: a
//! [`SessionProvider`] is handed to them at construction. Until the provider
//! reports a ready user no `list` or mutation call is issued.

use crate::core::error::CollectionError;
use async_trait::async_trait;
use tokio::sync::watch;

/// Authentication state as seen by a view
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    /// The auth backend has not answered yet
    Loading,

    /// Nobody is signed in
    SignedOut,

    /// A user is signed in; remote data is scoped to them
    SignedIn { user_id: String },
}

impl SessionState {
    /// Get user_id if available
    pub fn user_id(&self) -> Option<&str> {
        match self {
            SessionState::SignedIn { user_id } => Some(user_id),
            _ => None,
        }
    }

    pub fn is_loading(&self) -> bool {
        matches!(self, SessionState::Loading)
    }

    /// The user remote calls may be issued for
    pub fn ready_user(&self) -> Option<&str> {
        if self.is_loading() {
            None
        } else {
            self.user_id()
        }
    }
}

/// Trait for session providers
#[async_trait]
pub trait SessionProvider: Send + Sync {
    /// Current state
    fn current(&self) -> SessionState;

    /// Receiver notified on every state change
    fn subscribe(&self) -> watch::Receiver<SessionState>;

    /// End the session
    async fn logout(&self) -> Result<(), CollectionError>;
}

/// Session held in a watch channel, updated by whoever owns authentication
#[derive(Debug, Clone)]
pub struct SharedSession {
    sender: watch::Sender<SessionState>,
}

impl SharedSession {
    pub fn new(initial: SessionState) -> Self {
        let (sender, _) = watch::channel(initial);
        Self { sender }
    }

    /// A session that starts in `Loading`
    pub fn loading() -> Self {
        Self::new(SessionState::Loading)
    }

    pub fn signed_in(user_id: impl Into<String>) -> Self {
        Self::new(SessionState::SignedIn {
            user_id: user_id.into(),
        })
    }

    pub fn sign_in(&self, user_id: impl Into<String>) {
        self.sender.send_replace(SessionState::SignedIn {
            user_id: user_id.into(),
        });
    }

    pub fn set_loading(&self) {
        self.sender.send_replace(SessionState::Loading);
    }
}

impl Default for SharedSession {
    fn default() -> Self {
        Self::loading()
    }
}

#[async_trait]
impl SessionProvider for SharedSession {
    fn current(&self) -> SessionState {
        self.sender.borrow().clone()
    }

    fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.sender.subscribe()
    }

    async fn logout(&self) -> Result<(), CollectionError> {
        self.sender.send_replace(SessionState::SignedOut);
        Ok(())
    }
}
