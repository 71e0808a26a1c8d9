//! Session state: who is logged in, and as what role.
//!
//! The session is persisted in a [`SessionStore`] so it survives restarts,
//! and every transition is published two ways:
//!
//! - locally, on a `tokio::sync::watch` channel that components subscribe to
//!   (the cart synchronizer reloads or clears from it);
//! - to other tabs, on a [`SessionBus`]. A tab that hears about a change it did
//!   not make re-reads the shared store and republishes locally.
//!
//! The presence of the user id is the only authentication predicate.

mod store;

use std::sync::{Arc, Weak};

use secrecy::ExposeSecret;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{debug, instrument};
use uuid::Uuid;

use shopfront_core::{Credentials, Role, UserId};

pub use store::{Change, FileStore, MemoryStore, SessionStore, StoreError};

/// Storage keys for session fields.
pub mod keys {
    /// Key for the authenticated user's id.
    pub const USER_ID: &str = "userId";

    /// Key for the display name.
    pub const USERNAME: &str = "username";

    /// Key for the user's role.
    pub const ROLE: &str = "role";

    /// Key for the basic-auth username.
    pub const CREDENTIALS_USERNAME: &str = "credentials.username";

    /// Key for the basic-auth secret.
    pub const CREDENTIALS_SECRET: &str = "credentials.secret";

    /// Every session key, in write order.
    pub const ALL: [&str; 5] = [
        USER_ID,
        USERNAME,
        ROLE,
        CREDENTIALS_USERNAME,
        CREDENTIALS_SECRET,
    ];
}

/// A point-in-time view of the session.
#[derive(Debug, Clone, Default)]
pub struct SessionSnapshot {
    /// Present iff the user is authenticated.
    pub user_id: Option<UserId>,
    /// Display name.
    pub username: Option<String>,
    /// Stored role. `None` when unset or unrecognized.
    pub role: Option<Role>,
    /// Credentials attached to backend requests.
    pub credentials: Option<Credentials>,
}

impl SessionSnapshot {
    /// Whether a user is logged in.
    #[must_use]
    pub const fn is_authenticated(&self) -> bool {
        self.user_id.is_some()
    }

    /// The role that gates operations. Only meaningful when authenticated.
    #[must_use]
    pub fn effective_role(&self) -> Option<Role> {
        self.user_id.as_ref().and(self.role)
    }

    /// Whether this is an authenticated customer session, the only kind that
    /// owns a cart.
    #[must_use]
    pub fn is_customer(&self) -> bool {
        self.effective_role().is_some_and(Role::is_customer)
    }

    /// Role to show in the UI. An unset role displays as customer but grants
    /// nothing; use [`Self::effective_role`] for gating.
    #[must_use]
    pub fn display_role(&self) -> Role {
        self.role.unwrap_or_default()
    }

    fn read(store: &dyn SessionStore) -> Self {
        let mut entries = store.read_all();
        let user_id = entries.remove(keys::USER_ID).map(UserId::new);
        let username = entries.remove(keys::USERNAME);
        let role = entries.remove(keys::ROLE).and_then(|raw| {
            raw.parse::<Role>()
                .inspect_err(|e| debug!(error = %e, "Stored role not recognized"))
                .ok()
        });
        let credentials = match (
            entries.remove(keys::CREDENTIALS_USERNAME),
            entries.remove(keys::CREDENTIALS_SECRET),
        ) {
            (Some(username), Some(secret)) => Some(Credentials::new(username, secret)),
            _ => None,
        };

        Self {
            user_id,
            username,
            role,
            credentials,
        }
    }
}

// =============================================================================
// SessionBus
// =============================================================================

/// What happened to the session in another tab.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEventKind {
    SignedIn,
    SignedOut,
}

/// A cross-tab notification. Carries no session data: listeners re-read the
/// shared store.
#[derive(Debug, Clone, Copy)]
pub struct SessionEvent {
    /// Tab that made the change.
    pub origin: Uuid,
    /// Kind of change.
    pub kind: SessionEventKind,
}

/// Cross-tab notification channel.
///
/// Tabs that share a store should share a bus (clone it).
#[derive(Debug, Clone)]
pub struct SessionBus {
    tx: broadcast::Sender<SessionEvent>,
}

impl SessionBus {
    /// Create a bus buffering up to `capacity` unread events per listener.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    fn notify(&self, event: SessionEvent) {
        // No listeners is fine: there may be no other tab.
        let _ = self.tx.send(event);
    }
}

impl Default for SessionBus {
    fn default() -> Self {
        Self::new(16)
    }
}

// =============================================================================
// SessionState
// =============================================================================

/// Handle to the session of one tab.
///
/// Cheap to clone; clones share the same tab identity and watch channel.
#[derive(Clone)]
pub struct SessionState {
    inner: Arc<SessionStateInner>,
}

struct SessionStateInner {
    store: Arc<dyn SessionStore>,
    tab_id: Uuid,
    tx: watch::Sender<SessionSnapshot>,
    bus: Option<SessionBus>,
}

impl SessionState {
    /// Open the session persisted in `store`, without cross-tab notifications.
    #[must_use]
    pub fn new(store: Arc<dyn SessionStore>) -> Self {
        Self::build(store, None)
    }

    /// Open the session persisted in `store` and announce changes on `bus`.
    ///
    /// Call [`Self::spawn_cross_tab_listener`] to also react to other tabs.
    #[must_use]
    pub fn with_bus(store: Arc<dyn SessionStore>, bus: SessionBus) -> Self {
        Self::build(store, Some(bus))
    }

    fn build(store: Arc<dyn SessionStore>, bus: Option<SessionBus>) -> Self {
        let (tx, _) = watch::channel(SessionSnapshot::read(store.as_ref()));
        Self {
            inner: Arc::new(SessionStateInner {
                store,
                tab_id: Uuid::new_v4(),
                tx,
                bus,
            }),
        }
    }

    /// Identity of this tab on the bus.
    #[must_use]
    pub fn tab_id(&self) -> Uuid {
        self.inner.tab_id
    }

    /// Persist a new session. The user is authenticated from this instant.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be written; nothing is published
    /// in that case.
    #[instrument(skip(self, credentials), fields(tab = %self.inner.tab_id))]
    pub fn set_session(
        &self,
        user_id: &UserId,
        username: &str,
        role: Role,
        credentials: &Credentials,
    ) -> Result<(), StoreError> {
        self.inner.store.write(&[
            (keys::USER_ID, Some(user_id.to_string())),
            (keys::USERNAME, Some(username.to_string())),
            (keys::ROLE, Some(role.as_str().to_string())),
            (
                keys::CREDENTIALS_USERNAME,
                Some(credentials.username().to_string()),
            ),
            (
                keys::CREDENTIALS_SECRET,
                Some(credentials.secret().expose_secret().to_string()),
            ),
        ])?;

        debug!(role = %role, "Session set");
        self.publish(SessionEventKind::SignedIn);
        Ok(())
    }

    /// Remove every session field. Authentication ends immediately.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be written.
    #[instrument(skip(self), fields(tab = %self.inner.tab_id))]
    pub fn clear_session(&self) -> Result<(), StoreError> {
        let batch: Vec<Change<'_>> = keys::ALL.iter().map(|key| (*key, None)).collect();
        self.inner.store.write(&batch)?;

        debug!("Session cleared");
        self.publish(SessionEventKind::SignedOut);
        Ok(())
    }

    /// Read the persisted session.
    #[must_use]
    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot::read(self.inner.store.as_ref())
    }

    /// The authenticated user's id, if any.
    #[must_use]
    pub fn current_user_id(&self) -> Option<UserId> {
        self.snapshot().user_id
    }

    /// The authenticated user's role, if any.
    #[must_use]
    pub fn current_role(&self) -> Option<Role> {
        self.snapshot().effective_role()
    }

    /// Credentials for outgoing requests, if any.
    #[must_use]
    pub fn credentials(&self) -> Option<Credentials> {
        self.snapshot().credentials
    }

    /// Observe session transitions. The receiver starts at the current value.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.inner.tx.subscribe()
    }

    /// Re-read the store and publish locally, without notifying other tabs.
    pub fn reload(&self) {
        self.inner
            .tx
            .send_replace(SessionSnapshot::read(self.inner.store.as_ref()));
    }

    fn publish(&self, kind: SessionEventKind) {
        self.reload();
        if let Some(bus) = &self.inner.bus {
            bus.notify(SessionEvent {
                origin: self.inner.tab_id,
                kind,
            });
        }
    }

    /// Start reacting to session changes made by other tabs on the bus.
    ///
    /// Returns `None` when this session has no bus. The task ends when every
    /// handle to this session is dropped or the bus closes.
    #[must_use]
    pub fn spawn_cross_tab_listener(&self) -> Option<JoinHandle<()>> {
        let mut rx = self.inner.bus.as_ref()?.tx.subscribe();
        let weak: Weak<SessionStateInner> = Arc::downgrade(&self.inner);
        let tab_id = self.inner.tab_id;

        Some(tokio::spawn(async move {
            loop {
                let event = match rx.recv().await {
                    Ok(event) => Some(event),
                    // Missed events still mean something changed.
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        debug!(skipped, "Cross-tab listener lagged");
                        None
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                };

                if event.is_some_and(|e| e.origin == tab_id) {
                    continue;
                }

                let Some(inner) = weak.upgrade() else {
                    break;
                };
                debug!(tab = %tab_id, ?event, "Session changed in another tab");
                SessionState { inner }.reload();
            }
        }))
    }
}

impl std::fmt::Debug for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionState")
            .field("tab_id", &self.inner.tab_id)
            .field("authenticated", &self.inner.tx.borrow().is_authenticated())
            .finish_non_exhaustive()
    }
}
