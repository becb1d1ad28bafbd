//! Per-browser session state.
//!
//! Each browser is identified by an opaque nonce in the `malty-sid` cookie and
//! owns one [`SessionStore`]. Stores publish an [`AuthEvent`] every time their
//! session changes; interested parties hold a [`Subscription`] which
//! unsubscribes itself when dropped.

use actix_web::cookie::SameSite;
use actix_web::http::Cookie;
use actix_web::{HttpMessage, HttpRequest};
use futures::channel::mpsc::{self, UnboundedReceiver, UnboundedSender};
use futures::stream::{FusedStream, Stream};
use std::collections::HashMap;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::task::{Context, Poll};
use std::time::{Duration, Instant};
use textnonce::TextNonce;

use super::provider::{AuthEvent, AuthProvider, Credentials, ProviderError, Session, SignUp, User};

pub const SESSION_COOKIE: &str = "malty-sid";

/// What the rest of the application sees of a browser's auth state.
#[derive(Debug, Clone, Serialize)]
pub struct Snapshot {
    pub user: Option<User>,
    pub session: Option<Session>,
    pub is_loading: bool,
}

struct Inner {
    session: Option<Session>,
    is_loading: bool,
    subscribers: Vec<(u64, UnboundedSender<AuthEvent>)>,
    next_subscriber: u64,
    touched: Instant,
}

pub struct SessionStore {
    inner: Mutex<Inner>,
}

impl SessionStore {
    pub fn new() -> Arc<SessionStore> {
        Arc::new(SessionStore {
            inner: Mutex::new(Inner {
                session: None,
                is_loading: false,
                subscribers: Vec::new(),
                next_subscriber: 0,
                touched: Instant::now(),
            }),
        })
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        inner.touched = Instant::now();
        inner
    }

    pub fn snapshot(&self) -> Snapshot {
        let inner = self.lock();
        Snapshot {
            user: inner.session.as_ref().map(|s| s.user.clone()),
            session: inner.session.clone(),
            is_loading: inner.is_loading,
        }
    }

    pub fn subscribe(self: &Arc<Self>) -> Subscription {
        let (sender, receiver) = mpsc::unbounded();

        let mut inner = self.lock();
        let id = inner.next_subscriber;
        inner.next_subscriber += 1;
        inner.subscribers.push((id, sender));

        Subscription {
            id,
            store: Arc::clone(self),
            receiver,
        }
    }

    fn unsubscribe(&self, id: u64) {
        self.lock().subscribers.retain(|(sid, _)| *sid != id);
    }

    #[cfg(test)]
    pub fn subscriber_count(&self) -> usize {
        self.lock().subscribers.len()
    }

    /// Replace the session and notify subscribers.
    pub fn set_session(&self, event: AuthEvent, session: Session) {
        let mut inner = self.lock();
        inner.session = Some(session);
        inner.is_loading = false;
        publish(&mut inner, event);
    }

    /// Forget the session and notify subscribers.
    pub fn clear(&self) {
        let mut inner = self.lock();
        inner.session = None;
        inner.is_loading = false;
        publish(&mut inner, AuthEvent::SignedOut);
    }

    /// The current session, refreshed through the provider if it has expired.
    ///
    /// A session that can't be refreshed is dropped, unless another request
    /// replaced it while the refresh was in flight.
    pub async fn current_session(&self, provider: &dyn AuthProvider) -> Option<Session> {
        let session = {
            let mut inner = self.lock();
            let session = inner.session.clone()?;
            if !session.is_expired() {
                return Some(session);
            }
            inner.is_loading = true;
            session
        };
        let _loading = Loading(self);

        match provider.refresh_session(&session.refresh_token).await {
            Ok(fresh) => {
                self.set_session(AuthEvent::TokenRefreshed, fresh.clone());
                Some(fresh)
            }
            Err(e) => {
                let replaced = self
                    .lock()
                    .session
                    .clone()
                    .filter(|current| current.refresh_token != session.refresh_token);
                if replaced.is_some() {
                    debug!("Refresh lost a race with another request: {}", e);
                    return replaced;
                }

                info!("Dropping session that could not be refreshed: {}", e);
                self.clear();
                None
            }
        }
    }

    pub async fn sign_in(
        &self,
        provider: &dyn AuthProvider,
        credentials: &Credentials,
    ) -> Result<Session, ProviderError> {
        let session = provider.sign_in_with_password(credentials).await?;
        self.set_session(AuthEvent::SignedIn, session.clone());
        Ok(session)
    }

    pub async fn sign_up(
        &self,
        provider: &dyn AuthProvider,
        credentials: &Credentials,
        redirect_to: &str,
        code_challenge: &str,
    ) -> Result<SignUp, ProviderError> {
        let sign_up = provider
            .sign_up(credentials, redirect_to, code_challenge)
            .await?;

        if let Some(session) = &sign_up.session {
            self.set_session(AuthEvent::SignedIn, session.clone());
        }

        Ok(sign_up)
    }

    /// Always clears the local session, even if the provider can't be told.
    pub async fn sign_out(&self, provider: &dyn AuthProvider) {
        let session = self.lock().session.clone();

        if let Some(session) = session {
            if let Err(e) = provider.sign_out(&session.access_token).await {
                warn!("Provider sign out failed: {}", e);
            }
        }

        self.clear();
    }

    pub async fn reset_password(
        &self,
        provider: &dyn AuthProvider,
        email: &str,
        redirect_to: &str,
        code_challenge: &str,
    ) -> Result<(), ProviderError> {
        provider
            .reset_password_for_email(email, redirect_to, code_challenge)
            .await
    }

    pub async fn update_password(
        &self,
        provider: &dyn AuthProvider,
        password: &str,
    ) -> Result<User, ProviderError> {
        let mut session = self
            .current_session(provider)
            .await
            .ok_or_else(|| ProviderError::new(Some(401), "Auth session missing"))?;

        let user = provider
            .update_password(&session.access_token, password)
            .await?;

        session.user = user.clone();
        self.set_session(AuthEvent::UserUpdated, session);
        Ok(user)
    }

    fn idle_for(&self) -> Option<Duration> {
        let inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        if inner.subscribers.is_empty() {
            Some(inner.touched.elapsed())
        } else {
            None
        }
    }
}

/// Clears `is_loading` however a refresh ends, including being dropped.
struct Loading<'a>(&'a SessionStore);

impl Drop for Loading<'_> {
    fn drop(&mut self) {
        self.0.lock().is_loading = false;
    }
}

fn publish(inner: &mut Inner, event: AuthEvent) {
    debug!("Publishing {:?} to {} subscriber(s)", event, inner.subscribers.len());

    // Receivers that went away without unsubscribing are dropped here.
    inner
        .subscribers
        .retain(|(_, sender)| sender.unbounded_send(event).is_ok());
}

/// Stream of auth events for one store.
pub struct Subscription {
    id: u64,
    store: Arc<SessionStore>,
    receiver: UnboundedReceiver<AuthEvent>,
}

impl Stream for Subscription {
    type Item = AuthEvent;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<AuthEvent>> {
        Pin::new(&mut self.get_mut().receiver).poll_next(cx)
    }
}

impl FusedStream for Subscription {
    fn is_terminated(&self) -> bool {
        self.receiver.is_terminated()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.store.unsubscribe(self.id);
    }
}

/// A browser's store, plus whether its cookie still has to be sent.
///
/// The cookie is only issued once the store holds a session.
pub struct BrowserSession {
    pub key: String,
    pub store: Arc<SessionStore>,
    pub is_new: bool,
}

impl BrowserSession {
    pub fn cookie(&self, secure: bool) -> Option<Cookie<'static>> {
        if !self.is_new || self.store.snapshot().session.is_none() {
            return None;
        }

        Some(
            Cookie::build(SESSION_COOKIE, self.key.clone())
                .path("/")
                .http_only(true)
                .secure(secure)
                .same_site(SameSite::Lax)
                .finish(),
        )
    }
}

/// All live session stores, shared between workers.
#[derive(Default)]
pub struct SessionRegistry {
    stores: Mutex<HashMap<String, Arc<SessionStore>>>,
}

impl SessionRegistry {
    fn stores(&self) -> MutexGuard<'_, HashMap<String, Arc<SessionStore>>> {
        self.stores.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn get(&self, key: &str) -> Option<Arc<SessionStore>> {
        self.stores().get(key).cloned()
    }

    /// The store named by the request's cookie, if the server knows it.
    pub fn existing(&self, req: &HttpRequest) -> Option<Arc<SessionStore>> {
        req.cookie(SESSION_COOKIE)
            .and_then(|c| self.get(c.value()))
    }

    /// The request's store. A browser without a known cookie gets an empty
    /// store under a fresh key that stays out of the registry until
    /// [`keep`](SessionRegistry::keep) is called with a session in it.
    pub fn for_request(&self, req: &HttpRequest) -> BrowserSession {
        if let Some(cookie) = req.cookie(SESSION_COOKIE) {
            if let Some(store) = self.get(cookie.value()) {
                return BrowserSession {
                    key: cookie.value().to_owned(),
                    store,
                    is_new: false,
                };
            }
        }

        BrowserSession {
            key: TextNonce::new().into_string(),
            store: SessionStore::new(),
            is_new: true,
        }
    }

    /// Register a new browser's store once it holds a session.
    pub fn keep(&self, browser: &BrowserSession) {
        if browser.is_new && browser.store.snapshot().session.is_some() {
            self.stores()
                .insert(browser.key.clone(), Arc::clone(&browser.store));
        }
    }

    pub fn remove(&self, key: &str) {
        self.stores().remove(key);
    }

    /// Drop stores nobody has touched for `max_idle`. Returns how many went.
    pub fn prune_idle(&self, max_idle: Duration) -> usize {
        let mut stores = self.stores();
        let before = stores.len();
        stores.retain(|_, store| match store.idle_for() {
            Some(idle) => idle < max_idle,
            None => true,
        });
        before - stores.len()
    }

    pub fn len(&self) -> usize {
        self.stores().len()
    }
}
