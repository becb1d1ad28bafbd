//! Waiting for a session when the redirect carried nothing to exchange.
//!
//! Three sources race: the browser's auth events, one session poll after a
//! short delay, and a hard deadline. The first to produce an answer decides
//! where the browser goes; the event subscription is dropped with the race.

use actix_rt::time::delay_for;
use futures::{pin_mut, select, FutureExt, StreamExt};
use std::sync::Arc;

use super::callback::{Destination, LoginError};
use super::provider::{AuthEvent, AuthProvider};
use super::session::SessionStore;
use crate::config::CallbackTiming;

pub async fn await_session(
    store: &Arc<SessionStore>,
    provider: &dyn AuthProvider,
    timing: CallbackTiming,
    recovery_hint: bool,
) -> Destination {
    let signed_in = if recovery_hint {
        Destination::ResetPassword
    } else {
        Destination::Home
    };

    let mut events = store.subscribe();

    let poll = async {
        delay_for(timing.poll_delay).await;
        store.current_session(provider).await
    }
    .fuse();
    let deadline = delay_for(timing.timeout).fuse();
    pin_mut!(poll, deadline);

    loop {
        select! {
            event = events.next() => match event {
                Some(AuthEvent::PasswordRecovery) => return Destination::ResetPassword,
                Some(AuthEvent::SignedIn) | Some(AuthEvent::TokenRefreshed) => {
                    return signed_in;
                }
                Some(other) => debug!("Ignoring {:?} while awaiting a session", other),
                // The store only closes senders on unsubscribe, which can't
                // happen while we hold the subscription; wait out the deadline.
                None => {}
            },
            session = poll => {
                if session.is_some() {
                    return signed_in;
                }
                debug!("No session yet; still listening for events");
            },
            _ = deadline => {
                info!("No session appeared within {:?}", timing.timeout);
                return Destination::Login(LoginError::NoSession);
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::provider::fake::{session_for, FakeProvider};
    use std::time::Duration;

    fn timing() -> CallbackTiming {
        CallbackTiming {
            poll_delay: Duration::from_millis(50),
            timeout: Duration::from_millis(300),
        }
    }

    #[actix_rt::test]
    async fn gives_up_with_no_session() {
        let store = SessionStore::new();
        let provider = FakeProvider::default();

        let d = await_session(&store, &provider, timing(), false).await;

        assert_eq!(d, Destination::Login(LoginError::NoSession));
        assert_eq!(d.location(), "/login?error=no_session");
        assert_eq!(store.subscriber_count(), 0);
    }

    #[actix_rt::test]
    async fn gives_up_after_the_default_two_seconds() {
        let store = SessionStore::new();
        let provider = FakeProvider::default();
        let started = std::time::Instant::now();

        let d = await_session(&store, &provider, CallbackTiming::default(), false).await;

        assert_eq!(d, Destination::Login(LoginError::NoSession));
        assert!(started.elapsed() >= Duration::from_millis(2000));
    }

    #[actix_rt::test]
    async fn existing_session_is_found_by_the_poll() {
        let store = SessionStore::new();
        store.set_session(AuthEvent::SignedIn, session_for("u1", 3600));
        let provider = FakeProvider::default();

        let d = await_session(&store, &provider, timing(), false).await;
        assert_eq!(d, Destination::Home);

        let d = await_session(&store, &provider, timing(), true).await;
        assert_eq!(d, Destination::ResetPassword);
    }

    #[actix_rt::test]
    async fn recovery_event_wins_before_the_poll() {
        let store = SessionStore::new();
        let provider = FakeProvider::default();
        let slow_poll = CallbackTiming {
            poll_delay: Duration::from_millis(250),
            timeout: Duration::from_millis(500),
        };

        let publisher = Arc::clone(&store);
        actix_rt::spawn(async move {
            delay_for(Duration::from_millis(20)).await;
            publisher.set_session(AuthEvent::PasswordRecovery, session_for("u1", 3600));
        });

        let d = await_session(&store, &provider, slow_poll, false).await;
        assert_eq!(d, Destination::ResetPassword);
        assert!(!provider.called("refresh_session"));
        assert_eq!(store.subscriber_count(), 0);
    }

    #[actix_rt::test]
    async fn sign_in_after_an_empty_poll_still_counts() {
        let store = SessionStore::new();
        let provider = FakeProvider::default();

        let publisher = Arc::clone(&store);
        actix_rt::spawn(async move {
            delay_for(Duration::from_millis(150)).await;
            publisher.set_session(AuthEvent::SignedIn, session_for("u1", 3600));
        });

        let d = await_session(&store, &provider, timing(), false).await;
        assert_eq!(d, Destination::Home);
    }

    #[actix_rt::test]
    async fn sign_out_events_are_ignored() {
        let store = SessionStore::new();
        let provider = FakeProvider::default();

        let publisher = Arc::clone(&store);
        actix_rt::spawn(async move {
            delay_for(Duration::from_millis(10)).await;
            publisher.clear();
        });

        let d = await_session(&store, &provider, timing(), false).await;
        assert_eq!(d, Destination::Login(LoginError::NoSession));
    }
}
