//! Contract with the hosted auth provider.
//!
//! Everything behind this trait is a black box to the rest of the crate: the
//! provider owns user records, issues sessions and sends the emails that start
//! the confirmation, magic-link and recovery flows.

use chrono::Utc;
use futures::future::LocalBoxFuture;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Session {
    pub access_token: String,
    #[serde(skip_serializing)]
    pub refresh_token: String,
    /// Unix timestamp (seconds) after which the access token is rejected.
    pub expires_at: i64,
    pub user: User,
}

impl Session {
    pub fn is_expired(&self) -> bool {
        self.expires_at <= Utc::now().timestamp()
    }
}

/// Events emitted whenever the session of a browser changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuthEvent {
    SignedIn,
    SignedOut,
    TokenRefreshed,
    PasswordRecovery,
    UserUpdated,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

/// Result of a sign up: the session is absent until the email is confirmed.
#[derive(Debug, Clone)]
pub struct SignUp {
    pub user: Option<User>,
    pub session: Option<Session>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProviderError {
    pub status: Option<u16>,
    pub code: Option<String>,
    pub message: String,
}

impl ProviderError {
    pub fn new<S: Into<String>>(status: Option<u16>, message: S) -> ProviderError {
        ProviderError {
            status,
            code: None,
            message: message.into(),
        }
    }
}

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ProviderError {}

pub type ProviderResult<'a, T> = LocalBoxFuture<'a, Result<T, ProviderError>>;

/// The subset of the hosted auth API this service relies on.
///
/// `code_challenge` arguments carry a PKCE challenge for flows that come back
/// through `/callback` with an exchangeable code.
pub trait AuthProvider {
    fn exchange_code_for_session<'a>(
        &'a self,
        code: &'a str,
        code_verifier: Option<&'a str>,
    ) -> ProviderResult<'a, Session>;

    fn get_user<'a>(&'a self, access_token: &'a str) -> ProviderResult<'a, User>;

    fn refresh_session<'a>(&'a self, refresh_token: &'a str) -> ProviderResult<'a, Session>;

    fn sign_in_with_password<'a>(&'a self, credentials: &'a Credentials)
        -> ProviderResult<'a, Session>;

    fn sign_up<'a>(
        &'a self,
        credentials: &'a Credentials,
        redirect_to: &'a str,
        code_challenge: &'a str,
    ) -> ProviderResult<'a, SignUp>;

    fn sign_in_with_otp<'a>(
        &'a self,
        email: &'a str,
        redirect_to: &'a str,
        code_challenge: &'a str,
    ) -> ProviderResult<'a, ()>;

    fn reset_password_for_email<'a>(
        &'a self,
        email: &'a str,
        redirect_to: &'a str,
        code_challenge: &'a str,
    ) -> ProviderResult<'a, ()>;

    fn update_password<'a>(&'a self, access_token: &'a str, password: &'a str)
        -> ProviderResult<'a, User>;

    fn sign_out<'a>(&'a self, access_token: &'a str) -> ProviderResult<'a, ()>;

    /// URL the browser is sent to in order to start an OAuth sign in.
    fn authorize_url(&self, provider: &str, redirect_to: &str, code_challenge: &str) -> String;
}

#[cfg(test)]
pub mod fake {
    //! In-memory provider used by the test suites.

    use super::*;
    use actix_rt::time::delay_for;
    use futures::future::{self, FutureExt};
    use std::cell::RefCell;
    use std::time::Duration;

    pub const GOOD_CODE: &str = "good-code";
    pub const GOOD_PASSWORD: &str = "hunter22";

    pub fn session_for(user_id: &str, expires_in: i64) -> Session {
        Session {
            access_token: format!("access-{}", user_id),
            refresh_token: format!("refresh-{}", user_id),
            expires_at: Utc::now().timestamp() + expires_in,
            user: User {
                id: user_id.to_owned(),
                email: Some(format!("{}@example.com", user_id)),
                phone: None,
            },
        }
    }

    #[derive(Default)]
    pub struct FakeProvider {
        /// Every provider call, in order, by method name.
        pub calls: RefCell<Vec<&'static str>>,
        /// Verifier seen by the last code exchange.
        pub last_verifier: RefCell<Option<String>>,
        /// How long a refresh takes; rejections take twice as long.
        pub refresh_delay: Option<Duration>,
        /// Refresh tokens are single use, like the real thing.
        pub spent_refresh_tokens: RefCell<Vec<String>>,
    }

    impl FakeProvider {
        pub fn called(&self, name: &str) -> bool {
            self.calls.borrow().iter().any(|c| *c == name)
        }

        fn record(&self, name: &'static str) {
            self.calls.borrow_mut().push(name);
        }
    }

    fn rejected<'a, T: 'a>(message: &str) -> ProviderResult<'a, T> {
        future::ready(Err(ProviderError::new(Some(400), message))).boxed_local()
    }

    fn ok<'a, T: 'a>(value: T) -> ProviderResult<'a, T> {
        future::ready(Ok(value)).boxed_local()
    }

    impl AuthProvider for FakeProvider {
        fn exchange_code_for_session<'a>(
            &'a self,
            code: &'a str,
            code_verifier: Option<&'a str>,
        ) -> ProviderResult<'a, Session> {
            self.record("exchange_code_for_session");
            *self.last_verifier.borrow_mut() = code_verifier.map(str::to_owned);

            if code == GOOD_CODE {
                ok(session_for("user-1", 3600))
            } else {
                rejected("invalid flow state, no valid flow state found")
            }
        }

        fn get_user<'a>(&'a self, access_token: &'a str) -> ProviderResult<'a, User> {
            self.record("get_user");
            match access_token.strip_prefix("access-") {
                Some(id) => ok(session_for(id, 0).user),
                None => future::ready(Err(ProviderError::new(Some(401), "invalid JWT")))
                    .boxed_local(),
            }
        }

        fn refresh_session<'a>(&'a self, refresh_token: &'a str) -> ProviderResult<'a, Session> {
            self.record("refresh_session");

            let spent = self.spent_refresh_tokens.borrow().iter().any(|t| t == refresh_token);
            self.spent_refresh_tokens
                .borrow_mut()
                .push(refresh_token.to_owned());

            let result = match refresh_token.strip_prefix("refresh-") {
                Some(rest) if !spent => {
                    let mut session = session_for(rest.trim_end_matches('+'), 3600);
                    session.refresh_token = format!("{}+", refresh_token);
                    Ok(session)
                }
                _ => Err(ProviderError::new(Some(400), "Invalid Refresh Token")),
            };

            let delay = self.refresh_delay.map(|d| if result.is_ok() { d } else { d * 2 });
            async move {
                if let Some(delay) = delay {
                    delay_for(delay).await;
                }
                result
            }
            .boxed_local()
        }

        fn sign_in_with_password<'a>(
            &'a self,
            credentials: &'a Credentials,
        ) -> ProviderResult<'a, Session> {
            self.record("sign_in_with_password");
            if credentials.password == GOOD_PASSWORD {
                ok(session_for("user-1", 3600))
            } else {
                rejected("Invalid login credentials")
            }
        }

        fn sign_up<'a>(
            &'a self,
            credentials: &'a Credentials,
            _redirect_to: &'a str,
            _code_challenge: &'a str,
        ) -> ProviderResult<'a, SignUp> {
            self.record("sign_up");
            ok(SignUp {
                user: Some(User {
                    id: "user-2".to_owned(),
                    email: Some(credentials.email.clone()),
                    phone: None,
                }),
                session: None,
            })
        }

        fn sign_in_with_otp<'a>(
            &'a self,
            _email: &'a str,
            _redirect_to: &'a str,
            _code_challenge: &'a str,
        ) -> ProviderResult<'a, ()> {
            self.record("sign_in_with_otp");
            ok(())
        }

        fn reset_password_for_email<'a>(
            &'a self,
            _email: &'a str,
            _redirect_to: &'a str,
            _code_challenge: &'a str,
        ) -> ProviderResult<'a, ()> {
            self.record("reset_password_for_email");
            ok(())
        }

        fn update_password<'a>(
            &'a self,
            access_token: &'a str,
            _password: &'a str,
        ) -> ProviderResult<'a, User> {
            self.record("update_password");
            self.get_user(access_token)
        }

        fn sign_out<'a>(&'a self, _access_token: &'a str) -> ProviderResult<'a, ()> {
            self.record("sign_out");
            ok(())
        }

        fn authorize_url(&self, provider: &str, redirect_to: &str, code_challenge: &str) -> String {
            format!(
                "https://auth.example.com/authorize?provider={}&redirect_to={}&code_challenge={}",
                provider, redirect_to, code_challenge
            )
        }
    }
}
