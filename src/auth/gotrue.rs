//! [`AuthProvider`] backed by the hosted GoTrue REST API.

use actix_web::client::{Client, ClientRequest, ClientResponse};
use actix_web::error::PayloadError;
use actix_web::http::Method;
use actix_web::web::Bytes;
use chrono::Utc;
use futures::future::FutureExt;
use futures::Stream;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;

use super::pkce::CHALLENGE_METHOD;
use super::provider::{
    AuthProvider, Credentials, ProviderError, ProviderResult, Session, SignUp, User,
};
use crate::config::BackendConfig;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

pub struct GoTrueClient {
    client: Client,
    config: BackendConfig,
}

/// Token grant response.
#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: String,
    expires_in: i64,
    #[serde(default)]
    expires_at: Option<i64>,
    user: User,
}

impl From<TokenResponse> for Session {
    fn from(t: TokenResponse) -> Session {
        Session {
            expires_at: t
                .expires_at
                .unwrap_or_else(|| Utc::now().timestamp() + t.expires_in),
            access_token: t.access_token,
            refresh_token: t.refresh_token,
            user: t.user,
        }
    }
}

/// The API has used several error shapes over time; accept all of them.
#[derive(Deserialize, Default)]
struct ErrorResponse {
    error_code: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
    msg: Option<String>,
    message: Option<String>,
}

impl ErrorResponse {
    fn into_error(self, status: u16) -> ProviderError {
        let error = self.error;
        let message = self
            .msg
            .or(self.error_description)
            .or(self.message)
            .or_else(|| error.clone())
            .unwrap_or_else(|| format!("Auth request failed with status {}", status));

        ProviderError {
            status: Some(status),
            code: self.error_code.or(error),
            message,
        }
    }
}

#[derive(Serialize)]
struct PkceGrant<'a> {
    auth_code: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    code_verifier: Option<&'a str>,
}

#[derive(Serialize)]
struct RefreshGrant<'a> {
    refresh_token: &'a str,
}

#[derive(Serialize)]
struct EmailWithChallenge<'a> {
    email: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    password: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    create_user: Option<bool>,
    code_challenge: &'a str,
    code_challenge_method: &'static str,
}

#[derive(Serialize)]
struct PasswordUpdate<'a> {
    password: &'a str,
}

impl GoTrueClient {
    pub fn new(config: BackendConfig) -> GoTrueClient {
        let client = Client::build().timeout(REQUEST_TIMEOUT).finish();

        GoTrueClient { client, config }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/auth/v1{}", self.config.url, path)
    }

    fn request(&self, method: Method, path: &str) -> ClientRequest {
        self.client
            .request(method, self.endpoint(path))
            .header("apikey", self.config.anon_key.as_str())
    }

    fn with_redirect(path: &str, redirect_to: &str) -> String {
        let query = serde_urlencoded::to_string(&[("redirect_to", redirect_to)])
            .unwrap_or_default();
        format!("{}?{}", path, query)
    }

    async fn send_json<B, T>(&self, request: ClientRequest, body: &B) -> Result<T, ProviderError>
    where
        B: Serialize,
        T: DeserializeOwned,
    {
        let response = request.send_json(body).await.map_err(network_error)?;
        read_response(response).await
    }

    async fn send_empty<B: Serialize>(
        &self,
        request: ClientRequest,
        body: &B,
    ) -> Result<(), ProviderError> {
        let response = request.send_json(body).await.map_err(network_error)?;
        read_response::<_, serde_json::Value>(response)
            .await
            .map(|_| ())
    }
}

fn network_error<E: std::fmt::Display>(e: E) -> ProviderError {
    warn!("Auth provider request failed: {}", e);
    ProviderError::new(None, "Could not reach the authentication service")
}

async fn read_response<S, T>(mut response: ClientResponse<S>) -> Result<T, ProviderError>
where
    S: Stream<Item = Result<Bytes, PayloadError>> + Unpin,
    T: DeserializeOwned,
{
    let status = response.status();
    let body = response.body().await.map_err(network_error)?;

    if !status.is_success() {
        let parsed: ErrorResponse = serde_json::from_slice(&body).unwrap_or_default();
        let error = parsed.into_error(status.as_u16());
        debug!("Auth provider returned {}: {}", status, error);
        return Err(error);
    }

    // Some endpoints reply with an empty body.
    let body: &[u8] = if body.is_empty() { b"null" } else { &body };

    serde_json::from_slice(body).map_err(|e| {
        error!("Unexpected auth provider response: {}", e);
        ProviderError::new(Some(status.as_u16()), "Unexpected response from the authentication service")
    })
}

impl AuthProvider for GoTrueClient {
    fn exchange_code_for_session<'a>(
        &'a self,
        code: &'a str,
        code_verifier: Option<&'a str>,
    ) -> ProviderResult<'a, Session> {
        async move {
            let request = self.request(Method::POST, "/token?grant_type=pkce");
            let grant = PkceGrant {
                auth_code: code,
                code_verifier,
            };

            self.send_json::<_, TokenResponse>(request, &grant)
                .await
                .map(Session::from)
        }
        .boxed_local()
    }

    fn get_user<'a>(&'a self, access_token: &'a str) -> ProviderResult<'a, User> {
        async move {
            let response = self
                .request(Method::GET, "/user")
                .bearer_auth(access_token)
                .send()
                .await
                .map_err(network_error)?;

            read_response(response).await
        }
        .boxed_local()
    }

    fn refresh_session<'a>(&'a self, refresh_token: &'a str) -> ProviderResult<'a, Session> {
        async move {
            let request = self.request(Method::POST, "/token?grant_type=refresh_token");

            self.send_json::<_, TokenResponse>(request, &RefreshGrant { refresh_token })
                .await
                .map(Session::from)
        }
        .boxed_local()
    }

    fn sign_in_with_password<'a>(
        &'a self,
        credentials: &'a Credentials,
    ) -> ProviderResult<'a, Session> {
        async move {
            let request = self.request(Method::POST, "/token?grant_type=password");
            let body = serde_json::json!({
                "email": credentials.email,
                "password": credentials.password,
            });

            self.send_json::<_, TokenResponse>(request, &body)
                .await
                .map(Session::from)
        }
        .boxed_local()
    }

    fn sign_up<'a>(
        &'a self,
        credentials: &'a Credentials,
        redirect_to: &'a str,
        code_challenge: &'a str,
    ) -> ProviderResult<'a, SignUp> {
        async move {
            let request = self.request(Method::POST, &Self::with_redirect("/signup", redirect_to));
            let body = EmailWithChallenge {
                email: &credentials.email,
                password: Some(&credentials.password),
                create_user: None,
                code_challenge,
                code_challenge_method: CHALLENGE_METHOD,
            };

            // With auto-confirm enabled the reply is a full session, otherwise
            // just the (unconfirmed) user.
            let value: serde_json::Value = self.send_json(request, &body).await?;
            if value.get("access_token").is_some() {
                let token: TokenResponse = serde_json::from_value(value).map_err(|e| {
                    ProviderError::new(None, format!("Unexpected sign up response: {}", e))
                })?;
                let session = Session::from(token);

                Ok(SignUp {
                    user: Some(session.user.clone()),
                    session: Some(session),
                })
            } else {
                Ok(SignUp {
                    user: serde_json::from_value(value).ok(),
                    session: None,
                })
            }
        }
        .boxed_local()
    }

    fn sign_in_with_otp<'a>(
        &'a self,
        email: &'a str,
        redirect_to: &'a str,
        code_challenge: &'a str,
    ) -> ProviderResult<'a, ()> {
        async move {
            let request = self.request(Method::POST, &Self::with_redirect("/otp", redirect_to));
            let body = EmailWithChallenge {
                email,
                password: None,
                create_user: Some(true),
                code_challenge,
                code_challenge_method: CHALLENGE_METHOD,
            };

            self.send_empty(request, &body).await
        }
        .boxed_local()
    }

    fn reset_password_for_email<'a>(
        &'a self,
        email: &'a str,
        redirect_to: &'a str,
        code_challenge: &'a str,
    ) -> ProviderResult<'a, ()> {
        async move {
            let request = self.request(Method::POST, &Self::with_redirect("/recover", redirect_to));
            let body = EmailWithChallenge {
                email,
                password: None,
                create_user: None,
                code_challenge,
                code_challenge_method: CHALLENGE_METHOD,
            };

            self.send_empty(request, &body).await
        }
        .boxed_local()
    }

    fn update_password<'a>(
        &'a self,
        access_token: &'a str,
        password: &'a str,
    ) -> ProviderResult<'a, User> {
        async move {
            let request = self
                .request(Method::PUT, "/user")
                .bearer_auth(access_token);

            self.send_json(request, &PasswordUpdate { password }).await
        }
        .boxed_local()
    }

    fn sign_out<'a>(&'a self, access_token: &'a str) -> ProviderResult<'a, ()> {
        async move {
            let response = self
                .request(Method::POST, "/logout")
                .bearer_auth(access_token)
                .send()
                .await
                .map_err(network_error)?;

            read_response::<_, serde_json::Value>(response)
                .await
                .map(|_| ())
        }
        .boxed_local()
    }

    fn authorize_url(&self, provider: &str, redirect_to: &str, code_challenge: &str) -> String {
        let query = serde_urlencoded::to_string(&[
            ("provider", provider),
            ("redirect_to", redirect_to),
            ("code_challenge", code_challenge),
            ("code_challenge_method", CHALLENGE_METHOD),
        ])
        .unwrap_or_default();

        format!("{}?{}", self.endpoint("/authorize"), query)
    }
}
