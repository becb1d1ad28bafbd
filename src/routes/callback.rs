use actix_web::http::header;
use actix_web::{web, HttpRequest, HttpResponse};
use chrono::Utc;
use serde::de::DeserializeOwned;

use super::redirect;
use crate::auth::callback::{self, CallbackParams, Destination, Landing, LoginError};
use crate::auth::pkce;
use crate::auth::provider::{AuthEvent, Session};
use crate::auth::reconcile;
use crate::auth::session::SessionStore;
use crate::error::Result;
use crate::AppState;

/// Route handler for auth redirects (email confirmation, magic links, OAuth,
/// password recovery).
///
/// Accepts the query parameters the provider appends:
///
/// - `code`: a one-time code to exchange for a session
/// - `type`: the kind of flow, `recovery` for password resets
/// - `error`, `error_code`, `error_description`: set when the flow failed
///
/// Always answers with a redirect; failures land on the login page with an
/// `error` flag.
pub async fn callback(req: HttpRequest, state: web::Data<AppState>) -> HttpResponse {
    let params: CallbackParams = match query(&req) {
        Ok(params) => params,
        Err(destination) => return redirect(&state, &destination.location()).finish(),
    };

    let code = match callback::classify(&params) {
        Landing::Failed(destination) => {
            info!(
                "Auth callback failed ({:?}: {:?}), sending to {}",
                params.error_code.as_ref().or(params.error.as_ref()),
                params.error_description,
                destination
            );
            return redirect(&state, &destination.location()).finish();
        }
        Landing::AwaitSession => {
            let confirm = match params.kind.as_deref() {
                Some(kind) => format!(
                    "/auth/confirm?{}",
                    serde_urlencoded::to_string(&[("type", kind)]).unwrap_or_default()
                ),
                None => "/auth/confirm".to_owned(),
            };
            return redirect(&state, &confirm).finish();
        }
        Landing::Exchange(code) => code.to_owned(),
    };

    let verifier = pkce::stored_verifier(&req);
    let browser = state.sessions.for_request(&req);

    let destination = match state
        .provider
        .exchange_code_for_session(&code, verifier.as_deref())
        .await
    {
        Ok(session) => {
            let referer = req
                .headers()
                .get(header::REFERER)
                .and_then(|r| r.to_str().ok());
            let destination = callback::after_sign_in(&params, referer);

            let event = if destination == Destination::ResetPassword {
                AuthEvent::PasswordRecovery
            } else {
                AuthEvent::SignedIn
            };
            debug!("Code exchanged for user {}", session.user.id);
            browser.store.set_session(event, session);
            state.sessions.keep(&browser);

            destination
        }
        Err(e) => {
            warn!("Code exchange failed: {}", e);
            Destination::Login(LoginError::InvalidCode)
        }
    };

    let mut response = redirect(&state, &destination.location());
    response.del_cookie(&pkce::verifier_removal());
    if let Some(cookie) = browser.cookie(state.config.secure_cookies) {
        response.cookie(cookie);
    }
    response.finish()
}

/// The query string, or the login page when it can't be read.
///
/// Parsed by hand so a malformed redirect still ends in a redirect rather than
/// the extractor's bare `400`.
fn query<T: DeserializeOwned>(req: &HttpRequest) -> std::result::Result<T, Destination> {
    serde_urlencoded::from_str(req.query_string()).map_err(|e| {
        info!("Unreadable auth redirect {:?}: {}", req.query_string(), e);
        Destination::Login(LoginError::InvalidRequest)
    })
}

#[derive(Debug, Deserialize)]
pub struct ConfirmParams {
    #[serde(rename = "type")]
    kind: Option<String>,
}

/// Landing for redirects without an exchangeable code.
///
/// Waits for this browser's session to appear, either through an auth event
/// (for example tokens posted to [`implicit`]) or an existing session, and
/// gives up after the configured timeout.
pub async fn confirm(req: HttpRequest, state: web::Data<AppState>) -> HttpResponse {
    let params: ConfirmParams = match query(&req) {
        Ok(params) => params,
        Err(destination) => return redirect(&state, &destination.location()).finish(),
    };
    let recovery = params.kind.as_deref() == Some("recovery");

    // An unknown browser has no session yet; it waits on a store nobody keeps.
    let store = state
        .sessions
        .existing(&req)
        .unwrap_or_else(SessionStore::new);

    let destination = reconcile::await_session(
        &store,
        state.provider.as_ref(),
        state.config.callback,
        recovery,
    )
    .await;

    redirect(&state, &destination.location()).finish()
}

/// Tokens from an implicit-grant redirect, read by the front end from the URL
/// fragment.
#[derive(Debug, Deserialize)]
pub struct ImplicitTokens {
    access_token: String,
    refresh_token: String,
    expires_in: Option<i64>,
    expires_at: Option<i64>,
    #[serde(rename = "type")]
    kind: Option<String>,
}

pub async fn implicit(
    req: HttpRequest,
    tokens: web::Json<ImplicitTokens>,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    let tokens = tokens.into_inner();

    // Never trust the tokens without asking the provider who they belong to.
    let user = state.provider.get_user(&tokens.access_token).await?;

    let expires_at = tokens
        .expires_at
        .unwrap_or_else(|| Utc::now().timestamp() + tokens.expires_in.unwrap_or(3600));
    let event = if tokens.kind.as_deref() == Some("recovery") {
        AuthEvent::PasswordRecovery
    } else {
        AuthEvent::SignedIn
    };

    let browser = state.sessions.for_request(&req);
    browser.store.set_session(
        event,
        Session {
            access_token: tokens.access_token,
            refresh_token: tokens.refresh_token,
            expires_at,
            user,
        },
    );
    state.sessions.keep(&browser);

    let mut response = HttpResponse::NoContent();
    if let Some(cookie) = browser.cookie(state.config.secure_cookies) {
        response.cookie(cookie);
    }
    Ok(response.finish())
}
