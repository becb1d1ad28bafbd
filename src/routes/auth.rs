use actix_web::http::{header, Cookie};
use actix_web::{web, HttpMessage, HttpRequest, HttpResponse};
use lazy_static::lazy_static;
use regex::Regex;

use super::ok;
use crate::api::ApiResponse;
use crate::auth::pkce;
use crate::auth::provider::Credentials;
use crate::auth::session::{BrowserSession, SessionStore, SESSION_COOKIE};
use crate::error::{Error, Result};
use crate::validate;
use crate::AppState;

lazy_static! {
    static ref OAUTH_PROVIDER: Regex = Regex::new(r"^[a-z][a-z0-9_]{1,31}$").unwrap();
}

/// Attach the session cookie (if new) and a fresh PKCE verifier cookie.
fn with_cookies(
    state: &AppState,
    browser: Option<&BrowserSession>,
    verifier: Option<&str>,
) -> actix_web::dev::HttpResponseBuilder {
    let mut response = HttpResponse::Ok();
    if let Some(cookie) = browser.and_then(|b| b.cookie(state.config.secure_cookies)) {
        response.cookie(cookie);
    }
    if let Some(verifier) = verifier {
        response.cookie(pkce::verifier_cookie(verifier, state.config.secure_cookies));
    }
    response
}

/// The current browser's `{ user, session, is_loading }`.
pub async fn session(req: HttpRequest, state: web::Data<AppState>) -> HttpResponse {
    let store = match state.sessions.existing(&req) {
        Some(store) => store,
        None => {
            return ok(
                "auth",
                serde_json::json!({ "user": null, "session": null, "is_loading": false }),
            )
        }
    };

    // Refreshes an expired session before reporting it.
    store.current_session(state.provider.as_ref()).await;
    ok("auth", store.snapshot())
}

pub async fn sign_in(
    req: HttpRequest,
    form: web::Json<Credentials>,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    let credentials = Credentials {
        email: validate::email(&form.email)?.to_owned(),
        password: form.password.clone(),
    };

    let browser = state.sessions.for_request(&req);
    let session = browser
        .store
        .sign_in(state.provider.as_ref(), &credentials)
        .await?;
    state.sessions.keep(&browser);

    info!("User {} signed in", session.user.id);

    Ok(with_cookies(&state, Some(&browser), None).json(ApiResponse::new("user", session.user)))
}

pub async fn sign_up(
    req: HttpRequest,
    form: web::Json<Credentials>,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    let credentials = Credentials {
        email: validate::email(&form.email)?.to_owned(),
        password: validate::password(&form.password)?.to_owned(),
    };

    let verifier = pkce::new_verifier();
    let browser = state.sessions.for_request(&req);
    let sign_up = browser
        .store
        .sign_up(
            state.provider.as_ref(),
            &credentials,
            &state.config.site_link("/callback"),
            &verifier,
        )
        .await?;
    state.sessions.keep(&browser);

    let mut body = ApiResponse::new("user", sign_up.user);
    if sign_up.session.is_none() {
        body = body.with_message("Check your email to confirm your account");
    }

    Ok(with_cookies(&state, Some(&browser), Some(&verifier)).json(body))
}

pub async fn sign_out(req: HttpRequest, state: web::Data<AppState>) -> HttpResponse {
    if let Some(cookie) = req.cookie(SESSION_COOKIE) {
        if let Some(store) = state.sessions.get(cookie.value()) {
            store.sign_out(state.provider.as_ref()).await;
        }
        state.sessions.remove(cookie.value());
    }

    HttpResponse::NoContent()
        .del_cookie(&Cookie::build(SESSION_COOKIE, "").path("/").finish())
        .finish()
}

#[derive(Debug, Deserialize)]
pub struct EmailForm {
    email: String,
}

/// Emails a password reset link that comes back through `/callback` with
/// `type=recovery`.
pub async fn reset_password(
    req: HttpRequest,
    form: web::Json<EmailForm>,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    let email = validate::email(&form.email)?;

    let verifier = pkce::new_verifier();
    let store = state
        .sessions
        .existing(&req)
        .unwrap_or_else(SessionStore::new);
    store
        .reset_password(
            state.provider.as_ref(),
            email,
            &state.config.site_link("/callback?type=recovery"),
            &verifier,
        )
        .await?;

    Ok(with_cookies(&state, None, Some(&verifier)).json(
        ApiResponse::new("email", email)
            .with_message("If that address has an account, a reset link is on its way"),
    ))
}

#[derive(Debug, Deserialize)]
pub struct PasswordForm {
    password: String,
}

pub async fn update_password(
    req: HttpRequest,
    form: web::Json<PasswordForm>,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    let password = validate::password(&form.password)?;
    let store = state
        .sessions
        .existing(&req)
        .ok_or(Error::Unauthorized)?;

    let user = store
        .update_password(state.provider.as_ref(), password)
        .await?;

    info!("User {} changed their password", user.id);
    Ok(ok("user", user))
}

pub async fn magic_link(
    form: web::Json<EmailForm>,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    let email = validate::email(&form.email)?;

    let verifier = pkce::new_verifier();
    state
        .provider
        .sign_in_with_otp(email, &state.config.site_link("/callback"), &verifier)
        .await?;

    Ok(with_cookies(&state, None, Some(&verifier))
        .json(ApiResponse::new("email", email).with_message("Check your email for a sign in link")))
}

/// Starts an OAuth sign in by sending the browser to the provider.
pub async fn oauth(
    provider: web::Path<String>,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    if !OAUTH_PROVIDER.is_match(&provider) {
        return Err(Error::Validation("Unknown sign in provider".into()));
    }

    let verifier = pkce::new_verifier();
    let url = state
        .provider
        .authorize_url(&provider, &state.config.site_link("/callback"), &verifier);

    let mut response = HttpResponse::Found();
    response.header(header::LOCATION, url);
    response.cookie(pkce::verifier_cookie(&verifier, state.config.secure_cookies));
    Ok(response.finish())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::provider::fake::{FakeProvider, GOOD_PASSWORD};
    use crate::auth::session::SessionRegistry;
    use crate::routes::test_support::cookie_value;
    use actix_web::http::StatusCode;
    use actix_web::test;
    use std::rc::Rc;
    use std::sync::Arc;

    #[actix_rt::test]
    async fn sign_in_then_session_reports_the_user() {
        let provider = Rc::new(FakeProvider::default());
        let mut app = test_app!(provider, Arc::new(SessionRegistry::default()));

        let req = test::TestRequest::post()
            .uri("/auth/sign-in")
            .set_json(&serde_json::json!({ "email": "a@b.co", "password": GOOD_PASSWORD }))
            .to_request();
        let resp = test::call_service(&mut app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let sid = cookie_value(&resp, SESSION_COOKIE).unwrap();

        let req = test::TestRequest::get()
            .uri("/auth/session")
            .cookie(Cookie::new(SESSION_COOKIE, sid))
            .to_request();
        let body: serde_json::Value = test::read_response_json(&mut app, req).await;
        assert_eq!(body["data"]["auth"]["user"]["id"], "user-1");
        assert_eq!(body["data"]["auth"]["is_loading"], false);
        assert!(body["data"]["auth"]["session"].get("refresh_token").is_none());
    }

    #[actix_rt::test]
    async fn wrong_password_is_a_uniform_error() {
        let provider = Rc::new(FakeProvider::default());
        let mut app = test_app!(provider, Arc::new(SessionRegistry::default()));

        let req = test::TestRequest::post()
            .uri("/auth/sign-in")
            .set_json(&serde_json::json!({ "email": "a@b.co", "password": "wrong" }))
            .to_request();
        let resp = test::call_service(&mut app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let body: serde_json::Value = serde_json::from_slice(&test::read_body(resp).await).unwrap();
        assert_eq!(body, serde_json::json!({ "error": "Invalid login credentials" }));
    }

    #[actix_rt::test]
    async fn reset_password_sets_a_verifier_cookie() {
        let provider = Rc::new(FakeProvider::default());
        let mut app = test_app!(provider.clone(), Arc::new(SessionRegistry::default()));

        let req = test::TestRequest::post()
            .uri("/auth/reset-password")
            .set_json(&serde_json::json!({ "email": "a@b.co" }))
            .to_request();
        let resp = test::call_service(&mut app, req).await;

        assert_eq!(resp.status(), StatusCode::OK);
        assert!(cookie_value(&resp, pkce::VERIFIER_COOKIE).is_some());
        assert!(provider.called("reset_password_for_email"));
    }

    #[actix_rt::test]
    async fn short_passwords_never_reach_the_provider() {
        let provider = Rc::new(FakeProvider::default());
        let mut app = test_app!(provider.clone(), Arc::new(SessionRegistry::default()));

        let req = test::TestRequest::post()
            .uri("/auth/sign-up")
            .set_json(&serde_json::json!({ "email": "a@b.co", "password": "123" }))
            .to_request();
        let resp = test::call_service(&mut app, req).await;

        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert!(!provider.called("sign_up"));
    }

    #[actix_rt::test]
    async fn sign_out_forgets_the_browser() {
        let provider = Rc::new(FakeProvider::default());
        let sessions = Arc::new(SessionRegistry::default());
        let mut app = test_app!(provider.clone(), sessions.clone());

        let req = test::TestRequest::post()
            .uri("/auth/sign-in")
            .set_json(&serde_json::json!({ "email": "a@b.co", "password": GOOD_PASSWORD }))
            .to_request();
        let resp = test::call_service(&mut app, req).await;
        let sid = cookie_value(&resp, SESSION_COOKIE).unwrap();

        let req = test::TestRequest::post()
            .uri("/auth/sign-out")
            .cookie(Cookie::new(SESSION_COOKIE, sid.clone()))
            .to_request();
        let resp = test::call_service(&mut app, req).await;

        assert_eq!(resp.status(), StatusCode::NO_CONTENT);
        assert_eq!(cookie_value(&resp, SESSION_COOKIE).as_deref(), Some(""));
        assert!(provider.called("sign_out"));
        assert!(sessions.get(&sid).is_none());
    }

    #[actix_rt::test]
    async fn anonymous_requests_leave_no_sessions_behind() {
        let provider = Rc::new(FakeProvider::default());
        let sessions = Arc::new(SessionRegistry::default());
        let mut app = test_app!(provider, sessions.clone());

        for _ in 0..5 {
            let req = test::TestRequest::get().uri("/auth/oauth/github").to_request();
            let resp = test::call_service(&mut app, req).await;
            assert!(cookie_value(&resp, SESSION_COOKIE).is_none());

            let req = test::TestRequest::post()
                .uri("/auth/magic-link")
                .set_json(&serde_json::json!({ "email": "a@b.co" }))
                .to_request();
            test::call_service(&mut app, req).await;

            let req = test::TestRequest::post()
                .uri("/auth/sign-in")
                .set_json(&serde_json::json!({ "email": "a@b.co", "password": "wrong" }))
                .to_request();
            let resp = test::call_service(&mut app, req).await;
            assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        }

        assert_eq!(sessions.len(), 0);
    }

    #[actix_rt::test]
    async fn oauth_redirects_to_the_provider() {
        let provider = Rc::new(FakeProvider::default());
        let mut app = test_app!(provider, Arc::new(SessionRegistry::default()));

        let req = test::TestRequest::get().uri("/auth/oauth/github").to_request();
        let resp = test::call_service(&mut app, req).await;
        assert_eq!(resp.status(), StatusCode::FOUND);

        let location = resp.headers().get(header::LOCATION).unwrap().to_str().unwrap();
        let verifier = cookie_value(&resp, pkce::VERIFIER_COOKIE).unwrap();
        assert!(location.starts_with("https://auth.example.com/authorize?provider=github"));
        assert!(location.ends_with(&verifier));

        let req = test::TestRequest::get().uri("/auth/oauth/Not%20Real").to_request();
        let resp = test::call_service(&mut app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }
}
