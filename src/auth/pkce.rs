//! PKCE verifiers for flows that return through `/callback`.
//!
//! The verifier doubles as the challenge (`plain` method) and is held by the
//! browser in a cookie until the code is exchanged.

use actix_web::cookie::SameSite;
use actix_web::http::Cookie;
use actix_web::{HttpMessage, HttpRequest};
use textnonce::TextNonce;

pub const VERIFIER_COOKIE: &str = "malty-code-verifier";
pub const CHALLENGE_METHOD: &str = "plain";

/// Verifiers must be 43 to 128 characters long.
const VERIFIER_LENGTH: usize = 64;

pub fn new_verifier() -> String {
    // Only fails for lengths that are not a multiple of 4.
    match TextNonce::sized_urlsafe(VERIFIER_LENGTH) {
        Ok(nonce) => nonce.into_string(),
        Err(_) => TextNonce::new().into_string(),
    }
}

pub fn verifier_cookie(verifier: &str, secure: bool) -> Cookie<'static> {
    Cookie::build(VERIFIER_COOKIE, verifier.to_owned())
        .path("/")
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .finish()
}

/// The verifier cookie as named for `HttpResponseBuilder::del_cookie`, once
/// the code has been exchanged.
pub fn verifier_removal() -> Cookie<'static> {
    Cookie::build(VERIFIER_COOKIE, "").path("/").finish()
}

pub fn stored_verifier(req: &HttpRequest) -> Option<String> {
    req.cookie(VERIFIER_COOKIE)
        .map(|c| c.value().to_owned())
        .filter(|v| !v.is_empty())
}
