use actix_web::dev::HttpResponseBuilder;
use actix_web::http::header;
use actix_web::{web, HttpResponse};
use serde::Serialize;

use crate::api::ApiResponse;
use crate::auth::AuthUser;
use crate::db::{self, GetProfile};
use crate::error::{Error, Result};
use crate::AppState;

/// An initialized test service over `test_support::state`.
#[cfg(test)]
macro_rules! test_app {
    ($provider:expr, $sessions:expr) => {
        actix_web::test::init_service(
            actix_web::App::new()
                .data(crate::routes::test_support::state($provider, $sessions))
                .configure(crate::routes::configure),
        )
        .await
    };
}

mod auth;
mod beers;
mod callback;
mod profile;
mod reviews;
mod waitlist;

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/", web::get().to(index))
        .route("/callback", web::get().to(callback::callback))
        .route("/auth/confirm", web::get().to(callback::confirm))
        .route("/auth/confirm/implicit", web::post().to(callback::implicit))
        .route("/auth/session", web::get().to(auth::session))
        .route("/auth/sign-in", web::post().to(auth::sign_in))
        .route("/auth/sign-up", web::post().to(auth::sign_up))
        .route("/auth/sign-out", web::post().to(auth::sign_out))
        .route("/auth/reset-password", web::post().to(auth::reset_password))
        .route("/auth/update-password", web::post().to(auth::update_password))
        .route("/auth/magic-link", web::post().to(auth::magic_link))
        .route("/auth/oauth/{provider}", web::get().to(auth::oauth))
        .service(
            web::resource("/beers")
                .route(web::get().to(beers::list))
                .route(web::post().to(beers::create)),
        )
        .route("/beers/search", web::get().to(beers::search))
        .route("/beers/{id}", web::get().to(beers::get))
        .route("/beers/{id}/pricing", web::patch().to(beers::update_pricing))
        .service(
            web::resource("/beers/{id}/reviews")
                .route(web::get().to(reviews::list))
                .route(web::post().to(reviews::create)),
        )
        .service(
            web::resource("/reviews/{id}")
                .route(web::put().to(reviews::update))
                .route(web::delete().to(reviews::delete)),
        )
        .service(
            web::resource("/profile")
                .route(web::get().to(profile::get))
                .route(web::put().to(profile::upsert)),
        )
        .service(
            web::resource("/waitlist")
                .route(web::get().to(waitlist::list))
                .route(web::post().to(waitlist::join)),
        )
        .route("/waitlist/{id}", web::delete().to(waitlist::leave))
        .route(
            "/waitlist/{id}/confirm-payment",
            web::post().to(waitlist::confirm_payment),
        );
}

async fn index() -> &'static str {
    "Malty"
}

/// A successful JSON response, wrapped in the API envelope.
fn ok<T: Serialize>(name: &'static str, data: T) -> HttpResponse {
    HttpResponse::Ok().json(ApiResponse::new(name, data))
}

/// A `302 Found` to a page on the front end.
fn redirect(state: &AppState, path: &str) -> HttpResponseBuilder {
    let mut response = HttpResponse::Found();
    response.header(header::LOCATION, state.config.site_link(path));
    response
}

/// Fails with `Forbidden` unless the user's profile is flagged as admin.
async fn require_admin(state: &AppState, user: &AuthUser) -> Result<()> {
    let profile = db::execute(
        &state.pool,
        GetProfile {
            user_id: user.id.clone(),
        },
    )
    .await?;

    match profile {
        Some(p) if p.is_admin => Ok(()),
        _ => {
            warn!("User {} attempted an admin action", user.id);
            Err(Error::Forbidden)
        }
    }
}

#[cfg(test)]
pub mod test_support {
    //! Application state wired to the in-memory provider.

    use super::*;
    use crate::auth::provider::fake::FakeProvider;
    use crate::auth::session::SessionRegistry;
    use crate::config::{BackendConfig, CallbackTiming, Config};
    use crate::search::SearchDebouncer;
    use actix_web::dev::ServiceResponse;
    use actix_web::http::header;
    use diesel::pg::PgConnection;
    use diesel::r2d2::{ConnectionManager, Pool};
    use std::rc::Rc;
    use std::sync::Arc;
    use std::time::Duration;

    pub const SITE: &str = "http://localhost:3000";

    pub fn state(provider: Rc<FakeProvider>, sessions: Arc<SessionRegistry>) -> AppState {
        let config = Config {
            listen_addr: "127.0.0.1:0".parse().unwrap(),
            database_url: "postgres://localhost/malty_test".into(),
            pool_size: 1,
            backend: BackendConfig {
                url: "https://auth.example.com".into(),
                anon_key: "anon".into(),
            },
            site_url: SITE.into(),
            secure_cookies: false,
            callback: CallbackTiming {
                poll_delay: Duration::from_millis(20),
                timeout: Duration::from_millis(200),
            },
            search_debounce: Duration::from_millis(100),
        };

        // Never connects unless a handler actually touches the database, and
        // gives up quickly when one does.
        let pool = Pool::builder()
            .max_size(1)
            .connection_timeout(Duration::from_millis(100))
            .build_unchecked(ConnectionManager::<PgConnection>::new(
                config.database_url.clone(),
            ));

        AppState {
            pool,
            provider,
            sessions,
            search: Arc::new(SearchDebouncer::new(config.search_debounce)),
            config: Arc::new(config),
        }
    }

    /// The `Location` header, relative to the front end.
    pub fn location<B>(resp: &ServiceResponse<B>) -> String {
        resp.headers()
            .get(header::LOCATION)
            .and_then(|l| l.to_str().ok())
            .unwrap_or_default()
            .trim_start_matches(SITE)
            .to_owned()
    }

    pub fn cookie_value<B>(resp: &ServiceResponse<B>, name: &str) -> Option<String> {
        resp.response()
            .cookies()
            .find(|c| c.name() == name)
            .map(|c| c.value().to_owned())
    }
}
