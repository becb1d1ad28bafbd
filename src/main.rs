#![allow(proc_macro_derive_resolution_fallback)] // See: https://github.com/diesel-rs/diesel/issues/1785

#[macro_use]
extern crate serde_derive;
#[macro_use]
extern crate diesel;
#[macro_use]
extern crate derive_more;
#[macro_use]
extern crate log;

mod api;
mod auth;
mod config;
mod db;
mod error;
mod models;
mod routes;
mod schema;
mod search;
mod validate;

use std::rc::Rc;
use std::sync::Arc;
use std::time::Duration;

use actix_cors::Cors;
use actix_web::middleware::Logger;
use actix_web::{App, HttpServer};

use self::auth::gotrue::GoTrueClient;
use self::auth::provider::AuthProvider;
use self::auth::session::SessionRegistry;
use self::config::Config;
use self::search::SearchDebouncer;

/// Stores nobody has used for this long are forgotten.
const SESSION_IDLE_LIMIT: Duration = Duration::from_secs(24 * 60 * 60);
const SESSION_PRUNE_INTERVAL: Duration = Duration::from_secs(10 * 60);

/// Per-worker application state.
///
/// The provider client is per worker; everything else is shared.
pub struct AppState {
    pub pool: db::Pool,
    pub provider: Rc<dyn AuthProvider>,
    pub sessions: Arc<SessionRegistry>,
    pub search: Arc<SearchDebouncer>,
    pub config: Arc<Config>,
}

#[actix_rt::main]
async fn main() -> std::io::Result<()> {
    dotenv::dotenv().ok();
    env_logger::init();

    let config = Arc::new(Config::from_env().expect("Invalid configuration"));

    // Create a connection pool to the database
    let pool = db::create_pool(&config.database_url, config.pool_size)
        .expect("Failed to create database connection pool!");

    let sessions = Arc::new(SessionRegistry::default());
    let search = Arc::new(SearchDebouncer::new(config.search_debounce));

    let registry = Arc::clone(&sessions);
    actix_rt::spawn(async move {
        let mut ticks = actix_rt::time::interval(SESSION_PRUNE_INTERVAL);
        loop {
            ticks.tick().await;
            let pruned = registry.prune_idle(SESSION_IDLE_LIMIT);
            if pruned > 0 {
                info!("Pruned {} idle session(s), {} remain", pruned, registry.len());
            }
        }
    });

    let listen_addr = config.listen_addr;
    let server_config = Arc::clone(&config);

    let server = HttpServer::new(move || {
        let config = Arc::clone(&server_config);
        let cors = Cors::new()
            .allowed_origin(&config.site_url)
            .supports_credentials()
            .finish();

        App::new()
            .data(AppState {
                pool: pool.clone(),
                provider: Rc::new(GoTrueClient::new(config.backend.clone())),
                sessions: Arc::clone(&sessions),
                search: Arc::clone(&search),
                config,
            })
            .wrap(cors)
            .wrap(Logger::default())
            .configure(routes::configure)
    })
    .bind(listen_addr)?;

    info!("Listening on {}", listen_addr);

    server.run().await
}
