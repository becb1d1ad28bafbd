use actix_web::{web, HttpMessage, HttpRequest, HttpResponse};
use std::net::SocketAddr;

use super::{ok, require_admin};
use crate::auth::session::SESSION_COOKIE;
use crate::auth::AuthUser;
use crate::db::{self, CreateBeer, GetBeer, ListBeers, SearchBeers, UpdateBeerPricing};
use crate::error::Result;
use crate::models::{Beer, BeerPricing};
use crate::search::{self, RESULT_LIMIT};
use crate::validate;
use crate::AppState;

const DEFAULT_PAGE: i64 = 50;
const MAX_PAGE: i64 = 100;

#[derive(Debug, Deserialize)]
pub struct ListParams {
    limit: Option<i64>,
}

pub async fn list(params: web::Query<ListParams>, state: web::Data<AppState>) -> Result<HttpResponse> {
    let limit = params.limit.unwrap_or(DEFAULT_PAGE).max(1).min(MAX_PAGE);
    let beers = db::execute(&state.pool, ListBeers { limit }).await?;

    Ok(ok("beers", beers))
}

pub async fn get(id: web::Path<i32>, state: web::Data<AppState>) -> Result<HttpResponse> {
    let beer = db::execute(&state.pool, GetBeer { id: *id }).await?;

    Ok(ok("beer", beer))
}

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    #[serde(default)]
    q: String,
    /// Stable per search box, chosen by the front end.
    sid: Option<String>,
}

/// Identifies whose keystrokes supersede whose: the front end's search id,
/// then the session cookie, then the client address without its port.
fn searcher(req: &HttpRequest, sid: Option<&str>) -> String {
    if let Some(sid) = sid.filter(|s| !s.is_empty()) {
        return format!("sid:{}", sid);
    }
    if let Some(cookie) = req.cookie(SESSION_COOKIE) {
        return format!("session:{}", cookie.value());
    }

    let info = req.connection_info();
    match info.remote() {
        Some(remote) => match remote.parse::<SocketAddr>() {
            Ok(addr) => format!("addr:{}", addr.ip()),
            Err(_) => format!("addr:{}", remote),
        },
        None => "anonymous".to_owned(),
    }
}

/// Route handler for search-as-you-type.
///
/// Responds `204 No Content` when a newer query from the same browser arrived
/// during the debounce delay.
pub async fn search(
    req: HttpRequest,
    params: web::Query<SearchParams>,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    let term = match search::normalize(&params.q) {
        Some(term) => term,
        None => return Ok(ok("beers", Vec::<Beer>::new())),
    };

    if !state
        .search
        .settle(&searcher(&req, params.sid.as_deref()))
        .await
    {
        return Ok(HttpResponse::NoContent().finish());
    }

    let beers = db::execute(
        &state.pool,
        SearchBeers {
            term,
            limit: RESULT_LIMIT,
        },
    )
    .await?;

    Ok(ok("beers", beers))
}

/// Admin: add a beer to the catalogue.
pub async fn create(
    user: AuthUser,
    form: web::Json<CreateBeer>,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    validate::required("Name", &form.name)?;
    validate::required("Brewery", &form.brewery)?;
    validate::required("Style", &form.style)?;
    validate::pricing(form.price_cents, form.min_order_quantity)?;

    require_admin(&state, &user).await?;

    let beer = db::execute(&state.pool, form.into_inner()).await?;
    info!("User {} added beer {} ({})", user.id, beer.id, beer.name);

    Ok(ok("beer", beer))
}

/// Admin: change price, minimum order and pre-order flag.
pub async fn update_pricing(
    user: AuthUser,
    id: web::Path<i32>,
    form: web::Json<BeerPricing>,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    validate::pricing(form.price_cents, form.min_order_quantity)?;

    require_admin(&state, &user).await?;

    let beer = db::execute(
        &state.pool,
        UpdateBeerPricing {
            id: *id,
            pricing: form.into_inner(),
        },
    )
    .await?;
    info!("User {} repriced beer {}", user.id, beer.id);

    Ok(ok("beer", beer))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::provider::fake::FakeProvider;
    use crate::auth::session::SessionRegistry;
    use actix_rt::time::delay_for;
    use actix_web::dev::Service;
    use actix_web::http::StatusCode;
    use actix_web::test;
    use futures::future::join;
    use std::rc::Rc;
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn searchers_are_keyed_without_the_client_port() {
        let from = |port: u16| {
            test::TestRequest::default()
                .peer_addr(SocketAddr::from(([10, 0, 0, 1], port)))
                .to_http_request()
        };

        assert_eq!(searcher(&from(5000), None), searcher(&from(6000), None));
        assert_eq!(searcher(&from(5000), None), "addr:10.0.0.1");
        assert_eq!(searcher(&from(5000), Some("tab-1")), "sid:tab-1");
    }

    #[actix_rt::test]
    async fn overlapping_keystrokes_only_search_once() {
        let mut app = test_app!(
            Rc::new(FakeProvider::default()),
            Arc::new(SessionRegistry::default())
        );

        let first = app.call(
            test::TestRequest::get()
                .uri("/beers/search?q=pa&sid=tab-1")
                .to_request(),
        );
        let second = async {
            delay_for(Duration::from_millis(10)).await;
            app.call(
                test::TestRequest::get()
                    .uri("/beers/search?q=pale&sid=tab-1")
                    .to_request(),
            )
            .await
        };
        let (first, second) = join(first, second).await;

        assert_eq!(first.unwrap().status(), StatusCode::NO_CONTENT);
        // The survivor goes on to the (unreachable) database.
        assert_ne!(second.unwrap().status(), StatusCode::NO_CONTENT);
    }

    #[actix_rt::test]
    async fn blank_searches_skip_the_database() {
        let mut app = test_app!(
            Rc::new(FakeProvider::default()),
            Arc::new(SessionRegistry::default())
        );

        let req = test::TestRequest::get().uri("/beers/search?q=%20%20").to_request();
        let body: serde_json::Value = test::read_response_json(&mut app, req).await;

        assert_eq!(body["data"]["beers"], serde_json::json!([]));
    }

    #[actix_rt::test]
    async fn creating_beers_requires_a_session() {
        let mut app = test_app!(
            Rc::new(FakeProvider::default()),
            Arc::new(SessionRegistry::default())
        );

        let req = test::TestRequest::post()
            .uri("/beers")
            .set_json(&serde_json::json!({ "name": "Heady Topper", "brewery": "The Alchemist", "style": "DIPA" }))
            .to_request();
        let resp = test::call_service(&mut app, req).await;

        assert_eq!(resp.status(), actix_web::http::StatusCode::UNAUTHORIZED);
    }
}
