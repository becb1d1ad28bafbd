use actix_web::{web, HttpResponse};

use super::ok;
use crate::auth::AuthUser;
use crate::db::{self, CreateReview, DeleteReview, ListReviews, UpdateReview};
use crate::error::Result;
use crate::validate;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct ReviewForm {
    /// Star rating, 1 - 5
    rating: i16,

    #[serde(default)]
    body: String,

    /// Whether the reviewer usually drinks this style.
    #[serde(default)]
    typically_drinks_style: bool,

    image_url: Option<String>,
}

pub async fn list(beer_id: web::Path<i32>, state: web::Data<AppState>) -> Result<HttpResponse> {
    let reviews = db::execute(&state.pool, ListReviews { beer_id: *beer_id }).await?;

    Ok(ok("reviews", reviews))
}

/// Route handler for reviewing a beer.
///
/// Expects a JSON body with:
///
/// - `rating`: 1 - 5 stars
/// - `body`: optional text
/// - `typically_drinks_style`: optional, defaults to `false`
/// - `image_url`: optional reference to an uploaded photo
pub async fn create(
    user: AuthUser,
    beer_id: web::Path<i32>,
    form: web::Json<ReviewForm>,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    let form = form.into_inner();
    let rating = validate::rating(form.rating)?;
    let body = validate::review_body(&form.body)?.to_owned();

    let review = db::execute(
        &state.pool,
        CreateReview {
            beer_id: *beer_id,
            user_id: user.id,
            rating,
            body,
            typically_drinks_style: form.typically_drinks_style,
            image_url: form.image_url,
        },
    )
    .await?;

    Ok(ok("review", review))
}

pub async fn update(
    user: AuthUser,
    id: web::Path<i32>,
    form: web::Json<ReviewForm>,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    let form = form.into_inner();
    let rating = validate::rating(form.rating)?;
    let body = validate::review_body(&form.body)?.to_owned();

    let review = db::execute(
        &state.pool,
        UpdateReview {
            id: *id,
            user_id: user.id,
            rating,
            body,
            typically_drinks_style: form.typically_drinks_style,
            image_url: form.image_url,
        },
    )
    .await?;

    Ok(ok("review", review))
}

pub async fn delete(
    user: AuthUser,
    id: web::Path<i32>,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    db::execute(
        &state.pool,
        DeleteReview {
            id: *id,
            user_id: user.id,
        },
    )
    .await?;

    Ok(HttpResponse::NoContent().finish())
}

#[cfg(test)]
mod tests {
    use crate::auth::provider::fake::{FakeProvider, GOOD_PASSWORD};
    use crate::auth::session::{SessionRegistry, SESSION_COOKIE};
    use crate::routes::test_support::cookie_value;
    use actix_web::http::{Cookie, StatusCode};
    use actix_web::test;
    use std::rc::Rc;
    use std::sync::Arc;

    #[actix_rt::test]
    async fn out_of_range_ratings_never_reach_the_database() {
        let mut app = test_app!(
            Rc::new(FakeProvider::default()),
            Arc::new(SessionRegistry::default())
        );

        let req = test::TestRequest::post()
            .uri("/auth/sign-in")
            .set_json(&serde_json::json!({ "email": "a@b.co", "password": GOOD_PASSWORD }))
            .to_request();
        let resp = test::call_service(&mut app, req).await;
        let sid = cookie_value(&resp, SESSION_COOKIE).unwrap();

        for rating in &[0, 6] {
            let req = test::TestRequest::post()
                .uri("/beers/1/reviews")
                .cookie(Cookie::new(SESSION_COOKIE, sid.clone()))
                .set_json(&serde_json::json!({ "rating": rating, "body": "Nice" }))
                .to_request();
            let resp = test::call_service(&mut app, req).await;
            assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

            let body: serde_json::Value =
                serde_json::from_slice(&test::read_body(resp).await).unwrap();
            assert_eq!(body["error"], "Rating must be between 1 and 5 stars");
        }
    }

    #[actix_rt::test]
    async fn anonymous_reviews_are_unauthorized() {
        let mut app = test_app!(
            Rc::new(FakeProvider::default()),
            Arc::new(SessionRegistry::default())
        );

        let req = test::TestRequest::post()
            .uri("/beers/1/reviews")
            .set_json(&serde_json::json!({ "rating": 4 }))
            .to_request();
        let resp = test::call_service(&mut app, req).await;

        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }
}
