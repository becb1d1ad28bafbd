use actix_web::{web, HttpResponse};

use super::{ok, require_admin};
use crate::auth::AuthUser;
use crate::db::{self, ConfirmPayment, JoinWaitlist, LeaveWaitlist, ListWaitlist};
use crate::error::Result;
use crate::validate;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct WaitlistForm {
    beer_id: i32,
    email: Option<String>,
    phone: Option<String>,
    quantity: i32,
}

pub async fn list(user: AuthUser, state: web::Data<AppState>) -> Result<HttpResponse> {
    let entries = db::execute(&state.pool, ListWaitlist { user_id: user.id }).await?;

    Ok(ok("waitlist", entries))
}

/// Route handler for pre-ordering a beer.
///
/// Without explicit contact details the account's email address is used. The
/// quantity is checked against the beer's minimum order.
pub async fn join(
    user: AuthUser,
    form: web::Json<WaitlistForm>,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    let form = form.into_inner();
    validate::quantity(form.quantity, 1)?;

    let email = match (&form.email, &form.phone) {
        (None, None) => user.email.clone(),
        (email, _) => email.clone(),
    };
    let (email, phone) = validate::contact(email.as_deref(), form.phone.as_deref())?;

    let entry = db::execute(
        &state.pool,
        JoinWaitlist {
            user_id: user.id.clone(),
            beer_id: form.beer_id,
            email: email.map(str::to_owned),
            phone: phone.map(str::to_owned),
            quantity: form.quantity,
        },
    )
    .await?;
    info!("User {} joined the waitlist for beer {}", user.id, entry.beer_id);

    Ok(ok("waitlist_entry", entry))
}

pub async fn leave(
    user: AuthUser,
    id: web::Path<i32>,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    db::execute(
        &state.pool,
        LeaveWaitlist {
            id: *id,
            user_id: user.id,
        },
    )
    .await?;

    Ok(HttpResponse::NoContent().finish())
}

/// Admin: mark a pre-order as paid.
pub async fn confirm_payment(
    user: AuthUser,
    id: web::Path<i32>,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    require_admin(&state, &user).await?;

    let entry = db::execute(&state.pool, ConfirmPayment { id: *id }).await?;
    info!("User {} confirmed payment for waitlist entry {}", user.id, entry.id);

    Ok(ok("waitlist_entry", entry))
}
