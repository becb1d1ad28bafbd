use actix_web::{web, HttpResponse};
use chrono::naive::NaiveDate;

use super::ok;
use crate::auth::AuthUser;
use crate::db::{self, GetProfile, UpsertProfile};
use crate::error::Result;
use crate::validate;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct ProfileForm {
    username: String,

    /// yyyy-mm-dd
    date_of_birth: Option<NaiveDate>,

    #[serde(default = "notify_by_default")]
    notify_on_restock: bool,
}

fn notify_by_default() -> bool {
    true
}

/// The signed-in user's profile, or `null` if they haven't created one yet.
pub async fn get(user: AuthUser, state: web::Data<AppState>) -> Result<HttpResponse> {
    let profile = db::execute(&state.pool, GetProfile { user_id: user.id }).await?;

    Ok(ok("profile", profile))
}

pub async fn upsert(
    user: AuthUser,
    form: web::Json<ProfileForm>,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    let username = validate::username(&form.username)?.to_owned();
    let date_of_birth = form.date_of_birth.map(validate::date_of_birth).transpose()?;

    let profile = db::execute(
        &state.pool,
        UpsertProfile {
            user_id: user.id,
            username,
            date_of_birth,
            notify_on_restock: form.notify_on_restock,
        },
    )
    .await?;

    Ok(ok("profile", profile))
}
