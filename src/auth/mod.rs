use actix_web::dev::Payload;
use actix_web::{web, FromRequest, HttpRequest};
use futures::future::{FutureExt, LocalBoxFuture};

use crate::error::Error;
use crate::AppState;

pub mod callback;
pub mod gotrue;
pub mod pkce;
pub mod provider;
pub mod reconcile;
pub mod session;

/// The signed-in user making a request.
///
/// Extracting this from a request without a live session fails with
/// [`Error::Unauthorized`].
pub struct AuthUser {
    pub id: String,
    pub email: Option<String>,
}

impl FromRequest for AuthUser {
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self, Self::Error>>;
    type Config = ();

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        let req = req.clone();

        async move {
            let state = req
                .app_data::<web::Data<AppState>>()
                .cloned()
                .ok_or(Error::Unauthorized)?;
            let store = state
                .sessions
                .existing(&req)
                .ok_or(Error::Unauthorized)?;
            let session = store
                .current_session(state.provider.as_ref())
                .await
                .ok_or(Error::Unauthorized)?;

            Ok(AuthUser {
                id: session.user.id,
                email: session.user.email,
            })
        }
        .boxed_local()
    }
}
