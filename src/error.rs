use actix_web::error::{BlockingError, ResponseError};
use actix_web::http::StatusCode;
use actix_web::HttpResponse;
use diesel::r2d2;
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use std::convert::From;

use super::auth::provider::ProviderError;

pub type Result<T> = ::std::result::Result<T, Error>;

#[derive(Debug, Display)]
pub enum Error {
    /// Input rejected before it reached the database or the auth provider.
    #[display(fmt = "{}", _0)]
    Validation(String),

    #[display(fmt = "You must be logged in")]
    Unauthorized,

    #[display(fmt = "You are not allowed to do that")]
    Forbidden,

    #[display(fmt = "Not found")]
    NotFound,

    #[display(fmt = "{}", _0)]
    Conflict(String),

    /// An error reported by the hosted auth provider, surfaced verbatim.
    #[display(fmt = "{}", _0)]
    Provider(ProviderError),

    #[display(fmt = "Database error: {}", _0)]
    DieselError(DieselError),

    #[display(fmt = "Database pool error: {}", _0)]
    PoolError(r2d2::PoolError),

    #[display(fmt = "Blocking operation canceled")]
    Canceled,
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Provider(e) => Some(e),
            Self::DieselError(e) => Some(e),
            Self::PoolError(e) => Some(e),
            _ => None,
        }
    }
}

impl ResponseError for Error {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Provider(e) => e
                .status
                .and_then(|s| StatusCode::from_u16(s).ok())
                .filter(|s| s.is_client_error())
                .unwrap_or(StatusCode::BAD_REQUEST),
            Self::DieselError(_) | Self::PoolError(_) | Self::Canceled => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();

        // Don't leak database details to the client.
        let message = if status.is_server_error() {
            error!("{}", self);
            "Something went wrong, please try again".to_owned()
        } else {
            self.to_string()
        };

        HttpResponse::build(status).json(ErrorBody { error: message })
    }
}

impl From<DieselError> for Error {
    fn from(e: DieselError) -> Error {
        match e {
            DieselError::NotFound => Error::NotFound,
            DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, info) => {
                Error::Conflict(match info.constraint_name() {
                    Some(c) if c.contains("username") => "That username is already taken".into(),
                    _ => info.message().to_owned(),
                })
            }
            DieselError::DatabaseError(DatabaseErrorKind::ForeignKeyViolation, _) => Error::NotFound,
            e => Error::DieselError(e),
        }
    }
}

impl From<r2d2::PoolError> for Error {
    fn from(e: r2d2::PoolError) -> Error {
        Error::PoolError(e)
    }
}

impl From<BlockingError<Error>> for Error {
    fn from(e: BlockingError<Error>) -> Error {
        match e {
            BlockingError::Error(e) => e,
            BlockingError::Canceled => Error::Canceled,
        }
    }
}

impl From<ProviderError> for Error {
    fn from(e: ProviderError) -> Error {
        Error::Provider(e)
    }
}
