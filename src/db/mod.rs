use actix_web::web;
use diesel::pg::PgConnection;
use diesel::r2d2;

use super::error::Result;

pub mod beer;
pub mod profile;
pub mod review;
pub mod waitlist;

pub use self::beer::{CreateBeer, GetBeer, ListBeers, SearchBeers, UpdateBeerPricing};
pub use self::profile::{GetProfile, UpsertProfile};
pub use self::review::{CreateReview, DeleteReview, ListReviews, UpdateReview};
pub use self::waitlist::{ConfirmPayment, JoinWaitlist, LeaveWaitlist, ListWaitlist};

pub type Pool = r2d2::Pool<r2d2::ConnectionManager<PgConnection>>;
pub type Connection = r2d2::PooledConnection<r2d2::ConnectionManager<PgConnection>>;

/// A unit of database work, run on the blocking thread pool by [`execute`].
pub trait Query {
    type Item: Send;

    fn execute(&self, conn: Connection) -> Result<Self::Item>;
}

pub async fn execute<T>(pool: &Pool, query: T) -> Result<T::Item>
where
    T: Query + Send + 'static,
    T::Item: 'static,
{
    let pool = pool.clone();

    Ok(web::block(move || query.execute(pool.get()?)).await?)
}

pub fn create_pool(database_url: &str, size: u32) -> std::result::Result<Pool, r2d2::PoolError> {
    let manager = r2d2::ConnectionManager::<PgConnection>::new(database_url);
    Pool::builder().max_size(size).build(manager)
}

/// Escape the `LIKE` wildcards in user input and wrap it for a substring match.
pub fn contains_pattern(term: &str) -> String {
    let mut pattern = String::with_capacity(term.len() + 2);
    pattern.push('%');
    for c in term.chars() {
        if c == '%' || c == '_' || c == '\\' {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}
