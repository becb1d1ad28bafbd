use chrono::Utc;
use diesel::prelude::*;

use super::{Connection, Query};
use crate::error::{Error, Result};
use crate::models::{NewReview, Review};

pub struct ListReviews {
    pub beer_id: i32,
}

impl Query for ListReviews {
    type Item = Vec<Review>;

    fn execute(&self, conn: Connection) -> Result<Self::Item> {
        use crate::schema::review::dsl::*;

        Ok(review
            .filter(beer_id.eq(self.beer_id))
            .order(created_at.desc())
            .load::<Review>(&conn)?)
    }
}

/// Insert a review. Fields are expected to be validated already.
pub struct CreateReview {
    pub beer_id: i32,
    pub user_id: String,
    pub rating: i16,
    pub body: String,
    pub typically_drinks_style: bool,
    pub image_url: Option<String>,
}

impl Query for CreateReview {
    type Item = Review;

    fn execute(&self, conn: Connection) -> Result<Self::Item> {
        use crate::schema::review::dsl::*;

        let new_review = NewReview {
            beer_id: self.beer_id,
            user_id: &self.user_id,
            rating: self.rating,
            body: &self.body,
            typically_drinks_style: self.typically_drinks_style,
            image_url: self.image_url.as_deref(),
        };

        Ok(diesel::insert_into(review)
            .values(&new_review)
            .get_result(&conn)?)
    }
}

/// Rewrite one of the user's own reviews.
pub struct UpdateReview {
    pub id: i32,
    pub user_id: String,
    pub rating: i16,
    pub body: String,
    pub typically_drinks_style: bool,
    pub image_url: Option<String>,
}

impl Query for UpdateReview {
    type Item = Review;

    fn execute(&self, conn: Connection) -> Result<Self::Item> {
        use crate::schema::review::dsl::*;

        // Someone else's review looks the same as a missing one.
        Ok(diesel::update(
            review
                .filter(id.eq(self.id))
                .filter(user_id.eq(&self.user_id)),
        )
        .set((
            rating.eq(self.rating),
            body.eq(&self.body),
            typically_drinks_style.eq(self.typically_drinks_style),
            image_url.eq(self.image_url.as_deref()),
            updated_at.eq(Utc::now()),
        ))
        .get_result(&conn)?)
    }
}

pub struct DeleteReview {
    pub id: i32,
    pub user_id: String,
}

impl Query for DeleteReview {
    type Item = ();

    fn execute(&self, conn: Connection) -> Result<Self::Item> {
        use crate::schema::review::dsl::*;

        let deleted = diesel::delete(
            review
                .filter(id.eq(self.id))
                .filter(user_id.eq(&self.user_id)),
        )
        .execute(&conn)?;

        if deleted == 0 {
            return Err(Error::NotFound);
        }

        Ok(())
    }
}
