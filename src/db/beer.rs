use diesel::prelude::*;

use super::{contains_pattern, Connection, Query};
use crate::error::Result;
use crate::models::{Beer, BeerPricing, NewBeer};

/*************************************/
/** List / search beers             **/
/*************************************/

pub struct ListBeers {
    pub limit: i64,
}

impl Query for ListBeers {
    type Item = Vec<Beer>;

    fn execute(&self, conn: Connection) -> Result<Self::Item> {
        use crate::schema::beer::dsl::*;

        Ok(beer
            .order((created_at.desc(), id.desc()))
            .limit(self.limit)
            .load::<Beer>(&conn)?)
    }
}

/// Loose, case-insensitive match on name, brewery or style.
pub struct SearchBeers {
    pub term: String,
    pub limit: i64,
}

impl Query for SearchBeers {
    type Item = Vec<Beer>;

    fn execute(&self, conn: Connection) -> Result<Self::Item> {
        use crate::schema::beer::dsl::*;

        let pattern = contains_pattern(&self.term);

        Ok(beer
            .filter(
                name.ilike(&pattern)
                    .or(brewery.ilike(&pattern))
                    .or(style.ilike(&pattern)),
            )
            .order(name.asc())
            .limit(self.limit)
            .load::<Beer>(&conn)?)
    }
}

/*************************************/
/** Single beer with its ratings    **/
/*************************************/

#[derive(Serialize)]
pub struct BeerDetail {
    #[serde(flatten)]
    pub beer: Beer,
    pub review_count: usize,
    pub average_rating: Option<f64>,
}

pub struct GetBeer {
    pub id: i32,
}

impl Query for GetBeer {
    type Item = BeerDetail;

    fn execute(&self, conn: Connection) -> Result<Self::Item> {
        use crate::schema::beer::dsl::beer;
        use crate::schema::review::dsl::{beer_id, rating, review};

        let found = beer.find(self.id).first::<Beer>(&conn)?;
        let ratings = review
            .filter(beer_id.eq(self.id))
            .select(rating)
            .load::<i16>(&conn)?;

        Ok(BeerDetail {
            beer: found,
            review_count: ratings.len(),
            average_rating: average(&ratings),
        })
    }
}

fn average(ratings: &[i16]) -> Option<f64> {
    if ratings.is_empty() {
        return None;
    }

    let total: i64 = ratings.iter().map(|r| i64::from(*r)).sum();
    Some(total as f64 / ratings.len() as f64)
}

/*************************************/
/** Admin: create / reprice         **/
/*************************************/

#[derive(Debug, Clone, Deserialize)]
pub struct CreateBeer {
    pub name: String,
    pub brewery: String,
    pub style: String,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub price_cents: Option<i32>,
    #[serde(default = "one")]
    pub min_order_quantity: i32,
    #[serde(default)]
    pub is_pre_order: bool,
}

fn one() -> i32 {
    1
}

impl Query for CreateBeer {
    type Item = Beer;

    fn execute(&self, conn: Connection) -> Result<Self::Item> {
        use crate::schema::beer::dsl::*;

        let new_beer = NewBeer {
            name: self.name.trim(),
            brewery: self.brewery.trim(),
            style: self.style.trim(),
            description: self.description.as_deref(),
            image_url: self.image_url.as_deref(),
            price_cents: self.price_cents,
            min_order_quantity: self.min_order_quantity,
            is_pre_order: self.is_pre_order,
        };

        Ok(diesel::insert_into(beer)
            .values(&new_beer)
            .get_result(&conn)?)
    }
}

pub struct UpdateBeerPricing {
    pub id: i32,
    pub pricing: BeerPricing,
}

impl Query for UpdateBeerPricing {
    type Item = Beer;

    fn execute(&self, conn: Connection) -> Result<Self::Item> {
        use crate::schema::beer::dsl::*;

        Ok(diesel::update(beer.find(self.id))
            .set(&self.pricing)
            .get_result(&conn)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn average_rating() {
        assert_eq!(average(&[]), None);
        assert_eq!(average(&[4, 5]), Some(4.5));
    }
}
