#![allow(proc_macro_derive_resolution_fallback)] // See: https://github.com/diesel-rs/diesel/issues/1785

use super::schema::*;
use chrono::naive::NaiveDate;
use chrono::{DateTime, Utc};

#[derive(Debug, Clone, Serialize, Queryable)]
pub struct Beer {
    pub id: i32,
    pub name: String,
    pub brewery: String,
    pub style: String,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub price_cents: Option<i32>,
    pub min_order_quantity: i32,
    pub is_pre_order: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Insertable)]
#[table_name = "beer"]
pub struct NewBeer<'a> {
    pub name: &'a str,
    pub brewery: &'a str,
    pub style: &'a str,
    pub description: Option<&'a str>,
    pub image_url: Option<&'a str>,
    pub price_cents: Option<i32>,
    pub min_order_quantity: i32,
    pub is_pre_order: bool,
}

/// Fields only an administrator may change on a beer.
#[derive(Debug, Clone, Deserialize, AsChangeset)]
#[table_name = "beer"]
#[changeset_options(treat_none_as_null = "true")]
pub struct BeerPricing {
    pub price_cents: Option<i32>,
    pub min_order_quantity: i32,
    pub is_pre_order: bool,
}

#[derive(Debug, Clone, Serialize, Queryable)]
pub struct Review {
    pub id: i32,
    pub beer_id: i32,
    pub user_id: String,
    pub rating: i16,
    pub body: String,
    pub typically_drinks_style: bool,
    pub image_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Insertable)]
#[table_name = "review"]
pub struct NewReview<'a> {
    pub beer_id: i32,
    pub user_id: &'a str,
    pub rating: i16,
    pub body: &'a str,
    pub typically_drinks_style: bool,
    pub image_url: Option<&'a str>,
}

#[derive(Debug, Clone, Serialize, Queryable)]
pub struct Profile {
    pub id: String,
    pub username: String,
    pub date_of_birth: Option<NaiveDate>,
    pub is_admin: bool,
    pub notify_on_restock: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Insertable)]
#[table_name = "profile"]
pub struct NewProfile<'a> {
    pub id: &'a str,
    pub username: &'a str,
    pub date_of_birth: Option<NaiveDate>,
    pub notify_on_restock: bool,
}

#[derive(Debug, Clone, Serialize, Queryable)]
pub struct WaitlistEntry {
    pub id: i32,
    pub user_id: String,
    pub beer_id: i32,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub quantity: i32,
    pub payment_confirmed: bool,
    pub notified_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Insertable)]
#[table_name = "waitlist"]
pub struct NewWaitlistEntry<'a> {
    pub user_id: &'a str,
    pub beer_id: i32,
    pub email: Option<&'a str>,
    pub phone: Option<&'a str>,
    pub quantity: i32,
}
