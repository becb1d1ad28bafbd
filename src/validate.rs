//! Input checks done before anything reaches the database or auth provider.

use chrono::naive::NaiveDate;
use chrono::Utc;
use lazy_static::lazy_static;
use regex::Regex;

use super::error::{Error, Result};

pub const MIN_RATING: i16 = 1;
pub const MAX_RATING: i16 = 5;
pub const MAX_REVIEW_LENGTH: usize = 2000;
pub const MIN_PASSWORD_LENGTH: usize = 6;

lazy_static! {
    static ref USERNAME: Regex = Regex::new(r"^[A-Za-z0-9_]{3,24}$").unwrap();
    static ref EMAIL: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    static ref PHONE: Regex = Regex::new(r"^\+?[0-9 ()-]{7,20}$").unwrap();
}

fn invalid<T, S: Into<String>>(message: S) -> Result<T> {
    Err(Error::Validation(message.into()))
}

pub fn rating(value: i16) -> Result<i16> {
    if value < MIN_RATING || value > MAX_RATING {
        return invalid(format!(
            "Rating must be between {} and {} stars",
            MIN_RATING, MAX_RATING
        ));
    }
    Ok(value)
}

pub fn review_body(body: &str) -> Result<&str> {
    let body = body.trim();
    if body.chars().count() > MAX_REVIEW_LENGTH {
        return invalid(format!(
            "Reviews are limited to {} characters",
            MAX_REVIEW_LENGTH
        ));
    }
    Ok(body)
}

pub fn username(value: &str) -> Result<&str> {
    let value = value.trim();
    if !USERNAME.is_match(value) {
        return invalid("Usernames are 3-24 letters, digits or underscores");
    }
    Ok(value)
}

pub fn date_of_birth(value: NaiveDate) -> Result<NaiveDate> {
    if value >= Utc::today().naive_utc() {
        return invalid("Date of birth must be in the past");
    }
    Ok(value)
}

pub fn email(value: &str) -> Result<&str> {
    let value = value.trim();
    if !EMAIL.is_match(value) {
        return invalid("Please enter a valid email address");
    }
    Ok(value)
}

pub fn phone(value: &str) -> Result<&str> {
    let value = value.trim();
    if !PHONE.is_match(value) {
        return invalid("Please enter a valid phone number");
    }
    Ok(value)
}

pub fn password(value: &str) -> Result<&str> {
    if value.chars().count() < MIN_PASSWORD_LENGTH {
        return invalid(format!(
            "Passwords must be at least {} characters",
            MIN_PASSWORD_LENGTH
        ));
    }
    Ok(value)
}

pub fn required<'a>(field: &str, value: &'a str) -> Result<&'a str> {
    let value = value.trim();
    if value.is_empty() {
        return invalid(format!("{} is required", field));
    }
    Ok(value)
}

/// Contact details for a waitlist entry: at least one of email/phone.
pub fn contact<'a>(
    email_address: Option<&'a str>,
    phone_number: Option<&'a str>,
) -> Result<(Option<&'a str>, Option<&'a str>)> {
    let email_address = email_address.map(str::trim).filter(|e| !e.is_empty());
    let phone_number = phone_number.map(str::trim).filter(|p| !p.is_empty());

    if email_address.is_none() && phone_number.is_none() {
        return invalid("An email address or phone number is required");
    }

    Ok((
        email_address.map(email).transpose()?,
        phone_number.map(phone).transpose()?,
    ))
}

pub fn quantity(value: i32, minimum: i32) -> Result<i32> {
    let minimum = minimum.max(1);
    if value < minimum {
        return invalid(format!("The minimum order is {}", minimum));
    }
    Ok(value)
}

pub fn pricing(price_cents: Option<i32>, min_order_quantity: i32) -> Result<()> {
    if price_cents.map_or(false, |p| p < 0) {
        return invalid("Price can't be negative");
    }
    if min_order_quantity < 1 {
        return invalid("Minimum order quantity must be at least 1");
    }
    Ok(())
}
