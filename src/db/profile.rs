use chrono::naive::NaiveDate;
use chrono::Utc;
use diesel::prelude::*;

use super::{Connection, Query};
use crate::error::Result;
use crate::models::{NewProfile, Profile};

pub struct GetProfile {
    pub user_id: String,
}

impl Query for GetProfile {
    type Item = Option<Profile>;

    fn execute(&self, conn: Connection) -> Result<Self::Item> {
        use crate::schema::profile::dsl::*;

        Ok(profile
            .find(&self.user_id)
            .first::<Profile>(&conn)
            .optional()?)
    }
}

/// Create the user's profile, or update it if it exists. `is_admin` is never
/// touched here.
pub struct UpsertProfile {
    pub user_id: String,
    pub username: String,
    pub date_of_birth: Option<NaiveDate>,
    pub notify_on_restock: bool,
}

impl Query for UpsertProfile {
    type Item = Profile;

    fn execute(&self, conn: Connection) -> Result<Self::Item> {
        use crate::schema::profile::dsl::*;

        let new_profile = NewProfile {
            id: &self.user_id,
            username: &self.username,
            date_of_birth: self.date_of_birth,
            notify_on_restock: self.notify_on_restock,
        };

        Ok(diesel::insert_into(profile)
            .values(&new_profile)
            .on_conflict(id)
            .do_update()
            .set((
                username.eq(&self.username),
                date_of_birth.eq(self.date_of_birth),
                notify_on_restock.eq(self.notify_on_restock),
                updated_at.eq(Utc::now()),
            ))
            .get_result(&conn)?)
    }
}
