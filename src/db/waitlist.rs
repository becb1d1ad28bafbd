use diesel::prelude::*;
use diesel::Connection as _;

use super::{Connection, Query};
use crate::error::{Error, Result};
use crate::models::{Beer, NewWaitlistEntry, WaitlistEntry};
use crate::validate;

pub struct ListWaitlist {
    pub user_id: String,
}

impl Query for ListWaitlist {
    type Item = Vec<WaitlistEntry>;

    fn execute(&self, conn: Connection) -> Result<Self::Item> {
        use crate::schema::waitlist::dsl::*;

        Ok(waitlist
            .filter(user_id.eq(&self.user_id))
            .order(created_at.desc())
            .load::<WaitlistEntry>(&conn)?)
    }
}

/// Put the user on the pre-order list for a beer.
///
/// The quantity is checked against the beer's minimum order inside the same
/// transaction that inserts the entry.
pub struct JoinWaitlist {
    pub user_id: String,
    pub beer_id: i32,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub quantity: i32,
}

impl Query for JoinWaitlist {
    type Item = WaitlistEntry;

    fn execute(&self, conn: Connection) -> Result<Self::Item> {
        use crate::schema::beer::dsl::beer;
        use crate::schema::waitlist::dsl::waitlist;

        conn.transaction::<_, Error, _>(|| {
            let target = beer.find(self.beer_id).first::<Beer>(&conn)?;

            if !target.is_pre_order {
                return Err(Error::Validation(format!(
                    "{} isn't open for pre-orders",
                    target.name
                )));
            }
            validate::quantity(self.quantity, target.min_order_quantity)?;

            let entry = NewWaitlistEntry {
                user_id: &self.user_id,
                beer_id: self.beer_id,
                email: self.email.as_deref(),
                phone: self.phone.as_deref(),
                quantity: self.quantity,
            };

            Ok(diesel::insert_into(waitlist)
                .values(&entry)
                .get_result(&conn)?)
        })
    }
}

pub struct LeaveWaitlist {
    pub id: i32,
    pub user_id: String,
}

impl Query for LeaveWaitlist {
    type Item = ();

    fn execute(&self, conn: Connection) -> Result<Self::Item> {
        use crate::schema::waitlist::dsl::*;

        let deleted = diesel::delete(
            waitlist
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

/// Admin: record that a pre-order has been paid for.
pub struct ConfirmPayment {
    pub id: i32,
}

impl Query for ConfirmPayment {
    type Item = WaitlistEntry;

    fn execute(&self, conn: Connection) -> Result<Self::Item> {
        use crate::schema::waitlist::dsl::*;

        Ok(diesel::update(waitlist.find(self.id))
            .set(payment_confirmed.eq(true))
            .get_result(&conn)?)
    }
}
