table! {
    beer (id) {
        id -> Int4,
        name -> Varchar,
        brewery -> Varchar,
        style -> Varchar,
        description -> Nullable<Text>,
        image_url -> Nullable<Varchar>,
        price_cents -> Nullable<Int4>,
        min_order_quantity -> Int4,
        is_pre_order -> Bool,
        created_at -> Timestamptz,
    }
}

table! {
    profile (id) {
        id -> Varchar,
        username -> Varchar,
        date_of_birth -> Nullable<Date>,
        is_admin -> Bool,
        notify_on_restock -> Bool,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

table! {
    review (id) {
        id -> Int4,
        beer_id -> Int4,
        user_id -> Varchar,
        rating -> Int2,
        body -> Text,
        typically_drinks_style -> Bool,
        image_url -> Nullable<Varchar>,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

table! {
    waitlist (id) {
        id -> Int4,
        user_id -> Varchar,
        beer_id -> Int4,
        email -> Nullable<Varchar>,
        phone -> Nullable<Varchar>,
        quantity -> Int4,
        payment_confirmed -> Bool,
        notified_at -> Nullable<Timestamptz>,
        created_at -> Timestamptz,
    }
}

joinable!(review -> beer (beer_id));
joinable!(waitlist -> beer (beer_id));

allow_tables_to_appear_in_same_query!(
    beer,
    profile,
    review,
    waitlist,
);
