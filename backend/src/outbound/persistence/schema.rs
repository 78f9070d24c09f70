//! Diesel table definitions for the PostgreSQL schema.
//!
//! These definitions must match the deployed schema exactly; Diesel uses them
//! for compile-time query validation and type-safe SQL generation.

diesel::table! {
    /// Registered users.
    ///
    /// `verified` is the verification tri-state: `NULL` means no attempt has
    /// completed, `true` that the new-user notification went out, `false`
    /// that the last attempt failed.
    users (id) {
        /// Serial primary key.
        id -> Int4,
        /// Unique contact address.
        email -> Varchar,
        /// Display name.
        name -> Varchar,
        /// Verification tri-state column.
        verified -> Nullable<Bool>,
    }
}

diesel::table! {
    /// Customer orders, optionally attached to a user.
    orders (id) {
        /// Serial primary key.
        id -> Int4,
        /// Owning user; `NULL` when detached.
        user_id -> Nullable<Int4>,
        /// Free-form delivery address.
        delivery_address -> Varchar,
        /// When the order was placed.
        order_date -> Timestamptz,
        /// Order lifecycle label.
        status -> Varchar,
        /// Optional free-form note.
        note -> Nullable<Varchar>,
    }
}

diesel::table! {
    /// Backing store for the verification channel.
    ///
    /// Rows are leased with a visibility timeout and deleted on acknowledge.
    channel_messages (id) {
        /// Serial delivery identifier, also the lease handle.
        id -> Int8,
        /// Opaque message payload.
        payload -> Bytea,
        /// Lease expiry; `NULL` or past means deliverable.
        locked_until -> Nullable<Timestamptz>,
        /// Append timestamp.
        created_at -> Timestamptz,
    }
}

diesel::joinable!(orders -> users (user_id));
diesel::allow_tables_to_appear_in_same_query!(orders, users);
