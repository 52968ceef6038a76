use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

macro_rules! entity_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl From<u64> for $name {
            fn from(value: u64) -> Self {
                Self(value)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

entity_id!(
    /// Identifier of a registered marketplace user.
    UserId
);
entity_id!(PropertyId);
entity_id!(CategoryId);
entity_id!(BookingId);
entity_id!(ReviewId);
entity_id!(SearchHistoryId);
entity_id!(ViewHistoryId);
entity_id!(NotificationId);

/// Role fixed at registration time; it never changes afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Tenant,
    Landlord,
}

impl Role {
    pub const fn label(self) -> &'static str {
        match self {
            Role::Tenant => "tenant",
            Role::Landlord => "landlord",
        }
    }
}

/// Salted credential digest. Never serialized back to clients.
#[derive(Clone, PartialEq, Eq)]
pub struct PasswordHash(pub(crate) String);

impl fmt::Debug for PasswordHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PasswordHash(..)")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: UserId,
    pub username: String,
    pub email: String,
    pub role: Role,
    pub password: PasswordHash,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn profile(&self) -> UserProfile {
        UserProfile {
            id: self.id,
            username: self.username.clone(),
            role: self.role,
            created_at: self.created_at,
        }
    }
}

/// Public projection of a user, safe to return from any endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserProfile {
    pub id: UserId,
    pub username: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PropertyType {
    Apartment,
    House,
    Studio,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PropertyStatus {
    #[default]
    Active,
    Inactive,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Property {
    pub id: PropertyId,
    pub title: String,
    pub description: String,
    pub location: String,
    pub price: Decimal,
    pub room_count: u32,
    pub property_type: PropertyType,
    pub status: PropertyStatus,
    pub views: u64,
    pub owner: UserId,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
}

/// Booking state machine: `pending` may move to `confirmed` or `canceled`,
/// both of which are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    Canceled,
}

impl BookingStatus {
    pub const fn label(self) -> &'static str {
        match self {
            BookingStatus::Pending => "pending",
            BookingStatus::Confirmed => "confirmed",
            BookingStatus::Canceled => "canceled",
        }
    }

    pub const fn can_transition_to(self, next: BookingStatus) -> bool {
        matches!(
            (self, next),
            (
                BookingStatus::Pending,
                BookingStatus::Confirmed | BookingStatus::Canceled
            )
        )
    }

    pub const fn is_terminal(self) -> bool {
        !matches!(self, BookingStatus::Pending)
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Booking {
    pub id: BookingId,
    pub property: PropertyId,
    pub user: UserId,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub status: BookingStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Review {
    pub id: ReviewId,
    pub property: PropertyId,
    pub user: UserId,
    pub rating: u8,
    pub comment: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchHistory {
    pub id: SearchHistoryId,
    #[serde(skip_serializing)]
    pub user: UserId,
    pub keyword: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ViewHistory {
    pub id: ViewHistoryId,
    #[serde(skip_serializing)]
    pub user: UserId,
    pub property: PropertyId,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    BookingCreated,
    BookingStatusChanged,
    NewReview,
}

impl EventType {
    pub const fn label(self) -> &'static str {
        match self {
            EventType::BookingCreated => "booking_created",
            EventType::BookingStatusChanged => "booking_status_changed",
            EventType::NewReview => "new_review",
        }
    }
}

/// Notification rows are immutable apart from `is_read`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    pub id: NotificationId,
    #[serde(skip_serializing)]
    pub recipient: UserId,
    pub event_type: EventType,
    pub content: String,
    pub related_object_id: u64,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

/// Registration payload accepted by the account service.
#[derive(Debug, Clone, Deserialize)]
pub struct NewAccount {
    pub username: String,
    pub email: String,
    pub password: String,
    pub role: Role,
}

/// Listing payload. `owner`, `views` and `created_at` are assigned server-side,
/// so unknown fields carrying them are ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct NewProperty {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub location: String,
    pub price: Decimal,
    pub room_count: u32,
    pub property_type: PropertyType,
    #[serde(default)]
    pub status: PropertyStatus,
    #[serde(default)]
    pub categories: Vec<CategoryId>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PropertyChanges {
    pub title: Option<String>,
    pub description: Option<String>,
    pub location: Option<String>,
    pub price: Option<Decimal>,
    pub room_count: Option<u32>,
    pub property_type: Option<PropertyType>,
    pub status: Option<PropertyStatus>,
    pub categories: Option<Vec<CategoryId>>,
}

/// Property together with its category memberships.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PropertyListing {
    #[serde(flatten)]
    pub property: Property,
    pub categories: Vec<CategoryId>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewCategory {
    pub name: String,
}

/// Booking request. A client-supplied `status` is accepted for compatibility
/// and discarded; every booking starts out pending.
#[derive(Debug, Clone, Deserialize)]
pub struct NewBooking {
    pub property: PropertyId,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    #[serde(default)]
    pub status: Option<BookingStatus>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct BookingStatusChange {
    pub status: BookingStatus,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewReview {
    pub property: PropertyId,
    pub rating: i64,
    #[serde(default)]
    pub comment: String,
}
