//! Property-rental marketplace core: identity, authorization, and the
//! booking/review lifecycles with their notification side effects.

pub mod access;
pub mod accounts;
pub mod activity;
pub mod bookings;
pub mod catalog;
pub mod domain;
pub mod error;
pub mod identity;
pub mod notifications;
pub mod reviews;
pub mod router;
pub mod store;

#[cfg(test)]
mod tests;

use std::sync::Arc;

use chrono::Duration;

pub use accounts::AccountService;
pub use activity::ActivityRecorder;
pub use bookings::BookingService;
pub use catalog::{CategoryService, PropertyOrdering, PropertyQuery, PropertyService};
pub use domain::{
    Booking, BookingId, BookingStatus, BookingStatusChange, Category, CategoryId, EventType,
    NewAccount, NewBooking, NewCategory, NewProperty, NewReview, Notification, NotificationId,
    Property, PropertyChanges, PropertyId, PropertyListing, PropertyStatus, PropertyType, Review,
    ReviewId, Role, SearchHistory, User, UserId, UserProfile, ViewHistory,
};
pub use error::MarketplaceError;
pub use identity::{
    Actor, Credentials, IdentityError, IdentityProvider, IssuedToken, Principal,
    TokenIdentityProvider,
};
pub use notifications::NotificationDispatcher;
pub use reviews::{ReviewFilter, ReviewService};
pub use router::marketplace_router;
pub use store::{InMemoryStore, MarketplaceStore, StoreError, Tables};

/// Every lifecycle service wired against one shared store.
pub struct Marketplace<S> {
    pub accounts: AccountService<S>,
    pub identity: TokenIdentityProvider<S>,
    pub categories: CategoryService<S>,
    pub properties: PropertyService<S>,
    pub bookings: BookingService<S>,
    pub reviews: ReviewService<S>,
    pub notifications: NotificationDispatcher<S>,
    pub activity: ActivityRecorder<S>,
}

impl<S> Marketplace<S>
where
    S: MarketplaceStore + 'static,
{
    pub fn new(store: Arc<S>, token_ttl: Duration) -> Self {
        Self {
            accounts: AccountService::new(store.clone()),
            identity: TokenIdentityProvider::new(store.clone(), token_ttl),
            categories: CategoryService::new(store.clone()),
            properties: PropertyService::new(store.clone()),
            bookings: BookingService::new(store.clone()),
            reviews: ReviewService::new(store.clone()),
            notifications: NotificationDispatcher::new(store.clone()),
            activity: ActivityRecorder::new(store),
        }
    }

    /// Delete the actor's own account and revoke every token it still holds.
    pub fn remove_account(&self, actor: &Actor, id: UserId) -> Result<(), MarketplaceError> {
        self.accounts.delete(actor, id)?;
        self.identity.revoke_sessions(id)?;
        Ok(())
    }
}
