use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use axum::response::Response;
use chrono::{Duration, NaiveDate};
use rust_decimal::Decimal;
use serde_json::Value;

use crate::marketplace::domain::{
    NewAccount, NewBooking, NewProperty, PropertyListing, PropertyStatus, PropertyType, Role,
};
use crate::marketplace::identity::Actor;
use crate::marketplace::store::{InMemoryStore, MarketplaceStore, StoreError, Tables};
use crate::marketplace::Marketplace;

pub(super) fn marketplace() -> Marketplace<InMemoryStore> {
    Marketplace::new(Arc::new(InMemoryStore::new()), Duration::minutes(30))
}

pub(super) fn register<S>(marketplace: &Marketplace<S>, username: &str, role: Role) -> Actor
where
    S: MarketplaceStore + 'static,
{
    let profile = marketplace
        .accounts
        .register(NewAccount {
            username: username.to_string(),
            email: format!("{username}@example.com"),
            password: "password123".to_string(),
            role,
        })
        .expect("registration succeeds");
    Actor::user(profile.id, profile.role)
}

pub(super) fn property_request(title: &str, location: &str, price: i64) -> NewProperty {
    NewProperty {
        title: title.to_string(),
        description: format!("Description of {title}"),
        location: location.to_string(),
        price: Decimal::from(price),
        room_count: 2,
        property_type: PropertyType::Apartment,
        status: PropertyStatus::Active,
        categories: Vec::new(),
    }
}

pub(super) fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).expect("valid date")
}

pub(super) fn booking_request(listing: &PropertyListing) -> NewBooking {
    NewBooking {
        property: listing.property.id,
        start_date: date(2024, 12, 1),
        end_date: date(2024, 12, 10),
        status: None,
    }
}

/// Landlord with one Berlin listing plus a tenant, the baseline for most
/// lifecycle scenarios.
pub(super) struct Scenario<S> {
    pub(super) marketplace: Marketplace<S>,
    pub(super) landlord: Actor,
    pub(super) tenant: Actor,
    pub(super) listing: PropertyListing,
}

pub(super) fn scenario() -> Scenario<InMemoryStore> {
    scenario_on(Arc::new(InMemoryStore::new()))
}

pub(super) fn scenario_on<S>(store: Arc<S>) -> Scenario<S>
where
    S: MarketplaceStore + 'static,
{
    let marketplace = Marketplace::new(store, Duration::minutes(30));
    let landlord = register(&marketplace, "landlord", Role::Landlord);
    let tenant = register(&marketplace, "tenant1", Role::Tenant);
    let listing = marketplace
        .properties
        .create(&landlord, property_request("Sample Property", "Berlin", 1000))
        .expect("landlord can list");
    Scenario {
        marketplace,
        landlord,
        tenant,
        listing,
    }
}

/// Store whose commits can be switched off, leaving the live tables untouched.
#[derive(Default)]
pub(super) struct RejectingCommitStore {
    tables: Mutex<Tables>,
    reject: AtomicBool,
}

impl RejectingCommitStore {
    pub(super) fn reject_commits(&self) {
        self.reject.store(true, Ordering::SeqCst);
    }
}

impl MarketplaceStore for RejectingCommitStore {
    fn read<T>(&self, query: impl FnOnce(&Tables) -> T) -> Result<T, StoreError> {
        let guard = self.tables.lock().expect("store mutex poisoned");
        Ok(query(&guard))
    }

    fn transaction<T, E>(&self, work: impl FnOnce(&mut Tables) -> Result<T, E>) -> Result<T, E>
    where
        E: From<StoreError>,
    {
        let mut guard = self.tables.lock().expect("store mutex poisoned");
        let outcome = match work(&mut *guard) {
            Ok(outcome) => outcome,
            Err(err) => {
                guard.rollback();
                return Err(err);
            }
        };
        if self.reject.load(Ordering::SeqCst) {
            guard.rollback();
            return Err(StoreError::Unavailable("commit rejected".to_string()).into());
        }
        guard.commit();
        Ok(outcome)
    }
}

pub(super) struct UnavailableStore;

impl MarketplaceStore for UnavailableStore {
    fn read<T>(&self, _query: impl FnOnce(&Tables) -> T) -> Result<T, StoreError> {
        Err(StoreError::Unavailable("database offline".to_string()))
    }

    fn transaction<T, E>(&self, _work: impl FnOnce(&mut Tables) -> Result<T, E>) -> Result<T, E>
    where
        E: From<StoreError>,
    {
        Err(StoreError::Unavailable("database offline".to_string()).into())
    }
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
