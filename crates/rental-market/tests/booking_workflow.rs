use std::sync::Arc;

use chrono::{Duration, NaiveDate};
use rental_market::marketplace::{
    Actor, BookingStatus, Credentials, EventType, IdentityProvider, InMemoryStore, Marketplace,
    MarketplaceError, NewAccount, NewBooking, NewProperty, PropertyQuery, PropertyStatus,
    PropertyType, Role,
};
use rust_decimal::Decimal;

fn marketplace() -> Marketplace<InMemoryStore> {
    Marketplace::new(Arc::new(InMemoryStore::new()), Duration::minutes(15))
}

/// Registers an account and logs in through the token provider, the way an
/// HTTP client would.
fn sign_in(marketplace: &Marketplace<InMemoryStore>, username: &str, role: Role) -> Actor {
    marketplace
        .accounts
        .register(NewAccount {
            username: username.to_string(),
            email: format!("{username}@example.com"),
            password: "password123".to_string(),
            role,
        })
        .expect("account registers");
    let token = marketplace
        .identity
        .issue(&Credentials {
            username: username.to_string(),
            password: "password123".to_string(),
        })
        .expect("login succeeds");
    marketplace
        .identity
        .verify(&token.access)
        .expect("token resolves to an actor")
}

fn listing(title: &str, description: &str, location: &str, price: i64) -> NewProperty {
    NewProperty {
        title: title.to_string(),
        description: description.to_string(),
        location: location.to_string(),
        price: Decimal::from(price),
        room_count: 2,
        property_type: PropertyType::Apartment,
        status: PropertyStatus::Active,
        categories: Vec::new(),
    }
}

fn day(month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, month, day).expect("valid date")
}

#[test]
fn berlin_booking_is_confirmed_and_hidden_from_other_tenants() {
    let marketplace = marketplace();
    let landlord = sign_in(&marketplace, "landlord", Role::Landlord);
    let tenant = sign_in(&marketplace, "tenant1", Role::Tenant);
    let other_tenant = sign_in(&marketplace, "tenant2", Role::Tenant);

    let property = marketplace
        .properties
        .create(&landlord, listing("Sample Property", "", "Berlin", 1000))
        .expect("landlord lists property");

    let booking = marketplace
        .bookings
        .create(
            &tenant,
            NewBooking {
                property: property.property.id,
                start_date: day(12, 1),
                end_date: day(12, 10),
                status: Some(BookingStatus::Confirmed),
            },
        )
        .expect("tenant books");
    assert_eq!(booking.status, BookingStatus::Pending);

    let landlord_inbox = marketplace
        .notifications
        .list_for(&landlord)
        .expect("landlord inbox");
    assert_eq!(landlord_inbox.len(), 1);
    assert_eq!(landlord_inbox[0].event_type, EventType::BookingCreated);

    let confirmed = marketplace
        .bookings
        .update_status(&landlord, booking.id, BookingStatus::Confirmed)
        .expect("landlord confirms");
    assert_eq!(confirmed.status, BookingStatus::Confirmed);

    let tenant_inbox = marketplace
        .notifications
        .list_for(&tenant)
        .expect("tenant inbox");
    assert_eq!(tenant_inbox.len(), 1);
    assert_eq!(tenant_inbox[0].event_type, EventType::BookingStatusChanged);
    assert_eq!(tenant_inbox[0].related_object_id, booking.id.0);

    let hidden = marketplace
        .bookings
        .get(&other_tenant, booking.id)
        .expect_err("other tenant cannot see it");
    assert!(matches!(hidden, MarketplaceError::NotFound { .. }));
    assert_eq!(hidden.status_code().as_u16(), 404);
}

#[test]
fn location_price_and_search_filters_compose() {
    let marketplace = marketplace();
    let landlord = sign_in(&marketplace, "landlord", Role::Landlord);
    let tenant = sign_in(&marketplace, "tenant1", Role::Tenant);

    let properties = &marketplace.properties;
    let affordable = properties
        .create(&landlord, listing("Altbau", "Light and quiet", "Berlin", 1200))
        .expect("affordable");
    properties
        .create(&landlord, listing("Penthouse", "Roof terrace", "Berlin", 2500))
        .expect("expensive");
    properties
        .create(&landlord, listing("Riverside", "Near the Elbe", "Hamburg", 900))
        .expect("elsewhere");
    let cyrillic = properties
        .create(
            &landlord,
            listing("Студия", "Небольшая квартира в центре", "Minsk", 500),
        )
        .expect("cyrillic listing");

    let berlin = properties
        .list(
            &Actor::Anonymous,
            &PropertyQuery {
                location: Some("Berlin".to_string()),
                price_max: Some(Decimal::from(1500)),
                ..PropertyQuery::default()
            },
        )
        .expect("filtered listing");
    assert_eq!(berlin.len(), 1);
    assert_eq!(berlin[0].property.id, affordable.property.id);

    let search = PropertyQuery {
        search: Some("квартира".to_string()),
        ..PropertyQuery::default()
    };
    let anonymous_hits = properties
        .list(&Actor::Anonymous, &search)
        .expect("anonymous search");
    let tenant_hits = properties.list(&tenant, &search).expect("tenant search");
    assert_eq!(anonymous_hits, tenant_hits);
    assert_eq!(tenant_hits.len(), 1);
    assert_eq!(tenant_hits[0].property.id, cyrillic.property.id);

    let history = marketplace
        .activity
        .searches_for(&tenant)
        .expect("search history");
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].keyword, "квартира");
}

#[test]
fn anonymous_writes_leave_no_rows_behind() {
    let marketplace = marketplace();
    let landlord = sign_in(&marketplace, "landlord", Role::Landlord);
    let property = marketplace
        .properties
        .create(&landlord, listing("Sample Property", "", "Berlin", 1000))
        .expect("listing");

    let anonymous = Actor::Anonymous;
    assert!(marketplace
        .properties
        .create(&anonymous, listing("Ghost", "", "Berlin", 1))
        .is_err());
    assert!(marketplace
        .bookings
        .create(
            &anonymous,
            NewBooking {
                property: property.property.id,
                start_date: day(12, 1),
                end_date: day(12, 2),
                status: None,
            },
        )
        .is_err());

    let all = marketplace
        .properties
        .list(&anonymous, &PropertyQuery::default())
        .expect("catalog");
    assert_eq!(all.len(), 1);
    assert!(marketplace
        .notifications
        .list_for(&landlord)
        .expect("inbox")
        .is_empty());
}
