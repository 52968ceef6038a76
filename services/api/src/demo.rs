use chrono::NaiveDate;
use clap::Args;
use rental_market::error::AppError;
use rental_market::marketplace::{
    Actor, BookingStatus, InMemoryStore, Marketplace, NewAccount, NewBooking, NewProperty,
    NewReview, PropertyQuery, PropertyStatus, PropertyType, Role,
};
use rust_decimal::Decimal;
use std::sync::Arc;

#[derive(Args, Debug)]
pub(crate) struct DemoArgs {
    /// First night of the stay (YYYY-MM-DD)
    #[arg(long, value_parser = crate::infra::parse_date, default_value = "2024-12-01")]
    pub(crate) start_date: NaiveDate,
    /// Last night of the stay (YYYY-MM-DD)
    #[arg(long, value_parser = crate::infra::parse_date, default_value = "2024-12-10")]
    pub(crate) end_date: NaiveDate,
    /// Have the landlord cancel the booking instead of confirming it.
    #[arg(long)]
    pub(crate) cancel: bool,
    /// Skip posting a review after the booking is decided.
    #[arg(long)]
    pub(crate) skip_review: bool,
}

/// Outcome of one walkthrough, kept separate from rendering so it can be asserted on.
#[derive(Debug)]
pub(crate) struct DemoOutcome {
    pub(crate) booking_status: BookingStatus,
    pub(crate) landlord_inbox: Vec<String>,
    pub(crate) tenant_inbox: Vec<String>,
    pub(crate) outsider_lookup: String,
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    println!("Rental marketplace demo");
    let outcome = walkthrough(&args)?;
    render_outcome(&outcome);
    Ok(())
}

fn account(username: &str, role: Role) -> NewAccount {
    NewAccount {
        username: username.to_string(),
        email: format!("{username}@example.com"),
        password: "demo-password".to_string(),
        role,
    }
}

pub(crate) fn walkthrough(args: &DemoArgs) -> Result<DemoOutcome, AppError> {
    let marketplace = Marketplace::new(
        Arc::new(InMemoryStore::new()),
        chrono::Duration::minutes(60),
    );

    let landlord = marketplace.accounts.register(account("landlord", Role::Landlord))?;
    let tenant = marketplace.accounts.register(account("tenant1", Role::Tenant))?;
    let outsider = marketplace.accounts.register(account("tenant2", Role::Tenant))?;
    let landlord = Actor::user(landlord.id, landlord.role);
    let tenant = Actor::user(tenant.id, tenant.role);
    let outsider = Actor::user(outsider.id, outsider.role);
    println!("- registered landlord, tenant1 and tenant2");

    let listing = marketplace.properties.create(
        &landlord,
        NewProperty {
            title: "Sample Property".to_string(),
            description: "Two rooms near the river".to_string(),
            location: "Berlin".to_string(),
            price: Decimal::from(1000),
            room_count: 2,
            property_type: PropertyType::Apartment,
            status: PropertyStatus::Active,
            categories: Vec::new(),
        },
    )?;
    println!(
        "- listed '{}' in {} for {}",
        listing.property.title, listing.property.location, listing.property.price
    );

    let found = marketplace.properties.list(
        &tenant,
        &PropertyQuery {
            location: Some("Berlin".to_string()),
            search: Some("river".to_string()),
            ..PropertyQuery::default()
        },
    )?;
    println!("- tenant1 searched Berlin for 'river': {} match(es)", found.len());

    let booking = marketplace.bookings.create(
        &tenant,
        NewBooking {
            property: listing.property.id,
            start_date: args.start_date,
            end_date: args.end_date,
            status: None,
        },
    )?;
    println!(
        "- tenant1 booked {} to {} (status {})",
        booking.start_date, booking.end_date, booking.status
    );

    let decision = if args.cancel {
        BookingStatus::Canceled
    } else {
        BookingStatus::Confirmed
    };
    let booking = marketplace
        .bookings
        .update_status(&landlord, booking.id, decision)?;
    println!("- landlord set booking {} to {}", booking.id, booking.status);

    let outsider_lookup = match marketplace.bookings.get(&outsider, booking.id) {
        Ok(_) => "visible".to_string(),
        Err(err) => err.to_string(),
    };

    if !args.skip_review {
        marketplace.reviews.create(
            &tenant,
            NewReview {
                property: listing.property.id,
                rating: 5,
                comment: "Bright and quiet".to_string(),
            },
        )?;
        println!("- tenant1 reviewed the property");
    }

    let contents = |actor: &Actor| -> Result<Vec<String>, AppError> {
        Ok(marketplace
            .notifications
            .list_for(actor)?
            .into_iter()
            .map(|row| row.content)
            .collect())
    };

    Ok(DemoOutcome {
        booking_status: booking.status,
        landlord_inbox: contents(&landlord)?,
        tenant_inbox: contents(&tenant)?,
        outsider_lookup,
    })
}

fn render_outcome(outcome: &DemoOutcome) {
    println!("\nFinal booking status: {}", outcome.booking_status);
    println!("tenant2 looking up the booking: {}", outcome.outsider_lookup);

    for (label, inbox) in [
        ("landlord", &outcome.landlord_inbox),
        ("tenant1", &outcome.tenant_inbox),
    ] {
        if inbox.is_empty() {
            println!("\nNotifications for {label}: none");
            continue;
        }
        println!("\nNotifications for {label} (newest first)");
        for content in inbox {
            println!("- {content}");
        }
    }
}
