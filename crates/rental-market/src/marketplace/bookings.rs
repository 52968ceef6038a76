use std::sync::Arc;

use tracing::{debug, info, warn};

use super::access::{
    booking_visible_to, can_perform, can_perform_on, Action, Resource, ResourceKind,
};
use super::domain::{Booking, BookingId, BookingStatus, NewBooking};
use super::error::MarketplaceError;
use super::identity::Actor;
use super::notifications::{dispatch, NotificationDraft};
use super::store::{MarketplaceStore, Tables};

/// Booking lifecycle: creation, status transitions and removal.
///
/// Every state change and the notification it triggers are written in one
/// store transaction, so a failed notification write leaves no booking change
/// behind and two concurrent transitions on one booking cannot interleave.
pub struct BookingService<S> {
    store: Arc<S>,
}

/// Loads a booking and runs the scoped object check, reporting hidden rows as
/// missing.
fn visible_booking(
    tables: &Tables,
    actor: &Actor,
    action: Action,
    id: BookingId,
) -> Result<Booking, MarketplaceError> {
    let booking = tables
        .bookings
        .get(id)
        .ok_or_else(|| MarketplaceError::not_found("booking", id))?;
    let property_owner = tables
        .property_owner(booking.property)
        .ok_or_else(|| MarketplaceError::not_found("booking", id))?;
    can_perform_on(
        actor,
        action,
        Resource::Booking {
            booking,
            property_owner,
        },
    )
    .permit_on("booking", id)?;
    Ok(booking.clone())
}

impl<S> BookingService<S>
where
    S: MarketplaceStore + 'static,
{
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Book a property for the requesting actor. The booking always starts
    /// out `pending` and the property owner is notified.
    pub fn create(&self, actor: &Actor, request: NewBooking) -> Result<Booking, MarketplaceError> {
        can_perform(actor, Action::Write, ResourceKind::Booking).permit()?;
        let tenant = actor.require().map_err(|_| MarketplaceError::Forbidden)?.id;

        if request.end_date < request.start_date {
            return Err(MarketplaceError::invalid(
                "end_date",
                "must not be earlier than start_date",
            ));
        }
        if let Some(requested) = request.status {
            if requested != BookingStatus::Pending {
                debug!(requested = requested.label(), "ignoring client-supplied booking status");
            }
        }

        let booking = self.store.transaction(|tables| {
            let property = tables
                .properties
                .get(request.property)
                .cloned()
                .ok_or_else(|| MarketplaceError::not_found("property", request.property))?;
            let username = tables
                .users
                .get(tenant)
                .map(|user| user.username.clone())
                .ok_or(MarketplaceError::Unauthenticated)?;

            let created_at = tables.stamp();
            let booking = tables.bookings.insert_with(|id| Booking {
                id,
                property: property.id,
                user: tenant,
                start_date: request.start_date,
                end_date: request.end_date,
                status: BookingStatus::Pending,
                created_at,
            });
            dispatch(
                tables,
                NotificationDraft::booking_created(&booking, &username, &property),
            );
            Ok::<_, MarketplaceError>(booking)
        })?;

        info!(booking_id = %booking.id, property_id = %booking.property, %tenant, "booking created");
        Ok(booking)
    }

    /// Move a pending booking to `confirmed` or `canceled` and notify the
    /// tenant who made it.
    pub fn update_status(
        &self,
        actor: &Actor,
        id: BookingId,
        status: BookingStatus,
    ) -> Result<Booking, MarketplaceError> {
        can_perform(actor, Action::Write, ResourceKind::Booking).permit()?;

        let updated: Result<Booking, MarketplaceError> = self.store.transaction(|tables| {
            let current = visible_booking(tables, actor, Action::Write, id)?;
            if !current.status.can_transition_to(status) {
                return Err(MarketplaceError::invalid(
                    "status",
                    format!("cannot change booking status from {} to {}", current.status, status),
                ));
            }
            let property = tables
                .properties
                .get(current.property)
                .cloned()
                .ok_or_else(|| MarketplaceError::not_found("booking", id))?;

            let booking = tables
                .bookings
                .get_mut(id)
                .ok_or_else(|| MarketplaceError::not_found("booking", id))?;
            booking.status = status;
            let booking = booking.clone();

            dispatch(
                tables,
                NotificationDraft::booking_status_changed(&booking, &property),
            );
            Ok(booking)
        });

        match updated {
            Ok(booking) => {
                info!(booking_id = %id, status = status.label(), "booking status changed");
                Ok(booking)
            }
            Err(err @ MarketplaceError::Storage(_)) => {
                warn!(booking_id = %id, error = %err, "booking status change not persisted");
                Err(err)
            }
            Err(err) => Err(err),
        }
    }

    /// Remove a booking within the actor's scope. No notification is sent.
    pub fn delete(&self, actor: &Actor, id: BookingId) -> Result<(), MarketplaceError> {
        can_perform(actor, Action::Write, ResourceKind::Booking).permit()?;

        self.store.transaction(|tables| {
            visible_booking(tables, actor, Action::Write, id)?;
            tables.bookings.remove(id);
            Ok::<_, MarketplaceError>(())
        })?;

        info!(booking_id = %id, "booking deleted");
        Ok(())
    }

    pub fn get(&self, actor: &Actor, id: BookingId) -> Result<Booking, MarketplaceError> {
        can_perform(actor, Action::Read, ResourceKind::Booking).permit()?;
        self.store
            .read(|tables| visible_booking(tables, actor, Action::Read, id))?
    }

    /// Bookings the actor may see: a tenant's own bookings, or bookings on a
    /// landlord's properties. Anonymous actors get an empty list.
    pub fn list(&self, actor: &Actor) -> Result<Vec<Booking>, MarketplaceError> {
        can_perform(actor, Action::Read, ResourceKind::Booking).permit()?;
        if !actor.is_authenticated() {
            return Ok(Vec::new());
        }

        Ok(self.store.read(|tables| {
            tables
                .bookings()
                .filter(|booking| {
                    tables
                        .property_owner(booking.property)
                        .is_some_and(|owner| booking_visible_to(actor, booking, owner))
                })
                .cloned()
                .collect()
        })?)
    }
}
