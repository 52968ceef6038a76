use std::sync::Arc;

use tracing::info;

use super::access::{can_perform, can_perform_on, Action, Resource, ResourceKind};
use super::domain::{Booking, EventType, Notification, NotificationId, Property, Review, UserId};
use super::error::MarketplaceError;
use super::identity::Actor;
use super::store::{MarketplaceStore, Tables};

/// Fully resolved notification, built from the triggering rows before the
/// write so content never depends on later state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationDraft {
    pub event_type: EventType,
    pub recipient: UserId,
    pub related_object_id: u64,
    pub content: String,
}

impl NotificationDraft {
    /// Addressed to the landlord who owns the booked property.
    pub fn booking_created(booking: &Booking, tenant: &str, property: &Property) -> Self {
        Self {
            event_type: EventType::BookingCreated,
            recipient: property.owner,
            related_object_id: booking.id.0,
            content: format!(
                "New booking created by {tenant} for property {}.",
                property.title
            ),
        }
    }

    /// Addressed to the tenant who made the booking.
    pub fn booking_status_changed(booking: &Booking, property: &Property) -> Self {
        Self {
            event_type: EventType::BookingStatusChanged,
            recipient: booking.user,
            related_object_id: booking.id.0,
            content: format!(
                "Booking status changed to {} for property {}.",
                booking.status, property.title
            ),
        }
    }

    pub fn new_review(review: &Review, author: &str, property: &Property) -> Self {
        Self {
            event_type: EventType::NewReview,
            recipient: property.owner,
            related_object_id: review.id.0,
            content: format!(
                "New review from {author} on property {}.",
                property.title
            ),
        }
    }
}

/// Append one unread notification inside the caller's transaction.
pub(crate) fn dispatch(tables: &mut Tables, draft: NotificationDraft) -> Notification {
    let created_at = tables.stamp();
    let notification = tables.notifications.insert_with(|id| Notification {
        id,
        recipient: draft.recipient,
        event_type: draft.event_type,
        content: draft.content,
        related_object_id: draft.related_object_id,
        is_read: false,
        created_at,
    });
    info!(
        notification_id = %notification.id,
        recipient = %notification.recipient,
        event = notification.event_type.label(),
        "notification dispatched"
    );
    notification
}

/// Recipient-scoped read access to notifications.
pub struct NotificationDispatcher<S> {
    store: Arc<S>,
}

impl<S> NotificationDispatcher<S>
where
    S: MarketplaceStore + 'static,
{
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Every notification addressed to the actor, newest first. Rows sharing a
    /// timestamp keep their insertion order.
    pub fn list_for(&self, actor: &Actor) -> Result<Vec<Notification>, MarketplaceError> {
        can_perform(actor, Action::Read, ResourceKind::Notification).permit()?;
        let recipient = actor.require()?.id;

        let mut rows = self.store.read(|tables| {
            tables
                .notifications()
                .filter(|row| row.recipient == recipient)
                .cloned()
                .collect::<Vec<_>>()
        })?;
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(rows)
    }

    pub fn unread_count(&self, actor: &Actor) -> Result<usize, MarketplaceError> {
        Ok(self
            .list_for(actor)?
            .iter()
            .filter(|row| !row.is_read)
            .count())
    }

    /// Flag a notification as read. Only its recipient may do so; anyone else
    /// sees it as missing.
    pub fn mark_read(
        &self,
        actor: &Actor,
        id: NotificationId,
    ) -> Result<Notification, MarketplaceError> {
        can_perform(actor, Action::Write, ResourceKind::Notification).permit()?;

        self.store.transaction(|tables| {
            let current = tables
                .notifications
                .get(id)
                .ok_or_else(|| MarketplaceError::not_found("notification", id))?;
            can_perform_on(actor, Action::Write, Resource::Notification(current))
                .permit_on("notification", id)?;

            let row = tables
                .notifications
                .get_mut(id)
                .ok_or_else(|| MarketplaceError::not_found("notification", id))?;
            row.is_read = true;
            Ok::<_, MarketplaceError>(row.clone())
        })
    }
}
