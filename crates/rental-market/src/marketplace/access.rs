//! Authorization decisions for every marketplace resource.
//!
//! Two checkpoints exist per request. [`can_perform`] runs before the target
//! row is loaded and answers whether this class of actor may attempt the
//! action at all. [`can_perform_on`] runs once the concrete row (and its
//! owner) is known.

use super::domain::{
    Booking, Notification, Property, Review, Role, SearchHistory, User, UserId, ViewHistory,
};
use super::error::MarketplaceError;
use super::identity::Actor;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Read,
    /// Create, update, or delete.
    Write,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    User,
    Property,
    Category,
    Booking,
    Review,
    SearchHistory,
    ViewHistory,
    Notification,
}

/// Concrete row handed to the object-level check.
#[derive(Debug, Clone, Copy)]
pub enum Resource<'a> {
    User(&'a User),
    Property(&'a Property),
    Booking {
        booking: &'a Booking,
        property_owner: UserId,
    },
    Review(&'a Review),
    SearchHistory(&'a SearchHistory),
    ViewHistory(&'a ViewHistory),
    Notification(&'a Notification),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Denial {
    Unauthenticated,
    Forbidden,
    /// The row is outside the actor's scoped view and must look absent.
    Hidden,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny(Denial),
}

impl Decision {
    pub fn is_allowed(self) -> bool {
        matches!(self, Decision::Allow)
    }

    /// Convert a coarse decision into the service error taxonomy.
    pub fn permit(self) -> Result<(), MarketplaceError> {
        match self {
            Decision::Allow => Ok(()),
            Decision::Deny(Denial::Unauthenticated) => Err(MarketplaceError::Unauthenticated),
            Decision::Deny(Denial::Forbidden | Denial::Hidden) => Err(MarketplaceError::Forbidden),
        }
    }

    /// Like [`Decision::permit`], reporting hidden rows as missing.
    pub fn permit_on(
        self,
        resource: &'static str,
        id: impl std::fmt::Display,
    ) -> Result<(), MarketplaceError> {
        match self {
            Decision::Deny(Denial::Hidden) => Err(MarketplaceError::not_found(resource, id)),
            other => other.permit(),
        }
    }
}

fn authenticated_only(actor: &Actor) -> Decision {
    if actor.is_authenticated() {
        Decision::Allow
    } else {
        Decision::Deny(Denial::Unauthenticated)
    }
}

fn landlord_only(actor: &Actor) -> Decision {
    match actor.principal() {
        None => Decision::Deny(Denial::Unauthenticated),
        Some(principal) if principal.role == Role::Landlord => Decision::Allow,
        Some(_) => Decision::Deny(Denial::Forbidden),
    }
}

fn own_row(actor: &Actor, owner: UserId) -> Decision {
    match actor.id() {
        None => Decision::Deny(Denial::Unauthenticated),
        Some(id) if id == owner => Decision::Allow,
        Some(_) => Decision::Deny(Denial::Hidden),
    }
}

/// Coarse check, evaluated before the target row exists or is loaded.
pub fn can_perform(actor: &Actor, action: Action, kind: ResourceKind) -> Decision {
    match (kind, action) {
        (ResourceKind::User, Action::Read)
        | (ResourceKind::Property, Action::Read)
        | (ResourceKind::Category, Action::Read)
        | (ResourceKind::Review, Action::Read) => Decision::Allow,
        // Anonymous callers read an empty booking list rather than an error.
        (ResourceKind::Booking, Action::Read) => Decision::Allow,
        (ResourceKind::Booking, Action::Write) => {
            if actor.is_authenticated() {
                Decision::Allow
            } else {
                Decision::Deny(Denial::Forbidden)
            }
        }
        (ResourceKind::Property, Action::Write) | (ResourceKind::Category, Action::Write) => {
            landlord_only(actor)
        }
        (ResourceKind::User, Action::Write)
        | (ResourceKind::Review, Action::Write)
        | (ResourceKind::SearchHistory, _)
        | (ResourceKind::ViewHistory, _)
        | (ResourceKind::Notification, _) => authenticated_only(actor),
    }
}

/// Object-level check, evaluated once the concrete row is known.
pub fn can_perform_on(actor: &Actor, action: Action, resource: Resource<'_>) -> Decision {
    match resource {
        Resource::User(user) => match action {
            Action::Read => Decision::Allow,
            Action::Write => match actor.id() {
                None => Decision::Deny(Denial::Unauthenticated),
                Some(id) if id == user.id => Decision::Allow,
                Some(_) => Decision::Deny(Denial::Forbidden),
            },
        },
        Resource::Property(property) => match action {
            Action::Read => Decision::Allow,
            Action::Write => match landlord_only(actor) {
                Decision::Allow if actor.id() == Some(property.owner) => Decision::Allow,
                Decision::Allow => Decision::Deny(Denial::Forbidden),
                denied => denied,
            },
        },
        // Reads and writes share the same role-scoped view.
        Resource::Booking {
            booking,
            property_owner,
        } => match actor.principal() {
            None => Decision::Deny(Denial::Hidden),
            Some(principal) => {
                let visible = match principal.role {
                    Role::Tenant => booking.user == principal.id,
                    Role::Landlord => property_owner == principal.id,
                };
                if visible {
                    Decision::Allow
                } else {
                    Decision::Deny(Denial::Hidden)
                }
            }
        },
        Resource::Review(review) => match action {
            Action::Read => Decision::Allow,
            Action::Write => match actor.id() {
                None => Decision::Deny(Denial::Unauthenticated),
                Some(id) if id == review.user => Decision::Allow,
                Some(_) => Decision::Deny(Denial::Forbidden),
            },
        },
        Resource::SearchHistory(row) => own_row(actor, row.user),
        Resource::ViewHistory(row) => own_row(actor, row.user),
        Resource::Notification(row) => own_row(actor, row.recipient),
    }
}

/// Whether `booking` belongs in the actor's scoped booking list.
pub fn booking_visible_to(actor: &Actor, booking: &Booking, property_owner: UserId) -> bool {
    can_perform_on(
        actor,
        Action::Read,
        Resource::Booking {
            booking,
            property_owner,
        },
    )
    .is_allowed()
}
