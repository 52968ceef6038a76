use std::sync::Arc;

use serde::Deserialize;
use tracing::info;

use super::access::{can_perform, Action, ResourceKind};
use super::domain::{NewReview, PropertyId, Review, ReviewId};
use super::error::MarketplaceError;
use super::identity::Actor;
use super::notifications::{dispatch, NotificationDraft};
use super::store::MarketplaceStore;

const RATING_RANGE: std::ops::RangeInclusive<i64> = 1..=5;

#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct ReviewFilter {
    pub property: Option<PropertyId>,
}

/// Review creation and public reads. Reviews are not edited or deleted here.
pub struct ReviewService<S> {
    store: Arc<S>,
}

impl<S> ReviewService<S>
where
    S: MarketplaceStore + 'static,
{
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Any authenticated actor may review a property; its owner is notified.
    pub fn create(&self, actor: &Actor, request: NewReview) -> Result<Review, MarketplaceError> {
        can_perform(actor, Action::Write, ResourceKind::Review).permit()?;
        let author = actor.require()?.id;

        if !RATING_RANGE.contains(&request.rating) {
            return Err(MarketplaceError::invalid(
                "rating",
                "must be an integer between 1 and 5",
            ));
        }
        let rating = u8::try_from(request.rating)
            .map_err(|_| MarketplaceError::invalid("rating", "out of range"))?;

        let review = self.store.transaction(|tables| {
            let property = tables
                .properties
                .get(request.property)
                .cloned()
                .ok_or_else(|| MarketplaceError::not_found("property", request.property))?;
            let username = tables
                .users
                .get(author)
                .map(|user| user.username.clone())
                .ok_or(MarketplaceError::Unauthenticated)?;

            let created_at = tables.stamp();
            let review = tables.reviews.insert_with(|id| Review {
                id,
                property: property.id,
                user: author,
                rating,
                comment: request.comment,
                created_at,
            });
            dispatch(
                tables,
                NotificationDraft::new_review(&review, &username, &property),
            );
            Ok::<_, MarketplaceError>(review)
        })?;

        info!(review_id = %review.id, property_id = %review.property, rating, "review posted");
        Ok(review)
    }

    pub fn get(&self, id: ReviewId) -> Result<Review, MarketplaceError> {
        self.store
            .read(|tables| tables.reviews().get(id).cloned())?
            .ok_or_else(|| MarketplaceError::not_found("review", id))
    }

    pub fn list(&self, filter: ReviewFilter) -> Result<Vec<Review>, MarketplaceError> {
        Ok(self.store.read(|tables| {
            tables
                .reviews()
                .filter(|review| filter.property.map_or(true, |id| review.property == id))
                .cloned()
                .collect()
        })?)
    }
}
