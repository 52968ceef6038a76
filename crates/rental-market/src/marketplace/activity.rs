use std::sync::Arc;

use tracing::debug;

use super::access::{can_perform, Action, ResourceKind};
use super::domain::{PropertyId, SearchHistory, UserId, ViewHistory};
use super::error::MarketplaceError;
use super::identity::Actor;
use super::store::{MarketplaceStore, Tables};

/// Append-only search and property-view logging for authenticated actors.
///
/// Nothing is deduplicated: every search request and every detail read
/// produces its own row. Recording a view never touches `Property::views`.
pub struct ActivityRecorder<S> {
    store: Arc<S>,
}

impl<S> ActivityRecorder<S>
where
    S: MarketplaceStore + 'static,
{
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Returns `None` for anonymous actors, who leave no history.
    pub fn record_search(
        &self,
        actor: &Actor,
        keyword: &str,
    ) -> Result<Option<SearchHistory>, MarketplaceError> {
        let Some(principal) = actor.principal() else {
            return Ok(None);
        };
        let user = principal.id;

        let row = self.store.transaction(|tables| {
            let created_at = tables.stamp();
            Ok::<_, MarketplaceError>(tables.search_history.insert_with(|id| SearchHistory {
                id,
                user,
                keyword: keyword.to_string(),
                created_at,
            }))
        })?;
        debug!(%user, keyword, "search recorded");
        Ok(Some(row))
    }

    /// Returns `None` for anonymous actors; unknown properties are `NotFound`.
    pub fn record_view(
        &self,
        actor: &Actor,
        property: PropertyId,
    ) -> Result<Option<ViewHistory>, MarketplaceError> {
        let Some(principal) = actor.principal() else {
            return Ok(None);
        };
        let user = principal.id;

        let row = self.store.transaction(|tables| {
            if !tables.properties.contains(property) {
                return Err(MarketplaceError::not_found("property", property));
            }
            Ok(append_view(tables, user, property))
        })?;
        debug!(%user, %property, "property view recorded");
        Ok(Some(row))
    }

    pub fn searches_for(&self, actor: &Actor) -> Result<Vec<SearchHistory>, MarketplaceError> {
        can_perform(actor, Action::Read, ResourceKind::SearchHistory).permit()?;
        let user = actor.require()?.id;
        Ok(self.store.read(|tables| {
            tables
                .search_history()
                .filter(|row| row.user == user)
                .cloned()
                .collect()
        })?)
    }

    pub fn views_for(&self, actor: &Actor) -> Result<Vec<ViewHistory>, MarketplaceError> {
        can_perform(actor, Action::Read, ResourceKind::ViewHistory).permit()?;
        let user = actor.require()?.id;
        Ok(self.store.read(|tables| {
            tables
                .view_history()
                .filter(|row| row.user == user)
                .cloned()
                .collect()
        })?)
    }
}

/// Appends one view row inside the caller's transaction.
pub(crate) fn append_view(tables: &mut Tables, user: UserId, property: PropertyId) -> ViewHistory {
    let created_at = tables.stamp();
    tables.view_history.insert_with(|id| ViewHistory {
        id,
        user,
        property,
        created_at,
    })
}
