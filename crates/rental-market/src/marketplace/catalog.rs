use std::cmp::Ordering;
use std::sync::Arc;

use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::{debug, info};

use super::access::{can_perform, can_perform_on, Action, Resource, ResourceKind};
use super::activity::{append_view, ActivityRecorder};
use super::domain::{
    Category, CategoryId, NewCategory, NewProperty, Property, PropertyChanges, PropertyId,
    PropertyListing, PropertyType,
};
use super::error::MarketplaceError;
use super::identity::Actor;
use super::store::{MarketplaceStore, Tables};

/// Sort order accepted by the property listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
pub enum PropertyOrdering {
    #[serde(rename = "price")]
    Price,
    #[serde(rename = "-price")]
    PriceDesc,
    #[serde(rename = "created_at")]
    CreatedAt,
    #[default]
    #[serde(rename = "-created_at")]
    CreatedAtDesc,
}

impl PropertyOrdering {
    fn compare(self, a: &Property, b: &Property) -> Ordering {
        let primary = match self {
            PropertyOrdering::Price => a.price.cmp(&b.price),
            PropertyOrdering::PriceDesc => b.price.cmp(&a.price),
            PropertyOrdering::CreatedAt => a.created_at.cmp(&b.created_at),
            PropertyOrdering::CreatedAtDesc => b.created_at.cmp(&a.created_at),
        };
        primary.then_with(|| a.id.cmp(&b.id))
    }
}

/// Listing filters. Field names follow the public query-string contract.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PropertyQuery {
    #[serde(rename = "price__gte")]
    pub price_min: Option<Decimal>,
    #[serde(rename = "price__lte")]
    pub price_max: Option<Decimal>,
    pub location: Option<String>,
    #[serde(rename = "room_count__gte")]
    pub rooms_min: Option<u32>,
    #[serde(rename = "room_count__lte")]
    pub rooms_max: Option<u32>,
    pub property_type: Option<PropertyType>,
    pub search: Option<String>,
    #[serde(default)]
    pub ordering: PropertyOrdering,
}

impl PropertyQuery {
    /// Search parameter exactly as sent, if non-empty. This is what lands in
    /// search history.
    pub fn search_keyword(&self) -> Option<&str> {
        self.search.as_deref().filter(|keyword| !keyword.is_empty())
    }

    /// Trimmed search term used for matching, if one was supplied.
    pub fn search_term(&self) -> Option<&str> {
        self.search
            .as_deref()
            .map(str::trim)
            .filter(|term| !term.is_empty())
    }

    pub fn matches(&self, property: &Property) -> bool {
        if self.price_min.is_some_and(|min| property.price < min)
            || self.price_max.is_some_and(|max| property.price > max)
            || self.rooms_min.is_some_and(|min| property.room_count < min)
            || self.rooms_max.is_some_and(|max| property.room_count > max)
        {
            return false;
        }
        if let Some(location) = &self.location {
            if &property.location != location {
                return false;
            }
        }
        if self
            .property_type
            .is_some_and(|kind| property.property_type != kind)
        {
            return false;
        }
        match self.search_term() {
            Some(term) => {
                let needle = term.to_lowercase();
                property.title.to_lowercase().contains(&needle)
                    || property.description.to_lowercase().contains(&needle)
            }
            None => true,
        }
    }
}

fn listing(tables: &Tables, property: Property) -> PropertyListing {
    let categories = tables.categories_of(property.id);
    PropertyListing {
        property,
        categories,
    }
}

fn validate_text(field: &'static str, value: &str) -> Result<(), MarketplaceError> {
    if value.trim().is_empty() {
        return Err(MarketplaceError::invalid(field, "must not be blank"));
    }
    Ok(())
}

fn validate_price(price: Decimal) -> Result<(), MarketplaceError> {
    if price.is_sign_negative() && !price.is_zero() {
        return Err(MarketplaceError::invalid("price", "must not be negative"));
    }
    Ok(())
}

fn validate_categories(tables: &Tables, categories: &[CategoryId]) -> Result<(), MarketplaceError> {
    match categories
        .iter()
        .find(|id| !tables.categories.contains(**id))
    {
        Some(missing) => Err(MarketplaceError::invalid(
            "categories",
            format!("category {missing} does not exist"),
        )),
        None => Ok(()),
    }
}

pub struct CategoryService<S> {
    store: Arc<S>,
}

impl<S> CategoryService<S>
where
    S: MarketplaceStore + 'static,
{
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Landlords curate categories. Duplicate names are allowed.
    pub fn create(
        &self,
        actor: &Actor,
        category: NewCategory,
    ) -> Result<Category, MarketplaceError> {
        can_perform(actor, Action::Write, ResourceKind::Category).permit()?;
        let name = category.name.trim().to_string();
        validate_text("name", &name)?;

        Ok(self.store.transaction(|tables| {
            Ok::<_, MarketplaceError>(
                tables
                    .categories
                    .insert_with(|id| Category { id, name }),
            )
        })?)
    }

    pub fn list(&self) -> Result<Vec<Category>, MarketplaceError> {
        Ok(self
            .store
            .read(|tables| tables.categories().iter().cloned().collect())?)
    }
}

/// Listing lifecycle: landlords own and mutate their properties, anyone reads.
pub struct PropertyService<S> {
    store: Arc<S>,
    activity: ActivityRecorder<S>,
}

impl<S> PropertyService<S>
where
    S: MarketplaceStore + 'static,
{
    pub fn new(store: Arc<S>) -> Self {
        let activity = ActivityRecorder::new(store.clone());
        Self { store, activity }
    }

    pub fn create(
        &self,
        actor: &Actor,
        request: NewProperty,
    ) -> Result<PropertyListing, MarketplaceError> {
        can_perform(actor, Action::Write, ResourceKind::Property).permit()?;
        let owner = actor.require()?.id;

        validate_text("title", &request.title)?;
        validate_text("location", &request.location)?;
        validate_price(request.price)?;

        let created = self.store.transaction(|tables| {
            validate_categories(tables, &request.categories)?;
            let created_at = tables.stamp();
            let property = tables.properties.insert_with(|id| Property {
                id,
                title: request.title,
                description: request.description,
                location: request.location,
                price: request.price,
                room_count: request.room_count,
                property_type: request.property_type,
                status: request.status,
                views: 0,
                owner,
                created_at,
            });
            tables.link_categories(property.id, &request.categories);
            Ok::<_, MarketplaceError>(listing(tables, property))
        })?;

        info!(property_id = %created.property.id, %owner, "property listed");
        Ok(created)
    }

    pub fn update(
        &self,
        actor: &Actor,
        id: PropertyId,
        changes: PropertyChanges,
    ) -> Result<PropertyListing, MarketplaceError> {
        can_perform(actor, Action::Write, ResourceKind::Property).permit()?;

        if let Some(title) = &changes.title {
            validate_text("title", title)?;
        }
        if let Some(location) = &changes.location {
            validate_text("location", location)?;
        }
        if let Some(price) = changes.price {
            validate_price(price)?;
        }

        let updated = self.store.transaction(|tables| {
            let current = tables
                .properties
                .get(id)
                .ok_or_else(|| MarketplaceError::not_found("property", id))?;
            can_perform_on(actor, Action::Write, Resource::Property(current))
                .permit_on("property", id)?;
            if let Some(categories) = &changes.categories {
                validate_categories(tables, categories)?;
                tables.link_categories(id, categories);
            }

            let property = tables
                .properties
                .get_mut(id)
                .ok_or_else(|| MarketplaceError::not_found("property", id))?;
            let PropertyChanges {
                title,
                description,
                location,
                price,
                room_count,
                property_type,
                status,
                categories: _,
            } = changes;
            if let Some(title) = title {
                property.title = title;
            }
            if let Some(description) = description {
                property.description = description;
            }
            if let Some(location) = location {
                property.location = location;
            }
            if let Some(price) = price {
                property.price = price;
            }
            if let Some(room_count) = room_count {
                property.room_count = room_count;
            }
            if let Some(property_type) = property_type {
                property.property_type = property_type;
            }
            if let Some(status) = status {
                property.status = status;
            }
            let property = property.clone();
            Ok::<_, MarketplaceError>(listing(tables, property))
        })?;

        info!(property_id = %id, "property updated");
        Ok(updated)
    }

    /// Removes the listing together with its bookings, reviews and view history.
    pub fn delete(&self, actor: &Actor, id: PropertyId) -> Result<(), MarketplaceError> {
        can_perform(actor, Action::Write, ResourceKind::Property).permit()?;

        self.store.transaction(|tables| {
            let current = tables
                .properties
                .get(id)
                .ok_or_else(|| MarketplaceError::not_found("property", id))?;
            can_perform_on(actor, Action::Write, Resource::Property(current))
                .permit_on("property", id)?;
            tables.remove_property(id);
            Ok::<_, MarketplaceError>(())
        })?;

        info!(property_id = %id, "property deleted");
        Ok(())
    }

    /// Detail read. Authenticated actors leave a view-history row behind,
    /// written in the same transaction as the read.
    pub fn get(&self, actor: &Actor, id: PropertyId) -> Result<PropertyListing, MarketplaceError> {
        can_perform(actor, Action::Read, ResourceKind::Property).permit()?;
        let lookup = |tables: &Tables| {
            tables
                .properties()
                .get(id)
                .cloned()
                .map(|property| listing(tables, property))
                .ok_or_else(|| MarketplaceError::not_found("property", id))
        };

        let Some(principal) = actor.principal() else {
            return self.store.read(lookup)?;
        };
        let user = principal.id;
        let found = self.store.transaction(|tables| {
            let found = lookup(&*tables)?;
            append_view(tables, user, id);
            Ok::<_, MarketplaceError>(found)
        })?;
        debug!(%user, property = %id, "property view recorded");
        Ok(found)
    }

    /// Filtered, ordered listing. A non-empty `search` from an authenticated
    /// actor is appended to their search history.
    pub fn list(
        &self,
        actor: &Actor,
        query: &PropertyQuery,
    ) -> Result<Vec<PropertyListing>, MarketplaceError> {
        can_perform(actor, Action::Read, ResourceKind::Property).permit()?;
        if let Some(keyword) = query.search_keyword() {
            self.activity.record_search(actor, keyword)?;
        }

        Ok(self.store.read(|tables| {
            let mut matches: Vec<Property> = tables
                .properties()
                .filter(|property| query.matches(property))
                .cloned()
                .collect();
            matches.sort_by(|a, b| query.ordering.compare(a, b));
            matches
                .into_iter()
                .map(|property| listing(tables, property))
                .collect()
        })?)
    }

    /// Explicit view-counter bump, separate from view-history recording.
    pub fn increment_views(&self, id: PropertyId) -> Result<PropertyListing, MarketplaceError> {
        Ok(self.store.transaction(|tables| {
            let property = tables
                .properties
                .get_mut(id)
                .ok_or_else(|| MarketplaceError::not_found("property", id))?;
            property.views = property.views.saturating_add(1);
            let property = property.clone();
            Ok::<_, MarketplaceError>(listing(tables, property))
        })?)
    }
}
