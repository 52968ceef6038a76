use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};

use super::domain::{
    Booking, BookingId, Category, CategoryId, Notification, NotificationId, Property, PropertyId,
    Review, ReviewId, SearchHistory, SearchHistoryId, User, UserId, ViewHistory, ViewHistoryId,
};

/// Error enumeration for persistence failures.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Row stored in a [`Table`], keyed by a server-assigned id.
pub trait Record: Clone + fmt::Debug {
    type Id: Copy + Ord + fmt::Debug + fmt::Display + From<u64>;

    fn id(&self) -> Self::Id;
}

macro_rules! record {
    ($row:ty, $id:ty) => {
        impl Record for $row {
            type Id = $id;

            fn id(&self) -> Self::Id {
                self.id
            }
        }
    };
}

record!(User, UserId);
record!(Property, PropertyId);
record!(Category, CategoryId);
record!(Booking, BookingId);
record!(Review, ReviewId);
record!(SearchHistory, SearchHistoryId);
record!(ViewHistory, ViewHistoryId);
record!(Notification, NotificationId);

/// Inverse of one uncommitted row change.
#[derive(Debug, Clone)]
enum Undo<T: Record> {
    Inserted(T::Id),
    Restore(T),
}

/// Ordered collection of one entity type with monotonic id assignment.
///
/// Writes are journaled until the enclosing transaction commits or rolls back.
#[derive(Debug, Clone)]
pub struct Table<T: Record> {
    rows: BTreeMap<T::Id, T>,
    next_id: u64,
    journal: Vec<Undo<T>>,
    next_id_mark: Option<u64>,
}

impl<T: Record> Default for Table<T> {
    fn default() -> Self {
        Self {
            rows: BTreeMap::new(),
            next_id: 1,
            journal: Vec::new(),
            next_id_mark: None,
        }
    }
}

impl<T: Record> Table<T> {
    pub fn get(&self, id: T::Id) -> Option<&T> {
        self.rows.get(&id)
    }

    pub fn contains(&self, id: T::Id) -> bool {
        self.rows.contains_key(&id)
    }

    /// Rows in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.rows.values()
    }

    pub fn filter<'a, P>(&'a self, mut predicate: P) -> impl Iterator<Item = &'a T> + 'a
    where
        P: FnMut(&T) -> bool + 'a,
    {
        self.rows.values().filter(move |row| predicate(*row))
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub(crate) fn insert_with(&mut self, build: impl FnOnce(T::Id) -> T) -> T {
        self.next_id_mark.get_or_insert(self.next_id);
        let id = T::Id::from(self.next_id);
        self.next_id += 1;
        let row = build(id);
        self.rows.insert(id, row.clone());
        self.journal.push(Undo::Inserted(id));
        row
    }

    pub(crate) fn get_mut(&mut self, id: T::Id) -> Option<&mut T> {
        let row = self.rows.get_mut(&id)?;
        self.journal.push(Undo::Restore(row.clone()));
        Some(row)
    }

    pub(crate) fn remove(&mut self, id: T::Id) -> Option<T> {
        let removed = self.rows.remove(&id)?;
        self.journal.push(Undo::Restore(removed.clone()));
        Some(removed)
    }

    /// Drops every row matching `predicate`, returning the removed ids.
    pub(crate) fn remove_where(&mut self, mut predicate: impl FnMut(&T) -> bool) -> Vec<T::Id> {
        let doomed: Vec<T::Id> = self
            .rows
            .values()
            .filter(|row| predicate(*row))
            .map(|row| row.id())
            .collect();
        for id in &doomed {
            self.remove(*id);
        }
        doomed
    }

    fn commit(&mut self) {
        self.journal.clear();
        self.next_id_mark = None;
    }

    /// Replays the journal newest first, so a row touched several times ends
    /// up as it was before the first change.
    fn rollback(&mut self) {
        while let Some(undo) = self.journal.pop() {
            match undo {
                Undo::Inserted(id) => {
                    self.rows.remove(&id);
                }
                Undo::Restore(row) => {
                    self.rows.insert(row.id(), row);
                }
            }
        }
        if let Some(next_id) = self.next_id_mark.take() {
            self.next_id = next_id;
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum LinkUndo {
    Linked(PropertyId, CategoryId),
    Unlinked(PropertyId, CategoryId),
}

/// Every table of the marketplace. Reads are public; writes stay inside the
/// crate so rows can only be created through the lifecycle services.
#[derive(Debug, Default)]
pub struct Tables {
    pub(crate) users: Table<User>,
    pub(crate) properties: Table<Property>,
    pub(crate) categories: Table<Category>,
    property_categories: BTreeSet<(PropertyId, CategoryId)>,
    link_journal: Vec<LinkUndo>,
    pub(crate) bookings: Table<Booking>,
    pub(crate) reviews: Table<Review>,
    pub(crate) search_history: Table<SearchHistory>,
    pub(crate) view_history: Table<ViewHistory>,
    pub(crate) notifications: Table<Notification>,
    last_stamp: Option<DateTime<Utc>>,
}

impl Tables {
    pub fn users(&self) -> &Table<User> {
        &self.users
    }

    pub fn properties(&self) -> &Table<Property> {
        &self.properties
    }

    pub fn categories(&self) -> &Table<Category> {
        &self.categories
    }

    pub fn bookings(&self) -> &Table<Booking> {
        &self.bookings
    }

    pub fn reviews(&self) -> &Table<Review> {
        &self.reviews
    }

    pub fn search_history(&self) -> &Table<SearchHistory> {
        &self.search_history
    }

    pub fn view_history(&self) -> &Table<ViewHistory> {
        &self.view_history
    }

    pub fn notifications(&self) -> &Table<Notification> {
        &self.notifications
    }

    pub fn categories_of(&self, property: PropertyId) -> Vec<CategoryId> {
        self.property_categories
            .range((property, CategoryId(0))..=(property, CategoryId(u64::MAX)))
            .map(|(_, category)| *category)
            .collect()
    }

    pub fn property_owner(&self, property: PropertyId) -> Option<UserId> {
        self.properties.get(property).map(|row| row.owner)
    }

    /// Issues a creation timestamp; stamps from one store are strictly increasing.
    pub(crate) fn stamp(&mut self) -> DateTime<Utc> {
        let now = Utc::now();
        let stamp = match self.last_stamp {
            Some(last) if now <= last => last + Duration::microseconds(1),
            _ => now,
        };
        self.last_stamp = Some(stamp);
        stamp
    }

    pub(crate) fn link_categories(&mut self, property: PropertyId, categories: &[CategoryId]) {
        self.unlink_property(property);
        for category in categories {
            if self.property_categories.insert((property, *category)) {
                self.link_journal.push(LinkUndo::Linked(property, *category));
            }
        }
    }

    fn unlink_property(&mut self, property: PropertyId) {
        for category in self.categories_of(property) {
            self.property_categories.remove(&(property, category));
            self.link_journal.push(LinkUndo::Unlinked(property, category));
        }
    }

    /// Removes a property with its bookings, reviews, view history and
    /// category links.
    pub(crate) fn remove_property(&mut self, id: PropertyId) -> Option<Property> {
        let removed = self.properties.remove(id)?;
        self.bookings.remove_where(|booking| booking.property == id);
        self.reviews.remove_where(|review| review.property == id);
        self.view_history.remove_where(|view| view.property == id);
        self.unlink_property(id);
        Some(removed)
    }

    /// Removes a user, every property they own (cascading further), and
    /// every row they authored or received.
    pub(crate) fn remove_user(&mut self, id: UserId) -> Option<User> {
        let removed = self.users.remove(id)?;
        let owned: Vec<PropertyId> = self
            .properties
            .filter(|property| property.owner == id)
            .map(|property| property.id)
            .collect();
        for property in owned {
            self.remove_property(property);
        }
        self.bookings.remove_where(|booking| booking.user == id);
        self.reviews.remove_where(|review| review.user == id);
        self.search_history.remove_where(|search| search.user == id);
        self.view_history.remove_where(|view| view.user == id);
        self.notifications
            .remove_where(|notification| notification.recipient == id);
        Some(removed)
    }

    /// Makes every journaled write since the last commit permanent.
    pub(crate) fn commit(&mut self) {
        self.users.commit();
        self.properties.commit();
        self.categories.commit();
        self.bookings.commit();
        self.reviews.commit();
        self.search_history.commit();
        self.view_history.commit();
        self.notifications.commit();
        self.link_journal.clear();
    }

    /// Undoes every journaled write since the last commit. Issued stamps are
    /// kept so later stamps still increase.
    pub(crate) fn rollback(&mut self) {
        self.users.rollback();
        self.properties.rollback();
        self.categories.rollback();
        self.bookings.rollback();
        self.reviews.rollback();
        self.search_history.rollback();
        self.view_history.rollback();
        self.notifications.rollback();
        while let Some(undo) = self.link_journal.pop() {
            match undo {
                LinkUndo::Linked(property, category) => {
                    self.property_categories.remove(&(property, category));
                }
                LinkUndo::Unlinked(property, category) => {
                    self.property_categories.insert((property, category));
                }
            }
        }
    }
}

/// Storage abstraction so the lifecycle services can be exercised in isolation.
///
/// `transaction` is one atomic unit: when `work` returns `Err`, none of its
/// changes become visible.
pub trait MarketplaceStore: Send + Sync {
    fn read<T>(&self, query: impl FnOnce(&Tables) -> T) -> Result<T, StoreError>;

    fn transaction<T, E>(&self, work: impl FnOnce(&mut Tables) -> Result<T, E>) -> Result<T, E>
    where
        E: From<StoreError>;
}

/// Mutex-guarded store. Transactions write in place and roll back through the
/// table journals when `work` fails.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    tables: Mutex<Tables>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl MarketplaceStore for InMemoryStore {
    fn read<T>(&self, query: impl FnOnce(&Tables) -> T) -> Result<T, StoreError> {
        let guard = self
            .tables
            .lock()
            .map_err(|_| StoreError::Unavailable("store lock poisoned".to_string()))?;
        Ok(query(&guard))
    }

    fn transaction<T, E>(&self, work: impl FnOnce(&mut Tables) -> Result<T, E>) -> Result<T, E>
    where
        E: From<StoreError>,
    {
        let mut guard = self
            .tables
            .lock()
            .map_err(|_| StoreError::Unavailable("store lock poisoned".to_string()))?;
        match work(&mut *guard) {
            Ok(outcome) => {
                guard.commit();
                Ok(outcome)
            }
            Err(err) => {
                guard.rollback();
                Err(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::marketplace::domain::{PropertyStatus, PropertyType};
    use rust_decimal::Decimal;

    fn property(tables: &mut Tables, owner: UserId) -> Property {
        let created_at = tables.stamp();
        tables.properties.insert_with(|id| Property {
            id,
            title: "Loft".to_string(),
            description: String::new(),
            location: "Berlin".to_string(),
            price: Decimal::from(900),
            room_count: 1,
            property_type: PropertyType::Studio,
            status: PropertyStatus::Active,
            views: 0,
            owner,
            created_at,
        })
    }

    #[test]
    fn ids_are_monotonic_per_table() {
        let mut tables = Tables::default();
        let first = property(&mut tables, UserId(1));
        let second = property(&mut tables, UserId(1));
        tables.remove_property(second.id);
        let third = property(&mut tables, UserId(1));

        assert_eq!(first.id, PropertyId(1));
        assert_eq!(third.id, PropertyId(3));
    }

    #[test]
    fn stamps_strictly_increase() {
        let mut tables = Tables::default();
        let stamps: Vec<_> = (0..50).map(|_| tables.stamp()).collect();
        assert!(stamps.windows(2).all(|pair| pair[0] < pair[1]));
    }

    #[test]
    fn failed_transaction_discards_changes() {
        let store = InMemoryStore::new();
        let outcome: Result<(), StoreError> = store.transaction(|tables| {
            property(tables, UserId(7));
            Err(StoreError::Unavailable("abort".to_string()))
        });
        assert!(outcome.is_err());

        let count = store
            .read(|tables| tables.properties().len())
            .expect("read succeeds");
        assert_eq!(count, 0);
    }

    #[test]
    fn rollback_restores_rows_links_and_ids() {
        let store = InMemoryStore::new();
        let (kept, doomed) = store
            .transaction(|tables| {
                let kept = property(tables, UserId(1));
                let doomed = property(tables, UserId(1));
                tables.link_categories(kept.id, &[CategoryId(1)]);
                tables.link_categories(doomed.id, &[CategoryId(2)]);
                Ok::<_, StoreError>((kept, doomed))
            })
            .expect("seed");

        let outcome: Result<(), StoreError> = store.transaction(|tables| {
            if let Some(row) = tables.properties.get_mut(kept.id) {
                row.title = "Renamed".to_string();
            }
            if let Some(row) = tables.properties.get_mut(kept.id) {
                row.views = 40;
            }
            tables.link_categories(kept.id, &[CategoryId(3)]);
            tables.remove_property(doomed.id);
            property(tables, UserId(2));
            Err(StoreError::Unavailable("abort".to_string()))
        });
        assert!(outcome.is_err());

        store
            .read(|tables| {
                assert_eq!(tables.properties().len(), 2);
                let restored = tables.properties().get(kept.id).expect("kept row");
                assert_eq!(restored.title, "Loft");
                assert_eq!(restored.views, 0);
                assert!(tables.properties().contains(doomed.id));
                assert_eq!(tables.categories_of(kept.id), vec![CategoryId(1)]);
                assert_eq!(tables.categories_of(doomed.id), vec![CategoryId(2)]);
            })
            .expect("read succeeds");

        let next = store
            .transaction(|tables| Ok::<_, StoreError>(property(tables, UserId(3))))
            .expect("insert after rollback");
        assert_eq!(next.id, PropertyId(3));
    }

    #[test]
    fn category_links_are_scoped_to_property() {
        let mut tables = Tables::default();
        let a = property(&mut tables, UserId(1));
        let b = property(&mut tables, UserId(1));
        tables.link_categories(a.id, &[CategoryId(2), CategoryId(1)]);
        tables.link_categories(b.id, &[CategoryId(3)]);
        tables.link_categories(a.id, &[CategoryId(4)]);

        assert_eq!(tables.categories_of(a.id), vec![CategoryId(4)]);
        assert_eq!(tables.categories_of(b.id), vec![CategoryId(3)]);
    }
}
