use std::sync::Arc;

use tracing::info;

use super::access::{can_perform, can_perform_on, Action, Resource, ResourceKind};
use super::domain::{NewAccount, PasswordHash, User, UserId, UserProfile};
use super::error::MarketplaceError;
use super::identity::Actor;
use super::store::MarketplaceStore;

const MIN_PASSWORD_LEN: usize = 8;

/// Registration and removal of marketplace users.
pub struct AccountService<S> {
    store: Arc<S>,
}

impl<S> AccountService<S>
where
    S: MarketplaceStore + 'static,
{
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    pub fn register(&self, account: NewAccount) -> Result<UserProfile, MarketplaceError> {
        let NewAccount {
            username,
            email,
            password,
            role,
        } = account;

        let username = username.trim().to_string();
        let email = email.trim().to_ascii_lowercase();
        if username.is_empty() {
            return Err(MarketplaceError::invalid("username", "must not be blank"));
        }
        if !email.contains('@') {
            return Err(MarketplaceError::invalid("email", "enter a valid email address"));
        }
        if password.chars().count() < MIN_PASSWORD_LEN {
            return Err(MarketplaceError::invalid(
                "password",
                format!("must contain at least {MIN_PASSWORD_LEN} characters"),
            ));
        }
        let password = PasswordHash::derive(&password)?;

        let user = self.store.transaction(|tables| {
            if tables.users.iter().any(|user| user.username == username) {
                return Err(MarketplaceError::invalid(
                    "username",
                    "a user with that username already exists",
                ));
            }
            if tables.users.iter().any(|user| user.email == email) {
                return Err(MarketplaceError::invalid(
                    "email",
                    "a user with that email already exists",
                ));
            }
            let created_at = tables.stamp();
            Ok(tables.users.insert_with(|id| User {
                id,
                username,
                email,
                role,
                password,
                created_at,
            }))
        })?;

        info!(user_id = %user.id, role = user.role.label(), "account registered");
        Ok(user.profile())
    }

    pub fn get(&self, id: UserId) -> Result<UserProfile, MarketplaceError> {
        self.store
            .read(|tables| tables.users().get(id).map(User::profile))?
            .ok_or_else(|| MarketplaceError::not_found("user", id))
    }

    pub fn list(&self) -> Result<Vec<UserProfile>, MarketplaceError> {
        Ok(self
            .store
            .read(|tables| tables.users().iter().map(User::profile).collect())?)
    }

    /// Users may only delete themselves. Everything they own goes with them.
    pub fn delete(&self, actor: &Actor, id: UserId) -> Result<(), MarketplaceError> {
        can_perform(actor, Action::Write, ResourceKind::User).permit()?;

        self.store.transaction(|tables| {
            let user = tables
                .users
                .get(id)
                .ok_or_else(|| MarketplaceError::not_found("user", id))?;
            can_perform_on(actor, Action::Write, Resource::User(user)).permit_on("user", id)?;
            tables.remove_user(id);
            Ok::<_, MarketplaceError>(())
        })?;

        info!(user_id = %id, "account deleted");
        Ok(())
    }
}
