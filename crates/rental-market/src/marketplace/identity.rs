use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use argon2::password_hash::{
    PasswordHash as EncodedHash, PasswordHasher, PasswordVerifier, SaltString,
};
use argon2::Argon2;
use tracing::{debug, warn};
use uuid::Uuid;

use super::domain::{PasswordHash, Role, User, UserId};
use super::error::MarketplaceError;
use super::store::{MarketplaceStore, StoreError};

/// Authenticated identity carried by a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Principal {
    pub id: UserId,
    pub role: Role,
}

/// Whoever is attempting an action. Anonymous callers may still read public
/// resources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Actor {
    #[default]
    Anonymous,
    User(Principal),
}

impl Actor {
    pub fn user(id: UserId, role: Role) -> Self {
        Actor::User(Principal { id, role })
    }

    pub fn principal(&self) -> Option<&Principal> {
        match self {
            Actor::Anonymous => None,
            Actor::User(principal) => Some(principal),
        }
    }

    pub fn id(&self) -> Option<UserId> {
        self.principal().map(|principal| principal.id)
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self, Actor::User(_))
    }

    pub fn require(&self) -> Result<&Principal, MarketplaceError> {
        self.principal().ok_or(MarketplaceError::Unauthenticated)
    }
}

#[derive(Clone, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum IdentityError {
    #[error("no active account found with the given credentials")]
    InvalidCredentials,
    #[error("token is invalid")]
    InvalidToken,
    #[error("token has expired")]
    TokenExpired,
    #[error("password hashing failed: {0}")]
    Hashing(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Resolves request credentials into an [`Actor`].
pub trait IdentityProvider: Send + Sync {
    fn authenticate(&self, credentials: &Credentials) -> Result<Actor, IdentityError>;
    fn verify(&self, token: &str) -> Result<Actor, IdentityError>;
}

/// Argon2id hashes stored in PHC string form (`$argon2id$v=19$...`).
impl PasswordHash {
    pub(crate) fn derive(password: &str) -> Result<Self, IdentityError> {
        let salt = SaltString::encode_b64(Uuid::new_v4().as_bytes())
            .map_err(|err| IdentityError::Hashing(err.to_string()))?;
        let encoded = Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map_err(|err| IdentityError::Hashing(err.to_string()))?;
        Ok(Self(encoded.to_string()))
    }

    /// Constant-time check; unparseable hashes never match.
    pub fn matches(&self, password: &str) -> bool {
        EncodedHash::new(&self.0)
            .map(|encoded| {
                Argon2::default()
                    .verify_password(password.as_bytes(), &encoded)
                    .is_ok()
            })
            .unwrap_or(false)
    }
}

/// Access token handed back after a successful login.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IssuedToken {
    pub access: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy)]
struct Session {
    user: UserId,
    expires_at: DateTime<Utc>,
}

/// Opaque bearer-token provider backed by the marketplace user table.
pub struct TokenIdentityProvider<S> {
    store: Arc<S>,
    ttl: Duration,
    sessions: Mutex<HashMap<String, Session>>,
}

impl<S> TokenIdentityProvider<S>
where
    S: MarketplaceStore + 'static,
{
    pub fn new(store: Arc<S>, ttl: Duration) -> Self {
        Self {
            store,
            ttl,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// Verify credentials and mint a fresh token.
    pub fn issue(&self, credentials: &Credentials) -> Result<IssuedToken, IdentityError> {
        let actor = self.authenticate(credentials)?;
        let principal = actor.principal().ok_or(IdentityError::InvalidCredentials)?;
        self.open_session(principal.id)
    }

    /// Exchange a still-valid token for a new one; the old token stops working.
    pub fn refresh(&self, token: &str) -> Result<IssuedToken, IdentityError> {
        let actor = self.verify(token)?;
        let principal = actor.principal().ok_or(IdentityError::InvalidToken)?;
        self.sessions()?.remove(token);
        self.open_session(principal.id)
    }

    /// Drop every session held by `user`, returning how many were live.
    pub fn revoke_sessions(&self, user: UserId) -> Result<usize, IdentityError> {
        let mut sessions = self.sessions()?;
        let before = sessions.len();
        sessions.retain(|_, session| session.user != user);
        let revoked = before - sessions.len();
        debug!(%user, revoked, "revoked access tokens");
        Ok(revoked)
    }

    /// Number of sessions currently held, expired ones included until the
    /// next login prunes them.
    pub fn active_sessions(&self) -> Result<usize, IdentityError> {
        Ok(self.sessions()?.len())
    }

    fn open_session(&self, user: UserId) -> Result<IssuedToken, IdentityError> {
        let now = Utc::now();
        let access = Uuid::new_v4().simple().to_string();
        let expires_at = now + self.ttl;
        let mut sessions = self.sessions()?;
        sessions.retain(|_, session| session.expires_at > now);
        sessions.insert(access.clone(), Session { user, expires_at });
        debug!(%user, %expires_at, "issued access token");
        Ok(IssuedToken { access, expires_at })
    }

    fn sessions(
        &self,
    ) -> Result<std::sync::MutexGuard<'_, HashMap<String, Session>>, IdentityError> {
        self.sessions
            .lock()
            .map_err(|_| StoreError::Unavailable("session lock poisoned".to_string()).into())
    }

    fn lookup_user(&self, id: UserId) -> Result<Option<User>, IdentityError> {
        Ok(self.store.read(|tables| tables.users().get(id).cloned())?)
    }
}

impl<S> IdentityProvider for TokenIdentityProvider<S>
where
    S: MarketplaceStore + 'static,
{
    fn authenticate(&self, credentials: &Credentials) -> Result<Actor, IdentityError> {
        let user = self.store.read(|tables| {
            tables
                .users()
                .iter()
                .find(|user| user.username == credentials.username)
                .cloned()
        })?;

        match user {
            Some(user) if user.password.matches(&credentials.password) => {
                Ok(Actor::user(user.id, user.role))
            }
            _ => {
                warn!(username = %credentials.username, "rejected login attempt");
                Err(IdentityError::InvalidCredentials)
            }
        }
    }

    fn verify(&self, token: &str) -> Result<Actor, IdentityError> {
        let session = self
            .sessions()?
            .get(token)
            .copied()
            .ok_or(IdentityError::InvalidToken)?;

        if Utc::now() >= session.expires_at {
            self.sessions()?.remove(token);
            return Err(IdentityError::TokenExpired);
        }

        // Accounts deleted after login lose their sessions.
        let Some(user) = self.lookup_user(session.user)? else {
            self.sessions()?.remove(token);
            return Err(IdentityError::InvalidToken);
        };
        Ok(Actor::user(user.id, user.role))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_hash_round_trips_and_salts() {
        let first = PasswordHash::derive("password123").expect("hash");
        let second = PasswordHash::derive("password123").expect("hash");

        assert!(first.matches("password123"));
        assert!(!first.matches("password124"));
        assert!(first.0.starts_with("$argon2id$"));
        assert!(!first.0.contains("password123"));
        assert_ne!(first, second, "salts differ per derivation");
    }

    #[test]
    fn malformed_hash_never_matches() {
        let hash = PasswordHash("plaintext".to_string());
        assert!(!hash.matches("plaintext"));

        let legacy = PasswordHash("sha256$salt$deadbeef".to_string());
        assert!(!legacy.matches("deadbeef"));
    }

    #[test]
    fn credentials_debug_hides_password() {
        let credentials = Credentials {
            username: "tenant1".to_string(),
            password: "hunter22".to_string(),
        };
        let rendered = format!("{credentials:?}");
        assert!(rendered.contains("tenant1"));
        assert!(!rendered.contains("hunter22"));
    }

    #[test]
    fn require_rejects_anonymous() {
        assert!(matches!(
            Actor::Anonymous.require(),
            Err(MarketplaceError::Unauthenticated)
        ));
        let actor = Actor::user(UserId(4), Role::Landlord);
        assert_eq!(actor.require().expect("authenticated").id, UserId(4));
    }
}
