//! Users and bearer tokens.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

use crate::domain::foundation::{AuthError, AuthenticatedUser, DomainError, UserId};
use crate::ports::{SessionValidator, UserDirectory, UserProfile};

/// In-memory user directory.
#[derive(Default)]
pub struct InMemoryUserDirectory {
    users: RwLock<Vec<UserProfile>>,
}

impl InMemoryUserDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a user, replacing any profile with the same id.
    pub fn add(&self, profile: UserProfile) {
        let mut users = self.users.write().expect("InMemoryUserDirectory: lock poisoned");
        users.retain(|u| u.id != profile.id);
        users.push(profile);
    }
}

#[async_trait]
impl UserDirectory for InMemoryUserDirectory {
    async fn find_by_id(&self, id: &UserId) -> Result<Option<UserProfile>, DomainError> {
        let users = self.users.read().expect("InMemoryUserDirectory: lock poisoned");
        Ok(users.iter().find(|u| &u.id == id).cloned())
    }

    async fn find_by_auth_subject(
        &self,
        auth_subject: &str,
    ) -> Result<Option<UserProfile>, DomainError> {
        let users = self.users.read().expect("InMemoryUserDirectory: lock poisoned");
        Ok(users.iter().find(|u| u.auth_subject == auth_subject).cloned())
    }
}

/// Session validator backed by a fixed token table.
///
/// Tokens not in the table return `InvalidToken`.
#[derive(Debug, Default)]
pub struct StaticSessionValidator {
    tokens: RwLock<HashMap<String, AuthenticatedUser>>,
}

impl StaticSessionValidator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a valid token that maps to a user.
    pub fn with_user(self, token: impl Into<String>, user: AuthenticatedUser) -> Self {
        self.tokens
            .write()
            .expect("StaticSessionValidator: lock poisoned")
            .insert(token.into(), user);
        self
    }
}

#[async_trait]
impl SessionValidator for StaticSessionValidator {
    async fn validate(&self, token: &str) -> Result<AuthenticatedUser, AuthError> {
        self.tokens
            .read()
            .expect("StaticSessionValidator: lock poisoned")
            .get(token)
            .cloned()
            .ok_or(AuthError::InvalidToken)
    }
}
