//! Read access to the users table, owned by the profile side of the app.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::foundation::{DomainError, UserId};

/// The user fields billing needs to open provider customers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: UserId,
    pub auth_subject: String,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,

    /// CPF or CNPJ, digits only.
    pub tax_id: Option<String>,
}

#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn find_by_id(&self, id: &UserId) -> Result<Option<UserProfile>, DomainError>;

    /// Resolve the identity provider's subject claim.
    async fn find_by_auth_subject(
        &self,
        subject: &str,
    ) -> Result<Option<UserProfile>, DomainError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_directory_is_object_safe() {
        fn _accepts_dyn(_directory: &dyn UserDirectory) {}
    }
}
