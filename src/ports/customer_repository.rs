//! Provider customer link port.

use async_trait::async_trait;

use crate::domain::billing::{CustomerLink, Provider};
use crate::domain::foundation::{DomainError, UserId};

#[async_trait]
pub trait CustomerRepository: Send + Sync {
    async fn find(
        &self,
        user_id: &UserId,
        provider: Provider,
    ) -> Result<Option<CustomerLink>, DomainError>;

    /// Store a link unless one already exists for `(user, provider)`.
    ///
    /// Returns the stored link, which is the existing one when two requests
    /// raced to create a customer.
    async fn insert(&self, link: &CustomerLink) -> Result<CustomerLink, DomainError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn customer_repository_is_object_safe() {
        fn _accepts_dyn(_repo: &dyn CustomerRepository) {}
    }
}
