//! Asaas (PIX) adapter.
//!
//! [`AsaasClient`] talks to the Asaas REST API; [`MockAsaasGateway`] is an
//! in-memory stand-in used by tests.

mod asaas_client;
mod mock_asaas_gateway;

pub use asaas_client::{AsaasClient, PRODUCTION_BASE_URL, SANDBOX_BASE_URL};
pub use mock_asaas_gateway::MockAsaasGateway;
