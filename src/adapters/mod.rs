//! Adapters - Implementations of port interfaces.
//!
//! - `stripe`, `asaas` - Provider REST clients (plus in-memory mocks)
//! - `postgres` - sqlx repositories
//! - `memory` - In-memory repositories for tests
//! - `auth` - Supabase access token validation
//! - `http` - axum routers and middleware

pub mod asaas;
pub mod auth;
pub mod http;
pub mod memory;
pub mod postgres;
pub mod retry;
pub mod stripe;
