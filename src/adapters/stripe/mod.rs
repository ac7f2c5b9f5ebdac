//! Stripe adapter.
//!
//! [`StripeClient`] implements the `StripeGateway` port over the Stripe REST
//! API; [`MockStripeGateway`] is an in-memory stand-in used by tests.
//!
//! # Configuration
//!
//! - `JOBBOARD__STRIPE__SECRET_KEY`: secret API key (sk_...)
//! - `JOBBOARD__STRIPE__WEBHOOK_SECRET`: webhook signing secret (whsec_...)

mod mock_stripe_gateway;
mod stripe_client;

pub use mock_stripe_gateway::{MethodCall, MockStripeGateway};
pub use stripe_client::{StripeClient, StripeClientConfig, DEFAULT_API_BASE_URL};
