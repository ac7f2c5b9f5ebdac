//! Job board billing.
//!
//! Subscriptions are sold through two providers: Stripe (card checkout) and
//! Asaas (PIX). The local database keeps one row per subscription and is
//! reconciled against the provider on every read and webhook.

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;
