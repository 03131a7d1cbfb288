//! Bazaar Core - Shared domain types.
//!
//! This crate provides the types used across all Bazaar components:
//! - `storefront` - The HTTP service (storefront API, admin API, webhooks)
//! - `cli` - Command-line tools for migrations, seeding and maintenance
//!
//! # Architecture
//!
//! The core crate contains only types and pure rules - no I/O, no database
//! access, no HTTP clients. Enable the `postgres` feature to get `sqlx`
//! encode/decode implementations for the newtypes and enums.
//!
//! # Modules
//!
//! - [`types`] - Type-safe IDs, money, emails, slugs, ratings, pincodes and statuses

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
