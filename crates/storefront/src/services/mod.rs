//! Business logic services for the storefront.
//!
//! # Services
//!
//! - `auth` - Password and magic-link authentication
//! - `catalog` - Product browsing and the product page cache
//! - `cart` / `wishlist` - Per-user cart and saved products
//! - `checkout` - Stock reservation, payment confirmation, webhooks, expiry
//! - `orders` - Order history, cancellation and admin fulfilment
//! - `payments` - Payment gateway client and signature checks
//! - `email` - Transactional email
//! - `shipping` - Courier delivery estimates
//! - `images` - Image CDN URL transformations
//!
//! Request-scoped services borrow the pool and shared clients from
//! `AppState` and are built per handler call.

pub mod auth;
pub mod cart;
pub mod catalog;
pub mod checkout;
pub mod email;
pub mod images;
pub mod orders;
pub mod payments;
pub mod shipping;
pub mod wishlist;
