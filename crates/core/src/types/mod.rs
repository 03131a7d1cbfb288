//! Core types for Bazaar.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod email;
pub mod id;
pub mod pincode;
pub mod price;
pub mod rating;
pub mod slug;
pub mod status;

pub use email::{Email, EmailError};
pub use id::*;
pub use pincode::{Pincode, PincodeError};
pub use price::{CurrencyCode, Price, PriceError};
pub use rating::{Rating, RatingError};
pub use slug::{Slug, SlugError};
pub use status::*;
