//! Cart operations.
//!
//! Stock is checked when lines change so customers hear about shortages
//! early. The authoritative check is the reservation at checkout.

use sqlx::PgPool;
use thiserror::Error;
use tracing::instrument;

use bazaar_core::{ProductId, UserId};

use crate::config::CheckoutConfig;
use crate::db::{CartRepository, ProductRepository, RepositoryError};
use crate::models::cart::{Cart, CartItemInput, CartItemKey};
use crate::models::product::validate_size;
use crate::services::images::{ImagePreset, ImageTransformer};

/// Largest quantity a single cart line may hold.
pub const MAX_LINE_QUANTITY: i32 = 99;

/// Errors from cart operations.
#[derive(Debug, Error)]
pub enum CartError {
    /// Product does not exist or is archived.
    #[error("product not found")]
    ProductNotFound,

    /// The product has no such size.
    #[error("unknown size: {0}")]
    UnknownSize(String),

    /// Not enough stock for the requested quantity.
    #[error("only {available} left in stock")]
    OutOfStock { available: i32 },

    /// The line to update is not in the cart.
    #[error("item not in cart")]
    LineNotFound,

    /// Quantity outside the allowed range.
    #[error("quantity must be between {min} and {MAX_LINE_QUANTITY}")]
    InvalidQuantity { min: i32 },

    /// Repository/database error.
    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),
}

/// Cart service for one request.
pub struct CartService<'a> {
    carts: CartRepository<'a>,
    products: ProductRepository<'a>,
    images: &'a ImageTransformer,
    checkout: &'a CheckoutConfig,
}

impl<'a> CartService<'a> {
    #[must_use]
    pub const fn new(
        pool: &'a PgPool,
        images: &'a ImageTransformer,
        checkout: &'a CheckoutConfig,
    ) -> Self {
        Self {
            carts: CartRepository::new(pool),
            products: ProductRepository::new(pool),
            images,
            checkout,
        }
    }

    /// The user's priced cart.
    ///
    /// # Errors
    ///
    /// Returns `CartError::Repository` if a query fails.
    pub async fn get_cart(&self, user_id: UserId) -> Result<Cart, CartError> {
        let mut lines = self.carts.lines(user_id).await?;
        for line in &mut lines {
            line.image = line
                .image
                .take()
                .map(|source| self.images.url(&source, ImagePreset::Thumbnail));
        }
        Ok(Cart::from_lines(lines, self.checkout))
    }

    /// Add a quantity of a size, merging into an existing line.
    ///
    /// # Errors
    ///
    /// Returns `CartError::ProductNotFound` for unknown or archived products,
    /// `CartError::UnknownSize` when the size has no stock row, and
    /// `CartError::OutOfStock` when the merged quantity exceeds stock.
    #[instrument(skip(self, input), fields(product_id = %input.product_id))]
    pub async fn add_item(&self, user_id: UserId, input: &CartItemInput) -> Result<Cart, CartError> {
        if !(1..=MAX_LINE_QUANTITY).contains(&input.quantity) {
            return Err(CartError::InvalidQuantity { min: 1 });
        }
        let size = validate_size(&input.size).map_err(|_| CartError::UnknownSize(input.size.clone()))?;
        let available = self.available(input.product_id, &size).await?;

        let cart_id = self.carts.ensure_cart(user_id).await?;
        let existing = self
            .carts
            .line_quantity(cart_id, input.product_id, &size)
            .await?
            .unwrap_or(0);
        let merged = existing.saturating_add(input.quantity);

        if merged > MAX_LINE_QUANTITY {
            return Err(CartError::InvalidQuantity { min: 1 });
        }
        if merged > available {
            return Err(CartError::OutOfStock { available });
        }

        self.carts
            .set_line(cart_id, input.product_id, &size, merged)
            .await?;
        self.get_cart(user_id).await
    }

    /// Set a line's quantity. Zero removes the line.
    ///
    /// # Errors
    ///
    /// Returns `CartError::LineNotFound` if the line is not in the cart and
    /// `CartError::OutOfStock` when stock is short.
    #[instrument(skip(self, input), fields(product_id = %input.product_id))]
    pub async fn update_item(
        &self,
        user_id: UserId,
        input: &CartItemInput,
    ) -> Result<Cart, CartError> {
        if !(0..=MAX_LINE_QUANTITY).contains(&input.quantity) {
            return Err(CartError::InvalidQuantity { min: 0 });
        }
        let size = validate_size(&input.size).map_err(|_| CartError::UnknownSize(input.size.clone()))?;

        let cart_id = self.carts.ensure_cart(user_id).await?;
        if self
            .carts
            .line_quantity(cart_id, input.product_id, &size)
            .await?
            .is_none()
        {
            return Err(CartError::LineNotFound);
        }

        if input.quantity == 0 {
            self.carts
                .remove_line(user_id, input.product_id, &size)
                .await?;
        } else {
            let available = self.available(input.product_id, &size).await?;
            if input.quantity > available {
                return Err(CartError::OutOfStock { available });
            }
            self.carts
                .set_line(cart_id, input.product_id, &size, input.quantity)
                .await?;
        }

        self.get_cart(user_id).await
    }

    /// Remove a line. Removing a missing line is not an error.
    ///
    /// # Errors
    ///
    /// Returns `CartError::Repository` if a query fails.
    pub async fn remove_item(&self, user_id: UserId, key: &CartItemKey) -> Result<Cart, CartError> {
        if let Ok(size) = validate_size(&key.size) {
            self.carts
                .remove_line(user_id, key.product_id, &size)
                .await?;
        }
        self.get_cart(user_id).await
    }

    /// Empty the cart.
    ///
    /// # Errors
    ///
    /// Returns `CartError::Repository` if the delete fails.
    pub async fn clear(&self, user_id: UserId) -> Result<Cart, CartError> {
        self.carts.clear(user_id).await?;
        Ok(Cart::from_lines(Vec::new(), self.checkout))
    }

    /// Total quantity in the cart.
    ///
    /// # Errors
    ///
    /// Returns `CartError::Repository` if the query fails.
    pub async fn count(&self, user_id: UserId) -> Result<i64, CartError> {
        Ok(self.carts.count(user_id).await?)
    }

    /// Stock for a size of a live product.
    async fn available(&self, product_id: ProductId, size: &str) -> Result<i32, CartError> {
        let product = self
            .products
            .get_by_id(product_id)
            .await?
            .filter(|p| !p.is_archived)
            .ok_or(CartError::ProductNotFound)?;

        self.products
            .stock_for_size(product.id, size)
            .await?
            .ok_or_else(|| CartError::UnknownSize(size.to_owned()))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        assert_eq!(
            CartError::OutOfStock { available: 2 }.to_string(),
            "only 2 left in stock"
        );
        assert_eq!(
            CartError::InvalidQuantity { min: 1 }.to_string(),
            "quantity must be between 1 and 99"
        );
    }
}
