//! Wishlist operations.

use sqlx::PgPool;

use bazaar_core::{ProductId, UserId};

use crate::config::CheckoutConfig;
use crate::db::{ProductRepository, WishlistRepository};
use crate::models::cart::{Cart, CartItemInput, WishlistItem};
use crate::services::cart::{CartError, CartService};
use crate::services::images::{ImagePreset, ImageTransformer};

/// Wishlist service for one request.
pub struct WishlistService<'a> {
    pool: &'a PgPool,
    wishlists: WishlistRepository<'a>,
    images: &'a ImageTransformer,
    checkout: &'a CheckoutConfig,
}

impl<'a> WishlistService<'a> {
    #[must_use]
    pub const fn new(
        pool: &'a PgPool,
        images: &'a ImageTransformer,
        checkout: &'a CheckoutConfig,
    ) -> Self {
        Self {
            pool,
            wishlists: WishlistRepository::new(pool),
            images,
            checkout,
        }
    }

    /// Saved products, newest first.
    ///
    /// # Errors
    ///
    /// Returns `CartError::Repository` if the query fails.
    pub async fn list(&self, user_id: UserId) -> Result<Vec<WishlistItem>, CartError> {
        let mut items = self.wishlists.items(user_id).await?;
        for item in &mut items {
            item.image = item
                .image
                .take()
                .map(|source| self.images.url(&source, ImagePreset::Thumbnail));
        }
        Ok(items)
    }

    /// Save a product. Saving twice is a no-op.
    ///
    /// # Errors
    ///
    /// Returns `CartError::ProductNotFound` if the product does not exist.
    pub async fn add(&self, user_id: UserId, product_id: ProductId) -> Result<(), CartError> {
        ProductRepository::new(self.pool)
            .get_by_id(product_id)
            .await?
            .ok_or(CartError::ProductNotFound)?;

        let wishlist_id = self.wishlists.ensure_wishlist(user_id).await?;
        self.wishlists.add(wishlist_id, product_id).await?;
        Ok(())
    }

    /// Remove a product. Returns whether it was saved.
    ///
    /// # Errors
    ///
    /// Returns `CartError::Repository` if the delete fails.
    pub async fn remove(&self, user_id: UserId, product_id: ProductId) -> Result<bool, CartError> {
        Ok(self.wishlists.remove(user_id, product_id).await?)
    }

    /// Add one of `size` to the cart, then drop the product from the wishlist.
    ///
    /// The wishlist is left untouched if the cart rejects the item.
    ///
    /// # Errors
    ///
    /// Returns `CartError::LineNotFound` if the product is not on the
    /// wishlist, or any error from adding to the cart.
    pub async fn move_to_cart(
        &self,
        user_id: UserId,
        product_id: ProductId,
        size: &str,
    ) -> Result<Cart, CartError> {
        if !self.wishlists.contains(user_id, product_id).await? {
            return Err(CartError::LineNotFound);
        }

        let cart = CartService::new(self.pool, self.images, self.checkout)
            .add_item(
                user_id,
                &CartItemInput {
                    product_id,
                    size: size.to_owned(),
                    quantity: 1,
                },
            )
            .await?;

        self.wishlists.remove(user_id, product_id).await?;
        Ok(cart)
    }
}
