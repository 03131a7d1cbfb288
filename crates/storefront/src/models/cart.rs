//! Cart and wishlist types, and the pricing rules shared with checkout.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use bazaar_core::{CurrencyCode, ProductId, Slug};

use crate::config::CheckoutConfig;

/// A cart line joined with the live product and stock.
#[derive(Debug, Clone, Serialize)]
pub struct CartLine {
    pub product_id: ProductId,
    pub slug: Slug,
    pub name: String,
    pub image: Option<String>,
    pub size: String,
    pub quantity: i32,
    pub unit_price: Decimal,
    /// Stock currently available for this size.
    pub available: i32,
    pub is_archived: bool,
    pub line_total: Decimal,
}

/// A priced cart.
#[derive(Debug, Clone, Serialize)]
pub struct Cart {
    pub lines: Vec<CartLine>,
    pub item_count: i64,
    pub subtotal: Decimal,
    pub shipping_fee: Decimal,
    pub total: Decimal,
    pub currency: CurrencyCode,
}

/// Subtotal, shipping and total for a set of lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Totals {
    pub subtotal: Decimal,
    pub shipping_fee: Decimal,
    pub total: Decimal,
}

impl Totals {
    /// Price `(unit_price, quantity)` pairs.
    ///
    /// Shipping is free for an empty cart or once the subtotal reaches the
    /// free-shipping threshold.
    #[must_use]
    pub fn compute<I>(lines: I, config: &CheckoutConfig) -> Self
    where
        I: IntoIterator<Item = (Decimal, i32)>,
    {
        let mut subtotal = Decimal::ZERO;
        let mut any = false;
        for (unit_price, quantity) in lines {
            any = true;
            subtotal += unit_price * Decimal::from(quantity);
        }

        let shipping_fee = if !any || subtotal >= config.free_shipping_threshold {
            Decimal::ZERO
        } else {
            config.shipping_fee
        };

        Self {
            subtotal,
            shipping_fee,
            total: subtotal + shipping_fee,
        }
    }
}

impl Cart {
    /// Price a set of lines.
    #[must_use]
    pub fn from_lines(mut lines: Vec<CartLine>, config: &CheckoutConfig) -> Self {
        for line in &mut lines {
            line.line_total = line.unit_price * Decimal::from(line.quantity);
        }
        let totals = Totals::compute(lines.iter().map(|l| (l.unit_price, l.quantity)), config);
        let item_count = lines.iter().map(|l| i64::from(l.quantity)).sum();

        Self {
            lines,
            item_count,
            subtotal: totals.subtotal,
            shipping_fee: totals.shipping_fee,
            total: totals.total,
            currency: config.currency,
        }
    }
}

/// `POST /api/cart/items` and `PATCH /api/cart/items` payload.
#[derive(Debug, Clone, Deserialize)]
pub struct CartItemInput {
    pub product_id: ProductId,
    pub size: String,
    pub quantity: i32,
}

/// `DELETE /api/cart/items` payload.
#[derive(Debug, Clone, Deserialize)]
pub struct CartItemKey {
    pub product_id: ProductId,
    pub size: String,
}

/// A wishlist entry joined with the product.
#[derive(Debug, Clone, Serialize)]
pub struct WishlistItem {
    pub product_id: ProductId,
    pub slug: Slug,
    pub name: String,
    pub price: Decimal,
    pub image: Option<String>,
    pub in_stock: bool,
    pub is_archived: bool,
    pub added_at: DateTime<Utc>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::str::FromStr;

    use super::*;

    fn d(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn line(price: &str, quantity: i32) -> CartLine {
        CartLine {
            product_id: ProductId::new(1),
            slug: Slug::parse("linen-shirt").unwrap(),
            name: "Linen Shirt".to_string(),
            image: None,
            size: "M".to_string(),
            quantity,
            unit_price: d(price),
            available: 10,
            is_archived: false,
            line_total: Decimal::ZERO,
        }
    }

    #[test]
    fn test_empty_cart_has_no_shipping() {
        let cart = Cart::from_lines(Vec::new(), &CheckoutConfig::default());
        assert_eq!(cart.total, Decimal::ZERO);
        assert_eq!(cart.shipping_fee, Decimal::ZERO);
        assert_eq!(cart.item_count, 0);
    }

    #[test]
    fn test_shipping_below_threshold() {
        let cart = Cart::from_lines(vec![line("499.00", 1)], &CheckoutConfig::default());
        assert_eq!(cart.subtotal, d("499.00"));
        assert_eq!(cart.shipping_fee, d("79.00"));
        assert_eq!(cart.total, d("578.00"));
    }

    #[test]
    fn test_free_shipping_at_threshold() {
        let cart = Cart::from_lines(
            vec![line("333.00", 3), line("0.00", 1)],
            &CheckoutConfig::default(),
        );
        assert_eq!(cart.subtotal, d("999.00"));
        assert_eq!(cart.shipping_fee, Decimal::ZERO);
        assert_eq!(cart.item_count, 4);
    }

    #[test]
    fn test_line_totals() {
        let cart = Cart::from_lines(vec![line("249.50", 2)], &CheckoutConfig::default());
        assert_eq!(cart.lines[0].line_total, d("499.00"));
    }
}
