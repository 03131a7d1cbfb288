//! Checkout: stock reservation, payment confirmation and webhooks.
//!
//! # Flow
//!
//! 1. `place_order` reserves stock and writes a pending order in one
//!    transaction, then creates the gateway order.
//! 2. The browser pays through the gateway widget and posts the signed
//!    callback to `verify_payment`.
//! 3. The gateway also sends a webhook. Whichever arrives first confirms
//!    the order; `mark_paid` only matches a pending payment, so the
//!    second is a no-op.
//! 4. Orders left unpaid past `reserved_until` are cancelled by
//!    `expire_reservations` and their stock goes back on sale.

mod error;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use tracing::instrument;

use bazaar_core::{
    AddressId, CurrencyCode, OrderId, OrderStatus, PaymentStatus, Price, ProductId, UserId,
};

pub use error::CheckoutError;

use crate::config::CheckoutConfig;
use crate::db::{AddressRepository, OrderRepository, UserRepository, carts, orders};
use crate::models::cart::Totals;
use crate::models::order::{NewOrder, Order};
use crate::services::catalog::ProductCache;
use crate::services::email::{self, EmailService};
use crate::services::payments::{PaymentGateway, WebhookEventKind};

/// What the browser needs to open the gateway checkout.
#[derive(Debug, Clone, Serialize)]
pub struct CheckoutSession {
    pub order_id: OrderId,
    pub gateway_order_id: String,
    /// Public gateway key.
    pub key_id: String,
    /// Amount in minor units.
    pub amount: i64,
    pub currency: CurrencyCode,
    pub total: rust_decimal::Decimal,
}

/// `POST /api/checkout` payload.
#[derive(Debug, Clone, Deserialize)]
pub struct PlaceOrderInput {
    pub address_id: AddressId,
}

/// `POST /api/checkout/verify` payload, as posted by the gateway widget.
#[derive(Debug, Clone, Deserialize)]
pub struct VerifyPaymentInput {
    pub order_id: OrderId,
    pub gateway_order_id: String,
    pub gateway_payment_id: String,
    pub signature: String,
}

/// Result of applying a successful payment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentOutcome {
    /// The order moved to confirmed.
    Confirmed,
    /// The payment was already applied.
    AlreadyProcessed,
    /// The order had been cancelled, so the payment was refunded.
    Refunded,
}

/// Result of a webhook delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WebhookOutcome {
    Processed,
    Duplicate,
    Ignored,
}

/// Checkout service for one request.
pub struct CheckoutService<'a, G: PaymentGateway> {
    pool: &'a PgPool,
    gateway: &'a G,
    config: &'a CheckoutConfig,
    cache: &'a ProductCache,
    mailer: Option<&'a EmailService>,
}

impl<'a, G: PaymentGateway> CheckoutService<'a, G> {
    #[must_use]
    pub const fn new(
        pool: &'a PgPool,
        gateway: &'a G,
        config: &'a CheckoutConfig,
        cache: &'a ProductCache,
        mailer: Option<&'a EmailService>,
    ) -> Self {
        Self {
            pool,
            gateway,
            config,
            cache,
            mailer,
        }
    }

    /// Reserve stock for the user's cart and open a gateway order.
    ///
    /// # Errors
    ///
    /// Returns `CheckoutError::EmptyCart`, `AddressNotFound`,
    /// `ProductUnavailable` or `OutOfStock` when the cart cannot be ordered,
    /// and `CheckoutError::Gateway` when the gateway order cannot be created
    /// (the order is cancelled and its stock released).
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn place_order(
        &self,
        user_id: UserId,
        address_id: AddressId,
        now: DateTime<Utc>,
    ) -> Result<CheckoutSession, CheckoutError> {
        let address = AddressRepository::new(self.pool)
            .get(user_id, address_id)
            .await?
            .ok_or(CheckoutError::AddressNotFound)?;

        let mut tx = self.pool.begin().await?;

        let lines = carts::lock_lines(&mut tx, user_id).await?;
        if lines.is_empty() {
            return Err(CheckoutError::EmptyCart);
        }
        if let Some(line) = lines.iter().find(|l| l.is_archived) {
            return Err(CheckoutError::ProductUnavailable {
                product: line.product_name.clone(),
            });
        }

        for line in &lines {
            if !orders::reserve_stock(&mut tx, line.product_id, &line.size, line.quantity).await? {
                let available =
                    orders::available_stock(&mut tx, line.product_id, &line.size).await?;
                return Err(CheckoutError::OutOfStock {
                    product: line.product_name.clone(),
                    size: line.size.clone(),
                    available,
                });
            }
        }

        let totals = Totals::compute(lines.iter().map(|l| (l.price, l.quantity)), self.config);
        let currency = self.config.currency;
        let amount = Price::new(totals.total, currency).to_minor_units()?;

        let new_order = NewOrder {
            user_id,
            subtotal: totals.subtotal,
            shipping_fee: totals.shipping_fee,
            total: totals.total,
            currency,
            shipping_address: address.details,
            reserved_until: now + Duration::minutes(self.config.reservation_ttl_minutes),
        };
        let order_id = orders::insert_order(&mut tx, &new_order).await?;
        orders::insert_order_items(&mut tx, order_id, &lines).await?;
        orders::record_status(&mut tx, order_id, OrderStatus::Pending, None).await?;
        tx.commit().await?;

        let touched: Vec<ProductId> = lines.iter().map(|l| l.product_id).collect();
        self.cache.invalidate_many(&touched);
        tracing::info!(order_id = %order_id, total = %totals.total, "Order placed, stock reserved");

        let receipt = format!("order_{order_id}");
        let gateway_order = match self.gateway.create_order(amount, currency, &receipt).await {
            Ok(gateway_order) => gateway_order,
            Err(e) => {
                tracing::error!(order_id = %order_id, error = %e, "Gateway order creation failed");
                self.abandon(order_id).await;
                return Err(e.into());
            }
        };

        if let Err(e) = OrderRepository::new(self.pool)
            .set_gateway_order_id(order_id, &gateway_order.id)
            .await
        {
            self.abandon(order_id).await;
            return Err(e.into());
        }

        Ok(CheckoutSession {
            order_id,
            gateway_order_id: gateway_order.id,
            key_id: self.gateway.key_id().to_owned(),
            amount,
            currency,
            total: totals.total,
        })
    }

    /// Check the signed callback from the gateway widget and apply the payment.
    ///
    /// # Errors
    ///
    /// Returns `CheckoutError::InvalidSignature` if the signature or gateway
    /// order id does not match, and `CheckoutError::OrderNotFound` if the
    /// order is not the user's.
    #[instrument(skip(self, input), fields(order_id = %input.order_id))]
    pub async fn verify_payment(
        &self,
        user_id: UserId,
        input: &VerifyPaymentInput,
    ) -> Result<PaymentOutcome, CheckoutError> {
        if !self.gateway.verify_payment_signature(
            &input.gateway_order_id,
            &input.gateway_payment_id,
            &input.signature,
        ) {
            tracing::warn!("Payment callback signature mismatch");
            return Err(CheckoutError::InvalidSignature);
        }

        let order = OrderRepository::new(self.pool)
            .get_for_user(user_id, input.order_id)
            .await?
            .ok_or(CheckoutError::OrderNotFound)?;
        if order.gateway_order_id.as_deref() != Some(input.gateway_order_id.as_str()) {
            tracing::warn!("Payment callback for a different gateway order");
            return Err(CheckoutError::InvalidSignature);
        }

        self.confirm_payment(order.id, &input.gateway_payment_id)
            .await
    }

    /// Apply a captured payment. Safe to call any number of times.
    ///
    /// The first call confirms the order, clears the cart and queues the
    /// confirmation email. A payment for an order that was cancelled in
    /// the meantime is refunded.
    ///
    /// # Errors
    ///
    /// Returns `CheckoutError::OrderNotFound` for unknown orders and
    /// `CheckoutError::Gateway` if a late payment cannot be refunded.
    #[instrument(skip(self), fields(order_id = %order_id))]
    pub async fn confirm_payment(
        &self,
        order_id: OrderId,
        payment_id: &str,
    ) -> Result<PaymentOutcome, CheckoutError> {
        let mut tx = self.pool.begin().await?;

        if let Some(order) = orders::mark_paid(&mut tx, order_id, payment_id).await? {
            carts::clear_for_user(&mut tx, order.user_id).await?;
            orders::record_status(
                &mut tx,
                order_id,
                OrderStatus::Confirmed,
                Some("payment received"),
            )
            .await?;
            tx.commit().await?;

            tracing::info!("Payment confirmed");
            self.send_confirmation(order).await;
            return Ok(PaymentOutcome::Confirmed);
        }

        let order = orders::lock_order(&mut tx, order_id)
            .await?
            .ok_or(CheckoutError::OrderNotFound)?;

        let late = order.status == OrderStatus::Cancelled
            && matches!(
                order.payment_status,
                PaymentStatus::Pending | PaymentStatus::Failed
            );
        if !late {
            tracing::debug!("Payment already processed");
            return Ok(PaymentOutcome::AlreadyProcessed);
        }

        // Row stays locked through the refund so a concurrent delivery
        // sees `refunded` and stops.
        let amount = Price::new(order.total, order.currency).to_minor_units()?;
        self.gateway.refund(payment_id, amount).await?;
        orders::set_payment_status(&mut tx, order_id, PaymentStatus::Refunded, Some(payment_id))
            .await?;
        orders::record_status(
            &mut tx,
            order_id,
            OrderStatus::Cancelled,
            Some("payment arrived after cancellation and was refunded"),
        )
        .await?;
        tx.commit().await?;

        tracing::warn!("Payment captured for a cancelled order, refunded");
        Ok(PaymentOutcome::Refunded)
    }

    /// Cancel an order whose payment failed, if it is still awaiting payment.
    ///
    /// Returns whether the order was cancelled.
    ///
    /// # Errors
    ///
    /// Returns `CheckoutError::Repository` if a query fails.
    #[instrument(skip(self, reason), fields(order_id = %order_id))]
    pub async fn fail_payment(
        &self,
        order_id: OrderId,
        reason: Option<&str>,
    ) -> Result<bool, CheckoutError> {
        let cancelled = cancel_and_release(
            self.pool,
            self.cache,
            order_id,
            Some(PaymentStatus::Failed),
            reason.unwrap_or("payment failed"),
        )
        .await?;
        if cancelled {
            tracing::info!("Payment failed, order cancelled");
        }
        Ok(cancelled)
    }

    /// Verify, deduplicate and apply a gateway webhook.
    ///
    /// # Errors
    ///
    /// Returns `CheckoutError::InvalidWebhookSignature` for a missing or
    /// wrong signature, `CheckoutError::InvalidWebhook` for unparseable bodies,
    /// and `CheckoutError::OrderNotFound` when the gateway order is
    /// unknown. A failed event is forgotten so the gateway's retry is
    /// processed.
    #[instrument(skip(self, body, signature))]
    pub async fn handle_webhook(
        &self,
        body: &[u8],
        signature: Option<&str>,
        event_id: Option<&str>,
    ) -> Result<WebhookOutcome, CheckoutError> {
        let Some(signature) = signature else {
            tracing::warn!("Webhook without signature");
            return Err(CheckoutError::InvalidWebhookSignature);
        };
        if !self.gateway.verify_webhook_signature(body, signature) {
            tracing::warn!("Webhook signature mismatch");
            return Err(CheckoutError::InvalidWebhookSignature);
        }

        let event = self
            .gateway
            .parse_webhook(body)
            .map_err(|e| CheckoutError::InvalidWebhook(e.to_string()))?;
        let gateway_order_id = match &event.kind {
            WebhookEventKind::Paid {
                gateway_order_id, ..
            }
            | WebhookEventKind::PaymentFailed {
                gateway_order_id, ..
            } => gateway_order_id,
            WebhookEventKind::Ignored => {
                tracing::debug!(event_type = %event.event_type, "Webhook ignored");
                return Ok(WebhookOutcome::Ignored);
            }
        };

        let repo = OrderRepository::new(self.pool);
        let Some(order) = repo.get_by_gateway_order_id(gateway_order_id).await? else {
            tracing::warn!(gateway_order_id = %gateway_order_id, "Webhook for unknown gateway order");
            return Err(CheckoutError::OrderNotFound);
        };

        let event_id = event_id.map_or_else(|| event.fallback_id(), ToOwned::to_owned);
        if !repo
            .record_payment_event(&event_id, &event.event_type, Some(order.id))
            .await?
        {
            tracing::info!(event_id = %event_id, "Duplicate webhook delivery");
            return Ok(WebhookOutcome::Duplicate);
        }

        let result = match &event.kind {
            WebhookEventKind::Paid { payment_id, .. } => {
                self.confirm_payment(order.id, payment_id).await.map(|_| ())
            }
            WebhookEventKind::PaymentFailed { reason, .. } => {
                self.fail_payment(order.id, reason.as_deref()).await.map(|_| ())
            }
            WebhookEventKind::Ignored => Ok(()),
        };

        if let Err(e) = result {
            if let Err(forget) = repo.forget_payment_event(&event_id).await {
                tracing::error!(event_id = %event_id, error = %forget, "Failed to forget webhook event");
            }
            return Err(e);
        }

        tracing::info!(event_id = %event_id, event_type = %event.event_type, order_id = %order.id, "Webhook processed");
        Ok(WebhookOutcome::Processed)
    }

    /// Cancel an order whose gateway order could not be set up.
    async fn abandon(&self, order_id: OrderId) {
        if let Err(e) = cancel_and_release(
            self.pool,
            self.cache,
            order_id,
            Some(PaymentStatus::Failed),
            "payment gateway unavailable",
        )
        .await
        {
            tracing::error!(order_id = %order_id, error = %e, "Failed to release abandoned order");
        }
    }

    async fn send_confirmation(&self, order: Order) {
        if self.mailer.is_none() {
            tracing::info!(order_id = %order.id, "Email not configured, skipping confirmation");
            return;
        }

        let items = OrderRepository::new(self.pool).items(order.id).await;
        let user = UserRepository::new(self.pool).get_by_id(order.user_id).await;
        match (items, user) {
            (Ok(items), Ok(Some(user))) => {
                email::spawn_send(self.mailer, "order_confirmation", move |mailer| async move {
                    mailer
                        .send_order_confirmation(user.email.as_str(), &user.name, &order, &items)
                        .await
                });
            }
            (Err(e), _) | (_, Err(e)) => {
                tracing::warn!(order_id = %order.id, error = %e, "Could not load order for confirmation email");
            }
            (Ok(_), Ok(None)) => {
                tracing::warn!(order_id = %order.id, "Order owner missing, no confirmation email");
            }
        }
    }
}

/// Cancel a pending order, release its stock and record why.
///
/// Every unpaid cancellation goes through here. The status guard means
/// stock is released at most once. Returns whether this call cancelled
/// the order.
///
/// # Errors
///
/// Returns `CheckoutError::Repository` if a query fails.
pub async fn cancel_and_release(
    pool: &PgPool,
    cache: &ProductCache,
    order_id: OrderId,
    payment_status: Option<PaymentStatus>,
    note: &str,
) -> Result<bool, CheckoutError> {
    let mut tx = pool.begin().await?;
    if orders::cancel(&mut tx, order_id, &[OrderStatus::Pending], payment_status)
        .await?
        .is_none()
    {
        return Ok(false);
    }
    let products = orders::release_stock(&mut tx, order_id).await?;
    orders::record_status(&mut tx, order_id, OrderStatus::Cancelled, Some(note)).await?;
    tx.commit().await?;

    cache.invalidate_many(&products);
    Ok(true)
}

/// Cancel every unpaid order whose reservation lapsed before `now`.
///
/// Returns how many orders were cancelled. Failures on one order are
/// logged and do not stop the sweep.
///
/// # Errors
///
/// Returns `CheckoutError::Repository` if the lapsed orders cannot be listed.
#[instrument(skip(pool, cache))]
pub async fn expire_reservations(
    pool: &PgPool,
    cache: &ProductCache,
    now: DateTime<Utc>,
) -> Result<usize, CheckoutError> {
    let lapsed = OrderRepository::new(pool).expired_reservations(now).await?;
    let mut expired = 0;

    for order_id in lapsed {
        match cancel_and_release(
            pool,
            cache,
            order_id,
            Some(PaymentStatus::Failed),
            "reservation expired",
        )
        .await
        {
            Ok(true) => expired += 1,
            Ok(false) => {}
            Err(e) => {
                tracing::warn!(order_id = %order_id, error = %e, "Failed to expire reservation");
            }
        }
    }

    if expired > 0 {
        tracing::info!(expired, "Expired unpaid reservations");
    }
    Ok(expired)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_outcomes_serialize_snake_case() {
        assert_eq!(
            serde_json::to_value(PaymentOutcome::AlreadyProcessed).unwrap(),
            "already_processed"
        );
        assert_eq!(
            serde_json::to_value(WebhookOutcome::Duplicate).unwrap(),
            "duplicate"
        );
    }

    #[test]
    fn test_verify_input_deserializes() {
        let input: VerifyPaymentInput = serde_json::from_str(
            r#"{"order_id":7,"gateway_order_id":"order_A","gateway_payment_id":"pay_B","signature":"ab"}"#,
        )
        .unwrap();
        assert_eq!(input.order_id, OrderId::new(7));
        assert_eq!(input.gateway_payment_id, "pay_B");
    }

    #[test]
    fn test_out_of_stock_message() {
        let err = CheckoutError::OutOfStock {
            product: "Linen Shirt".to_string(),
            size: "M".to_string(),
            available: 1,
        };
        assert_eq!(err.to_string(), "only 1 of Linen Shirt (M) left in stock");
    }
}
