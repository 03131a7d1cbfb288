//! Order history, customer cancellation and admin fulfilment.

use sqlx::{PgConnection, PgPool};
use tracing::instrument;

use bazaar_core::{OrderId, OrderStatus, PaymentStatus, Price, UserId};

use crate::db::{OrderRepository, UserRepository, orders};
use crate::models::order::{
    AdminOrderQuery, AdminOrderSummary, Order, OrderDetail, OrderSummary, StatusUpdate,
};
use crate::models::{DEFAULT_PER_PAGE, Page, PageParams, Paginated};
use crate::services::catalog::ProductCache;
use crate::services::checkout::CheckoutError;
use crate::services::email::{self, EmailService};
use crate::services::payments::PaymentGateway;

const MAX_TRACKING_CHARS: usize = 64;

/// Order service for one request.
pub struct OrderService<'a, G: PaymentGateway> {
    pool: &'a PgPool,
    orders: OrderRepository<'a>,
    gateway: &'a G,
    cache: &'a ProductCache,
    mailer: Option<&'a EmailService>,
}

impl<'a, G: PaymentGateway> OrderService<'a, G> {
    #[must_use]
    pub const fn new(
        pool: &'a PgPool,
        gateway: &'a G,
        cache: &'a ProductCache,
        mailer: Option<&'a EmailService>,
    ) -> Self {
        Self {
            pool,
            orders: OrderRepository::new(pool),
            gateway,
            cache,
            mailer,
        }
    }

    /// The user's orders, newest first.
    ///
    /// # Errors
    ///
    /// Returns `CheckoutError::Repository` if a query fails.
    pub async fn list_mine(
        &self,
        user_id: UserId,
        params: PageParams,
    ) -> Result<Paginated<OrderSummary>, CheckoutError> {
        let page = Page::from_params(params, DEFAULT_PER_PAGE);
        let (items, total) = self.orders.list_for_user(user_id, page).await?;
        Ok(Paginated::new(items, page, total))
    }

    /// One of the user's orders with items and status history.
    ///
    /// # Errors
    ///
    /// Returns `CheckoutError::OrderNotFound` if the order is not the user's.
    pub async fn get_mine(
        &self,
        user_id: UserId,
        id: OrderId,
    ) -> Result<OrderDetail, CheckoutError> {
        let order = self
            .orders
            .get_for_user(user_id, id)
            .await?
            .ok_or(CheckoutError::OrderNotFound)?;
        self.detail(order).await
    }

    /// Cancel an order before it ships, refunding it if paid.
    ///
    /// # Errors
    ///
    /// Returns `CheckoutError::NotCancellable` once the order has shipped and
    /// `CheckoutError::Gateway` if the refund fails, in which case the order
    /// is left as it was.
    #[instrument(skip(self), fields(user_id = %user_id, order_id = %id))]
    pub async fn cancel_mine(
        &self,
        user_id: UserId,
        id: OrderId,
    ) -> Result<OrderDetail, CheckoutError> {
        let mut tx = self.pool.begin().await?;
        let order = orders::lock_order(&mut tx, id)
            .await?
            .filter(|o| o.user_id == user_id)
            .ok_or(CheckoutError::OrderNotFound)?;

        if !order.status.is_cancellable_by_customer() {
            return Err(CheckoutError::NotCancellable(order.status));
        }

        let products = self
            .cancel_locked(&mut tx, &order, "cancelled by customer")
            .await?;
        tx.commit().await?;

        self.cache.invalidate_many(&products);
        tracing::info!("Order cancelled by customer");
        self.get_mine(user_id, id).await
    }

    /// All orders, filtered for the admin list.
    ///
    /// # Errors
    ///
    /// Returns `CheckoutError::Repository` if a query fails.
    pub async fn list_all(
        &self,
        query: &AdminOrderQuery,
    ) -> Result<Paginated<AdminOrderSummary>, CheckoutError> {
        let page = Page::from_params(
            PageParams {
                page: query.page,
                per_page: query.per_page,
            },
            DEFAULT_PER_PAGE,
        );
        let (items, total) = self.orders.list_admin(query, page).await?;
        Ok(Paginated::new(items, page, total))
    }

    /// Any order with items and history.
    ///
    /// # Errors
    ///
    /// Returns `CheckoutError::OrderNotFound` if the order does not exist.
    pub async fn get(&self, id: OrderId) -> Result<OrderDetail, CheckoutError> {
        let order = self
            .orders
            .get(id)
            .await?
            .ok_or(CheckoutError::OrderNotFound)?;
        self.detail(order).await
    }

    /// Move an order along its lifecycle.
    ///
    /// Cancelling releases stock and refunds paid orders. Shipping needs a
    /// tracking number, from the update or already on the order, and emails
    /// the customer.
    ///
    /// # Errors
    ///
    /// Returns `CheckoutError::InvalidTransition` when the lifecycle forbids
    /// the change and `CheckoutError::TrackingRequired` when shipping without
    /// a tracking number.
    #[instrument(skip(self, update), fields(order_id = %id, to = %update.status))]
    pub async fn update_status(
        &self,
        id: OrderId,
        update: &StatusUpdate,
    ) -> Result<OrderDetail, CheckoutError> {
        let new_tracking = update
            .tracking_number
            .as_deref()
            .map(validate_tracking)
            .transpose()?;
        let note = update
            .note
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty());

        let mut tx = self.pool.begin().await?;
        let order = orders::lock_order(&mut tx, id)
            .await?
            .ok_or(CheckoutError::OrderNotFound)?;

        let invalid = CheckoutError::InvalidTransition {
            from: order.status,
            to: update.status,
        };
        if !order.status.can_transition_to(update.status) {
            return Err(invalid);
        }

        let mut released = Vec::new();
        match update.status {
            OrderStatus::Cancelled => {
                released = self
                    .cancel_locked(&mut tx, &order, note.unwrap_or("cancelled by admin"))
                    .await?;
            }
            to => {
                if to == OrderStatus::Shipped
                    && new_tracking.is_none()
                    && order.tracking_number.is_none()
                {
                    return Err(CheckoutError::TrackingRequired);
                }
                if orders::transition(&mut tx, id, order.status, to)
                    .await?
                    .is_none()
                {
                    return Err(invalid);
                }
                orders::record_status(&mut tx, id, to, note).await?;
            }
        }
        tx.commit().await?;

        self.cache.invalidate_many(&released);
        let order = match new_tracking {
            Some(tracking) => self.orders.set_tracking(id, &tracking).await?,
            None => self
                .orders
                .get(id)
                .await?
                .ok_or(CheckoutError::OrderNotFound)?,
        };
        tracing::info!("Order status updated");

        if order.status == OrderStatus::Shipped {
            self.send_shipped(&order).await;
        }
        self.detail(order).await
    }

    /// Set or correct the courier tracking number.
    ///
    /// # Errors
    ///
    /// Returns `CheckoutError::InvalidTracking` for blank or overlong numbers
    /// and `CheckoutError::OrderNotFound` for unknown orders.
    pub async fn set_tracking(
        &self,
        id: OrderId,
        tracking_number: &str,
    ) -> Result<OrderDetail, CheckoutError> {
        let tracking = validate_tracking(tracking_number)?;
        let order = self
            .orders
            .set_tracking(id, &tracking)
            .await
            .map_err(|e| match e {
                crate::db::RepositoryError::NotFound => CheckoutError::OrderNotFound,
                other => other.into(),
            })?;
        self.detail(order).await
    }

    /// Cancel a locked order, release its stock and refund it if paid.
    ///
    /// The refund happens last, so a gateway failure drops the transaction
    /// and leaves the order untouched.
    async fn cancel_locked(
        &self,
        conn: &mut PgConnection,
        order: &Order,
        note: &str,
    ) -> Result<Vec<bazaar_core::ProductId>, CheckoutError> {
        let paid = order.payment_status == PaymentStatus::Paid;
        let payment_status = if paid {
            Some(PaymentStatus::Refunded)
        } else if order.payment_status == PaymentStatus::Pending {
            Some(PaymentStatus::Failed)
        } else {
            None
        };

        if orders::cancel(&mut *conn, order.id, &[order.status], payment_status)
            .await?
            .is_none()
        {
            return Err(CheckoutError::InvalidTransition {
                from: order.status,
                to: OrderStatus::Cancelled,
            });
        }
        let products = orders::release_stock(&mut *conn, order.id).await?;
        orders::record_status(&mut *conn, order.id, OrderStatus::Cancelled, Some(note)).await?;

        if paid {
            let payment_id = order
                .gateway_payment_id
                .as_deref()
                .ok_or(CheckoutError::MissingPayment)?;
            let amount = Price::new(order.total, order.currency).to_minor_units()?;
            let refund = self.gateway.refund(payment_id, amount).await.map_err(|e| {
                tracing::error!(order_id = %order.id, error = %e, "Refund failed, cancellation rolled back");
                e
            })?;
            tracing::info!(order_id = %order.id, refund_id = %refund.id, "Payment refunded");
        }

        Ok(products)
    }

    async fn detail(&self, order: Order) -> Result<OrderDetail, CheckoutError> {
        let items = self.orders.items(order.id).await?;
        let history = self.orders.history(order.id).await?;
        Ok(OrderDetail {
            order,
            items,
            history,
        })
    }

    async fn send_shipped(&self, order: &Order) {
        let Some(tracking) = order.tracking_number.clone() else {
            return;
        };
        let user = match UserRepository::new(self.pool).get_by_id(order.user_id).await {
            Ok(Some(user)) => user,
            Ok(None) => return,
            Err(e) => {
                tracing::warn!(order_id = %order.id, error = %e, "Could not load customer for shipped email");
                return;
            }
        };

        let order_id = order.id;
        email::spawn_send(self.mailer, "order_shipped", move |mailer| async move {
            mailer
                .send_order_shipped(user.email.as_str(), &user.name, order_id, &tracking)
                .await
        });
    }
}

/// Trim a tracking number and check its length.
fn validate_tracking(raw: &str) -> Result<String, CheckoutError> {
    let tracking = raw.trim();
    if tracking.is_empty() {
        return Err(CheckoutError::InvalidTracking(
            "tracking number is required".to_owned(),
        ));
    }
    if tracking.chars().count() > MAX_TRACKING_CHARS {
        return Err(CheckoutError::InvalidTracking(format!(
            "tracking number must be at most {MAX_TRACKING_CHARS} characters"
        )));
    }
    Ok(tracking.to_owned())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_tracking() {
        assert_eq!(validate_tracking("  DL123456789IN ").unwrap(), "DL123456789IN");
        assert!(matches!(
            validate_tracking("   "),
            Err(CheckoutError::InvalidTracking(_))
        ));
        assert!(validate_tracking(&"9".repeat(65)).is_err());
        assert!(validate_tracking(&"9".repeat(64)).is_ok());
    }
}
