//! Checkout against a real database with an in-memory payment gateway.
//!
//! These tests require a `PostgreSQL` database; migrations are applied on
//! connect. Each test creates its own shoppers and products.
//!
//! Run with:
//! `BAZAAR_TEST_DATABASE_URL=postgres://... cargo test -p bazaar-storefront --test checkout -- --ignored`

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use bazaar_core::{
    AddressId, CurrencyCode, Email, OrderId, OrderStatus, PaymentStatus, ProductId, Slug, UserId,
};
use bazaar_storefront::config::CheckoutConfig;
use bazaar_storefront::db::{
    AddressRepository, CartRepository, OrderRepository, ProductRepository, UserRepository,
};
use bazaar_storefront::models::address::AddressInput;
use bazaar_storefront::models::order::Order;
use bazaar_storefront::models::product::{ProductFields, SizeStock};
use bazaar_storefront::services::catalog::ProductCache;
use bazaar_storefront::services::checkout::{
    CheckoutError, CheckoutService, PaymentOutcome, WebhookOutcome, cancel_and_release,
    expire_reservations,
};
use bazaar_storefront::services::payments::{
    GatewayOrder, GatewayRefund, PaymentError, PaymentGateway, WebhookEvent, parse_webhook,
    signature,
};
use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use uuid::Uuid;

const KEY_SECRET: &str = "test_key_secret";
const WEBHOOK_SECRET: &str = "test_webhook_secret";
const SIZE: &str = "M";

// ============================================================================
// Gateway
// ============================================================================

/// Accepts every order and counts refunds.
#[derive(Default)]
struct InMemoryGateway {
    refunds: AtomicUsize,
}

impl InMemoryGateway {
    fn refunds(&self) -> usize {
        self.refunds.load(Ordering::SeqCst)
    }
}

impl PaymentGateway for InMemoryGateway {
    fn key_id(&self) -> &str {
        "rzp_test_inmemory"
    }

    fn create_order(
        &self,
        amount_minor: i64,
        _currency: CurrencyCode,
        _receipt: &str,
    ) -> impl Future<Output = Result<GatewayOrder, PaymentError>> + Send {
        std::future::ready(Ok(GatewayOrder {
            id: format!("order_{}", Uuid::new_v4().simple()),
            amount: amount_minor,
            currency: "INR".to_owned(),
        }))
    }

    fn refund(
        &self,
        _payment_id: &str,
        amount_minor: i64,
    ) -> impl Future<Output = Result<GatewayRefund, PaymentError>> + Send {
        self.refunds.fetch_add(1, Ordering::SeqCst);
        std::future::ready(Ok(GatewayRefund {
            id: format!("rfnd_{}", Uuid::new_v4().simple()),
            amount: amount_minor,
        }))
    }

    fn verify_payment_signature(
        &self,
        gateway_order_id: &str,
        payment_id: &str,
        signature_hex: &str,
    ) -> bool {
        signature::verify_payment_signature(KEY_SECRET, gateway_order_id, payment_id, signature_hex)
    }

    fn verify_webhook_signature(&self, body: &[u8], signature_hex: &str) -> bool {
        signature::verify_webhook_signature(WEBHOOK_SECRET, body, signature_hex)
    }

    fn parse_webhook(&self, body: &[u8]) -> Result<WebhookEvent, PaymentError> {
        parse_webhook(body)
    }
}

// ============================================================================
// Fixtures
// ============================================================================

struct Shop {
    pool: PgPool,
    gateway: InMemoryGateway,
    config: CheckoutConfig,
    cache: ProductCache,
}

impl Shop {
    async fn open() -> Self {
        let url = std::env::var("BAZAAR_TEST_DATABASE_URL")
            .expect("BAZAAR_TEST_DATABASE_URL must point at a scratch database");
        let pool = PgPoolOptions::new()
            .max_connections(20)
            .connect(&url)
            .await
            .expect("Failed to connect to test database");
        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .expect("Failed to run migrations");

        Self {
            pool,
            gateway: InMemoryGateway::default(),
            config: CheckoutConfig::default(),
            cache: ProductCache::new(),
        }
    }

    fn checkout(&self) -> CheckoutService<'_, InMemoryGateway> {
        CheckoutService::new(&self.pool, &self.gateway, &self.config, &self.cache, None)
    }

    async fn product(&self, quantity: i32) -> ProductId {
        let fields = ProductFields {
            slug: Slug::parse(&format!("tee-{}", Uuid::new_v4().simple())).expect("valid slug"),
            name: "Block Print Tee".to_owned(),
            description: String::new(),
            category: "t-shirts".to_owned(),
            price: Decimal::new(49_900, 2),
            compare_at_price: None,
            images: Vec::new(),
        };
        let stock = [SizeStock {
            size: SIZE.to_owned(),
            quantity,
        }];
        ProductRepository::new(&self.pool)
            .create(&fields, &stock)
            .await
            .expect("Failed to create product")
            .id
    }

    /// A shopper with a default address and one unit of `product` in the cart.
    async fn shopper_with_cart(&self, product: ProductId) -> (UserId, AddressId) {
        let email = Email::parse(&format!("buyer-{}@example.com", Uuid::new_v4().simple()))
            .expect("valid email");
        let user = UserRepository::new(&self.pool)
            .create(&email, "Asha Rao")
            .await
            .expect("Failed to create user");

        let details = AddressInput {
            full_name: "Asha Rao".to_owned(),
            phone: "9876543210".to_owned(),
            line1: "12 MG Road".to_owned(),
            line2: None,
            city: "Bengaluru".to_owned(),
            state: "Karnataka".to_owned(),
            pincode: "560001".to_owned(),
        }
        .validate()
        .expect("valid address");
        let address = AddressRepository::new(&self.pool)
            .create(user.id, &details)
            .await
            .expect("Failed to create address");

        let carts = CartRepository::new(&self.pool);
        let cart_id = carts
            .ensure_cart(user.id)
            .await
            .expect("Failed to create cart");
        carts
            .set_line(cart_id, product, SIZE, 1)
            .await
            .expect("Failed to fill cart");

        (user.id, address.id)
    }

    async fn stock(&self, product: ProductId) -> i32 {
        ProductRepository::new(&self.pool)
            .stock_for_size(product, SIZE)
            .await
            .expect("Failed to read stock")
            .expect("size exists")
    }

    async fn order(&self, id: OrderId) -> Order {
        OrderRepository::new(&self.pool)
            .get(id)
            .await
            .expect("Failed to load order")
            .expect("order exists")
    }

    async fn cart_count(&self, user: UserId) -> i64 {
        CartRepository::new(&self.pool)
            .count(user)
            .await
            .expect("Failed to count cart")
    }
}

fn captured_body(gateway_order_id: &str, payment_id: &str) -> Vec<u8> {
    serde_json::to_vec(&serde_json::json!({
        "event": "payment.captured",
        "payload": {
            "payment": { "entity": { "id": payment_id, "order_id": gateway_order_id } }
        }
    }))
    .expect("serializable body")
}

// ============================================================================
// Stock Reservation
// ============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[ignore = "Requires database"]
async fn test_concurrent_checkouts_never_oversell() {
    let shop = Arc::new(Shop::open().await);
    let product = shop.product(3).await;

    let mut buyers = Vec::new();
    for _ in 0..8 {
        buyers.push(shop.shopper_with_cart(product).await);
    }

    let mut tasks = tokio::task::JoinSet::new();
    for (user, address) in buyers {
        let shop = Arc::clone(&shop);
        tasks.spawn(async move { shop.checkout().place_order(user, address, Utc::now()).await });
    }

    let mut placed = 0;
    let mut sold_out = 0;
    while let Some(result) = tasks.join_next().await {
        match result.expect("checkout task panicked") {
            Ok(_) => placed += 1,
            Err(CheckoutError::OutOfStock { available, .. }) => {
                assert_eq!(available, 0);
                sold_out += 1;
            }
            Err(other) => panic!("unexpected checkout error: {other}"),
        }
    }

    assert_eq!(placed, 3);
    assert_eq!(sold_out, 5);
    assert_eq!(shop.stock(product).await, 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
#[ignore = "Requires database"]
async fn test_last_unit_goes_to_one_of_two_shoppers() {
    let shop = Shop::open().await;
    let product = shop.product(1).await;
    let (first, first_address) = shop.shopper_with_cart(product).await;
    let (second, second_address) = shop.shopper_with_cart(product).await;

    let first_checkout = shop.checkout();
    let second_checkout = shop.checkout();
    let (a, b) = tokio::join!(
        first_checkout.place_order(first, first_address, Utc::now()),
        second_checkout.place_order(second, second_address, Utc::now()),
    );

    assert!(a.is_ok() ^ b.is_ok(), "exactly one checkout must win");
    let loser = if a.is_ok() { b } else { a };
    assert!(matches!(loser, Err(CheckoutError::OutOfStock { .. })));
    assert_eq!(shop.stock(product).await, 0);
}

// ============================================================================
// Payments and Webhooks
// ============================================================================

#[tokio::test]
#[ignore = "Requires database"]
async fn test_webhook_redelivery_is_deduplicated() {
    let shop = Shop::open().await;
    let product = shop.product(5).await;
    let (user, address) = shop.shopper_with_cart(product).await;

    let session = shop
        .checkout()
        .place_order(user, address, Utc::now())
        .await
        .expect("Failed to place order");
    // Cart survives placement so an abandoned payment can be retried
    assert_eq!(shop.cart_count(user).await, 1);

    let payment_id = format!("pay_{}", Uuid::new_v4().simple());
    let body = captured_body(&session.gateway_order_id, &payment_id);
    let sig = signature::sign(WEBHOOK_SECRET, &body);
    let event_id = format!("evt_{}", Uuid::new_v4().simple());

    let first = shop
        .checkout()
        .handle_webhook(&body, Some(&sig), Some(&event_id))
        .await
        .expect("Failed to handle webhook");
    assert_eq!(first, WebhookOutcome::Processed);

    let again = shop
        .checkout()
        .handle_webhook(&body, Some(&sig), Some(&event_id))
        .await
        .expect("Failed to handle redelivery");
    assert_eq!(again, WebhookOutcome::Duplicate);

    let order = shop.order(session.order_id).await;
    assert_eq!(order.status, OrderStatus::Confirmed);
    assert_eq!(order.payment_status, PaymentStatus::Paid);
    assert_eq!(order.gateway_payment_id.as_deref(), Some(payment_id.as_str()));
    assert_eq!(shop.cart_count(user).await, 0);
    assert_eq!(shop.stock(product).await, 4);

    // The browser callback arriving after the webhook changes nothing
    let outcome = shop
        .checkout()
        .confirm_payment(session.order_id, &payment_id)
        .await
        .expect("Failed to confirm payment");
    assert_eq!(outcome, PaymentOutcome::AlreadyProcessed);
    assert_eq!(shop.gateway.refunds(), 0);
}

#[tokio::test]
#[ignore = "Requires database"]
async fn test_webhook_with_wrong_signature_changes_nothing() {
    let shop = Shop::open().await;
    let product = shop.product(2).await;
    let (user, address) = shop.shopper_with_cart(product).await;
    let session = shop
        .checkout()
        .place_order(user, address, Utc::now())
        .await
        .expect("Failed to place order");

    let body = captured_body(&session.gateway_order_id, "pay_forged");
    let forged = signature::sign("not-the-webhook-secret", &body);
    let result = shop
        .checkout()
        .handle_webhook(&body, Some(&forged), Some("evt_forged"))
        .await;

    assert!(matches!(result, Err(CheckoutError::InvalidWebhookSignature)));
    let order = shop.order(session.order_id).await;
    assert_eq!(order.status, OrderStatus::Pending);
    assert_eq!(order.payment_status, PaymentStatus::Pending);
}

#[tokio::test]
#[ignore = "Requires database"]
async fn test_payment_after_cancellation_is_refunded() {
    let shop = Shop::open().await;
    let product = shop.product(2).await;
    let (user, address) = shop.shopper_with_cart(product).await;
    let session = shop
        .checkout()
        .place_order(user, address, Utc::now())
        .await
        .expect("Failed to place order");
    assert_eq!(shop.stock(product).await, 1);

    let cancelled = cancel_and_release(
        &shop.pool,
        &shop.cache,
        session.order_id,
        Some(PaymentStatus::Failed),
        "reservation expired",
    )
    .await
    .expect("Failed to cancel");
    assert!(cancelled);
    assert_eq!(shop.stock(product).await, 2);

    let payment_id = format!("pay_{}", Uuid::new_v4().simple());
    let late = shop
        .checkout()
        .confirm_payment(session.order_id, &payment_id)
        .await
        .expect("Failed to apply late payment");
    assert_eq!(late, PaymentOutcome::Refunded);

    let repeat = shop
        .checkout()
        .confirm_payment(session.order_id, &payment_id)
        .await
        .expect("Failed to apply repeated payment");
    assert_eq!(repeat, PaymentOutcome::AlreadyProcessed);

    assert_eq!(shop.gateway.refunds(), 1);
    let order = shop.order(session.order_id).await;
    assert_eq!(order.status, OrderStatus::Cancelled);
    assert_eq!(order.payment_status, PaymentStatus::Refunded);
    assert_eq!(shop.stock(product).await, 2);
}

// ============================================================================
// Reservation Expiry
// ============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
#[ignore = "Requires database"]
async fn test_concurrent_sweeps_release_stock_once() {
    let shop = Shop::open().await;
    let product = shop.product(2).await;
    let (user, address) = shop.shopper_with_cart(product).await;

    // Placed in the past so only this order has lapsed at sweep time
    let placed_at = Utc::now() - Duration::days(1);
    let session = shop
        .checkout()
        .place_order(user, address, placed_at)
        .await
        .expect("Failed to place order");
    assert_eq!(shop.stock(product).await, 1);

    let sweep_at = placed_at + Duration::minutes(shop.config.reservation_ttl_minutes + 1);
    let (a, b) = tokio::join!(
        expire_reservations(&shop.pool, &shop.cache, sweep_at),
        expire_reservations(&shop.pool, &shop.cache, sweep_at),
    );
    a.expect("Failed to sweep");
    b.expect("Failed to sweep");

    let order = shop.order(session.order_id).await;
    assert_eq!(order.status, OrderStatus::Cancelled);
    assert_eq!(order.payment_status, PaymentStatus::Failed);
    assert_eq!(shop.stock(product).await, 2);

    // A later sweep finds nothing left to release for this order
    expire_reservations(&shop.pool, &shop.cache, sweep_at)
        .await
        .expect("Failed to sweep");
    assert_eq!(shop.stock(product).await, 2);
}

#[tokio::test]
#[ignore = "Requires database"]
async fn test_sweep_leaves_live_reservations_alone() {
    let shop = Shop::open().await;
    let product = shop.product(1).await;
    let (user, address) = shop.shopper_with_cart(product).await;

    let now = Utc::now();
    let session = shop
        .checkout()
        .place_order(user, address, now)
        .await
        .expect("Failed to place order");

    expire_reservations(&shop.pool, &shop.cache, now + Duration::minutes(1))
        .await
        .expect("Failed to sweep");

    assert_eq!(shop.order(session.order_id).await.status, OrderStatus::Pending);
    assert_eq!(shop.stock(product).await, 0);
}
