//! Transactional email: magic links, order confirmations and shipping notices.
//!
//! Uses SMTP via lettre for delivery with Askama templates, sending every
//! message as plain text plus HTML.

use std::future::Future;

use askama::Template;
use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::{MultiPart, SinglePart, header::ContentType},
    transport::smtp::{Error as SmtpError, authentication::Credentials},
};
use secrecy::ExposeSecret;
use thiserror::Error;

use bazaar_core::{CurrencyCode, OrderId, Price};

use crate::config::EmailConfig;
use crate::models::address::AddressDetails;
use crate::models::order::{Order, OrderItem};
use crate::services::auth::MAGIC_LINK_TTL_MINUTES;

#[derive(Template)]
#[template(path = "email/magic_link.html")]
struct MagicLinkHtml<'a> {
    name: &'a str,
    url: &'a str,
    ttl_minutes: i64,
}

#[derive(Template)]
#[template(path = "email/magic_link.txt")]
struct MagicLinkText<'a> {
    name: &'a str,
    url: &'a str,
    ttl_minutes: i64,
}

/// One rendered order line.
struct EmailLine {
    name: String,
    size: String,
    quantity: i32,
    total: String,
}

#[derive(Template)]
#[template(path = "email/order_confirmation.html")]
struct OrderConfirmationHtml<'a> {
    name: &'a str,
    order_id: OrderId,
    lines: &'a [EmailLine],
    subtotal: &'a str,
    shipping_fee: &'a str,
    total: &'a str,
    address: &'a [String],
}

#[derive(Template)]
#[template(path = "email/order_confirmation.txt")]
struct OrderConfirmationText<'a> {
    name: &'a str,
    order_id: OrderId,
    lines: &'a [EmailLine],
    subtotal: &'a str,
    shipping_fee: &'a str,
    total: &'a str,
    address: &'a [String],
}

#[derive(Template)]
#[template(path = "email/order_shipped.html")]
struct OrderShippedHtml<'a> {
    name: &'a str,
    order_id: OrderId,
    tracking_number: &'a str,
}

#[derive(Template)]
#[template(path = "email/order_shipped.txt")]
struct OrderShippedText<'a> {
    name: &'a str,
    order_id: OrderId,
    tracking_number: &'a str,
}

/// Errors that can occur when sending email.
#[derive(Debug, Error)]
pub enum EmailError {
    /// SMTP transport error.
    #[error("SMTP error: {0}")]
    Smtp(#[from] SmtpError),

    /// Failed to build email message.
    #[error("Failed to build message: {0}")]
    MessageBuild(#[from] lettre::error::Error),

    /// Invalid email address.
    #[error("Invalid email address: {0}")]
    InvalidAddress(String),

    /// Template rendering error.
    #[error("Template error: {0}")]
    Template(#[from] askama::Error),
}

/// Email service for sending transactional emails.
#[derive(Clone)]
pub struct EmailService {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
    from_address: String,
}

impl EmailService {
    /// Create a new email service from configuration.
    ///
    /// # Errors
    ///
    /// Returns error if the SMTP relay cannot be configured.
    pub fn new(config: &EmailConfig) -> Result<Self, SmtpError> {
        let credentials = Credentials::new(
            config.smtp_username.clone(),
            config.smtp_password.expose_secret().to_string(),
        );

        let mailer = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)?
            .port(config.smtp_port)
            .credentials(credentials)
            .build();

        Ok(Self {
            mailer,
            from_address: config.from_address.clone(),
        })
    }

    /// Send a sign-in link.
    ///
    /// # Errors
    ///
    /// Returns error if email fails to send or template fails to render.
    pub async fn send_magic_link(&self, to: &str, name: &str, url: &str) -> Result<(), EmailError> {
        let ttl_minutes = MAGIC_LINK_TTL_MINUTES;
        let html = MagicLinkHtml {
            name,
            url,
            ttl_minutes,
        }
        .render()?;
        let text = MagicLinkText {
            name,
            url,
            ttl_minutes,
        }
        .render()?;

        self.send_multipart_email(to, "Your Bazaar sign-in link", &text, &html)
            .await
    }

    /// Send the confirmation for a paid order.
    ///
    /// # Errors
    ///
    /// Returns error if email fails to send or template fails to render.
    pub async fn send_order_confirmation(
        &self,
        to: &str,
        name: &str,
        order: &Order,
        items: &[OrderItem],
    ) -> Result<(), EmailError> {
        let currency = order.currency;
        let lines = email_lines(items, currency);
        let subtotal = money(order.subtotal, currency);
        let shipping_fee = money(order.shipping_fee, currency);
        let total = money(order.total, currency);
        let address = address_lines(&order.shipping_address);

        let html = OrderConfirmationHtml {
            name,
            order_id: order.id,
            lines: &lines,
            subtotal: &subtotal,
            shipping_fee: &shipping_fee,
            total: &total,
            address: &address,
        }
        .render()?;
        let text = OrderConfirmationText {
            name,
            order_id: order.id,
            lines: &lines,
            subtotal: &subtotal,
            shipping_fee: &shipping_fee,
            total: &total,
            address: &address,
        }
        .render()?;

        let subject = format!("Order #{} confirmed", order.id);
        self.send_multipart_email(to, &subject, &text, &html).await
    }

    /// Tell the customer their order shipped.
    ///
    /// # Errors
    ///
    /// Returns error if email fails to send or template fails to render.
    pub async fn send_order_shipped(
        &self,
        to: &str,
        name: &str,
        order_id: OrderId,
        tracking_number: &str,
    ) -> Result<(), EmailError> {
        let html = OrderShippedHtml {
            name,
            order_id,
            tracking_number,
        }
        .render()?;
        let text = OrderShippedText {
            name,
            order_id,
            tracking_number,
        }
        .render()?;

        let subject = format!("Order #{order_id} has shipped");
        self.send_multipart_email(to, &subject, &text, &html).await
    }

    /// Send a multipart email with both plain text and HTML versions.
    async fn send_multipart_email(
        &self,
        to: &str,
        subject: &str,
        text_body: &str,
        html_body: &str,
    ) -> Result<(), EmailError> {
        let email = Message::builder()
            .from(
                self.from_address
                    .parse()
                    .map_err(|_| EmailError::InvalidAddress(self.from_address.clone()))?,
            )
            .to(to
                .parse()
                .map_err(|_| EmailError::InvalidAddress(to.to_string()))?)
            .subject(subject)
            .multipart(
                MultiPart::alternative()
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_PLAIN)
                            .body(text_body.to_string()),
                    )
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_HTML)
                            .body(html_body.to_string()),
                    ),
            )?;

        self.mailer.send(email).await?;
        Ok(())
    }
}

/// Send an email in the background.
///
/// Failures are logged and never reach the request that triggered the
/// email. Without a configured mailer the send is logged and skipped.
pub fn spawn_send<F, Fut>(mailer: Option<&EmailService>, kind: &'static str, send: F)
where
    F: FnOnce(EmailService) -> Fut,
    Fut: Future<Output = Result<(), EmailError>> + Send + 'static,
{
    let Some(mailer) = mailer else {
        tracing::info!(kind, "Email not configured, skipping send");
        return;
    };

    let future = send(mailer.clone());
    tokio::spawn(async move {
        match future.await {
            Ok(()) => tracing::debug!(kind, "Email sent"),
            Err(e) => tracing::warn!(kind, error = %e, "Failed to send email"),
        }
    });
}

fn money(amount: rust_decimal::Decimal, currency: CurrencyCode) -> String {
    Price::new(amount, currency).to_string()
}

fn email_lines(items: &[OrderItem], currency: CurrencyCode) -> Vec<EmailLine> {
    items
        .iter()
        .map(|item| EmailLine {
            name: item.product_name.clone(),
            size: item.size.clone(),
            quantity: item.quantity,
            total: money(item.line_total(), currency),
        })
        .collect()
}

fn address_lines(address: &AddressDetails) -> Vec<String> {
    let mut lines = vec![address.full_name.clone(), address.line1.clone()];
    if let Some(line2) = address.line2.as_deref().filter(|l| !l.is_empty()) {
        lines.push(line2.to_owned());
    }
    lines.push(format!(
        "{}, {} {}",
        address.city,
        address.state,
        address.pincode.as_str()
    ));
    lines.push(address.phone.clone());
    lines
}
