use bigdecimal::BigDecimal;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};
use thiserror::Error;
use uuid::Uuid;

use crate::config::SmtpConfig;

#[derive(Debug, Error)]
pub enum MailError {
    #[error("invalid address: {0}")]
    Address(#[from] lettre::address::AddressError),

    #[error("message build failed: {0}")]
    Build(#[from] lettre::error::Error),

    #[error("smtp error: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),
}

/// Sends order-confirmation emails over SMTP. Without SMTP configuration the
/// mailer is a no-op that only logs.
pub struct Mailer {
    transport: Option<(SmtpTransport, Mailbox)>,
}

impl Mailer {
    pub fn from_config(config: Option<&SmtpConfig>) -> Result<Mailer, MailError> {
        let transport = match config {
            Some(cfg) => {
                let from: Mailbox = cfg.from_address.parse()?;
                let transport = SmtpTransport::relay(&cfg.host)?
                    .credentials(Credentials::new(cfg.username.clone(), cfg.password.clone()))
                    .build();
                Some((transport, from))
            }
            None => None,
        };
        Ok(Mailer { transport })
    }

    pub fn is_enabled(&self) -> bool {
        self.transport.is_some()
    }

    /// Blocking SMTP send; call from `web::block`.
    pub fn send_order_confirmation(
        &self,
        recipient: &str,
        order_id: Uuid,
        total: &BigDecimal,
    ) -> Result<(), MailError> {
        let Some((transport, from)) = &self.transport else {
            log::debug!("mailer disabled, skipping confirmation for order {}", order_id);
            return Ok(());
        };

        let body = format!(
            "Thank you for your order!\n\n\
             Order number: {}\n\
             Total: {}\n\n\
             We will notify you once your payment is confirmed.\n",
            order_id, total
        );

        let email = Message::builder()
            .from(from.clone())
            .to(recipient.parse()?)
            .subject(format!("Order confirmation {}", order_id))
            .body(body)?;

        transport.send(&email)?;
        log::info!("sent confirmation for order {} to {}", order_id, recipient);
        Ok(())
    }
}
