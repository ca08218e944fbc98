use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum GatewayError {
    /// The provider does not (yet) know the invoice.
    #[error("invoice not found")]
    InvoiceNotFound,

    #[error("provider rejected the request ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
}

/// Provider-side invoice record. `status` uses the provider's vocabulary
/// (`new`, `processing`, `paid`, `failed`, `cancelled`).
#[derive(Debug, Clone, Deserialize)]
pub struct Invoice {
    pub id: String,
    pub status: String,
    pub amount: BigDecimal,
    pub payment_url: Option<String>,
}

#[derive(Debug, Serialize)]
struct CreateInvoiceRequest<'a> {
    order_id: Uuid,
    amount: &'a BigDecimal,
    currency: &'a str,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    message: Option<String>,
}

/// HTTP client for the payment provider's invoice API.
#[derive(Debug, Clone)]
pub struct PaymentGateway {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl PaymentGateway {
    pub fn new(base_url: &str, api_key: &str) -> PaymentGateway {
        PaymentGateway {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        }
    }

    /// Mints a new invoice for `amount` referencing `order_id`.
    pub async fn create_invoice(
        &self,
        order_id: Uuid,
        amount: &BigDecimal,
    ) -> Result<Invoice, GatewayError> {
        let resp = self
            .http
            .post(format!("{}/invoices", self.base_url))
            .header("X-Api-Key", &self.api_key)
            .json(&CreateInvoiceRequest {
                order_id,
                amount,
                currency: "EUR",
            })
            .send()
            .await?;

        Self::into_invoice(resp).await
    }

    /// Fetches the current state of an invoice. A provider 404 is reported
    /// as `InvoiceNotFound` so callers can distinguish "not yet known" from
    /// real failures.
    pub async fn invoice_status(&self, invoice_id: &str) -> Result<Invoice, GatewayError> {
        let resp = self
            .http
            .get(format!("{}/invoices/{}", self.base_url, invoice_id))
            .header("X-Api-Key", &self.api_key)
            .send()
            .await?;

        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(GatewayError::InvoiceNotFound);
        }

        Self::into_invoice(resp).await
    }

    async fn into_invoice(resp: reqwest::Response) -> Result<Invoice, GatewayError> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp.json::<Invoice>().await?);
        }

        let message = resp
            .json::<ApiErrorBody>()
            .await
            .ok()
            .and_then(|b| b.message)
            .unwrap_or_else(|| status.to_string());

        Err(GatewayError::Api {
            status: status.as_u16(),
            message,
        })
    }
}
