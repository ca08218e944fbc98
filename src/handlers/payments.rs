use actix_web::{web, HttpResponse};
use bigdecimal::BigDecimal;
use chrono::Utc;
use diesel::prelude::*;
use serde::Deserialize;
use serde_json::json;
use utoipa::ToSchema;

use crate::db::DbPool;
use crate::errors::AppError;
use crate::models::order::Order;
use crate::payment::{amounts_match, resolve_webhook_status, status_transition};
use crate::schema::orders;

#[derive(Debug, Deserialize, ToSchema)]
pub struct PaymentWebhookRequest {
    pub invoice_id: String,
    /// Provider status vocabulary: new, processing, paid, failed, cancelled.
    pub status: String,
    #[schema(value_type = String)]
    pub amount: BigDecimal,
}

/// POST /payments/webhook
///
/// Payment provider callback. Looks up the order by its invoice id, checks
/// the notified amount against the order total (cent-level tolerance) and
/// applies the provider status. The status is only written when it actually
/// changes; replayed notifications are no-ops.
#[utoipa::path(
    post,
    path = "/payments/webhook",
    request_body = PaymentWebhookRequest,
    responses(
        (status = 200, description = "Notification processed"),
        (status = 404, description = "No order references this invoice"),
        (status = 500, description = "Internal server error"),
    ),
    tag = "payments"
)]
pub async fn payment_webhook(
    pool: web::Data<DbPool>,
    body: web::Json<PaymentWebhookRequest>,
) -> Result<HttpResponse, AppError> {
    let body = body.into_inner();

    web::block(move || {
        let mut conn = pool.get()?;

        let order: Option<Order> = orders::table
            .filter(orders::provider_invoice_id.eq(&body.invoice_id))
            .select(Order::as_select())
            .first(&mut conn)
            .optional()?;
        let Some(order) = order else {
            return Err(AppError::NotFound);
        };

        if !amounts_match(&body.amount, &order.total) {
            log::warn!(
                "order {}: webhook amount {} disagrees with total {}",
                order.id,
                body.amount,
                order.total
            );
        }

        let mapped = resolve_webhook_status(&body.status, &body.amount, &order.total);
        let Some(next) = status_transition(&order.status, mapped) else {
            return Ok::<_, AppError>(());
        };

        log::info!(
            "order {}: webhook '{}' moves {} -> {}",
            order.id,
            body.status,
            order.status,
            next.as_str()
        );
        diesel::update(orders::table.find(order.id))
            .set((
                orders::status.eq(next.as_str()),
                orders::updated_at.eq(Utc::now()),
            ))
            .execute(&mut conn)?;

        Ok(())
    })
    .await
    .map_err(|e| AppError::Internal(e.to_string()))??;

    Ok(HttpResponse::Ok().json(json!({ "received": true })))
}
