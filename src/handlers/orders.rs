use actix_web::{web, HttpResponse};
use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::db::DbPool;
use crate::email::Mailer;
use crate::errors::AppError;
use crate::models::cart::{cart_total, CartItem};
use crate::models::order::{NewOrder, NewOrderItem, Order, OrderItem, OrderStatus};
use crate::models::user::User;
use crate::payment::amounts_match;
use crate::payment::gateway::PaymentGateway;
use crate::schema::{cart_items, order_items, orders, products, users};

// ── Request / response DTOs ──────────────────────────────────────────────────

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateOrderRequest {
    pub user_id: Uuid,
    pub delivery_address: String,
    pub delivery_time: DateTime<Utc>,
    pub contact_phone: String,
    /// Client-side cart total as a decimal string, e.g. "24.48". Must agree
    /// with the server-side total within 0.01.
    pub total: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CheckoutResponse {
    pub id: Uuid,
    pub status: String,
    /// Where the customer completes the payment, when the provider gives one.
    pub payment_url: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderItemResponse {
    pub id: Uuid,
    pub product_id: Uuid,
    pub product_name: String,
    pub quantity: i32,
    pub unit_price: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderResponse {
    pub id: Uuid,
    pub user_id: Uuid,
    pub status: String,
    pub total: String,
    pub delivery_address: String,
    pub delivery_time: String,
    pub contact_phone: String,
    pub provider_invoice_id: Option<String>,
    pub created_at: String,
    pub items: Vec<OrderItemResponse>,
}

impl OrderResponse {
    fn from_parts(order: Order, items: Vec<OrderItem>) -> OrderResponse {
        OrderResponse {
            id: order.id,
            user_id: order.user_id,
            status: order.status,
            total: order.total.to_string(),
            delivery_address: order.delivery_address,
            delivery_time: order.delivery_time.to_rfc3339(),
            contact_phone: order.contact_phone,
            provider_invoice_id: order.provider_invoice_id,
            created_at: order.created_at.to_rfc3339(),
            items: items
                .into_iter()
                .map(|i| OrderItemResponse {
                    id: i.id,
                    product_id: i.product_id,
                    product_name: i.product_name,
                    quantity: i.quantity,
                    unit_price: i.unit_price.to_string(),
                })
                .collect(),
        }
    }
}

// ── Pagination ───────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize, ToSchema)]
pub struct ListOrdersParams {
    /// Page number (1-based). Defaults to 1.
    #[serde(default = "default_page")]
    pub page: i64,
    /// Number of items per page. Defaults to 20, maximum 100.
    #[serde(default = "default_limit")]
    pub limit: i64,
    pub user_id: Option<Uuid>,
}

fn default_page() -> i64 {
    1
}

fn default_limit() -> i64 {
    20
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ListOrdersResponse {
    pub items: Vec<OrderResponse>,
    pub total: i64,
    pub page: i64,
    pub limit: i64,
}

// ── Checkout validation ──────────────────────────────────────────────────────

fn check_delivery_time(delivery_time: DateTime<Utc>, now: DateTime<Utc>) -> Result<(), AppError> {
    if delivery_time <= now {
        return Err(AppError::BadRequest(
            "delivery time must be in the future".to_string(),
        ));
    }
    Ok(())
}

fn check_submitted_total(
    computed: &BigDecimal,
    submitted: &BigDecimal,
) -> Result<(), AppError> {
    if !amounts_match(computed, submitted) {
        return Err(AppError::BadRequest(format!(
            "cart total mismatch: server computed {}",
            computed
        )));
    }
    Ok(())
}

/// A failure at this point strands a minted invoice: the order is committed
/// but carries no invoice id, so the reconciler can never adopt it. Both ids
/// go into the log and the error text so the order can be repaired by hand.
fn orphaned_invoice_error(order_id: Uuid, invoice_id: &str, detail: &str) -> AppError {
    log::error!(
        "order {}: failed to store invoice {}: {}",
        order_id,
        invoice_id,
        detail
    );
    AppError::Internal(format!(
        "order {} created but invoice {} could not be stored: {}",
        order_id, invoice_id, detail
    ))
}

// ── Handlers ─────────────────────────────────────────────────────────────────

/// POST /orders
///
/// Checkout: turns the user's cart into an order. Order, order items, stock
/// decrement, and cart clearing all happen in one database transaction, so a
/// rejected checkout leaves nothing behind. After the commit an invoice is
/// minted at the payment provider and a confirmation email is attempted.
#[utoipa::path(
    post,
    path = "/orders",
    request_body = CreateOrderRequest,
    responses(
        (status = 201, description = "Order created, payment initiated", body = CheckoutResponse),
        (status = 400, description = "Empty cart, total mismatch, past delivery time, or insufficient stock"),
        (status = 502, description = "Payment provider rejected the invoice"),
        (status = 500, description = "Internal server error"),
    ),
    tag = "orders"
)]
pub async fn create_order(
    pool: web::Data<DbPool>,
    gateway: web::Data<PaymentGateway>,
    mailer: web::Data<Mailer>,
    body: web::Json<CreateOrderRequest>,
) -> Result<HttpResponse, AppError> {
    let body = body.into_inner();

    let submitted_total = BigDecimal::from_str(&body.total)
        .map_err(|e| AppError::BadRequest(format!("Invalid total '{}': {}", body.total, e)))?;
    check_delivery_time(body.delivery_time, Utc::now())?;

    let tx_pool = pool.clone();
    let (order, user_email) = web::block(move || {
        let mut conn = tx_pool.get()?;

        let user: Option<User> = users::table
            .find(body.user_id)
            .select(User::as_select())
            .first(&mut conn)
            .optional()?;
        let Some(user) = user else {
            return Err(AppError::BadRequest("unknown user".to_string()));
        };

        let items: Vec<CartItem> = cart_items::table
            .filter(cart_items::user_id.eq(user.id))
            .select(CartItem::as_select())
            .order(cart_items::created_at.asc())
            .load(&mut conn)?;
        if items.is_empty() {
            return Err(AppError::BadRequest("cart is empty".to_string()));
        }

        let computed_total = cart_total(&items);
        check_submitted_total(&computed_total, &submitted_total)?;

        let order = conn.transaction::<Order, AppError, _>(|conn| {
            let order: Order = diesel::insert_into(orders::table)
                .values(&NewOrder {
                    id: Uuid::new_v4(),
                    user_id: user.id,
                    status: OrderStatus::Pending.as_str().to_string(),
                    total: computed_total,
                    delivery_address: body.delivery_address,
                    delivery_time: body.delivery_time,
                    contact_phone: body.contact_phone,
                })
                .returning(Order::as_returning())
                .get_result(conn)?;

            let mut new_items = Vec::with_capacity(items.len());
            for item in &items {
                // Guarded decrement: fails the whole checkout if stock ran
                // out since the item was added to the cart.
                let updated = diesel::update(
                    products::table
                        .find(item.product_id)
                        .filter(products::stock_quantity.ge(item.quantity)),
                )
                .set(products::stock_quantity.eq(products::stock_quantity - item.quantity))
                .execute(conn)?;
                if updated == 0 {
                    return Err(AppError::BadRequest(format!(
                        "insufficient stock for product {}",
                        item.product_id
                    )));
                }

                let product_name: String = products::table
                    .find(item.product_id)
                    .select(products::name)
                    .first(conn)?;
                new_items.push(NewOrderItem {
                    id: Uuid::new_v4(),
                    order_id: order.id,
                    product_id: item.product_id,
                    product_name,
                    quantity: item.quantity,
                    unit_price: item.unit_price.clone(),
                });
            }
            diesel::insert_into(order_items::table)
                .values(&new_items)
                .execute(conn)?;

            diesel::delete(cart_items::table.filter(cart_items::user_id.eq(user.id)))
                .execute(conn)?;

            Ok(order)
        })?;

        Ok::<_, AppError>((order, user.email))
    })
    .await
    .map_err(|e| AppError::Internal(e.to_string()))??;

    // The order is committed at this point; a provider failure leaves it
    // PENDING and is surfaced to the client.
    let invoice = gateway
        .create_invoice(order.id, &order.total)
        .await
        .map_err(|e| AppError::PaymentGateway(e.to_string()))?;

    let update_pool = pool.clone();
    let order_id = order.id;
    let invoice_id = invoice.id.clone();
    let stored = web::block(move || {
        let mut conn = update_pool.get()?;
        diesel::update(orders::table.find(order_id))
            .set((
                orders::provider_invoice_id.eq(invoice_id),
                orders::status.eq(OrderStatus::ProcessingPayment.as_str()),
                orders::updated_at.eq(Utc::now()),
            ))
            .execute(&mut conn)
            .map_err(AppError::from)
    })
    .await;
    match stored {
        Ok(Ok(_)) => {}
        Ok(Err(e)) => return Err(orphaned_invoice_error(order.id, &invoice.id, &e.to_string())),
        Err(e) => return Err(orphaned_invoice_error(order.id, &invoice.id, &e.to_string())),
    }

    // Confirmation email is best effort.
    let total = order.total.clone();
    actix_web::rt::spawn(async move {
        let result = web::block(move || {
            mailer.send_order_confirmation(&user_email, order_id, &total)
        })
        .await;
        match result {
            Ok(Ok(())) => {}
            Ok(Err(e)) => log::warn!("order {}: confirmation email failed: {}", order_id, e),
            Err(e) => log::warn!("order {}: mail task failed: {}", order_id, e),
        }
    });

    Ok(HttpResponse::Created().json(CheckoutResponse {
        id: order.id,
        status: OrderStatus::ProcessingPayment.as_str().to_string(),
        payment_url: invoice.payment_url,
    }))
}

/// GET /orders/{id}
///
/// Returns the order together with its items.
#[utoipa::path(
    get,
    path = "/orders/{id}",
    params(("id" = Uuid, Path, description = "Order UUID")),
    responses(
        (status = 200, description = "Order found", body = OrderResponse),
        (status = 404, description = "Order not found"),
        (status = 500, description = "Internal server error"),
    ),
    tag = "orders"
)]
pub async fn get_order(
    pool: web::Data<DbPool>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let order_id = path.into_inner();

    let result = web::block(move || {
        let mut conn = pool.get()?;

        let order: Option<Order> = orders::table
            .find(order_id)
            .select(Order::as_select())
            .first(&mut conn)
            .optional()?;
        let Some(order) = order else {
            return Ok::<_, AppError>(None);
        };

        let items: Vec<OrderItem> = order_items::table
            .filter(order_items::order_id.eq(order.id))
            .select(OrderItem::as_select())
            .load(&mut conn)?;

        Ok(Some(OrderResponse::from_parts(order, items)))
    })
    .await
    .map_err(|e| AppError::Internal(e.to_string()))??;

    match result {
        Some(order) => Ok(HttpResponse::Ok().json(order)),
        None => Err(AppError::NotFound),
    }
}

/// GET /orders
///
/// Returns a paginated list of orders (without their items), newest first.
#[utoipa::path(
    get,
    path = "/orders",
    params(
        ("page" = Option<i64>, Query, description = "Page number (1-based, default 1)"),
        ("limit" = Option<i64>, Query, description = "Items per page (default 20, max 100)"),
        ("user_id" = Option<Uuid>, Query, description = "Restrict to one user's orders"),
    ),
    responses(
        (status = 200, description = "Paginated list of orders", body = ListOrdersResponse),
        (status = 500, description = "Internal server error"),
    ),
    tag = "orders"
)]
pub async fn list_orders(
    pool: web::Data<DbPool>,
    query: web::Query<ListOrdersParams>,
) -> Result<HttpResponse, AppError> {
    let params = query.into_inner();
    let page = params.page.max(1);
    let limit = params.limit.clamp(1, 100);
    let offset = (page - 1) * limit;

    let result = web::block(move || {
        let mut conn = pool.get()?;

        let mut count_query = orders::table.into_boxed();
        let mut rows_query = orders::table.into_boxed();
        if let Some(user_id) = params.user_id {
            count_query = count_query.filter(orders::user_id.eq(user_id));
            rows_query = rows_query.filter(orders::user_id.eq(user_id));
        }

        let total: i64 = count_query.count().get_result(&mut conn)?;
        let rows: Vec<Order> = rows_query
            .select(Order::as_select())
            .order(orders::created_at.desc())
            .limit(limit)
            .offset(offset)
            .load(&mut conn)?;

        Ok::<_, AppError>(ListOrdersResponse {
            items: rows
                .into_iter()
                .map(|o| OrderResponse::from_parts(o, vec![]))
                .collect(),
            total,
            page,
            limit,
        })
    })
    .await
    .map_err(|e| AppError::Internal(e.to_string()))??;

    Ok(HttpResponse::Ok().json(result))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn dec(s: &str) -> BigDecimal {
        BigDecimal::from_str(s).unwrap()
    }

    #[test]
    fn past_delivery_time_is_rejected() {
        let now = Utc::now();
        let err = check_delivery_time(now - Duration::hours(1), now).unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[test]
    fn future_delivery_time_is_accepted() {
        let now = Utc::now();
        assert!(check_delivery_time(now + Duration::hours(2), now).is_ok());
    }

    #[test]
    fn total_off_by_more_than_a_cent_is_rejected() {
        let err = check_submitted_total(&dec("24.48"), &dec("24.50")).unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[test]
    fn total_within_a_cent_is_accepted() {
        assert!(check_submitted_total(&dec("24.48"), &dec("24.48")).is_ok());
        assert!(check_submitted_total(&dec("24.48"), &dec("24.49")).is_ok());
    }

    #[test]
    fn orphaned_invoice_error_names_both_ids() {
        let order_id = Uuid::new_v4();
        let err = orphaned_invoice_error(order_id, "inv_42", "connection reset");
        let msg = err.to_string();
        assert!(msg.contains(&order_id.to_string()));
        assert!(msg.contains("inv_42"));
    }

    // Both checkout rejections run before the insert transaction starts, so
    // a rejected checkout persists nothing.
    #[test]
    fn empty_cart_total_rejects_any_positive_submitted_total() {
        let computed = cart_total(&[]);
        let err = check_submitted_total(&computed, &dec("9.99")).unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }
}
