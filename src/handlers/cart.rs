use actix_web::{web, HttpResponse};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::db::DbPool;
use crate::errors::AppError;
use crate::models::cart::{cart_total, CartItem, NewCartItem};
use crate::models::product::Product;
use crate::schema::{cart_items, products, users};

// ── Request / response DTOs ──────────────────────────────────────────────────

#[derive(Debug, Deserialize, ToSchema)]
pub struct AddCartItemRequest {
    pub product_id: Uuid,
    pub quantity: i32,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateCartItemRequest {
    pub quantity: i32,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CartItemResponse {
    pub id: Uuid,
    pub product_id: Uuid,
    pub quantity: i32,
    /// Price captured when the item was added to the cart.
    pub unit_price: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CartResponse {
    pub user_id: Uuid,
    pub items: Vec<CartItemResponse>,
    pub total: String,
}

impl From<CartItem> for CartItemResponse {
    fn from(i: CartItem) -> Self {
        CartItemResponse {
            id: i.id,
            product_id: i.product_id,
            quantity: i.quantity,
            unit_price: i.unit_price.to_string(),
        }
    }
}

fn merged_quantity(existing: Option<i32>, added: i32) -> i32 {
    existing.unwrap_or(0) + added
}

fn load_cart(
    conn: &mut diesel::PgConnection,
    user_id: Uuid,
) -> Result<CartResponse, AppError> {
    let items: Vec<CartItem> = cart_items::table
        .filter(cart_items::user_id.eq(user_id))
        .select(CartItem::as_select())
        .order(cart_items::created_at.asc())
        .load(conn)?;

    let total = cart_total(&items);
    Ok(CartResponse {
        user_id,
        items: items.into_iter().map(CartItemResponse::from).collect(),
        total: total.to_string(),
    })
}

// ── Handlers ─────────────────────────────────────────────────────────────────

/// GET /cart/{user_id}
#[utoipa::path(
    get,
    path = "/cart/{user_id}",
    params(("user_id" = Uuid, Path, description = "Cart owner UUID")),
    responses(
        (status = 200, description = "Cart contents with total", body = CartResponse),
        (status = 500, description = "Internal server error"),
    ),
    tag = "cart"
)]
pub async fn get_cart(
    pool: web::Data<DbPool>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let user_id = path.into_inner();

    let cart = web::block(move || {
        let mut conn = pool.get()?;
        load_cart(&mut conn, user_id)
    })
    .await
    .map_err(|e| AppError::Internal(e.to_string()))??;

    Ok(HttpResponse::Ok().json(cart))
}

/// POST /cart/{user_id}/items
///
/// Adds a product to the cart, capturing the current catalog price. Adding a
/// product that is already in the cart increases its quantity while keeping
/// the originally captured price.
#[utoipa::path(
    post,
    path = "/cart/{user_id}/items",
    params(("user_id" = Uuid, Path, description = "Cart owner UUID")),
    request_body = AddCartItemRequest,
    responses(
        (status = 200, description = "Updated cart", body = CartResponse),
        (status = 400, description = "Unknown user or product, bad quantity, or insufficient stock"),
        (status = 500, description = "Internal server error"),
    ),
    tag = "cart"
)]
pub async fn add_cart_item(
    pool: web::Data<DbPool>,
    path: web::Path<Uuid>,
    body: web::Json<AddCartItemRequest>,
) -> Result<HttpResponse, AppError> {
    let user_id = path.into_inner();
    let body = body.into_inner();

    if body.quantity <= 0 {
        return Err(AppError::BadRequest("quantity must be positive".to_string()));
    }

    let cart = web::block(move || {
        let mut conn = pool.get()?;

        let user_exists: Option<Uuid> = users::table
            .find(user_id)
            .select(users::id)
            .first(&mut conn)
            .optional()?;
        if user_exists.is_none() {
            return Err(AppError::BadRequest("unknown user".to_string()));
        }

        let product: Option<Product> = products::table
            .find(body.product_id)
            .select(Product::as_select())
            .first(&mut conn)
            .optional()?;
        let Some(product) = product else {
            return Err(AppError::BadRequest("unknown product".to_string()));
        };

        let existing_quantity: Option<i32> = cart_items::table
            .filter(cart_items::user_id.eq(user_id))
            .filter(cart_items::product_id.eq(body.product_id))
            .select(cart_items::quantity)
            .first(&mut conn)
            .optional()?;

        let requested = merged_quantity(existing_quantity, body.quantity);
        if requested > product.stock_quantity {
            return Err(AppError::BadRequest(format!(
                "insufficient stock: {} available",
                product.stock_quantity
            )));
        }

        // Concurrent adds of the same product merge on the
        // (user_id, product_id) key; the captured price stays the one from
        // the first add.
        diesel::insert_into(cart_items::table)
            .values(&NewCartItem {
                id: Uuid::new_v4(),
                user_id,
                product_id: product.id,
                quantity: body.quantity,
                unit_price: product.price,
            })
            .on_conflict((cart_items::user_id, cart_items::product_id))
            .do_update()
            .set(cart_items::quantity.eq(cart_items::quantity + body.quantity))
            .execute(&mut conn)?;

        load_cart(&mut conn, user_id)
    })
    .await
    .map_err(|e| AppError::Internal(e.to_string()))??;

    Ok(HttpResponse::Ok().json(cart))
}

/// PUT /cart/{user_id}/items/{item_id}
#[utoipa::path(
    put,
    path = "/cart/{user_id}/items/{item_id}",
    params(
        ("user_id" = Uuid, Path, description = "Cart owner UUID"),
        ("item_id" = Uuid, Path, description = "Cart item UUID"),
    ),
    request_body = UpdateCartItemRequest,
    responses(
        (status = 200, description = "Updated cart", body = CartResponse),
        (status = 400, description = "Bad quantity"),
        (status = 404, description = "Cart item not found"),
        (status = 500, description = "Internal server error"),
    ),
    tag = "cart"
)]
pub async fn update_cart_item(
    pool: web::Data<DbPool>,
    path: web::Path<(Uuid, Uuid)>,
    body: web::Json<UpdateCartItemRequest>,
) -> Result<HttpResponse, AppError> {
    let (user_id, item_id) = path.into_inner();
    let quantity = body.into_inner().quantity;

    if quantity <= 0 {
        return Err(AppError::BadRequest("quantity must be positive".to_string()));
    }

    let cart = web::block(move || {
        let mut conn = pool.get()?;

        let updated = diesel::update(
            cart_items::table
                .find(item_id)
                .filter(cart_items::user_id.eq(user_id)),
        )
        .set(cart_items::quantity.eq(quantity))
        .execute(&mut conn)?;
        if updated == 0 {
            return Err(AppError::NotFound);
        }

        load_cart(&mut conn, user_id)
    })
    .await
    .map_err(|e| AppError::Internal(e.to_string()))??;

    Ok(HttpResponse::Ok().json(cart))
}

/// DELETE /cart/{user_id}/items/{item_id}
#[utoipa::path(
    delete,
    path = "/cart/{user_id}/items/{item_id}",
    params(
        ("user_id" = Uuid, Path, description = "Cart owner UUID"),
        ("item_id" = Uuid, Path, description = "Cart item UUID"),
    ),
    responses(
        (status = 200, description = "Updated cart", body = CartResponse),
        (status = 404, description = "Cart item not found"),
        (status = 500, description = "Internal server error"),
    ),
    tag = "cart"
)]
pub async fn remove_cart_item(
    pool: web::Data<DbPool>,
    path: web::Path<(Uuid, Uuid)>,
) -> Result<HttpResponse, AppError> {
    let (user_id, item_id) = path.into_inner();

    let cart = web::block(move || {
        let mut conn = pool.get()?;

        let deleted = diesel::delete(
            cart_items::table
                .find(item_id)
                .filter(cart_items::user_id.eq(user_id)),
        )
        .execute(&mut conn)?;
        if deleted == 0 {
            return Err(AppError::NotFound);
        }

        load_cart(&mut conn, user_id)
    })
    .await
    .map_err(|e| AppError::Internal(e.to_string()))??;

    Ok(HttpResponse::Ok().json(cart))
}

/// DELETE /cart/{user_id}
#[utoipa::path(
    delete,
    path = "/cart/{user_id}",
    params(("user_id" = Uuid, Path, description = "Cart owner UUID")),
    responses(
        (status = 204, description = "Cart cleared"),
        (status = 500, description = "Internal server error"),
    ),
    tag = "cart"
)]
pub async fn clear_cart(
    pool: web::Data<DbPool>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let user_id = path.into_inner();

    web::block(move || {
        let mut conn = pool.get()?;
        diesel::delete(cart_items::table.filter(cart_items::user_id.eq(user_id)))
            .execute(&mut conn)
            .map_err(AppError::from)
    })
    .await
    .map_err(|e| AppError::Internal(e.to_string()))??;

    Ok(HttpResponse::NoContent().finish())
}

#[cfg(test)]
mod tests {
    use super::merged_quantity;

    #[test]
    fn adding_merges_with_existing_quantity() {
        assert_eq!(merged_quantity(None, 2), 2);
        assert_eq!(merged_quantity(Some(3), 2), 5);
    }
}
