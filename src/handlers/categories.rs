use actix_web::{web, HttpResponse};
use chrono::Utc;
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::db::DbPool;
use crate::errors::AppError;
use crate::models::category::{Category, CategoryChanges, NewCategory};
use crate::schema::{categories, products};

// ── Request / response DTOs ──────────────────────────────────────────────────

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateCategoryRequest {
    pub name: String,
    pub description: Option<String>,
    pub parent_id: Option<Uuid>,
}

/// Absent fields are left unchanged.
#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateCategoryRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub parent_id: Option<Uuid>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CategoryResponse {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub parent_id: Option<Uuid>,
    pub created_at: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CategoryDetailResponse {
    #[serde(flatten)]
    pub category: CategoryResponse,
    pub children: Vec<CategoryResponse>,
}

impl From<Category> for CategoryResponse {
    fn from(c: Category) -> Self {
        CategoryResponse {
            id: c.id,
            name: c.name,
            description: c.description,
            parent_id: c.parent_id,
            created_at: c.created_at.to_rfc3339(),
        }
    }
}

// ── Handlers ─────────────────────────────────────────────────────────────────

/// POST /categories
#[utoipa::path(
    post,
    path = "/categories",
    request_body = CreateCategoryRequest,
    responses(
        (status = 201, description = "Category created", body = CategoryResponse),
        (status = 400, description = "Unknown parent category"),
        (status = 500, description = "Internal server error"),
    ),
    tag = "categories"
)]
pub async fn create_category(
    pool: web::Data<DbPool>,
    body: web::Json<CreateCategoryRequest>,
) -> Result<HttpResponse, AppError> {
    let body = body.into_inner();

    let category = web::block(move || {
        let mut conn = pool.get()?;

        if let Some(parent_id) = body.parent_id {
            let parent_exists: Option<Uuid> = categories::table
                .find(parent_id)
                .select(categories::id)
                .first(&mut conn)
                .optional()?;
            if parent_exists.is_none() {
                return Err(AppError::BadRequest("unknown parent category".to_string()));
            }
        }

        let category: Category = diesel::insert_into(categories::table)
            .values(&NewCategory {
                id: Uuid::new_v4(),
                name: body.name,
                description: body.description,
                parent_id: body.parent_id,
            })
            .returning(Category::as_returning())
            .get_result(&mut conn)?;

        Ok::<_, AppError>(category)
    })
    .await
    .map_err(|e| AppError::Internal(e.to_string()))??;

    Ok(HttpResponse::Created().json(CategoryResponse::from(category)))
}

/// GET /categories
#[utoipa::path(
    get,
    path = "/categories",
    responses(
        (status = 200, description = "All categories", body = [CategoryResponse]),
        (status = 500, description = "Internal server error"),
    ),
    tag = "categories"
)]
pub async fn list_categories(pool: web::Data<DbPool>) -> Result<HttpResponse, AppError> {
    let rows = web::block(move || {
        let mut conn = pool.get()?;
        categories::table
            .select(Category::as_select())
            .order(categories::name.asc())
            .load(&mut conn)
            .map_err(AppError::from)
    })
    .await
    .map_err(|e| AppError::Internal(e.to_string()))??;

    let items: Vec<CategoryResponse> = rows.into_iter().map(CategoryResponse::from).collect();
    Ok(HttpResponse::Ok().json(items))
}

/// GET /categories/{id}
///
/// Returns the category together with its direct children.
#[utoipa::path(
    get,
    path = "/categories/{id}",
    params(("id" = Uuid, Path, description = "Category UUID")),
    responses(
        (status = 200, description = "Category found", body = CategoryDetailResponse),
        (status = 404, description = "Category not found"),
        (status = 500, description = "Internal server error"),
    ),
    tag = "categories"
)]
pub async fn get_category(
    pool: web::Data<DbPool>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let category_id = path.into_inner();

    let result = web::block(move || {
        let mut conn = pool.get()?;

        let category: Option<Category> = categories::table
            .find(category_id)
            .select(Category::as_select())
            .first(&mut conn)
            .optional()?;
        let Some(category) = category else {
            return Ok::<_, AppError>(None);
        };

        let children: Vec<Category> = categories::table
            .filter(categories::parent_id.eq(category.id))
            .select(Category::as_select())
            .order(categories::name.asc())
            .load(&mut conn)?;

        Ok(Some(CategoryDetailResponse {
            category: CategoryResponse::from(category),
            children: children.into_iter().map(CategoryResponse::from).collect(),
        }))
    })
    .await
    .map_err(|e| AppError::Internal(e.to_string()))??;

    match result {
        Some(detail) => Ok(HttpResponse::Ok().json(detail)),
        None => Err(AppError::NotFound),
    }
}

/// PUT /categories/{id}
#[utoipa::path(
    put,
    path = "/categories/{id}",
    params(("id" = Uuid, Path, description = "Category UUID")),
    request_body = UpdateCategoryRequest,
    responses(
        (status = 200, description = "Category updated", body = CategoryResponse),
        (status = 404, description = "Category not found"),
        (status = 500, description = "Internal server error"),
    ),
    tag = "categories"
)]
pub async fn update_category(
    pool: web::Data<DbPool>,
    path: web::Path<Uuid>,
    body: web::Json<UpdateCategoryRequest>,
) -> Result<HttpResponse, AppError> {
    let category_id = path.into_inner();
    let body = body.into_inner();

    let category = web::block(move || {
        let mut conn = pool.get()?;
        diesel::update(categories::table.find(category_id))
            .set(&CategoryChanges {
                name: body.name,
                description: body.description,
                parent_id: body.parent_id,
                updated_at: Utc::now(),
            })
            .returning(Category::as_returning())
            .get_result(&mut conn)
            .map_err(AppError::from)
    })
    .await
    .map_err(|e| AppError::Internal(e.to_string()))??;

    Ok(HttpResponse::Ok().json(CategoryResponse::from(category)))
}

/// DELETE /categories/{id}
#[utoipa::path(
    delete,
    path = "/categories/{id}",
    params(("id" = Uuid, Path, description = "Category UUID")),
    responses(
        (status = 204, description = "Category deleted"),
        (status = 404, description = "Category not found"),
        (status = 409, description = "Category still has products"),
        (status = 500, description = "Internal server error"),
    ),
    tag = "categories"
)]
pub async fn delete_category(
    pool: web::Data<DbPool>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let category_id = path.into_inner();

    web::block(move || {
        let mut conn = pool.get()?;

        let product_count: i64 = products::table
            .filter(products::category_id.eq(category_id))
            .count()
            .get_result(&mut conn)?;
        if product_count > 0 {
            return Err(AppError::Conflict(
                "category still has products".to_string(),
            ));
        }

        let deleted = diesel::delete(categories::table.find(category_id)).execute(&mut conn)?;
        if deleted == 0 {
            return Err(AppError::NotFound);
        }
        Ok::<_, AppError>(())
    })
    .await
    .map_err(|e| AppError::Internal(e.to_string()))??;

    Ok(HttpResponse::NoContent().finish())
}
