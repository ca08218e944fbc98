pub mod config;
pub mod db;
pub mod email;
pub mod errors;
pub mod handlers;
pub mod models;
pub mod payment;
pub mod schema;

use actix_web::{middleware::Logger, web, App, HttpServer};
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

pub use db::{create_pool, DbPool};
use email::Mailer;
use payment::gateway::PaymentGateway;

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

/// Run any pending Diesel migrations against the pool's database.
pub fn run_migrations(pool: &DbPool) {
    let mut conn = pool.get().expect("Failed to get DB connection for migrations");
    conn.run_pending_migrations(MIGRATIONS)
        .expect("Failed to run database migrations");
}

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::auth::register,
        handlers::auth::login,
        handlers::categories::create_category,
        handlers::categories::list_categories,
        handlers::categories::get_category,
        handlers::categories::update_category,
        handlers::categories::delete_category,
        handlers::products::create_product,
        handlers::products::list_products,
        handlers::products::get_product,
        handlers::products::update_product,
        handlers::products::delete_product,
        handlers::cart::get_cart,
        handlers::cart::add_cart_item,
        handlers::cart::update_cart_item,
        handlers::cart::remove_cart_item,
        handlers::cart::clear_cart,
        handlers::orders::create_order,
        handlers::orders::get_order,
        handlers::orders::list_orders,
        handlers::payments::payment_webhook,
    ),
    tags(
        (name = "auth", description = "Account registration and login"),
        (name = "categories", description = "Category catalog"),
        (name = "products", description = "Product catalog"),
        (name = "cart", description = "Per-user shopping carts"),
        (name = "orders", description = "Checkout and order history"),
        (name = "payments", description = "Payment provider callbacks"),
    )
)]
pub struct ApiDoc;

/// Build and return an actix-web `Server` bound to `host:port`.
///
/// The caller is responsible for `.await`-ing (or `tokio::spawn`-ing) the
/// returned server.
pub fn build_server(
    pool: DbPool,
    gateway: PaymentGateway,
    mailer: Mailer,
    host: &str,
    port: u16,
) -> std::io::Result<actix_web::dev::Server> {
    let gateway = web::Data::new(gateway);
    let mailer = web::Data::new(mailer);

    Ok(HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(pool.clone()))
            .app_data(gateway.clone())
            .app_data(mailer.clone())
            .wrap(Logger::default())
            .service(
                web::scope("/auth")
                    .route("/register", web::post().to(handlers::auth::register))
                    .route("/login", web::post().to(handlers::auth::login)),
            )
            .service(
                web::scope("/categories")
                    .route("", web::post().to(handlers::categories::create_category))
                    .route("", web::get().to(handlers::categories::list_categories))
                    .route("/{id}", web::get().to(handlers::categories::get_category))
                    .route("/{id}", web::put().to(handlers::categories::update_category))
                    .route("/{id}", web::delete().to(handlers::categories::delete_category)),
            )
            .service(
                web::scope("/products")
                    .route("", web::post().to(handlers::products::create_product))
                    .route("", web::get().to(handlers::products::list_products))
                    .route("/{id}", web::get().to(handlers::products::get_product))
                    .route("/{id}", web::put().to(handlers::products::update_product))
                    .route("/{id}", web::delete().to(handlers::products::delete_product)),
            )
            .service(
                web::scope("/cart")
                    .route("/{user_id}", web::get().to(handlers::cart::get_cart))
                    .route("/{user_id}", web::delete().to(handlers::cart::clear_cart))
                    .route("/{user_id}/items", web::post().to(handlers::cart::add_cart_item))
                    .route(
                        "/{user_id}/items/{item_id}",
                        web::put().to(handlers::cart::update_cart_item),
                    )
                    .route(
                        "/{user_id}/items/{item_id}",
                        web::delete().to(handlers::cart::remove_cart_item),
                    ),
            )
            .service(
                web::scope("/orders")
                    .route("", web::post().to(handlers::orders::create_order))
                    .route("", web::get().to(handlers::orders::list_orders))
                    .route("/{id}", web::get().to(handlers::orders::get_order)),
            )
            .service(
                web::scope("/payments")
                    .route("/webhook", web::post().to(handlers::payments::payment_webhook)),
            )
            .service(
                SwaggerUi::new("/swagger-ui/{_:.*}")
                    .url("/api-doc/openapi.json", ApiDoc::openapi()),
            )
    })
    .bind((host.to_string(), port))?
    .run())
}
