use std::sync::Arc;

use dotenvy::dotenv;
use shop_service::config::Config;
use shop_service::email::Mailer;
use shop_service::payment::gateway::PaymentGateway;
use shop_service::payment::reconciler::Reconciler;
use shop_service::{build_server, create_pool, run_migrations};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv().ok();
    env_logger::init_from_env(env_logger::Env::default().default_filter_or("info"));

    let config = Config::from_env();

    let pool = create_pool(&config.database_url);
    run_migrations(&pool);

    let gateway = PaymentGateway::new(&config.payment.base_url, &config.payment.api_key);
    let mailer = Mailer::from_config(config.smtp.as_ref())
        .unwrap_or_else(|e| panic!("Invalid SMTP configuration: {}", e));
    if !mailer.is_enabled() {
        log::warn!("SMTP not configured, order confirmation emails are disabled");
    }

    let reconciler = Arc::new(Reconciler::new(
        pool.clone(),
        gateway.clone(),
        config.payment.reconcile_interval,
    ));
    actix_web::rt::spawn(reconciler.run());

    log::info!("Starting server at http://{}:{}", config.host, config.port);

    build_server(pool, gateway, mailer, &config.host, config.port)?.await
}
