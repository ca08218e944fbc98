use std::env;
use std::time::Duration;

/// Runtime configuration, read once from the environment at startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub payment: PaymentConfig,
    pub smtp: Option<SmtpConfig>,
}

#[derive(Debug, Clone)]
pub struct PaymentConfig {
    pub base_url: String,
    pub api_key: String,
    pub reconcile_interval: Duration,
}

#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub username: String,
    pub password: String,
    pub from_address: String,
}

impl Config {
    pub fn from_env() -> Config {
        let database_url = env::var("DATABASE_URL").expect("DATABASE_URL must be set");
        let host = env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let port: u16 = env::var("PORT")
            .unwrap_or_else(|_| "8080".to_string())
            .parse()
            .expect("PORT must be a valid number");

        let payment = PaymentConfig {
            base_url: env::var("PAYMENT_API_URL").expect("PAYMENT_API_URL must be set"),
            api_key: env::var("PAYMENT_API_KEY").expect("PAYMENT_API_KEY must be set"),
            reconcile_interval: Duration::from_secs(
                env::var("RECONCILE_INTERVAL_SECS")
                    .unwrap_or_else(|_| "60".to_string())
                    .parse()
                    .expect("RECONCILE_INTERVAL_SECS must be a valid number"),
            ),
        };

        // The mailer is optional: without an SMTP host and sender address,
        // confirmation emails are skipped.
        let smtp = match (env::var("SMTP_HOST"), env::var("MAIL_FROM")) {
            (Ok(smtp_host), Ok(from_address)) => Some(SmtpConfig {
                host: smtp_host,
                username: env::var("SMTP_USERNAME").unwrap_or_default(),
                password: env::var("SMTP_PASSWORD").unwrap_or_default(),
                from_address,
            }),
            _ => None,
        };

        Config {
            host,
            port,
            database_url,
            payment,
            smtp,
        }
    }
}
