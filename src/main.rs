use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use warden::{bot, config::Settings, db};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // RUST_LOG overrides; default to our own info logs
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warden=info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Warden moderation bot");

    let settings = match Settings::from_env() {
        Ok(s) => s,
        Err(e) => {
            error!("Failed to load settings: {}", e);
            std::process::exit(1);
        }
    };

    match &settings.audit_log_path {
        Some(path) => info!("Audit log: {}", path.display()),
        None => info!("Audit log file disabled"),
    }

    let pool = match db::pool::create_pool(&settings.database_url).await {
        Ok(p) => p,
        Err(e) => {
            error!("Failed to create database pool: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = db::pool::run_migrations(&pool).await {
        error!("Failed to run migrations: {}", e);
        std::process::exit(1);
    }

    if let Err(e) = bot::framework::run(settings, pool).await {
        error!("Bot error: {}", e);
        std::process::exit(1);
    }
}
