use std::{str::FromStr, sync::Arc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use duka::{
    api,
    config::Settings,
    payments::{DarajaClient, MobileMoneyGateway},
    service::ServiceContext,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "duka=debug,tower_http=debug,axum=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let settings = Settings::new().unwrap_or_else(|e| {
        tracing::warn!("Failed to load config: {}. Using defaults.", e);
        Settings::default()
    });

    tracing::info!("Starting Duka server on {}:{}", settings.server.host, settings.server.port);

    // Initialize database
    let connect_options = SqliteConnectOptions::from_str(&settings.database.url)?
        .create_if_missing(true)
        .foreign_keys(true);
    let db_pool = SqlitePoolOptions::new()
        .max_connections(settings.database.max_connections)
        .connect_with(connect_options)
        .await?;

    // Run migrations
    sqlx::migrate!("./migrations")
        .run(&db_pool)
        .await?;

    // Initialize M-Pesa client if configured
    let gateway: Option<Arc<dyn MobileMoneyGateway>> = if settings.mpesa.enabled {
        match DarajaClient::new(&settings.mpesa) {
            Ok(client) => {
                tracing::info!("M-Pesa payments enabled");
                let client: Arc<dyn MobileMoneyGateway> = Arc::new(client);
                Some(client)
            }
            Err(e) => {
                tracing::warn!("M-Pesa enabled but misconfigured: {}", e);
                None
            }
        }
    } else {
        tracing::info!("M-Pesa payments disabled");
        None
    };

    if settings.mpesa.enabled && settings.mpesa.callback_token.is_none() {
        tracing::warn!("No mpesa.callback_token set; callbacks are accepted from anyone");
    }

    // Create service context
    let service_context = Arc::new(ServiceContext::new(db_pool, &settings, gateway));

    let app = api::create_app(service_context, Arc::new(settings.clone()));

    let listener = tokio::net::TcpListener::bind(
        format!("{}:{}", settings.server.host, settings.server.port)
    ).await?;

    tracing::info!("Server listening on http://{}:{}", settings.server.host, settings.server.port);

    axum::serve(listener, app).await?;

    Ok(())
}
