use std::sync::Arc;

use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use islands_of_bharath::build_router;
use islands_of_bharath::config::Config;
use islands_of_bharath::dashboard::DashboardProcess;
use islands_of_bharath::mailer::{DisabledMailer, Mailer, SmtpMailer};
use islands_of_bharath::routes::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "islands_of_bharath=info,dashboard=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config_path =
        std::env::var("ISLANDS_CONFIG").unwrap_or_else(|_| "islands.toml".to_string());
    let config = Config::load(&config_path)?;
    info!(
        "Loaded {} feeds and {} keywords from {}",
        config.feed_count(),
        config.news.keywords.len(),
        config_path
    );

    let mailer: Arc<dyn Mailer> = if config.mail.enabled {
        let credentials = match (
            std::env::var("SMTP_USERNAME"),
            std::env::var("SMTP_PASSWORD"),
        ) {
            (Ok(username), Ok(password)) => Some((username, password)),
            _ => {
                warn!("SMTP_USERNAME/SMTP_PASSWORD not set, sending without authentication");
                None
            }
        };
        Arc::new(SmtpMailer::new(&config.mail, credentials)?)
    } else {
        info!("Mail delivery disabled");
        Arc::new(DisabledMailer)
    };

    let chat_api_key = std::env::var("GEMINI_API_KEY").ok();
    if chat_api_key.is_none() {
        warn!("GEMINI_API_KEY not set, chat will answer with a fallback message");
    }

    // Start the dashboard; the site keeps working without it
    let dashboard = Arc::new(DashboardProcess::new(config.dashboard.clone())?);
    if config.dashboard.enabled {
        if let Err(e) = dashboard.start().await {
            error!("{}", e);
        }
    }

    let state = Arc::new(AppState::from_config(
        &config,
        mailer,
        dashboard.clone(),
        chat_api_key,
    )?);
    let app = build_router(state, &config.server.static_dir);

    // Start server
    let addr = config.bind_addr(std::env::var("PORT").ok().as_deref())?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Server running at: http://{}{}", addr, config.server.landing_page);
    info!("Dashboard available at: http://{}/dashboard", addr);
    info!("Dashboard embed at: http://{}/dashboard-embed", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    dashboard.shutdown().await?;
    info!("Shut down cleanly");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
