use crate::cli::ServeArgs;
use crate::infra::AppState;
use crate::routes::with_marketplace_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use rental_hub::config::AppConfig;
use rental_hub::error::AppError;
use rental_hub::marketplace::{MailerBackend, Marketplace, MarketplaceSettings, SqlStore};
use rental_hub::telemetry;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::info;

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(config.environment, &config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let store = Arc::new(SqlStore::connect(&config.database).await?);
    let mailer = Arc::new(MailerBackend::from_config(&config.mail)?);
    let settings = MarketplaceSettings::from_config(&config);
    info!(
        ?settings,
        database = %config.database.name,
        mail = ?config.mail.backend,
        "marketplace configured"
    );
    let marketplace = Arc::new(Marketplace::new(store, mailer, &settings));

    let app = with_marketplace_routes(marketplace)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "rental marketplace ready");

    axum::serve(listener, app).await?;
    Ok(())
}
