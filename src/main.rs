use citizen_services::config::{self, DatabaseConfig, ServerConfig};
use citizen_services::{create_app, db, docs};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    config::load_env();
    init_tracing();

    let db_config = DatabaseConfig::from_env()?;
    let server_config = ServerConfig::from_env()?;

    let pool = db::init(&db_config).await?;
    let openapi = docs::build_openapi(server_config.port)?;
    let app = create_app(pool).await?.merge(docs::swagger_routes(openapi));

    let addr = server_config.addr();
    tracing::info!("listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app.into_make_service()).await?;

    Ok(())
}

fn init_tracing() {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_thread_ids(false)
        .with_thread_names(false);

    let filter_layer = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter_layer)
        .with(fmt_layer)
        .init();
}
