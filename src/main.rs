use tajiree_site::{config::Config, server};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("🚗 Tajiree Auto - catalog and admin panel");
    info!("==========================================");

    let config = Config::load()?;
    info!("Dealer: {} (WhatsApp {})", config.dealer_name, config.whatsapp_number);

    server::serve(config).await
}
