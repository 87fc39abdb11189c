use folio_gateway::{config::SiteConfig, init_gateway, init_tracing};
use std::env;
use std::process;

#[tokio::main]
async fn main() {
    // Get config file path from command line or use default
    let config_path = env::args()
        .nth(1)
        .unwrap_or_else(|| "config/site.yaml".to_string());

    let config = match SiteConfig::from_file(&config_path) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Failed to load configuration from {}: {}", config_path, e);
            eprintln!("Usage: folio-gateway [config_file]");
            process::exit(1);
        }
    };

    init_tracing(config.logging.format);

    if let Err(e) = init_gateway(config).await {
        eprintln!("Server error: {}", e);
        process::exit(1);
    }
}
