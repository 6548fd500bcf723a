use rest_probe::services::config::AppConfig;
use rest_probe::services::logger::{init_tracing, LogLevel};
use std::sync::Arc;

#[tokio::main]
async fn main() {
    init_tracing(LogLevel::from_env());

    let config = match AppConfig::from_env() {
        Ok(config) => Arc::new(config),
        Err(err) => {
            eprintln!("rest-probe: invalid configuration: {}", err);
            std::process::exit(1);
        }
    };

    if let Err(err) = rest_probe::mcp::server::run_stdio(config).await {
        eprintln!("rest-probe: {}", err);
        std::process::exit(1);
    }
}
