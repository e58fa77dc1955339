use anyhow::Result;
use dotenvy::dotenv;
use std::path::Path;

pub mod api;
pub mod config;
pub mod error;
pub mod exec;
pub mod relay;
pub mod script;
pub mod server;
pub mod utils;

/// Run one service: load `.env`, load config, and serve until Ctrl-C.
///
/// `port` defaults to the service's own default; `config_path` replaces
/// the `services.toml` lookup chain.
pub async fn run(service: Service, port: Option<u16>, config_path: Option<&Path>) -> Result<()> {
    dotenv().ok();

    let config = match config_path {
        Some(path) => AppConfig::load_from(path)?,
        None => AppConfig::load(),
    };
    let port = port.unwrap_or_else(|| service.default_port());

    server::serve(service, port, config).await
}

// Re-exports for library consumers: common useful types
pub use api::{CompletionClient, HttpCompletionClient, Message};
pub use config::AppConfig;
pub use error::ServiceError;
pub use script::{Namespace, Sandbox, ScriptError};
pub use server::{router, AppState, Service};
