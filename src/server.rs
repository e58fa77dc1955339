use anyhow::{anyhow, Context, Result};
use axum::extract::Request;
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::routing::{post, MethodRouter};
use axum::Router;
use colored::Colorize;
use serde::de::DeserializeOwned;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tokio::net::TcpListener;
use tokio::sync::Mutex;
use tracing::Instrument;

use crate::api::{CompletionClient, HttpCompletionClient};
use crate::config::AppConfig;
use crate::error::ServiceError;
use crate::script::Sandbox;
use crate::{exec, relay};

/// The five services this binary can run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Service {
    /// Chat relay taking a JSON-encoded message list.
    Relay,
    /// Chat relay taking a single prompt.
    Prompt,
    /// Script runner returning the namespace, faults are HTTP 500.
    Attrs,
    /// Script runner returning `{attrs, err}`.
    Exec,
    /// Widget builder returning the walk of `sa`.
    Widgets,
}

impl Service {
    pub fn default_port(&self) -> u16 {
        match self {
            Self::Attrs => 8092,
            _ => 8080,
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Relay => "chat relay",
            Self::Prompt => "prompt relay",
            Self::Attrs => "attrs executor",
            Self::Exec => "safe executor",
            Self::Widgets => "widget builder",
        }
    }

    pub fn needs_completion(&self) -> bool {
        matches!(self, Self::Relay | Self::Prompt)
    }

    /// The sandbox flavour for the exec services.
    pub fn sandbox(&self, max_steps: u64) -> Sandbox {
        let sandbox = Sandbox::new(max_steps);
        match self {
            Self::Exec => sandbox.with_json_module(),
            Self::Widgets => sandbox.with_widgets(),
            _ => sandbox,
        }
    }

    fn handler(&self) -> MethodRouter<AppState> {
        match self {
            Self::Relay => post(relay::messages_handler),
            Self::Prompt => post(relay::prompt_handler),
            Self::Attrs => post(exec::attrs_handler),
            Self::Exec => post(exec::exec_handler),
            Self::Widgets => post(exec::widgets_handler),
        }
    }
}

/// State shared by every request of one service.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub client: Option<Arc<dyn CompletionClient>>,
    pub sandbox: Sandbox,
    /// Held for the whole request so requests run one at a time.
    pub lock: Arc<Mutex<()>>,
}

impl AppState {
    pub fn new(
        service: Service,
        config: AppConfig,
        client: Option<Arc<dyn CompletionClient>>,
    ) -> Self {
        let sandbox = service.sandbox(config.max_steps);
        Self {
            config: Arc::new(config),
            client,
            sandbox,
            lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn client(&self) -> Result<&Arc<dyn CompletionClient>, ServiceError> {
        self.client
            .as_ref()
            .ok_or_else(|| ServiceError::Completion(anyhow!("no completion client configured")))
    }
}

/// Decode a JSON request body.
pub fn parse_json<T: DeserializeOwned>(body: &[u8]) -> Result<T, ServiceError> {
    serde_json::from_slice(body).map_err(|e| ServiceError::BadRequest(e.to_string()))
}

/// Build the router for `service`: its handler answers `POST` on every path.
pub fn router(service: Service, state: AppState) -> Router {
    let handler = service.handler();
    Router::new()
        .route("/", handler.clone())
        .route("/*path", handler)
        .layer(middleware::from_fn(trace_request))
        .with_state(state)
}

async fn trace_request(request: Request, next: Next) -> Response {
    let span = tracing::info_span!(
        "request",
        id = %uuid::Uuid::new_v4(),
        method = %request.method(),
        path = %request.uri().path(),
    );
    async move {
        let started = Instant::now();
        let response = next.run(request).await;
        tracing::info!(
            status = response.status().as_u16(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "handled"
        );
        response
    }
    .instrument(span)
    .await
}

pub fn print_banner(service: Service, addr: SocketAddr, detail: &str) {
    eprintln!("{}", "====================================".bright_cyan());
    eprintln!(
        "{}",
        format!("  SANDBOX SERVICES v{}", env!("CARGO_PKG_VERSION"))
            .bright_cyan()
            .bold()
    );
    eprintln!("{}", "====================================".bright_cyan());
    eprintln!(" {} on {}", service.display_name().bright_white(), addr);
    eprintln!("{}\n", format!(" {detail}").dimmed());
}

/// Run `service` on `config.bind_addr:port` until Ctrl-C.
pub async fn serve(service: Service, port: u16, config: AppConfig) -> Result<()> {
    let (client, detail): (Option<Arc<dyn CompletionClient>>, String) =
        if service.needs_completion() {
            let http = HttpCompletionClient::from_config(&config)?;
            let detail = format!(
                "{} at {}, default model {}",
                http.provider().display_name(),
                http.api_url(),
                config.default_model
            );
            (Some(Arc::new(http)), detail)
        } else {
            (None, format!("step budget {}", config.max_steps))
        };

    let addr = format!("{}:{}", config.bind_addr, port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    let local = listener.local_addr().context("Failed to read bound address")?;

    let app = router(service, AppState::new(service, config, client));
    print_banner(service, local, &detail);
    tracing::info!(service = service.display_name(), %local, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;
    tracing::info!("shut down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for Ctrl-C: {e}");
        std::future::pending::<()>().await;
    }
}
