// src/cli/serve.rs
// Boot sequence for the `serve` subcommand (SPEC_FULL §4.M). Grounded in
// the teacher's `init_server_context`/`run_mcp_server` staged setup
// (config, then pools, then background workers, then the watcher), replaced
// here with explicit `Component` registrations so the same dependency
// ordering and rollback the kernel already provides is used instead of a
// hand-written sequence of `?`-chained setup calls.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context as _;
use async_trait::async_trait;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::config::AppConfig;
use crate::error::{AppError, Result};
use crate::http::{self, AppState};
use crate::kernel::{Component, ComponentKernel};
use crate::mcp::{McpFacade, SessionStore, ToolRegistry, BASIC_CAPABILITY};
use crate::scheduler::{ChangeExtractor, SchedulerController};

/// Wraps the scheduler controller as a lifecycle component: `start`/`stop`
/// directly map onto `initialize`/`shutdown`. When `scheduler.enabled` is
/// false (SPEC_FULL §6), the component still registers (so dependents like
/// `http` resolve) but never starts the queue/pool.
struct SchedulerComponent {
    controller: Arc<SchedulerController>,
    enabled: bool,
}

#[async_trait]
impl Component for SchedulerComponent {
    fn name(&self) -> &str {
        "scheduler"
    }
    fn dependencies(&self) -> &[String] {
        &[]
    }
    async fn initialize(&self) -> Result<()> {
        if self.enabled {
            self.controller.start().await
        } else {
            info!("scheduler.enabled is false; not starting the change-processing pipeline");
            Ok(())
        }
    }
    async fn shutdown(&self) -> Result<()> {
        self.controller.stop().await;
        Ok(())
    }
    fn is_initialized(&self) -> bool {
        !self.enabled || self.controller.is_running()
    }
}

/// Periodically reaps expired sessions. Depends on nothing, but is wired to
/// come up after the scheduler purely to keep startup logs in a predictable
/// order; there's no real ordering requirement between the two.
struct SessionReaperComponent {
    sessions: Arc<SessionStore>,
    stop_tx: watch::Sender<bool>,
    stop_rx: watch::Receiver<bool>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl SessionReaperComponent {
    fn new(sessions: Arc<SessionStore>) -> Self {
        let (stop_tx, stop_rx) = watch::channel(false);
        Self { sessions, stop_tx, stop_rx, handle: Mutex::new(None) }
    }
}

#[async_trait]
impl Component for SessionReaperComponent {
    fn name(&self) -> &str {
        "session_reaper"
    }
    fn dependencies(&self) -> &[String] {
        &[]
    }
    async fn initialize(&self) -> Result<()> {
        let sessions = self.sessions.clone();
        let mut stop_rx = self.stop_rx.clone();
        let handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = stop_rx.changed() => break,
                    _ = tokio::time::sleep(McpFacade::session_reaper_interval()) => {
                        let reaped = sessions.cleanup_expired(chrono::Utc::now());
                        if reaped > 0 {
                            info!(reaped, "reaped expired sessions");
                        }
                    }
                }
            }
        });
        *self.handle.lock().await = Some(handle);
        Ok(())
    }
    async fn shutdown(&self) -> Result<()> {
        let _ = self.stop_tx.send(true);
        if let Some(handle) = self.handle.lock().await.take() {
            let _ = tokio::time::timeout(Duration::from_secs(5), handle).await;
        }
        Ok(())
    }
    fn is_initialized(&self) -> bool {
        true
    }
}

/// Binds and serves the HTTP transport. Depends on `scheduler` because the
/// `/healthz` handler reads scheduler state the moment the listener accepts
/// its first connection.
struct HttpComponent {
    addr: SocketAddr,
    state: Arc<AppState>,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl HttpComponent {
    fn new(addr: SocketAddr, state: Arc<AppState>) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        Self { addr, state, shutdown_tx, shutdown_rx, handle: Mutex::new(None) }
    }
}

#[async_trait]
impl Component for HttpComponent {
    fn name(&self) -> &str {
        "http"
    }
    fn dependencies(&self) -> &[String] {
        static DEPS: &[String] = &[];
        DEPS
    }
    async fn initialize(&self) -> Result<()> {
        let listener = tokio::net::TcpListener::bind(self.addr)
            .await
            .map_err(|e| AppError::internal(format!("failed to bind {}: {e}", self.addr)))?;
        info!(addr = %self.addr, "http transport listening");

        let router = http::router(self.state.clone());
        let mut shutdown_rx = self.shutdown_rx.clone();
        let handle = tokio::spawn(async move {
            let serve = axum::serve(listener, router).with_graceful_shutdown(async move {
                let _ = shutdown_rx.changed().await;
            });
            if let Err(e) = serve.await {
                warn!(error = %e, "http transport exited with error");
            }
        });
        *self.handle.lock().await = Some(handle);
        Ok(())
    }
    async fn shutdown(&self) -> Result<()> {
        let _ = self.shutdown_tx.send(true);
        if let Some(handle) = self.handle.lock().await.take() {
            let _ = tokio::time::timeout(Duration::from_secs(5), handle).await;
        }
        Ok(())
    }
    fn is_initialized(&self) -> bool {
        true
    }
}

/// Runs the `serve` subcommand: builds the scheduler, tool registry,
/// session store, and HTTP listener, registers them with the component
/// kernel in dependency order, blocks until Ctrl-C, then shuts everything
/// down in reverse order.
pub async fn run(config: AppConfig, extractor: Arc<dyn ChangeExtractor>) -> anyhow::Result<()> {
    let scheduler = SchedulerController::new(&config.scheduler, extractor);

    let registry = Arc::new(ToolRegistry::new());
    let supported_capabilities = [
        BASIC_CAPABILITY.to_string(),
        "streaming".to_string(),
        "progress_tracking".to_string(),
        "cancellation".to_string(),
    ]
    .into_iter()
    .collect();
    let sessions = Arc::new(SessionStore::new(
        supported_capabilities,
        Duration::from_secs(config.session_timeout_seconds),
    ));
    let facade = Arc::new(McpFacade::new(registry.clone(), sessions.clone()));

    let addr: SocketAddr = config
        .http_bind_addr
        .parse()
        .with_context(|| format!("invalid http.bind_addr '{}'", config.http_bind_addr))?;
    let state = Arc::new(AppState { facade, registry, scheduler: scheduler.clone() });

    let mut kernel = ComponentKernel::new();
    kernel.register(Box::new(SchedulerComponent {
        controller: scheduler.clone(),
        enabled: config.scheduler.enabled,
    }))?;
    kernel.register(Box::new(SessionReaperComponent::new(sessions.clone())))?;
    kernel.register(Box::new(HttpComponentWithDeps::new(addr, state)))?;

    kernel.initialize_all().await?;
    info!("all components initialized; awaiting shutdown signal");

    tokio::signal::ctrl_c().await.context("failed to listen for ctrl-c")?;
    info!("shutdown signal received");

    kernel.shutdown_all().await;
    Ok(())
}

/// `HttpComponent` with an explicit dependency on `scheduler`, split out so
/// `HttpComponent` itself stays reusable without a hardcoded dependency.
struct HttpComponentWithDeps {
    inner: HttpComponent,
    deps: Vec<String>,
}

impl HttpComponentWithDeps {
    fn new(addr: SocketAddr, state: Arc<AppState>) -> Self {
        Self { inner: HttpComponent::new(addr, state), deps: vec!["scheduler".to_string()] }
    }
}

#[async_trait]
impl Component for HttpComponentWithDeps {
    fn name(&self) -> &str {
        self.inner.name()
    }
    fn dependencies(&self) -> &[String] {
        &self.deps
    }
    async fn initialize(&self) -> Result<()> {
        self.inner.initialize().await
    }
    async fn shutdown(&self) -> Result<()> {
        self.inner.shutdown().await
    }
    fn is_initialized(&self) -> bool {
        self.inner.is_initialized()
    }
}
